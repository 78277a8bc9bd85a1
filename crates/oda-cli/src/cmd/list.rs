use comfy_table::Cell;

use oda_core::catalog;
use oda_core::config::OdaConfig;
use oda_types::ArchiveName;

use crate::format::{format_bytes, format_taken_at};
use crate::table::CliTableTheme;

pub(crate) fn run_list(
    config: &OdaConfig,
    any: bool,
    filter: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let owner = match (any, filter) {
        (true, _) => None,
        (false, Some(f)) => Some(f),
        (false, None) => Some(config.database.name.as_str()),
    };
    let listing = catalog::list(&config.backups_dir, owner)
        .map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) })?;

    if listing.is_empty() {
        println!("No archives found.");
        return Ok(());
    }

    let theme = CliTableTheme::detect();
    let mut table =
        theme.new_data_table(&["Kind", "Archive", "Database", "Addon", "Taken at", "Size"]);

    let mut rows: Vec<&ArchiveName> = listing.databases.iter().chain(&listing.addons).collect();
    rows.sort();
    for archive in rows {
        let size = std::fs::metadata(config.backups_dir.join(archive.file_name()))
            .map(|m| format_bytes(m.len()))
            .unwrap_or_else(|_| "-".to_string());
        table.add_row(vec![
            Cell::new(archive.kind()),
            Cell::new(archive.file_name()),
            Cell::new(archive.database()),
            Cell::new(archive.addon().unwrap_or("-")),
            Cell::new(format_taken_at(archive.taken_at())),
            Cell::new(size),
        ]);
    }
    println!("{table}");

    Ok(())
}
