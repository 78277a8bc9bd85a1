use std::path::Path;

use oda_core::commands;
use oda_core::config::OdaConfig;
use oda_core::db::PgConnector;
use oda_core::platform::shell::SystemRunner;

use crate::format::format_bytes;
use crate::table::{add_kv_row, CliTableTheme};

use super::trim::{run_trim, TrimArgs};

pub(crate) fn run_backup(
    config: &OdaConfig,
    include_addons: bool,
    trim: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!(
        "==> Archiving database '{}' into {}",
        config.database.name,
        config.backups_dir.display()
    );
    let now = chrono::Local::now();
    let report = commands::backup::run(config, &SystemRunner, &PgConnector, &now, include_addons)
        .map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) })?;

    let theme = CliTableTheme::detect();
    let mut table = theme.new_kv_table();
    add_kv_row(&mut table, theme, "Prefix", &report.prefix);
    add_kv_row(
        &mut table,
        theme,
        "Database",
        describe(&report.database_archive),
    );
    for archive in &report.addon_archives {
        add_kv_row(&mut table, theme, "Addon", describe(archive));
    }
    for dir in &report.skipped_addons {
        add_kv_row(
            &mut table,
            theme,
            "Skipped",
            format!("{} (empty or missing)", dir.display()),
        );
    }
    println!("{table}");

    if trim {
        eprintln!("==> Trimming archives of '{}'", config.database.name);
        run_trim(config, &TrimArgs::configured_database())?;
    }
    Ok(())
}

fn describe(archive: &Path) -> String {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| archive.display().to_string());
    match std::fs::metadata(archive) {
        Ok(meta) => format!("{name}  ({})", format_bytes(meta.len())),
        Err(_) => name,
    }
}
