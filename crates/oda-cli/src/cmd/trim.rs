use oda_core::commands::trim::{self, TrimOptions};
use oda_core::config::OdaConfig;

pub(crate) struct TrimArgs {
    pub limit: Option<usize>,
    pub all: bool,
    pub include_addons: bool,
    pub dry_run: bool,
    pub list: bool,
}

impl TrimArgs {
    /// Trim the configured database (and its addons) to `retention.keep`.
    pub(crate) fn configured_database() -> Self {
        Self {
            limit: None,
            all: false,
            include_addons: true,
            dry_run: false,
            list: false,
        }
    }
}

pub(crate) fn run_trim(
    config: &OdaConfig,
    args: &TrimArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let opts = TrimOptions {
        limit: args.limit.unwrap_or(config.retention.keep),
        scope_owner: (!args.all).then_some(config.database.name.as_str()),
        include_addons: args.include_addons,
        dry_run: args.dry_run,
    };
    let (stats, entries) = trim::run(&config.backups_dir, &opts)
        .map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) })?;

    if args.list || args.dry_run {
        for entry in &entries {
            println!("{:<6} {}", entry.action, entry.archive);
        }
        println!();
    }

    if args.dry_run {
        println!(
            "Dry run: would keep {} and delete {} archives",
            stats.kept, stats.deleted,
        );
    } else {
        println!("Deleted {} archives (kept {})", stats.deleted, stats.kept);
    }
    Ok(())
}
