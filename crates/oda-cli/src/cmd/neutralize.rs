use oda_core::commands::neutralize;
use oda_core::config::OdaConfig;
use oda_core::db::PgConnector;

use crate::prompt;

pub(crate) fn run_neutralize(
    config: &OdaConfig,
    full: bool,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let database = &config.database.name;
    if !yes {
        prompt::require_interactive("neutralize a database", "--yes")?;
        eprintln!(
            "WARNING: This disables mail, crons, payment and bank integrations of '{database}' \
             and gives it a new identity."
        );
        if !prompt::confirm(&format!("Neutralize '{database}'?"))? {
            eprintln!("Aborted.");
            return Ok(());
        }
    }

    eprintln!("==> Neutralizing '{database}'");
    let stats = neutralize::run(&PgConnector, &config.connection(), full)
        .map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) })?;

    println!(
        "Neutralized '{database}': {} statements applied, {} skipped",
        stats.applied,
        stats.skipped.len()
    );
    if !stats.skipped.is_empty() {
        println!("  Skipped (table or column missing): {}", stats.skipped.join(", "));
    }
    Ok(())
}
