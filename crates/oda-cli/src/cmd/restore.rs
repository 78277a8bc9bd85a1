use std::io::IsTerminal;

use oda_core::catalog::{self, ArchiveListing};
use oda_core::commands::restore::{self, RestoreEvent, RestoreMode, RestoreRequest, RestoreStage};
use oda_core::config::OdaConfig;
use oda_core::db::PgConnector;
use oda_core::platform::shell::SystemRunner;
use oda_types::ArchiveName;

use crate::prompt;

pub(crate) struct RestoreArgs<'a> {
    pub archive: Option<&'a str>,
    pub addon: Option<&'a str>,
    pub any: bool,
    pub move_data: bool,
    pub full: bool,
    pub yes: bool,
}

pub(crate) fn run_restore(
    config: &OdaConfig,
    args: &RestoreArgs<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let owner = (!args.any).then_some(config.database.name.as_str());
    let listing = catalog::list(&config.backups_dir, owner)
        .map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) })?;

    let archive = match args.archive {
        Some(name) => {
            if listing.find(name).is_none() && !args.any {
                return Err(format!(
                    "archive '{name}' not found among the archives of '{}'; \
                     use --any to restore another database's archive",
                    config.database.name
                )
                .into());
            }
            name.to_string()
        }
        None => select_database_archive(&listing)?,
    };
    let addon = match args.addon {
        Some("none") => None,
        Some(name) => Some(name.to_string()),
        None if args.archive.is_none() => select_addon_archive(&listing, &archive)?,
        None => None,
    };

    let mode = if args.move_data {
        RestoreMode::Move
    } else {
        RestoreMode::Copy {
            full_strength: args.full,
        }
    };

    if !args.yes {
        prompt::require_interactive("restore over a database", "--yes")?;
        let target = &config.database.name;
        eprintln!("WARNING: database '{target}' and its filestore will be replaced.");
        eprintln!("  Database archive: {archive}");
        if let Some(addon) = &addon {
            eprintln!("  Addon archive:    {addon}");
        }
        match mode {
            RestoreMode::Move => eprintln!("  Mode:             move (production identity kept)"),
            RestoreMode::Copy { full_strength } => eprintln!(
                "  Mode:             copy ({} neutralization)",
                if full_strength { "full" } else { "standard" }
            ),
        }
        if !prompt::confirm("Continue?")? {
            eprintln!("Aborted.");
            return Ok(());
        }
    }

    let mut render = |event: &RestoreEvent| match event.stage {
        RestoreStage::Done | RestoreStage::Failed => {}
        _ => eprintln!("==> {}", event.detail),
    };
    let report = restore::run(
        config,
        &SystemRunner,
        &PgConnector,
        &RestoreRequest {
            archive: &archive,
            addon: addon.as_deref(),
            mode,
        },
        &mut render,
    )
    .map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) })?;

    println!("Restored '{}' from {archive}", config.database.name);
    if let Some(addon) = &addon {
        println!("  Addon directory restored from {addon}");
    }
    match &report.neutralization {
        Some(stats) => println!(
            "  Neutralized: {} statements applied, {} skipped",
            stats.applied,
            stats.skipped.len()
        ),
        None => println!("  Neutralization skipped (move)"),
    }
    Ok(())
}

fn select_database_archive(
    listing: &ArchiveListing,
) -> Result<String, Box<dyn std::error::Error>> {
    if !std::io::stdin().is_terminal() {
        return Err(
            "no archive given; pass a database archive name in non-interactive mode".into(),
        );
    }
    if listing.databases.is_empty() {
        return Err("no database archives found".into());
    }
    // Newest first.
    let choices: Vec<String> = listing
        .databases
        .iter()
        .rev()
        .map(|a| a.file_name().to_string())
        .collect();
    let index = prompt::select("Select the database archive to restore:", &choices, 0)?;
    Ok(choices[index].clone())
}

/// Offer the addon archives of the selected database, preselecting the one
/// taken in the same run.
fn select_addon_archive(
    listing: &ArchiveListing,
    database_archive: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let Some(selected) = ArchiveName::parse(database_archive) else {
        return Ok(None);
    };
    let mut candidates: Vec<&ArchiveName> = listing.addons_for(selected.database()).collect();
    if candidates.is_empty() {
        return Ok(None);
    }
    candidates.reverse();

    let mut choices: Vec<String> = candidates
        .iter()
        .map(|a| a.file_name().to_string())
        .collect();
    choices.push("none".to_string());
    let default = candidates
        .iter()
        .position(|a| a.prefix() == selected.prefix())
        .unwrap_or(choices.len() - 1);

    let index = prompt::select("Select the addon archive to restore:", &choices, default)?;
    Ok((index < candidates.len()).then(|| choices[index].clone()))
}
