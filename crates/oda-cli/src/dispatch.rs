use std::time::Instant;

use oda_core::config::OdaConfig;

use crate::cli::Commands;
use crate::cmd;
use crate::cmd::restore::RestoreArgs;
use crate::cmd::trim::TrimArgs;

enum StepResult {
    Ok,
    Failed(String),
    Skipped(&'static str),
}

/// Backup followed by a trim of the configured database.
pub(crate) fn run_default_actions(cfg: &OdaConfig) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut steps: Vec<(&str, StepResult)> = Vec::new();

    eprintln!("==> Starting backup");
    let backup_ok = match cmd::backup::run_backup(cfg, true, false) {
        Ok(()) => {
            steps.push(("backup", StepResult::Ok));
            true
        }
        Err(e) => {
            eprintln!("Error: {e}");
            steps.push(("backup", StepResult::Failed(e.to_string())));
            false
        }
    };

    if !backup_ok {
        steps.push(("trim", StepResult::Skipped("backup failed")));
    } else {
        eprintln!("==> Starting trim");
        match cmd::trim::run_trim(cfg, &TrimArgs::configured_database()) {
            Ok(()) => steps.push(("trim", StepResult::Ok)),
            Err(e) => {
                eprintln!("Error: {e}");
                steps.push(("trim", StepResult::Failed(e.to_string())));
            }
        }
    }

    print_summary(&steps, start)
}

fn print_summary(
    steps: &[(&str, StepResult)],
    start: Instant,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut had_failure = false;

    eprintln!();
    eprintln!("=== Summary ===");
    for (name, result) in steps {
        match result {
            StepResult::Ok => eprintln!("  {name:<12} ok"),
            StepResult::Failed(e) => {
                had_failure = true;
                eprintln!("  {name:<12} FAILED: {e}");
            }
            StepResult::Skipped(reason) => eprintln!("  {name:<12} skipped ({reason})"),
        }
    }

    let secs = start.elapsed().as_secs();
    let mins = secs / 60;
    let secs = secs % 60;
    if mins > 0 {
        eprintln!("  Duration:    {mins}m {secs:02}s");
    } else {
        eprintln!("  Duration:    {secs}s");
    }

    if had_failure {
        Err("one or more steps failed".into())
    } else {
        Ok(())
    }
}

pub(crate) fn dispatch_command(
    command: &Commands,
    cfg: &OdaConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Backup { no_addons, trim } => cmd::backup::run_backup(cfg, !*no_addons, *trim),
        Commands::List { any, filter } => cmd::list::run_list(cfg, *any, filter.as_deref()),
        Commands::Restore {
            archive,
            addon,
            any,
            move_data,
            full,
            yes,
        } => cmd::restore::run_restore(
            cfg,
            &RestoreArgs {
                archive: archive.as_deref(),
                addon: addon.as_deref(),
                any: *any,
                move_data: *move_data,
                full: *full,
                yes: *yes,
            },
        ),
        Commands::Trim {
            limit,
            all,
            no_addons,
            dry_run,
            list,
        } => cmd::trim::run_trim(
            cfg,
            &TrimArgs {
                limit: *limit,
                all: *all,
                include_addons: !*no_addons,
                dry_run: *dry_run,
                list: *list,
            },
        ),
        Commands::Neutralize { full, yes } => cmd::neutralize::run_neutralize(cfg, *full, *yes),
        Commands::Config { .. } => {
            Err("'config' command should be handled before config resolution".into())
        }
    }
}
