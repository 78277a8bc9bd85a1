use std::fmt;
use std::fs;
use std::path::Path;

use oda_types::{ArchiveKind, ArchiveName};
use tracing::{info, warn};

use crate::config::OdaConfig;
use crate::db::{ConnectionDescriptor, SqlConnector};
use crate::error::{OdaError, Result};
use crate::platform::fs::remove_contents;
use crate::platform::shell::{CommandSpec, ProcessRunner};
use crate::tools::{Toolbox, DUMP_MEMBER, FILESTORE_MEMBER, FILESTORE_STRIP_COMPONENTS};

use super::neutralize::{self, NeutralizeStats};

/// Restore progresses strictly forward through these stages. `Failed` is
/// reachable from any non-terminal stage and nothing is rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStage {
    Selecting,
    RestoringAddon,
    Dropping,
    Creating,
    RestoringDump,
    RestoringFilestore,
    Neutralizing,
    MoveSkip,
    Done,
    Failed,
}

impl RestoreStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, RestoreStage::Done | RestoreStage::Failed)
    }
}

impl fmt::Display for RestoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RestoreStage::Selecting => "selecting archives",
            RestoreStage::RestoringAddon => "restoring addon directory",
            RestoreStage::Dropping => "dropping database",
            RestoreStage::Creating => "creating database",
            RestoreStage::RestoringDump => "restoring dump",
            RestoreStage::RestoringFilestore => "restoring filestore",
            RestoreStage::Neutralizing => "neutralizing",
            RestoreStage::MoveSkip => "skipping neutralization",
            RestoreStage::Done => "done",
            RestoreStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Emitted before each stage runs, and once more on `Done` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreEvent {
    pub stage: RestoreStage,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// The copy becomes a second instance: neutralize it.
    Copy { full_strength: bool },
    /// The data is relocated: keep production identity.
    Move,
}

#[derive(Debug, Clone, Copy)]
pub struct AddonRestore<'a> {
    pub archive: &'a Path,
    /// Directory whose contents are replaced by the archive.
    pub target_dir: &'a Path,
}

#[derive(Debug, Clone, Copy)]
pub struct RestorePlan<'a> {
    pub archive: &'a Path,
    pub addon: Option<AddonRestore<'a>>,
    pub target: &'a ConnectionDescriptor,
    pub owner: &'a str,
    /// Database-specific filestore directory, e.g. `<data_dir>/filestore/<db>`.
    pub filestore_dir: &'a Path,
    pub mode: RestoreMode,
}

#[derive(Clone, Copy)]
pub struct RestoreContext<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub connector: &'a dyn SqlConnector,
    pub tools: Toolbox<'a>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Every stage entered, in order, ending with `Done`.
    pub stages: Vec<RestoreStage>,
    pub neutralization: Option<NeutralizeStats>,
}

struct Machine<'p> {
    archive: String,
    report: RestoreReport,
    progress: &'p mut dyn FnMut(&RestoreEvent),
}

impl Machine<'_> {
    fn enter(&mut self, stage: RestoreStage, detail: String) {
        info!(stage = %stage, archive = %self.archive, "{detail}");
        self.report.stages.push(stage);
        (self.progress)(&RestoreEvent { stage, detail });
    }

    fn step<T>(
        &mut self,
        stage: RestoreStage,
        detail: String,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        self.enter(stage, detail);
        f().map_err(|e| {
            self.enter(RestoreStage::Failed, format!("{stage} failed: {e}"));
            OdaError::Restore {
                stage,
                archive: self.archive.clone(),
                source: Box::new(e),
            }
        })
    }
}

/// Restore a database archive, and optionally an addon archive, onto `plan.target`.
///
/// A failure after `Dropping` leaves the target database missing, empty or
/// partially loaded. The returned error names the stage that failed.
pub fn restore(
    ctx: &RestoreContext<'_>,
    plan: &RestorePlan<'_>,
    progress: &mut dyn FnMut(&RestoreEvent),
) -> Result<RestoreReport> {
    let mut machine = Machine {
        archive: plan
            .archive
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| plan.archive.display().to_string()),
        report: RestoreReport::default(),
        progress,
    };
    let database = &plan.target.database;

    let selected = format!("Selected archive {}", machine.archive);
    machine.step(
        RestoreStage::Selecting,
        selected,
        || {
            check_archive(plan.archive, ArchiveKind::Database)?;
            if let Some(addon) = &plan.addon {
                check_archive(addon.archive, ArchiveKind::Addon)?;
            }
            Ok(())
        },
    )?;

    if let Some(addon) = &plan.addon {
        machine.step(
            RestoreStage::RestoringAddon,
            format!("Replacing addon directory {}", addon.target_dir.display()),
            || {
                remove_contents(addon.target_dir)?;
                fs::create_dir_all(addon.target_dir)?;
                ctx.runner
                    .run(&ctx.tools.tar_extract(addon.archive, addon.target_dir))?;
                Ok(())
            },
        )?;
    }

    machine.step(
        RestoreStage::Dropping,
        format!("Dropping database '{database}'"),
        || ctx.runner.run(&ctx.tools.dropdb(plan.target)).map(drop),
    )?;

    machine.step(
        RestoreStage::Creating,
        format!(
            "Creating database '{database}' (template {}, owner {})",
            plan.target.template.as_deref().unwrap_or("default"),
            plan.owner
        ),
        || {
            ctx.runner
                .run(&ctx.tools.createdb(plan.target, plan.owner))
                .map(drop)
        },
    )?;

    machine.step(
        RestoreStage::RestoringDump,
        format!("Streaming dump into '{database}'"),
        || {
            ctx.runner.run_piped(
                &ctx.tools.tar_member_to_stdout(plan.archive, DUMP_MEMBER),
                &ctx.tools.psql(plan.target),
            )
        },
    )?;

    machine.step(
        RestoreStage::RestoringFilestore,
        format!("Replacing filestore {}", plan.filestore_dir.display()),
        || {
            remove_contents(plan.filestore_dir)?;
            fs::create_dir_all(plan.filestore_dir)?;
            let listing = ctx.runner.run(&ctx.tools.tar_list(plan.archive))?;
            if !has_filestore_member(&listing.stdout) {
                info!(
                    archive = %plan.archive.display(),
                    "archive has no filestore, leaving it empty"
                );
                return Ok(());
            }
            ctx.runner
                .run(&ctx.tools.tar_extract_subtree(
                    plan.archive,
                    plan.filestore_dir,
                    FILESTORE_MEMBER,
                    FILESTORE_STRIP_COMPONENTS,
                ))
                .map(drop)
        },
    )?;

    match plan.mode {
        RestoreMode::Copy { full_strength } => {
            let stats = machine.step(
                RestoreStage::Neutralizing,
                format!("Neutralizing '{database}'"),
                || neutralize::run(ctx.connector, plan.target, full_strength),
            )?;
            machine.report.neutralization = Some(stats);
        }
        RestoreMode::Move => {
            machine.enter(
                RestoreStage::MoveSkip,
                "Move requested, keeping production identity".to_string(),
            );
        }
    }

    machine.enter(RestoreStage::Done, format!("Restored '{database}'"));
    Ok(machine.report)
}

/// Whether a `tar --list` listing holds the filestore subtree.
fn has_filestore_member(listing: &[u8]) -> bool {
    String::from_utf8_lossy(listing).lines().any(|line| {
        line.trim_end()
            .strip_prefix(FILESTORE_MEMBER)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

fn check_archive(path: &Path, expected: ArchiveKind) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| OdaError::InvalidArchiveName(path.display().to_string()))?;
    match ArchiveName::parse(file_name) {
        Some(name) if name.kind() == expected => {}
        _ => return Err(OdaError::InvalidArchiveName(file_name.to_string())),
    }
    if !path.is_file() {
        return Err(OdaError::ArchiveNotFound(path.display().to_string()));
    }
    Ok(())
}

/// Operator-level restore request, resolved against the configuration.
#[derive(Debug, Clone, Copy)]
pub struct RestoreRequest<'a> {
    /// Database archive file name inside `backups_dir`.
    pub archive: &'a str,
    /// Addon archive file name inside `backups_dir`.
    pub addon: Option<&'a str>,
    pub mode: RestoreMode,
}

/// Restore onto the configured database, stopping the service first when a
/// stop command is configured. The service is started again only after `Done`.
pub fn run(
    config: &OdaConfig,
    runner: &dyn ProcessRunner,
    connector: &dyn SqlConnector,
    request: &RestoreRequest<'_>,
    progress: &mut dyn FnMut(&RestoreEvent),
) -> Result<RestoreReport> {
    let archive = config.backups_dir.join(request.archive);
    let addon_paths = match request.addon {
        Some(file_name) => {
            let name = ArchiveName::parse(file_name)
                .filter(|n| n.kind() == ArchiveKind::Addon)
                .ok_or_else(|| OdaError::InvalidArchiveName(file_name.to_string()))?;
            let addon = name.addon().unwrap_or_default();
            let target = config.addon_root(addon).ok_or_else(|| {
                OdaError::Config(format!(
                    "no configured addon directory named '{addon}' for archive '{file_name}'"
                ))
            })?;
            Some((config.backups_dir.join(file_name), target.to_path_buf()))
        }
        None => None,
    };

    let conn = config.connection();
    let filestore_dir = config.filestore_dir();
    let plan = RestorePlan {
        archive: &archive,
        addon: addon_paths.as_ref().map(|(archive, target)| AddonRestore {
            archive,
            target_dir: target,
        }),
        target: &conn,
        owner: &config.database.owner,
        filestore_dir: &filestore_dir,
        mode: request.mode,
    };
    let ctx = RestoreContext {
        runner,
        connector,
        tools: Toolbox::new(&config.tools),
    };

    if let Some(stop) = &config.service.stop {
        info!(command = %stop, "stopping service");
        runner.run(&CommandSpec::script(stop))?;
    }

    let report = restore(&ctx, &plan, progress)?;

    if let Some(start) = &config.service.start {
        info!(command = %start, "starting service");
        if let Err(e) = runner.run(&CommandSpec::script(start)) {
            warn!(error = %e, "restore finished but the service did not start");
            return Err(e);
        }
    }
    Ok(report)
}
