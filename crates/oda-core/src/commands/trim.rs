use std::io;
use std::path::Path;

use tracing::{debug, info};

use crate::catalog;
use crate::error::{OdaError, Result};
use crate::retention::{plan_trim, TrimDecision};

#[derive(Debug, Clone, Copy)]
pub struct TrimOptions<'a> {
    /// Archives kept per retention group.
    pub limit: usize,
    /// Only trim groups of this database. `None` trims every group.
    pub scope_owner: Option<&'a str>,
    pub include_addons: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimStats {
    pub kept: usize,
    pub deleted: usize,
}

/// Formatted list entry for dry-run and `--list` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimListEntry {
    pub action: &'static str,
    pub archive: String,
}

/// Delete the oldest archives of every retention group beyond `limit`.
/// An archive that vanished before it could be deleted counts as deleted.
pub fn run(dir: &Path, opts: &TrimOptions<'_>) -> Result<(TrimStats, Vec<TrimListEntry>)> {
    if opts.limit == 0 {
        return Err(OdaError::Config(
            "refusing to trim with a limit of 0: every archive would be deleted".into(),
        ));
    }

    let listing = catalog::list(dir, None)?;
    let plan = plan_trim(&listing, opts.limit, opts.scope_owner, opts.include_addons);

    let mut stats = TrimStats::default();
    let mut entries = Vec::with_capacity(plan.len());

    for candidate in plan {
        let file_name = candidate.archive.file_name();
        match candidate.decision {
            TrimDecision::Keep => {
                stats.kept += 1;
                entries.push(TrimListEntry {
                    action: "keep",
                    archive: file_name.to_string(),
                });
            }
            TrimDecision::Delete => {
                if !opts.dry_run {
                    match std::fs::remove_file(dir.join(file_name)) {
                        Ok(()) => info!(archive = %file_name, "deleted archive"),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            debug!(archive = %file_name, "archive already gone");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                stats.deleted += 1;
                entries.push(TrimListEntry {
                    action: "delete",
                    archive: file_name.to_string(),
                });
            }
        }
    }

    Ok((stats, entries))
}
