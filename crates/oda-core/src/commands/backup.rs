use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use oda_types::{format_prefix, ArchiveName};
use tracing::{info, warn};

use crate::config::{Compression, OdaConfig, ReleaseConfig};
use crate::db::{self, ConnectionDescriptor, SqlConnector};
use crate::error::{OdaError, Result};
use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::platform::fs::{copy_tree, is_empty_dir};
use crate::platform::shell::ProcessRunner;
use crate::tools::Toolbox;

/// External collaborators used while building archives.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub connector: &'a dyn SqlConnector,
    pub tools: Toolbox<'a>,
    pub compression: Compression,
}

/// Inputs for one database archive.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseArchiveRequest<'a> {
    pub conn: &'a ConnectionDescriptor,
    /// Data directory; the database's filestore is `<root>/filestore/<db>`.
    pub filestore_root: &'a Path,
    pub destination_dir: &'a Path,
    pub prefix: &'a str,
    pub release: Option<&'a ReleaseConfig>,
}

/// Produce `<prefix>__<db><ext>` holding `dump.sql`, `filestore/` and `manifest.json`.
///
/// Everything is staged in `<destination>/<prefix>__<db>`, which is removed
/// on every exit path. A staging cleanup failure never replaces an earlier error.
pub fn build_database_archive(
    ctx: &BuildContext<'_>,
    req: &DatabaseArchiveRequest<'_>,
) -> Result<PathBuf> {
    let database = &req.conn.database;
    fs::create_dir_all(req.destination_dir)?;

    let staging = req
        .destination_dir
        .join(ArchiveName::database_file_name(req.prefix, database, ""));
    match fs::create_dir(&staging) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(OdaError::StagingExists(staging));
        }
        Err(e) => return Err(e.into()),
    }

    let result = stage_and_pack(ctx, req, &staging);

    if let Err(e) = fs::remove_dir_all(&staging) {
        warn!(staging = %staging.display(), error = %e, "failed to remove staging directory");
    }
    result
}

fn stage_and_pack(
    ctx: &BuildContext<'_>,
    req: &DatabaseArchiveRequest<'_>,
    staging: &Path,
) -> Result<PathBuf> {
    let database = &req.conn.database;
    let archive = req.destination_dir.join(ArchiveName::database_file_name(
        req.prefix,
        database,
        ctx.compression.extension(),
    ));

    info!(database = %database, "dumping database");
    ctx.runner
        .run(&ctx.tools.pg_dump(req.conn, &staging.join("dump.sql")))
        .map_err(|e| OdaError::DumpFailed {
            database: database.clone(),
            detail: e.to_string(),
        })?;

    let source_filestore = req.filestore_root.join("filestore").join(database);
    let staged_filestore = staging.join("filestore");
    if source_filestore.is_dir() {
        info!(source = %source_filestore.display(), "copying filestore");
        let files = copy_tree(&source_filestore, &staged_filestore).map_err(|e| {
            OdaError::ArchiveWriteFailed {
                archive: archive.clone(),
                detail: format!("copying filestore: {e}"),
            }
        })?;
        info!(files, "filestore copied");
    } else {
        info!(source = %source_filestore.display(), "no filestore found, archiving an empty one");
        fs::create_dir(&staged_filestore)?;
    }

    let manifest = db::with_session(ctx.connector, req.conn, |session| {
        Manifest::query(session, database, req.release)
    })
    .map_err(|e| match e {
        OdaError::ManifestQueryFailed(_) => e,
        other => OdaError::ManifestQueryFailed(other.to_string()),
    })?;
    manifest
        .write(&staging.join(MANIFEST_FILE))
        .map_err(|e| OdaError::ArchiveWriteFailed {
            archive: archive.clone(),
            detail: format!("writing manifest: {e}"),
        })?;

    write_archive(ctx, &archive, staging)?;
    Ok(archive)
}

/// Archive the full contents of `addon_dir` as `<prefix>__<db>__<basename><ext>`.
/// Returns `None` when the directory is empty or missing.
pub fn build_addon_archive(
    ctx: &BuildContext<'_>,
    addon_dir: &Path,
    destination_dir: &Path,
    prefix: &str,
    database: &str,
) -> Result<Option<PathBuf>> {
    if is_empty_dir(addon_dir)? {
        info!(addon = %addon_dir.display(), "addon directory empty, skipping");
        return Ok(None);
    }
    let addon = addon_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            OdaError::Config(format!(
                "addon directory '{}' has no usable name",
                addon_dir.display()
            ))
        })?;

    fs::create_dir_all(destination_dir)?;
    let archive = destination_dir.join(ArchiveName::addon_file_name(
        prefix,
        database,
        addon,
        ctx.compression.extension(),
    ));
    info!(addon = %addon, archive = %archive.display(), "archiving addon directory");
    write_archive(ctx, &archive, addon_dir)?;
    Ok(Some(archive))
}

/// Run tar; a partially written archive is removed so it never shows up in listings.
fn write_archive(ctx: &BuildContext<'_>, archive: &Path, contents: &Path) -> Result<()> {
    let spec = ctx.tools.tar_create(archive, contents, ctx.compression);
    if let Err(e) = ctx.runner.run(&spec) {
        if let Err(rm) = fs::remove_file(archive) {
            if rm.kind() != io::ErrorKind::NotFound {
                warn!(archive = %archive.display(), error = %rm, "failed to remove partial archive");
            }
        }
        return Err(OdaError::ArchiveWriteFailed {
            archive: archive.to_path_buf(),
            detail: e.to_string(),
        });
    }
    Ok(())
}

/// What a full backup run produced.
#[derive(Debug, Clone, Default)]
pub struct BackupReport {
    pub prefix: String,
    pub database_archive: PathBuf,
    pub addon_archives: Vec<PathBuf>,
    pub skipped_addons: Vec<PathBuf>,
}

/// Archive the configured database and, when `include_addons`, each configured addon root.
pub fn run<Tz: TimeZone>(
    config: &OdaConfig,
    runner: &dyn ProcessRunner,
    connector: &dyn SqlConnector,
    now: &DateTime<Tz>,
    include_addons: bool,
) -> Result<BackupReport>
where
    Tz::Offset: std::fmt::Display,
{
    let ctx = BuildContext {
        runner,
        connector,
        tools: Toolbox::new(&config.tools),
        compression: config.compression,
    };
    let prefix = format_prefix(now);
    let conn = config.connection();

    let database_archive = build_database_archive(
        &ctx,
        &DatabaseArchiveRequest {
            conn: &conn,
            filestore_root: &config.data_dir,
            destination_dir: &config.backups_dir,
            prefix: &prefix,
            release: config.release.as_ref(),
        },
    )?;
    info!(archive = %database_archive.display(), "database archive written");

    let mut report = BackupReport {
        prefix,
        database_archive,
        ..Default::default()
    };

    if include_addons {
        for addon_dir in &config.addons {
            match build_addon_archive(
                &ctx,
                addon_dir,
                &config.backups_dir,
                &report.prefix,
                &conn.database,
            )? {
                Some(path) => report.addon_archives.push(path),
                None => report.skipped_addons.push(addon_dir.clone()),
            }
        }
    }

    Ok(report)
}
