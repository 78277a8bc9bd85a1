use std::path::PathBuf;

use thiserror::Error;

use crate::commands::restore::RestoreStage;
use crate::db::SqlError;

pub type Result<T> = std::result::Result<T, OdaError>;

#[derive(Debug, Error)]
pub enum OdaError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("dump of database '{database}' failed: {detail}")]
    DumpFailed { database: String, detail: String },

    #[error("manifest query failed: {0}")]
    ManifestQueryFailed(String),

    #[error("writing archive '{}' failed: {detail}", archive.display())]
    ArchiveWriteFailed { archive: PathBuf, detail: String },

    #[error("{tool} failed ({status}): {stderr}")]
    ExternalTool {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("failed to start {tool}: {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("staging directory already exists: '{}'", .0.display())]
    StagingExists(PathBuf),

    #[error("database error: {0}")]
    Database(#[from] SqlError),

    #[error("neutralize statement '{statement}' failed: {source}")]
    Neutralize {
        statement: &'static str,
        #[source]
        source: SqlError,
    },

    #[error("restore of '{archive}' failed while {stage}: {source}")]
    Restore {
        stage: RestoreStage,
        archive: String,
        #[source]
        source: Box<OdaError>,
    },

    #[error("not a recognised archive name: '{0}'")]
    InvalidArchiveName(String),

    #[error("archive not found: '{0}'")]
    ArchiveNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
