use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::defaults::*;
use crate::db::ConnectionDescriptor;

/// Fully resolved configuration for one Odoo deployment.
#[derive(Debug, Clone)]
pub struct OdaConfig {
    /// Flat directory holding database and addon archives.
    pub backups_dir: PathBuf,
    pub database: DatabaseConfig,
    /// Odoo data directory. The filestore of database `db` is `<data_dir>/filestore/<db>`.
    pub data_dir: PathBuf,
    /// Addon directories archived and restored as addon archives.
    pub addons: Vec<PathBuf>,
    pub compression: Compression,
    pub retention: RetentionConfig,
    pub service: ServiceConfig,
    pub release: Option<ReleaseConfig>,
    pub tools: ToolsConfig,
}

impl OdaConfig {
    /// A fresh connection descriptor for the configured database.
    pub fn connection(&self) -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: self.database.host.clone(),
            port: self.database.port,
            database: self.database.name.clone(),
            user: self.database.user.clone(),
            password: self.database.password.clone(),
            template: Some(self.database.template.clone()),
        }
    }

    /// Filestore directory of the configured database.
    pub fn filestore_dir(&self) -> PathBuf {
        self.data_dir.join("filestore").join(&self.database.name)
    }

    /// The configured addon root whose basename is `addon`.
    pub fn addon_root(&self, addon: &str) -> Option<&Path> {
        self.addons
            .iter()
            .find(|p| p.file_name().is_some_and(|n| n == addon))
            .map(PathBuf::as_path)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub template: String,
    /// Role that owns the database created on restore.
    pub owner: String,
}

/// Compression applied by `tar` when writing archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Zstd,
    Gzip,
    None,
}

impl Compression {
    pub fn extension(self) -> &'static str {
        match self {
            Compression::Zstd => ".tar.zst",
            Compression::Gzip => ".tar.gz",
            Compression::None => ".tar",
        }
    }

    /// `tar` flag selecting the compressor, if any.
    pub fn tar_flag(self) -> Option<&'static str> {
        match self {
            Compression::Zstd => Some("--zstd"),
            Compression::Gzip => Some("--gzip"),
            Compression::None => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub compression: Compression,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Archives kept per database (and per addon) when trimming.
    #[serde(default = "default_keep")]
    pub keep: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep: default_keep(),
        }
    }
}

/// Shell commands that stop and start the application server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub stop: Option<String>,
    pub start: Option<String>,
}

/// Release metadata written into the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseConfig {
    pub version: String,
    pub major_version: String,
    #[serde(default)]
    pub version_info: Vec<serde_json::Value>,
}

/// External binaries, overridable for non-standard installs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    #[serde(default = "default_pg_dump")]
    pub pg_dump: String,
    #[serde(default = "default_psql")]
    pub psql: String,
    #[serde(default = "default_dropdb")]
    pub dropdb: String,
    #[serde(default = "default_createdb")]
    pub createdb: String,
    #[serde(default = "default_tar")]
    pub tar: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pg_dump: default_pg_dump(),
            psql: default_psql(),
            dropdb: default_dropdb(),
            createdb: default_createdb(),
            tar: default_tar(),
        }
    }
}
