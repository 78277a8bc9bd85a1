use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ReleaseConfig;
use crate::db::SqlSession;
use crate::error::{OdaError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

const SERVER_VERSION_SQL: &str = "SHOW server_version_num";
const INSTALLED_MODULES_SQL: &str =
    "SELECT name::text, latest_version::text FROM ir_module_module WHERE state = 'installed'";

/// Informational sidecar stored at the root of a database archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub odoo_dump: String,
    pub db_name: String,
    pub version: String,
    pub version_info: Vec<serde_json::Value>,
    pub major_version: String,
    pub pg_version: String,
    pub modules: BTreeMap<String, String>,
}

impl Manifest {
    /// Query the live database for server version and installed modules.
    ///
    /// Release fields come from `release` when configured, otherwise from the
    /// installed `base` module version.
    pub fn query(
        session: &mut dyn SqlSession,
        db_name: &str,
        release: Option<&ReleaseConfig>,
    ) -> Result<Self> {
        let version_rows = session
            .query_rows(SERVER_VERSION_SQL)
            .map_err(|e| OdaError::ManifestQueryFailed(format!("server version: {e}")))?;
        let version_num = version_rows
            .first()
            .and_then(|row| row.first().cloned().flatten())
            .and_then(|v| v.trim().parse::<u32>().ok())
            .ok_or_else(|| {
                OdaError::ManifestQueryFailed("server_version_num returned no number".into())
            })?;

        let module_rows = session
            .query_rows(INSTALLED_MODULES_SQL)
            .map_err(|e| OdaError::ManifestQueryFailed(format!("installed modules: {e}")))?;
        let modules: BTreeMap<String, String> = module_rows
            .into_iter()
            .filter_map(|row| {
                let mut cols = row.into_iter();
                let name = cols.next().flatten()?;
                let version = cols.next().flatten().unwrap_or_default();
                Some((name, version))
            })
            .collect();

        let release = match release {
            Some(r) => r.clone(),
            None => release_from_base(modules.get("base").map(String::as_str)),
        };

        Ok(Self {
            odoo_dump: "1".to_string(),
            db_name: db_name.to_string(),
            version: release.version,
            version_info: release.version_info,
            major_version: release.major_version,
            pg_version: pg_version(version_num),
            modules,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| OdaError::Other(format!("serializing manifest: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// `"<major>.<minor>"` from `server_version_num` (e.g. 160002 -> "16.0").
pub fn pg_version(server_version_num: u32) -> String {
    let hundreds = server_version_num / 100;
    format!("{}.{}", hundreds / 100, hundreds % 100)
}

/// Derive release metadata from the `base` module version (`17.0.1.3` -> `17.0`).
fn release_from_base(base_version: Option<&str>) -> ReleaseConfig {
    let Some((major, minor)) = base_version.and_then(|v| {
        let mut parts = v.split('.');
        Some((parts.next()?, parts.next()?))
    }) else {
        warn!("base module version unavailable; manifest release fields left empty");
        return ReleaseConfig {
            version: String::new(),
            major_version: String::new(),
            version_info: Vec::new(),
        };
    };

    let component = |s: &str| {
        s.parse::<u64>()
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::from(s))
    };
    let series = format!("{major}.{minor}");
    ReleaseConfig {
        version: series.clone(),
        major_version: series,
        version_info: vec![
            component(major),
            component(minor),
            serde_json::Value::from(0),
            serde_json::Value::from("final"),
            serde_json::Value::from(0),
        ],
    }
}
