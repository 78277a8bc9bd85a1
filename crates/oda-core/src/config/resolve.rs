use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::defaults::*;
use super::odoo_conf::{read_odoo_conf, OdooConf};
use super::types::*;
use super::util::expand_tilde;
use crate::error::{OdaError, Result};

/// The `database:` section. Every field may instead come from `odoo_conf`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatabaseSection {
    odoo_conf: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    name: Option<String>,
    user: Option<String>,
    password: Option<String>,
    template: Option<String>,
    owner: Option<String>,
}

/// Intermediate deserialization struct for the YAML config file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    backups_dir: String,
    #[serde(default)]
    database: DatabaseSection,
    data_dir: Option<String>,
    #[serde(default)]
    addons: Vec<String>,
    #[serde(default)]
    archive: ArchiveConfig,
    #[serde(default)]
    retention: RetentionConfig,
    #[serde(default)]
    service: ServiceConfig,
    release: Option<ReleaseConfig>,
    #[serde(default)]
    tools: ToolsConfig,
}

/// Expand `${VAR}` and `${VAR:-default}` placeholders in raw config text.
fn expand_env_placeholders(input: &str, path: &Path) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0usize;

    while let Some(offset) = input[cursor..].find("${") {
        let start = cursor + offset;
        out.push_str(&input[cursor..start]);

        let token_start = start + 2;
        let Some(token_end_rel) = input[token_start..].find('}') else {
            return Err(config_expand_error(
                path,
                input,
                start,
                "unterminated environment placeholder",
            ));
        };
        let token_end = token_start + token_end_rel;
        let token = &input[token_start..token_end];
        out.push_str(&resolve_env_token(token, path, input, start)?);
        cursor = token_end + 1;
    }

    out.push_str(&input[cursor..]);
    Ok(out)
}

fn resolve_env_token(token: &str, path: &Path, input: &str, start: usize) -> Result<String> {
    let (name, default) = match token.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (token, None),
    };

    if !is_valid_env_var_name(name) {
        return Err(config_expand_error(
            path,
            input,
            start,
            format!("invalid environment placeholder '{token}'"),
        ));
    }

    match (std::env::var(name), default) {
        (Ok(value), Some(default)) if value.is_empty() => Ok(default.to_string()),
        (Ok(value), _) => Ok(value),
        (Err(std::env::VarError::NotPresent), Some(default)) => Ok(default.to_string()),
        (Err(std::env::VarError::NotPresent), None) => Err(config_expand_error(
            path,
            input,
            start,
            format!("environment variable '{name}' is not set"),
        )),
        (Err(std::env::VarError::NotUnicode(_)), _) => Err(config_expand_error(
            path,
            input,
            start,
            format!("environment variable '{name}' is not valid UTF-8"),
        )),
    }
}

fn is_valid_env_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first == '_' || first.is_ascii_alphabetic()) {
        return false;
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn config_expand_error(
    path: &Path,
    input: &str,
    start: usize,
    message: impl fmt::Display,
) -> OdaError {
    let (line, column) = byte_offset_to_line_col(input, start);
    OdaError::Config(format!(
        "invalid config '{}': {message} at line {line}, column {column}",
        path.display()
    ))
}

fn byte_offset_to_line_col(input: &str, byte_offset: usize) -> (usize, usize) {
    let mut line = 1usize;
    let mut column = 1usize;
    for ch in input[..byte_offset].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// Load, expand and resolve a config file.
pub fn load_config(path: &Path) -> Result<OdaConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| OdaError::Config(format!("cannot read '{}': {e}", path.display())))?;
    parse_config(&contents, path)
}

/// Resolve config text. `path` is only used in error messages.
pub fn parse_config(contents: &str, path: &Path) -> Result<OdaConfig> {
    let expanded = expand_env_placeholders(contents, path)?;
    let raw: ConfigDocument = serde_yaml::from_str(&expanded)
        .map_err(|e| OdaError::Config(format!("invalid config '{}': {e}", path.display())))?;
    resolve_document(raw)
}

fn resolve_document(raw: ConfigDocument) -> Result<OdaConfig> {
    if raw.backups_dir.trim().is_empty() {
        return Err(OdaError::Config("backups_dir must not be empty".into()));
    }

    let odoo = match &raw.database.odoo_conf {
        Some(p) => read_odoo_conf(Path::new(&expand_tilde(p)))?,
        None => OdooConf::default(),
    };
    let db = raw.database;

    let name = db.name.or(odoo.db_name.clone()).ok_or_else(|| {
        OdaError::Config("database.name is not set (neither in the config nor in odoo.conf)".into())
    })?;
    let user = db.user.or(odoo.db_user.clone()).ok_or_else(|| {
        OdaError::Config("database.user is not set (neither in the config nor in odoo.conf)".into())
    })?;
    let owner = db.owner.unwrap_or_else(|| user.clone());

    let database = DatabaseConfig {
        host: db
            .host
            .or(odoo.db_host.clone())
            .unwrap_or_else(default_db_host),
        port: db.port.or(odoo.db_port).unwrap_or_else(default_db_port),
        name,
        user,
        password: db.password.or(odoo.db_password.clone()),
        template: db
            .template
            .or(odoo.db_template.clone())
            .unwrap_or_else(default_template),
        owner,
    };

    let data_dir = raw
        .data_dir
        .or(odoo.data_dir.clone())
        .unwrap_or_else(default_data_dir);

    let addons = if raw.addons.is_empty() {
        odoo.deployment_addon_roots()
    } else {
        raw.addons
    };

    Ok(OdaConfig {
        backups_dir: PathBuf::from(expand_tilde(&raw.backups_dir)),
        database,
        data_dir: PathBuf::from(expand_tilde(&data_dir)),
        addons: addons
            .iter()
            .map(|a| PathBuf::from(expand_tilde(a)))
            .collect(),
        compression: raw.archive.compression,
        retention: raw.retention,
        service: raw.service,
        release: raw.release,
        tools: raw.tools,
    })
}

// --- Config resolution ---

/// Tracks where the config file was found.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Explicitly passed via `--config`.
    CliArg(PathBuf),
    /// Set via the `ODA_CONFIG` env var.
    EnvVar(PathBuf),
    /// Found by searching standard locations.
    SearchOrder { path: PathBuf, level: &'static str },
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::CliArg(p) => p,
            ConfigSource::EnvVar(p) => p,
            ConfigSource::SearchOrder { path, .. } => path,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CliArg(p) => write!(f, "{} (--config)", p.display()),
            ConfigSource::EnvVar(p) => write!(f, "{} (ODA_CONFIG)", p.display()),
            ConfigSource::SearchOrder { path, level } => {
                write!(f, "{} ({})", path.display(), level)
            }
        }
    }
}

/// Returns search locations in priority order: project, user, system.
pub fn default_config_search_paths() -> Vec<(PathBuf, &'static str)> {
    let mut paths = vec![(PathBuf::from("oda.yaml"), "project")];

    let user_config = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|base| base.join("oda").join("config.yaml"));

    if let Some(p) = user_config {
        paths.push((p, "user"));
    }

    paths.push((PathBuf::from("/etc/oda/config.yaml"), "system"));
    paths
}

/// Resolve which config file to use.
///
/// Priority: CLI arg > `ODA_CONFIG` env var > first existing file from search paths.
/// Returns `None` if nothing is found.
pub fn resolve_config_path(cli_config: Option<&str>) -> Option<ConfigSource> {
    if let Some(path) = cli_config {
        return Some(ConfigSource::CliArg(PathBuf::from(path)));
    }

    if let Ok(val) = std::env::var("ODA_CONFIG") {
        if !val.is_empty() {
            return Some(ConfigSource::EnvVar(PathBuf::from(val)));
        }
    }

    default_config_search_paths()
        .into_iter()
        .find(|(path, _)| path.exists())
        .map(|(path, level)| ConfigSource::SearchOrder { path, level })
}

/// Returns a minimal YAML config template suitable for bootstrapping.
pub fn minimal_config_template() -> &'static str {
    r#"# oda configuration file

backups_dir: /opt/odoo/backups

database:
  # Read db_host, db_port, db_name, db_user, db_password, data_dir and
  # addons_path from the server config. Keys set below take precedence.
  odoo_conf: /opt/odoo/conf/odoo.conf
  # name: mycompany
  # user: odoo
  # password: change-me
  # template: template0

# data_dir: /opt/odoo/data

# Addon directories to archive. Defaults to the odoo.conf addons_path
# entries after the two bundled ones.
# addons:
#   - /opt/odoo/custom_addons

# --- Common optional settings (uncomment as needed) ---

# archive:
#   compression: zstd   # zstd | gzip | none
#
# retention:
#   keep: 10
#
# service:
#   stop: sudo systemctl stop odoo.service
#   start: sudo systemctl start odoo.service
"#
}
