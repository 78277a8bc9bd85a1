use std::path::Path;

use crate::error::{OdaError, Result};

/// Connection and layout settings read from an Odoo server `odoo.conf`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OdooConf {
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_template: Option<String>,
    pub data_dir: Option<String>,
    pub addons_path: Vec<String>,
}

impl OdooConf {
    /// Addon roots owned by the deployment. The first two `addons_path`
    /// entries are the server's bundled addons and are never archived.
    pub fn deployment_addon_roots(&self) -> Vec<String> {
        self.addons_path.iter().skip(2).cloned().collect()
    }
}

pub fn read_odoo_conf(path: &Path) -> Result<OdooConf> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| OdaError::Config(format!("cannot read '{}': {e}", path.display())))?;
    parse_odoo_conf(&text)
        .map_err(|msg| OdaError::Config(format!("invalid odoo.conf '{}': {msg}", path.display())))
}

/// Parse `key = value` lines. Section headers and comments are ignored, and
/// `False` or an empty value leaves the key unset.
pub fn parse_odoo_conf(text: &str) -> std::result::Result<OdooConf, String> {
    let mut conf = OdooConf::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(['#', ';', '[']) {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if value.is_empty() || value == "False" {
            continue;
        }

        match key {
            "db_host" => conf.db_host = Some(value.to_string()),
            "db_port" => {
                let port = value
                    .parse()
                    .map_err(|_| format!("line {}: invalid db_port '{value}'", idx + 1))?;
                conf.db_port = Some(port);
            }
            "db_name" => conf.db_name = Some(value.to_string()),
            "db_user" => conf.db_user = Some(value.to_string()),
            "db_password" => conf.db_password = Some(value.to_string()),
            "db_template" => conf.db_template = Some(value.to_string()),
            "data_dir" => conf.data_dir = Some(value.to_string()),
            "addons_path" => {
                conf.addons_path = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    Ok(conf)
}
