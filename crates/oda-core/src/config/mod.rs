mod defaults;
mod odoo_conf;
mod resolve;
mod types;
mod util;

pub use self::odoo_conf::{parse_odoo_conf, read_odoo_conf, OdooConf};
pub use self::resolve::{
    default_config_search_paths, load_config, minimal_config_template, parse_config,
    resolve_config_path, ConfigSource,
};
pub use self::types::*;
pub use self::util::expand_tilde;
