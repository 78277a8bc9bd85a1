pub(super) fn default_db_host() -> String {
    "localhost".to_string()
}

pub(super) fn default_db_port() -> u16 {
    5432
}

pub(super) fn default_template() -> String {
    "template0".to_string()
}

pub(super) fn default_data_dir() -> String {
    "/opt/odoo/data".to_string()
}

pub(super) fn default_keep() -> usize {
    10
}

pub(super) fn default_pg_dump() -> String {
    "pg_dump".to_string()
}

pub(super) fn default_psql() -> String {
    "psql".to_string()
}

pub(super) fn default_dropdb() -> String {
    "dropdb".to_string()
}

pub(super) fn default_createdb() -> String {
    "createdb".to_string()
}

pub(super) fn default_tar() -> String {
    "tar".to_string()
}
