pub mod archive_name;
pub mod timestamp;

pub use archive_name::{ArchiveKind, ArchiveName, ARCHIVE_EXTENSIONS, DELIMITER};
pub use timestamp::{format_prefix, parse_prefix, PREFIX_FORMAT};
