use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;

use crate::timestamp::parse_prefix;

/// Separator between the prefix, database and addon segments of an archive name.
pub const DELIMITER: &str = "__";

/// Archive suffixes stripped before the last segment is read. Longest first.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".tar.zst", ".tar.gz", ".tgz", ".tar"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArchiveKind {
    /// `<prefix>__<db>.<ext>`: SQL dump, filestore and manifest.
    Database,
    /// `<prefix>__<db>__<addon>.<ext>`: one addon directory.
    Addon,
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveKind::Database => f.write_str("database"),
            ArchiveKind::Addon => f.write_str("addon"),
        }
    }
}

/// A classified archive file name.
///
/// The grammar is `prefix__db[__addon][.ext]`. Splitting the file name on
/// [`DELIMITER`] must yield exactly two segments for a database archive and
/// exactly three for an addon archive; every other count is rejected.
/// Ordering compares the raw file name, which is chronological because the
/// prefix is a fixed-width timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArchiveName {
    file_name: String,
    prefix: String,
    database: String,
    addon: Option<String>,
}

impl ArchiveName {
    /// Classify a file name. Total: returns `None` for anything outside the grammar.
    pub fn parse(file_name: &str) -> Option<Self> {
        let segments: Vec<&str> = file_name.split(DELIMITER).collect();
        match segments.as_slice() {
            [prefix, database] => Some(Self {
                file_name: file_name.to_string(),
                prefix: (*prefix).to_string(),
                database: strip_extension(database).to_string(),
                addon: None,
            }),
            [prefix, database, addon] => Some(Self {
                file_name: file_name.to_string(),
                prefix: (*prefix).to_string(),
                database: (*database).to_string(),
                addon: Some(strip_extension(addon).to_string()),
            }),
            _ => None,
        }
    }

    /// File name for a database archive, e.g. `2024_01_15_10_30_00__mycompany.tar.zst`.
    pub fn database_file_name(prefix: &str, database: &str, extension: &str) -> String {
        format!("{prefix}{DELIMITER}{database}{extension}")
    }

    /// File name for an addon archive.
    pub fn addon_file_name(prefix: &str, database: &str, addon: &str, extension: &str) -> String {
        format!("{prefix}{DELIMITER}{database}{DELIMITER}{addon}{extension}")
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn addon(&self) -> Option<&str> {
        self.addon.as_deref()
    }

    pub fn kind(&self) -> ArchiveKind {
        if self.addon.is_some() {
            ArchiveKind::Addon
        } else {
            ArchiveKind::Database
        }
    }

    /// Timestamp encoded in the prefix, if it is well formed.
    pub fn taken_at(&self) -> Option<NaiveDateTime> {
        parse_prefix(&self.prefix)
    }
}

impl PartialOrd for ArchiveName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArchiveName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.file_name.cmp(&other.file_name)
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

fn strip_extension(segment: &str) -> &str {
    ARCHIVE_EXTENSIONS
        .iter()
        .find_map(|ext| segment.strip_suffix(ext))
        .unwrap_or(segment)
}
