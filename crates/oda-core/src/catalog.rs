use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use oda_types::{ArchiveKind, ArchiveName};
use tracing::trace;

use crate::error::{OdaError, Result};

/// Archives found in a backups directory, each list sorted oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveListing {
    pub databases: Vec<ArchiveName>,
    pub addons: Vec<ArchiveName>,
}

impl ArchiveListing {
    /// Look up an archive of either kind by exact file name.
    pub fn find(&self, file_name: &str) -> Option<&ArchiveName> {
        self.databases
            .iter()
            .chain(self.addons.iter())
            .find(|a| a.file_name() == file_name)
    }

    /// Addon archives whose database segment is exactly `database`.
    pub fn addons_for<'a>(&'a self, database: &'a str) -> impl Iterator<Item = &'a ArchiveName> {
        self.addons.iter().filter(move |a| a.database() == database)
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty() && self.addons.is_empty()
    }
}

/// Enumerate and classify the archives in `dir` (files only, non-recursive).
///
/// Names outside the archive grammar are skipped. `owner_filter` keeps names
/// that contain it as a substring, so a database whose name is a substring of
/// another's also matches that other database's archives.
pub fn list(dir: &Path, owner_filter: Option<&str>) -> Result<ArchiveListing> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => OdaError::Config(format!(
            "backups directory '{}' does not exist",
            dir.display()
        )),
        _ => OdaError::Io(e),
    })?;

    let mut databases = BTreeSet::new();
    let mut addons = BTreeSet::new();

    for entry in entries {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if owner_filter.is_some_and(|f| !file_name.contains(f)) {
            continue;
        }
        match ArchiveName::parse(&file_name) {
            Some(name) if name.kind() == ArchiveKind::Database => {
                databases.insert(name);
            }
            Some(name) => {
                addons.insert(name);
            }
            None => trace!(file = %file_name, "skipping unrecognised file"),
        }
    }

    Ok(ArchiveListing {
        databases: databases.into_iter().collect(),
        addons: addons.into_iter().collect(),
    })
}
