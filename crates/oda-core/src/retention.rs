use std::collections::BTreeMap;

use oda_types::ArchiveName;

use crate::catalog::ArchiveListing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimDecision {
    /// Among the `limit` newest of its group, or outside the trim scope.
    Keep,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimCandidate {
    pub archive: ArchiveName,
    pub decision: TrimDecision,
}

/// Retention group key: the database segment, plus the addon segment for addon archives.
type GroupKey = (String, Option<String>);

/// Decide which archives to delete so each retention group keeps its `limit`
/// newest members.
///
/// Database archives group by database name, addon archives by (database,
/// addon). With `scope_owner`, only groups whose database segment equals it
/// are considered; other groups are left out of the result entirely.
pub fn plan_trim(
    listing: &ArchiveListing,
    limit: usize,
    scope_owner: Option<&str>,
    include_addons: bool,
) -> Vec<TrimCandidate> {
    let mut groups: BTreeMap<GroupKey, Vec<&ArchiveName>> = BTreeMap::new();

    let addons = listing.addons.iter().filter(|_| include_addons);
    for archive in listing.databases.iter().chain(addons) {
        if scope_owner.is_some_and(|owner| archive.database() != owner) {
            continue;
        }
        let key = (
            archive.database().to_string(),
            archive.addon().map(str::to_string),
        );
        groups.entry(key).or_default().push(archive);
    }

    let mut plan = Vec::new();
    for mut members in groups.into_values() {
        members.sort();
        let excess = members.len().saturating_sub(limit);
        for (idx, archive) in members.into_iter().enumerate() {
            let decision = if idx < excess {
                TrimDecision::Delete
            } else {
                TrimDecision::Keep
            };
            plan.push(TrimCandidate {
                archive: archive.clone(),
                decision,
            });
        }
    }
    plan
}
