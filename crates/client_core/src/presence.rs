//! Roster derivation from presence snapshots.
//!
//! Both partitions are recomputed in full from their current inputs on
//! every change. Rosters are small, so the O(n) rebuild is the intended
//! policy, not a shortcut.

use std::collections::HashMap;

use shared::domain::{DirectoryEntry, PresenceEntry, UserId};

/// Rebuilds the online mapping from scratch from one presence snapshot.
/// Later entries for the same id overwrite earlier ones, which collapses
/// duplicate logins of one account into a single entry.
pub fn rebuild_online(entries: &[PresenceEntry]) -> HashMap<UserId, String> {
    let mut online = HashMap::new();
    for entry in entries {
        online.insert(entry.user_id.clone(), entry.username.clone());
    }
    online
}

/// Online roster as shown to the user: everyone in the mapping except
/// the local user, sorted by username (id breaks ties) so callers see a
/// deterministic order.
pub fn online_roster(online: &HashMap<UserId, String>, self_id: &UserId) -> Vec<PresenceEntry> {
    let mut roster: Vec<PresenceEntry> = online
        .iter()
        .filter(|(user_id, _)| *user_id != self_id)
        .map(|(user_id, username)| PresenceEntry {
            user_id: user_id.clone(),
            username: username.clone(),
        })
        .collect();
    roster.sort_by(|a, b| {
        a.username
            .cmp(&b.username)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    roster
}

/// Offline roster: directory rows that are neither the local user nor a
/// key of the online mapping. Pure function of its two inputs.
pub fn derive_offline(
    directory: &[DirectoryEntry],
    online: &HashMap<UserId, String>,
    self_id: &UserId,
) -> Vec<DirectoryEntry> {
    let mut offline: Vec<DirectoryEntry> = directory
        .iter()
        .filter(|entry| entry.user_id != *self_id && !online.contains_key(&entry.user_id))
        .cloned()
        .collect();
    offline.sort_by(|a, b| {
        a.username
            .cmp(&b.username)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    offline
}

#[cfg(test)]
#[path = "tests/presence_tests.rs"]
mod tests;
