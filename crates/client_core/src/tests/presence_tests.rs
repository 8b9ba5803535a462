use std::collections::HashMap;

use super::*;

fn entry(id: &str, name: &str) -> PresenceEntry {
    PresenceEntry {
        user_id: UserId::new(id),
        username: name.to_string(),
    }
}

fn directory_row(id: &str, name: &str) -> DirectoryEntry {
    DirectoryEntry {
        user_id: UserId::new(id),
        username: name.to_string(),
    }
}

#[test]
fn snapshot_rebuild_ignores_prior_snapshots() {
    let first = rebuild_online(&[entry("u1", "alice"), entry("u2", "bob")]);
    let second = rebuild_online(&[entry("u3", "carol")]);

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert_eq!(second.get(&UserId::new("u3")), Some(&"carol".to_string()));
    assert!(!second.contains_key(&UserId::new("u1")));
}

#[test]
fn duplicate_logins_collapse_last_write_wins() {
    let online = rebuild_online(&[
        entry("u1", "alice-laptop"),
        entry("u2", "bob"),
        entry("u1", "alice-phone"),
    ]);

    assert_eq!(online.len(), 2);
    assert_eq!(
        online.get(&UserId::new("u1")),
        Some(&"alice-phone".to_string())
    );
}

#[test]
fn repeated_snapshot_is_idempotent() {
    let snapshot = [entry("u1", "alice"), entry("u2", "bob")];
    let once = rebuild_online(&snapshot);
    let twice = rebuild_online(&snapshot);
    assert_eq!(once, twice);
}

#[test]
fn online_roster_excludes_self() {
    let online = rebuild_online(&[entry("me", "self"), entry("u1", "alice")]);
    let roster = online_roster(&online, &UserId::new("me"));

    assert_eq!(roster, vec![entry("u1", "alice")]);
}

#[test]
fn offline_is_directory_minus_online_minus_self() {
    let directory: Vec<DirectoryEntry> = (1..=10)
        .map(|n| directory_row(&format!("u{n}"), &format!("user{n:02}")))
        .collect();
    // Three online users, one of them being self.
    let online = rebuild_online(&[
        entry("u1", "user01"),
        entry("u2", "user02"),
        entry("u3", "user03"),
    ]);
    let self_id = UserId::new("u3");

    let offline = derive_offline(&directory, &online, &self_id);

    assert_eq!(offline.len(), 6);
    for row in &offline {
        assert_ne!(row.user_id, self_id);
        assert!(!online.contains_key(&row.user_id));
    }
}

#[test]
fn offline_recompute_is_input_order_independent() {
    let directory = vec![
        directory_row("u1", "alice"),
        directory_row("u2", "bob"),
        directory_row("u3", "carol"),
    ];
    let self_id = UserId::new("u1");

    // Directory first, then presence.
    let online_after = rebuild_online(&[entry("u2", "bob")]);
    let from_directory_first = derive_offline(&directory, &online_after, &self_id);

    // Presence first, then directory: same inputs, same output.
    let online_before = rebuild_online(&[entry("u2", "bob")]);
    let from_presence_first = derive_offline(&directory, &online_before, &self_id);

    assert_eq!(from_directory_first, from_presence_first);
    assert_eq!(from_directory_first, vec![directory_row("u3", "carol")]);
}

#[test]
fn everyone_offline_when_snapshot_is_empty() {
    let directory = vec![directory_row("u1", "alice"), directory_row("u2", "bob")];
    let offline = derive_offline(&directory, &HashMap::new(), &UserId::new("u9"));
    assert_eq!(offline.len(), 2);
}
