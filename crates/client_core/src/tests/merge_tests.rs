use super::*;
use shared::domain::UserId;

fn message(id: &str, sender: &str, text: &str) -> MessagePayload {
    MessagePayload {
        id: MessageId::new(id),
        sender_id: UserId::new(sender),
        recipient_id: UserId::new("me"),
        text: Some(text.to_string()),
        file: None,
    }
}

#[test]
fn snapshot_deduplicates_by_id_keeping_first() {
    let mut log = MessageLog::default();
    log.replace(vec![message("m1", "p2", "from history")]);
    log.append(message("m1", "p2", "same id via live event"));
    log.append(message("m2", "p2", "later"));

    let view = log.snapshot();
    assert_eq!(view.len(), 2);
    assert_eq!(view[0].text.as_deref(), Some("from history"));
    assert_eq!(view[1].id, MessageId::new("m2"));
}

#[test]
fn insertion_order_is_preserved() {
    let mut log = MessageLog::default();
    for id in ["a", "b", "c"] {
        log.append(message(id, "p2", id));
    }

    let ids: Vec<String> = log.snapshot().into_iter().map(|m| m.id.0).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn replace_discards_previous_entries() {
    let mut log = MessageLog::default();
    log.append(message("old", "p2", "stale"));
    log.replace(vec![message("new", "p2", "fresh")]);

    let view = log.snapshot();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].id, MessageId::new("new"));
}

#[test]
fn provisional_ids_are_namespaced_and_unique() {
    let first = provisional_id();
    let second = provisional_id();

    assert!(first.0.starts_with("local-"));
    assert!(second.0.starts_with("local-"));
    assert_ne!(first, second);
}
