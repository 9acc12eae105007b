//! Listener contract: initial snapshot, local-then-remote ordering, remote-only
//! events for external changes, and diff suppression.

use std::sync::Arc;

use overlay_db::{
    EventOrigin, FieldValue, MutationResult, Precondition, TransformOperation, WriteAck,
};

use super::support::*;

#[tokio::test]
async fn initial_snapshot_is_delivered_for_a_missing_document() {
    let transport = RecordingTransport::new();
    let client = new_client(transport);
    let log = EventLog::new();

    let _unsub = client.listen(&doc("nothing"), log.sink()).unwrap();

    let events = log.events();
    assert_eq!(events.len(), 1, "a listener never waits for its first event");
    assert!(!events[0].snapshot.exists());
    assert!(!events[0].snapshot.has_pending_writes);
    assert!(events[0].snapshot.is_from_cache);
}

#[tokio::test]
async fn create_with_array_union_delivers_local_then_remote() {
    let transport = RecordingTransport::new();
    let client = new_client(Arc::clone(&transport));
    let key = doc("eros");
    let log = EventLog::new();
    let _unsub = client.listen(&key, log.sink()).unwrap();

    let mutation = set_transforms(
        &key,
        &[("array", TransformOperation::ArrayUnion(ints(&[1, 2])))],
    );
    let handle = client.write(vec![mutation]).await.unwrap();
    assert!(handle.transform_errors.is_empty());

    // Local event: optimistic estimate, pending writes flagged.
    {
        let events = log.events();
        assert_eq!(events.len(), 2);
        let local = &events[1];
        assert_eq!(local.origin, EventOrigin::Local);
        assert_eq!(field(&local.snapshot, "array"), Some(int_array(&[1, 2])));
        assert!(local.snapshot.has_pending_writes);
    }

    let batch_id = transport.batches()[0].batch_id;
    client
        .apply_ack(batch_id, vec![server_result(&[("array", int_array(&[1, 2]))])], 1)
        .unwrap();

    // Remote event: acknowledged view, pending flag dropped.
    let events = log.events();
    assert_eq!(events.len(), 3);
    let remote = &events[2];
    assert_eq!(remote.origin, EventOrigin::Remote);
    assert_eq!(field(&remote.snapshot, "array"), Some(int_array(&[1, 2])));
    assert!(!remote.snapshot.has_pending_writes);
    assert!(!remote.snapshot.is_from_cache);
    assert_eq!(remote.snapshot.version, 1);

    assert_eq!(
        handle.wait().await.unwrap(),
        WriteAck::Acknowledged { version: 1 }
    );
}

#[tokio::test]
async fn sequential_writes_alternate_local_remote_in_enqueue_order() {
    let transport = RecordingTransport::new();
    let client = new_client(Arc::clone(&transport));
    let key = doc("eros");
    let log = EventLog::new();
    let _unsub = client.listen(&key, log.sink()).unwrap();

    for round in 1..=3i64 {
        let mutation = set_fields(&key, &[("n", FieldValue::Integer(round))]);
        let handle = client.write(vec![mutation]).await.unwrap();
        client
            .apply_ack(handle.batch_id, vec![MutationResult::default()], round)
            .unwrap();
    }

    let origins = log.origins();
    assert_eq!(
        origins,
        vec![
            EventOrigin::Remote, // initial snapshot
            EventOrigin::Local,
            EventOrigin::Remote,
            EventOrigin::Local,
            EventOrigin::Remote,
            EventOrigin::Local,
            EventOrigin::Remote,
        ]
    );

    // Each pair carries that round's data.
    let events = log.events();
    for round in 1..=3i64 {
        let local = &events[(round as usize) * 2 - 1];
        let remote = &events[(round as usize) * 2];
        assert_eq!(field(&local.snapshot, "n"), Some(FieldValue::Integer(round)));
        assert_eq!(field(&remote.snapshot, "n"), Some(FieldValue::Integer(round)));
        assert!(local.snapshot.has_pending_writes);
        assert!(!remote.snapshot.has_pending_writes);
    }
}

#[tokio::test]
async fn union_on_acknowledged_base_does_not_duplicate_elements() {
    let transport = RecordingTransport::new();
    let client = new_client(Arc::clone(&transport));
    let key = doc("eros");

    client
        .apply_remote_change(&key, Some(object(&[("array", int_array(&[1, 2]))])), 1)
        .unwrap();

    let mutation = patch_transforms(
        &key,
        &[("array", TransformOperation::ArrayUnion(ints(&[2, 3])))],
        Precondition::Exists,
    );
    client.write(vec![mutation]).await.unwrap();

    let snapshot = client.snapshot(&key).unwrap();
    assert_eq!(field(&snapshot, "array"), Some(int_array(&[1, 2, 3])));
    assert!(snapshot.has_pending_writes);
}

#[tokio::test]
async fn array_remove_on_unknown_base_estimates_empty_then_takes_server_residual() {
    let transport = RecordingTransport::new();
    let client = new_client(Arc::clone(&transport));
    let key = doc("eros");
    let log = EventLog::new();
    let _unsub = client.listen(&key, log.sink()).unwrap();

    let mutation = patch_transforms(
        &key,
        &[("array", TransformOperation::ArrayRemove(ints(&[2])))],
        Precondition::None,
    );
    let handle = client.write(vec![mutation]).await.unwrap();

    let local = &log.events()[1];
    assert_eq!(field(&local.snapshot, "array"), Some(int_array(&[])));

    // The server had [1, 2, 3]; the true residual is [1, 3].
    client
        .apply_ack(
            handle.batch_id,
            vec![server_result(&[("array", int_array(&[1, 3]))])],
            1,
        )
        .unwrap();

    let remote = &log.events()[2];
    assert_eq!(remote.origin, EventOrigin::Remote);
    assert_eq!(field(&remote.snapshot, "array"), Some(int_array(&[1, 3])));
}

#[tokio::test]
async fn external_change_delivers_a_single_remote_event() {
    let transport = RecordingTransport::new();
    let client = new_client(transport);
    let key = doc("eros");
    let log = EventLog::new();
    let _unsub = client.listen(&key, log.sink()).unwrap();

    client
        .apply_remote_change(&key, Some(object(&[("n", FieldValue::Integer(5))])), 1)
        .unwrap();

    let events = log.events();
    assert_eq!(events.len(), 2, "external changes produce exactly one event");
    assert_eq!(events[1].origin, EventOrigin::Remote);
    assert_eq!(field(&events[1].snapshot, "n"), Some(FieldValue::Integer(5)));
    assert!(!events[1].snapshot.has_pending_writes);
}

#[tokio::test]
async fn identical_remote_redelivery_is_suppressed() {
    let transport = RecordingTransport::new();
    let client = new_client(transport);
    let key = doc("eros");
    let log = EventLog::new();
    let _unsub = client.listen(&key, log.sink()).unwrap();

    let data = object(&[("n", FieldValue::Integer(5))]);
    client.apply_remote_change(&key, Some(data.clone()), 1).unwrap();
    assert_eq!(log.len(), 2);

    // Same contents at a newer version: no field changed, no flag changed.
    client.apply_remote_change(&key, Some(data), 2).unwrap();
    assert_eq!(log.len(), 2, "a view identical to the last delivered one emits nothing");
}

#[tokio::test]
async fn stale_remote_change_is_ignored() {
    let transport = RecordingTransport::new();
    let client = new_client(transport);
    let key = doc("eros");
    let log = EventLog::new();
    let _unsub = client.listen(&key, log.sink()).unwrap();

    client
        .apply_remote_change(&key, Some(object(&[("n", FieldValue::Integer(9))])), 4)
        .unwrap();
    client.apply_remote_change(&key, None, 2).unwrap();

    assert_eq!(log.len(), 2);
    let snapshot = client.snapshot(&key).unwrap();
    assert_eq!(field(&snapshot, "n"), Some(FieldValue::Integer(9)));
    assert_eq!(snapshot.version, 4);
}

#[tokio::test]
async fn rejection_reverts_the_optimistic_view() {
    let transport = RecordingTransport::new();
    let client = new_client(Arc::clone(&transport));
    let key = doc("eros");
    let log = EventLog::new();
    let _unsub = client.listen(&key, log.sink()).unwrap();

    let mutation = set_fields(&key, &[("title", FieldValue::String("draft".into()))]);
    let handle = client.write(vec![mutation]).await.unwrap();
    assert!(log.events()[1].snapshot.exists());

    client
        .apply_rejection(handle.batch_id, "permission denied")
        .unwrap();

    let events = log.events();
    assert_eq!(events.len(), 3);
    let reverted = &events[2];
    assert_eq!(reverted.origin, EventOrigin::Remote);
    assert!(!reverted.snapshot.exists(), "the optimistic effect disappears");
    assert!(!reverted.snapshot.has_pending_writes);

    // The reason reaches the originating caller only.
    assert_eq!(
        handle.wait().await.unwrap(),
        WriteAck::Rejected {
            reason: "permission denied".to_string()
        }
    );
}

#[tokio::test]
async fn unsubscribe_stops_further_deliveries() {
    let transport = RecordingTransport::new();
    let client = new_client(transport);
    let key = doc("eros");
    let log = EventLog::new();
    let unsub = client.listen(&key, log.sink()).unwrap();

    unsub();
    client
        .apply_remote_change(&key, Some(object(&[("n", FieldValue::Integer(1))])), 1)
        .unwrap();
    assert_eq!(log.len(), 1, "only the initial snapshot was delivered");
}

#[tokio::test]
async fn server_timestamp_renders_a_placeholder_until_acknowledged() {
    let transport = RecordingTransport::new();
    let client = new_client(Arc::clone(&transport));
    let key = doc("eros");
    let log = EventLog::new();
    let _unsub = client.listen(&key, log.sink()).unwrap();

    let mutation = set_transforms(&key, &[("updated_at", TransformOperation::ServerTimestamp)]);
    let handle = client.write(vec![mutation]).await.unwrap();

    // The true value cannot be known locally: the local view carries a
    // visible placeholder, never a fabricated timestamp.
    let local = &log.events()[1];
    assert_eq!(field(&local.snapshot, "updated_at"), Some(FieldValue::Unknown));

    let commit_time = chrono::Utc::now();
    client
        .apply_ack(
            handle.batch_id,
            vec![server_result(&[("updated_at", FieldValue::Timestamp(commit_time))])],
            1,
        )
        .unwrap();

    let remote = &log.events()[2];
    assert_eq!(
        field(&remote.snapshot, "updated_at"),
        Some(FieldValue::Timestamp(commit_time))
    );
    // Placeholders never survive into an acknowledged view.
    assert!(!remote.snapshot.data.as_ref().unwrap().contains_unknown());
}

#[tokio::test]
async fn field_delete_removes_the_path_locally_and_after_ack() {
    let transport = RecordingTransport::new();
    let client = new_client(Arc::clone(&transport));
    let key = doc("eros");

    client
        .apply_remote_change(
            &key,
            Some(object(&[
                ("keep", FieldValue::Integer(1)),
                ("drop", FieldValue::Integer(2)),
            ])),
            1,
        )
        .unwrap();

    let mut writes = std::collections::BTreeMap::new();
    writes.insert(fpath("drop"), overlay_db::LiteralWrite::Delete);
    let mutation = overlay_db::Mutation::patch(key.clone(), writes, Default::default()).unwrap();
    let handle = client.write(vec![mutation]).await.unwrap();

    let snapshot = client.snapshot(&key).unwrap();
    assert_eq!(field(&snapshot, "drop"), None);
    assert_eq!(field(&snapshot, "keep"), Some(FieldValue::Integer(1)));

    client
        .apply_ack(handle.batch_id, vec![MutationResult::default()], 2)
        .unwrap();
    let snapshot = client.snapshot(&key).unwrap();
    assert_eq!(field(&snapshot, "drop"), None);
    assert!(!snapshot.has_pending_writes);
}
