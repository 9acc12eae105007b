//! Queue ordering invariants observed through local views: queued mutations
//! always fold in enqueue order, later literals shadow earlier ones, and the
//! fold is deterministic after any batch retires.

use std::collections::BTreeMap;

use overlay_db::{
    apply, DocumentKey, FieldPath, FieldValue, LiteralWrite, Mutation, MutationBatch, BatchId,
    MutationQueue, ObjectValue, Precondition, TransformOperation,
};

fn key() -> DocumentKey {
    DocumentKey::new("rooms", "eros")
}

fn fpath(p: &str) -> FieldPath {
    FieldPath::parse(p).unwrap()
}

fn patch_int(mutation_id: i64, field: &str, value: i64) -> Mutation {
    let mut writes = BTreeMap::new();
    writes.insert(fpath(field), LiteralWrite::Set(FieldValue::Integer(value)));
    let mut m = Mutation::patch(key(), writes, BTreeMap::new())
        .unwrap()
        .with_precondition(Precondition::None);
    m.mutation_id = mutation_id;
    m
}

fn batch(batch_id: i64, mutations: Vec<Mutation>) -> MutationBatch {
    MutationBatch {
        batch_id: BatchId(batch_id),
        mutations,
    }
}

#[test]
fn later_batch_shadows_earlier_on_the_same_path() {
    let mut queue = MutationQueue::new();
    queue.enqueue(batch(1, vec![patch_int(1, "n", 1)]));
    queue.enqueue(batch(2, vec![patch_int(2, "n", 2)]));

    let fold = apply::fold_local(None, 0, &queue.mutations_for(&key()));
    assert_eq!(
        fold.data.unwrap().get(&fpath("n")),
        Some(&FieldValue::Integer(2))
    );
}

#[test]
fn fold_is_deterministic_from_base_and_queue_alone() {
    let mut queue = MutationQueue::new();
    queue.enqueue(batch(1, vec![patch_int(1, "a", 1)]));
    queue.enqueue(batch(2, vec![patch_int(2, "b", 2)]));

    let mut base = ObjectValue::new();
    base.set(&fpath("c"), FieldValue::Integer(3));

    let first = apply::fold_local(Some(&base), 1, &queue.mutations_for(&key()));
    let second = apply::fold_local(Some(&base), 1, &queue.mutations_for(&key()));
    assert_eq!(first.data, second.data, "no hidden state in the fold");
}

#[test]
fn retiring_one_batch_leaves_the_rest_in_order() {
    let mut queue = MutationQueue::new();
    queue.enqueue(batch(1, vec![patch_int(1, "n", 1)]));
    queue.enqueue(batch(2, vec![patch_int(2, "n", 2)]));
    queue.enqueue(batch(3, vec![patch_int(3, "n", 3)]));

    queue.retire(BatchId(2));
    let fold = apply::fold_local(None, 0, &queue.mutations_for(&key()));
    assert_eq!(
        fold.data.unwrap().get(&fpath("n")),
        Some(&FieldValue::Integer(3)),
        "the newest surviving mutation still wins"
    );
}

#[test]
fn transforms_see_earlier_queued_literals() {
    let mut queue = MutationQueue::new();
    let mut writes = BTreeMap::new();
    writes.insert(
        fpath("tags"),
        LiteralWrite::Set(FieldValue::Array(vec![FieldValue::Integer(1)])),
    );
    let mut first = Mutation::patch(key(), writes, BTreeMap::new())
        .unwrap()
        .with_precondition(Precondition::None);
    first.mutation_id = 1;

    let mut transforms = BTreeMap::new();
    transforms.insert(
        fpath("tags"),
        TransformOperation::ArrayUnion(vec![FieldValue::Integer(1), FieldValue::Integer(2)]),
    );
    let mut second = Mutation::patch(key(), BTreeMap::new(), transforms)
        .unwrap()
        .with_precondition(Precondition::None);
    second.mutation_id = 2;

    queue.enqueue(batch(1, vec![first]));
    queue.enqueue(batch(2, vec![second]));

    let fold = apply::fold_local(None, 0, &queue.mutations_for(&key()));
    assert_eq!(
        fold.data.unwrap().get(&fpath("tags")),
        Some(&FieldValue::Array(vec![
            FieldValue::Integer(1),
            FieldValue::Integer(2)
        ]))
    );
}
