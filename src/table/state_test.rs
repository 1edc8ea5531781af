use super::*;
use crate::store::{mem::Mstore, BucketName, Store};

#[test]
fn test_state_roundtrip() {
    let state = TableState {
        min_schema_version: 2,
        last_ordinal: 5,
        indices: vec![
            IndexState { name: "by_email".to_string(), ordinal: 1, built: true },
            IndexState { name: "by_name".to_string(), ordinal: 5, built: false },
        ],
        last_seen_at: 1_700_000_000,
        deletion_count: 42,
    };

    let bytes = util::into_cbor_bytes(state.clone()).unwrap();
    let (out, n) = util::from_cbor_bytes::<TableState>(&bytes).unwrap();
    assert_eq!(out, state);
    assert_eq!(n, bytes.len());
}

#[test]
fn test_state_persistence() {
    let store = Store::Mem(Mstore::new("state"));
    let name = BucketName::root("users");

    let tx = store.begin_write().unwrap();
    let root = tx.ensure_bucket(&name).unwrap();
    assert_eq!(TableState::load(&root).unwrap(), None);

    let mut state = TableState::default();
    assert_eq!(state.allocate_ordinal(), 1);
    assert_eq!(state.allocate_ordinal(), 2);
    state.indices.push(IndexState { name: "by_x".to_string(), ordinal: 2, built: true });
    state.save(&root).unwrap();
    tx.commit().unwrap();

    let tx = store.begin_read().unwrap();
    let root = tx.bucket(&name).unwrap().unwrap();
    let out = TableState::load(&root).unwrap().unwrap();
    assert_eq!(out.last_ordinal, 2);
    assert_eq!(out.index("by_x").unwrap().ordinal, 2);
    assert!(out.index("absent").is_none());
}
