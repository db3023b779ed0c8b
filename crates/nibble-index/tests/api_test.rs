//! Functional tests for the public index API.
//!
//! Covers:
//! - Registry lifecycle (create, drop, open, close)
//! - Point lookups, duplicate payloads, and deletes
//! - Ascending scans across key types
//! - Explicit transactions: isolation, commit, abort, conflicts
//! - Result-code mapping of every outcome

use nibble_index::{
    CursorState, Engine, EngineConfig, ErrCode, IndexHandle, Key, KeyType, LeafPruning,
    NibbleError, Record, Result, Transaction,
};

// =============================================================================
// Helpers
// =============================================================================

fn setup(key_type: KeyType) -> (Engine, IndexHandle) {
    let engine = Engine::default();
    engine.create(key_type, "hello").unwrap();
    let handle = engine.open_index("hello").unwrap();
    (engine, handle)
}

/// Drains `handle` from its current position.
fn scan_from(handle: &mut IndexHandle, txn: Option<Transaction>) -> Vec<Record> {
    let mut out = Vec::new();
    loop {
        match handle.get_next(txn) {
            Ok(record) => out.push(record),
            Err(NibbleError::EndOfIndex) => return out,
            Err(e) => panic!("scan failed: {}", e),
        }
    }
}

/// Full scan through a fresh handle.
fn scan(engine: &Engine, txn: Option<Transaction>) -> Vec<Record> {
    let mut handle = engine.open_index("hello").unwrap();
    scan_from(&mut handle, txn)
}

fn code<T>(result: Result<T>) -> ErrCode {
    ErrCode::of(&result)
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_create_drop() {
    let engine = Engine::default();
    assert_eq!(code(engine.create(KeyType::Int, "hello")), ErrCode::Success);
    assert_eq!(code(engine.create(KeyType::Int, "hello")), ErrCode::DbExists);
    assert_eq!(code(engine.drop("hello")), ErrCode::Success);
    assert_eq!(code(engine.drop("hello")), ErrCode::Failure);
}

#[test]
fn test_open_close() {
    let engine = Engine::default();
    engine.create(KeyType::Int, "hello").unwrap();

    let handle = engine.open_index("hello").unwrap();
    assert_eq!(handle.name(), "hello");
    assert_eq!(handle.key_type(), KeyType::Int);
    assert_eq!(code(engine.close_index(handle)), ErrCode::Success);

    assert_eq!(code(engine.open_index("missing")), ErrCode::DbDne);
    assert_eq!(code(engine.drop("hello")), ErrCode::Success);
}

#[test]
fn test_index_names_and_independence() {
    let engine = Engine::default();
    engine.create(KeyType::Int, "b").unwrap();
    engine.create(KeyType::Varchar, "a").unwrap();
    assert_eq!(engine.index_names(), vec!["a", "b"]);

    let ints = engine.open_index("b").unwrap();
    let mut strings = engine.open_index("a").unwrap();
    ints.insert_record(None, &Key::Int(1), "one").unwrap();
    assert!(matches!(strings.get_next(None), Err(NibbleError::EndOfIndex)));
}

#[test]
fn test_drop_then_recreate_starts_empty() {
    let (engine, handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(1), "a").unwrap();
    engine.drop("hello").unwrap();
    engine.create(KeyType::Int, "hello").unwrap();
    assert!(scan(&engine, None).is_empty());

    // The stale handle still refers to the dropped index.
    assert_eq!(code(handle.insert_record(None, &Key::Int(2), "b")), ErrCode::DbDne);
    assert_eq!(code(engine.close_index(handle)), ErrCode::DbDne);
}

// =============================================================================
// Records
// =============================================================================

#[test]
fn test_scenario_point_lookup() {
    let (_engine, mut handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(10), "foobar").unwrap();
    assert_eq!(handle.get(None, &Key::Int(10)).unwrap(), "foobar");
    assert_eq!(code(handle.get(None, &Key::Int(11))), ErrCode::KeyNotFound);
}

#[test]
fn test_scenario_duplicate_fan_out() {
    let (_engine, mut handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(10), "a").unwrap();
    handle.insert_record(None, &Key::Int(10), "b").unwrap();

    let first = handle.get(None, &Key::Int(10)).unwrap();
    let second = handle.get_next(None).unwrap();
    assert_eq!(second.key, Key::Int(10));
    let mut payloads = vec![first, second.payload];
    payloads.sort();
    assert_eq!(payloads, vec!["a", "b"]);
    assert_eq!(code(handle.get_next(None)), ErrCode::DbEnd);
}

#[test]
fn test_single_and_multiple_insert() {
    let (_engine, mut handle) = setup(KeyType::Int);
    let k = Key::Int(0x1234_ABCD_1234_ABCD);

    handle.insert_record(None, &k, "payload").unwrap();
    assert_eq!(code(handle.insert_record(None, &k, "payload")), ErrCode::EntryExists);
    handle.insert_record(None, &k, "payload2").unwrap();
    assert_eq!(handle.get(None, &k).unwrap(), "payload");
    assert_eq!(handle.stats().unwrap().versions, 2);
}

#[test]
fn test_delete_all_payloads() {
    let (_engine, mut handle) = setup(KeyType::Int);
    let k = Key::Int(10);
    handle.insert_record(None, &k, "payload").unwrap();
    handle.insert_record(None, &k, "payload2").unwrap();

    handle.delete_record(None, &k, None).unwrap();
    assert_eq!(code(handle.get(None, &k)), ErrCode::KeyNotFound);
    assert_eq!(code(handle.delete_record(None, &k, None)), ErrCode::KeyNotFound);
}

#[test]
fn test_delete_single_payload() {
    let (_engine, mut handle) = setup(KeyType::Int);
    let k = Key::Int(10);
    handle.insert_record(None, &k, "payload").unwrap();
    handle.insert_record(None, &k, "payload2").unwrap();

    handle.delete_record(None, &k, Some("payload2")).unwrap();
    assert_eq!(handle.get(None, &k).unwrap(), "payload");
    assert_eq!(
        code(handle.delete_record(None, &k, Some("payload2"))),
        ErrCode::EntryDne
    );
}

#[test]
fn test_input_validation() {
    let (_engine, handle) = setup(KeyType::Varchar);
    let too_long = "k".repeat(129);
    assert!(matches!(
        handle.insert_record(None, &Key::from(too_long.as_str()), "p"),
        Err(NibbleError::KeyTooLarge { size: 129, max: 128 })
    ));
    assert!(matches!(
        handle.insert_record(None, &Key::Int(1), "p"),
        Err(NibbleError::TypeMismatch { .. })
    ));
    assert!(matches!(
        handle.insert_record(None, &Key::from("k"), &"p".repeat(101)),
        Err(NibbleError::PayloadTooLarge { .. })
    ));
    assert_eq!(code(handle.insert_record(None, &Key::from("a\0"), "p")), ErrCode::Failure);
}

// =============================================================================
// Scans
// =============================================================================

#[test]
fn test_empty_string_key() {
    let (engine, mut handle) = setup(KeyType::Varchar);
    let empty = Key::from("");
    handle.insert_record(None, &empty, "payload").unwrap();
    assert_eq!(code(handle.insert_record(None, &empty, "payload")), ErrCode::EntryExists);
    handle.insert_record(None, &empty, "payload2").unwrap();
    handle.insert_record(None, &Key::from("a"), "after").unwrap();

    assert_eq!(handle.get(None, &empty).unwrap(), "payload");
    let keys: Vec<Key> = scan(&engine, None).into_iter().map(|r| r.key).collect();
    assert_eq!(keys, vec![empty.clone(), empty, Key::from("a")]);
}

#[test]
fn test_get_next_on_fresh_handle_returns_smallest() {
    let (engine, handle) = setup(KeyType::Varchar);
    handle.insert_record(None, &Key::from("foo"), "payload").unwrap();
    handle.insert_record(None, &Key::from("foo"), "payload2").unwrap();
    handle.insert_record(None, &Key::from("eoo"), "payload3").unwrap();

    let rows = scan(&engine, None);
    assert_eq!(rows[0], Record::new("eoo", "payload3"));
    assert_eq!(rows[1], Record::new("foo", "payload"));
    assert_eq!(rows[2], Record::new("foo", "payload2"));
    assert_eq!(rows.len(), 3);
}

#[test]
fn test_strings_order_shorter_first() {
    let (engine, handle) = setup(KeyType::Varchar);
    for word in ["pear", "fig", "apple", "kiwi", "date"] {
        handle.insert_record(None, &Key::from(word), word).unwrap();
    }
    let words: Vec<String> = scan(&engine, None)
        .into_iter()
        .map(|r| r.payload)
        .collect();
    assert_eq!(words, vec!["fig", "date", "kiwi", "pear", "apple"]);
}

#[test]
fn test_negative_keys_sort_after_positive() {
    let (engine, handle) = setup(KeyType::Short);
    handle.insert_record(None, &Key::Short(-1), "neg").unwrap();
    handle.insert_record(None, &Key::Short(i32::MAX), "max").unwrap();
    handle.insert_record(None, &Key::Short(0), "zero").unwrap();

    let payloads: Vec<String> = scan(&engine, None).into_iter().map(|r| r.payload).collect();
    assert_eq!(payloads, vec!["zero", "max", "neg"]);
}

#[test]
fn test_get_miss_then_get_next() {
    let (engine, handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(1337), "payload3").unwrap();
    handle.insert_record(None, &Key::Int(1337), "payload4").unwrap();

    let txn = engine.begin_transaction();
    let mut reader = engine.open_index("hello").unwrap();
    assert_eq!(code(reader.get(Some(txn), &Key::Int(0))), ErrCode::KeyNotFound);
    assert!(matches!(reader.cursor_state(), CursorState::ExhaustedAtKey { .. }));
    assert_eq!(
        reader.get_next(Some(txn)).unwrap(),
        Record::new(Key::Int(1337), "payload3")
    );
    engine.commit_transaction(txn).unwrap();
}

#[test]
fn test_get_delete_then_get_next() {
    let (engine, handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(1337), "payload3").unwrap();
    handle.insert_record(None, &Key::Int(1337), "payload4").unwrap();

    let txn = engine.begin_transaction();
    let mut reader = engine.open_index("hello").unwrap();
    let payload = reader.get(Some(txn), &Key::Int(1337)).unwrap();
    assert_eq!(payload, "payload3");
    reader
        .delete_record(Some(txn), &Key::Int(1337), Some(payload.as_str()))
        .unwrap();
    assert_eq!(
        reader.get_next(Some(txn)).unwrap(),
        Record::new(Key::Int(1337), "payload4")
    );
    engine.commit_transaction(txn).unwrap();
}

#[test]
fn test_transaction_get_next_sequence() {
    let (engine, handle) = setup(KeyType::Int);
    for (k, p) in [
        (0, "payload1"),
        (0, "payload2"),
        (1, "payload3"),
        (1, "payload4"),
        (15_465_467, "payload5"),
        (154_655_467, "payload6"),
    ] {
        handle.insert_record(None, &Key::Int(k), p).unwrap();
    }

    let txn = engine.begin_transaction();
    let rows = scan(&engine, Some(txn));
    let payloads: Vec<&str> = rows.iter().map(|r| r.payload.as_str()).collect();
    assert_eq!(
        payloads,
        vec!["payload1", "payload2", "payload3", "payload4", "payload5", "payload6"]
    );

    let mut reader = engine.open_index("hello").unwrap();
    assert_eq!(reader.get(Some(txn), &Key::Int(0)).unwrap(), "payload1");
    assert_eq!(
        reader.get_next(Some(txn)).unwrap(),
        Record::new(Key::Int(0), "payload2")
    );
    engine.commit_transaction(txn).unwrap();
}

#[test]
fn test_new_transaction_restarts_scan_on_same_handle() {
    let (engine, mut handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(0), "p1").unwrap();
    handle.insert_record(None, &Key::Int(0), "p2").unwrap();
    handle.insert_record(None, &Key::Int(1), "p3").unwrap();
    assert_eq!(handle.get_next(None).unwrap(), Record::new(Key::Int(0), "p1"));

    let first = engine.begin_transaction();
    assert_eq!(handle.get_next(Some(first)).unwrap(), Record::new(Key::Int(0), "p1"));
    assert_eq!(handle.get_next(Some(first)).unwrap(), Record::new(Key::Int(0), "p2"));
    engine.commit_transaction(first).unwrap();

    let second = engine.begin_transaction();
    assert_eq!(handle.get_next(Some(second)).unwrap(), Record::new(Key::Int(0), "p1"));
    // Auto-commit reads in between keep the transaction's position.
    assert_eq!(handle.get_next(None).unwrap(), Record::new(Key::Int(0), "p2"));
    assert_eq!(handle.get_next(Some(second)).unwrap(), Record::new(Key::Int(1), "p3"));
    engine.commit_transaction(second).unwrap();
}

#[test]
fn test_delete_under_txn_then_scan_reaches_negative_key() {
    let (engine, handle) = setup(KeyType::Short);
    handle.insert_record(None, &Key::Short(0), "payload1").unwrap();
    handle.insert_record(None, &Key::Short(-1), "payload2").unwrap();

    let txn = engine.begin_transaction();
    let mut reader = engine.open_index("hello").unwrap();
    reader.delete_record(Some(txn), &Key::Short(0), None).unwrap();
    assert_eq!(
        reader.get_next(Some(txn)).unwrap(),
        Record::new(Key::Short(-1), "payload2")
    );
    engine.commit_transaction(txn).unwrap();
}

#[test]
fn test_scan_picks_up_keys_inserted_ahead() {
    let (engine, mut handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(1), "a").unwrap();
    handle.insert_record(None, &Key::Int(5), "e").unwrap();
    assert_eq!(handle.get_next(None).unwrap().key, Key::Int(1));

    // Inserted ahead of the cursor: visible to the running scan.
    let writer = engine.open_index("hello").unwrap();
    writer.insert_record(None, &Key::Int(3), "c").unwrap();
    // Inserted behind the cursor: never revisited.
    writer.insert_record(None, &Key::Int(0), "z").unwrap();

    let rest: Vec<Key> = scan_from(&mut handle, None).into_iter().map(|r| r.key).collect();
    assert_eq!(rest, vec![Key::Int(3), Key::Int(5)]);
}

#[test]
fn test_exhausted_scan_stays_exhausted() {
    let (_engine, mut handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(1), "a").unwrap();
    handle.get_next(None).unwrap();
    assert_eq!(code(handle.get_next(None)), ErrCode::DbEnd);
    assert_eq!(code(handle.get_next(None)), ErrCode::DbEnd);

    // A key appended after the end is picked up on the next call.
    handle.insert_record(None, &Key::Int(2), "b").unwrap();
    assert_eq!(handle.get_next(None).unwrap().key, Key::Int(2));
}

#[test]
fn test_pruning_modes_behave_alike() {
    for pruning in [LeafPruning::Retain, LeafPruning::Detach, LeafPruning::Collapse] {
        let engine = Engine::new(EngineConfig {
            leaf_pruning: pruning,
            ..Default::default()
        })
        .unwrap();
        engine.create(KeyType::Int, "hello").unwrap();
        let mut handle = engine.open_index("hello").unwrap();

        for k in 0..50i64 {
            handle.insert_record(None, &Key::Int(k), "p").unwrap();
        }
        for k in (0..50i64).filter(|k| k % 3 != 0) {
            handle.delete_record(None, &Key::Int(k), None).unwrap();
        }

        let keys: Vec<Key> = scan(&engine, None).into_iter().map(|r| r.key).collect();
        let expected: Vec<Key> = (0..50i64).filter(|k| k % 3 == 0).map(Key::Int).collect();
        assert_eq!(keys, expected, "{:?}", pruning);
        assert_eq!(code(handle.get(None, &Key::Int(1))), ErrCode::KeyNotFound);
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[test]
fn test_trivial_transaction() {
    let engine = Engine::default();
    let txn = engine.begin_transaction();
    assert_eq!(code(engine.commit_transaction(txn)), ErrCode::Success);
    assert_eq!(code(engine.commit_transaction(txn)), ErrCode::TxnDne);
    assert_eq!(code(engine.abort_transaction(txn)), ErrCode::TxnDne);
}

#[test]
fn test_later_write_invisible_to_earlier_txn() {
    let (engine, mut handle) = setup(KeyType::Int);
    let txn = engine.begin_transaction();
    handle.insert_record(None, &Key::Int(10), "payload").unwrap();
    assert_eq!(code(handle.get(Some(txn), &Key::Int(10))), ErrCode::KeyNotFound);
    engine.commit_transaction(txn).unwrap();
    assert_eq!(handle.get(None, &Key::Int(10)).unwrap(), "payload");
}

#[test]
fn test_scenario_commit_publishes() {
    let (engine, mut handle) = setup(KeyType::Int);
    let txn = engine.begin_transaction();
    handle.insert_record(Some(txn), &Key::Int(5), "x").unwrap();

    assert_eq!(code(handle.get(None, &Key::Int(5))), ErrCode::KeyNotFound);
    assert_eq!(handle.get(Some(txn), &Key::Int(5)).unwrap(), "x");

    engine.commit_transaction(txn).unwrap();
    assert_eq!(handle.get(None, &Key::Int(5)).unwrap(), "x");
}

#[test]
fn test_scenario_abort_discards() {
    let (engine, mut handle) = setup(KeyType::Int);
    let txn = engine.begin_transaction();
    handle.insert_record(Some(txn), &Key::Int(5), "x").unwrap();
    assert_eq!(handle.get(Some(txn), &Key::Int(5)).unwrap(), "x");

    engine.abort_transaction(txn).unwrap();
    assert_eq!(code(handle.get(None, &Key::Int(5))), ErrCode::KeyNotFound);
    assert_eq!(handle.stats().unwrap().live_keys, 0);
}

#[test]
fn test_uncommitted_write_invisible_to_other_txn() {
    let (engine, mut handle) = setup(KeyType::Int);
    let t1 = engine.begin_transaction();
    let t2 = engine.begin_transaction();
    handle.insert_record(Some(t1), &Key::Int(5), "x").unwrap();

    // t2 is younger but t1 is still open.
    assert_eq!(code(handle.get(Some(t2), &Key::Int(5))), ErrCode::KeyNotFound);
    engine.commit_transaction(t1).unwrap();
    assert_eq!(handle.get(Some(t2), &Key::Int(5)).unwrap(), "x");
    engine.commit_transaction(t2).unwrap();
}

#[test]
fn test_abort_restores_deleted_versions() {
    let (engine, handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(1), "a").unwrap();
    handle.insert_record(None, &Key::Int(1), "b").unwrap();
    handle.insert_record(None, &Key::Int(2), "c").unwrap();
    let before = scan(&engine, None);

    let txn = engine.begin_transaction();
    handle.delete_record(Some(txn), &Key::Int(1), None).unwrap();
    handle.delete_record(Some(txn), &Key::Int(2), Some("c")).unwrap();
    handle.insert_record(Some(txn), &Key::Int(3), "d").unwrap();
    assert_eq!(scan(&engine, Some(txn)).len(), 1);

    engine.abort_transaction(txn).unwrap();
    assert_eq!(scan(&engine, None), before);
}

#[test]
fn test_abort_keeps_concurrent_commits() {
    let (engine, handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(1), "a").unwrap();

    let txn = engine.begin_transaction();
    handle.insert_record(Some(txn), &Key::Int(2), "mine").unwrap();
    handle.insert_record(None, &Key::Int(3), "theirs").unwrap();
    handle.insert_record(None, &Key::Int(2), "theirs too").unwrap();

    engine.abort_transaction(txn).unwrap();
    let rows = scan(&engine, None);
    assert_eq!(
        rows,
        vec![
            Record::new(Key::Int(1), "a"),
            Record::new(Key::Int(2), "theirs too"),
            Record::new(Key::Int(3), "theirs"),
        ]
    );
}

#[test]
fn test_abort_spans_indexes() {
    let engine = Engine::default();
    engine.create(KeyType::Int, "hello").unwrap();
    engine.create(KeyType::Varchar, "names").unwrap();
    let ints = engine.open_index("hello").unwrap();
    let mut names = engine.open_index("names").unwrap();

    let txn = engine.begin_transaction();
    ints.insert_record(Some(txn), &Key::Int(1), "a").unwrap();
    names.insert_record(Some(txn), &Key::from("bob"), "b").unwrap();
    engine.abort_transaction(txn).unwrap();

    assert!(scan(&engine, None).is_empty());
    assert_eq!(code(names.get(None, &Key::from("bob"))), ErrCode::KeyNotFound);
}

#[test]
fn test_conflict_with_later_reader() {
    let (engine, handle) = setup(KeyType::Int);
    handle.insert_record(None, &Key::Int(1), "a").unwrap();

    let older = engine.begin_transaction();
    let younger = engine.begin_transaction();
    let mut reader = engine.open_index("hello").unwrap();
    reader.get(Some(younger), &Key::Int(1)).unwrap();

    let err = handle
        .delete_record(Some(older), &Key::Int(1), None)
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.code(), ErrCode::Failure);

    // The failed delete left nothing to undo and removed nothing.
    engine.abort_transaction(older).unwrap();
    assert_eq!(reader.get(Some(younger), &Key::Int(1)).unwrap(), "a");
    engine.commit_transaction(younger).unwrap();
}

#[test]
fn test_cannot_delete_uncommitted_insert_of_other_txn() {
    let (engine, handle) = setup(KeyType::Int);
    let t1 = engine.begin_transaction();
    let t2 = engine.begin_transaction();
    handle.insert_record(Some(t1), &Key::Int(1), "x").unwrap();

    assert!(handle
        .delete_record(Some(t2), &Key::Int(1), Some("x"))
        .unwrap_err()
        .is_conflict());
    assert!(handle
        .delete_record(Some(t2), &Key::Int(1), None)
        .unwrap_err()
        .is_conflict());

    engine.commit_transaction(t1).unwrap();
    handle.delete_record(Some(t2), &Key::Int(1), Some("x")).unwrap();
    engine.commit_transaction(t2).unwrap();
    assert!(scan(&engine, None).is_empty());
}

#[test]
fn test_resolved_transaction_rejected_everywhere() {
    let (engine, mut handle) = setup(KeyType::Int);
    let txn = engine.begin_transaction();
    engine.commit_transaction(txn).unwrap();

    assert_eq!(code(handle.insert_record(Some(txn), &Key::Int(1), "a")), ErrCode::TxnDne);
    assert_eq!(code(handle.delete_record(Some(txn), &Key::Int(1), None)), ErrCode::TxnDne);
    assert_eq!(code(handle.get(Some(txn), &Key::Int(1))), ErrCode::TxnDne);
    assert_eq!(code(handle.get_next(Some(txn))), ErrCode::TxnDne);
}

#[test]
fn test_own_writes_deletable() {
    let (engine, mut handle) = setup(KeyType::Int);
    let txn = engine.begin_transaction();
    handle.insert_record(Some(txn), &Key::Int(1), "a").unwrap();
    handle.get(Some(txn), &Key::Int(1)).unwrap();
    handle.delete_record(Some(txn), &Key::Int(1), Some("a")).unwrap();
    handle.insert_record(Some(txn), &Key::Int(1), "a").unwrap();
    engine.commit_transaction(txn).unwrap();

    assert_eq!(handle.get(None, &Key::Int(1)).unwrap(), "a");
    assert_eq!(handle.stats().unwrap().versions, 1);
}
