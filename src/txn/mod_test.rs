use cbordata::Cborize;

use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::store::mem::Mstore;
use crate::table::{KvTableDef, TableDef};

const USER_VER: u32 = 0x0001_0001;

#[derive(Clone, Debug, PartialEq, Cborize)]
struct User {
    id: u64,
    email: String,
    name: String,
}

impl User {
    const ID: u32 = USER_VER;

    fn new(id: u64, email: &str, name: &str) -> User {
        User { id, email: email.to_string(), name: name.to_string() }
    }
}

impl Row for User {
    type Key = u64;

    fn primary_key(&self) -> u64 {
        self.id
    }

    fn encode_row(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&util::into_cbor_bytes(self.clone())?);
        Ok(())
    }

    fn decode_row(data: &[u8]) -> Result<User> {
        Ok(util::from_cbor_bytes::<User>(data)?.0)
    }
}

fn user_schema() -> (Schema, Table<User>, IndexH<String>, IndexH<String>) {
    let mut schema = Schema::new();
    let mut def = TableDef::<User>::new("users", 1);
    let by_email = def.add_unique_index::<String>("by_email");
    let by_name = def.add_index::<String>("by_name");
    let (be, bn) = (by_email.clone(), by_name.clone());
    def.set_indexer(move |user: &User, sink: &mut IndexKeys| {
        sink.put(&be, &user.email);
        sink.put(&bn, &user.name);
    });
    let table = schema.add_table(def).unwrap();
    (schema, table, by_email, by_name)
}

fn open_users(name: &str) -> (Db, Table<User>, IndexH<String>, IndexH<String>) {
    let (schema, table, by_email, by_name) = user_schema();
    let store = Store::Mem(Mstore::new(name));
    let db = Db::open(Config::default(), schema, store).unwrap();
    (db, table, by_email, by_name)
}

fn mod_count_of(txn: &Txn, table: &Table<User>, id: u64) -> u64 {
    let key = flat::to_key_bytes(&id);
    let bytes = txn.stx.get(&table.data_bucket(), &key).unwrap().unwrap();
    Value::decode(&bytes).unwrap().mod_count
}

#[test]
fn test_two_inserts_three_reads() {
    let (db, users, by_email, by_name) = open_users("scenario-1");

    let u1 = User::new(1, "foo@e.com", "foo");
    let u2 = User::new(2, "bar@e.com", "bar");
    db.write(|txn| {
        users.put(txn, &u1)?;
        users.put(txn, &u2)?;
        Ok(())
    })
    .unwrap();

    db.read(|txn| {
        assert_eq!(users.get(txn, &1)?.unwrap(), u1);
        assert_eq!(
            users.lookup(txn, &by_email, &"foo@e.com".to_string())?.unwrap(),
            u1
        );
        let rows: Vec<User> = users
            .scan_index(txn, &by_name, &"bar".to_string(), false)?
            .collect::<Result<Vec<User>>>()?;
        assert_eq!(rows, vec![u2.clone()]);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_noop_update_keeps_mod_count() {
    let (db, users, _, by_name) = open_users("scenario-2");

    let u1 = User::new(1, "foo@e.com", "foo");
    db.write(|txn| users.put(txn, &u1)).unwrap();
    db.write(|txn| users.put(txn, &u1)).unwrap();

    db.read(|txn| {
        assert_eq!(mod_count_of(txn, &users, 1), 1);
        // no additional index entries either.
        let bucket = txn.stx.bucket(&users.index_bucket(&by_name.meta))?.unwrap();
        assert_eq!(bucket.key_count()?, 1);
        Ok(())
    })
    .unwrap();

    // a content change advances the mod count exactly once.
    db.write(|txn| users.put(txn, &User::new(1, "foo@e.com", "phoo"))).unwrap();
    db.read(|txn| {
        assert_eq!(mod_count_of(txn, &users, 1), 2);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_rename_updates_indices() {
    let (db, users, by_email, by_name) = open_users("scenario-3");

    db.write(|txn| users.put(txn, &User::new(1, "a", "foo"))).unwrap();
    let renamed = User::new(1, "a", "bar");
    db.write(|txn| users.put(txn, &renamed)).unwrap();

    db.read(|txn| {
        assert_eq!(users.lookup(txn, &by_name, &"foo".to_string())?, None);
        assert_eq!(users.lookup(txn, &by_name, &"bar".to_string())?.unwrap(), renamed);
        assert_eq!(users.lookup(txn, &by_email, &"a".to_string())?.unwrap(), renamed);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_scan_forward_and_reverse() {
    let (db, users, _, by_name) = open_users("scenario-4");

    db.write(|txn| {
        users.put(txn, &User::new(1, "one@", "foo"))?;
        users.put(txn, &User::new(2, "two@", "baz"))?;
        users.put(txn, &User::new(3, "bar@", "bar"))?;
        users.put(txn, &User::new(4, "bar2@", "bar"))?;
        users.put(txn, &User::new(5, "bar3@", "bar"))?;
        Ok(())
    })
    .unwrap();

    db.read(|txn| {
        let ids = |rows: Vec<User>| rows.into_iter().map(|u| u.id).collect::<Vec<u64>>();

        let rows = users
            .scan_index(txn, &by_name, &"bar".to_string(), false)?
            .collect::<Result<Vec<User>>>()?;
        assert_eq!(ids(rows), vec![3, 4, 5]);

        let rows = users
            .scan_index(txn, &by_name, &"bar".to_string(), true)?
            .collect::<Result<Vec<User>>>()?;
        assert_eq!(ids(rows), vec![5, 4, 3]);

        // primary-key range scans, forward and reverse.
        let rows = users.scan_range(txn, 2..=4, false)?.collect::<Result<Vec<User>>>()?;
        assert_eq!(ids(rows), vec![2, 3, 4]);
        let rows = users.scan_range(txn, 2..=4, true)?.collect::<Result<Vec<User>>>()?;
        assert_eq!(ids(rows), vec![4, 3, 2]);

        // full table scan in primary order.
        let rows = users.scan(txn, false)?.collect::<Result<Vec<User>>>()?;
        assert_eq!(ids(rows), vec![1, 2, 3, 4, 5]);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_index_key_range_scan() {
    let (db, users, _, by_name) = open_users("exact-id-range");

    db.write(|txn| {
        for id in 1..=6_u64 {
            users.put(txn, &User::new(id, &format!("u{}@", id), "bar"))?;
        }
        users.put(txn, &User::new(7, "x@", "other"))?;
        Ok(())
    })
    .unwrap();

    db.read(|txn| {
        let rows = users
            .scan_index_key_range(txn, &by_name, &"bar".to_string(), 3..=5, false)?
            .collect::<Result<Vec<User>>>()?;
        assert_eq!(rows.iter().map(|u| u.id).collect::<Vec<u64>>(), vec![3, 4, 5]);

        let rows = users
            .scan_index_key_range(txn, &by_name, &"bar".to_string(), 3..5, true)?
            .collect::<Result<Vec<User>>>()?;
        assert_eq!(rows.iter().map(|u| u.id).collect::<Vec<u64>>(), vec![4, 3]);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_zero_key_rejected() {
    let (db, users, _, _) = open_users("zero-key");
    let res = db.write(|txn| users.put(txn, &User::new(0, "z@", "zero")));
    match res {
        Err(Error::Invalid(_, msg)) => assert!(msg.contains("zero"), "{}", msg),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_delete_clears_indices() {
    let (db, users, by_email, by_name) = open_users("delete");

    db.write(|txn| {
        users.put(txn, &User::new(1, "a@", "foo"))?;
        users.put(txn, &User::new(2, "b@", "foo"))?;
        Ok(())
    })
    .unwrap();

    db.write(|txn| {
        assert!(users.delete(txn, &1)?);
        assert!(!users.delete(txn, &1)?);
        Ok(())
    })
    .unwrap();

    db.read(|txn| {
        assert_eq!(users.get(txn, &1)?, None);
        assert_eq!(users.lookup(txn, &by_email, &"a@".to_string())?, None);
        let rows = users
            .scan_index(txn, &by_name, &"foo".to_string(), false)?
            .collect::<Result<Vec<User>>>()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 2);

        // the deletion counter rides in the table state.
        let root = txn.stx.bucket(&users.root_bucket())?.unwrap();
        let state = TableState::load(&root)?.unwrap();
        assert_eq!(state.deletion_count, 1);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_change_notifications() {
    use std::sync::Mutex;

    let (db, users, _, _) = open_users("changes");

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(vec![]));
    let log = Arc::clone(&seen);
    users.on_change(
        ChangeFlags::WANT_KEY | ChangeFlags::WANT_NEW_ROW | ChangeFlags::WANT_OLD_ROW,
        move |change: &Change<User>| {
            let mut log = log.lock().unwrap();
            match change.op {
                Op::Put => log.push(format!(
                    "put:{}:{}:{}",
                    change.key.unwrap(),
                    change.new_row.map(|u| u.name.as_str()).unwrap_or("-"),
                    change.old_row.as_ref().map(|u| u.name.as_str()).unwrap_or("-"),
                )),
                Op::Delete => log.push(format!(
                    "del:{}:{}",
                    change.key.unwrap(),
                    change.old_row.as_ref().map(|u| u.name.as_str()).unwrap_or("-"),
                )),
            }
            Ok(())
        },
    );

    db.write(|txn| {
        users.put(txn, &User::new(1, "a@", "foo"))?;
        users.put(txn, &User::new(1, "a@", "bar"))?;
        users.delete(txn, &1)?;
        Ok(())
    })
    .unwrap();

    let log = seen.lock().unwrap();
    assert_eq!(
        log.as_slice(),
        &[
            "put:1:foo:-".to_string(),
            "put:1:bar:foo".to_string(),
            "del:1:bar".to_string()
        ]
    );
}

#[test]
fn test_change_handler_error_aborts() {
    let (db, users, _, _) = open_users("handler-abort");

    users.on_change(ChangeFlags::NONE, |_change: &Change<User>| {
        err_at!(Invalid, msg: "handler refused")
    });

    let res = db.write(|txn| users.put(txn, &User::new(1, "a@", "foo")));
    assert!(res.is_err());

    // the transaction rolled back with the handler's error.
    db.read(|txn| {
        assert_eq!(users.get(txn, &1)?, None);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_error_without_write_still_commits() {
    let (db, users, _, _) = open_users("err-no-write");

    db.write(|txn| users.put(txn, &User::new(1, "a@", "foo"))).unwrap();

    // reading-only callback errors do not roll anything back.
    let res: Result<()> = db.write(|txn| {
        assert!(users.get(txn, &1)?.is_some());
        err_at!(Invalid, msg: "nothing written")
    });
    assert!(res.is_err());

    // an error after writing aborts the transaction.
    let res: Result<()> = db.write(|txn| {
        users.put(txn, &User::new(2, "b@", "bar"))?;
        err_at!(Invalid, msg: "after write")
    });
    assert!(res.is_err());
    db.read(|txn| {
        assert_eq!(users.get(txn, &1)?.unwrap().name, "foo");
        assert_eq!(users.get(txn, &2)?, None);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_commit_despite_error() {
    let (db, users, _, _) = open_users("commit-despite");

    let res: Result<()> = db.write(|txn| {
        txn.set_commit_despite_error();
        users.put(txn, &User::new(1, "a@", "foo"))?;
        err_at!(Invalid, msg: "surfaced anyway")
    });
    assert!(res.is_err());

    db.read(|txn| {
        assert!(users.get(txn, &1)?.is_some());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_batch_retries_once() {
    let (db, users, _, _) = open_users("batch");

    let attempts = AtomicUsize::new(0);
    let out = db.batch(|txn| {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        users.put(txn, &User::new(1, "a@", "foo"))?;
        if n == 0 {
            return err_at!(Invalid, msg: "transient");
        }
        Ok(n)
    });
    assert_eq!(out.unwrap(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    db.read(|txn| {
        assert!(users.get(txn, &1)?.is_some());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_panic_becomes_fatal() {
    let (db, users, _, _) = open_users("panic");

    let res = db.write(|txn| -> Result<()> {
        users.put(txn, &User::new(1, "a@", "foo"))?;
        panic!("boom");
    });
    match res {
        Err(Error::Fatal(_, msg)) => assert!(msg.contains("boom"), "{}", msg),
        other => panic!("unexpected {:?}", other),
    }

    // the panicked transaction rolled back.
    db.read(|txn| {
        assert_eq!(users.get(txn, &1)?, None);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_memoize() {
    let (db, _, _, _) = open_users("memoize");

    db.read(|txn| {
        let calls = AtomicUsize::new(0);
        let a = txn.memoize("answer", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42_u64)
        })?;
        let b = txn.memoize("answer", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7_u64)
        })?;
        assert_eq!((*a, *b), (42, 42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // a different type under the same key recomputes.
        let c = txn.memoize("answer", || Ok("text".to_string()))?;
        assert_eq!(c.as_str(), "text");
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_read_only_rejects_writes() {
    let (db, users, _, _) = open_users("read-only");
    let res = db.read(|txn| users.put(txn, &User::new(1, "a@", "x")));
    match res {
        Err(Error::Invalid(_, _)) => (),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_rebuild_new_index_on_reopen() {
    let mstore = Mstore::new("rebuild");

    // first generation: only by_email.
    let email_ordinal = {
        let mut schema = Schema::new();
        let mut def = TableDef::<User>::new("users", 1);
        let by_email = def.add_unique_index::<String>("by_email");
        let be = by_email.clone();
        def.set_indexer(move |user: &User, sink: &mut IndexKeys| {
            sink.put(&be, &user.email);
        });
        let users = schema.add_table(def).unwrap();
        let db = Db::open(Config::default(), schema, Store::Mem(mstore.clone())).unwrap();
        db.write(|txn| {
            users.put(txn, &User::new(1, "a@", "foo"))?;
            users.put(txn, &User::new(2, "b@", "bar"))?;
            Ok(())
        })
        .unwrap();
        let ordinal = by_email.ordinal();
        db.close().unwrap();
        ordinal
    };
    assert_eq!(email_ordinal, 1);

    // second generation adds by_name; existing rows are backfilled.
    let (schema, users, by_email, by_name) = user_schema();
    let db = Db::open(Config::default(), schema, Store::Mem(mstore)).unwrap();
    assert_eq!(by_email.ordinal(), 1);
    assert_eq!(by_name.ordinal(), 2);

    db.read(|txn| {
        assert_eq!(users.lookup(txn, &by_name, &"foo".to_string())?.unwrap().id, 1);
        assert_eq!(users.lookup(txn, &by_name, &"bar".to_string())?.unwrap().id, 2);
        assert_eq!(users.lookup(txn, &by_email, &"a@".to_string())?.unwrap().id, 1);

        let root = txn.stx.bucket(&users.root_bucket())?.unwrap();
        let state = TableState::load(&root)?.unwrap();
        assert!(state.indices.iter().all(|ix| ix.built));
        assert_eq!(state.last_ordinal, 2);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_dropped_index_ordinal_never_reused() {
    let mstore = Mstore::new("ordinals");

    // generation 1: indices a, b.
    {
        let mut schema = Schema::new();
        let mut def = TableDef::<User>::new("users", 1);
        let ia = def.add_index::<String>("a");
        let ib = def.add_index::<String>("b");
        let (ia2, ib2) = (ia.clone(), ib.clone());
        def.set_indexer(move |user: &User, sink: &mut IndexKeys| {
            sink.put(&ia2, &user.email);
            sink.put(&ib2, &user.name);
        });
        let users = schema.add_table(def).unwrap();
        let db = Db::open(Config::default(), schema, Store::Mem(mstore.clone())).unwrap();
        assert_eq!((ia.ordinal(), ib.ordinal()), (1, 2));
        db.write(|txn| users.put(txn, &User::new(1, "a@", "foo"))).unwrap();
        db.close().unwrap();
    }

    // generation 2: a dropped, c added; c gets a fresh ordinal.
    let mut schema = Schema::new();
    let mut def = TableDef::<User>::new("users", 1);
    let ib = def.add_index::<String>("b");
    let ic = def.add_index::<String>("c");
    let (ib2, ic2) = (ib.clone(), ic.clone());
    def.set_indexer(move |user: &User, sink: &mut IndexKeys| {
        sink.put(&ib2, &user.name);
        sink.put(&ic2, &user.email);
    });
    let users = schema.add_table(def).unwrap();
    let db = Db::open(Config::default(), schema, Store::Mem(mstore)).unwrap();
    assert_eq!((ib.ordinal(), ic.ordinal()), (2, 3));

    db.read(|txn| {
        // the dropped index's bucket is gone.
        assert!(!txn.stx.has_bucket(&BucketName::nested("users", "i_a"))?);
        Ok(())
    })
    .unwrap();

    // rows carrying the stale ordinal in their embedded list are
    // still writable; the stale entry is ignored.
    db.write(|txn| users.put(txn, &User::new(1, "a@", "renamed"))).unwrap();
    db.read(|txn| {
        assert_eq!(users.lookup(txn, &ib, &"renamed".to_string())?.unwrap().id, 1);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_kv_table() {
    let mut schema = Schema::new();
    let mut def = KvTableDef::new("settings");
    def.add_index("by_owner");
    let kv = schema.add_kv_table(def).unwrap();

    let store = Store::Mem(Mstore::new("kv"));
    let db = Db::open(Config::default(), schema, store).unwrap();

    db.write(|txn| {
        kv.put(txn, b"theme", b"dark")?;
        kv.put_index(txn, "by_owner", b"root/theme", b"")?;
        Ok(())
    })
    .unwrap();

    db.read(|txn| {
        assert_eq!(kv.get(txn, b"theme")?, Some(b"dark".to_vec()));
        assert_eq!(kv.get(txn, b"absent")?, None);

        let bucket = kv.bucket_of(txn)?;
        assert_eq!(bucket.key_count()?, 1);
        assert!(txn.stx.has_bucket(&BucketName::root("settings_i_by_owner"))?);
        Ok(())
    })
    .unwrap();

    db.write(|txn| {
        assert!(kv.delete(txn, b"theme")?);
        assert!(kv.delete_index(txn, "by_owner", b"root/theme")?);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_prefix_scan_on_composite_index() {
    let mut schema = Schema::new();
    let mut def = TableDef::<User>::new("users", 1);
    let by_name_email = def.add_index::<(String, String)>("by_name_email");
    let h = by_name_email.clone();
    def.set_indexer(move |user: &User, sink: &mut IndexKeys| {
        sink.put(&h, &(user.name.clone(), user.email.clone()));
    });
    let users = schema.add_table(def).unwrap();
    let db = Db::open(Config::default(), schema, Store::Mem(Mstore::new("prefix"))).unwrap();

    db.write(|txn| {
        users.put(txn, &User::new(1, "c@", "bar"))?;
        users.put(txn, &User::new(2, "a@", "bar"))?;
        users.put(txn, &User::new(3, "b@", "foo"))?;
        Ok(())
    })
    .unwrap();

    db.read(|txn| {
        // pin the first component, rows come back in email order.
        let rows = users
            .scan_index_prefix(txn, &by_name_email, &"bar".to_string(), false)?
            .collect::<Result<Vec<User>>>()?;
        assert_eq!(rows.iter().map(|u| u.id).collect::<Vec<u64>>(), vec![2, 1]);

        // a full-width "prefix" is a programmer error.
        assert!(users
            .scan_index_prefix(txn, &by_name_email, &("x".to_string(), "y".to_string()), false)
            .is_err());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_durable_backend_end_to_end() {
    use crate::store::disk::Dstore;
    use std::{env, fs};

    let mut path = env::temp_dir();
    path.push(format!("emdb-txn-disk-{}", std::process::id()));
    fs::remove_file(&path).ok();

    // first open: write through every index path.
    {
        let (schema, users, by_email, by_name) = user_schema();
        let store = Store::Disk(Dstore::open(path.as_os_str()).unwrap());
        let db = Db::open(Config::default(), schema, store).unwrap();

        db.write(|txn| {
            users.put(txn, &User::new(1, "foo@e.com", "foo"))?;
            users.put(txn, &User::new(2, "bar@e.com", "bar"))?;
            users.put(txn, &User::new(3, "baz@e.com", "bar"))?;
            Ok(())
        })
        .unwrap();

        db.read(|txn| {
            assert_eq!(users.lookup(txn, &by_email, &"foo@e.com".to_string())?.unwrap().id, 1);
            let rows = users
                .scan_index(txn, &by_name, &"bar".to_string(), true)?
                .collect::<Result<Vec<User>>>()?;
            assert_eq!(rows.iter().map(|u| u.id).collect::<Vec<u64>>(), vec![3, 2]);
            Ok(())
        })
        .unwrap();
        db.close().unwrap();
    }

    // reopen from the same file: data, state and indices survive.
    let (schema, users, by_email, by_name) = user_schema();
    let store = Store::Disk(Dstore::open(path.as_os_str()).unwrap());
    let db = Db::open(Config::default(), schema, store).unwrap();
    assert_eq!((by_email.ordinal(), by_name.ordinal()), (1, 2));

    db.read(|txn| {
        assert_eq!(users.get(txn, &2)?.unwrap().name, "bar");
        assert_eq!(users.lookup(txn, &by_name, &"foo".to_string())?.unwrap().id, 1);
        Ok(())
    })
    .unwrap();

    db.write(|txn| {
        assert!(users.delete(txn, &3)?);
        Ok(())
    })
    .unwrap();
    db.read(|txn| {
        let rows = users
            .scan_index(txn, &by_name, &"bar".to_string(), false)?
            .collect::<Result<Vec<User>>>()?;
        assert_eq!(rows.len(), 1);
        Ok(())
    })
    .unwrap();
    db.close().unwrap();
}

#[test]
fn test_concurrent_readers() {
    use std::thread;

    let (db, users, _, _) = open_users("concurrent");
    let db = Arc::new(db);

    db.write(|txn| users.put(txn, &User::new(1, "a@", "v0"))).unwrap();

    let writer = {
        let db = Arc::clone(&db);
        let users = users.clone();
        thread::spawn(move || {
            for i in 0..200_u64 {
                db.write(|txn| {
                    users.put(txn, &User::new(1, "a@", &format!("v{}", i)))?;
                    users.put(txn, &User::new(100 + i, "x@", "filler"))?;
                    Ok(())
                })
                .unwrap();
            }
        })
    };

    let mut readers = vec![];
    for _ in 0..4 {
        let db = Arc::clone(&db);
        let users = users.clone();
        readers.push(thread::spawn(move || {
            for _ in 0..200 {
                db.read(|txn| {
                    // the row is always present and internally
                    // consistent under a snapshot.
                    let row = users.get(txn, &1)?.unwrap();
                    assert_eq!(row.email, "a@");
                    Ok(())
                })
                .unwrap();
            }
        }));
    }

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    db.read(|txn| {
        assert_eq!(users.get(txn, &1)?.unwrap().name, "v199");
        Ok(())
    })
    .unwrap();
    assert_eq!(active_writers(), 0);
    assert_eq!(active_readers(), 0);
}
