use std::env;

use super::*;
use crate::store::{BucketName, Store};

fn scratch_store(name: &str) -> Store {
    let mut path = env::temp_dir();
    path.push(format!("emdb-disk-test-{}-{}", name, std::process::id()));
    fs::remove_file(&path).ok();
    Store::Disk(Dstore::open(path.as_os_str()).unwrap())
}

#[test]
fn test_disk_put_get() {
    let store = scratch_store("put-get");
    let name = BucketName::nested("t", "data");

    let tx = store.begin_write().unwrap();
    let bucket = tx.ensure_bucket(&name).unwrap();
    bucket.put(b"k1", b"v1").unwrap();
    bucket.put(b"k2", b"v2").unwrap();
    assert_eq!(bucket.get(b"k1").unwrap(), Some(b"v1".to_vec()));
    tx.commit().unwrap();

    // nested creation ensured the root.
    let tx = store.begin_read().unwrap();
    assert!(tx.has_bucket(&BucketName::root("t")).unwrap());
    let bucket = tx.bucket(&name).unwrap().unwrap();
    assert_eq!(bucket.get(b"k2").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(bucket.get(b"absent").unwrap(), None);
    assert_eq!(bucket.key_count().unwrap(), 2);
}

#[test]
fn test_disk_cursor() {
    let store = scratch_store("cursor");
    let name = BucketName::root("t");

    let tx = store.begin_write().unwrap();
    let bucket = tx.ensure_bucket(&name).unwrap();
    for key in [b"aa", b"ab", b"ba"].iter() {
        bucket.put(*key, b"").unwrap();
    }

    // read-your-writes inside the write transaction.
    let mut cur = bucket.cursor();
    assert_eq!(cur.first().unwrap().unwrap().0, b"aa");
    assert_eq!(cur.next().unwrap().unwrap().0, b"ab");
    assert_eq!(cur.next().unwrap().unwrap().0, b"ba");
    assert!(cur.next().unwrap().is_none());
    assert_eq!(cur.seek_last_with_prefix(b"a").unwrap().unwrap().0, b"ab");
    tx.commit().unwrap();

    let tx = store.begin_read().unwrap();
    let bucket = tx.bucket(&name).unwrap().unwrap();
    let mut cur = bucket.cursor();
    assert_eq!(cur.last().unwrap().unwrap().0, b"ba");
    assert_eq!(cur.prev().unwrap().unwrap().0, b"ab");
}

#[test]
fn test_disk_missing_bucket() {
    let store = scratch_store("missing");
    let tx = store.begin_write().unwrap();
    let name = BucketName::root("absent");
    match tx.put(&name, b"k", b"v") {
        Err(Error::BucketNotFound(_, _)) => (),
        other => panic!("unexpected {:?}", other),
    }
    tx.rollback().unwrap();
}

#[test]
fn test_disk_reopen() {
    let mut path = env::temp_dir();
    path.push(format!("emdb-disk-test-reopen-{}", std::process::id()));
    fs::remove_file(&path).ok();

    let name = BucketName::root("t");
    {
        let store = Store::Disk(Dstore::open(path.as_os_str()).unwrap());
        let tx = store.begin_write().unwrap();
        tx.ensure_bucket(&name).unwrap().put(b"k", b"v").unwrap();
        tx.commit().unwrap();
        store.close().unwrap();
    }

    let store = Store::Disk(Dstore::open(path.as_os_str()).unwrap());
    let tx = store.begin_read().unwrap();
    let bucket = tx.bucket(&name).unwrap().unwrap();
    assert_eq!(bucket.get(b"k").unwrap(), Some(b"v".to_vec()));
    assert!(tx.size().unwrap() > 0);
}
