use super::*;
use crate::{flat, table::TableDef, tuple, value::IndexKey, Result, Row};

#[derive(Clone, Debug, PartialEq)]
struct Doc {
    id: u64,
    tag: String,
}

impl Row for Doc {
    type Key = u64;

    fn primary_key(&self) -> u64 {
        self.id
    }

    fn encode_row(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(self.tag.as_bytes());
        Ok(())
    }

    fn decode_row(data: &[u8]) -> Result<Doc> {
        use std::convert::TryInto;

        let id = u64::from_be_bytes(data[..8].try_into().unwrap());
        let tag = String::from_utf8(data[8..].to_vec()).unwrap();
        Ok(Doc { id, tag })
    }
}

#[test]
fn test_sink_layouts() {
    let mut def = TableDef::<Doc>::new("docs", 1);
    let by_tag_u = def.add_unique_index::<String>("by_tag_u");
    let by_tag = def.add_index::<String>("by_tag");
    by_tag_u.meta.set_ordinal(1);
    by_tag.meta.set_ordinal(2);

    let pk = flat::to_key_bytes(&7_u64);
    let mut sink = IndexKeys::new(pk.clone());
    sink.put(&by_tag_u, &"red".to_string());
    sink.put(&by_tag, &"red".to_string());
    assert_eq!(sink.len(), 2);

    let entries = sink.into_entries();

    // unique: key is the bare index key, the primary key rides in the
    // value as a single-element tuple.
    assert_eq!(entries[0].key, tuple::encode(&[b"red"]));
    assert_eq!(entries[0].value, tuple::encode(&[pk.as_slice()]));

    // non-unique: primary key appended as the last key element, empty
    // value.
    assert_eq!(entries[1].key, tuple::encode(&[&b"red"[..], pk.as_slice()]));
    assert!(entries[1].value.is_empty());
}

#[test]
fn test_sink_sort_dedup() {
    let mut def = TableDef::<Doc>::new("docs", 1);
    let ix_b = def.add_index::<String>("b");
    let ix_a = def.add_index::<String>("a");
    // ordinal order deliberately inverts declaration order.
    ix_b.meta.set_ordinal(2);
    ix_a.meta.set_ordinal(1);

    let pk = flat::to_key_bytes(&1_u64);
    let mut sink = IndexKeys::new(pk);
    sink.put(&ix_b, &"zz".to_string());
    sink.put(&ix_a, &"mm".to_string());
    sink.put(&ix_b, &"aa".to_string());
    sink.put(&ix_b, &"aa".to_string()); // duplicate collapses

    let entries = sink.into_entries();
    assert_eq!(entries.len(), 3);
    let order: Vec<(u32, &[u8])> =
        entries.iter().map(|e| (e.meta.ordinal(), e.key.as_slice())).collect();
    assert_eq!(order[0].0, 1);
    assert_eq!(order[1].0, 2);
    assert_eq!(order[2].0, 2);
    assert!(order[1].1 < order[2].1);
}

#[test]
fn test_diff_removed() {
    let mut def = TableDef::<Doc>::new("docs", 1);
    let ix = def.add_index::<String>("x");
    ix.meta.set_ordinal(1);
    let iy = def.add_index::<String>("y");
    iy.meta.set_ordinal(2);

    let pk = flat::to_key_bytes(&1_u64);
    let mut sink = IndexKeys::new(pk.clone());
    sink.put(&ix, &"b".to_string());
    sink.put(&iy, &"c".to_string());
    sink.put(&iy, &"d".to_string());
    let new = sink.into_entries();

    let prior = vec![
        IndexKey { ordinal: 1, key: tuple::encode(&[&b"a"[..], pk.as_slice()]) },
        IndexKey { ordinal: 1, key: tuple::encode(&[&b"b"[..], pk.as_slice()]) },
        IndexKey { ordinal: 2, key: tuple::encode(&[&b"c"[..], pk.as_slice()]) },
        // ordinal 9: the index was dropped, entry must be reported.
        IndexKey { ordinal: 9, key: tuple::encode(&[&b"z"[..], pk.as_slice()]) },
    ];

    let removed = diff_removed(&prior, &new);
    let ordinals: Vec<u32> = removed.iter().map(|r| r.ordinal).collect();
    assert_eq!(ordinals, vec![1, 9]);
    assert_eq!(removed[0].key, prior[0].key);

    // unchanged entries produce no removals.
    assert!(diff_removed(&embedded_list(&new), &new).is_empty());

    // empty prior list, nothing to remove.
    assert!(diff_removed(&[], &new).is_empty());
}

#[test]
fn test_entry_primary_key() {
    let pk = flat::to_key_bytes(&9_u64);

    // non-unique layout, trailing key element.
    let key = tuple::encode(&[&b"tag"[..], pk.as_slice()]);
    assert_eq!(entry_primary_key(&key, &[]).unwrap(), pk);

    // unique layout, single-element tuple value.
    let key = tuple::encode(&[b"tag"]);
    let value = tuple::encode(&[pk.as_slice()]);
    assert_eq!(entry_primary_key(&key, &value).unwrap(), pk);

    // malformed value shape.
    let bad = tuple::encode(&[b"a", b"b"]);
    assert!(entry_primary_key(&key, &bad).is_err());
}
