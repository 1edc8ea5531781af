use super::*;

#[test]
fn test_strategy_full() {
    let range = Strategy::Full { reverse: true }.to_range();
    assert!(range.prefix.is_none());
    assert!(range.lo.is_none() && range.hi.is_none());
    assert!(range.reverse);
}

#[test]
fn test_strategy_exact() {
    let strategy = Strategy::Exact {
        components: vec![b"ab".to_vec(), b"cd".to_vec()],
        reverse: false,
    };
    let range = strategy.to_range();
    assert_eq!(range.prefix, Some(b"abcd".to_vec()));
    assert_eq!(strategy.exact_components().unwrap().len(), 2);
}

#[test]
fn test_strategy_bounded() {
    let strategy = Strategy::Bounded {
        lo: Some(b"b".to_vec()),
        lo_inclusive: false,
        hi: Some(b"d".to_vec()),
        hi_inclusive: true,
        reverse: false,
    };
    let range = strategy.to_range();
    assert_eq!(range.lo, Some(b"b".to_vec()));
    assert!(!range.lo_inclusive);
    assert_eq!(range.hi, Some(b"d".to_vec()));
    assert!(range.hi_inclusive);
    assert!(strategy.exact_components().is_none());
}

#[test]
fn test_strategy_exact_with_key_range() {
    // entry keys extend `prefix + pk` with a footer, so inclusive
    // bounds translate through the prefix successor.
    let strategy = Strategy::ExactWithKeyRange {
        components: vec![b"bar".to_vec()],
        pk_lo: Some(b"\x10".to_vec()),
        pk_lo_inclusive: true,
        pk_hi: Some(b"\x20".to_vec()),
        pk_hi_inclusive: true,
        reverse: false,
    };
    let range = strategy.to_range();
    assert_eq!(range.prefix, Some(b"bar".to_vec()));
    assert_eq!(range.lo, Some(b"bar\x10".to_vec()));
    assert!(range.lo_inclusive);
    // inclusive upper bound becomes exclusive at the successor.
    assert_eq!(range.hi, Some(b"bar\x21".to_vec()));
    assert!(!range.hi_inclusive);

    // exclusive bounds flip the translation.
    let strategy = Strategy::ExactWithKeyRange {
        components: vec![b"bar".to_vec()],
        pk_lo: Some(b"\x10".to_vec()),
        pk_lo_inclusive: false,
        pk_hi: Some(b"\x20".to_vec()),
        pk_hi_inclusive: false,
        reverse: false,
    };
    let range = strategy.to_range();
    assert_eq!(range.lo, Some(b"bar\x11".to_vec()));
    assert_eq!(range.hi, Some(b"bar\x20".to_vec()));
    assert!(!range.hi_inclusive);
}

#[test]
fn test_wrap_corruption_context() {
    let res: crate::Result<()> = err_at!(DecodeFail, msg: "boom");
    let err = wrap_corruption("users", Some("by_email"), &[0xab, 0xcd], res.unwrap_err());
    match err {
        Error::DecodeFail(_, msg) => {
            assert!(msg.contains("users"), "{}", msg);
            assert!(msg.contains("by_email"), "{}", msg);
            assert!(msg.contains("abcd"), "{}", msg);
            assert!(msg.contains("boom"), "{}", msg);
        }
        other => panic!("unexpected {:?}", other),
    }
}
