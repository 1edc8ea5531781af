use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use super::*;

fn roundtrip<K>(key: &K) -> K
where
    K: Flat,
{
    from_key_bytes(&to_key_bytes(key)).unwrap()
}

#[test]
fn test_flat_u64() {
    let seed: u64 = random();
    println!("test_flat_u64 {}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    assert_eq!(roundtrip(&0_u64), 0);
    assert_eq!(roundtrip(&u64::MAX), u64::MAX);

    // big-endian fixed width, byte order equals numeric order.
    for _ in 0..1000 {
        let (a, b) = (rng.gen::<u64>(), rng.gen::<u64>());
        let (ea, eb) = (to_key_bytes(&a), to_key_bytes(&b));
        assert_eq!(ea.len(), 9); // 8 bytes plus the footer
        assert_eq!(a < b, ea < eb);
    }

    assert!(0_u64.is_zero());
    assert!(!1_u64.is_zero());
}

#[test]
fn test_flat_i64() {
    let seed: u64 = random();
    println!("test_flat_i64 {}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    for val in [i64::MIN, -1, 0, 1, i64::MAX].iter() {
        assert_eq!(roundtrip(val), *val);
    }

    // sign-flip keeps numeric order across the sign boundary.
    for _ in 0..1000 {
        let (a, b) = (rng.gen::<i64>(), rng.gen::<i64>());
        let (ea, eb) = (to_key_bytes(&a), to_key_bytes(&b));
        assert_eq!(a < b, ea < eb);
    }
}

#[test]
fn test_flat_string_bytes() {
    assert_eq!(roundtrip(&"hello".to_string()), "hello".to_string());
    assert_eq!(roundtrip(&String::new()), String::new());
    assert!(String::new().is_zero());

    let blob: Vec<u8> = vec![0, 1, 2, 0xff];
    assert_eq!(roundtrip(&blob), blob);

    let arr: [u8; 4] = [9, 8, 7, 6];
    assert_eq!(roundtrip(&arr), arr);
    // wrong width is corruption, not truncation.
    assert!(from_key_bytes::<[u8; 3]>(&to_key_bytes(&arr)).is_err());
}

#[test]
fn test_flat_time() {
    let t = UnixTime(1_700_000_000);
    assert_eq!(roundtrip(&t), t);
    assert_eq!(t.format_text(), "1700000000");
    assert_eq!(UnixTime::parse_text("1700000000").unwrap(), t);
    assert!(UnixTime(0).is_zero());
}

#[test]
fn test_flat_composite() {
    let key = ("tenant-7".to_string(), 42_u64);
    assert_eq!(<(String, u64)>::COMPONENTS, 2);
    assert_eq!(roundtrip(&key), key);
    assert_eq!(key.format_text(), "tenant-7/42");
    assert_eq!(<(String, u64)>::parse_text("tenant-7/42").unwrap(), key);

    let boxed: Box<u64> = Box::new(11);
    assert_eq!(roundtrip(&boxed), boxed);

    // component count is verified on decode.
    assert!(from_key_bytes::<(String, u64)>(&to_key_bytes(&7_u64)).is_err());
}

#[test]
fn test_flat_text() {
    assert_eq!(u64::parse_text("42").unwrap(), 42);
    assert!(u64::parse_text("nope").is_err());
    assert_eq!(Vec::<u8>::parse_text("00ff").unwrap(), vec![0x00, 0xff]);
    assert!(Vec::<u8>::parse_text("0f0").is_err());
}

#[test]
fn test_raw_components() {
    let key = ("ab".to_string(), 1_u64);
    let raw = to_raw_components(&key);
    assert_eq!(raw.len(), 2 + 8);
    // raw form is a byte-prefix of the stored form.
    assert!(to_key_bytes(&key).starts_with(&raw));
}
