use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use super::*;

#[test]
fn test_tuple_fixtures() {
    // two elements, "BA" and "987".
    let enc = encode(&[vec![0x42, 0x41], vec![0x39, 0x38, 0x37]]);
    assert_eq!(enc, vec![0x42, 0x41, 0x39, 0x38, 0x37, 0x02, 0x02]);

    // three empty elements.
    let enc = encode(&[vec![], vec![], Vec::<u8>::new()]);
    assert_eq!(enc, vec![0x00, 0x00, 0x03]);

    // an empty tuple encodes as the single empty element.
    let enc = Encoder::new().finish();
    assert_eq!(enc, vec![0x01]);
    assert_eq!(decode(&enc).unwrap(), vec![Vec::<u8>::new()]);

    // single element tuples cost one footer byte.
    let enc = encode(&[b"hello"]);
    assert_eq!(enc, b"hello\x01".to_vec());
}

#[test]
fn test_tuple_roundtrip() {
    let seed: u64 = random();
    println!("test_tuple_roundtrip {}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    for _ in 0..500 {
        let n = 1 + (rng.gen::<usize>() % 256);
        let elements: Vec<Vec<u8>> = (0..n)
            .map(|_| {
                let len = rng.gen::<usize>() % 64;
                (0..len).map(|_| rng.gen::<u8>()).collect()
            })
            .collect();
        let refs: Vec<&[u8]> = elements.iter().map(Vec::as_slice).collect();
        let enc = encode(&refs);
        assert_eq!(decode(&enc).unwrap(), elements);
    }
}

#[test]
fn test_tuple_ordering() {
    let seed: u64 = random();
    println!("test_tuple_ordering {}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    // single element tuples preserve byte order. NUL-free elements:
    // with the footer trailing the data, an element that extends
    // another with a 0x00 byte sorts below the count byte, the one
    // ordering wrinkle of this format.
    for _ in 0..1000 {
        let mut gen = |rng: &mut SmallRng| -> Vec<u8> {
            (0..rng.gen::<usize>() % 16)
                .map(|_| 1 + rng.gen::<u8>() % 255)
                .collect()
        };
        let (a, b) = (gen(&mut rng), gen(&mut rng));
        let (ea, eb) = (encode(&[&a]), encode(&[&b]));
        assert_eq!(a < b, ea < eb, "{:?} {:?}", a, b);
        assert_eq!(a == b, ea == eb);
    }

    // fixed-width elements, the primary-key case, order freely.
    for _ in 0..1000 {
        let (a, b) = (rng.gen::<u64>(), rng.gen::<u64>());
        let (ea, eb) = (encode(&[&a.to_be_bytes()]), encode(&[&b.to_be_bytes()]));
        assert_eq!(a < b, ea < eb);
    }
}

#[test]
fn test_tuple_decoder() {
    let enc = encode(&[&b"a"[..], &b"bc"[..], &b"def"[..]]);
    let mut dec = Decoder::from_bytes(&enc).unwrap();
    assert_eq!(dec.len(), 3);
    assert_eq!(dec.remaining(), 3);
    assert_eq!(dec.element(1), Some(b"bc".as_ref()));
    assert_eq!(dec.next_element().unwrap(), b"a");
    assert_eq!(dec.next_element().unwrap(), b"bc");
    assert_eq!(dec.next_element().unwrap(), b"def");
    assert_eq!(dec.remaining(), 0);
    assert!(dec.next_element().is_err());
}

#[test]
fn test_tuple_prefix() {
    let mut enc = Encoder::new();
    enc.push(b"ab");
    enc.push(b"cde");
    enc.push(b"f");
    assert_eq!(enc.prefix_len(0), 0);
    assert_eq!(enc.prefix_len(1), 2);
    assert_eq!(enc.prefix_len(2), 5);
    assert_eq!(enc.prefix_len(3), 6);
    assert_eq!(enc.as_raw(), b"abcdef");

    // the raw prefix is a byte-prefix of the finished encoding.
    let full = enc.finish();
    assert!(full.starts_with(b"abcdef"));
}

#[test]
fn test_tuple_corrupt() {
    // element count zero.
    assert!(Decoder::from_bytes(&[0x00]).is_err());
    // explicit lengths exceeding the payload.
    assert!(Decoder::from_bytes(&[0x41, 0x07, 0x02]).is_err());
    // empty input.
    assert!(Decoder::from_bytes(&[]).is_err());
}
