// Copyright 2021 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
////////////////////////////////////////////////////////////////////////////////

use super::*;
use crate::encode::Encoder;
use alloc::{borrow::ToOwned, vec};

/// Decode every item in `data`, returning (value, nesting level, next nesting level) triples.
fn decode_all(data: &[u8]) -> Result<Vec<(ItemValue<'_>, usize, usize)>, DecodeError> {
    let mut dec = Decoder::new(data);
    let mut items = Vec::new();
    loop {
        match dec.next() {
            Ok(item) => items.push((item.value, item.nesting_level, item.next_nesting_level)),
            Err(DecodeError::NoMoreItems) => break,
            Err(e) => return Err(e),
        }
    }
    dec.finish()?;
    Ok(items)
}

#[test]
fn test_read_head() {
    let tests = vec![
        ("00", MajorType::UnsignedInt, 0, 1, false),
        ("17", MajorType::UnsignedInt, 23, 1, false),
        ("1818", MajorType::UnsignedInt, 24, 2, false),
        ("3903e7", MajorType::NegativeInt, 999, 3, false),
        ("5a00010000", MajorType::ByteString, 65536, 5, false),
        ("9b0000000000000001", MajorType::Array, 1, 9, false),
        ("bf", MajorType::Map, 0, 1, true),
        ("f93c00", MajorType::Simple, 0x3c00, 3, false),
    ];
    for (i, (data, major, argument, len, indefinite)) in tests.into_iter().enumerate() {
        let data = hex::decode(data).unwrap();
        let head = read_head(&data).unwrap();
        assert_eq!(head.major, major, "case {i}");
        assert_eq!(head.argument, argument, "case {i}");
        assert_eq!(head.len, len, "case {i}");
        assert_eq!(head.indefinite, indefinite, "case {i}");
    }
}

#[test]
fn test_read_head_fail() {
    let tests = vec![
        ("", DecodeError::HitEnd),
        ("18", DecodeError::HitEnd),
        ("1a0001", DecodeError::HitEnd),
        ("1c", DecodeError::NotWellFormed),
        ("3e", DecodeError::NotWellFormed),
        ("1f", DecodeError::NotWellFormed),
        ("3f", DecodeError::NotWellFormed),
        ("df", DecodeError::NotWellFormed),
    ];
    for (i, (data, want)) in tests.into_iter().enumerate() {
        let data = hex::decode(data).unwrap();
        assert_eq!(read_head(&data), Err(want), "case {i}");
    }
}

#[test]
fn test_decode_scalars() {
    let tests = vec![
        ("00", ItemValue::UnsignedInt(0)),
        ("1bffffffffffffffff", ItemValue::UnsignedInt(u64::MAX)),
        ("20", ItemValue::NegativeInt(0)),
        ("3903e7", ItemValue::NegativeInt(999)),
        ("4401020304", ItemValue::Bytes(&[1, 2, 3, 4])),
        ("40", ItemValue::Bytes(&[])),
        ("6449455446", ItemValue::Text("IETF")),
        ("62c3bc", ItemValue::Text("\u{00fc}")),
        ("f4", ItemValue::Bool(false)),
        ("f5", ItemValue::Bool(true)),
        ("f6", ItemValue::Null),
        ("f7", ItemValue::Undefined),
        ("f0", ItemValue::Simple(16)),
        ("f8ff", ItemValue::Simple(255)),
        ("f93e00", ItemValue::Float(1.5)),
        ("fa47c35000", ItemValue::Float(100000.0)),
        ("fb3ff199999999999a", ItemValue::Float(1.1)),
        ("f9fc00", ItemValue::Float(f64::NEG_INFINITY)),
    ];
    for (i, (data, want)) in tests.into_iter().enumerate() {
        let data = hex::decode(data).unwrap();
        let mut dec = Decoder::new(&data);
        let item = dec.next().unwrap();
        assert_eq!(item.value, want, "case {i}");
        assert_eq!(item.nesting_level, 0, "case {i}");
        assert_eq!(item.next_nesting_level, 0, "case {i}");
        assert!(item.tags().is_empty(), "case {i}");
        assert_eq!(dec.next(), Err(DecodeError::NoMoreItems), "case {i}");
        assert!(dec.finish().is_ok(), "case {i}");
    }
}

#[test]
fn test_decode_half_nan() {
    let data = hex::decode("f97e00").unwrap();
    let mut dec = Decoder::new(&data);
    match dec.next().unwrap().value {
        ItemValue::Float(f) => assert!(f.is_nan()),
        v => panic!("unexpected {v:?}"),
    }
}

#[test]
fn test_decode_nesting_levels() {
    // [1, [2, 3], {4: []}, 5]
    let data = hex::decode("8401820203a1048005").unwrap();
    let items = decode_all(&data).unwrap();
    assert_eq!(
        items,
        vec![
            (ItemValue::Array(Some(4)), 0, 1),
            (ItemValue::UnsignedInt(1), 1, 1),
            (ItemValue::Array(Some(2)), 1, 2),
            (ItemValue::UnsignedInt(2), 2, 2),
            (ItemValue::UnsignedInt(3), 2, 1),
            (ItemValue::Map(Some(1)), 1, 2),
            (ItemValue::UnsignedInt(4), 2, 2),
            (ItemValue::Array(Some(0)), 2, 1),
            (ItemValue::UnsignedInt(5), 1, 0),
        ]
    );
}

#[test]
fn test_decode_indefinite() {
    // [_ 1, [2, 3], [_ 4, 5]]
    let data = hex::decode("9f018202039f0405ffff").unwrap();
    let items = decode_all(&data).unwrap();
    assert_eq!(
        items,
        vec![
            (ItemValue::Array(None), 0, 1),
            (ItemValue::UnsignedInt(1), 1, 1),
            (ItemValue::Array(Some(2)), 1, 2),
            (ItemValue::UnsignedInt(2), 2, 2),
            (ItemValue::UnsignedInt(3), 2, 1),
            (ItemValue::Array(None), 1, 2),
            (ItemValue::UnsignedInt(4), 2, 2),
            (ItemValue::UnsignedInt(5), 2, 0),
        ]
    );

    // {_ "a": 1, "b": [_ ]}
    let data = hex::decode("bf61610161629fffff").unwrap();
    let items = decode_all(&data).unwrap();
    assert_eq!(
        items,
        vec![
            (ItemValue::Map(None), 0, 1),
            (ItemValue::Text("a"), 1, 1),
            (ItemValue::UnsignedInt(1), 1, 1),
            (ItemValue::Text("b"), 1, 1),
            (ItemValue::Array(None), 1, 0),
        ]
    );
}

#[test]
fn test_decode_tags() {
    let data = hex::decode("c11a514b67b0").unwrap();
    let mut dec = Decoder::new(&data);
    let item = dec.next().unwrap();
    assert_eq!(item.tags(), &[1]);
    assert_eq!(item.value, ItemValue::UnsignedInt(1363896240));

    let data = hex::decode("d2d8628440a0f6f6").unwrap();
    let mut dec = Decoder::new(&data);
    let item = dec.next().unwrap();
    assert_eq!(item.tags(), &[18, 98]);
    assert_eq!(item.value, ItemValue::Array(Some(4)));

    let data = hex::decode("c1c2c3c400").unwrap();
    let mut dec = Decoder::new(&data);
    assert_eq!(dec.next().unwrap().tags(), &[1, 2, 3, 4]);

    let data = hex::decode("c1c2c3c4c500").unwrap();
    let mut dec = Decoder::new(&data);
    assert_eq!(dec.next(), Err(DecodeError::TooManyTags));
}

#[test]
fn test_decode_fail() {
    let tests = vec![
        ("18", DecodeError::HitEnd),
        ("4301", DecodeError::HitEnd),
        ("82", DecodeError::HitEnd),
        ("c1", DecodeError::HitEnd),
        ("1c", DecodeError::NotWellFormed),
        ("ff", DecodeError::NotWellFormed),
        ("81ff", DecodeError::NotWellFormed),
        ("f818", DecodeError::NotWellFormed),
        ("f81f", DecodeError::NotWellFormed),
        ("bf01ff", DecodeError::NotWellFormed),
        ("5f4101ff", DecodeError::IndefiniteStringUnsupported),
        ("7f6161ff", DecodeError::IndefiniteStringUnsupported),
        ("62c328", DecodeError::InvalidUtf8),
        ("99ffff", DecodeError::ArrayTooLong),
        ("ba00010000", DecodeError::ArrayTooLong),
        ("8201", DecodeError::HitEnd),
        ("9f01", DecodeError::HitEnd),
    ];
    for (i, (data, want)) in tests.into_iter().enumerate() {
        let data = hex::decode(data).unwrap();
        assert_eq!(decode_all(&data), Err(want), "case {i}");
    }
}

#[test]
fn test_decode_array_limit() {
    // 0x99fffe announces the largest permitted array; its members are never read.
    let data = hex::decode("99fffe").unwrap();
    let mut dec = Decoder::new(&data);
    assert_eq!(
        dec.next().unwrap().value,
        ItemValue::Array(Some(MAX_ITEMS_IN_CONTAINER))
    );
    assert_eq!(dec.next(), Err(DecodeError::HitEnd));
}

#[test]
fn test_decode_nesting_depth() {
    let ok = "81".repeat(MAX_NESTING) + "00";
    let data = hex::decode(ok).unwrap();
    let items = decode_all(&data).unwrap();
    assert_eq!(items.len(), MAX_NESTING + 1);
    assert_eq!(items[MAX_NESTING].1, MAX_NESTING);

    let too_deep = "81".repeat(MAX_NESTING + 1) + "00";
    let data = hex::decode(too_deep).unwrap();
    assert_eq!(decode_all(&data), Err(DecodeError::NestingTooDeep));
}

#[test]
fn test_finish() {
    let data = hex::decode("820102").unwrap();
    let mut dec = Decoder::new(&data);
    dec.next().unwrap();
    dec.next().unwrap();
    assert_eq!(dec.finish(), Err(DecodeError::ArrayOrMapUnconsumed));
    dec.next().unwrap();
    assert!(dec.finish().is_ok());

    let data = hex::decode("9f01ff").unwrap();
    let mut dec = Decoder::new(&data);
    dec.next().unwrap();
    dec.next().unwrap();
    assert_eq!(dec.peek_nesting_level(), 0);
    assert_eq!(dec.position(), 2);
    assert!(dec.finish().is_ok());
    assert_eq!(dec.position(), 3);

    let data = hex::decode("0102").unwrap();
    let mut dec = Decoder::new(&data);
    dec.next().unwrap();
    assert_eq!(dec.remaining(), &[0x02]);
    assert_eq!(dec.finish(), Err(DecodeError::ExtraBytes));
}

#[test]
fn test_skip() {
    // [[1, {2: [3]}], 4]
    let data = hex::decode("828201a102810304").unwrap();
    let mut dec = Decoder::new(&data);
    let outer = dec.next().unwrap();
    let inner = dec.next().unwrap();
    assert_eq!(inner.value, ItemValue::Array(Some(2)));
    dec.skip(&inner).unwrap();
    let last = dec.next().unwrap();
    assert_eq!(last.value, ItemValue::UnsignedInt(4));
    assert_eq!(last.nesting_level, outer.nesting_level + 1);
    assert!(dec.finish().is_ok());

    // Skipping a scalar does nothing.
    let data = hex::decode("0102").unwrap();
    let mut dec = Decoder::new(&data);
    let first = dec.next().unwrap();
    dec.skip(&first).unwrap();
    assert_eq!(dec.next().unwrap().value, ItemValue::UnsignedInt(2));
}

#[test]
fn test_next_raw() {
    // [h'a0', {1: [_ 2]}, 3]
    let data = hex::decode("8341a0a1019f02ff03").unwrap();
    let mut dec = Decoder::new(&data);
    let (array, raw) = dec.next_raw().unwrap();
    assert!(array.is_container());
    assert_eq!(raw, &data[..]);
    assert!(dec.finish().is_ok());

    let mut dec = Decoder::new(&data);
    dec.next().unwrap();
    let (bstr, raw) = dec.next_raw().unwrap();
    assert_eq!(bstr.value, ItemValue::Bytes(&[0xa0]));
    assert_eq!(hex::encode(raw), "41a0");
    let (map, raw) = dec.next_raw().unwrap();
    assert_eq!(map.value, ItemValue::Map(Some(1)));
    assert_eq!(hex::encode(raw), "a1019f02ff");
    let (last, raw) = dec.next_raw().unwrap();
    assert_eq!(last.value, ItemValue::UnsignedInt(3));
    assert_eq!(raw, &[0x03]);
    assert!(dec.finish().is_ok());
}

#[test]
fn test_next_value() {
    let data = hex::decode("a3016161d818410282f5f6397fff9f3a0001869fff").unwrap();
    let mut dec = Decoder::new(&data);
    let got = dec.next_value().unwrap();
    assert!(dec.finish().is_ok());
    let want: Value = ciborium::de::from_reader(data.as_slice()).unwrap();
    assert_eq!(got, want);

    let want = Value::Map(vec![
        (Value::Integer(1.into()), Value::Text("a".to_owned())),
        (
            Value::Tag(24, alloc::boxed::Box::new(Value::Bytes(vec![0x02]))),
            Value::Array(vec![Value::Bool(true), Value::Null]),
        ),
        (
            Value::Integer((-32768).into()),
            Value::Array(vec![Value::Integer((-100000).into())]),
        ),
    ]);
    assert_eq!(got, want);

    let data = hex::decode("81f7").unwrap();
    let mut dec = Decoder::new(&data);
    assert_eq!(dec.next_value(), Err(DecodeError::UnexpectedType));
}

#[test]
fn test_as_i64() {
    let tests = vec![
        ("00", Ok(0)),
        ("1b7fffffffffffffff", Ok(i64::MAX)),
        ("1b8000000000000000", Err(DecodeError::IntegerOverflow)),
        ("20", Ok(-1)),
        ("3b7fffffffffffffff", Ok(i64::MIN)),
        ("3b8000000000000000", Err(DecodeError::IntegerOverflow)),
        ("40", Err(DecodeError::UnexpectedType)),
    ];
    for (i, (data, want)) in tests.into_iter().enumerate() {
        let data = hex::decode(data).unwrap();
        let mut dec = Decoder::new(&data);
        assert_eq!(dec.next().unwrap().as_i64(), want, "case {i}");
    }
}

#[test]
fn test_encoder_output_decodes() {
    let mut buf = Vec::new();
    let mut enc = Encoder::growable(&mut buf);
    enc.open_map();
    enc.append_int(-7);
    enc.bstr_wrap();
    enc.append_text("nested");
    let _ = enc.close_bstr_wrap_span(true);
    enc.append_uint(2);
    enc.append_double(0.5);
    enc.close_map();
    let data = enc.finish().unwrap().to_vec();

    let mut dec = Decoder::new(&data);
    assert_eq!(dec.next().unwrap().value, ItemValue::Map(Some(2)));
    assert_eq!(dec.next().unwrap().as_i64(), Ok(-7));
    let wrapped = match dec.next().unwrap().value {
        ItemValue::Bytes(b) => b,
        v => panic!("unexpected {v:?}"),
    };
    let mut inner = Decoder::new(wrapped);
    assert_eq!(inner.next().unwrap().value, ItemValue::Text("nested"));
    assert!(inner.finish().is_ok());
    assert_eq!(dec.next().unwrap().value, ItemValue::UnsignedInt(2));
    assert_eq!(dec.next().unwrap().value, ItemValue::Float(0.5));
    assert!(dec.finish().is_ok());
}

#[test]
fn test_error_display() {
    assert_eq!(
        alloc::format!("{}", DecodeError::NotWellFormed),
        "not well-formed CBOR"
    );
    assert_eq!(
        alloc::format!("{}", DecodeError::ArrayOrMapUnconsumed),
        "array or map not fully consumed"
    );
}
