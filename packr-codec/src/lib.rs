// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Pure Rust implementation of the PACKR structure-aware compression codec.
//!
//! PACKR compresses streams of semi-structured records, predominantly flat objects of scalar
//! telemetry fields. The codec exploits schema regularity that general-purpose compressors
//! miss: field names, repeated strings, and MAC addresses become one-byte dictionary
//! references, numeric fields become per-field deltas, and homogeneous record sequences are
//! transposed into per-column encodings (constant, delta-numeric, or run-length) with null
//! bitmaps. The token stream is carried in a CRC-checked frame, optionally wrapped by a
//! byte-level LZ77 back-end with adaptive entropy detection.
//!
//! [`PackrEncoder`] and [`PackrDecoder`] are the entry points. The `packr` crate re-exports
//! them together with module-level convenience functions.

pub mod batch;
pub mod decoder;
pub mod delta;
pub mod dict;
pub mod encoder;
pub mod frame;
pub mod primitive;
pub mod rice;
pub mod token;
pub mod transform;

pub use decoder::{DecoderOptions, PackrDecoder};
pub use dict::DICT_SIZE;
pub use encoder::{EncoderOptions, PackrEncoder};
pub use frame::{FRAME_MAGIC, FRAME_VERSION};
pub use transform::Compression;

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use packr_core::value::{MacAddr, Value};

    use crate::batch::ColumnFlags;
    use crate::decoder::PackrDecoder;
    use crate::encoder::{EncoderOptions, PackrEncoder};
    use crate::frame::{parse_frame, FrameBuilder, FrameFlags};
    use crate::token;
    use crate::transform::{strip_transforms, Compression, MARKER_LEGACY_WRAPPER, MARKER_LZ};

    fn obj(fields: &[(&str, Value)]) -> Value {
        Value::Object(fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn roundtrip(value: &Value) -> Value {
        let mut encoder = PackrEncoder::default();
        let mut decoder = PackrDecoder::default();
        let wire = encoder.encode(value).unwrap();
        decoder.decode(&wire).unwrap()
    }

    fn roundtrip_stream(values: &[Value]) -> Vec<Value> {
        let mut encoder = PackrEncoder::default();
        let mut decoder = PackrDecoder::default();
        let wire = encoder.encode_stream(values).unwrap();
        decoder.decode_stream(&wire).unwrap()
    }

    fn frame_data(wire: &[u8]) -> (FrameFlags, Vec<u8>) {
        let payload = strip_transforms(wire).unwrap();
        let frame = parse_frame(&payload, true).unwrap();
        (frame.flags, frame.data.into_vec())
    }

    #[test]
    fn verify_scalar_roundtrips() {
        let values = [
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(0),
            Value::Int(-1),
            Value::Int(1),
            Value::Int(i64::from(i32::MAX)),
            Value::Int(-(1 << 31)),
            Value::Int((1 << 40) + 17),
            Value::Float(0.0),
            Value::Float(-273.15),
            Value::Float(f64::MAX),
            Value::String(String::new()),
            Value::String("hello".to_string()),
            Value::String("snowman \u{2603}".to_string()),
            Value::Mac(MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01])),
            Value::Binary(vec![0u8, 1, 2, 0xff].into_boxed_slice()),
        ];

        for value in values {
            assert_eq!(roundtrip(&value), value, "{:?} failed to roundtrip", value);
        }
    }

    #[test]
    fn verify_nested_roundtrip() {
        let value = obj(&[
            ("id", Value::Int(12)),
            (
                "readings",
                Value::Array(vec![
                    Value::Float(1.5),
                    Value::Null,
                    obj(&[("nested", Value::Bool(true))]),
                ]),
            ),
            ("blob", Value::Binary(vec![9u8; 40].into_boxed_slice())),
        ]);

        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn verify_mac_string_normalizes() {
        // A MAC-shaped string is promoted into the MAC dictionary and decodes in normalized
        // form.
        let decoded = roundtrip(&obj(&[("mac", Value::String("aa-bb-cc-dd-ee-01".to_string()))]));
        let expected =
            obj(&[("mac", Value::Mac(MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01])))]);
        assert_eq!(decoded, expected);
    }

    #[test]
    fn verify_single_record_roundtrip() {
        let record = obj(&[
            ("rssi", Value::Int(-65)),
            ("mac", Value::Mac(MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]))),
        ]);

        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn verify_batch_layout_constant_and_delta() {
        // Three records over two columns: "t" counts up, "r" is constant.
        let records = vec![
            obj(&[("t", Value::Int(1)), ("r", Value::Int(-60))]),
            obj(&[("t", Value::Int(2)), ("r", Value::Int(-60))]),
            obj(&[("t", Value::Int(3)), ("r", Value::Int(-60))]),
        ];

        let mut encoder = PackrEncoder::default();
        let wire = encoder.encode_stream(&records).unwrap();

        let (flags, data) = frame_data(&wire);
        assert!(flags.contains(FrameFlags::HAS_DICT_UPDATE));
        assert!(flags.contains(FrameFlags::DICT_RESET));
        assert!(!flags.contains(FrameFlags::USES_RICE));

        // ULTRA_BATCH header, field definitions with flags, then "t" as an absolute plus two
        // DELTA_ONE tokens and "r" as a single absolute.
        let expected = [
            token::ULTRA_BATCH,
            0x03,
            0x02,
            token::NEW_FIELD,
            0x01,
            b't',
            ColumnFlags::ALL_DELTA.bits(),
            token::NEW_FIELD,
            0x01,
            b'r',
            ColumnFlags::CONSTANT.bits(),
            token::INT,
            0x02,
            token::DELTA_ONE,
            token::DELTA_ONE,
            token::INT,
            0x77,
        ];
        assert_eq!(&data[..], &expected[..]);

        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode_stream(&wire).unwrap(), records);

        // `decode` of batch bytes yields the record sequence.
        decoder.reset();
        assert_eq!(decoder.decode(&wire).unwrap(), Value::Array(records));
    }

    #[test]
    fn verify_batch_schema_union_and_null_bitmaps() {
        let records = vec![
            obj(&[("a", Value::Int(1))]),
            obj(&[("b", Value::Int(2))]),
            obj(&[("a", Value::Int(3)), ("b", Value::Int(4))]),
        ];

        let mut encoder = PackrEncoder::default();
        let wire = encoder.encode_stream(&records).unwrap();
        let (_, data) = frame_data(&wire);

        let nullable_numeric = (ColumnFlags::ALL_DELTA | ColumnFlags::HAS_NULLS).bits();
        let expected = [
            token::ULTRA_BATCH,
            0x03,
            0x02,
            token::NEW_FIELD,
            0x01,
            b'a',
            nullable_numeric,
            token::NEW_FIELD,
            0x01,
            b'b',
            nullable_numeric,
            0b0000_0101, // bitmap for "a": rows 0 and 2
            token::INT,
            0x02,
            token::DELTA_ZERO,
            token::delta_small_token(2),
            0b0000_0110, // bitmap for "b": rows 1 and 2
            token::INT,
            0x04,
            token::DELTA_ZERO,
            token::delta_small_token(2),
        ];
        assert_eq!(&data[..], &expected[..]);

        // Missing keys are not materialized in the decoded records.
        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode_stream(&wire).unwrap(), records);
    }

    #[test]
    fn verify_bitpack_column_roundtrip() {
        let samples = [1000i64, 1001, 1002, 1001, 1001, 1001, 1001, 1000];
        let records: Vec<Value> =
            samples.iter().map(|&v| obj(&[("v", Value::Int(v))])).collect();

        let mut encoder = PackrEncoder::default();
        let wire = encoder.encode_stream(&records).unwrap();
        let (_, data) = frame_data(&wire);
        assert!(data.contains(&token::BITPACK_COLUMN));

        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode_stream(&wire).unwrap(), records);
    }

    #[test]
    fn verify_rice_column_roundtrip() {
        // 200 slowly drifting integer samples; deltas stay well under 1024 but overflow the
        // nibble range, so the Rice path wins.
        let mut v = 100_000i64;
        let mut records = Vec::new();
        for i in 0..200i64 {
            v += (i % 7) * 20 - 60;
            records.push(obj(&[("v", Value::Int(v))]));
        }

        let mut encoder = PackrEncoder::default();
        let wire = encoder.encode_stream(&records).unwrap();

        let (flags, data) = frame_data(&wire);
        assert!(flags.contains(FrameFlags::USES_RICE));
        assert!(data.contains(&token::RICE_COLUMN));
        // Header, field definition, first absolute, and the Rice payload together stay under
        // 1.5 bytes per record.
        assert!(data.len() < 300, "rice column too large: {} bytes", data.len());

        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode_stream(&wire).unwrap(), records);
    }

    #[test]
    fn verify_rle_string_column_roundtrip() {
        let mut records = Vec::new();
        for i in 0..30 {
            let status = if i < 20 { "ok" } else { "degraded" };
            records.push(obj(&[("status", Value::String(status.to_string()))]));
        }

        let mut encoder = PackrEncoder::default();
        let wire = encoder.encode_stream(&records).unwrap();
        let (_, data) = frame_data(&wire);
        assert!(data.contains(&token::RLE_REPEAT));

        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode_stream(&wire).unwrap(), records);
    }

    #[test]
    fn verify_float_column_fixed_point_accuracy() {
        // Multiples of 1/65536 survive the fixed-point delta scale exactly.
        let temps = [20.5f64, 20.75, 21.0, 20.25, 20.25, 22.0];
        let records: Vec<Value> =
            temps.iter().map(|&t| obj(&[("temp", Value::Float(t))])).collect();

        assert_eq!(roundtrip_stream(&records), records);
    }

    #[test]
    fn verify_all_null_column() {
        let records = vec![
            obj(&[("a", Value::Int(1)), ("gone", Value::Null)]),
            obj(&[("a", Value::Int(2)), ("gone", Value::Null)]),
        ];

        // Explicit nulls are dropped from decoded batch records.
        let expected = vec![
            obj(&[("a", Value::Int(1))]),
            obj(&[("a", Value::Int(2))]),
        ];
        assert_eq!(roundtrip_stream(&records), expected);
    }

    #[test]
    fn verify_empty_stream() {
        let mut encoder = PackrEncoder::default();
        let wire = encoder.encode_stream(&[]).unwrap();

        // An empty stream is a bare frame: magic, version, flags, zero symbol count, CRC.
        assert_eq!(wire.len(), 11);

        let payload = strip_transforms(&wire).unwrap();
        let frame = parse_frame(&payload, true).unwrap();
        assert_eq!(frame.symbol_count, 0);

        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode_stream(&wire).unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn verify_legacy_wrapper_marker() {
        // Long repetitive payload so the LZ77 marker is actually emitted.
        let record = obj(&[("msg", Value::String("abcabcabc".repeat(80)))]);

        let mut encoder = PackrEncoder::default();
        let mut wire = encoder.encode(&record).unwrap();
        assert_eq!(wire[0], MARKER_LZ);

        // A legacy 0xFE wrapper before the marker decodes identically.
        wire.insert(0, MARKER_LEGACY_WRAPPER);

        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode(&wire).unwrap(), record);
    }

    #[test]
    fn verify_nested_records_use_generic_path() {
        // A nested array keeps the sequence off the batch engine but still roundtrips.
        let records = vec![
            obj(&[("pos", Value::Array(vec![Value::Int(1), Value::Int(2)]))]),
            obj(&[("pos", Value::Array(vec![Value::Int(3), Value::Int(4)]))]),
        ];

        let mut encoder = PackrEncoder::default();
        let wire = encoder.encode_stream(&records).unwrap();
        let (_, data) = frame_data(&wire);
        assert_eq!(data[0], token::OBJECT_START);

        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode_stream(&wire).unwrap(), records);
    }

    #[test]
    fn verify_dictionary_reuse_across_frames() {
        let record = obj(&[
            ("ssid", Value::String("lab-net".to_string())),
            ("mac", Value::Mac(MacAddr::new([2, 4, 6, 8, 10, 12]))),
        ]);

        let mut encoder = PackrEncoder::default();
        let first = encoder.encode(&record).unwrap();
        let second = encoder.encode(&record).unwrap();

        // The second frame reuses dictionary references instead of re-sending payloads.
        assert!(second.len() < first.len());

        let (flags, _) = frame_data(&first);
        assert!(flags.contains(FrameFlags::DICT_RESET));
        let (flags, _) = frame_data(&second);
        assert!(!flags.contains(FrameFlags::DICT_RESET));

        // Decoding in order resolves the references; the decoder carries state across frames.
        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode(&first).unwrap(), record);
        assert_eq!(decoder.decode(&second).unwrap(), record);
    }

    #[test]
    fn verify_dictionary_eviction_roundtrip() {
        // 65 distinct strings overflow the dictionary; the 66th symbol re-adds the evicted
        // first string and everything still roundtrips.
        let mut values: Vec<Value> =
            (0..65).map(|i| Value::String(format!("station-{:02}", i))).collect();
        values.push(Value::String("station-00".to_string()));

        assert_eq!(roundtrip_stream(&values), values);
    }

    #[test]
    fn verify_decode_stream_returns_prefix_on_trailing_garbage() {
        let mut builder = FrameBuilder::new();
        builder.add_token().push(token::BOOL_TRUE);
        builder.add_token().push(token::INT);
        // INT payload missing: the stream ends mid-token.
        let wire = builder.finish();

        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode_stream(&wire).unwrap(), vec![Value::Bool(true)]);
    }

    #[test]
    fn verify_error_kinds() {
        use packr_core::errors::Error;

        let mut decoder = PackrDecoder::default();

        // Unknown token byte.
        let mut builder = FrameBuilder::new();
        builder.add_token().push(token::SCHEMA_DEF);
        match decoder.decode(&builder.finish()) {
            Err(Error::UnknownToken(byte)) => assert_eq!(byte, token::SCHEMA_DEF),
            other => panic!("expected UnknownToken, got {:?}", other),
        }

        // Delta with no field in scope.
        decoder.reset();
        let mut builder = FrameBuilder::new();
        builder.add_token().push(token::DELTA_ONE);
        assert!(matches!(
            decoder.decode(&builder.finish()),
            Err(Error::DeltaWithoutContext(_))
        ));

        // Reference to a slot never populated.
        decoder.reset();
        let mut builder = FrameBuilder::new();
        builder.add_token().push(token::STRING_REF_BASE + 5);
        assert!(matches!(decoder.decode(&builder.finish()), Err(Error::DictionaryMiss(_))));

        // Not a frame at all.
        decoder.reset();
        assert!(matches!(decoder.decode(b"PKR2junkjunk"), Err(Error::InvalidFrame(_))));
        assert!(matches!(decoder.decode(&[]), Err(Error::InvalidFrame(_))));
    }

    #[test]
    fn verify_legacy_record_batch_decodes() {
        let mut builder = FrameBuilder::new();
        builder.add_token().push(token::RECORD_BATCH);
        builder.data_mut().extend_from_slice(&[0x02, 0x01]); // 2 records, 1 field
        builder.add_token().extend_from_slice(&[token::NEW_FIELD, 0x01, b'x']);
        builder.add_token().extend_from_slice(&[token::INT, 0x02]); // 1
        builder.add_token().extend_from_slice(&[token::INT, 0x04]); // 2

        let mut decoder = PackrDecoder::default();
        let decoded = decoder.decode(&builder.finish()).unwrap();

        let expected = Value::Array(vec![
            obj(&[("x", Value::Int(1))]),
            obj(&[("x", Value::Int(2))]),
        ]);
        assert_eq!(decoded, expected);
    }

    #[test]
    fn verify_legacy_column_batch_decodes() {
        let mut builder = FrameBuilder::new();
        builder.add_token().push(token::COLUMN_BATCH);
        builder.data_mut().extend_from_slice(&[0x03, 0x01]); // 3 records, 1 field
        builder.add_token().extend_from_slice(&[token::NEW_FIELD, 0x01, b's']);
        builder.add_token().extend_from_slice(&[token::NEW_STRING, 0x02, b'o', b'k']);
        builder.add_token().push(token::RLE_REPEAT);
        builder.data_mut().push(0x02);

        let mut decoder = PackrDecoder::default();
        let decoded = decoder.decode(&builder.finish()).unwrap();

        let expected = Value::Array(vec![
            obj(&[("s", Value::String("ok".to_string()))]),
            obj(&[("s", Value::String("ok".to_string()))]),
            obj(&[("s", Value::String("ok".to_string()))]),
        ]);
        assert_eq!(decoded, expected);
    }

    #[test]
    fn verify_compression_none_emits_bare_frames() {
        let opts = EncoderOptions { compression: Compression::None, ..Default::default() };
        let mut encoder = PackrEncoder::new(opts);

        let record = obj(&[("msg", Value::String("abcabcabc".repeat(80)))]);
        let wire = encoder.encode(&record).unwrap();
        assert_eq!(&wire[0..4], b"PKR1");

        let mut decoder = PackrDecoder::default();
        assert_eq!(decoder.decode(&wire).unwrap(), record);
    }

    #[test]
    fn verify_out_of_domain_integer_is_rejected() {
        let mut encoder = PackrEncoder::default();
        assert!(encoder.encode(&Value::Int(i64::MAX)).is_err());
        assert!(encoder.encode(&Value::Int(1 << 41)).is_err());
        assert!(encoder.encode(&Value::Int((1 << 41) - 1)).is_ok());
    }

    #[test]
    fn verify_randomized_record_streams() {
        let mut rng = SmallRng::seed_from_u64(0x9acc);

        for _ in 0..25 {
            let n_records = rng.random_range(1..40usize);
            let n_fields = rng.random_range(1..6usize);

            // One value kind per column. Mixed numeric columns deliberately normalize (a float
            // column turns integers into floats), so type-stable columns are used for strict
            // equality here.
            let kinds: Vec<u32> = (0..n_fields).map(|_| rng.random_range(0..5)).collect();

            let mut records = Vec::with_capacity(n_records);
            for _ in 0..n_records {
                let mut fields = Vec::new();
                for f in 0..n_fields {
                    // Randomly drop fields so schema unions and null bitmaps get exercised.
                    if !rng.random_bool(0.9) {
                        continue;
                    }

                    let value = match kinds[f] {
                        0 => Value::Bool(rng.random()),
                        1 => Value::Int(rng.random_range(-1_000_000..1_000_000)),
                        2 => Value::Float(
                            // Never an integral float: those are normalized to integers in
                            // batch mode.
                            f64::from(rng.random_range(-8_000i32..8_000) * 4 + 1) / 4.0,
                        ),
                        3 => Value::String(format!("s{}", rng.random_range(0..8))),
                        _ => Value::Mac(MacAddr::new([
                            0x02,
                            0x00,
                            0x00,
                            0x00,
                            0x00,
                            rng.random_range(0..4),
                        ])),
                    };
                    fields.push((format!("f{}", f), value));
                }
                records.push(Value::Object(fields));
            }

            assert_eq!(roundtrip_stream(&records), records);
        }
    }
}
