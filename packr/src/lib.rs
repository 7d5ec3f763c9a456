// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # Project Packr
//!
//! Packr is a 100% pure Rust structure-aware compression codec for streams of semi-structured
//! records: the homogeneous, scalar-heavy objects typical of telemetry workloads. Where
//! general-purpose compressors see opaque bytes, Packr sees schema regularity, and spends it:
//!
//! * field names, repeated strings, and MAC addresses collapse into one-byte dictionary
//!   references backed by three 64-slot LRU dictionaries;
//! * numeric fields are delta-coded against per-field history;
//! * homogeneous record sequences are transposed column-major, with per-column encodings
//!   (constant, bit-packed or Rice-coded deltas, run-length) and null bitmaps;
//! * the resulting CRC-checked frame may pass through a byte-level LZ77 back-end with adaptive
//!   entropy detection.
//!
//! # Usage
//!
//! Use [`PackrEncoder`] and [`PackrDecoder`] for streams that share dictionary state across
//! frames, or the module-level [`encode`]/[`decode`] helpers for one-shot conversions.
//!
//! ```
//! use packr::{decode_stream, encode_stream, Value};
//!
//! # fn main() -> packr::Result<()> {
//! let records = vec![
//!     Value::Object(vec![
//!         ("seq".to_string(), Value::Int(1)),
//!         ("rssi".to_string(), Value::Int(-60)),
//!     ]),
//!     Value::Object(vec![
//!         ("seq".to_string(), Value::Int(2)),
//!         ("rssi".to_string(), Value::Int(-60)),
//!     ]),
//! ];
//!
//! let wire = encode_stream(&records)?;
//! assert_eq!(decode_stream(&wire)?, records);
//! # Ok(())
//! # }
//! ```

pub use packr_core::errors::{Error, Result};
pub use packr_core::value::{MacAddr, Value};

pub use packr_codec::{
    Compression, DecoderOptions, EncoderOptions, PackrDecoder, PackrEncoder, DICT_SIZE,
    FRAME_MAGIC, FRAME_VERSION,
};

pub mod core {
    //! Re-export of the `packr-core` infrastructure crate.
    pub use packr_core::*;
}

pub mod codec {
    //! Re-export of the `packr-codec` implementation crate.
    pub use packr_codec::*;
}

/// Encodes a single value with a fresh default encoder.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    PackrEncoder::default().encode(value)
}

/// Encodes a sequence of values with a fresh default encoder.
pub fn encode_stream(values: &[Value]) -> Result<Vec<u8>> {
    PackrEncoder::default().encode_stream(values)
}

/// Decodes one wire artifact with a fresh default decoder.
pub fn decode(data: &[u8]) -> Result<Value> {
    PackrDecoder::default().decode(data)
}

/// Decodes a wire artifact into the sequence of values it carries, with a fresh default
/// decoder.
pub fn decode_stream(data: &[u8]) -> Result<Vec<Value>> {
    PackrDecoder::default().decode_stream(data)
}
