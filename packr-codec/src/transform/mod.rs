// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `transform` module implements the byte-level back-end applied after frame serialization.
//!
//! A wire artifact is zero or more transform markers prefixed to a frame. The encoder emits at
//! most one marker (0x03, or 0x05 when the optional Huffman stage wins); the decoder strips
//! markers iteratively, including the legacy 0xFE wrapper and 0xFF zlib forms, until none match
//! and a bare frame remains.

use std::borrow::Cow;

use log::debug;

use packr_core::errors::{malformed_input_error, Result};

mod huffman;
mod legacy;
mod lz77;

pub use huffman::{huffman_compress, huffman_decompress};
pub use legacy::{inflate, mtf_decode, mtf_encode, zero_rle_decode, zero_rle_encode};
pub use lz77::{lz_compress, lz_decompress};

/// Stored payload: 4-byte little-endian original length, then raw bytes.
pub const MARKER_STORED: u8 = 0x00;
/// Legacy MTF + zero-RLE payload. Decode only.
pub const MARKER_MTF_ZRLE: u8 = 0x01;
/// LZ77 payload.
pub const MARKER_LZ: u8 = 0x03;
/// Huffman payload.
pub const MARKER_HUFFMAN: u8 = 0x04;
/// LZ77 output wrapped in Huffman coding: undo Huffman, then LZ77.
pub const MARKER_LZ_HUFFMAN: u8 = 0x05;
/// Huffman output wrapped in LZ77: undo LZ77, then Huffman. Decode only.
pub const MARKER_HUFFMAN_LZ: u8 = 0x06;
/// Legacy wrapper byte: stripped, and the remainder re-dispatched. Decode only.
pub const MARKER_LEGACY_WRAPPER: u8 = 0xfe;
/// Legacy zlib/deflate payload. Decode only.
pub const MARKER_LEGACY_DEFLATE: u8 = 0xff;

/// Frames at or below this size are never worth a compression pass.
const MIN_COMPRESS_LEN: usize = 20;

/// Selects the back-end applied to serialized frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    /// Emit raw frames.
    None,
    /// LZ77 when it wins, raw otherwise.
    #[default]
    Lz77,
    /// LZ77 plus an optional Huffman pass over the LZ output.
    Lz77Huffman,
}

/// Applies the configured back-end to a serialized frame, returning the wire artifact. The
/// transformed form is used only when strictly smaller than the raw frame.
pub fn apply_transform(raw: Vec<u8>, compression: Compression) -> Vec<u8> {
    if compression == Compression::None || raw.len() <= MIN_COMPRESS_LEN {
        return raw;
    }

    let lz = lz_compress(&raw);

    let mut best = raw;
    if lz[0] == lz77::INNER_LZ && lz.len() + 1 < best.len() {
        let mut wrapped = Vec::with_capacity(lz.len() + 1);
        wrapped.push(MARKER_LZ);
        wrapped.extend_from_slice(&lz);
        best = wrapped;
    }

    if compression == Compression::Lz77Huffman {
        if let Some(huff) = huffman_compress(&lz) {
            if huff.len() + 1 < best.len() {
                let mut wrapped = Vec::with_capacity(huff.len() + 1);
                wrapped.push(MARKER_LZ_HUFFMAN);
                wrapped.extend_from_slice(&huff);
                best = wrapped;
            }
        }
    }

    debug!(
        "transform: emitting {} bytes ({})",
        best.len(),
        match best.first() {
            Some(&MARKER_LZ) => "lz77",
            Some(&MARKER_LZ_HUFFMAN) => "lz77+huffman",
            _ => "raw",
        }
    );

    best
}

fn decode_stored(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 5 {
        return malformed_input_error("stored transform too short");
    }
    let orig_len = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;
    if data.len() < 5 + orig_len {
        return malformed_input_error("stored transform shorter than declared length");
    }
    Ok(data[5..5 + orig_len].to_vec())
}

fn decode_mtf_zrle(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 5 {
        return malformed_input_error("mtf transform too short");
    }
    let orig_len = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;
    let mut out = mtf_decode(&zero_rle_decode(&data[5..])?);
    if out.len() < orig_len {
        return malformed_input_error("mtf transform shorter than declared length");
    }
    out.truncate(orig_len);
    Ok(out)
}

/// Strips outer transform markers iteratively until none match, returning the bare frame bytes.
/// Input without any leading marker is passed through unchanged (and uncopied).
pub fn strip_transforms(input: &[u8]) -> Result<Cow<'_, [u8]>> {
    let mut data = Cow::Borrowed(input);

    loop {
        let marker = match data.first() {
            Some(&marker) => marker,
            None => break,
        };

        data = match marker {
            MARKER_STORED => Cow::Owned(decode_stored(&data)?),
            MARKER_MTF_ZRLE => Cow::Owned(decode_mtf_zrle(&data)?),
            MARKER_LZ => Cow::Owned(lz_decompress(&data[1..])?),
            MARKER_HUFFMAN => Cow::Owned(huffman_decompress(&data[1..])?),
            MARKER_LZ_HUFFMAN => {
                let lz = huffman_decompress(&data[1..])?;
                Cow::Owned(lz_decompress(&lz)?)
            }
            MARKER_HUFFMAN_LZ => {
                let huff = lz_decompress(&data[1..])?;
                Cow::Owned(huffman_decompress(&huff)?)
            }
            MARKER_LEGACY_WRAPPER => match data {
                Cow::Borrowed(buf) => Cow::Borrowed(&buf[1..]),
                Cow::Owned(buf) => Cow::Owned(buf[1..].to_vec()),
            },
            MARKER_LEGACY_DEFLATE => Cow::Owned(inflate(&data[1..])?),
            _ => break,
        };
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn frame_like(len: usize) -> Vec<u8> {
        // Low-entropy bytes that compress well; the leading 'P' keeps the head frame-shaped.
        let mut data = b"PKR1".to_vec();
        data.resize(len, 0x11);
        data
    }

    #[test]
    fn verify_small_frames_stay_raw() {
        let raw = frame_like(MIN_COMPRESS_LEN);
        assert_eq!(apply_transform(raw.clone(), Compression::Lz77), raw);
    }

    #[test]
    fn verify_compression_disabled() {
        let raw = frame_like(500);
        assert_eq!(apply_transform(raw.clone(), Compression::None), raw);
    }

    #[test]
    fn verify_lz_marker_roundtrip() {
        let raw = frame_like(500);
        let wire = apply_transform(raw.clone(), Compression::Lz77);

        assert_eq!(wire[0], MARKER_LZ);
        assert!(wire.len() < raw.len());
        assert_eq!(strip_transforms(&wire).unwrap().into_owned(), raw);
    }

    #[test]
    fn verify_lz_huffman_roundtrip() {
        let raw = frame_like(4000);
        let wire = apply_transform(raw.clone(), Compression::Lz77Huffman);
        assert_eq!(strip_transforms(&wire).unwrap().into_owned(), raw);
    }

    #[test]
    fn verify_unmarked_input_passes_through() {
        let raw = frame_like(64);
        let out = strip_transforms(&raw).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.into_owned(), raw);
    }

    #[test]
    fn verify_legacy_wrapper_and_marker_strip() {
        // A 0xFE wrapper followed by an LZ marker, both stripped.
        let raw = frame_like(300);
        let mut wire = apply_transform(raw.clone(), Compression::Lz77);
        assert_eq!(wire[0], MARKER_LZ);
        wire.insert(0, MARKER_LEGACY_WRAPPER);

        assert_eq!(strip_transforms(&wire).unwrap().into_owned(), raw);
    }

    #[test]
    fn verify_legacy_deflate_strip() {
        let raw = frame_like(128);

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&raw).unwrap();
        let mut wire = vec![MARKER_LEGACY_DEFLATE];
        wire.extend(encoder.finish().unwrap());

        assert_eq!(strip_transforms(&wire).unwrap().into_owned(), raw);
    }

    #[test]
    fn verify_legacy_mtf_zrle_strip() {
        let raw = frame_like(256);

        let mut wire = vec![MARKER_MTF_ZRLE];
        wire.extend_from_slice(&(raw.len() as u32).to_le_bytes());
        wire.extend(zero_rle_encode(&mtf_encode(&raw)));

        assert_eq!(strip_transforms(&wire).unwrap().into_owned(), raw);
    }

    #[test]
    fn verify_stored_marker_strip() {
        let raw = frame_like(40);

        let mut wire = vec![MARKER_STORED];
        wire.extend_from_slice(&(raw.len() as u32).to_le_bytes());
        wire.extend_from_slice(&raw);

        assert_eq!(strip_transforms(&wire).unwrap().into_owned(), raw);
    }
}
