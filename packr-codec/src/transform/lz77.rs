// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte-level LZ77 compressor with adaptive entropy detection and early abort.
//!
//! The stream begins with an inner format byte (0x02 compressed, 0x00 stored) and a 4-byte
//! little-endian original length. The compressed body is a sequence of tokens, each opening with
//! a control byte: high nibble = literal count, low nibble = match length - 3, either nibble
//! extended by additional bytes (summing, terminated by a byte < 255) when it saturates at 15.
//! The control byte and extensions are followed by the literal bytes and, if a match follows, a
//! 2-byte little-endian back-reference offset. A trailing literal-only token has no sentinel;
//! the decoder stops once the declared original length is reached.

use std::collections::HashMap;

use log::debug;

use packr_core::errors::{malformed_input_error, Result};

/// Inner format byte of a stored (uncompressed) stream.
pub const INNER_STORED: u8 = 0x00;
/// Inner format byte of an LZ77-compressed stream.
pub const INNER_LZ: u8 = 0x02;

/// Minimum back-reference length.
const MIN_MATCH: usize = 3;
/// Maximum match a single nibble extension chain is allowed to express (15 + 255 + 3).
const MAX_MATCH: usize = 273;
/// Maximum back-reference distance. Kept small so the decoder window suits embedded targets.
const MAX_OFFSET: usize = 8191;
/// Each hash bucket retains at most this many recent positions.
const MAX_BUCKET_POSITIONS: usize = 32;

fn stored(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + data.len());
    out.push(INNER_STORED);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

#[inline(always)]
fn hash4(data: &[u8], pos: usize) -> Option<u32> {
    if pos + 3 >= data.len() {
        return None;
    }
    let word = u32::from(data[pos])
        | (u32::from(data[pos + 1]) << 8)
        | (u32::from(data[pos + 2]) << 16)
        | (u32::from(data[pos + 3]) << 24);
    Some(word & 0x00ff_ffff)
}

/// Appends a nibble extension chain: bytes of 255 summing with a final byte < 255.
fn push_extension(out: &mut Vec<u8>, mut remaining: usize) {
    while remaining >= 255 {
        out.push(255);
        remaining -= 255;
    }
    out.push(remaining as u8);
}

struct MatchFinder {
    buckets: HashMap<u32, Vec<u32>>,
    search_limit: usize,
    attempts: u32,
    matches: u32,
}

impl MatchFinder {
    fn new(search_limit: usize) -> Self {
        MatchFinder { buckets: HashMap::new(), search_limit, attempts: 0, matches: 0 }
    }

    fn insert(&mut self, data: &[u8], pos: usize) {
        if let Some(h) = hash4(data, pos) {
            let positions = self.buckets.entry(h).or_default();
            positions.push(pos as u32);
            if positions.len() > MAX_BUCKET_POSITIONS {
                positions.remove(0);
            }
        }
    }

    /// Finds the best match at `pos`, searching the most recent bucket positions first.
    fn find(&mut self, data: &[u8], pos: usize) -> (usize, usize) {
        let mut best_len = 0;
        let mut best_off = 0;

        let h = match hash4(data, pos) {
            Some(h) => h,
            None => return (0, 0),
        };

        let positions = match self.buckets.get(&h) {
            Some(positions) => positions,
            None => return (0, 0),
        };

        let max_len = MAX_MATCH.min(data.len() - pos);

        for &prev in positions.iter().rev().take(self.search_limit) {
            let prev = prev as usize;
            let offset = pos - prev;
            if offset < 1 || offset > MAX_OFFSET {
                continue;
            }

            let mut len = 0;
            while len < max_len && data[prev + len] == data[pos + len] {
                len += 1;
            }

            if len >= MIN_MATCH && len > best_len {
                best_len = len;
                best_off = offset;

                // A long match is good enough; stop searching the bucket.
                if len >= 32 {
                    break;
                }
            }
        }

        self.attempts += 1;
        if best_len > 0 {
            self.matches += 1;
        }

        (best_len, best_off)
    }

    /// Returns true once enough probes have failed that the input is clearly high-entropy.
    fn should_abort(&self) -> bool {
        self.attempts > 200 && f64::from(self.matches) < f64::from(self.attempts) * 0.08
    }
}

/// Compresses a buffer. Falls back to the stored form whenever compression is not a win: tiny
/// inputs, high-entropy inputs caught by the sample probe or the match-rate abort, and streams
/// whose compressed form is not smaller.
pub fn lz_compress(data: &[u8]) -> Vec<u8> {
    if data.len() < 4 {
        return stored(data);
    }

    // Probe the head of the buffer. A sample dominated by unique bytes will not compress, so
    // skip the main loop entirely.
    let sample_len = data.len().min(1024);
    let mut seen = [false; 256];
    let mut unique = 0usize;
    for &byte in &data[..sample_len] {
        if !seen[usize::from(byte)] {
            seen[usize::from(byte)] = true;
            unique += 1;
        }
    }

    let entropy_ratio = unique as f64 / sample_len as f64;
    if entropy_ratio > 0.80 {
        debug!("lz77: entropy probe {:.2}, emitting stored", entropy_ratio);
        return stored(data);
    }

    let search_limit = if entropy_ratio > 0.70 {
        8
    }
    else if entropy_ratio > 0.50 {
        16
    }
    else {
        32
    };

    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    out.push(INNER_LZ);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());

    let mut finder = MatchFinder::new(search_limit);
    let mut pos = 0;
    let mut literal_start = 0;

    while pos < data.len() {
        if finder.should_abort() {
            debug!(
                "lz77: aborting after {} attempts with {} matches",
                finder.attempts, finder.matches
            );
            return stored(data);
        }

        let (best_len, best_off) = finder.find(data, pos);

        // A bare match costs a control byte and a 2-byte offset, so a 3-byte match only pays for
        // itself when a pending literal run already needs the control byte.
        let min_worthwhile = if pos > literal_start { 3 } else { 4 };

        if best_len >= min_worthwhile {
            let lit_count = pos - literal_start;
            let match_code = best_len - MIN_MATCH;

            let lit_nibble = lit_count.min(15);
            let match_nibble = match_code.min(15);
            out.push(((lit_nibble as u8) << 4) | match_nibble as u8);

            if lit_nibble == 15 {
                push_extension(&mut out, lit_count - 15);
            }

            out.extend_from_slice(&data[literal_start..pos]);

            if match_nibble == 15 {
                push_extension(&mut out, match_code - 15);
            }

            out.extend_from_slice(&(best_off as u16).to_le_bytes());

            for i in 0..best_len {
                finder.insert(data, pos + i);
            }

            pos += best_len;
            literal_start = pos;
        }
        else {
            finder.insert(data, pos);
            pos += 1;
        }
    }

    // Trailing literals, emitted as a final token with no match.
    if literal_start < data.len() {
        let lit_count = data.len() - literal_start;
        let lit_nibble = lit_count.min(15);
        out.push((lit_nibble as u8) << 4);

        if lit_nibble == 15 {
            push_extension(&mut out, lit_count - 15);
        }

        out.extend_from_slice(&data[literal_start..]);
    }

    if out.len() < data.len() {
        out
    }
    else {
        stored(data)
    }
}

/// Reads a nibble extension chain at `pos`, returning the summed extension.
fn read_extension(data: &[u8], pos: &mut usize) -> Result<usize> {
    let mut total = 0usize;
    loop {
        if *pos >= data.len() {
            return malformed_input_error("lz77 extension truncated");
        }
        let extra = data[*pos];
        *pos += 1;
        total += usize::from(extra);
        if extra < 255 {
            return Ok(total);
        }
    }
}

/// Decompresses an LZ77 stream (stored or compressed inner form). The declared original length
/// is authoritative: decoding stops once it is reached and never consumes bytes past the final
/// token.
pub fn lz_decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 5 {
        return malformed_input_error("lz77 stream too short");
    }

    let format = data[0];
    let orig_len = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;

    if format == INNER_STORED {
        if data.len() < 5 + orig_len {
            return malformed_input_error("stored stream shorter than declared length");
        }
        return Ok(data[5..5 + orig_len].to_vec());
    }

    if format != INNER_LZ {
        return malformed_input_error("unknown lz77 inner format");
    }

    let mut out: Vec<u8> = Vec::with_capacity(orig_len);
    let mut pos = 5;

    while pos < data.len() && out.len() < orig_len {
        let ctrl = data[pos];
        pos += 1;

        let mut lit_count = usize::from(ctrl >> 4);
        let match_code = usize::from(ctrl & 0x0f);

        if lit_count == 15 {
            lit_count += read_extension(data, &mut pos)?;
        }

        if pos + lit_count > data.len() {
            return malformed_input_error("lz77 literal run truncated");
        }
        out.extend_from_slice(&data[pos..pos + lit_count]);
        pos += lit_count;

        // A trailing literal-only token carries no match.
        if pos >= data.len() || out.len() >= orig_len {
            break;
        }

        let mut match_len = match_code + MIN_MATCH;
        if match_code == 15 {
            match_len += read_extension(data, &mut pos)?;
        }

        if pos + 2 > data.len() {
            return malformed_input_error("lz77 match offset truncated");
        }
        let offset = usize::from(u16::from_le_bytes([data[pos], data[pos + 1]]));
        pos += 2;

        if offset == 0 || offset > out.len() {
            return malformed_input_error("lz77 back-reference out of range");
        }

        // Matches may overlap their own output, so copy byte-at-a-time.
        let start = out.len() - offset;
        for i in 0..match_len {
            let byte = out[start + i];
            out.push(byte);
        }
    }

    if out.len() < orig_len {
        return malformed_input_error("lz77 output shorter than declared length");
    }

    out.truncate(orig_len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::{lz_compress, lz_decompress, INNER_LZ, INNER_STORED};

    #[test]
    fn verify_roundtrip_compressible() {
        let mut data = Vec::new();
        for i in 0..200u32 {
            data.extend_from_slice(b"sensor=");
            data.extend_from_slice(&(i % 7).to_le_bytes());
        }

        let compressed = lz_compress(&data);
        assert_eq!(compressed[0], INNER_LZ);
        assert!(compressed.len() < data.len());
        assert_eq!(lz_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn verify_roundtrip_overlapping_match() {
        // Runs decode through overlapping back-references with offset 1.
        let data = vec![0x42u8; 4096];
        let compressed = lz_compress(&data);
        assert_eq!(compressed[0], INNER_LZ);
        assert_eq!(lz_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn verify_tiny_input_is_stored() {
        let data = [1u8, 2, 3];
        let compressed = lz_compress(&data);
        assert_eq!(compressed[0], INNER_STORED);
        assert_eq!(lz_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn verify_empty_input() {
        let compressed = lz_compress(&[]);
        assert_eq!(compressed, [INNER_STORED, 0, 0, 0, 0]);
        assert_eq!(lz_decompress(&compressed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn verify_entropy_probe_emits_stored() {
        // Every sampled byte unique: the probe fires before any matching is attempted.
        let data: Vec<u8> = (0..=255u8).collect();
        let compressed = lz_compress(&data);
        assert_eq!(compressed[0], INNER_STORED);
        assert_eq!(lz_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn verify_incompressible_input_falls_back() {
        let mut rng = SmallRng::seed_from_u64(0x1eaf);
        let data: Vec<u8> = (0..4096).map(|_| rng.random()).collect();

        let compressed = lz_compress(&data);
        assert_eq!(compressed[0], INNER_STORED);
        assert_eq!(lz_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn verify_long_literal_and_match_extensions() {
        // A long unique prefix (> 15 literals) followed by a long repeat (> 18 match bytes).
        let mut rng = SmallRng::seed_from_u64(7);
        let mut data: Vec<u8> = (0..600).map(|_| rng.random_range(0..8u8)).collect();
        let tail = data[..300].to_vec();
        data.extend_from_slice(&tail);

        let compressed = lz_compress(&data);
        assert_eq!(lz_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn verify_rejects_corrupt_streams() {
        assert!(lz_decompress(&[]).is_err());
        assert!(lz_decompress(&[INNER_LZ, 1, 0, 0]).is_err());
        // Unknown inner format byte.
        assert!(lz_decompress(&[0x07, 0, 0, 0, 0]).is_err());
        // Declares 4 bytes but carries none.
        assert!(lz_decompress(&[INNER_STORED, 4, 0, 0, 0]).is_err());
        // A back-reference into nothing.
        assert!(lz_decompress(&[INNER_LZ, 8, 0, 0, 0, 0x00, 0x01, 0x00]).is_err());
    }
}
