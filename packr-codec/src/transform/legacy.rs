// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Legacy byte transforms kept for wire compatibility: the move-to-front + zero-run-length
//! pipeline behind the 0x01 transform marker, and the zlib/deflate payloads behind the 0xFF
//! outer marker. The default encode path emits none of these; the encode halves exist for
//! legacy tooling and tests.

use std::io::Read;

use flate2::read::ZlibDecoder;

use packr_core::errors::{malformed_input_error, Result};

/// Move-to-front transform. Recently seen bytes map to small values, priming the data for
/// zero-run-length coding.
pub fn mtf_encode(data: &[u8]) -> Vec<u8> {
    let mut symbols: Vec<u8> = (0..=255).collect();
    let mut out = Vec::with_capacity(data.len());

    for &byte in data {
        let pos = symbols.iter().position(|&s| s == byte).unwrap();
        out.push(pos as u8);

        if pos > 0 {
            symbols.remove(pos);
            symbols.insert(0, byte);
        }
    }

    out
}

/// Inverse move-to-front transform.
pub fn mtf_decode(data: &[u8]) -> Vec<u8> {
    let mut symbols: Vec<u8> = (0..=255).collect();
    let mut out = Vec::with_capacity(data.len());

    for &pos in data {
        let byte = symbols[usize::from(pos)];
        out.push(byte);

        if pos > 0 {
            symbols.remove(usize::from(pos));
            symbols.insert(0, byte);
        }
    }

    out
}

/// Run-length coding specialized to zero runs:
///
/// - `0x00`: a single zero;
/// - `0x01`-`0xFD`: a literal byte;
/// - `0xFE <byte>`: an escaped literal 0xFE or 0xFF;
/// - `0xFF <count>`: a run of `count + 2` zeros.
pub fn zero_rle_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];

        if byte == 0 {
            let mut run = 0;
            while i + run < data.len() && data[i + run] == 0 && run < 255 {
                run += 1;
            }

            if run == 1 {
                out.push(0x00);
            }
            else {
                out.push(0xff);
                out.push((run - 2) as u8);
            }
            i += run;
        }
        else if byte == 0xfe || byte == 0xff {
            out.push(0xfe);
            out.push(byte);
            i += 1;
        }
        else {
            out.push(byte);
            i += 1;
        }
    }

    out
}

/// Inverse of [`zero_rle_encode`].
pub fn zero_rle_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];

        if byte == 0xff {
            if i + 1 >= data.len() {
                return malformed_input_error("zero-rle run truncated");
            }
            let run = usize::from(data[i + 1]) + 2;
            out.resize(out.len() + run, 0);
            i += 2;
        }
        else if byte == 0xfe {
            if i + 1 >= data.len() {
                return malformed_input_error("zero-rle escape truncated");
            }
            out.push(data[i + 1]);
            i += 2;
        }
        else {
            out.push(byte);
            i += 1;
        }
    }

    Ok(out)
}

/// Inflates a legacy zlib-wrapped deflate payload.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut decoder = ZlibDecoder::new(data);

    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(_) => malformed_input_error("invalid deflate stream"),
    }
}
