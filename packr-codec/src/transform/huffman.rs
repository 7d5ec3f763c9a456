// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Canonical Huffman coder for the optional entropy stage of the back-end transform.
//!
//! The stream layout is: a marker byte (0x01 coded, 0x02 single-symbol, 0x00 empty), the 4-byte
//! little-endian original length, a 2-byte little-endian symbol count, `(symbol, code_length)`
//! pairs in canonical order, and the MSB-first bitstream. Code lengths are limited to 15 bits;
//! the compressor declines inputs whose tree would exceed that instead of emitting an invalid
//! table.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use packr_core::errors::{malformed_input_error, Result};
use packr_core::io::{BitReaderLtr, BitWriterLtr};

/// Marker byte of a Huffman-coded stream.
const MARKER_CODED: u8 = 0x01;
/// Marker byte of a single-symbol stream.
const MARKER_SINGLE: u8 = 0x02;
/// Marker byte of an empty stream.
const MARKER_EMPTY: u8 = 0x00;

/// The longest admissible code.
const MAX_CODE_LEN: u8 = 15;

enum Node {
    Leaf(u8),
    Internal(usize, usize),
}

/// Walks the tree iteratively, assigning each leaf its depth as a code length.
fn assign_lengths(nodes: &[Node], root: usize, lengths: &mut [u8; 256]) -> u8 {
    let mut max_len = 0;
    let mut stack = vec![(root, 0u8)];

    while let Some((idx, depth)) = stack.pop() {
        match nodes[idx] {
            Node::Leaf(sym) => {
                // A two-node tree still needs one bit per symbol.
                let len = depth.max(1);
                lengths[usize::from(sym)] = len;
                max_len = max_len.max(len);
            }
            Node::Internal(left, right) => {
                stack.push((left, depth.saturating_add(1)));
                stack.push((right, depth.saturating_add(1)));
            }
        }
    }

    max_len
}

/// Assigns canonical codes to symbols sorted by `(code_length, symbol)`.
fn canonical_codes(sorted: &[(u8, u8)]) -> Vec<(u8, u8, u32)> {
    let mut codes = Vec::with_capacity(sorted.len());
    let mut code = 0u32;
    let mut prev_len = 0u8;

    for &(sym, len) in sorted {
        if len > prev_len {
            code <<= len - prev_len;
        }
        codes.push((sym, len, code));
        code += 1;
        prev_len = len;
    }

    codes
}

/// Compresses a buffer with canonical Huffman coding. Returns `None` when the input would need
/// codes longer than 15 bits; the caller is expected to fall back to an uncoded form.
pub fn huffman_compress(data: &[u8]) -> Option<Vec<u8>> {
    if data.is_empty() {
        return Some(vec![MARKER_EMPTY, 0, 0, 0, 0]);
    }

    let mut counts = [0u64; 256];
    for &byte in data {
        counts[usize::from(byte)] += 1;
    }

    let n_symbols = counts.iter().filter(|&&c| c > 0).count();

    if n_symbols == 1 {
        let sym = counts.iter().position(|&c| c > 0).unwrap() as u8;
        let mut out = vec![MARKER_SINGLE];
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.push(sym);
        return Some(out);
    }

    // Build the tree bottom-up from a min-heap keyed on (count, tie-break).
    let mut nodes = Vec::with_capacity(2 * n_symbols);
    let mut heap = BinaryHeap::with_capacity(n_symbols);

    for (sym, &count) in counts.iter().enumerate() {
        if count > 0 {
            nodes.push(Node::Leaf(sym as u8));
            heap.push(Reverse((count, sym as u64, nodes.len() - 1)));
        }
    }

    let mut tie = 256u64;
    while heap.len() > 1 {
        let Reverse((count_a, _, a)) = heap.pop().unwrap();
        let Reverse((count_b, _, b)) = heap.pop().unwrap();
        nodes.push(Node::Internal(a, b));
        heap.push(Reverse((count_a + count_b, tie, nodes.len() - 1)));
        tie += 1;
    }

    let Reverse((_, _, root)) = heap.pop().unwrap();

    let mut lengths = [0u8; 256];
    if assign_lengths(&nodes, root, &mut lengths) > MAX_CODE_LEN {
        return None;
    }

    let mut sorted: Vec<(u8, u8)> = lengths
        .iter()
        .enumerate()
        .filter(|(_, &len)| len > 0)
        .map(|(sym, &len)| (sym as u8, len))
        .collect();
    sorted.sort_by_key(|&(sym, len)| (len, sym));

    let codes = canonical_codes(&sorted);

    let mut code_of = [(0u8, 0u32); 256];
    for &(sym, len, code) in &codes {
        code_of[usize::from(sym)] = (len, code);
    }

    let mut out = vec![MARKER_CODED];
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(sorted.len() as u16).to_le_bytes());
    for &(sym, len) in &sorted {
        out.push(sym);
        out.push(len);
    }

    let mut writer = BitWriterLtr::new();
    for &byte in data {
        let (len, code) = code_of[usize::from(byte)];
        writer.write_bits_leq32(code, u32::from(len));
    }
    out.extend(writer.into_bytes());

    Some(out)
}

/// Decompresses a canonical Huffman stream.
pub fn huffman_decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 5 {
        return malformed_input_error("huffman stream too short");
    }

    let marker = data[0];

    if marker == MARKER_EMPTY {
        return Ok(Vec::new());
    }

    let orig_len = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;

    if marker == MARKER_SINGLE {
        if data.len() < 6 {
            return malformed_input_error("huffman single-symbol stream truncated");
        }
        return Ok(vec![data[5]; orig_len]);
    }

    if marker != MARKER_CODED {
        return malformed_input_error("unknown huffman marker");
    }

    if data.len() < 7 {
        return malformed_input_error("huffman symbol table truncated");
    }

    let n_symbols = usize::from(u16::from_le_bytes([data[5], data[6]]));
    let table_end = 7 + n_symbols * 2;

    if n_symbols == 0 || n_symbols > 256 || data.len() < table_end {
        return malformed_input_error("huffman symbol table truncated");
    }

    let mut sorted = Vec::with_capacity(n_symbols);
    for i in 0..n_symbols {
        let sym = data[7 + i * 2];
        let len = data[7 + i * 2 + 1];
        if len == 0 || len > MAX_CODE_LEN {
            return malformed_input_error("huffman code length out of range");
        }
        sorted.push((sym, len));
    }
    sorted.sort_by_key(|&(sym, len)| (len, sym));

    let mut table: HashMap<(u8, u32), u8> = HashMap::with_capacity(n_symbols);
    for (sym, len, code) in canonical_codes(&sorted) {
        table.insert((len, code), sym);
    }

    let mut reader = BitReaderLtr::new(&data[table_end..]);
    let mut out = Vec::with_capacity(orig_len);

    while out.len() < orig_len {
        let mut code = 0u32;
        let mut len = 0u8;

        loop {
            code = (code << 1) | u32::from(reader.read_bit()?);
            len += 1;

            if let Some(&sym) = table.get(&(len, code)) {
                out.push(sym);
                break;
            }

            if len >= MAX_CODE_LEN {
                return malformed_input_error("huffman code not in table");
            }
        }
    }

    Ok(out)
}
