// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `primitive` module implements the wire primitives shared by every layer of the codec:
//! base-128 varints, zigzag signed varints, and 8.8/16.16 fixed-point numbers.

use packr_core::errors::{malformed_input_error, Result};
use packr_core::io::{ReadBytes, WriteBytes};

/// The highest shift a varint continuation may reach. Continuations past this point would
/// produce values outside the wire domain and are rejected as malformed.
const MAX_VARINT_SHIFT: u32 = 35;

/// Writes an unsigned integer as a little-endian base-128 varint, using the high bit of each
/// byte as a continuation flag.
pub fn write_varint<W: WriteBytes>(writer: &mut W, mut value: u64) {
    while value > 0x7f {
        writer.write_byte(((value & 0x7f) as u8) | 0x80);
        value >>= 7;
    }
    writer.write_byte((value & 0x7f) as u8);
}

/// Reads an unsigned base-128 varint or returns an error if the input ends mid-varint or the
/// continuation runs past the wire domain.
pub fn read_varint<B: ReadBytes>(reader: &mut B) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;

    loop {
        let byte = match reader.read_byte() {
            Ok(byte) => byte,
            Err(_) => return malformed_input_error("incomplete varint"),
        };

        value |= u64::from(byte & 0x7f) << shift;

        if byte & 0x80 == 0 {
            break;
        }

        shift += 7;

        if shift > MAX_VARINT_SHIFT {
            return malformed_input_error("varint too long");
        }
    }

    Ok(value)
}

/// Computes the encoded byte length of a varint without writing it.
pub fn varint_len(value: u64) -> usize {
    let mut len = 1;
    let mut value = value >> 7;
    while value > 0 {
        len += 1;
        value >>= 7;
    }
    len
}

/// Returns true if a signed value fits the wire domain admitted by the varint shift guard.
pub fn fits_wire_domain(value: i64) -> bool {
    zigzag_encode(value) < (1 << (MAX_VARINT_SHIFT + 7))
}

/// Maps a signed integer onto the unsigned domain: 0, -1, 1, -2, 2, ... become 0, 1, 2, 3, 4...
#[inline(always)]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline(always)]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Writes a signed integer as a zigzag varint.
pub fn write_signed_varint<W: WriteBytes>(writer: &mut W, value: i64) {
    write_varint(writer, zigzag_encode(value));
}

/// Reads a zigzag varint as a signed integer.
pub fn read_signed_varint<B: ReadBytes>(reader: &mut B) -> Result<i64> {
    Ok(zigzag_decode(read_varint(reader)?))
}

/// Writes a float in 8.8 fixed-point form, rounded and clamped to the `i16` range. The usable
/// value range is roughly ±128 with a precision of 1/256.
pub fn write_fixed16<W: WriteBytes>(writer: &mut W, value: f64) {
    let scaled = (value * 256.0).round();
    writer.write_i16(scaled.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16);
}

/// Reads an 8.8 fixed-point float.
pub fn read_fixed16<B: ReadBytes>(reader: &mut B) -> Result<f64> {
    Ok(f64::from(reader.read_i16()?) / 256.0)
}

/// Writes a float in 16.16 fixed-point form, rounded and clamped to the `i32` range. The usable
/// value range is roughly ±32768 with a precision of 1/65536.
pub fn write_fixed32<W: WriteBytes>(writer: &mut W, value: f64) {
    let scaled = (value * 65536.0).round();
    writer.write_i32(scaled.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32);
}

/// Reads a 16.16 fixed-point float.
pub fn read_fixed32<B: ReadBytes>(reader: &mut B) -> Result<f64> {
    Ok(f64::from(reader.read_i32()?) / 65536.0)
}
