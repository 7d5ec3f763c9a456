// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `rice` module implements Rice/Golomb coding of small non-negative integers.
//!
//! Each value is split at the Rice parameter `k`: the quotient `value >> k` is written in unary
//! (zeros terminated by a one), and the low `k` bits are written verbatim, MSB first. The
//! encoded stream is prefixed with a single byte carrying `k` so the decoder can recover it. The
//! bitstream is self-delimiting only by value count; the surrounding format must carry the count.

use packr_core::errors::{malformed_input_error, Result};
use packr_core::io::{BitReaderLtr, BitWriterLtr};

use crate::primitive::{zigzag_decode, zigzag_encode};

/// The largest Rice parameter the wire format admits.
pub const MAX_RICE_PARAM: u8 = 7;

/// Selects the Rice parameter for a set of deltas whose largest magnitude is `max_abs`:
/// `clamp(bit_length(max_abs) - 2, 0, 7)`.
pub fn rice_parameter(max_abs: u64) -> u8 {
    let bit_length = (u64::BITS - max_abs.leading_zeros()) as i32;
    (bit_length - 2).clamp(0, i32::from(MAX_RICE_PARAM)) as u8
}

/// Computes the exact encoded byte length, including the parameter byte, of Rice coding the
/// zigzagged deltas with parameter `k`.
pub fn rice_encoded_len(deltas: &[i64], k: u8) -> usize {
    let bits: u64 = deltas
        .iter()
        .map(|&d| {
            let u = zigzag_encode(d);
            (u >> k) + 1 + u64::from(k)
        })
        .sum();

    1 + ((bits + 7) / 8) as usize
}

/// Rice encoder writing signed values as zigzagged Rice codes.
pub struct RiceEncoder {
    k: u8,
    writer: BitWriterLtr,
}

impl RiceEncoder {
    /// Instantiate a new `RiceEncoder` with the given parameter. `k` must not exceed
    /// [`MAX_RICE_PARAM`].
    pub fn new(k: u8) -> Self {
        debug_assert!(k <= MAX_RICE_PARAM);
        RiceEncoder { k, writer: BitWriterLtr::new() }
    }

    /// Encodes one non-negative value.
    pub fn encode(&mut self, value: u32) {
        let quotient = value >> self.k;
        let remainder = value & ((1u32 << self.k) - 1);

        self.writer.write_unary_zeros(quotient);
        self.writer.write_bits_leq32(remainder, u32::from(self.k));
    }

    /// Encodes one signed value by zigzag mapping it onto the non-negative domain.
    pub fn encode_signed(&mut self, value: i64) {
        self.encode(zigzag_encode(value) as u32);
    }

    /// Finishes the stream, padding the final partial byte with low zeros, and returns the
    /// parameter byte followed by the bitstream.
    pub fn finish(self) -> Vec<u8> {
        let mut out = vec![self.k];
        out.extend(self.writer.into_bytes());
        out
    }
}

/// Rice decoder reading zigzagged Rice codes. The first input byte is the parameter.
pub struct RiceDecoder<'a> {
    k: u8,
    reader: BitReaderLtr<'a>,
}

impl<'a> RiceDecoder<'a> {
    /// Instantiate a new `RiceDecoder` over a buffer beginning with the parameter byte.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let (&k, rest) = match buf.split_first() {
            Some(split) => split,
            None => return malformed_input_error("rice stream missing parameter byte"),
        };

        if k > MAX_RICE_PARAM {
            return malformed_input_error("rice parameter out of range");
        }

        Ok(RiceDecoder { k, reader: BitReaderLtr::new(rest) })
    }

    /// Gets the Rice parameter read from the stream.
    pub fn k(&self) -> u8 {
        self.k
    }

    /// Decodes one non-negative value.
    pub fn decode(&mut self) -> Result<u32> {
        let quotient = self.reader.read_unary_zeros()?;
        let remainder = self.reader.read_bits_leq32(u32::from(self.k))?;
        Ok((quotient << self.k) | remainder)
    }

    /// Decodes one signed value.
    pub fn decode_signed(&mut self) -> Result<i64> {
        Ok(zigzag_decode(u64::from(self.decode()?)))
    }

    /// Gets the total number of input bytes consumed, including the parameter byte. A partially
    /// read byte counts as consumed, so the surrounding format can resume byte-aligned reading
    /// directly past the Rice payload.
    pub fn bytes_consumed(&self) -> usize {
        1 + self.reader.bytes_consumed()
    }
}

#[cfg(test)]
mod tests {
    use super::{rice_encoded_len, rice_parameter, RiceDecoder, RiceEncoder, MAX_RICE_PARAM};

    #[test]
    fn verify_rice_parameter_selection() {
        assert_eq!(rice_parameter(0), 0);
        assert_eq!(rice_parameter(1), 0);
        assert_eq!(rice_parameter(4), 1);
        assert_eq!(rice_parameter(8), 2);
        assert_eq!(rice_parameter(100), 5);
        assert_eq!(rice_parameter(1023), MAX_RICE_PARAM);
        assert_eq!(rice_parameter(u64::MAX), MAX_RICE_PARAM);
    }

    #[test]
    fn verify_roundtrip() {
        for k in 0..=MAX_RICE_PARAM {
            let values = [0u32, 1, 2, 3, 7, 8, 100, 500, 2047];

            let mut encoder = RiceEncoder::new(k);
            for &v in &values {
                encoder.encode(v);
            }

            let buf = encoder.finish();
            assert_eq!(buf[0], k);

            let mut decoder = RiceDecoder::new(&buf).unwrap();
            for &v in &values {
                assert_eq!(decoder.decode().unwrap(), v);
            }
        }
    }

    #[test]
    fn verify_signed_roundtrip() {
        let deltas = [0i64, 1, -1, 5, -9, 511, -512, 1023];

        let mut encoder = RiceEncoder::new(3);
        for &d in &deltas {
            encoder.encode_signed(d);
        }

        let buf = encoder.finish();
        assert_eq!(buf.len(), rice_encoded_len(&deltas, 3));

        let mut decoder = RiceDecoder::new(&buf).unwrap();
        for &d in &deltas {
            assert_eq!(decoder.decode_signed().unwrap(), d);
        }
    }

    #[test]
    fn verify_bytes_consumed() {
        let mut encoder = RiceEncoder::new(2);
        encoder.encode(5);
        encoder.encode(0);

        // Trailing bytes past the Rice payload must not be touched.
        let mut buf = encoder.finish();
        let payload_len = buf.len();
        buf.extend_from_slice(&[0xaa, 0xbb]);

        let mut decoder = RiceDecoder::new(&buf).unwrap();
        decoder.decode().unwrap();
        decoder.decode().unwrap();
        assert_eq!(decoder.bytes_consumed(), payload_len);
    }

    #[test]
    fn verify_rejects_bad_streams() {
        assert!(RiceDecoder::new(&[]).is_err());
        // Parameter byte out of range.
        assert!(RiceDecoder::new(&[8, 0x00]).is_err());
        // Unary run that never terminates.
        let mut decoder = RiceDecoder::new(&[0, 0x00]).unwrap();
        assert!(decoder.decode().is_err());
    }
}
