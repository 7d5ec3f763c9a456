// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements composable bit- and byte-level I/O over in-memory buffers.
//!
//! All `Reader`s operating on bytes of data at a time implement the [`ReadBytes`] trait, and
//! sinks accepting bytes implement [`WriteBytes`]. Readers and writers operating on bits of data
//! at a time consume and produce bits from most-significant to least-significant.

use std::mem;

use crate::errors::Result;

mod bit;
mod buf_reader;
mod monitor_stream;

pub use bit::{BitReaderLtr, BitWriterLtr};
pub use buf_reader::BufReader;
pub use monitor_stream::{Monitor, MonitorStream};

/// `ReadBytes` provides methods to read bytes and interpret them as little-endian unsigned
/// integers or floating-point values of standard widths.
pub trait ReadBytes {
    /// Reads a single byte from the stream and returns it or an error.
    fn read_byte(&mut self) -> Result<u8>;

    /// Reads two bytes from the stream and returns them in read-order or an error.
    fn read_double_bytes(&mut self) -> Result<[u8; 2]>;

    /// Reads four bytes from the stream and returns them in read-order or an error.
    fn read_quad_bytes(&mut self) -> Result<[u8; 4]>;

    /// Reads exactly the number of bytes required to fill the provided buffer or returns an
    /// error.
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Reads a single unsigned byte from the stream and returns it or an error.
    #[inline(always)]
    fn read_u8(&mut self) -> Result<u8> {
        self.read_byte()
    }

    /// Reads two bytes from the stream and interprets them as an unsigned 16-bit little-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_double_bytes()?))
    }

    /// Reads two bytes from the stream and interprets them as a signed 16-bit little-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_double_bytes()?))
    }

    /// Reads four bytes from the stream and interprets them as an unsigned 32-bit little-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_quad_bytes()?))
    }

    /// Reads four bytes from the stream and interprets them as a signed 32-bit little-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_quad_bytes()?))
    }

    /// Reads eight bytes from the stream and interprets them as a 64-bit little-endian IEEE-754
    /// floating-point value.
    #[inline(always)]
    fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; mem::size_of::<u64>()];
        self.read_buf_exact(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    /// Reads exactly the number of bytes requested, and returns a boxed slice of the data or an
    /// error.
    fn read_boxed_slice_exact(&mut self, len: usize) -> Result<Box<[u8]>> {
        let mut buf = vec![0u8; len];
        self.read_buf_exact(&mut buf)?;
        Ok(buf.into_boxed_slice())
    }

    /// Ignores the specified number of bytes from the stream or returns an error.
    fn ignore_bytes(&mut self, count: u64) -> Result<()>;

    /// Gets the position of the stream.
    fn pos(&self) -> u64;
}

impl<R: ReadBytes> ReadBytes for &mut R {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        (*self).read_byte()
    }

    #[inline(always)]
    fn read_double_bytes(&mut self) -> Result<[u8; 2]> {
        (*self).read_double_bytes()
    }

    #[inline(always)]
    fn read_quad_bytes(&mut self) -> Result<[u8; 4]> {
        (*self).read_quad_bytes()
    }

    #[inline(always)]
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        (*self).read_buf_exact(buf)
    }

    #[inline(always)]
    fn ignore_bytes(&mut self, count: u64) -> Result<()> {
        (*self).ignore_bytes(count)
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        (**self).pos()
    }
}

/// `WriteBytes` provides methods to write bytes and standard-width little-endian integers and
/// floating-point values.
pub trait WriteBytes {
    /// Writes a single byte to the sink.
    fn write_byte(&mut self, byte: u8);

    /// Writes a buffer of bytes to the sink.
    fn write_buf(&mut self, buf: &[u8]);

    /// Writes an unsigned 16-bit integer in little-endian byte order.
    #[inline(always)]
    fn write_u16(&mut self, value: u16) {
        self.write_buf(&value.to_le_bytes());
    }

    /// Writes a signed 16-bit integer in little-endian byte order.
    #[inline(always)]
    fn write_i16(&mut self, value: i16) {
        self.write_buf(&value.to_le_bytes());
    }

    /// Writes an unsigned 32-bit integer in little-endian byte order.
    #[inline(always)]
    fn write_u32(&mut self, value: u32) {
        self.write_buf(&value.to_le_bytes());
    }

    /// Writes a signed 32-bit integer in little-endian byte order.
    #[inline(always)]
    fn write_i32(&mut self, value: i32) {
        self.write_buf(&value.to_le_bytes());
    }

    /// Writes a 64-bit IEEE-754 floating-point value in little-endian byte order.
    #[inline(always)]
    fn write_f64(&mut self, value: f64) {
        self.write_buf(&value.to_le_bytes());
    }
}

impl WriteBytes for Vec<u8> {
    #[inline(always)]
    fn write_byte(&mut self, byte: u8) {
        self.push(byte);
    }

    #[inline(always)]
    fn write_buf(&mut self, buf: &[u8]) {
        self.extend_from_slice(buf);
    }
}

impl<W: WriteBytes> WriteBytes for &mut W {
    #[inline(always)]
    fn write_byte(&mut self, byte: u8) {
        (*self).write_byte(byte)
    }

    #[inline(always)]
    fn write_buf(&mut self, buf: &[u8]) {
        (*self).write_buf(buf)
    }
}

/// A `FiniteStream` is a stream that has a known length in bytes.
pub trait FiniteStream {
    /// Returns the length of the stream in bytes.
    fn byte_len(&self) -> u64;

    /// Returns the number of bytes that have been read.
    fn bytes_read(&self) -> u64;

    /// Returns the number of bytes available for reading.
    fn bytes_available(&self) -> u64;
}
