// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `frame` module implements the PACKR container: a magic tag, version, flags, symbol
//! count, token data, and a trailing CRC32 over everything preceding it. A frame is
//! self-contained and is the atomic unit of dictionary state.

use bitflags::bitflags;

use packr_core::checksum::Crc32;
use packr_core::errors::{invalid_frame_error, Result};
use packr_core::io::{BufReader, Monitor, MonitorStream, ReadBytes, WriteBytes};

use crate::primitive::{read_varint, write_varint};

/// The 4-byte tag opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"PKR1";

/// The only supported format version.
pub const FRAME_VERSION: u8 = 0x01;

/// The smallest possible frame: magic, version, flags, a one-byte symbol count, and the CRC.
const MIN_FRAME_LEN: usize = 11;

bitflags! {
    /// Frame flag bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FrameFlags: u8 {
        /// The frame added at least one new dictionary entry.
        const HAS_DICT_UPDATE = 0x01;
        /// The frame contains a Rice-coded column.
        const USES_RICE = 0x02;
        /// The frame was encoded from empty dictionaries; the decoder resets its own before
        /// decoding the payload.
        const DICT_RESET = 0x04;
    }
}

/// A parsed PACKR frame.
pub struct Frame {
    pub flags: FrameFlags,
    pub symbol_count: u64,
    pub data: Box<[u8]>,
}

/// Incrementally builds a frame's token data, then serializes the complete container.
#[derive(Default)]
pub struct FrameBuilder {
    data: Vec<u8>,
    symbol_count: u64,
    flags: FrameFlags,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new token, incrementing the symbol count, and returns the data buffer the
    /// token's bytes are written into.
    pub fn add_token(&mut self) -> &mut Vec<u8> {
        self.symbol_count += 1;
        &mut self.data
    }

    /// Returns the data buffer for continuation bytes that belong to an already counted token.
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// Sets a frame flag.
    pub fn set_flag(&mut self, flag: FrameFlags) {
        self.flags |= flag;
    }

    /// Gets the current symbol count.
    pub fn symbol_count(&self) -> u64 {
        self.symbol_count
    }

    /// Gets the current data size in bytes.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Serializes the frame: header, token data, and trailing CRC32.
    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_FRAME_LEN + self.data.len());

        out.write_buf(&FRAME_MAGIC);
        out.write_byte(FRAME_VERSION);
        out.write_byte(self.flags.bits());
        write_varint(&mut out, self.symbol_count);
        out.write_buf(&self.data);

        let mut crc32 = Crc32::new();
        crc32.process_buf_bytes(&out);
        out.write_u32(crc32.crc());

        out
    }

    /// Resets the builder for a new frame.
    pub fn reset(&mut self) {
        self.data.clear();
        self.symbol_count = 0;
        self.flags = FrameFlags::empty();
    }
}

/// Parses a frame from bytes, verifying magic, version, and (optionally) the CRC.
pub fn parse_frame(buf: &[u8], verify_crc: bool) -> Result<Frame> {
    if buf.len() < MIN_FRAME_LEN {
        return invalid_frame_error("frame too short");
    }

    // Everything preceding the trailing CRC is checksummed, so read the header through a CRC32
    // monitor.
    let data_end = buf.len() - 4;
    let mut reader = MonitorStream::new(BufReader::new(buf), Crc32::new());

    if reader.read_quad_bytes()? != FRAME_MAGIC {
        return invalid_frame_error("bad magic");
    }

    if reader.read_byte()? != FRAME_VERSION {
        return invalid_frame_error("unsupported version");
    }

    let flags = FrameFlags::from_bits_truncate(reader.read_byte()?);

    let symbol_count = match read_varint(&mut reader) {
        Ok(count) => count,
        Err(_) => return invalid_frame_error("bad symbol count"),
    };

    let header_len = reader.pos() as usize;
    if header_len > data_end {
        return invalid_frame_error("frame truncated");
    }

    let data = reader.read_boxed_slice_exact(data_end - header_len)?;

    let computed_crc = reader.monitor().crc();
    let stored_crc = reader.inner_mut().read_u32()?;

    if verify_crc && computed_crc != stored_crc {
        return invalid_frame_error("crc mismatch");
    }

    Ok(Frame { flags, symbol_count, data })
}
