// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `decoder` module parses wire artifacts back into values: transform markers are stripped,
//! the frame is verified, and the token stream is decoded.

use log::warn;
use smallvec::SmallVec;

use packr_core::errors::{
    delta_context_error, dictionary_miss_error, invalid_value_error, malformed_input_error,
    unknown_token_error, Result,
};
use packr_core::io::{BufReader, FiniteStream, ReadBytes};
use packr_core::value::{MacAddr, Value};

use crate::batch::{self, ColumnFlags};
use crate::delta::{DeltaTracker, Numeric};
use crate::dict::DictionarySet;
use crate::frame::{parse_frame, FrameFlags};
use crate::primitive::{read_fixed16, read_fixed32, read_signed_varint, read_varint};
use crate::rice::RiceDecoder;
use crate::token;
use crate::transform::strip_transforms;

/// Options for a [`PackrDecoder`].
#[derive(Clone, Copy, Debug)]
pub struct DecoderOptions {
    /// Verify the frame CRC32 (default). Magic and version are always checked.
    pub verify_crc: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions { verify_crc: true }
    }
}

/// A PACKR decoder.
///
/// Errors abort the current call and leave the decoder indeterminate; call
/// [`PackrDecoder::reset`] before reusing it. An instance is not safe to share between threads;
/// independent instances are independent.
pub struct PackrDecoder {
    opts: DecoderOptions,
    dicts: DictionarySet,
    deltas: DeltaTracker,
    scope: SmallVec<[u8; 8]>,
}

impl PackrDecoder {
    /// Instantiate a new `PackrDecoder` with the given options.
    pub fn new(opts: DecoderOptions) -> Self {
        PackrDecoder {
            opts,
            dicts: DictionarySet::new(),
            deltas: DeltaTracker::new(),
            scope: SmallVec::new(),
        }
    }

    /// Decodes one wire artifact into a value. Batch payloads decode to an array of records.
    pub fn decode(&mut self, data: &[u8]) -> Result<Value> {
        let payload = strip_transforms(data)?;
        let frame = parse_frame(&payload, self.opts.verify_crc)?;
        self.begin_frame(frame.flags);

        let mut reader = BufReader::new(&frame.data);

        if reader.bytes_available() == 0 {
            return malformed_input_error("frame carries no symbols");
        }

        match reader.peek_byte()? {
            token::ULTRA_BATCH => Ok(Value::Array(self.decode_ultra_batch(&mut reader)?)),
            token::RECORD_BATCH => Ok(Value::Array(self.decode_record_batch(&mut reader)?)),
            token::COLUMN_BATCH => Ok(Value::Array(self.decode_column_batch(&mut reader)?)),
            _ => self.decode_value(&mut reader),
        }
    }

    /// Decodes a wire artifact into the sequence of values it carries. A malformed trailing
    /// token ends the sequence; values decoded before the failure point are returned.
    pub fn decode_stream(&mut self, data: &[u8]) -> Result<Vec<Value>> {
        let payload = strip_transforms(data)?;
        let frame = parse_frame(&payload, self.opts.verify_crc)?;
        self.begin_frame(frame.flags);

        let mut reader = BufReader::new(&frame.data);
        let mut values = Vec::new();

        while reader.bytes_available() > 0 {
            let result = match reader.peek_byte()? {
                token::ULTRA_BATCH => self.decode_ultra_batch(&mut reader).map(|mut records| {
                    values.append(&mut records);
                }),
                token::RECORD_BATCH => self.decode_record_batch(&mut reader).map(|mut records| {
                    values.append(&mut records);
                }),
                token::COLUMN_BATCH => self.decode_column_batch(&mut reader).map(|mut records| {
                    values.append(&mut records);
                }),
                _ => self.decode_value(&mut reader).map(|value| values.push(value)),
            };

            if let Err(err) = result {
                warn!("stream ended early at byte {}: {}", reader.pos(), err);
                break;
            }
        }

        Ok(values)
    }

    /// Resets the dictionaries and per-field numeric state.
    pub fn reset(&mut self) {
        self.dicts.reset();
        self.deltas.reset();
        self.scope.clear();
    }

    fn begin_frame(&mut self, flags: FrameFlags) {
        self.scope.clear();

        if flags.contains(FrameFlags::DICT_RESET) {
            self.dicts.reset();
            self.deltas.reset();
        }
    }

    fn field_in_scope(&self) -> Option<u8> {
        self.scope.last().copied()
    }

    // Value decoding, generic token path.

    fn decode_value(&mut self, reader: &mut BufReader<'_>) -> Result<Value> {
        let byte = reader.read_byte()?;

        if token::is_field_ref(byte) {
            return malformed_input_error("field reference in value position");
        }

        if token::is_string_ref(byte) {
            let value = match self.dicts.strings.get(token::dict_index(byte)) {
                Some(s) => s.clone(),
                None => return dictionary_miss_error("string slot never populated"),
            };
            return Ok(Value::String(value));
        }

        if token::is_mac_ref(byte) {
            let value = match self.dicts.macs.get(token::dict_index(byte)) {
                Some(mac) => *mac,
                None => return dictionary_miss_error("mac slot never populated"),
            };
            return Ok(Value::Mac(value));
        }

        if token::is_delta_small(byte) {
            return self.apply_delta(token::delta_small_value(byte));
        }

        match byte {
            token::INT => {
                let value = read_signed_varint(reader)?;
                self.track(Numeric::Int(value));
                Ok(Value::Int(value))
            }
            token::FLOAT16 => {
                let value = read_fixed16(reader)?;
                self.track(Numeric::Float(value));
                Ok(Value::Float(value))
            }
            token::FLOAT32 => {
                let value = read_fixed32(reader)?;
                self.track(Numeric::Float(value));
                Ok(Value::Float(value))
            }
            token::DOUBLE => {
                let value = reader.read_f64()?;
                self.track(Numeric::Float(value));
                Ok(Value::Float(value))
            }
            token::DELTA_ZERO => self.apply_delta(0),
            token::DELTA_ONE => self.apply_delta(1),
            token::DELTA_NEG_ONE => self.apply_delta(-1),
            token::DELTA_MEDIUM => {
                let payload = reader.read_byte()?;
                self.apply_delta(token::delta_medium_value(payload))
            }
            token::DELTA_LARGE => {
                let delta = read_signed_varint(reader)?;
                self.apply_delta(delta)
            }
            token::NEW_STRING => {
                let value = self.read_string_payload(reader)?;
                self.dicts.strings.get_or_add(value.clone());
                Ok(Value::String(value))
            }
            token::NEW_MAC => {
                let mut octets = [0u8; 6];
                reader.read_buf_exact(&mut octets)?;
                let mac = MacAddr::new(octets);
                self.dicts.macs.get_or_add(mac);
                Ok(Value::Mac(mac))
            }
            token::NEW_FIELD => malformed_input_error("field definition in value position"),
            token::BOOL_TRUE => Ok(Value::Bool(true)),
            token::BOOL_FALSE => Ok(Value::Bool(false)),
            token::NULL => Ok(Value::Null),
            token::BINARY => {
                let len = self.read_len(reader)?;
                Ok(Value::Binary(reader.read_boxed_slice_exact(len)?))
            }
            token::ARRAY_START => self.decode_array(reader),
            token::OBJECT_START => self.decode_object(reader),
            _ => unknown_token_error(byte),
        }
    }

    /// Reads a varint length and bounds it against the bytes actually available, so a corrupt
    /// length fails before any allocation.
    fn read_len(&mut self, reader: &mut BufReader<'_>) -> Result<usize> {
        let len = read_varint(reader)?;
        if len > reader.bytes_available() {
            return malformed_input_error("length runs past end of data");
        }
        Ok(len as usize)
    }

    fn read_string_payload(&mut self, reader: &mut BufReader<'_>) -> Result<String> {
        let len = self.read_len(reader)?;
        let bytes = reader.read_buf_bytes_ref(len)?;

        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => invalid_value_error("string payload is not valid utf-8"),
        }
    }

    fn track(&mut self, value: Numeric) {
        if let Some(field) = self.field_in_scope() {
            self.deltas.record(field, value);
        }
    }

    fn apply_delta(&mut self, delta: i64) -> Result<Value> {
        let field = match self.field_in_scope() {
            Some(field) => field,
            None => return delta_context_error("delta token with no field in scope"),
        };

        Ok(self.deltas.apply(field, delta)?.into_value())
    }

    fn decode_array(&mut self, reader: &mut BufReader<'_>) -> Result<Value> {
        let len = read_varint(reader)?;
        let mut items = Vec::new();

        for _ in 0..len {
            if reader.peek_byte()? == token::ARRAY_END {
                break;
            }
            items.push(self.decode_value(reader)?);
        }

        if reader.read_byte()? != token::ARRAY_END {
            return malformed_input_error("array not terminated");
        }

        Ok(Value::Array(items))
    }

    fn decode_object(&mut self, reader: &mut BufReader<'_>) -> Result<Value> {
        let mut fields = Vec::new();

        loop {
            if reader.peek_byte()? == token::OBJECT_END {
                reader.read_byte()?;
                break;
            }

            let (name, index) = self.decode_field(reader)?;

            self.scope.push(index);
            let value = self.decode_value(reader);
            self.scope.pop();

            fields.push((name, value?));
        }

        Ok(Value::Object(fields))
    }

    /// Decodes a field-definition token: either a field reference or NEW_FIELD with the name
    /// payload. Returns the name and its dictionary index.
    fn decode_field(&mut self, reader: &mut BufReader<'_>) -> Result<(String, u8)> {
        let byte = reader.read_byte()?;

        if token::is_field_ref(byte) {
            let index = token::dict_index(byte);
            let name = match self.dicts.fields.get(index) {
                Some(name) => name.clone(),
                None => return dictionary_miss_error("field slot never populated"),
            };
            return Ok((name, index));
        }

        if byte == token::NEW_FIELD {
            let name = self.read_string_payload(reader)?;
            let (index, is_new) = self.dicts.fields.get_or_add(name.clone());

            if is_new {
                // Mirror the encoder: a reused slot must not inherit the evicted field's
                // numeric history.
                self.deltas.clear_field(index);
            }

            return Ok((name, index));
        }

        malformed_input_error("expected a field token")
    }

    // Column batch engine, decode side.

    fn decode_ultra_batch(&mut self, reader: &mut BufReader<'_>) -> Result<Vec<Value>> {
        reader.read_byte()?;

        let record_count = read_varint(reader)? as usize;
        let field_count = read_varint(reader)? as usize;

        let mut field_names = Vec::with_capacity(field_count.min(64));
        let mut field_indices = Vec::with_capacity(field_count.min(64));
        let mut column_flags = Vec::with_capacity(field_count.min(64));

        for _ in 0..field_count {
            let (name, index) = self.decode_field(reader)?;
            field_names.push(name);
            field_indices.push(index);
            column_flags.push(ColumnFlags::from_bits_truncate(reader.read_byte()?));
        }

        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(field_count.min(64));

        for (i, flags) in column_flags.iter().enumerate() {
            let validity = if flags.contains(ColumnFlags::HAS_NULLS) {
                let bitmap = reader.read_buf_bytes_ref((record_count + 7) / 8)?;
                Some(batch::read_bitmap(bitmap, record_count))
            }
            else {
                None
            };

            self.scope.push(field_indices[i]);

            let values = if flags.contains(ColumnFlags::CONSTANT) {
                self.decode_constant_column(reader, record_count)
            }
            else if flags.contains(ColumnFlags::ALL_DELTA) {
                self.decode_numeric_column(reader, record_count, field_indices[i])
            }
            else {
                self.decode_rle_column(reader, record_count)
            };

            self.scope.pop();
            let mut values = values?;

            if let Some(validity) = validity {
                for (value, valid) in values.iter_mut().zip(validity) {
                    if !valid {
                        *value = Value::Null;
                    }
                }
            }

            columns.push(values);
        }

        // Assemble records row-major; null entries are omitted from the objects.
        let mut records = Vec::with_capacity(record_count.min(4096));
        for row in 0..record_count {
            let mut fields = Vec::new();
            for (col, name) in columns.iter().zip(&field_names) {
                if !col[row].is_null() {
                    fields.push((name.clone(), col[row].clone()));
                }
            }
            records.push(Value::Object(fields));
        }

        Ok(records)
    }

    fn decode_constant_column(
        &mut self,
        reader: &mut BufReader<'_>,
        count: usize,
    ) -> Result<Vec<Value>> {
        let value = self.decode_value(reader)?;
        Ok(vec![value; count])
    }

    fn decode_numeric_column(
        &mut self,
        reader: &mut BufReader<'_>,
        count: usize,
        field: u8,
    ) -> Result<Vec<Value>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let first = match self.decode_value(reader)? {
            Value::Int(v) => Numeric::Int(v),
            Value::Float(v) => Numeric::Float(v),
            _ => return malformed_input_error("numeric column must begin with a number"),
        };

        let mut values = Vec::with_capacity(count.min(4096));
        values.push(first.into_value());

        if count == 1 {
            return Ok(values);
        }

        let mut prev = first;

        match reader.peek_byte()? {
            token::BITPACK_COLUMN => {
                reader.read_byte()?;
                let delta_count = read_varint(reader)? as usize;
                let packed = reader.read_buf_bytes_ref((delta_count + 1) / 2)?;

                for delta in batch::unpack_nibbles(packed, delta_count) {
                    prev = prev.apply(delta);
                    values.push(prev.into_value());
                }
            }
            token::RICE_COLUMN => {
                reader.read_byte()?;
                let delta_count = read_varint(reader)? as usize;

                let mut rice = RiceDecoder::new(reader.remaining())?;
                for _ in 0..delta_count {
                    prev = prev.apply(rice.decode_signed()?);
                    values.push(prev.into_value());
                }

                reader.ignore_bytes(rice.bytes_consumed() as u64)?;
            }
            _ => {
                while values.len() < count {
                    let byte = reader.read_byte()?;

                    if byte == token::RLE_REPEAT {
                        let repeat = read_varint(reader)?;
                        for _ in 0..repeat {
                            values.push(prev.into_value());
                        }
                        continue;
                    }

                    let delta = if token::is_delta_small(byte) {
                        token::delta_small_value(byte)
                    }
                    else {
                        match byte {
                            token::DELTA_ZERO => 0,
                            token::DELTA_ONE => 1,
                            token::DELTA_NEG_ONE => -1,
                            token::DELTA_MEDIUM => token::delta_medium_value(reader.read_byte()?),
                            token::DELTA_LARGE => read_signed_varint(reader)?,
                            _ => {
                                return malformed_input_error(
                                    "unexpected token in numeric column",
                                )
                            }
                        }
                    };

                    prev = prev.apply(delta);
                    values.push(prev.into_value());
                }
            }
        }

        if values.len() != count {
            return malformed_input_error("numeric column length mismatch");
        }

        // Keep the tracker in step with the encoder, which records the column's final
        // reconstructed value.
        self.deltas.record(field, prev);

        Ok(values)
    }

    fn decode_rle_column(
        &mut self,
        reader: &mut BufReader<'_>,
        count: usize,
    ) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(count.min(4096));

        while values.len() < count {
            let value = self.decode_value(reader)?;
            values.push(value.clone());

            if reader.bytes_available() > 0 && reader.peek_byte()? == token::RLE_REPEAT {
                reader.read_byte()?;
                let repeat = read_varint(reader)?;
                for _ in 0..repeat {
                    values.push(value.clone());
                }
            }
        }

        values.truncate(count);
        Ok(values)
    }

    // Legacy batch layouts, decode only.

    fn decode_record_batch(&mut self, reader: &mut BufReader<'_>) -> Result<Vec<Value>> {
        reader.read_byte()?;

        let record_count = read_varint(reader)? as usize;
        let field_count = read_varint(reader)? as usize;

        let mut field_names = Vec::with_capacity(field_count.min(64));
        let mut field_indices = Vec::with_capacity(field_count.min(64));

        for _ in 0..field_count {
            let (name, index) = self.decode_field(reader)?;
            field_names.push(name);
            field_indices.push(index);
        }

        let mut records = Vec::with_capacity(record_count.min(4096));

        for _ in 0..record_count {
            let mut fields = Vec::with_capacity(field_count);

            for (name, &index) in field_names.iter().zip(&field_indices) {
                self.scope.push(index);
                let value = self.decode_value(reader);
                self.scope.pop();
                fields.push((name.clone(), value?));
            }

            records.push(Value::Object(fields));
        }

        Ok(records)
    }

    fn decode_column_batch(&mut self, reader: &mut BufReader<'_>) -> Result<Vec<Value>> {
        reader.read_byte()?;

        let record_count = read_varint(reader)? as usize;
        let field_count = read_varint(reader)? as usize;

        let mut field_names = Vec::with_capacity(field_count.min(64));
        let mut field_indices = Vec::with_capacity(field_count.min(64));

        for _ in 0..field_count {
            let (name, index) = self.decode_field(reader)?;
            field_names.push(name);
            field_indices.push(index);
        }

        let mut columns = Vec::with_capacity(field_count.min(64));

        for &index in &field_indices {
            // Each legacy column restarts its delta history.
            self.deltas.clear_field(index);

            self.scope.push(index);
            let column = self.decode_rle_column(reader, record_count);
            self.scope.pop();
            columns.push(column?);
        }

        let mut records = Vec::with_capacity(record_count.min(4096));
        for row in 0..record_count {
            let fields = columns
                .iter()
                .zip(&field_names)
                .map(|(col, name)| (name.clone(), col[row].clone()))
                .collect();
            records.push(Value::Object(fields));
        }

        Ok(records)
    }
}

impl Default for PackrDecoder {
    fn default() -> Self {
        Self::new(DecoderOptions::default())
    }
}
