// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `encoder` module turns values into wire artifacts: a token stream inside a CRC-checked
//! frame, optionally wrapped by the byte-level back-end transform.

use log::debug;
use smallvec::SmallVec;

use packr_core::errors::{invalid_value_error, Result};
use packr_core::io::WriteBytes;
use packr_core::value::{MacAddr, Value};

use crate::batch::{self, ColumnPlan, DeltaEncoding};
use crate::delta::{DeltaTracker, Numeric};
use crate::dict::DictionarySet;
use crate::frame::{FrameBuilder, FrameFlags};
use crate::primitive::{fits_wire_domain, write_signed_varint, write_varint};
use crate::rice::RiceEncoder;
use crate::token;
use crate::transform::{apply_transform, Compression};

/// Options for a [`PackrEncoder`].
#[derive(Clone, Copy, Debug)]
pub struct EncoderOptions {
    /// Use the column batch engine for eligible record sequences.
    pub batching: bool,
    /// Use per-field delta tokens for integers on the generic path.
    pub delta_encoding: bool,
    /// The back-end transform applied to serialized frames.
    pub compression: Compression,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions {
            batching: true,
            delta_encoding: true,
            compression: Compression::default(),
        }
    }
}

/// A PACKR encoder.
///
/// The dictionaries and per-field numeric state accumulate across the symbols of a frame and
/// across successive calls; [`PackrEncoder::reset`] returns the encoder to its initial state.
/// An encoder is not safe to share between threads; independent instances are independent.
pub struct PackrEncoder {
    opts: EncoderOptions,
    dicts: DictionarySet,
    deltas: DeltaTracker,
    frame: FrameBuilder,
    scope: SmallVec<[u8; 8]>,
}

impl PackrEncoder {
    /// Instantiate a new `PackrEncoder` with the given options.
    pub fn new(opts: EncoderOptions) -> Self {
        PackrEncoder {
            opts,
            dicts: DictionarySet::new(),
            deltas: DeltaTracker::new(),
            frame: FrameBuilder::new(),
            scope: SmallVec::new(),
        }
    }

    /// Encodes a single value into a wire artifact.
    pub fn encode(&mut self, value: &Value) -> Result<Vec<u8>> {
        self.begin_frame();
        self.encode_value(value)?;
        Ok(self.finish_frame())
    }

    /// Encodes a sequence of values into one wire artifact. Sequences of flat records go
    /// through the column batch engine; everything else is encoded value by value.
    pub fn encode_stream(&mut self, values: &[Value]) -> Result<Vec<u8>> {
        self.begin_frame();

        if self.opts.batching && batch::is_batchable(values) {
            self.encode_ultra_batch(values)?;
        }
        else {
            for value in values {
                self.encode_value(value)?;
            }
        }

        Ok(self.finish_frame())
    }

    /// Resets the dictionaries, per-field numeric state, and frame builder.
    pub fn reset(&mut self) {
        self.dicts.reset();
        self.deltas.reset();
        self.frame.reset();
        self.scope.clear();
    }

    fn begin_frame(&mut self) {
        self.frame.reset();
        self.scope.clear();

        if self.dicts.is_empty() {
            self.frame.set_flag(FrameFlags::DICT_RESET);
        }
    }

    fn finish_frame(&mut self) -> Vec<u8> {
        let raw = self.frame.finish();
        debug!("frame: {} symbols, {} bytes raw", self.frame.symbol_count(), raw.len());
        apply_transform(raw, self.opts.compression)
    }

    fn field_in_scope(&self) -> Option<u8> {
        self.scope.last().copied()
    }

    // Value encoding, generic token path.

    fn encode_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => {
                self.frame.add_token().push(token::NULL);
            }
            Value::Bool(v) => {
                let byte = if *v { token::BOOL_TRUE } else { token::BOOL_FALSE };
                self.frame.add_token().push(byte);
            }
            Value::Int(v) => self.encode_int(*v)?,
            Value::Float(v) => self.encode_float(*v),
            Value::String(s) => self.encode_string(s)?,
            Value::Mac(mac) => self.encode_mac(*mac),
            Value::Binary(blob) => {
                let buf = self.frame.add_token();
                buf.push(token::BINARY);
                write_varint(buf, blob.len() as u64);
                buf.extend_from_slice(blob);
            }
            Value::Array(items) => self.encode_array(items)?,
            Value::Object(fields) => self.encode_object(fields)?,
        }

        Ok(())
    }

    /// Encodes an integer, preferring a delta token when the field in scope has an integer
    /// history and the difference is small.
    fn encode_int(&mut self, value: i64) -> Result<()> {
        if self.opts.delta_encoding {
            if let Some(field) = self.field_in_scope() {
                if let Some(Numeric::Int(prev)) = self.deltas.last(field) {
                    if let Some(delta) = value.checked_sub(prev) {
                        if token::fits_delta_medium(delta) {
                            self.emit_delta_token(delta);
                            self.deltas.record(field, Numeric::Int(value));
                            return Ok(());
                        }
                    }
                }
            }
        }

        self.encode_int_absolute(value)
    }

    fn encode_int_absolute(&mut self, value: i64) -> Result<()> {
        if !fits_wire_domain(value) {
            return invalid_value_error("integer magnitude exceeds the wire domain");
        }

        let buf = self.frame.add_token();
        buf.push(token::INT);
        write_signed_varint(buf, value);

        if let Some(field) = self.field_in_scope() {
            self.deltas.record(field, Numeric::Int(value));
        }

        Ok(())
    }

    /// Encodes a float as a full double. The compact fixed-point forms only appear in batch
    /// columns, where precision loss is part of the contract.
    fn encode_float(&mut self, value: f64) {
        let buf = self.frame.add_token();
        buf.push(token::DOUBLE);
        buf.write_f64(value);

        if let Some(field) = self.field_in_scope() {
            self.deltas.record(field, Numeric::Float(value));
        }
    }

    fn encode_string(&mut self, s: &str) -> Result<()> {
        if MacAddr::is_mac_str(s) {
            let mac = s.parse::<MacAddr>()?;
            self.encode_mac(mac);
            return Ok(());
        }

        let (index, is_new) = self.dicts.strings.get_or_add(s.to_string());

        if is_new {
            self.frame.set_flag(FrameFlags::HAS_DICT_UPDATE);
            let buf = self.frame.add_token();
            buf.push(token::NEW_STRING);
            write_varint(buf, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        else {
            self.frame.add_token().push(token::STRING_REF_BASE + index);
        }

        Ok(())
    }

    fn encode_mac(&mut self, mac: MacAddr) {
        let (index, is_new) = self.dicts.macs.get_or_add(mac);

        if is_new {
            self.frame.set_flag(FrameFlags::HAS_DICT_UPDATE);
            let buf = self.frame.add_token();
            buf.push(token::NEW_MAC);
            buf.extend_from_slice(&mac.octets());
        }
        else {
            self.frame.add_token().push(token::MAC_REF_BASE + index);
        }
    }

    fn encode_array(&mut self, items: &[Value]) -> Result<()> {
        let buf = self.frame.add_token();
        buf.push(token::ARRAY_START);
        write_varint(buf, items.len() as u64);

        for item in items {
            self.encode_value(item)?;
        }

        self.frame.add_token().push(token::ARRAY_END);
        Ok(())
    }

    fn encode_object(&mut self, fields: &[(String, Value)]) -> Result<()> {
        self.frame.add_token().push(token::OBJECT_START);

        for (name, value) in fields {
            let index = self.encode_field(name);
            self.scope.push(index);
            let result = self.encode_value(value);
            self.scope.pop();
            result?;
        }

        self.frame.add_token().push(token::OBJECT_END);
        Ok(())
    }

    /// Emits a field definition: NEW_FIELD with the name payload on first use, the one-byte
    /// reference afterwards. Returns the field's dictionary index.
    fn encode_field(&mut self, name: &str) -> u8 {
        let (index, is_new) = self.dicts.fields.get_or_add(name.to_string());

        if is_new {
            // The slot may be reused from an evicted field; its numeric history must not leak
            // into the new field's deltas.
            self.deltas.clear_field(index);
            self.frame.set_flag(FrameFlags::HAS_DICT_UPDATE);

            let buf = self.frame.add_token();
            buf.push(token::NEW_FIELD);
            write_varint(buf, name.len() as u64);
            buf.extend_from_slice(name.as_bytes());
        }
        else {
            self.frame.add_token().push(token::FIELD_REF_BASE + index);
        }

        index
    }

    fn emit_delta_token(&mut self, delta: i64) {
        match delta {
            0 => self.frame.add_token().push(token::DELTA_ZERO),
            1 => self.frame.add_token().push(token::DELTA_ONE),
            -1 => self.frame.add_token().push(token::DELTA_NEG_ONE),
            d if token::fits_delta_small(d) => {
                self.frame.add_token().push(token::delta_small_token(d));
            }
            d if token::fits_delta_medium(d) => {
                let buf = self.frame.add_token();
                buf.push(token::DELTA_MEDIUM);
                buf.push(token::delta_medium_payload(d));
            }
            d => {
                let buf = self.frame.add_token();
                buf.push(token::DELTA_LARGE);
                write_signed_varint(buf, d);
            }
        }
    }

    // Column batch engine, encode side.

    fn encode_ultra_batch(&mut self, records: &[Value]) -> Result<()> {
        let record_count = records.len();
        let field_names = batch::schema_union(records);

        debug!("batch: {} records, {} fields", record_count, field_names.len());

        let mut columns = Vec::with_capacity(field_names.len());
        for name in &field_names {
            let column = batch::extract_column(records, name);
            columns.push(batch::plan_column(&column));
        }

        self.frame.add_token().push(token::ULTRA_BATCH);
        write_varint(self.frame.data_mut(), record_count as u64);
        write_varint(self.frame.data_mut(), field_names.len() as u64);

        let mut field_indices = Vec::with_capacity(field_names.len());
        for (name, (column, _)) in field_names.iter().zip(&columns) {
            field_indices.push(self.encode_field(name));
            self.frame.add_token().push(column.flags.bits());
        }

        for (index, (column, plan)) in field_indices.iter().zip(&columns) {
            if let Some(bitmap) = &column.bitmap {
                self.frame.data_mut().extend_from_slice(bitmap);
            }

            self.scope.push(*index);
            let result = self.encode_column_payload(*index, plan);
            self.scope.pop();
            result?;
        }

        Ok(())
    }

    fn encode_column_payload(&mut self, field: u8, plan: &ColumnPlan) -> Result<()> {
        match plan {
            ColumnPlan::AllNull => {
                self.frame.add_token().push(token::NULL);
                Ok(())
            }
            ColumnPlan::Constant { value } => self.encode_value_absolute(value),
            ColumnPlan::Numeric { first, deltas } => self.encode_numeric_column(field, *first, deltas),
            ColumnPlan::Rle { values } => self.encode_rle_column(values),
        }
    }

    /// Encodes one value with numerics forced to their absolute forms. Batch representative
    /// values are decoded before any delta context exists, so they must stand alone.
    fn encode_value_absolute(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Int(v) => self.encode_int_absolute(*v),
            Value::Float(v) => {
                self.encode_float(*v);
                Ok(())
            }
            _ => self.encode_value(value),
        }
    }

    fn encode_numeric_column(&mut self, field: u8, first: Numeric, deltas: &[i64]) -> Result<()> {
        match first {
            Numeric::Int(v) => self.encode_int_absolute(v)?,
            Numeric::Float(v) => self.encode_float(v),
        }

        if deltas.is_empty() {
            return Ok(());
        }

        match batch::choose_delta_encoding(deltas) {
            DeltaEncoding::BitPack => {
                debug!("column {}: bit-packed, {} deltas", field, deltas.len());
                let buf = self.frame.add_token();
                buf.push(token::BITPACK_COLUMN);
                write_varint(buf, deltas.len() as u64);
                buf.extend_from_slice(&batch::pack_nibbles(deltas));
            }
            DeltaEncoding::Rice { k } => {
                debug!("column {}: rice k={}, {} deltas", field, k, deltas.len());
                self.frame.set_flag(FrameFlags::USES_RICE);

                let mut rice = RiceEncoder::new(k);
                for &delta in deltas {
                    rice.encode_signed(delta);
                }

                let buf = self.frame.add_token();
                buf.push(token::RICE_COLUMN);
                write_varint(buf, deltas.len() as u64);
                buf.extend_from_slice(&rice.finish());
            }
            DeltaEncoding::Tokens => {
                debug!("column {}: delta tokens, {} deltas", field, deltas.len());
                self.encode_delta_tokens(deltas);
            }
        }

        // Leave the tracker holding the column's final reconstructed value, matching the state
        // the decoder ends the column with.
        let last = deltas.iter().fold(first, |prev, &d| prev.apply(d));
        self.deltas.record(field, last);

        Ok(())
    }

    /// Emits deltas as variable-length tokens, replacing runs of four or more zero deltas with
    /// a single RLE_REPEAT.
    fn encode_delta_tokens(&mut self, deltas: &[i64]) {
        let mut i = 0;

        while i < deltas.len() {
            if deltas[i] == 0 {
                let mut run = 1;
                while i + run < deltas.len() && deltas[i + run] == 0 {
                    run += 1;
                }

                if run >= 4 {
                    let buf = self.frame.add_token();
                    buf.push(token::RLE_REPEAT);
                    write_varint(buf, run as u64);
                    i += run;
                    continue;
                }
            }

            self.emit_delta_token(deltas[i]);
            i += 1;
        }
    }

    fn encode_rle_column(&mut self, values: &[Value]) -> Result<()> {
        let mut i = 0;

        while i < values.len() {
            let mut run = 1;
            while i + run < values.len() && values[i + run] == values[i] {
                run += 1;
            }

            self.encode_value(&values[i])?;

            if run > 1 {
                let buf = self.frame.add_token();
                buf.push(token::RLE_REPEAT);
                write_varint(buf, (run - 1) as u64);
            }

            i += run;
        }

        Ok(())
    }
}

impl Default for PackrEncoder {
    fn default() -> Self {
        Self::new(EncoderOptions::default())
    }
}
