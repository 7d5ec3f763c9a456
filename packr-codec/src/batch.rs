// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `batch` module analyzes homogeneous record sequences for the column-major encoding.
//!
//! Batch analysis is pure: it discovers the schema, classifies each column, substitutes nulls,
//! computes reconstruction-exact delta sequences, and selects a delta encoding. Emitting and
//! parsing the resulting token stream is the encoder's and decoder's job.

use bitflags::bitflags;

use packr_core::value::Value;

use crate::delta::{Numeric, FLOAT_DELTA_SCALE};
use crate::primitive::{fits_wire_domain, varint_len, zigzag_encode};
use crate::rice::{rice_encoded_len, rice_parameter};
use crate::token;

bitflags! {
    /// Per-column flag bits. Exactly one of `CONSTANT`, `ALL_DELTA`, and `RLE` is set;
    /// `HAS_NULLS` is orthogonal.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ColumnFlags: u8 {
        /// Every element is equal; the value is stored once.
        const CONSTANT = 0x01;
        /// Numeric column stored as a first absolute value and a delta sequence.
        const ALL_DELTA = 0x02;
        /// Run-length encoded value stream.
        const RLE = 0x04;
        /// A null bitmap precedes the column payload.
        const HAS_NULLS = 0x08;
    }
}

/// How a column's payload is emitted.
pub enum ColumnPlan {
    /// Every position is null. A single NULL token stands for the whole column.
    AllNull,
    /// Every non-null element equals the representative value.
    Constant { value: Value },
    /// Numeric column: the first prepared value, then deltas computed against the reconstructed
    /// previous value so the encoder and decoder sequences agree bit-for-bit.
    Numeric { first: Numeric, deltas: Vec<i64> },
    /// Everything else: a run-length encoded stream of the prepared values.
    Rle { values: Vec<Value> },
}

/// A fully analyzed column.
pub struct Column {
    pub flags: ColumnFlags,
    pub bitmap: Option<Vec<u8>>,
}

/// The delta encoding selected for a numeric column.
#[derive(Debug, PartialEq, Eq)]
pub enum DeltaEncoding {
    /// Two 4-bit deltas per byte.
    BitPack,
    /// Rice-coded zigzag deltas with the given parameter.
    Rice { k: u8 },
    /// Variable-length delta tokens with zero-run replacement.
    Tokens,
}

/// Returns true when a record sequence is eligible for the column batch engine: non-empty, and
/// every record a flat object of scalar fields. Nested values fall through to the generic token
/// path so the transposition stays lossless.
pub fn is_batchable(records: &[Value]) -> bool {
    if records.is_empty() {
        return false;
    }

    records.iter().all(|record| match record.as_object() {
        Some(fields) => fields.iter().all(|(_, v)| v.is_scalar()),
        None => false,
    })
}

/// Discovers the batch schema: the ordered union of keys across all records in first-seen
/// order.
pub fn schema_union(records: &[Value]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for record in records {
        if let Some(fields) = record.as_object() {
            for (name, _) in fields {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
        }
    }

    names
}

/// Extracts one column of the batch. Missing keys and explicit nulls both become `None`.
pub fn extract_column<'a>(records: &'a [Value], name: &str) -> Vec<Option<&'a Value>> {
    records
        .iter()
        .map(|record| match record.get(name) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        })
        .collect()
}

/// Builds the null bitmap for a column: bit `r` of byte `r / 8`, LSB-first within each byte, is
/// set when record `r` is non-null.
pub fn null_bitmap(column: &[Option<&Value>]) -> Vec<u8> {
    let mut bitmap = vec![0u8; (column.len() + 7) / 8];

    for (r, value) in column.iter().enumerate() {
        if value.is_some() {
            bitmap[r / 8] |= 1 << (r % 8);
        }
    }

    bitmap
}

/// Reads a null bitmap back into per-record validity.
pub fn read_bitmap(bitmap: &[u8], count: usize) -> Vec<bool> {
    (0..count).map(|r| (bitmap[r / 8] >> (r % 8)) & 1 != 0).collect()
}

/// Returns true if the value is numeric and, for floats, finite. Non-finite floats are kept out
/// of delta columns so their exact bit patterns survive in absolute form.
fn is_delta_friendly(value: &Value) -> bool {
    match *value {
        Value::Int(_) => true,
        Value::Float(f) => f.is_finite(),
        _ => false,
    }
}

/// Returns true if the value forces the column into the float category.
fn is_fractional(value: &Value) -> bool {
    matches!(*value, Value::Float(f) if f.fract() != 0.0)
}

fn numeric_as_i64(value: &Value) -> i64 {
    match *value {
        Value::Int(v) => v,
        Value::Float(f) => f as i64,
        _ => unreachable!(),
    }
}

/// Substitutes nulls with the nearest preceding non-null value (the first non-null value for a
/// leading run of nulls), so the value stream carries one entry per record.
fn substitute_nulls<'a>(column: &[Option<&'a Value>]) -> Vec<&'a Value> {
    let first = column.iter().flatten().next().copied();
    let mut prev = first.unwrap();

    column
        .iter()
        .map(|value| {
            if let Some(value) = *value {
                prev = value;
            }
            prev
        })
        .collect()
}

/// Computes the numeric column plan, or `None` when a delta falls outside the wire domain and
/// the column must fall back to absolute values.
fn plan_numeric(prepared: &[&Value]) -> Option<ColumnPlan> {
    let is_float = prepared.iter().any(|v| is_fractional(v));

    if is_float {
        let first = match prepared[0] {
            Value::Int(v) => *v as f64,
            Value::Float(f) => *f,
            _ => unreachable!(),
        };

        let mut deltas = Vec::with_capacity(prepared.len() - 1);
        let mut recon = first;

        for value in &prepared[1..] {
            let v = value.as_f64().unwrap();
            let delta = ((v - recon) * FLOAT_DELTA_SCALE).round();

            if !delta.is_finite() || delta < -9.0e18 || delta > 9.0e18 {
                return None;
            }

            let delta = delta as i64;
            if !fits_wire_domain(delta) {
                return None;
            }

            recon += (delta as f64) / FLOAT_DELTA_SCALE;
            deltas.push(delta);
        }

        Some(ColumnPlan::Numeric { first: Numeric::Float(first), deltas })
    }
    else {
        let first = numeric_as_i64(prepared[0]);

        let mut deltas = Vec::with_capacity(prepared.len() - 1);
        let mut prev = first;

        for value in &prepared[1..] {
            let v = numeric_as_i64(value);
            let delta = v.checked_sub(prev)?;

            if !fits_wire_domain(delta) {
                return None;
            }

            prev = v;
            deltas.push(delta);
        }

        Some(ColumnPlan::Numeric { first: Numeric::Int(first), deltas })
    }
}

/// Classifies one column and prepares its payload plan.
pub fn plan_column(column: &[Option<&Value>]) -> (Column, ColumnPlan) {
    let has_nulls = column.iter().any(|v| v.is_none());

    let mut flags = ColumnFlags::empty();
    let bitmap = if has_nulls {
        flags |= ColumnFlags::HAS_NULLS;
        Some(null_bitmap(column))
    }
    else {
        None
    };

    let non_null: Vec<&Value> = column.iter().flatten().copied().collect();

    if non_null.is_empty() {
        flags |= ColumnFlags::CONSTANT;
        return (Column { flags, bitmap }, ColumnPlan::AllNull);
    }

    if non_null.iter().all(|v| *v == non_null[0]) {
        flags |= ColumnFlags::CONSTANT;
        return (Column { flags, bitmap }, ColumnPlan::Constant { value: non_null[0].clone() });
    }

    if non_null.iter().all(|v| is_delta_friendly(v)) {
        let prepared = substitute_nulls(column);
        if let Some(plan) = plan_numeric(&prepared) {
            flags |= ColumnFlags::ALL_DELTA;
            return (Column { flags, bitmap }, plan);
        }
    }

    flags |= ColumnFlags::RLE;
    let values = substitute_nulls(column).into_iter().cloned().collect();
    (Column { flags, bitmap }, ColumnPlan::Rle { values })
}

/// Estimates the byte cost of the variable-length token path for a delta sequence, counting
/// zero runs of four or more as RLE_REPEAT replacements.
fn token_path_cost(deltas: &[i64]) -> usize {
    let mut cost = 0;
    let mut i = 0;

    while i < deltas.len() {
        if deltas[i] == 0 {
            let mut run = 1;
            while i + run < deltas.len() && deltas[i + run] == 0 {
                run += 1;
            }

            if run >= 4 {
                cost += 1 + varint_len(run as u64);
                i += run;
                continue;
            }
        }

        let d = deltas[i];
        cost += if token::fits_delta_small(d) {
            1
        }
        else if token::fits_delta_medium(d) {
            2
        }
        else {
            1 + varint_len(zigzag_encode(d))
        };
        i += 1;
    }

    cost
}

/// Selects the delta encoding for a numeric column.
///
/// Bit-packing wins whenever every delta fits a nibble, unless the run-length estimate shows
/// the token path materially shorter. Rice coding is used for longer columns of moderate deltas
/// when its exact size lands under 1.5 bytes per value. Everything else takes the token path.
pub fn choose_delta_encoding(deltas: &[i64]) -> DeltaEncoding {
    if deltas.is_empty() {
        return DeltaEncoding::Tokens;
    }

    let all_small = deltas.iter().all(|&d| token::fits_delta_small(d));

    if all_small {
        let bitpack_cost = 1 + varint_len(deltas.len() as u64) + (deltas.len() + 1) / 2;
        if (token_path_cost(deltas) as f64) < 0.8 * bitpack_cost as f64 {
            return DeltaEncoding::Tokens;
        }
        return DeltaEncoding::BitPack;
    }

    let max_abs = deltas.iter().map(|d| d.unsigned_abs()).max().unwrap();

    if deltas.len() >= 10 && max_abs < 1024 {
        let k = rice_parameter(max_abs);
        if (rice_encoded_len(deltas, k) as f64) < 1.5 * deltas.len() as f64 {
            return DeltaEncoding::Rice { k };
        }
    }

    DeltaEncoding::Tokens
}

/// Packs nibble deltas two per byte: `(delta + 8)` in the high nibble first, the low nibble
/// second, zero-padding the final nibble when the count is odd.
pub fn pack_nibbles(deltas: &[i64]) -> Vec<u8> {
    let mut packed = Vec::with_capacity((deltas.len() + 1) / 2);

    for pair in deltas.chunks(2) {
        let hi = ((pair[0] + 8) & 0x0f) as u8;
        let lo = if pair.len() > 1 { ((pair[1] + 8) & 0x0f) as u8 } else { 0 };
        packed.push((hi << 4) | lo);
    }

    packed
}

/// Unpacks `count` nibble deltas.
pub fn unpack_nibbles(packed: &[u8], count: usize) -> Vec<i64> {
    (0..count)
        .map(|i| {
            let byte = packed[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            i64::from(nibble) - 8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use packr_core::value::Value;

    use super::*;

    fn obj(fields: &[(&str, Value)]) -> Value {
        Value::Object(fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn verify_batch_eligibility() {
        let flat = vec![
            obj(&[("t", Value::Int(1))]),
            obj(&[("t", Value::Int(2)), ("r", Value::Float(0.5))]),
        ];
        assert!(is_batchable(&flat));

        assert!(!is_batchable(&[]));
        assert!(!is_batchable(&[Value::Int(1)]));

        // A nested value forces the generic path.
        let deep = vec![obj(&[("pos", Value::Array(vec![Value::Int(1)]))])];
        assert!(!is_batchable(&deep));
    }

    #[test]
    fn verify_schema_union_order() {
        let records = vec![
            obj(&[("a", Value::Int(1))]),
            obj(&[("b", Value::Int(2))]),
            obj(&[("a", Value::Int(3)), ("b", Value::Int(4))]),
        ];

        assert_eq!(schema_union(&records), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn verify_null_bitmap_layout() {
        let one = Value::Int(1);
        let column: Vec<Option<&Value>> =
            vec![Some(&one), None, Some(&one), None, None, None, None, None, Some(&one)];

        let bitmap = null_bitmap(&column);
        assert_eq!(bitmap, vec![0b0000_0101, 0b0000_0001]);
        assert_eq!(
            read_bitmap(&bitmap, 9),
            vec![true, false, true, false, false, false, false, false, true]
        );
    }

    #[test]
    fn verify_constant_classification() {
        let v = Value::String("ok".to_string());
        let column = vec![Some(&v), Some(&v), Some(&v)];

        let (col, plan) = plan_column(&column);
        assert_eq!(col.flags, ColumnFlags::CONSTANT);
        assert!(matches!(plan, ColumnPlan::Constant { .. }));
    }

    #[test]
    fn verify_constant_with_nulls_classification() {
        let v = Value::Int(-60);
        let column = vec![Some(&v), None, Some(&v)];

        let (col, plan) = plan_column(&column);
        assert_eq!(col.flags, ColumnFlags::CONSTANT | ColumnFlags::HAS_NULLS);
        assert!(matches!(plan, ColumnPlan::Constant { .. }));
        assert_eq!(col.bitmap, Some(vec![0b0000_0101]));
    }

    #[test]
    fn verify_all_null_classification() {
        let column: Vec<Option<&Value>> = vec![None, None];
        let (col, plan) = plan_column(&column);
        assert_eq!(col.flags, ColumnFlags::CONSTANT | ColumnFlags::HAS_NULLS);
        assert!(matches!(plan, ColumnPlan::AllNull));
    }

    #[test]
    fn verify_numeric_classification_and_deltas() {
        let values: Vec<Value> = [1000, 1001, 1002, 1001].iter().map(|&v| Value::Int(v)).collect();
        let column: Vec<Option<&Value>> = values.iter().map(Some).collect();

        let (col, plan) = plan_column(&column);
        assert_eq!(col.flags, ColumnFlags::ALL_DELTA);

        match plan {
            ColumnPlan::Numeric { first, deltas } => {
                assert_eq!(first, crate::delta::Numeric::Int(1000));
                assert_eq!(deltas, vec![1, 1, -1]);
            }
            _ => panic!("expected numeric plan"),
        }
    }

    #[test]
    fn verify_numeric_nulls_substitute_as_zero_deltas() {
        let a = Value::Int(1);
        let b = Value::Int(3);
        let column = vec![Some(&a), None, Some(&b)];

        let (col, plan) = plan_column(&column);
        assert!(col.flags.contains(ColumnFlags::ALL_DELTA | ColumnFlags::HAS_NULLS));

        match plan {
            ColumnPlan::Numeric { deltas, .. } => assert_eq!(deltas, vec![0, 2]),
            _ => panic!("expected numeric plan"),
        }
    }

    #[test]
    fn verify_mixed_column_falls_back_to_rle() {
        let a = Value::Int(1);
        let b = Value::String("x".to_string());
        let column = vec![Some(&a), Some(&b)];

        let (col, plan) = plan_column(&column);
        assert_eq!(col.flags, ColumnFlags::RLE);
        assert!(matches!(plan, ColumnPlan::Rle { .. }));
    }

    #[test]
    fn verify_huge_deltas_fall_back_to_rle() {
        let a = Value::Int(-(1 << 41));
        let b = Value::Int((1 << 41) - 1);
        let column = vec![Some(&a), Some(&b)];

        let (col, _) = plan_column(&column);
        assert_eq!(col.flags, ColumnFlags::RLE);
    }

    #[test]
    fn verify_non_finite_floats_fall_back_to_rle() {
        let a = Value::Float(1.0);
        let b = Value::Float(f64::INFINITY);
        let column = vec![Some(&a), Some(&b)];

        let (col, _) = plan_column(&column);
        assert_eq!(col.flags, ColumnFlags::RLE);
    }

    #[test]
    fn verify_bitpack_chosen_for_small_deltas() {
        // The sequence from the delta-encoding contract: all deltas within [-8, 7].
        let deltas = [1i64, 1, -1, 0, 0, 0, -1];
        assert_eq!(choose_delta_encoding(&deltas), DeltaEncoding::BitPack);
    }

    #[test]
    fn verify_token_path_chosen_for_long_zero_runs() {
        // One nonzero delta then a long zero run: RLE beats bit-packing by a wide margin.
        let mut deltas = vec![1i64];
        deltas.extend(std::iter::repeat(0).take(100));
        assert_eq!(choose_delta_encoding(&deltas), DeltaEncoding::Tokens);
    }

    #[test]
    fn verify_rice_chosen_for_moderate_deltas() {
        let deltas: Vec<i64> = (0..200i64).map(|i| (i % 7) * 20 - 60).collect();
        match choose_delta_encoding(&deltas) {
            DeltaEncoding::Rice { k } => assert!(k <= 7),
            other => panic!("expected rice, got {:?}", other),
        }
    }

    #[test]
    fn verify_token_path_is_default() {
        // Too few values for Rice, too large for nibbles.
        let deltas = [5000i64, -4000, 3000];
        assert_eq!(choose_delta_encoding(&deltas), DeltaEncoding::Tokens);
    }

    #[test]
    fn verify_nibble_packing() {
        let deltas = [1i64, 1, -1, 0, 0, 0, -1];
        let packed = pack_nibbles(&deltas);

        // (1+8)=9 and (1+8)=9, (-1+8)=7 and (0+8)=8, (0+8)=8 twice, (-1+8)=7 then padding.
        assert_eq!(packed, vec![0x99, 0x78, 0x88, 0x70]);
        assert_eq!(unpack_nibbles(&packed, 7), deltas);
    }
}
