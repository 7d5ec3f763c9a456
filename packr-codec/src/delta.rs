// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `delta` module tracks per-field numeric state for delta encoding.
//!
//! Delta tokens are meaningful only relative to the most recent absolute (or reconstructed)
//! numeric value seen under the same field-dictionary slot. Both the encoder and decoder carry a
//! [`DeltaTracker`] and must update it at exactly the same points for the streams to agree.

use std::collections::HashMap;

use packr_core::errors::{delta_context_error, Result};
use packr_core::value::Value;

/// The scale applied to deltas of float-category fields: one wire unit is 1/65536.
pub const FLOAT_DELTA_SCALE: f64 = 65536.0;

/// The last numeric value recorded under a field, tagged with its numeric category.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    /// Applies a wire delta, producing the next value in the sequence. Integer fields add the
    /// delta directly; float fields add `delta / 65536`.
    pub fn apply(self, delta: i64) -> Numeric {
        match self {
            Numeric::Int(prev) => Numeric::Int(prev.wrapping_add(delta)),
            Numeric::Float(prev) => Numeric::Float(prev + (delta as f64) / FLOAT_DELTA_SCALE),
        }
    }

    /// Converts into the value model.
    pub fn into_value(self) -> Value {
        match self {
            Numeric::Int(v) => Value::Int(v),
            Numeric::Float(v) => Value::Float(v),
        }
    }
}

/// Tracks the last absolute numeric value per field-dictionary slot.
#[derive(Default)]
pub struct DeltaTracker {
    last: HashMap<u8, Numeric>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an absolute value decoded or emitted under a field.
    pub fn record(&mut self, field: u8, value: Numeric) {
        self.last.insert(field, value);
    }

    /// Gets the last value recorded under a field.
    pub fn last(&self, field: u8) -> Option<Numeric> {
        self.last.get(&field).copied()
    }

    /// Applies a delta to the last value recorded under a field, records the result, and returns
    /// it. Fails if no absolute value was established for the field.
    pub fn apply(&mut self, field: u8, delta: i64) -> Result<Numeric> {
        let prev = match self.last.get(&field) {
            Some(prev) => *prev,
            None => return delta_context_error("no prior absolute value for field"),
        };

        let next = prev.apply(delta);
        self.last.insert(field, next);
        Ok(next)
    }

    /// Drops the state for one field. Called when a dictionary slot is reassigned to a new field
    /// name, since the old state would otherwise leak into the new field's deltas.
    pub fn clear_field(&mut self, field: u8) {
        self.last.remove(&field);
    }

    /// Clears all tracked state.
    pub fn reset(&mut self) {
        self.last.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{DeltaTracker, Numeric};

    #[test]
    fn verify_integer_deltas() {
        let mut tracker = DeltaTracker::new();

        tracker.record(3, Numeric::Int(1000));
        assert_eq!(tracker.apply(3, 1).unwrap(), Numeric::Int(1001));
        assert_eq!(tracker.apply(3, -5).unwrap(), Numeric::Int(996));
        assert_eq!(tracker.last(3), Some(Numeric::Int(996)));
    }

    #[test]
    fn verify_float_delta_scale() {
        let mut tracker = DeltaTracker::new();

        tracker.record(0, Numeric::Float(1.5));
        // One wire unit is 1/65536.
        assert_eq!(tracker.apply(0, 65536).unwrap(), Numeric::Float(2.5));
        assert_eq!(tracker.apply(0, -32768).unwrap(), Numeric::Float(2.0));
    }

    #[test]
    fn verify_missing_context_fails() {
        let mut tracker = DeltaTracker::new();
        assert!(tracker.apply(7, 1).is_err());

        tracker.record(7, Numeric::Int(5));
        tracker.clear_field(7);
        assert!(tracker.apply(7, 1).is_err());
    }

    #[test]
    fn verify_fields_are_independent() {
        let mut tracker = DeltaTracker::new();

        tracker.record(1, Numeric::Int(10));
        tracker.record(2, Numeric::Int(200));

        assert_eq!(tracker.apply(1, 1).unwrap(), Numeric::Int(11));
        assert_eq!(tracker.apply(2, 1).unwrap(), Numeric::Int(201));
    }
}
