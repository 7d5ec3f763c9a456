// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `value` module defines the dynamically-typed value model carried by the codec.

use std::fmt;
use std::str::FromStr;

use crate::errors::{invalid_value_error, Error, Result};

/// A 6-byte IEEE 802 MAC address.
///
/// `MacAddr` parses from the textual forms `AA:BB:CC:DD:EE:FF` and `AA-BB-CC-DD-EE-FF`
/// (case-insensitive, separators may be mixed) and always displays as uppercase colon-separated
/// hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// Instantiate a `MacAddr` from raw octets.
    pub fn new(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }

    /// Get the raw octets.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Returns true if the string matches the textual MAC address pattern accepted by
    /// [`MacAddr::from_str`].
    pub fn is_mac_str(s: &str) -> bool {
        let bytes = s.as_bytes();

        if bytes.len() != 17 {
            return false;
        }

        for (i, &b) in bytes.iter().enumerate() {
            match i % 3 {
                2 => {
                    if b != b':' && b != b'-' {
                        return false;
                    }
                }
                _ => {
                    if !b.is_ascii_hexdigit() {
                        return false;
                    }
                }
            }
        }

        true
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if !MacAddr::is_mac_str(s) {
            return invalid_value_error("string does not match the MAC address pattern");
        }

        let mut octets = [0u8; 6];

        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&s[i * 3..i * 3 + 2], 16)
                .map_err(|_| Error::InvalidValue("string does not match the MAC address pattern"))?;
        }

        Ok(MacAddr(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// A dynamically-typed value.
///
/// `Value` is the in-memory representation of everything the codec can encode: scalars, MAC
/// addresses, opaque binary blobs, arrays, and objects. Objects preserve field insertion order
/// for encoding, but compare as unordered key-value sets, since the column batch engine
/// reassembles records in schema order.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Mac(MacAddr),
    Binary(Box<[u8]>),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Returns true if the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if the value is a scalar: null, boolean, numeric, string, or MAC address.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Binary(_) | Value::Array(_) | Value::Object(_))
    }

    /// If the value is an object, returns its fields.
    pub fn as_object(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// If the value is an object, looks up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_object()?.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// If the value is an integer, returns it.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    /// If the value is numeric, returns it as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(v) => Some(v as f64),
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    /// If the value is a string, returns it.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Mac(a), Value::Mac(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(name, v)| b.iter().any(|(bn, bv)| bn == name && bv == v))
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<MacAddr> for Value {
    fn from(v: MacAddr) -> Self {
        Value::Mac(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

#[cfg(test)]
mod tests {
    use super::{MacAddr, Value};

    #[test]
    fn verify_mac_parse_and_format() {
        let mac: MacAddr = "aa:bb:cc:dd:ee:01".parse().unwrap();
        assert_eq!(mac.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        assert_eq!(mac.to_string(), "AA:BB:CC:DD:EE:01");

        // Dashes and mixed separators are accepted on parse.
        let mac: MacAddr = "00-1A-2b:3C-4d:5E".parse().unwrap();
        assert_eq!(mac.to_string(), "00:1A:2B:3C:4D:5E");
    }

    #[test]
    fn verify_mac_rejects_non_macs() {
        assert!(!MacAddr::is_mac_str(""));
        assert!(!MacAddr::is_mac_str("AA:BB:CC:DD:EE"));
        assert!(!MacAddr::is_mac_str("AA:BB:CC:DD:EE:GG"));
        assert!(!MacAddr::is_mac_str("AABBCCDDEE01"));
        assert!(!MacAddr::is_mac_str("AA:BB:CC:DD:EE:011"));
        assert!("hello".parse::<MacAddr>().is_err());
    }

    #[test]
    fn verify_object_lookup() {
        let obj = Value::Object(vec![
            ("rssi".to_string(), Value::Int(-65)),
            ("ssid".to_string(), Value::String("lab".to_string())),
        ]);

        assert_eq!(obj.get("rssi").and_then(Value::as_i64), Some(-65));
        assert_eq!(obj.get("ssid").and_then(Value::as_str), Some("lab"));
        assert!(obj.get("chan").is_none());
        assert!(obj.is_scalar() == false);
    }

    #[test]
    fn verify_object_equality_ignores_field_order() {
        let a = Value::Object(vec![
            ("x".to_string(), Value::Int(1)),
            ("y".to_string(), Value::Int(2)),
        ]);
        let b = Value::Object(vec![
            ("y".to_string(), Value::Int(2)),
            ("x".to_string(), Value::Int(1)),
        ]);
        let c = Value::Object(vec![("x".to_string(), Value::Int(1))]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }
}
