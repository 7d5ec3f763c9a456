// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Packr.
#[derive(Debug)]
pub enum Error {
    /// The input was truncated, a varint overflowed, or bytes required by a token were missing.
    MalformedInput(&'static str),
    /// The frame container was invalid: short input, bad magic, unsupported version, or a CRC
    /// mismatch.
    InvalidFrame(&'static str),
    /// A token byte did not fall into any recognized range.
    UnknownToken(u8),
    /// A dictionary reference named a slot that was never populated in this frame.
    DictionaryMiss(&'static str),
    /// A delta token was encountered with no field in scope, or no prior absolute value for the
    /// field in scope.
    DeltaWithoutContext(&'static str),
    /// A value failed validation: a Rice symbol that must be non-negative, a string that does not
    /// match the MAC pattern, and similar.
    InvalidValue(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::MalformedInput(msg) => {
                write!(f, "malformed input: {}", msg)
            }
            Error::InvalidFrame(msg) => {
                write!(f, "invalid frame: {}", msg)
            }
            Error::UnknownToken(byte) => {
                write!(f, "unknown token byte: {:#04x}", byte)
            }
            Error::DictionaryMiss(msg) => {
                write!(f, "dictionary miss: {}", msg)
            }
            Error::DeltaWithoutContext(msg) => {
                write!(f, "delta without context: {}", msg)
            }
            Error::InvalidValue(msg) => {
                write!(f, "invalid value: {}", msg)
            }
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a malformed input error.
pub fn malformed_input_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::MalformedInput(desc))
}

/// Convenience function to create an invalid frame error.
pub fn invalid_frame_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidFrame(desc))
}

/// Convenience function to create an unknown token error.
pub fn unknown_token_error<T>(byte: u8) -> Result<T> {
    Err(Error::UnknownToken(byte))
}

/// Convenience function to create a dictionary miss error.
pub fn dictionary_miss_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DictionaryMiss(desc))
}

/// Convenience function to create a delta context error.
pub fn delta_context_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DeltaWithoutContext(desc))
}

/// Convenience function to create an invalid value error.
pub fn invalid_value_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidValue(desc))
}
