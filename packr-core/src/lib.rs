// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Shared structs, traits, and I/O primitives for Project Packr.
//!
//! This crate is not meant for direct use. Applications should use the `packr` crate, and codecs
//! build on the infrastructure provided here: the [`Value`](value::Value) model, the
//! [`errors`] module, byte- and bit-level [`io`], and [`checksum`] implementations.

pub mod checksum;
pub mod errors;
pub mod io;
pub mod value;
