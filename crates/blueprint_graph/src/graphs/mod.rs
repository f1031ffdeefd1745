// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node types.

pub mod gameplay;
