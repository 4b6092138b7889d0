//! # stbtt-bridge-core
//!
//! Safe Rust implementations of the utility primitives stb_truetype expects
//! from its host: byte copy, byte fill, string length, and the assert verdict.
//!
//! Everything here works on slices. The ABI crate resolves raw pointers and
//! bounds before calling in. No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod check;
pub mod string;
