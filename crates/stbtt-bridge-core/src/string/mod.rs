//! Byte and string primitives.
//!
//! Implements the `STBTT_memcpy`, `STBTT_memset`, and `STBTT_strlen` contracts
//! as safe Rust operating on slices.

pub mod mem;
pub mod str;

pub use mem::{copy_memory, fill_byte, fill_memory, move_within};
pub use str::{bounded_string_length, string_length};
