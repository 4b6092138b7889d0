//! Error type for the Rust-facing bridge APIs.
//!
//! The C entry points never surface these directly; they map them onto the
//! null-pointer and integer return conventions of the boundary.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// A host allocator is already active for this process.
    #[error("a host allocator is already installed or in use")]
    HostAlreadyInstalled,
    /// A host callback table was missing a required function pointer.
    #[error("host callback table is missing {0}")]
    NullCallback(&'static str),
    /// The request plus bookkeeping overhead does not fit in `usize`.
    #[error("allocation size {size} overflows the address space")]
    SizeOverflow { size: usize },
    /// The host allocator returned null.
    #[error("host allocator could not provide {size} bytes")]
    AllocationFailed { size: usize },
}

impl BridgeError {
    /// Integer return code used by the C extension entry points.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::NullCallback(_) => -1,
            Self::HostAlreadyInstalled => -2,
            Self::SizeOverflow { .. } => -3,
            Self::AllocationFailed { .. } => -4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            BridgeError::NullCallback("release").to_string(),
            "host callback table is missing release"
        );
        assert_eq!(
            BridgeError::AllocationFailed { size: 64 }.to_string(),
            "host allocator could not provide 64 bytes"
        );
    }

    #[test]
    fn codes_are_distinct_and_negative() {
        let codes = [
            BridgeError::NullCallback("allocate").code(),
            BridgeError::HostAlreadyInstalled.code(),
            BridgeError::SizeOverflow { size: 0 }.code(),
            BridgeError::AllocationFailed { size: 0 }.code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            assert!(*a < 0);
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
