//! Allocation fingerprints and trailing canaries.
//!
//! Every tracked allocation gets:
//! - A 16-byte fingerprint header: `[u64 hash | u32 generation | u32 size]`
//! - An 8-byte trailing canary derived from the hash
//!
//! The hash is a keyed BLAKE3 digest of `(user_base, size, generation)`,
//! truncated to 64 bits. It is an integrity tag, not a secret.

/// Size of the fingerprint header prepended to allocations.
pub const FINGERPRINT_SIZE: usize = 16;

/// Size of the trailing canary appended to allocations.
pub const CANARY_SIZE: usize = 8;

const FINGERPRINT_KEY: [u8; 32] = *b"stbtt-bridge allocation tag v1\0\0";

/// Allocation fingerprint stored as a header before the user-visible pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct AllocationFingerprint {
    pub hash: u64,
    pub generation: u32,
    /// User-requested size, saturated to `u32::MAX`.
    pub size: u32,
}

impl AllocationFingerprint {
    #[must_use]
    pub fn compute(user_base: usize, size: u32, generation: u32) -> Self {
        Self {
            hash: tag(user_base, size, generation),
            generation,
            size,
        }
    }

    /// Verify that this fingerprint was computed for `user_base`.
    #[must_use]
    pub fn verify(&self, user_base: usize) -> bool {
        self.hash == tag(user_base, self.size, self.generation)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; FINGERPRINT_SIZE] {
        let mut buf = [0u8; FINGERPRINT_SIZE];
        buf[0..8].copy_from_slice(&self.hash.to_le_bytes());
        buf[8..12].copy_from_slice(&self.generation.to_le_bytes());
        buf[12..16].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    #[must_use]
    pub fn from_bytes(buf: &[u8; FINGERPRINT_SIZE]) -> Self {
        let mut hash = [0u8; 8];
        hash.copy_from_slice(&buf[0..8]);
        let mut generation = [0u8; 4];
        generation.copy_from_slice(&buf[8..12]);
        let mut size = [0u8; 4];
        size.copy_from_slice(&buf[12..16]);
        Self {
            hash: u64::from_le_bytes(hash),
            generation: u32::from_le_bytes(generation),
            size: u32::from_le_bytes(size),
        }
    }

    #[must_use]
    pub fn canary(&self) -> Canary {
        Canary::from_hash(self.hash)
    }
}

/// 8-byte trailing canary for buffer overflow detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canary {
    pub value: [u8; CANARY_SIZE],
}

impl Canary {
    #[must_use]
    pub fn from_hash(hash: u64) -> Self {
        let folded = hash ^ hash.rotate_left(32) ^ 0x5354_4254_5442_5247u64;
        Self {
            value: folded.to_le_bytes(),
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; CANARY_SIZE] {
        self.value
    }

    #[must_use]
    pub fn verify(&self, bytes: &[u8; CANARY_SIZE]) -> bool {
        self.value == *bytes
    }
}

fn tag(user_base: usize, size: u32, generation: u32) -> u64 {
    let mut msg = [0u8; 16];
    msg[0..8].copy_from_slice(&(user_base as u64).to_le_bytes());
    msg[8..12].copy_from_slice(&size.to_le_bytes());
    msg[12..16].copy_from_slice(&generation.to_le_bytes());
    let digest = blake3::keyed_hash(&FINGERPRINT_KEY, &msg);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}
