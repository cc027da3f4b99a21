//! Deterministic hashing for trace fingerprints.
//!
//! Fingerprints must be identical across processes, machines and Rust
//! versions, so the std `RandomState` hasher cannot be used.

use std::hash::Hasher;

/// Deterministic, non-cryptographic hasher.
///
/// Integers are always fed little-endian, so a fingerprint computed on one
/// architecture matches the fingerprint computed on any other.
#[derive(Debug, Clone)]
pub struct DetHasher {
    state: u64,
}

impl DetHasher {
    const SEED: u64 = 0x16f1_1fe8_9b0d_677c;
    const MULTIPLIER: u64 = 0x517c_c1b7_2722_0a95;

    /// Creates a hasher in its fixed initial state.
    #[must_use]
    pub const fn new() -> Self {
        Self { state: Self::SEED }
    }

    #[inline]
    fn mix_byte(&mut self, byte: u8) {
        self.state = self.state.wrapping_mul(Self::MULTIPLIER);
        self.state ^= u64::from(byte);
    }

    #[inline]
    fn mix_le(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.mix_byte(byte);
        }
    }
}

impl Default for DetHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for DetHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.mix_le(bytes);
    }

    fn write_u8(&mut self, i: u8) {
        self.mix_byte(i);
    }

    fn write_u32(&mut self, i: u32) {
        self.mix_le(&i.to_le_bytes());
    }

    fn write_u64(&mut self, i: u64) {
        self.mix_le(&i.to_le_bytes());
    }

    fn write_usize(&mut self, i: usize) {
        // Width-independent.
        self.write_u64(i as u64);
    }

    fn finish(&self) -> u64 {
        let mut h = self.state;
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
        h ^= h >> 33;
        h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
        h ^= h >> 33;
        h
    }
}
