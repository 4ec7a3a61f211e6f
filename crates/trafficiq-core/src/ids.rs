//! Digests and identifier generation.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};

use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

/// SHA-256 of `bytes`.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let d = digest::digest(&digest::SHA256, bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(d.as_ref());
    out
}

/// Lowercase hex of the first `n` bytes of `bytes`.
pub fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n).fold(String::with_capacity(n * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Big-endian `u32` at byte offset `at`. Offsets past the end wrap around.
pub fn digest_word(d: &[u8; 32], at: usize) -> u32 {
    let b = |i: usize| d[(at + i) % d.len()];
    u32::from_be_bytes([b(0), b(1), b(2), b(3)])
}

#[derive(Debug, Error)]
#[error("system random source unavailable")]
pub struct IdError;

/// Issues `<PREFIX>-<8 hex>` identifiers, unique within one generator.
///
/// A monotonically increasing counter is pushed through a bijection on `u32`
/// keyed by a random salt, so ids do not repeat until the counter wraps and
/// do not reveal issue order.
#[derive(Debug)]
pub struct IdGenerator {
    prefix: &'static str,
    salt: u32,
    counter: AtomicU32,
}

const MIX: u32 = 0x9E37_79B1;

impl IdGenerator {
    /// Generator salted from the system random source.
    pub fn new(prefix: &'static str) -> Result<Self, IdError> {
        let mut buf = [0u8; 4];
        SystemRandom::new().fill(&mut buf).map_err(|_| IdError)?;
        Ok(Self::with_seed(prefix, u32::from_be_bytes(buf)))
    }

    /// Generator with a fixed salt; used by tests and replay tooling.
    pub fn with_seed(prefix: &'static str, salt: u32) -> Self {
        Self {
            prefix,
            salt,
            counter: AtomicU32::new(0),
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:08x}", self.prefix, n.wrapping_mul(MIX) ^ self.salt)
    }
}
