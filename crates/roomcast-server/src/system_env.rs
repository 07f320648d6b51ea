//! Production Environment implementation using OS randomness.
//!
//! `SystemEnv` draws connection ids from getrandom. Ids are therefore not
//! reproducible between runs; simulation substitutes a seeded implementation.

use roomcast_core::Environment;

/// Production environment backed by the OS RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without it the server cannot hand out
/// connection ids, and the failure indicates an OS-level fault.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// OS-backed environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}
