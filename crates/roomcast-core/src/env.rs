//! Environment abstraction for deterministic testing.
//!
//! Decouples the server from system randomness. Production draws connection
//! ids from the OS RNG; simulation uses a seeded RNG so runs are reproducible.

use crate::ConnectionId;

/// Abstract source of randomness.
///
/// # Invariants
///
/// - Given the same seed, a simulation implementation produces the same
///   sequence of bytes.
/// - Production implementations use OS entropy.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Allocate an identity for a newly accepted connection.
    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.random_u64())
    }
}
