//! Membership invariants over a point-in-time view of the engine.
//!
//! A [`SystemSnapshot`] is taken from a quiescent [`Dispatcher`] and every
//! registered [`Invariant`] inspects it. Tests call this after each simulated
//! step so a broken room lifecycle is reported at the step that broke it
//! rather than at the end of the run.
//!
//! ```ignore
//! let snapshot = SystemSnapshot::from_dispatcher(&dispatcher);
//! InvariantRegistry::standard().assert_all(&snapshot, "after disconnect storm");
//! ```
//!
//! [`Dispatcher`]: roomcast_server::Dispatcher

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{MembersRegistered, MembershipSymmetry, NoEmptyRooms, UniqueGenerations};
pub use snapshot::{SessionSnapshot, SystemSnapshot};

/// Outcome of one invariant check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant and what broke it.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Which invariant failed
    pub invariant: &'static str,
    /// The offending room or session, in words
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of the room and session registries.
pub trait Invariant: Send + Sync {
    /// Short name used in reports.
    fn name(&self) -> &'static str;

    /// Inspect `state`, returning the first violation found.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of invariants run together.
#[derive(Default)]
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Registry with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// [`NoEmptyRooms`], [`MembershipSymmetry`], [`MembersRegistered`] and
    /// [`UniqueGenerations`].
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(NoEmptyRooms);
        registry.add(MembershipSymmetry);
        registry.add(MembersRegistered);
        registry.add(UniqueGenerations);
        registry
    }

    /// Register one more invariant.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.checks.push(Box::new(invariant));
    }

    /// Run every invariant; `Err` carries one violation per failing check.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        for invariant in &self.checks {
            if let Err(violation) = invariant.check(state) {
                violations.push(violation);
            }
        }
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Like [`check_all`](Self::check_all) but panics, listing every
    /// violation under `context`.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        let Err(violations) = self.check_all(state) else {
            return;
        };
        let mut report = format!("{} invariant(s) broken {context}", violations.len());
        for violation in &violations {
            report.push_str("\n  ");
            report.push_str(&violation.to_string());
        }
        panic!("{report}");
    }

    /// Names of the registered invariants, in run order.
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|invariant| invariant.name()).collect()
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
