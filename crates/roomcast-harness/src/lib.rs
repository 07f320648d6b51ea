//! Deterministic simulation harness for roomcast testing.
//!
//! Seeded and recording implementations of the engine's collaborators, plus a
//! turmoil-hosted server for end-to-end runs over simulated TCP.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and the real dispatcher,
//! and their observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks membership properties against a snapshot of
//! the engine. Use [`InvariantRegistry::standard()`] for the common set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_client;
pub mod sim_connection;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    Invariant, InvariantRegistry, InvariantResult, MembersRegistered, MembershipSymmetry,
    NoEmptyRooms, SessionSnapshot, SystemSnapshot, UniqueGenerations, Violation,
};
pub use model::{
    ClientId, ModelRoomId, ModelServer, ObservableState, Operation, OperationResult,
};
pub use sim_client::SimClient;
pub use sim_connection::SimConnection;
pub use sim_env::SimEnv;
pub use sim_server::SimServer;
