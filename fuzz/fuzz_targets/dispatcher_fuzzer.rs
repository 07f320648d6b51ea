//! Fuzz target for dispatcher operation sequences
//!
//! Drives a dispatcher with fuzzer-chosen client operations and raw text, in
//! the same shape the model-based tests use.
//!
//! # Invariants
//!
//! - No room is registered without members
//! - Session-side and room-side membership agree
//! - Every room member is a registered session
//! - Room generations are unique
//! - While only typed operations have run, membership matches the reference model
//! - Disconnecting everyone leaves no rooms and no sessions
//! - NEVER panic

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomcast_harness::{
    InvariantRegistry, ModelServer, ObservableState, Operation, SimClient, SystemSnapshot,
    model::{connection_id, nickname, room_name},
};
use roomcast_server::{Dispatcher, DispatcherConfig};

const CLIENTS: u8 = 4;

#[derive(Debug, Clone, Arbitrary)]
enum Step {
    Op(Operation),
    RawText { client_id: u8, text: String },
}

fn fold(op: &Operation) -> Operation {
    let c = op.client_id() % CLIENTS;
    match *op {
        Operation::SetNickname { nickname, .. } => Operation::SetNickname { client_id: c, nickname },
        Operation::JoinRoom { room_id, .. } => Operation::JoinRoom { client_id: c, room_id },
        Operation::LeaveRoom { room_id, .. } => Operation::LeaveRoom { client_id: c, room_id },
        Operation::SendChat { room_id, .. } => Operation::SendChat { client_id: c, room_id },
        Operation::Disconnect { .. } => Operation::Disconnect { client_id: c },
        Operation::Reconnect { .. } => Operation::Reconnect { client_id: c },
    }
}

fn connect(dispatcher: &Arc<Dispatcher>, client_id: u8) -> Option<SimClient> {
    SimClient::connect(dispatcher, connection_id(client_id).as_u64()).ok()
}

fn apply(dispatcher: &Arc<Dispatcher>, clients: &mut [Option<SimClient>], op: &Operation) {
    let c = usize::from(op.client_id());
    let _ = match op {
        Operation::Reconnect { client_id } => {
            if clients[c].is_none() {
                clients[c] = connect(dispatcher, *client_id);
            }
            Ok(())
        },
        Operation::Disconnect { .. } => match clients[c].take() {
            Some(client) => client.disconnect(),
            None => Ok(()),
        },
        Operation::SetNickname { nickname: seed, .. } => match &clients[c] {
            Some(client) => client.set_nickname(&nickname(*seed)),
            None => Ok(()),
        },
        Operation::JoinRoom { room_id, .. } => match &clients[c] {
            Some(client) => client.join(&room_name(*room_id)),
            None => Ok(()),
        },
        Operation::LeaveRoom { room_id, .. } => match &clients[c] {
            Some(client) => client.leave(&room_name(*room_id)),
            None => Ok(()),
        },
        Operation::SendChat { room_id, .. } => match &clients[c] {
            Some(client) => client.chat(&room_name(*room_id), "fuzz"),
            None => Ok(()),
        },
    };
}

fuzz_target!(|steps: Vec<Step>| {
    let dispatcher = Arc::new(Dispatcher::new(DispatcherConfig::default()));
    let invariants = InvariantRegistry::standard();
    let mut model = ModelServer::new(usize::from(CLIENTS));
    let mut model_in_sync = true;

    let mut clients: Vec<Option<SimClient>> = (0..CLIENTS).map(|c| connect(&dispatcher, c)).collect();

    for step in steps.iter().take(256) {
        match step {
            Step::Op(op) => {
                let op = fold(op);
                model.apply(&op);
                apply(&dispatcher, &mut clients, &op);
            },
            Step::RawText { client_id, text } => {
                // Raw text may carry valid requests the model never sees
                model_in_sync = false;
                if let Some(client) = &clients[usize::from(client_id % CLIENTS)] {
                    let _ = client.send_text(text.clone());
                }
            },
        }

        let snapshot = SystemSnapshot::from_dispatcher(&dispatcher);
        if let Err(violations) = invariants.check_all(&snapshot) {
            panic!("invariant violated after {step:?}: {violations:?}");
        }
        if model_in_sync {
            assert_eq!(model.observable(), &ObservableState::from_snapshot(&snapshot), "{step:?}");
        }
    }

    for client in clients.iter_mut().filter_map(Option::take) {
        let _ = client.disconnect();
    }
    assert_eq!(dispatcher.rooms().room_count(), 0);
    assert_eq!(dispatcher.sessions().session_count(), 0);
});
