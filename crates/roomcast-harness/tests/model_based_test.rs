//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! dispatcher behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelServer     RealWorld       Compare
//!      (reference)    (dispatcher)     Results
//! ```

use std::sync::Arc;

use proptest::prelude::*;
use roomcast_harness::{
    InvariantRegistry, ModelServer, ObservableState, Operation, OperationResult, SimClient,
    SystemSnapshot,
    model::{connection_id, nickname, room_name},
};
use roomcast_proto::ServerMessage;
use roomcast_server::{Dispatcher, DispatcherConfig};

/// Real system wrapper that mirrors ModelServer's interface.
struct RealWorld {
    dispatcher: Arc<Dispatcher>,
    clients: Vec<Option<SimClient>>,
    /// Most recent `ROOM_LIST` each connected client has seen
    room_lists: Vec<Option<Vec<String>>>,
}

impl RealWorld {
    fn new(num_clients: u8) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(DispatcherConfig::default()));
        let mut world = Self { dispatcher, clients: Vec::new(), room_lists: Vec::new() };
        for c in 0..num_clients {
            let client = world.connect(c);
            world.clients.push(Some(client));
            world.room_lists.push(None);
        }
        world.observe(&vec![0; usize::from(num_clients)]);
        world
    }

    fn connect(&self, client_id: u8) -> SimClient {
        SimClient::connect(&self.dispatcher, connection_id(client_id).as_u64()).unwrap()
    }

    fn marks(&self) -> Vec<usize> {
        self.clients
            .iter()
            .map(|c| c.as_ref().map_or(0, |c| c.connection().frames().len()))
            .collect()
    }

    /// Messages each client received since `marks`, also tracking room lists.
    fn observe(&mut self, marks: &[usize]) -> Vec<Vec<ServerMessage>> {
        let mut fresh = Vec::new();
        for (i, client) in self.clients.iter().enumerate() {
            let messages: Vec<ServerMessage> = match client {
                Some(client) => client.connection().frames()[marks[i]..]
                    .iter()
                    .map(|text| ServerMessage::decode(text).unwrap())
                    .collect(),
                None => Vec::new(),
            };
            for message in &messages {
                if let ServerMessage::RoomList(rooms) = message {
                    self.room_lists[i] = Some(rooms.clone());
                }
            }
            fresh.push(messages);
        }
        fresh
    }

    fn apply(&mut self, op: &Operation) -> OperationResult {
        let c = usize::from(op.client_id());

        match op {
            Operation::Reconnect { client_id } => {
                if self.clients[c].is_some() {
                    return OperationResult::NoOp;
                }
                let client = self.connect(*client_id);
                self.clients[c] = Some(client);
                self.room_lists[c] = None;
                let mut marks = self.marks();
                marks[c] = 0;
                self.observe(&marks);
                return OperationResult::Applied;
            },
            Operation::Disconnect { .. } => {
                let Some(client) = self.clients[c].take() else {
                    return OperationResult::NoOp;
                };
                self.room_lists[c] = None;
                let marks = self.marks();
                client.disconnect().unwrap();
                self.observe(&marks);
                return OperationResult::Applied;
            },
            _ => {},
        }

        let marks = self.marks();
        let Some(client) = &self.clients[c] else {
            return OperationResult::NoOp;
        };

        match op {
            Operation::SetNickname { nickname: seed, .. } => {
                client.set_nickname(&nickname(*seed)).unwrap();
            },
            Operation::JoinRoom { room_id, .. } => client.join(&room_name(*room_id)).unwrap(),
            Operation::LeaveRoom { room_id, .. } => client.leave(&room_name(*room_id)).unwrap(),
            Operation::SendChat { room_id, .. } => {
                client.chat(&room_name(*room_id), "ping").unwrap();
            },
            Operation::Disconnect { .. } | Operation::Reconnect { .. } => unreachable!(),
        }

        let fresh = self.observe(&marks);

        if let Operation::SendChat { .. } = op {
            let delivered = fresh
                .iter()
                .filter(|messages| messages.iter().any(|m| matches!(m, ServerMessage::NewMessage(_))))
                .count();
            return if delivered == 0 {
                OperationResult::NoOp
            } else {
                OperationResult::Delivered(delivered)
            };
        }

        let own = &fresh[c];
        if let Some(ServerMessage::Error(reason)) =
            own.iter().find(|m| matches!(m, ServerMessage::Error(_)))
        {
            return OperationResult::Rejected(reason.clone());
        }
        if own.iter().any(|m| matches!(m, ServerMessage::SystemNotice(_))) {
            OperationResult::Applied
        } else {
            OperationResult::NoOp
        }
    }

    fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_dispatcher(&self.dispatcher)
    }
}

/// Strategy for generating operations with valid client IDs.
fn operation_strategy(num_clients: u8) -> impl Strategy<Value = Operation> {
    let client_id = 0..num_clients;
    let room_id = any::<u8>();

    prop_oneof![
        2 => (client_id.clone(), any::<u8>())
            .prop_map(|(c, n)| Operation::SetNickname { client_id: c, nickname: n }),
        4 => (client_id.clone(), room_id.clone())
            .prop_map(|(c, r)| Operation::JoinRoom { client_id: c, room_id: r }),
        2 => (client_id.clone(), room_id.clone())
            .prop_map(|(c, r)| Operation::LeaveRoom { client_id: c, room_id: r }),
        3 => (client_id.clone(), room_id)
            .prop_map(|(c, r)| Operation::SendChat { client_id: c, room_id: r }),
        1 => client_id.clone().prop_map(|c| Operation::Disconnect { client_id: c }),
        1 => client_id.prop_map(|c| Operation::Reconnect { client_id: c }),
    ]
}

const NUM_CLIENTS: u8 = 4;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Verify that operation results match between model and real implementation.
    ///
    /// This is the core model-based test. It generates random operation sequences
    /// and asserts that both implementations return the same results and reach
    /// the same observable state after every step.
    #[test]
    fn prop_model_matches_real(
        ops in prop::collection::vec(operation_strategy(NUM_CLIENTS), 1..60)
    ) {
        let mut model = ModelServer::new(usize::from(NUM_CLIENTS));
        let mut real = RealWorld::new(NUM_CLIENTS);
        let invariants = InvariantRegistry::standard();

        for (step, op) in ops.iter().enumerate() {
            let expected = model.apply(op);
            let actual = real.apply(op);
            prop_assert_eq!(&expected, &actual, "step {}: {:?}", step, op);

            let snapshot = real.snapshot();
            prop_assert_eq!(
                model.observable(),
                &ObservableState::from_snapshot(&snapshot),
                "step {}: {:?}",
                step,
                op
            );
            let checked = invariants.check_all(&snapshot);
            prop_assert!(checked.is_ok(), "step {}: {:?}", step, checked);
        }
    }

    /// Every connected client's latest `ROOM_LIST` names exactly the live rooms.
    ///
    /// Creations and deletions are broadcast to all sessions and new sessions
    /// get the list on connect, so no client ever holds a stale view once an
    /// operation has completed.
    #[test]
    fn prop_room_lists_converge(
        ops in prop::collection::vec(operation_strategy(NUM_CLIENTS), 1..60)
    ) {
        let mut model = ModelServer::new(usize::from(NUM_CLIENTS));
        let mut real = RealWorld::new(NUM_CLIENTS);

        for op in &ops {
            model.apply(op);
            real.apply(op);

            let expected = model.room_names();
            for (c, list) in real.room_lists.iter().enumerate() {
                if real.clients[c].is_some() {
                    prop_assert_eq!(list.as_ref(), Some(&expected), "client {} after {:?}", c, op);
                }
            }
        }
    }

    /// Disconnecting everyone always empties the room registry.
    #[test]
    fn prop_full_disconnect_leaves_no_rooms(
        ops in prop::collection::vec(operation_strategy(NUM_CLIENTS), 1..40)
    ) {
        let mut real = RealWorld::new(NUM_CLIENTS);
        for op in &ops {
            real.apply(op);
        }
        for c in 0..NUM_CLIENTS {
            real.apply(&Operation::Disconnect { client_id: c });
        }

        prop_assert_eq!(real.dispatcher.rooms().room_count(), 0);
        prop_assert_eq!(real.dispatcher.sessions().session_count(), 0);
    }
}
