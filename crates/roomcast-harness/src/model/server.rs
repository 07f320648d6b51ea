//! Model server state machine.
//!
//! Sequential reference for the room registry: plain maps, no concurrency,
//! no transport. Whatever the real dispatcher does for a sequence of
//! operations, this model must agree with.

use std::collections::{BTreeMap, BTreeSet};

use roomcast_server::ValidationError;

use super::operation::{ClientId, Operation, OperationResult, nickname, room_name};

/// Membership and nicknames, comparable between model and real system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservableState {
    /// Room name to member clients
    pub rooms: BTreeMap<String, BTreeSet<ClientId>>,
    /// Nicknames of connected clients that set one
    pub nicknames: BTreeMap<ClientId, String>,
}

/// Model server state.
#[derive(Debug, Clone)]
pub struct ModelServer {
    connected: BTreeSet<ClientId>,
    state: ObservableState,
}

impl ModelServer {
    /// Model with `num_clients` connected, unnamed clients.
    pub fn new(num_clients: usize) -> Self {
        let connected = (0..num_clients).filter_map(|c| ClientId::try_from(c).ok()).collect();
        Self { connected, state: ObservableState::default() }
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let client = op.client_id();
        if let Operation::Reconnect { .. } = op {
            return if self.connected.insert(client) {
                OperationResult::Applied
            } else {
                OperationResult::NoOp
            };
        }
        if !self.connected.contains(&client) {
            return OperationResult::NoOp;
        }

        match op {
            Operation::SetNickname { nickname: seed, .. } => {
                let name = nickname(*seed);
                if name.is_empty() {
                    return OperationResult::Rejected(ValidationError::EmptyNickname.to_string());
                }
                self.state.nicknames.insert(client, name);
                OperationResult::Applied
            },
            Operation::JoinRoom { room_id, .. } => {
                if !self.state.nicknames.contains_key(&client) {
                    return OperationResult::Rejected(
                        ValidationError::NicknameRequired.to_string(),
                    );
                }
                if self.state.rooms.entry(room_name(*room_id)).or_default().insert(client) {
                    OperationResult::Applied
                } else {
                    OperationResult::NoOp
                }
            },
            Operation::LeaveRoom { room_id, .. } => {
                if self.remove_member(client, &room_name(*room_id)) {
                    OperationResult::Applied
                } else {
                    OperationResult::NoOp
                }
            },
            Operation::SendChat { room_id, .. } => match self.state.rooms.get(&room_name(*room_id)) {
                Some(members) if members.contains(&client) => {
                    OperationResult::Delivered(members.len())
                },
                _ => OperationResult::NoOp,
            },
            Operation::Disconnect { .. } => {
                let joined: Vec<String> = self
                    .state
                    .rooms
                    .iter()
                    .filter(|(_, members)| members.contains(&client))
                    .map(|(name, _)| name.clone())
                    .collect();
                for name in joined {
                    self.remove_member(client, &name);
                }
                self.state.nicknames.remove(&client);
                self.connected.remove(&client);
                OperationResult::Applied
            },
            Operation::Reconnect { .. } => OperationResult::NoOp,
        }
    }

    fn remove_member(&mut self, client: ClientId, room: &str) -> bool {
        let Some(members) = self.state.rooms.get_mut(room) else {
            return false;
        };
        if !members.remove(&client) {
            return false;
        }
        if members.is_empty() {
            self.state.rooms.remove(room);
        }
        true
    }

    /// Whether a client is connected.
    pub fn is_connected(&self, client: ClientId) -> bool {
        self.connected.contains(&client)
    }

    /// Sorted room names.
    pub fn room_names(&self) -> Vec<String> {
        self.state.rooms.keys().cloned().collect()
    }

    /// Current observable state.
    pub fn observable(&self) -> &ObservableState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_requires_nickname() {
        let mut model = ModelServer::new(1);
        let result = model.apply(&Operation::JoinRoom { client_id: 0, room_id: 0 });
        assert_eq!(result, OperationResult::Rejected(ValidationError::NicknameRequired.to_string()));
    }

    #[test]
    fn last_leave_removes_room() {
        let mut model = ModelServer::new(2);
        model.apply(&Operation::SetNickname { client_id: 0, nickname: 1 });
        model.apply(&Operation::JoinRoom { client_id: 0, room_id: 1 });
        assert_eq!(model.room_names(), vec!["room-1".to_string()]);

        assert_eq!(
            model.apply(&Operation::LeaveRoom { client_id: 0, room_id: 1 }),
            OperationResult::Applied
        );
        assert!(model.room_names().is_empty());
    }

    #[test]
    fn disconnected_client_is_inert() {
        let mut model = ModelServer::new(1);
        model.apply(&Operation::SetNickname { client_id: 0, nickname: 1 });
        model.apply(&Operation::Disconnect { client_id: 0 });

        assert!(!model.is_connected(0));
        assert_eq!(
            model.apply(&Operation::SetNickname { client_id: 0, nickname: 2 }),
            OperationResult::NoOp
        );
        assert_eq!(model.apply(&Operation::Reconnect { client_id: 0 }), OperationResult::Applied);
        assert!(model.observable().nicknames.is_empty());
    }
}
