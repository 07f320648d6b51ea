//! Fan-out of one message to many sessions.
//!
//! The message is encoded once and the same `Arc<str>` is queued on every
//! recipient. A failed recipient is logged and counted; it never stops delivery
//! to the rest.

use std::sync::Arc;

use roomcast_proto::{ProtocolError, ServerMessage};

use crate::registry::Session;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions in the snapshot
    pub recipients: usize,
    /// Sessions whose connection accepted the frame
    pub delivered: usize,
}

impl BroadcastReport {
    /// Recipients whose send failed.
    pub fn failed(&self) -> usize {
        self.recipients - self.delivered
    }
}

/// Deliver `message` to every session in `recipients`.
///
/// `recipients` must already be a snapshot: no lock may be held while this
/// runs.
pub(crate) fn fan_out(
    recipients: &[Arc<Session>],
    message: &ServerMessage,
    scope: &str,
) -> Result<BroadcastReport, ProtocolError> {
    let text: Arc<str> = Arc::from(message.encode()?);
    let mut report = BroadcastReport { recipients: recipients.len(), delivered: 0 };

    for session in recipients {
        match session.deliver(Arc::clone(&text)) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(
                    connection_id = %session.id(),
                    scope,
                    message_type = %message.message_type(),
                    error = %e,
                    "broadcast delivery failed"
                );
            },
        }
    }

    tracing::trace!(
        scope,
        message_type = %message.message_type(),
        recipients = report.recipients,
        delivered = report.delivered,
        "broadcast"
    );

    Ok(report)
}
