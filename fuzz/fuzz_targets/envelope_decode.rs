//! Fuzz target for envelope decoding
//!
//! Feeds arbitrary text through every decode entry point to find:
//! - Parser panics on malformed JSON
//! - Tags that decode as inbound messages without being inbound tags
//! - Server messages that do not survive a re-encode
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomcast_proto::{ClientMessage, Envelope, ServerMessage};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(envelope) = Envelope::decode(text) {
        let inbound = envelope.message_type().is_some_and(|t| t.is_inbound());
        if ClientMessage::from_envelope(envelope).is_ok() {
            assert!(inbound, "non-inbound tag decoded as client message: {text}");
        }
    }

    if let Ok(message) = ClientMessage::decode(text) {
        let encoded = message.encode().expect("decoded client message must encode");
        assert_eq!(ClientMessage::decode(&encoded).ok(), Some(message));
    }

    if let Ok(message) = ServerMessage::decode(text) {
        let encoded = message.encode().expect("decoded server message must encode");
        assert_eq!(ServerMessage::decode(&encoded).ok(), Some(message));
    }
});
