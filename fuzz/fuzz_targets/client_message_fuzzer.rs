//! Fuzz target for structured client envelopes
//!
//! Builds JSON envelopes from fuzzer-chosen tags and payload shapes so the
//! type-directed decode step sees far more well-formed envelopes than raw
//! byte fuzzing reaches.
//!
//! # Invariants
//!
//! - Only inbound tags decode, and only with a payload of the right shape
//! - Failures are classified as `UnknownType` or `InvalidPayload`, never `Malformed`
//! - NEVER panic

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomcast_proto::{ClientMessage, MessageType, ProtocolError};
use serde_json::{Value, json};

#[derive(Debug, Clone, Arbitrary)]
enum Tag {
    Known(u8),
    Lowercase(u8),
    Other(String),
}

#[derive(Debug, Clone, Arbitrary)]
enum Payload {
    Missing,
    Null,
    Bool(bool),
    Number(i64),
    Text(String),
    Chat { target_room: Option<String>, message: Option<String> },
    StringifiedChat { target_room: String, message: String },
    Array(Vec<String>),
}

#[derive(Debug, Clone, Arbitrary)]
struct Input {
    tag: Tag,
    payload: Payload,
}

fn tag_text(tag: &Tag) -> String {
    match tag {
        Tag::Known(i) => MessageType::ALL[usize::from(*i) % MessageType::ALL.len()].as_str().to_string(),
        Tag::Lowercase(i) => {
            MessageType::ALL[usize::from(*i) % MessageType::ALL.len()].as_str().to_lowercase()
        },
        Tag::Other(text) => text.clone(),
    }
}

fn payload_value(payload: &Payload) -> Option<Value> {
    let value = match payload {
        Payload::Missing => return None,
        Payload::Null => Value::Null,
        Payload::Bool(b) => json!(b),
        Payload::Number(n) => json!(n),
        Payload::Text(text) => json!(text),
        Payload::Chat { target_room, message } => {
            let mut object = serde_json::Map::new();
            if let Some(room) = target_room {
                object.insert("targetRoom".to_string(), json!(room));
            }
            if let Some(message) = message {
                object.insert("message".to_string(), json!(message));
            }
            Value::Object(object)
        },
        Payload::StringifiedChat { target_room, message } => {
            json!(json!({"targetRoom": target_room, "message": message}).to_string())
        },
        Payload::Array(items) => json!(items),
    };
    Some(value)
}

fuzz_target!(|input: Input| {
    let tag = tag_text(&input.tag);
    let mut envelope = serde_json::Map::new();
    envelope.insert("type".to_string(), json!(tag));
    if let Some(payload) = payload_value(&input.payload) {
        envelope.insert("payload".to_string(), payload);
    }
    let text = Value::Object(envelope).to_string();

    match ClientMessage::decode(&text) {
        Ok(message) => {
            assert_eq!(message.message_type().as_str(), tag);
            assert!(message.message_type().is_inbound());
        },
        Err(ProtocolError::UnknownType(kind)) => {
            assert_eq!(kind, tag);
            assert!(MessageType::parse(&tag).is_none_or(|t| !t.is_inbound()));
        },
        Err(ProtocolError::InvalidPayload { message_type, .. }) => {
            assert_eq!(message_type.as_str(), tag);
        },
        Err(e) => panic!("well-formed envelope misclassified: {e} for {text}"),
    }
});
