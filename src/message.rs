// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Types
//!
//! Wire types of the bridge:
//!
//! - `RoutingKey`: the `<integer>.<category>` key of inbound chat events
//! - `InboundMessage`: the JSON body `{"message": string, "from": number}`
//! - `OutboundCommand`: the JSON body `{"api": string, "params": object}`

use crate::errors::MalformedMessageError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Segment separator of inbound routing keys.
pub const ROUTING_KEY_SEPARATOR: char = '.';

/// Api name of the private-message command.
pub const SEND_PRIVATE_MESSAGE: &str = "send_private_message";

/// Kind of chat event carried by an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Private,
    Group,
    Discuss,
    Other(String),
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        match value {
            "private" => Category::Private,
            "group" => Category::Group,
            "discuss" => Category::Discuss,
            other => Category::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Private => f.write_str("private"),
            Category::Group => f.write_str("group"),
            Category::Discuss => f.write_str("discuss"),
            Category::Other(other) => f.write_str(other),
        }
    }
}

/// Parsed inbound routing key.
///
/// `target` identifies the account the event was received by, and is the key
/// commands for that account are routed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingKey {
    pub target: i64,
    pub category: Category,
}

impl RoutingKey {
    /// Tokenizes `<integer>.<category>`. Exactly two segments are accepted.
    pub fn parse(key: &str) -> Result<RoutingKey, MalformedMessageError> {
        let mut segments = key.split(ROUTING_KEY_SEPARATOR);

        let (Some(target), Some(category)) = (segments.next(), segments.next()) else {
            return Err(MalformedMessageError::MissingSeparator(key.to_owned()));
        };

        if segments.next().is_some() {
            return Err(MalformedMessageError::TooManySegments(key.to_owned()));
        }

        let target = target
            .parse::<i64>()
            .map_err(|_| MalformedMessageError::InvalidTarget(target.to_owned()))?;

        Ok(RoutingKey {
            target,
            category: Category::from(category),
        })
    }

    /// Routing key of commands addressed to the target account.
    pub fn command_key(&self) -> String {
        self.target.to_string()
    }
}

/// Body of an inbound chat event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    pub message: String,
    #[serde(deserialize_with = "deserialize_sender")]
    pub from: i64,
}

impl InboundMessage {
    pub fn from_slice(data: &[u8]) -> Result<InboundMessage, MalformedMessageError> {
        serde_json::from_slice(data).map_err(|err| {
            MalformedMessageError::InvalidPayload(err.to_string())
        })
    }
}

/// Accepts a sender given as a JSON integer, an integral float such as `999.0`,
/// or a string holding an integer.
fn deserialize_sender<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Sender {
        Number(i64),
        Float(f64),
        Text(String),
    }

    match Sender::deserialize(deserializer)? {
        Sender::Number(n) => Ok(n),
        Sender::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(f as i64)
        }
        Sender::Float(f) => Err(serde::de::Error::custom(
            MalformedMessageError::InvalidSender(f.to_string()),
        )),
        Sender::Text(text) => text.trim().parse::<i64>().map_err(|_| {
            serde::de::Error::custom(MalformedMessageError::InvalidSender(text.clone()))
        }),
    }
}

/// Parameters of `send_private_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendPrivateMessageParams {
    pub to: i64,
    pub message: String,
}

/// Command published to the rpc exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundCommand<P> {
    pub api: &'static str,
    pub params: P,
}

impl OutboundCommand<SendPrivateMessageParams> {
    /// Builds the reply to a private message: the text goes back to its sender.
    pub fn send_private_message(inbound: InboundMessage) -> Self {
        OutboundCommand {
            api: SEND_PRIVATE_MESSAGE,
            params: SendPrivateMessageParams {
                to: inbound.from,
                message: inbound.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_private_routing_key() {
        let key = RoutingKey::parse("12345.private").unwrap();
        assert_eq!(key.target, 12345);
        assert_eq!(key.category, Category::Private);
        assert_eq!(key.command_key(), "12345");
    }

    #[test]
    fn keeps_unknown_categories() {
        let key = RoutingKey::parse("42.group").unwrap();
        assert_eq!(key.category, Category::Group);

        let key = RoutingKey::parse("42.notice").unwrap();
        assert_eq!(key.category, Category::Other("notice".to_owned()));
        assert_eq!(key.category.to_string(), "notice");
    }

    #[test]
    fn command_key_is_canonical_integer() {
        let key = RoutingKey::parse("007.private").unwrap();
        assert_eq!(key.command_key(), "7");
    }

    #[test]
    fn rejects_malformed_routing_keys() {
        assert_eq!(
            RoutingKey::parse("private"),
            Err(MalformedMessageError::MissingSeparator("private".to_owned()))
        );
        assert_eq!(
            RoutingKey::parse("1.2.private"),
            Err(MalformedMessageError::TooManySegments("1.2.private".to_owned()))
        );
        assert_eq!(
            RoutingKey::parse("bot.private"),
            Err(MalformedMessageError::InvalidTarget("bot".to_owned()))
        );
        assert_eq!(
            RoutingKey::parse(".private"),
            Err(MalformedMessageError::InvalidTarget("".to_owned()))
        );
    }

    #[test]
    fn parses_inbound_with_numeric_or_string_sender() {
        let msg = InboundMessage::from_slice(br#"{"message": "hi", "from": 999}"#).unwrap();
        assert_eq!(msg.from, 999);
        assert_eq!(msg.message, "hi");

        let msg = InboundMessage::from_slice(br#"{"message": "hi", "from": "999"}"#).unwrap();
        assert_eq!(msg.from, 999);
    }

    #[test]
    fn accepts_integral_float_sender() {
        let msg = InboundMessage::from_slice(br#"{"message": "hi", "from": 999.0}"#).unwrap();
        assert_eq!(msg.from, 999);

        assert!(matches!(
            InboundMessage::from_slice(br#"{"message": "hi", "from": 999.5}"#),
            Err(MalformedMessageError::InvalidPayload(_))
        ));
        assert!(matches!(
            InboundMessage::from_slice(br#"{"message": "hi", "from": 1e300}"#),
            Err(MalformedMessageError::InvalidPayload(_))
        ));
    }

    #[test]
    fn ignores_extra_inbound_fields() {
        let msg = InboundMessage::from_slice(br#"{"group": 7, "from": 1, "message": "x"}"#)
            .unwrap();
        assert_eq!(msg.from, 1);
    }

    #[test]
    fn rejects_malformed_payloads() {
        for payload in [
            &br#"{"message": "hi"}"#[..],
            br#"{"from": 999}"#,
            br#"{"message": "hi", "from": "abc"}"#,
            br#"{"message": 3, "from": 999}"#,
            b"not json",
            b"",
        ] {
            assert!(
                matches!(
                    InboundMessage::from_slice(payload),
                    Err(MalformedMessageError::InvalidPayload(_))
                ),
                "payload {:?} should be rejected",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn private_command_body() {
        let inbound = InboundMessage {
            message: "hi".to_owned(),
            from: 999,
        };
        let command = OutboundCommand::send_private_message(inbound);

        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({
                "api": "send_private_message",
                "params": { "to": 999, "message": "hi" }
            })
        );
    }
}
