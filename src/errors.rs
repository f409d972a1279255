// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Bridge
//!
//! This module groups the error taxonomy of the bridge:
//!
//! - `AmqpError`: connection, channel and topology failures. These are fatal at startup.
//! - `MalformedMessageError`: an inbound routing key or payload that does not have the
//!   expected shape. The offending delivery is dropped and processing continues.
//! - `MessagingError`: failures scoped to handling or publishing a single message.
//! - `ConfigError`: invalid configuration sources.

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
///
/// Each variant provides specific context about what operation failed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server, or losing it
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding an exchange to a queue
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error binding a consumer to a queue
    #[error("failure to declare consumer `{0}`")]
    BindingConsumerError(String),

    /// A binding or consumer refers to a queue alias that was never declared
    #[error("unknown queue `{0}`")]
    UnknownQueue(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error configuring Quality of Service parameters
    #[error("failure to configure qos `{0}`")]
    QoSDeclarationError(String),
}

/// An inbound routing key or payload that does not match `<integer>.<category>`
/// and `{"message": string, "from": number}`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedMessageError {
    #[error("routing key `{0}` has no `.` separator")]
    MissingSeparator(String),

    #[error("routing key `{0}` has more than two segments")]
    TooManySegments(String),

    #[error("target `{0}` is not an integer")]
    InvalidTarget(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("sender `{0}` is not an integer")]
    InvalidSender(String),
}

/// Errors at the publisher / handler seam. Every variant is scoped to the
/// single message being processed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessagingError {
    #[error("failure to publish")]
    PublisherError,

    #[error(transparent)]
    Malformed(#[from] MalformedMessageError),

    #[error("failure to serialize `{0}`")]
    Serialization(String),

    #[error("invalid rpc reply: {0}")]
    InvalidReply(String),
}

/// Errors raised while loading the bridge configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failure to read config file `{path}`")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failure to parse config file `{path}`")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value `{value}` for env `{key}`")]
    InvalidEnv { key: String, value: String },
}
