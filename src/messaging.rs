// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Messaging Abstractions
//!
//! Broker-independent seams between the bridge logic and the AMQP plumbing:
//!
//! - `Publisher`: sends a `PublishMessage` to an exchange
//! - `ConsumerHandler`: processes a `ConsumerMessage` taken from a queue
//!
//! The bridge handlers only see these types, which keeps them testable without a broker.

use crate::errors::MessagingError;
use async_trait::async_trait;
use opentelemetry::Context;

/// A message to be published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishMessage {
    /// Destination exchange.
    pub to: String,
    pub key: Option<String>,
    pub msg_type: Option<String>,
    pub data: Vec<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
}

impl PublishMessage {
    pub fn new(to: &str, key: &str, data: Vec<u8>) -> Self {
        PublishMessage {
            to: to.to_owned(),
            key: Some(key.to_owned()),
            data,
            ..PublishMessage::default()
        }
    }

    pub fn msg_type(mut self, msg_type: &str) -> Self {
        self.msg_type = Some(msg_type.to_owned());
        self
    }

    pub fn correlation(mut self, correlation_id: &str, reply_to: &str) -> Self {
        self.correlation_id = Some(correlation_id.to_owned());
        self.reply_to = Some(reply_to.to_owned());
        self
    }
}

/// A message delivered from a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerMessage {
    /// Alias of the queue the message was consumed from.
    pub from: String,
    pub routing_key: String,
    pub data: Vec<u8>,
    pub correlation_id: Option<String>,
}

impl ConsumerMessage {
    pub fn new(from: &str, routing_key: &str, data: &[u8], correlation_id: Option<&str>) -> Self {
        ConsumerMessage {
            from: from.to_owned(),
            routing_key: routing_key.to_owned(),
            data: data.to_vec(),
            correlation_id: correlation_id.map(str::to_owned),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, ctx: &Context, infos: &PublishMessage) -> Result<(), MessagingError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn exec(&self, ctx: &Context, msg: &ConsumerMessage) -> Result<(), MessagingError>;
}
