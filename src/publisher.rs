// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! This module implements the `Publisher` trait on top of a lapin channel.
//! Publishing is fire-and-forget: no publisher confirms are awaited.

use crate::{
    errors::MessagingError,
    messaging::{PublishMessage, Publisher},
    otel,
};
use async_trait::async_trait;
use lapin::{options::BasicPublishOptions, types::ShortString, BasicProperties, Channel};
use opentelemetry::Context;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// RabbitMQ implementation of the Publisher trait.
pub struct RabbitMQPublisher {
    channel: Arc<Channel>,
}

impl RabbitMQPublisher {
    /// Creates a new RabbitMQ publisher.
    ///
    /// # Parameters
    /// * `channel` - A channel to the RabbitMQ server
    ///
    /// # Returns
    /// An Arc-wrapped RabbitMQPublisher instance
    pub fn new(channel: Arc<Channel>) -> Arc<RabbitMQPublisher> {
        Arc::new(RabbitMQPublisher { channel })
    }
}

#[async_trait]
impl Publisher for RabbitMQPublisher {
    /// Publishes a message with its trace context in the headers and, when set,
    /// its correlation id and reply queue in the message properties.
    async fn publish(&self, ctx: &Context, infos: &PublishMessage) -> Result<(), MessagingError> {
        let props = properties(ctx, infos);

        match self
            .channel
            .basic_publish(
                &infos.to,
                &infos.key.clone().unwrap_or_default(),
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &infos.data,
                props,
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    exchange = %infos.to,
                    "error publishing message"
                );
                Err(MessagingError::PublisherError)
            }
            _ => {
                debug!(
                    exchange = %infos.to,
                    key = infos.key.as_deref().unwrap_or_default(),
                    "message published"
                );
                Ok(())
            }
        }
    }
}

fn properties(ctx: &Context, infos: &PublishMessage) -> BasicProperties {
    let mut props = BasicProperties::default()
        .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
        .with_type(ShortString::from(infos.msg_type.clone().unwrap_or_default()))
        .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
        .with_headers(otel::inject_headers(ctx));

    if let Some(correlation_id) = &infos.correlation_id {
        props = props.with_correlation_id(ShortString::from(correlation_id.clone()));
    }

    if let Some(reply_to) = &infos.reply_to {
        props = props.with_reply_to(ShortString::from(reply_to.clone()));
    }

    props
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_message_properties() {
        let msg = PublishMessage::new("coolq.rpc", "12345", vec![]).msg_type("send_private_message");
        let props = properties(&Context::new(), &msg);

        assert_eq!(
            props.content_type().as_ref().map(|v| v.as_str()),
            Some(JSON_CONTENT_TYPE)
        );
        assert_eq!(
            props.kind().as_ref().map(|v| v.as_str()),
            Some("send_private_message")
        );
        assert!(props.message_id().is_some());
        assert!(props.correlation_id().is_none());
        assert!(props.reply_to().is_none());
    }

    #[test]
    fn correlated_message_properties() {
        let msg = PublishMessage::new("coolq.rpc", "12345", vec![])
            .correlation("token-1", "amq.gen-reply");
        let props = properties(&Context::new(), &msg);

        assert_eq!(
            props.correlation_id().as_ref().map(|v| v.as_str()),
            Some("token-1")
        );
        assert_eq!(
            props.reply_to().as_ref().map(|v| v.as_str()),
            Some("amq.gen-reply")
        );
    }
}
