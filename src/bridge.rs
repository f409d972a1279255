// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Bridge
//!
//! The bridge turns private chat events into `send_private_message` commands:
//!
//! ```text
//! coolq.msg (topic, "#.private") -> on_message -> coolq.rpc (direct, "<target>")
//! ```
//!
//! With a reply queue attached, every command carries a correlation id and the
//! reply queue name, and `on_rpc_response` surfaces whatever arrives on that queue.

use crate::{
    correlation::{CorrelationContext, PendingReplies, ReplyMatch},
    errors::MessagingError,
    message::{Category, InboundMessage, OutboundCommand, RoutingKey},
    messaging::{ConsumerHandler, ConsumerMessage, PublishMessage, Publisher},
};
use async_trait::async_trait;
use opentelemetry::Context;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What `on_message` did with an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A command was published with this routing key.
    Forwarded { key: String },
    /// The category is not forwarded.
    Ignored(Category),
}

/// Owns everything the handlers need: the publisher, the command exchange and,
/// in rpc mode, the reply queue and the ledger of issued correlation ids.
pub struct MessageBridge {
    publisher: Arc<dyn Publisher>,
    rpc_exchange: String,
    reply_queue: Option<String>,
    pending: PendingReplies,
}

impl MessageBridge {
    pub fn new(publisher: Arc<dyn Publisher>, rpc_exchange: &str) -> Self {
        MessageBridge {
            publisher,
            rpc_exchange: rpc_exchange.to_owned(),
            reply_queue: None,
            pending: PendingReplies::default(),
        }
    }

    /// Enables correlation: commands will ask for replies on `queue_name`.
    pub fn with_reply_queue(mut self, queue_name: &str) -> Self {
        self.reply_queue = Some(queue_name.to_owned());
        self
    }

    pub fn reply_queue(&self) -> Option<&str> {
        self.reply_queue.as_deref()
    }

    /// Handles one inbound chat event.
    ///
    /// The routing key and the payload are both validated before the category is
    /// looked at. Only `private` events are forwarded; they become a
    /// `send_private_message` command addressed back to the sender and routed to
    /// the account that received the event.
    ///
    /// # Errors
    /// `MessagingError::Malformed` for a bad routing key or payload,
    /// `MessagingError::PublisherError` when the command could not be sent.
    pub async fn on_message(
        &self,
        ctx: &Context,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<Outcome, MessagingError> {
        let key = RoutingKey::parse(routing_key)?;
        let inbound = InboundMessage::from_slice(payload)?;

        info!(
            target_id = key.target,
            category = %key.category,
            from = inbound.from,
            text = inbound.message,
            "received message"
        );

        if key.category != Category::Private {
            debug!(category = %key.category, "category is not forwarded");
            return Ok(Outcome::Ignored(key.category));
        }

        let command = OutboundCommand::send_private_message(inbound);
        let data = serde_json::to_vec(&command)
            .map_err(|err| MessagingError::Serialization(err.to_string()))?;

        let command_key = key.command_key();
        let mut msg =
            PublishMessage::new(&self.rpc_exchange, &command_key, data).msg_type(command.api);

        let correlation = self.reply_queue.as_deref().map(CorrelationContext::new);
        if let Some(correlation) = &correlation {
            msg = msg.correlation(&correlation.correlation_id, &correlation.reply_to);
        }

        self.publisher.publish(ctx, &msg).await?;

        if let Some(correlation) = correlation {
            self.pending.insert(&correlation.correlation_id);
            debug!(
                correlation_id = correlation.correlation_id,
                reply_to = correlation.reply_to,
                pending = self.pending.len(),
                "awaiting rpc response"
            );
        }

        Ok(Outcome::Forwarded { key: command_key })
    }

    /// Surfaces a payload delivered to the reply queue.
    ///
    /// Any JSON document is accepted. The correlation id is checked against the
    /// ledger only to report whether the reply was expected.
    pub fn on_rpc_response(
        &self,
        correlation_id: Option<&str>,
        payload: &[u8],
    ) -> Result<serde_json::Value, MessagingError> {
        let reply = serde_json::from_slice::<serde_json::Value>(payload)
            .map_err(|err| MessagingError::InvalidReply(err.to_string()))?;

        match self.pending.complete(correlation_id) {
            ReplyMatch::Matched => info!(
                correlation_id = correlation_id.unwrap_or_default(),
                reply = %reply,
                "rpc response"
            ),
            ReplyMatch::Unknown => warn!(
                correlation_id = correlation_id.unwrap_or_default(),
                reply = %reply,
                "rpc response with unknown correlation id"
            ),
            ReplyMatch::Missing => warn!(reply = %reply, "rpc response without correlation id"),
        }

        Ok(reply)
    }
}

/// Consumer handler of the subscription queue.
pub struct InboundHandler {
    bridge: Arc<MessageBridge>,
}

impl InboundHandler {
    pub fn new(bridge: Arc<MessageBridge>) -> Arc<InboundHandler> {
        Arc::new(InboundHandler { bridge })
    }
}

#[async_trait]
impl ConsumerHandler for InboundHandler {
    async fn exec(&self, ctx: &Context, msg: &ConsumerMessage) -> Result<(), MessagingError> {
        self.bridge
            .on_message(ctx, &msg.routing_key, &msg.data)
            .await
            .map(|_| ())
    }
}

/// Consumer handler of the reply queue.
pub struct ReplyHandler {
    bridge: Arc<MessageBridge>,
}

impl ReplyHandler {
    pub fn new(bridge: Arc<MessageBridge>) -> Arc<ReplyHandler> {
        Arc::new(ReplyHandler { bridge })
    }
}

#[async_trait]
impl ConsumerHandler for ReplyHandler {
    async fn exec(&self, _ctx: &Context, msg: &ConsumerMessage) -> Result<(), MessagingError> {
        self.bridge
            .on_rpc_response(msg.correlation_id.as_deref(), &msg.data)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::MalformedMessageError, messaging::MockPublisher};
    use serde_json::json;
    use std::sync::Mutex;

    const REPLY_QUEUE: &str = "amq.gen-reply";

    fn recording_publisher() -> (Arc<MockPublisher>, Arc<Mutex<Vec<PublishMessage>>>) {
        let sent = Arc::new(Mutex::new(vec![]));
        let mut publisher = MockPublisher::new();
        let sink = sent.clone();
        publisher.expect_publish().returning(move |_, msg| {
            sink.lock().unwrap().push(msg.clone());
            Ok(())
        });
        (Arc::new(publisher), sent)
    }

    #[tokio::test]
    async fn forwards_private_message_to_sender() {
        let (publisher, sent) = recording_publisher();
        let bridge = MessageBridge::new(publisher, "coolq.rpc");

        let outcome = bridge
            .on_message(
                &Context::new(),
                "12345.private",
                br#"{"message": "hi", "from": 999}"#,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Forwarded {
                key: "12345".to_owned()
            }
        );

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "coolq.rpc");
        assert_eq!(sent[0].key.as_deref(), Some("12345"));
        assert_eq!(sent[0].msg_type.as_deref(), Some("send_private_message"));
        assert_eq!(sent[0].correlation_id, None);
        assert_eq!(sent[0].reply_to, None);
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&sent[0].data).unwrap(),
            json!({
                "api": "send_private_message",
                "params": { "to": 999, "message": "hi" }
            })
        );
    }

    #[tokio::test]
    async fn ignores_other_categories() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();
        let bridge = MessageBridge::new(Arc::new(publisher), "coolq.rpc");

        for key in ["12345.group", "12345.discuss", "12345.notice"] {
            let outcome = bridge
                .on_message(&Context::new(), key, br#"{"message": "hi", "from": 1}"#)
                .await
                .unwrap();
            assert!(matches!(outcome, Outcome::Ignored(_)), "{key} was forwarded");
        }
    }

    #[tokio::test]
    async fn malformed_messages_publish_nothing() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();
        let bridge = MessageBridge::new(Arc::new(publisher), "coolq.rpc");

        let err = bridge
            .on_message(&Context::new(), "private", br#"{"message": "hi", "from": 1}"#)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MessagingError::Malformed(MalformedMessageError::MissingSeparator(
                "private".to_owned()
            ))
        );

        let err = bridge
            .on_message(&Context::new(), "12345.private", br#"{"message": "hi"}"#)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MessagingError::Malformed(MalformedMessageError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn publish_failure_is_reported() {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .returning(|_, _| Err(MessagingError::PublisherError));
        let bridge = MessageBridge::new(Arc::new(publisher), "coolq.rpc").with_reply_queue(REPLY_QUEUE);

        let err = bridge
            .on_message(&Context::new(), "1.private", br#"{"message": "hi", "from": 2}"#)
            .await
            .unwrap_err();

        assert_eq!(err, MessagingError::PublisherError);
        assert_eq!(bridge.pending.len(), 0);
    }

    #[tokio::test]
    async fn rpc_mode_attaches_fresh_correlation() {
        let (publisher, sent) = recording_publisher();
        let bridge = MessageBridge::new(publisher, "coolq.rpc").with_reply_queue(REPLY_QUEUE);

        for _ in 0..3 {
            bridge
                .on_message(
                    &Context::new(),
                    "12345.private",
                    br#"{"message": "hi", "from": 999}"#,
                )
                .await
                .unwrap();
        }

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        for msg in sent.iter() {
            assert_eq!(msg.reply_to.as_deref(), Some(REPLY_QUEUE));
            assert!(msg.correlation_id.is_some());
        }
        assert_ne!(sent[0].correlation_id, sent[1].correlation_id);
        assert_ne!(sent[1].correlation_id, sent[2].correlation_id);
        assert_ne!(sent[0].correlation_id, sent[2].correlation_id);
        assert_eq!(bridge.pending.len(), 3);
    }

    #[tokio::test]
    async fn replies_are_surfaced_and_matched() {
        let (publisher, sent) = recording_publisher();
        let bridge = MessageBridge::new(publisher, "coolq.rpc").with_reply_queue(REPLY_QUEUE);

        bridge
            .on_message(&Context::new(), "1.private", br#"{"message": "hi", "from": 2}"#)
            .await
            .unwrap();
        let token = sent.lock().unwrap()[0].correlation_id.clone().unwrap();

        let reply = bridge
            .on_rpc_response(Some(token.as_str()), br#"{"ok": true}"#)
            .unwrap();
        assert_eq!(reply, json!({ "ok": true }));
        assert_eq!(bridge.pending.len(), 0);

        let reply = bridge
            .on_rpc_response(Some("someone-else"), br#"[1, 2]"#)
            .unwrap();
        assert_eq!(reply, json!([1, 2]));

        let reply = bridge.on_rpc_response(None, b"\"plain\"").unwrap();
        assert_eq!(reply, json!("plain"));
    }

    #[test]
    fn invalid_replies_are_errors() {
        let bridge = MessageBridge::new(Arc::new(MockPublisher::new()), "coolq.rpc");

        assert!(matches!(
            bridge.on_rpc_response(None, b""),
            Err(MessagingError::InvalidReply(_))
        ));
        assert!(matches!(
            bridge.on_rpc_response(Some("x"), b"<ok/>"),
            Err(MessagingError::InvalidReply(_))
        ));
    }

    #[tokio::test]
    async fn handlers_delegate_to_bridge() {
        let (publisher, sent) = recording_publisher();
        let bridge = Arc::new(MessageBridge::new(publisher, "coolq.rpc").with_reply_queue(REPLY_QUEUE));

        let inbound = InboundHandler::new(bridge.clone());
        let msg = ConsumerMessage::new(
            "inbound",
            "77.private",
            br#"{"message": "yo", "from": "5"}"#,
            None,
        );
        inbound.exec(&Context::new(), &msg).await.unwrap();
        assert_eq!(sent.lock().unwrap()[0].key.as_deref(), Some("77"));

        let replies = ReplyHandler::new(bridge);
        let reply = ConsumerMessage::new("replies", REPLY_QUEUE, b"{}", Some("x"));
        replies.exec(&Context::new(), &reply).await.unwrap();

        let bad = ConsumerMessage::new("replies", REPLY_QUEUE, b"", None);
        assert!(replies.exec(&Context::new(), &bad).await.is_err());
    }
}
