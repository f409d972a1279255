// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Dispatcher
//!
//! This module maps queues to their handlers and runs the receive loop.
//!
//! All registered queues are consumed from one loop. Each delivery is handled to
//! completion (parse, transform, publish, ack) before the next one is taken, so
//! messages are processed one at a time in arrival order.

use crate::{
    consumer::consume,
    errors::{AmqpError, MessagingError},
    messaging::{ConsumerHandler, ConsumerMessage},
    otel::CONSUMER_TRACER,
    topology::DeclaredQueues,
};
use futures_util::{stream::select_all, StreamExt};
use lapin::{options::BasicConsumeOptions, types::FieldTable, Channel};
use opentelemetry::{global, Context};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error, info, warn};

/// What to do with a delivery once its handler returned.
#[derive(Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Handled; acknowledge.
    Ack,
    /// Handling failed; drop the delivery without requeue.
    Reject(MessagingError),
    /// No handler is registered for the queue; acknowledge to remove it.
    Unhandled,
}

/// Queue alias to handler mapping.
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: BTreeMap<String, Arc<dyn ConsumerHandler>>,
}

impl DispatchTable {
    pub fn register(&mut self, queue_alias: &str, handler: Arc<dyn ConsumerHandler>) {
        self.handlers.insert(queue_alias.to_owned(), handler);
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Runs the handler registered for the message's queue.
    ///
    /// Handler failures are logged here and never propagate: one bad message must
    /// not stop the loop.
    pub async fn dispatch(&self, ctx: &Context, msg: &ConsumerMessage) -> Disposition {
        let Some(handler) = self.handlers.get(&msg.from) else {
            warn!(queue = msg.from, "removing message from queue - reason: no handler");
            return Disposition::Unhandled;
        };

        match handler.exec(ctx, msg).await {
            Ok(()) => {
                debug!(queue = msg.from, "message successfully processed");
                Disposition::Ack
            }
            Err(err) => {
                error!(
                    error = err.to_string(),
                    queue = msg.from,
                    routing_key = msg.routing_key,
                    "dropping message"
                );
                Disposition::Reject(err)
            }
        }
    }
}

/// Consumes the registered queues of one channel.
pub struct RabbitMQDispatcher {
    channel: Arc<Channel>,
    queues: DeclaredQueues,
    table: DispatchTable,
}

impl RabbitMQDispatcher {
    /// Creates a new dispatcher.
    ///
    /// # Parameters
    /// * `channel` - A channel to the RabbitMQ server
    /// * `queues` - Broker names of the declared queues, used to resolve handler aliases
    pub fn new(channel: Arc<Channel>, queues: DeclaredQueues) -> Self {
        RabbitMQDispatcher {
            channel,
            queues,
            table: DispatchTable::default(),
        }
    }

    /// Registers the handler for the queue declared under `queue_alias`.
    pub fn register(mut self, queue_alias: &str, handler: Arc<dyn ConsumerHandler>) -> Self {
        self.table.register(queue_alias, handler);
        self
    }

    /// Consumes messages until every consumer stream ends.
    ///
    /// Under normal operation this never returns. The streams only end when the
    /// connection or channel is gone, which is reported as `ConnectionError`.
    pub async fn consume_blocking(&self) -> Result<(), AmqpError> {
        let mut streams = vec![];

        for alias in self.table.aliases() {
            let queue_name = self.queues.name(alias)?;

            let consumer = match self
                .channel
                .basic_consume(
                    queue_name,
                    &format!("{}-consumer", alias),
                    BasicConsumeOptions {
                        no_local: false,
                        no_ack: false,
                        exclusive: false,
                        nowait: false,
                    },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), queue = alias, "error to create the consumer");
                    Err(AmqpError::BindingConsumerError(alias.to_owned()))
                }
                Ok(c) => Ok(c),
            }?;

            info!(queue = alias, name = queue_name, "consuming");

            let alias = alias.to_owned();
            streams.push(consumer.map(move |result| (alias.clone(), result)).boxed());
        }

        let tracer = global::tracer(CONSUMER_TRACER);
        let mut deliveries = select_all(streams);

        while let Some((alias, result)) = deliveries.next().await {
            match result {
                Ok(delivery) => {
                    if let Err(err) = consume(&tracer, &alias, &delivery, &self.table).await {
                        error!(error = err.to_string(), "error consume msg");
                    }
                }
                Err(err) => error!(error = err.to_string(), queue = alias, "errors consume msg"),
            }
        }

        error!("all consumers stopped");
        Err(AmqpError::ConnectionError)
    }
}
