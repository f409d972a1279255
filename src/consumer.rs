// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Consumer
//!
//! Turns a lapin delivery into a `ConsumerMessage`, dispatches it and settles the
//! delivery with the broker according to the outcome. Every delivery gets a
//! consumer span parented on the trace context found in its headers.

use crate::{
    dispatcher::{DispatchTable, Disposition},
    errors::AmqpError,
    messaging::ConsumerMessage,
    otel,
};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
};
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
};
use std::borrow::Cow;
use tracing::{debug, error};

/// Consumes and settles one delivery taken from the queue with the given alias.
///
/// 1. Creates a trace span for the delivery
/// 2. Dispatches the message to the queue's handler
/// 3. Acks handled and unhandled messages, nacks failed ones without requeue
///
/// # Returns
/// Ok(()) once the delivery is settled, or AmqpError if settling failed
pub(crate) async fn consume(
    tracer: &BoxedTracer,
    queue_alias: &str,
    delivery: &Delivery,
    table: &DispatchTable,
) -> Result<(), AmqpError> {
    let (ctx, mut span) = otel::new_span(&delivery.properties, tracer, queue_alias);

    debug!(
        "received: {} - exchange: {} - key: {}",
        queue_alias, delivery.exchange, delivery.routing_key,
    );

    let msg = ConsumerMessage::new(
        queue_alias,
        delivery.routing_key.as_str(),
        &delivery.data,
        delivery
            .properties
            .correlation_id()
            .as_ref()
            .map(|id| id.as_str()),
    );

    match table.dispatch(&ctx, &msg).await {
        Disposition::Ack => {
            span.set_status(Status::Ok);
            ack(delivery, &mut span).await
        }
        Disposition::Unhandled => {
            span.set_status(Status::Error {
                description: Cow::from("removing message from queue - reason: no handler"),
            });
            ack(delivery, &mut span).await
        }
        Disposition::Reject(err) => {
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from(err.to_string()),
            });

            match delivery
                .nack(BasicNackOptions {
                    multiple: false,
                    requeue: false,
                })
                .await
            {
                Ok(_) => Ok(()),
                Err(e) => {
                    error!("error whiling nack msg");
                    span.record_error(&e);
                    Err(AmqpError::NackMessageError {})
                }
            }
        }
    }
}

async fn ack<S: Span>(delivery: &Delivery, span: &mut S) -> Result<(), AmqpError> {
    match delivery.ack(BasicAckOptions { multiple: false }).await {
        Err(e) => {
            error!("error whiling ack msg");
            span.record_error(&e);
            span.set_status(Status::Error {
                description: Cow::from("error to ack msg"),
            });
            Err(AmqpError::AckMessageError {})
        }
        _ => Ok(()),
    }
}
