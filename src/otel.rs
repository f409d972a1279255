// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # OpenTelemetry Context Propagation
//!
//! Trace context travels in AMQP message headers: it is injected into every
//! published command and extracted from every consumed delivery, so a chat event,
//! the command it produced and the rpc reply can be stitched into one trace.

use lapin::{
    protocol::basic::AMQPProperties,
    types::{AMQPValue, FieldTable, ShortString},
};
use opentelemetry::{
    global::{self, BoxedSpan, BoxedTracer},
    propagation::{Extractor, Injector},
    trace::{SpanKind, Tracer},
    Context,
};
use std::{borrow::Cow, collections::BTreeMap};
use tracing::error;

/// Name of the tracer used for consumer spans.
pub(crate) const CONSUMER_TRACER: &str = "coolq-bridge consumer";

/// Reads and writes trace context entries in an AMQP header table.
pub(crate) struct AmqpHeaderPropagator<'a> {
    headers: &'a mut BTreeMap<ShortString, AMQPValue>,
}

impl<'a> AmqpHeaderPropagator<'a> {
    pub(crate) fn new(headers: &'a mut BTreeMap<ShortString, AMQPValue>) -> Self {
        Self { headers }
    }
}

impl Injector for AmqpHeaderPropagator<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.insert(
            key.to_lowercase().into(),
            AMQPValue::LongString(value.into()),
        );
    }
}

impl Extractor for AmqpHeaderPropagator<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|header_value| {
            if let AMQPValue::LongString(header_value) = header_value {
                std::str::from_utf8(header_value.as_bytes())
                    .map_err(|e| error!("Error decoding header value {:?}", e))
                    .ok()
            } else {
                None
            }
        })
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(|header| header.as_str()).collect()
    }
}

/// Builds the header table of an outgoing message, carrying `ctx`.
pub(crate) fn inject_headers(ctx: &Context) -> FieldTable {
    let mut headers = BTreeMap::<ShortString, AMQPValue>::default();

    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(ctx, &mut AmqpHeaderPropagator::new(&mut headers))
    });

    FieldTable::from(headers)
}

/// Creates a consumer span for a delivery, parented on the context found in its headers.
///
/// # Parameters
/// * `props` - Message properties containing headers
/// * `tracer` - OpenTelemetry tracer
/// * `name` - Name for the new span (the queue alias)
///
/// # Returns
/// A tuple containing the extracted context and the new span
pub(crate) fn new_span(
    props: &AMQPProperties,
    tracer: &BoxedTracer,
    name: &str,
) -> (Context, BoxedSpan) {
    let mut headers = props
        .headers()
        .clone()
        .unwrap_or_default()
        .inner()
        .clone();

    let ctx = global::get_text_map_propagator(|propagator| {
        propagator.extract(&AmqpHeaderPropagator::new(&mut headers))
    });

    let span = tracer
        .span_builder(Cow::from(name.to_owned()))
        .with_kind(SpanKind::Consumer)
        .start_with_context(tracer, &ctx);

    (ctx, span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_values_are_extracted() {
        let mut headers = BTreeMap::default();
        let mut propagator = AmqpHeaderPropagator::new(&mut headers);
        propagator.set("TraceParent", "00-abc-def-01".to_owned());

        assert_eq!(propagator.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(propagator.keys(), vec!["traceparent"]);
        assert_eq!(propagator.get("tracestate"), None);
    }

    #[test]
    fn non_string_headers_are_skipped() {
        let mut headers = BTreeMap::default();
        headers.insert(ShortString::from("count"), AMQPValue::LongInt(3));
        let propagator = AmqpHeaderPropagator::new(&mut headers);

        assert_eq!(propagator.get("count"), None);
    }
}
