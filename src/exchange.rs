// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Definitions
//!
//! Types for describing the exchanges the bridge declares. The bridge reads chat
//! events from a topic exchange and dispatches commands through a direct exchange.

/// Represents the types of exchanges the bridge can declare.
///
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Topic,
}

impl From<ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: ExchangeKind) -> lapin::ExchangeKind {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        }
    }
}

/// Definition of a non-durable exchange.
///
/// Declaring an existing exchange with the same kind is a no-op on the broker; a
/// mismatch is rejected by the broker and surfaces as a declare error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeDefinition<'ex> {
    pub(crate) name: &'ex str,
    pub(crate) kind: ExchangeKind,
}

impl<'ex> ExchangeDefinition<'ex> {
    /// Creates a new Direct exchange definition with the given name.
    pub fn new(name: &'ex str) -> ExchangeDefinition<'ex> {
        ExchangeDefinition {
            name,
            kind: ExchangeKind::Direct,
        }
    }

    /// Sets the exchange type to Direct.
    pub fn direct(mut self) -> Self {
        self.kind = ExchangeKind::Direct;
        self
    }

    /// Sets the exchange type to Topic.
    pub fn topic(mut self) -> Self {
        self.kind = ExchangeKind::Topic;
        self
    }
}
