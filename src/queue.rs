// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! Types for describing queues and their bindings to exchanges.
//!
//! Queues are addressed locally by an alias. A definition with an empty name is
//! named by the broker at declaration time, so bindings and consumers refer to the
//! alias and the topology resolves it to the broker-assigned name.

/// Definition of a RabbitMQ queue with its configuration parameters.
///
/// This struct implements the builder pattern to create and configure queue definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) alias: String,
    pub(crate) name: String,
    pub(crate) exclusive: bool,
}

impl QueueDefinition {
    /// Creates a definition for a queue the broker names on declaration.
    ///
    /// # Parameters
    /// * `alias` - The local name used by bindings and consumers
    pub fn server_named(alias: &str) -> QueueDefinition {
        QueueDefinition {
            alias: alias.to_owned(),
            name: String::new(),
            ..QueueDefinition::default()
        }
    }

    /// Makes the queue exclusive to the connection.
    ///
    /// Exclusive queues are deleted when the connection closes.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

/// Configuration for binding a queue to an exchange.
///
/// Queue bindings define how messages flow from exchanges to queues based on
/// routing keys and exchange types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding<'qeb> {
    pub(crate) queue_alias: &'qeb str,
    pub(crate) exchange_name: &'qeb str,
    pub(crate) routing_key: &'qeb str,
}

impl<'qeb> QueueBinding<'qeb> {
    /// Creates a new queue binding for the queue with the given alias.
    ///
    /// By default, the exchange name and routing key are empty strings.
    /// These should be set using the `exchange` and `routing_key` methods.
    pub fn new(queue_alias: &'qeb str) -> QueueBinding<'qeb> {
        QueueBinding {
            queue_alias,
            exchange_name: "",
            routing_key: "",
        }
    }

    /// Sets the exchange to bind the queue to.
    pub fn exchange(mut self, exchange: &'qeb str) -> Self {
        self.exchange_name = exchange;
        self
    }

    /// Sets the routing key (or topic pattern) for the binding.
    pub fn routing_key(mut self, key: &'qeb str) -> Self {
        self.routing_key = key;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_named_queue_keeps_alias() {
        let def = QueueDefinition::server_named("inbound");
        assert!(def.name.is_empty());
        assert_eq!(def.alias, "inbound");
        assert!(!def.exclusive);

        assert!(def.exclusive().exclusive);
    }

    #[test]
    fn binding_builder() {
        let binding = QueueBinding::new("inbound")
            .exchange("coolq.msg")
            .routing_key("#.private");
        assert_eq!(binding.queue_alias, "inbound");
        assert_eq!(binding.exchange_name, "coolq.msg");
        assert_eq!(binding.routing_key, "#.private");
    }
}
