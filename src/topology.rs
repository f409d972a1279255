// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology Management
//!
//! This module provides functionality for declaring the exchanges, queues and
//! bindings the bridge depends on.
//!
//! The main components are:
//! - `Topology` trait: Interface for topology management
//! - `AmqpTopology`: Implementation of the Topology trait for RabbitMQ
//! - `DeclaredQueues`: The broker-assigned names of the declared queues, by alias

use crate::{
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
};
use async_trait::async_trait;
use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel,
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, error};

/// Trait defining the interface for topology management.
///
/// This trait provides methods for registering exchanges, queues, and bindings,
/// as well as installing the topology to the RabbitMQ server.
#[async_trait]
pub trait Topology<'tp> {
    /// Adds an exchange definition to the topology.
    fn exchange(self, def: &'tp ExchangeDefinition) -> Self;

    /// Adds a queue definition to the topology.
    fn queue(self, def: &'tp QueueDefinition) -> Self;

    /// Adds a queue-to-exchange binding to the topology.
    fn queue_binding(self, binding: &'tp QueueBinding) -> Self;

    /// Installs the topology to the RabbitMQ server.
    ///
    /// This creates all the exchanges and queues, and sets up all the bindings.
    async fn install(&self) -> Result<DeclaredQueues, AmqpError>;
}

/// Broker names of the declared queues, keyed by their local alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredQueues {
    names: HashMap<String, String>,
}

impl DeclaredQueues {
    pub(crate) fn insert(&mut self, alias: &str, name: &str) {
        self.names.insert(alias.to_owned(), name.to_owned());
    }

    /// Resolves an alias to the name the broker knows the queue by.
    pub fn name(&self, alias: &str) -> Result<&str, AmqpError> {
        self.names
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| AmqpError::UnknownQueue(alias.to_owned()))
    }
}

/// RabbitMQ implementation of the Topology trait.
///
/// This struct maintains collections of exchanges, queues, and bindings,
/// and provides methods to install them to a RabbitMQ server.
pub struct AmqpTopology<'tp> {
    channel: Arc<Channel>,
    pub(crate) queues: Vec<&'tp QueueDefinition>,
    pub(crate) queues_binding: Vec<&'tp QueueBinding<'tp>>,
    pub(crate) exchanges: Vec<&'tp ExchangeDefinition<'tp>>,
}

impl<'tp> AmqpTopology<'tp> {
    /// Creates a new AmqpTopology instance.
    ///
    /// # Parameters
    /// * `channel` - A channel to the RabbitMQ server
    pub fn new(channel: Arc<Channel>) -> AmqpTopology<'tp> {
        AmqpTopology {
            channel,
            queues: vec![],
            queues_binding: vec![],
            exchanges: vec![],
        }
    }
}

#[async_trait]
impl<'tp> Topology<'tp> for AmqpTopology<'tp> {
    fn exchange(mut self, def: &'tp ExchangeDefinition) -> Self {
        self.exchanges.push(def);
        self
    }

    fn queue(mut self, def: &'tp QueueDefinition) -> Self {
        self.queues.push(def);
        self
    }

    fn queue_binding(mut self, binding: &'tp QueueBinding) -> Self {
        self.queues_binding.push(binding);
        self
    }

    /// Installs the topology to the RabbitMQ server.
    ///
    /// This method performs the following operations in order:
    /// 1. Creates all exchanges
    /// 2. Creates all queues, recording the names the broker assigned
    /// 3. Sets up queue-to-exchange bindings
    ///
    /// # Returns
    /// The declared queue names on success or AmqpError on failure
    async fn install(&self) -> Result<DeclaredQueues, AmqpError> {
        self.install_exchange().await?;
        let declared = self.install_queue().await?;
        self.binding_queues(&declared).await?;
        Ok(declared)
    }
}

impl<'tp> AmqpTopology<'tp> {
    async fn install_exchange(&self) -> Result<(), AmqpError> {
        for exch in &self.exchanges {
            debug!("creating exchange: {}", exch.name);

            match self
                .channel
                .exchange_declare(
                    exch.name,
                    exch.kind.into(),
                    ExchangeDeclareOptions::default(),
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = exch.name,
                        "error to declare the exchange"
                    );
                    Err(AmqpError::DeclareExchangeError(exch.name.to_owned()))
                }
                _ => Ok(()),
            }?;

            debug!("exchange: {} was created", exch.name);
        }

        Ok(())
    }

    async fn install_queue(&self) -> Result<DeclaredQueues, AmqpError> {
        let mut declared = DeclaredQueues::default();

        for def in &self.queues {
            debug!("creating queue: {}", def.alias);

            let queue = match self
                .channel
                .queue_declare(
                    &def.name,
                    QueueDeclareOptions {
                        exclusive: def.exclusive,
                        ..QueueDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        alias = def.alias,
                        "error to declare the queue"
                    );
                    Err(AmqpError::DeclareQueueError(def.alias.clone()))
                }
                Ok(queue) => Ok(queue),
            }?;

            debug!("queue: {} was created as {}", def.alias, queue.name());
            declared.insert(&def.alias, queue.name().as_str());
        }

        Ok(declared)
    }

    async fn binding_queues(&self, declared: &DeclaredQueues) -> Result<(), AmqpError> {
        for binding in &self.queues_binding {
            let queue_name = declared.name(binding.queue_alias)?;

            debug!(
                "binding queue: {} to the exchange: {} with the key: {}",
                queue_name, binding.exchange_name, binding.routing_key
            );

            match self
                .channel
                .queue_bind(
                    queue_name,
                    binding.exchange_name,
                    binding.routing_key,
                    QueueBindOptions { nowait: false },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), "error to bind queue to exchange");

                    Err(AmqpError::BindingExchangeToQueueError(
                        binding.exchange_name.to_owned(),
                        queue_name.to_owned(),
                    ))
                }
                _ => Ok(()),
            }?;
        }

        debug!("queues were bound");

        Ok(())
    }
}
