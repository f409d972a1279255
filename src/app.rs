// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Bridge Application
//!
//! Wires the bridge together: connection, QoS, topology, publisher, handlers and
//! the dispatcher that runs them.

use crate::{
    bridge::{InboundHandler, MessageBridge, ReplyHandler},
    channel::{configure_qos, new_amqp_channel},
    config::{BridgeSettings, Configs},
    dispatcher::RabbitMQDispatcher,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    messaging::{ConsumerHandler, Publisher},
    publisher::RabbitMQPublisher,
    queue::{QueueBinding, QueueDefinition},
    topology::{AmqpTopology, DeclaredQueues, Topology},
};
use lapin::{Channel, Connection};
use std::sync::Arc;
use tracing::{error, info};

/// Alias of the queue bound to the message exchange.
pub const INBOUND_QUEUE: &str = "inbound";
/// Alias of the queue rpc responses are delivered to.
pub const REPLY_QUEUE: &str = "replies";

/// Exchanges, queues and bindings the bridge needs for its mode.
///
/// Both exchanges are always declared. An exclusive server-named queue is bound
/// to the message exchange; in rpc mode a second exclusive server-named queue is
/// declared, unbound, to receive replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyPlan<'c> {
    pub(crate) exchanges: Vec<ExchangeDefinition<'c>>,
    pub(crate) queues: Vec<QueueDefinition>,
    pub(crate) bindings: Vec<QueueBinding<'c>>,
}

impl<'c> TopologyPlan<'c> {
    pub fn new(settings: &'c BridgeSettings) -> TopologyPlan<'c> {
        let exchanges = vec![
            ExchangeDefinition::new(&settings.msg_exchange).topic(),
            ExchangeDefinition::new(&settings.rpc_exchange).direct(),
        ];

        let mut queues = vec![QueueDefinition::server_named(INBOUND_QUEUE).exclusive()];
        if settings.rpc {
            queues.push(QueueDefinition::server_named(REPLY_QUEUE).exclusive());
        }

        let bindings = vec![QueueBinding::new(INBOUND_QUEUE)
            .exchange(&settings.msg_exchange)
            .routing_key(&settings.binding_key)];

        TopologyPlan {
            exchanges,
            queues,
            bindings,
        }
    }

    fn topology(&self, channel: Arc<Channel>) -> AmqpTopology<'_> {
        let mut topology = AmqpTopology::new(channel);
        for def in &self.exchanges {
            topology = topology.exchange(def);
        }
        for def in &self.queues {
            topology = topology.queue(def);
        }
        for binding in &self.bindings {
            topology = topology.queue_binding(binding);
        }
        topology
    }
}

/// Builds the bridge over `publisher`; in rpc mode it asks for replies on the
/// declared reply queue.
fn new_bridge(
    settings: &BridgeSettings,
    publisher: Arc<dyn Publisher>,
    queues: &DeclaredQueues,
) -> Result<MessageBridge, AmqpError> {
    let bridge = MessageBridge::new(publisher, &settings.rpc_exchange);
    if settings.rpc {
        return Ok(bridge.with_reply_queue(queues.name(REPLY_QUEUE)?));
    }
    Ok(bridge)
}

/// Handler of every consumed queue, by alias.
fn handlers(
    settings: &BridgeSettings,
    bridge: &Arc<MessageBridge>,
) -> Vec<(&'static str, Arc<dyn ConsumerHandler>)> {
    let inbound: Arc<dyn ConsumerHandler> = InboundHandler::new(bridge.clone());
    let mut handlers = vec![(INBOUND_QUEUE, inbound)];

    if settings.rpc {
        let replies: Arc<dyn ConsumerHandler> = ReplyHandler::new(bridge.clone());
        handlers.push((REPLY_QUEUE, replies));
    }

    handlers
}

pub struct App {
    connection: Arc<Connection>,
    dispatcher: RabbitMQDispatcher,
}

impl App {
    /// Connects to the broker and declares the bridge topology.
    ///
    /// A type mismatch with an existing exchange is fatal. See `TopologyPlan` for
    /// what is declared in each mode.
    pub async fn setup(cfg: &Configs) -> Result<App, AmqpError> {
        let (connection, channel) = new_amqp_channel(cfg).await?;
        configure_qos(&channel, cfg.bridge.prefetch).await?;

        let plan = TopologyPlan::new(&cfg.bridge);
        let queues = plan.topology(channel.clone()).install().await?;

        let publisher = RabbitMQPublisher::new(channel.clone());
        let bridge = Arc::new(new_bridge(&cfg.bridge, publisher, &queues)?);

        info!(
            msg_exchange = cfg.bridge.msg_exchange,
            rpc_exchange = cfg.bridge.rpc_exchange,
            binding_key = cfg.bridge.binding_key,
            reply_queue = bridge.reply_queue().unwrap_or("-"),
            "bridge ready"
        );

        let dispatcher = handlers(&cfg.bridge, &bridge)
            .into_iter()
            .fold(RabbitMQDispatcher::new(channel, queues), |dispatcher, (alias, handler)| {
                dispatcher.register(alias, handler)
            });

        Ok(App {
            connection,
            dispatcher,
        })
    }

    /// Runs the receive loop. Returns only when the connection is lost.
    pub async fn run(&self) -> Result<(), AmqpError> {
        info!("start consuming");
        self.dispatcher.consume_blocking().await
    }

    /// Closes the connection; exclusive queues go away with it.
    pub async fn shutdown(&self) {
        match self.connection.close(200, "shutdown").await {
            Ok(()) => info!("connection closed"),
            Err(err) => error!(error = err.to_string(), "failure to close the connection"),
        }
    }
}
