// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation of the single AMQP connection and channel
//! the bridge runs on, and the prefetch configuration of that channel.

use crate::{config::Configs, errors::AmqpError};
use lapin::{
    options::BasicQosOptions, types::LongString, Channel, Connection, ConnectionProperties,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Creates a new AMQP channel for communication with RabbitMQ.
///
/// This function establishes a connection to RabbitMQ using the broker parameters
/// in `cfg`, then creates a channel on that connection. Both are wrapped in Arc so
/// the connection can be closed on shutdown while the channel is in use.
///
/// # Parameters
/// * `cfg` - Configuration containing RabbitMQ connection details like host, port, credentials, etc.
///
/// # Returns
/// * `Result<(Arc<Connection>, Arc<Channel>), AmqpError>` -
///   A tuple containing the connection and channel on success, or an error on failure.
pub async fn new_amqp_channel(cfg: &Configs) -> Result<(Arc<Connection>, Arc<Channel>), AmqpError> {
    info!(
        user = cfg.rabbitmq.user,
        host = cfg.rabbitmq.host,
        port = cfg.rabbitmq.port,
        vhost = cfg.rabbitmq.vhost,
        "connecting to broker"
    );
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app.name.clone()));

    let conn = match Connection::connect_uri(cfg.rabbitmq.amqp_uri(), options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError {})
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((Arc::new(conn), Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError {})
        }
    }
}

/// Limits the number of unacknowledged deliveries the broker pushes to this channel.
pub async fn configure_qos(channel: &Channel, prefetch: u16) -> Result<(), AmqpError> {
    match channel
        .basic_qos(prefetch, BasicQosOptions { global: false })
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), prefetch, "failure to configure qos");
            Err(AmqpError::QoSDeclarationError(err.to_string()))
        }
        _ => {
            debug!(prefetch, "qos configured");
            Ok(())
        }
    }
}
