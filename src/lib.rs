// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod consumer;
mod otel;

pub mod app;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod errors;
pub mod exchange;
pub mod message;
pub mod messaging;
pub mod publisher;
pub mod queue;
pub mod topology;
