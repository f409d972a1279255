// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Request / Reply Correlation
//!
//! Commands published in rpc mode carry a fresh correlation id and the name of the
//! bridge's reply queue. Issued ids are remembered in a bounded ledger so replies
//! can be reported as matched or unmatched. The ledger is diagnostic only: a reply
//! is surfaced whether or not its id is known.

use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
};
use uuid::Uuid;

/// Number of outstanding correlation ids kept before the oldest is forgotten.
pub const DEFAULT_PENDING_CAPACITY: usize = 1024;

/// Token and reply destination attached to one outbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    pub correlation_id: String,
    pub reply_to: String,
}

impl CorrelationContext {
    pub fn new(reply_to: &str) -> Self {
        CorrelationContext {
            correlation_id: Uuid::new_v4().to_string(),
            reply_to: reply_to.to_owned(),
        }
    }
}

/// Result of looking up a reply's correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMatch {
    Matched,
    Unknown,
    Missing,
}

#[derive(Debug, Default)]
struct Ledger {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

/// Bounded set of correlation ids awaiting a reply.
#[derive(Debug)]
pub struct PendingReplies {
    capacity: usize,
    inner: Mutex<Ledger>,
}

impl Default for PendingReplies {
    fn default() -> Self {
        PendingReplies::with_capacity(DEFAULT_PENDING_CAPACITY)
    }
}

impl PendingReplies {
    pub fn with_capacity(capacity: usize) -> Self {
        PendingReplies {
            capacity: capacity.max(1),
            inner: Mutex::new(Ledger::default()),
        }
    }

    /// Records an issued id, evicting the oldest one when full.
    pub fn insert(&self, correlation_id: &str) {
        let mut ledger = self.lock();

        if !ledger.ids.insert(correlation_id.to_owned()) {
            return;
        }
        ledger.order.push_back(correlation_id.to_owned());

        while ledger.order.len() > self.capacity {
            if let Some(oldest) = ledger.order.pop_front() {
                ledger.ids.remove(&oldest);
            }
        }
    }

    /// Consumes the id if it is outstanding.
    pub fn complete(&self, correlation_id: Option<&str>) -> ReplyMatch {
        let Some(correlation_id) = correlation_id else {
            return ReplyMatch::Missing;
        };

        let mut ledger = self.lock();
        if ledger.ids.remove(correlation_id) {
            ledger.order.retain(|id| id != correlation_id);
            ReplyMatch::Matched
        } else {
            ReplyMatch::Unknown
        }
    }

    /// Number of ids still awaiting a reply.
    pub(crate) fn len(&self) -> usize {
        self.lock().ids.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ledger> {
        // poisoned at worst leaves a stale id behind
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
