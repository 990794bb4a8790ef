// File: trace.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::{debug, info, warn};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use crate::archival::NetworkEvent;

#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns 1 on the first call.
    pub fn next_id(&self) -> i64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Per-operation trace: carries the transaction id and converts instants
/// into seconds relative to the measurement zero time.
#[derive(Debug, Clone)]
pub struct Trace {
    index: i64,
    zero_time: Instant,
    tags: Vec<String>,
}

impl Trace {
    pub fn new(index: i64, zero_time: Instant, tags: Vec<String>) -> Self {
        Self {
            index,
            zero_time,
            tags,
        }
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    pub fn since_zero(&self, instant: Instant) -> f64 {
        instant.saturating_duration_since(self.zero_time).as_secs_f64()
    }

    pub fn now(&self) -> f64 {
        self.since_zero(Instant::now())
    }

    pub fn network_event(
        &self,
        operation: &str,
        address: Option<&str>,
        failure: Option<String>,
        started: Instant,
    ) -> NetworkEvent {
        NetworkEvent {
            address: address.map(str::to_string),
            failure,
            num_bytes: 0,
            operation: operation.to_string(),
            proto: Some("tcp".to_string()),
            t0: self.since_zero(started),
            t: self.now(),
            transaction_id: self.index,
            tags: self.tags.clone(),
        }
    }
}

/// Logs `[#id] <what>` when created and the outcome when stopped.
pub struct OperationLogger {
    index: i64,
    what: String,
    started: Instant,
}

impl OperationLogger {
    pub fn new(index: i64, what: impl Into<String>) -> Self {
        let what = what.into();
        info!("[#{}] {}", index, what);
        Self {
            index,
            what,
            started: Instant::now(),
        }
    }

    pub fn stop(self, failure: Option<&str>) {
        let elapsed = self.started.elapsed();
        match failure {
            None => debug!("[#{}] {}... ok in {:?}", self.index, self.what, elapsed),
            Some(f) => warn!("[#{}] {}... {} in {:?}", self.index, self.what, f, elapsed),
        }
    }
}
