// File: testkeys.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::archival::{
    ConnPriorityLogEntry, DnsLookup, HttpTransaction, NetworkEvent, TcpConnect, TlsHandshake,
};
use crate::control::{ControlRequest, ControlResponse};

/// The `blocking` verdict: `false`, a reason string, or `null` when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Blocking {
    #[default]
    Unknown,
    NotBlocked,
    Reason(String),
}

impl Blocking {
    pub fn reason(reason: &str) -> Self {
        Self::Reason(reason.to_string())
    }
}

impl Serialize for Blocking {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unknown => serializer.serialize_none(),
            Self::NotBlocked => serializer.serialize_bool(false),
            Self::Reason(reason) => serializer.serialize_str(reason),
        }
    }
}

impl<'de> Deserialize<'de> for Blocking {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Reason(String),
        }
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(Self::Unknown),
            Some(Repr::Flag(false)) => Ok(Self::NotBlocked),
            Some(Repr::Flag(true)) => Err(serde::de::Error::custom(
                "blocking must be false, a string, or null",
            )),
            Some(Repr::Reason(reason)) => Ok(Self::Reason(reason)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestKeys {
    pub agent: String,
    pub client_resolver: Option<String>,
    pub retries: Option<i64>,
    pub socksproxy: Option<String>,
    pub network_events: Vec<NetworkEvent>,
    pub tls_handshakes: Vec<TlsHandshake>,
    pub queries: Vec<DnsLookup>,
    pub dns_experiment_failure: Option<String>,
    pub dns_consistency: Option<String>,
    #[serde(rename = "x_dns_flags")]
    pub dns_flags: i64,
    pub tcp_connect: Vec<TcpConnect>,
    pub control_failure: Option<String>,
    pub control_request: Option<ControlRequest>,
    pub control: Option<ControlResponse>,
    #[serde(rename = "x_conn_priority_log")]
    pub conn_priority_log: Vec<ConnPriorityLogEntry>,
    pub http_experiment_failure: Option<String>,
    /// Most recent request first.
    pub requests: Vec<HttpTransaction>,
    #[serde(rename = "x_status")]
    pub status: i64,
    #[serde(rename = "x_blocking_flags")]
    pub blocking_flags: i64,
    #[serde(rename = "x_null_null_flags")]
    pub null_null_flags: i64,
    pub body_proportion: f64,
    pub body_length_match: Option<bool>,
    pub headers_match: Option<bool>,
    pub status_code_match: Option<bool>,
    pub title_match: Option<bool>,
    pub blocking: Blocking,
    pub accessible: Option<bool>,
    #[serde(skip)]
    pub fundamental_failure: Option<String>,
}

impl TestKeys {
    pub fn new() -> Self {
        Self {
            agent: "redirect".to_string(),
            client_resolver: None,
            retries: None,
            socksproxy: None,
            network_events: Vec::new(),
            tls_handshakes: Vec::new(),
            queries: Vec::new(),
            dns_experiment_failure: None,
            dns_consistency: None,
            dns_flags: 0,
            tcp_connect: Vec::new(),
            control_failure: None,
            control_request: None,
            control: None,
            conn_priority_log: Vec::new(),
            http_experiment_failure: None,
            requests: Vec::new(),
            status: 0,
            blocking_flags: 0,
            null_null_flags: 0,
            body_proportion: 0.0,
            body_length_match: None,
            headers_match: None,
            status_code_match: None,
            title_match: None,
            blocking: Blocking::Unknown,
            accessible: None,
            fundamental_failure: None,
        }
    }
}

impl Default for TestKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared accumulator handed to every task of a measurement.
#[derive(Debug, Clone, Default)]
pub struct TestKeysStore {
    inner: Arc<Mutex<TestKeys>>,
}

impl TestKeysStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TestKeys> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append_queries(&self, queries: Vec<DnsLookup>) {
        self.lock().queries.extend(queries);
    }

    pub fn append_tcp_connect(&self, entry: TcpConnect) {
        self.lock().tcp_connect.push(entry);
    }

    pub fn append_tls_handshake(&self, entry: TlsHandshake) {
        self.lock().tls_handshakes.push(entry);
    }

    /// Requests are stored newest first.
    pub fn append_request(&self, entry: HttpTransaction) {
        self.lock().requests.insert(0, entry);
    }

    pub fn append_network_events(&self, events: Vec<NetworkEvent>) {
        self.lock().network_events.extend(events);
    }

    pub fn append_conn_priority_log(&self, entry: ConnPriorityLogEntry) {
        self.lock().conn_priority_log.push(entry);
    }

    /// Only the first fundamental failure is kept.
    pub fn set_fundamental_failure(&self, failure: impl Into<String>) {
        let mut tk = self.lock();
        if tk.fundamental_failure.is_none() {
            tk.fundamental_failure = Some(failure.into());
        }
    }

    pub fn fundamental_failure(&self) -> Option<String> {
        self.lock().fundamental_failure.clone()
    }

    pub fn snapshot(&self) -> TestKeys {
        self.lock().clone()
    }

    /// Takes the accumulated keys once every task has joined.
    pub fn take(&self) -> TestKeys {
        std::mem::take(&mut *self.lock())
    }
}

#[cfg(test)]
#[path = "testkeys_tests.rs"]
mod tests;
