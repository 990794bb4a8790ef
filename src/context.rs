// File: context.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ConfigParameter;
use crate::dnscache::DnsCache;
use crate::geoip::AsnLookup;
use crate::redirects::RedirectCounter;
use crate::taskgroup::TaskGroup;
use crate::testkeys::TestKeysStore;
use crate::trace::{IdGenerator, Trace};

/// State shared by every task of one measurement. Cloning is cheap.
#[derive(Clone)]
pub struct MeasurementContext {
    pub config: Arc<ConfigParameter>,
    pub ids: Arc<IdGenerator>,
    pub tk: TestKeysStore,
    pub tasks: TaskGroup,
    pub zero_time: Instant,
    pub dns_cache: Arc<DnsCache>,
    pub redirects: Arc<RedirectCounter>,
    pub cookies: Arc<Jar>,
    pub asn: Arc<dyn AsnLookup>,
    pub tls_config: Arc<rustls::ClientConfig>,
    pub doh_client: reqwest::Client,
}

impl MeasurementContext {
    pub fn new_trace(&self, depth: usize) -> Trace {
        Trace::new(
            self.ids.next_id(),
            self.zero_time,
            vec![format!("depth={}", depth)],
        )
    }
}
