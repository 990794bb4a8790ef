// File: measurer.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use async_trait::async_trait;
use log::{info, warn};
use reqwest::cookie::Jar;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::analysis;
use crate::config::ConfigParameter;
use crate::context::MeasurementContext;
use crate::control::{ControlClient, ControlRequest};
use crate::dnscache::DnsCache;
use crate::dnsresolvers::DnsResolvers;
use crate::errors::{ProbeError, ProbeResult};
use crate::geoip::AsnLookup;
use crate::http::url_hostname;
use crate::redirects::RedirectCounter;
use crate::taskgroup::TaskGroup;
use crate::testkeys::{TestKeys, TestKeysStore};
use crate::tls;
use crate::trace::IdGenerator;

pub const EXPERIMENT_NAME: &str = "web_connectivity";
pub const EXPERIMENT_VERSION: &str = "0.5.28";

/// Progress notifications, `percentage` in `0.0..=1.0`.
pub trait Callbacks: Send + Sync {
    fn on_progress(&self, percentage: f64, message: &str);
}

/// Forwards progress to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCallbacks;

impl Callbacks for LogCallbacks {
    fn on_progress(&self, percentage: f64, message: &str) {
        info!("[{:>5.1}%] {}", percentage * 100.0, message);
    }
}

#[async_trait]
pub trait ExperimentMeasurer: Send + Sync {
    fn name(&self) -> &'static str;
    fn version(&self) -> &'static str;
    async fn run(
        &self,
        input: &str,
        callbacks: &dyn Callbacks,
        cancel: CancellationToken,
    ) -> ProbeResult<TestKeys>;
}

/// Accepts absolute `http` and `https` URLs with a host.
pub fn parse_input(input: &str) -> ProbeResult<Url> {
    let url = Url::parse(input.trim())
        .map_err(|e| ProbeError::InvalidInput(format!("cannot parse {:?}: {}", input, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ProbeError::InvalidInput(format!(
            "unsupported scheme {:?} in {}",
            url.scheme(),
            input
        )));
    }
    if url_hostname(&url).map(|h| h.is_empty()).unwrap_or(true) {
        return Err(ProbeError::InvalidInput(format!("no host in {}", input)));
    }
    Ok(url)
}

pub struct Measurer {
    config: Arc<ConfigParameter>,
    asn: Arc<dyn AsnLookup>,
}

impl Measurer {
    pub fn new(config: ConfigParameter, asn: Arc<dyn AsnLookup>) -> Self {
        Self {
            config: Arc::new(config),
            asn,
        }
    }

    pub fn config(&self) -> &ConfigParameter {
        &self.config
    }

    fn context(&self, cancel: CancellationToken) -> ProbeResult<MeasurementContext> {
        let doh_client = reqwest::Client::builder()
            .timeout(self.config.dns_timeout())
            .user_agent(self.config.user_agent())
            .build()?;
        Ok(MeasurementContext {
            config: Arc::clone(&self.config),
            ids: Arc::new(IdGenerator::new()),
            tk: TestKeysStore::new(),
            tasks: TaskGroup::new(cancel),
            zero_time: Instant::now(),
            dns_cache: Arc::new(DnsCache::new()),
            redirects: Arc::new(RedirectCounter::new(self.config.max_redirects())),
            cookies: Arc::new(Jar::default()),
            asn: Arc::clone(&self.asn),
            tls_config: tls::client_config(self.config.alpn()),
            doh_client,
        })
    }

    /// Asks the test helpers about the input URL using the addresses the
    /// probe resolved for its domain. A failure is recorded, not returned.
    async fn measure_control(&self, url: &Url, ctx: &MeasurementContext, tk: &mut TestKeys) {
        let addrs: Vec<IpAddr> = url_hostname(url)
            .and_then(|domain| ctx.dns_cache.get(&domain))
            .unwrap_or_default()
            .iter()
            .map(|entry| entry.addr)
            .collect();
        let request = ControlRequest::new(url, &self.config, &addrs);

        let result = match ControlClient::new(&self.config, Arc::clone(&self.asn)) {
            Ok(client) => client.measure(&request).await,
            Err(e) => Err(e),
        };
        tk.control_request = Some(request);
        match result {
            Ok(response) => tk.control = Some(response),
            Err(e) => {
                warn!("control: {}", e);
                tk.control_failure = Some(match e {
                    ProbeError::Control(msg) => msg,
                    other => format!("generic_control_failure: {}", other),
                });
            }
        }
    }
}

#[async_trait]
impl ExperimentMeasurer for Measurer {
    fn name(&self) -> &'static str {
        EXPERIMENT_NAME
    }

    fn version(&self) -> &'static str {
        EXPERIMENT_VERSION
    }

    async fn run(
        &self,
        input: &str,
        callbacks: &dyn Callbacks,
        cancel: CancellationToken,
    ) -> ProbeResult<TestKeys> {
        callbacks.on_progress(0.0, &format!("processing input: {}", input));
        let url = parse_input(input)?;

        let ctx = self.context(cancel.clone())?;
        DnsResolvers::new(ctx.clone(), url.clone(), None, 0).start();
        callbacks.on_progress(0.1, "measuring");
        ctx.tasks.join_all().await;
        if cancel.is_cancelled() {
            return Err(ProbeError::Interrupted);
        }

        let mut tk = ctx.tk.take();
        if let Some(failure) = tk.fundamental_failure.take() {
            return Err(ProbeError::Fundamental(failure));
        }

        if self.config.test_helpers().is_empty() {
            info!("control: no test helper configured, skipping");
        } else {
            callbacks.on_progress(0.5, "contacting the test helper");
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProbeError::Interrupted),
                _ = self.measure_control(&url, &ctx, &mut tk) => {}
            }
        }

        callbacks.on_progress(0.9, "analyzing the results");
        analysis::analyze(&mut tk);
        callbacks.on_progress(1.0, "done");
        Ok(tk)
    }
}
