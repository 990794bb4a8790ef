// File: dnsresolvers.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use url::Url;

use crate::cleartextflow::CleartextFlow;
use crate::context::MeasurementContext;
use crate::dnscache::{merge_addresses, DnsEntry};
use crate::dnslookup::{lookup_doh, lookup_system, lookup_udp, LookupOutcome};
use crate::flow::{flow_failure, FlowParams};
use crate::http::url_hostname;
use crate::priority::PrioritySelector;
use crate::secureflow::SecureFlow;

/// Resolves the hostname of `url` and starts one flow per address.
pub struct DnsResolvers {
    ctx: MeasurementContext,
    url: Url,
    referer: Option<String>,
    depth: usize,
}

impl DnsResolvers {
    pub fn new(ctx: MeasurementContext, url: Url, referer: Option<String>, depth: usize) -> Self {
        Self {
            ctx,
            url,
            referer,
            depth,
        }
    }

    pub fn start(self) {
        let tasks = self.ctx.tasks.clone();
        tasks.spawn(self.run());
    }

    fn run(self) -> BoxFuture<'static, ()> {
        async move {
            let Some(domain) = url_hostname(&self.url) else {
                flow_failure(
                    &self.ctx,
                    self.referer.as_deref(),
                    format!("no hostname in {}", self.url),
                );
                return;
            };
            let entries = self.lookup(&domain).await;
            if entries.is_empty() {
                info!("no addresses for {}", domain);
                return;
            }
            self.start_flows(&entries);
        }
        .boxed()
    }

    /// Runs the lookups, records them and merges the addresses. A cached
    /// domain is not looked up again.
    pub async fn lookup(&self, domain: &str) -> Vec<DnsEntry> {
        if let Some(entries) = self.ctx.dns_cache.get(domain) {
            debug!("dns cache hit for {}: {} addrs", domain, entries.len());
            return entries;
        }

        let config = &self.ctx.config;
        let asn = self.ctx.asn.as_ref();
        let system_trace = self.ctx.new_trace(self.depth);
        let system = lookup_system(domain, &system_trace, asn, config.dns_timeout());

        let (system, udp, doh) = if domain.parse::<IpAddr>().is_ok() {
            (system.await, LookupOutcome::default(), LookupOutcome::default())
        } else {
            let udp_trace = self.ctx.new_trace(self.depth);
            let doh_trace = self.ctx.new_trace(self.depth);
            tokio::join!(
                system,
                lookup_udp(domain, config.udp_resolver(), &udp_trace, asn, config.dns_timeout()),
                lookup_doh(
                    domain,
                    config.doh_url(),
                    &self.ctx.doh_client,
                    &doh_trace,
                    asn,
                    config.dns_timeout()
                ),
            )
        };

        let entries = merge_addresses(&system.addrs, &udp.addrs, &doh.addrs);
        let mut queries = system.queries;
        queries.extend(udp.queries);
        queries.extend(doh.queries);
        self.ctx.tk.append_queries(queries);

        self.ctx.dns_cache.set(domain, entries.clone());
        entries
    }

    fn flow_params(
        &self,
        address: SocketAddr,
        priority: Option<Arc<PrioritySelector>>,
        follow_redirects: bool,
    ) -> FlowParams {
        FlowParams {
            address,
            url: self.url.clone(),
            referer: self.referer.clone(),
            follow_redirects,
            priority,
            depth: self.depth,
        }
    }

    fn start_flows(&self, entries: &[DnsEntry]) {
        let ps = Arc::new(PrioritySelector::new(
            entries,
            self.ctx.zero_time,
            self.ctx.tk.clone(),
        ));
        let is_https = self.url.scheme() == "https";

        if !is_https {
            let port = self.url.port_or_known_default().unwrap_or(80);
            for entry in entries {
                let params = self.flow_params(
                    SocketAddr::new(entry.addr, port),
                    Some(Arc::clone(&ps)),
                    true,
                );
                CleartextFlow::new(self.ctx.clone(), params).start();
            }
        }

        // TLS is attempted for every address, also for http URLs, to
        // validate the addresses
        let port = if is_https {
            self.url.port_or_known_default().unwrap_or(443)
        } else {
            443
        };
        for entry in entries {
            let priority = if is_https { Some(Arc::clone(&ps)) } else { None };
            let params = self.flow_params(SocketAddr::new(entry.addr, port), priority, is_https);
            SecureFlow::new(self.ctx.clone(), params).start();
        }
    }
}
