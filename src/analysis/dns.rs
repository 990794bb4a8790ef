// File: analysis/dns.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use url::Url;

use super::ANALYSIS_FLAG_DNS_BLOCKING;
use crate::archival::{split_endpoint, DnsLookup};
use crate::bogon::is_bogon;
use crate::control::ControlResponse;
use crate::dnslookup::ENGINE_DOH;
use crate::failure::{is_ipv6_unreachable, DNS_NO_ANSWER};
use crate::http::url_hostname;
use crate::testkeys::TestKeys;

pub const ANALYSIS_DNS_BOGON: i64 = 1 << 0;
pub const ANALYSIS_DNS_UNEXPECTED_FAILURE: i64 = 1 << 1;
pub const ANALYSIS_DNS_UNEXPECTED_ADDRS: i64 = 1 << 2;

/// Failures that say nothing about the target: a missing IPv6 record, or a
/// broken DoH service.
fn is_ignored_failure(query: &DnsLookup) -> bool {
    let no_aaaa = query.query_type == "AAAA" && query.failure.as_deref() == Some(DNS_NO_ANSWER);
    no_aaaa || query.engine == ENGINE_DOH
}

pub fn analyze_dns(tk: &mut TestKeys, ctrl: Option<&ControlResponse>) {
    set_experiment_failure(tk);
    detect_bogons(tk);
    if let (Some(ctrl), Some(domain)) = (ctrl, control_domain(tk)) {
        if domain.parse::<IpAddr>().is_err() {
            detect_unexpected_failure(tk, ctrl, &domain);
            detect_unexpected_addrs(tk, ctrl, &domain);
        }
    }

    if tk.dns_flags != 0 {
        warn!("DNSConsistency: inconsistent (dns_flags={})", tk.dns_flags);
        tk.dns_consistency = Some("inconsistent".to_string());
        tk.blocking_flags |= ANALYSIS_FLAG_DNS_BLOCKING;
    } else {
        info!("DNSConsistency: consistent");
        tk.dns_consistency = Some("consistent".to_string());
    }
}

/// The domain the control was asked about.
fn control_domain(tk: &TestKeys) -> Option<String> {
    let request = tk.control_request.as_ref()?;
    let url = Url::parse(&request.http_request).ok()?;
    url_hostname(&url)
}

fn set_experiment_failure(tk: &mut TestKeys) {
    tk.dns_experiment_failure = tk
        .queries
        .iter()
        .find(|q| q.failure.is_some() && !is_ignored_failure(q))
        .and_then(|q| q.failure.clone());
}

fn detect_bogons(tk: &mut TestKeys) {
    for query in &tk.queries {
        for addr in query.addresses() {
            if is_bogon(addr) {
                warn!("DNS: BOGON {} in #{}", addr, query.transaction_id);
                tk.dns_flags |= ANALYSIS_DNS_BOGON;
            }
        }
    }
}

fn detect_unexpected_failure(tk: &mut TestKeys, ctrl: &ControlResponse, domain: &str) {
    if ctrl.dns.addrs.is_empty() {
        return;
    }
    for query in tk.queries.iter().filter(|q| q.hostname == domain) {
        if !query.addresses().is_empty() || is_ignored_failure(query) {
            continue;
        }
        if let Some(failure) = &query.failure {
            warn!(
                "DNS: unexpected failure {} in #{}",
                failure, query.transaction_id
            );
            tk.dns_flags |= ANALYSIS_DNS_UNEXPECTED_FAILURE;
        }
    }
}

fn detect_unexpected_addrs(tk: &mut TestKeys, ctrl: &ControlResponse, domain: &str) {
    let control_addrs: HashSet<IpAddr> = ctrl
        .dns
        .addrs
        .iter()
        .filter_map(|a| a.parse().ok())
        .collect();
    if control_addrs.is_empty() {
        return;
    }

    // address -> ASN as annotated at lookup time
    let mut measured_addrs: HashMap<IpAddr, u32> = HashMap::new();
    for query in tk.queries.iter().filter(|q| q.hostname == domain) {
        for answer in &query.answers {
            if let Some(addr) = answer.ip() {
                measured_addrs.entry(addr).or_insert(answer.asn);
            }
        }
    }
    if measured_addrs.is_empty() {
        warn!("DNS: no IP address resolved locally");
        tk.dns_flags |= ANALYSIS_DNS_UNEXPECTED_ADDRS;
        return;
    }

    let different: Vec<IpAddr> = measured_addrs
        .keys()
        .filter(|a| !control_addrs.contains(a))
        .copied()
        .collect();
    if different.is_empty() {
        return;
    }

    let legit = addrs_with_tls_proof(tk, domain);
    let without_proof: Vec<IpAddr> = different
        .iter()
        .filter(|a| !legit.contains(a))
        .copied()
        .collect();
    if without_proof.is_empty() {
        return;
    }

    // ASN 0 means "unknown" and never counts as an overlap
    let control_asns: HashSet<u32> = ctrl
        .dns
        .asns
        .iter()
        .copied()
        .filter(|asn| *asn != 0)
        .collect();
    let different_asns: HashSet<u32> = without_proof
        .iter()
        .filter_map(|a| measured_addrs.get(a).copied())
        .filter(|asn| *asn == 0 || !control_asns.contains(asn))
        .collect();
    if different_asns.is_empty() {
        return;
    }

    warn!(
        "DNSDiff: different addrs: {:?}; without TLS proof: {:?}; different ASNs: {:?}",
        different, without_proof, different_asns
    );
    tk.dns_flags |= ANALYSIS_DNS_UNEXPECTED_ADDRS;
}

/// Addresses proven legitimate by a successful handshake for `domain`.
/// IPv6 addresses we could not reach at all are not held against the
/// resolver either.
fn addrs_with_tls_proof(tk: &TestKeys, domain: &str) -> HashSet<IpAddr> {
    let mut legit: HashSet<IpAddr> = tk
        .tls_handshakes
        .iter()
        .filter(|h| h.failure.is_none() && h.server_name == domain)
        .filter_map(|h| split_endpoint(&h.address))
        .filter_map(|(ip, _)| ip.parse().ok())
        .collect();

    let mut attempts: HashMap<IpAddr, bool> = HashMap::new();
    for entry in &tk.tcp_connect {
        let Ok(addr) = entry.ip.parse::<IpAddr>() else {
            continue;
        };
        if !addr.is_ipv6() {
            continue;
        }
        let unreachable = entry
            .status
            .failure
            .as_deref()
            .map(is_ipv6_unreachable)
            .unwrap_or(false);
        let all_unreachable = attempts.entry(addr).or_insert(true);
        *all_unreachable &= unreachable;
    }
    legit.extend(
        attempts
            .into_iter()
            .filter(|(_, all_unreachable)| *all_unreachable)
            .map(|(addr, _)| addr),
    );
    legit
}
