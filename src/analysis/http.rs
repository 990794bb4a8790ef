// File: analysis/http.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::{info, warn};

use super::{httpdiff, ANALYSIS_FLAG_HTTP_BLOCKING, ANALYSIS_FLAG_TLS_BLOCKING};
use crate::control::ControlResponse;
use crate::failure::{
    CONNECTION_RESET, EOF_ERROR, GENERIC_TIMEOUT_ERROR, SSL_INVALID_CERTIFICATE,
    SSL_INVALID_HOSTNAME, SSL_UNKNOWN_AUTHORITY,
};
use crate::testkeys::TestKeys;

const WELL_KNOWN_TLS_FAILURES: &[&str] = &[
    CONNECTION_RESET,
    GENERIC_TIMEOUT_ERROR,
    EOF_ERROR,
    SSL_INVALID_HOSTNAME,
    SSL_INVALID_CERTIFICATE,
    SSL_UNKNOWN_AUTHORITY,
];

const WELL_KNOWN_HTTP_FAILURES: &[&str] = &[CONNECTION_RESET, GENERIC_TIMEOUT_ERROR, EOF_ERROR];

fn is_well_known(list: &[&str], failure: Option<&str>) -> bool {
    failure.map(|f| list.contains(&f)).unwrap_or(false)
}

/// Classifies the final HTTP transaction. The most recent request is the
/// first entry of `requests`.
pub fn analyze_http(tk: &mut TestKeys, ctrl: Option<&ControlResponse>) {
    tk.http_experiment_failure = tk.requests.first().and_then(|r| r.failure.clone());

    let Some(ctrl) = ctrl else {
        return;
    };

    if let Some(entry) = tk
        .tls_handshakes
        .iter()
        .find(|h| is_well_known(WELL_KNOWN_TLS_FAILURES, h.failure.as_deref()))
    {
        warn!(
            "TLS: {} with {} (see #{})",
            entry.address,
            entry.failure.as_deref().unwrap_or_default(),
            entry.transaction_id
        );
        tk.blocking_flags |= ANALYSIS_FLAG_TLS_BLOCKING;
        return;
    }

    let Some(probe) = tk.requests.first().cloned() else {
        info!("HTTP: no request to analyze");
        return;
    };
    if let Some(failure) = &probe.failure {
        if is_well_known(WELL_KNOWN_HTTP_FAILURES, Some(failure)) {
            warn!("HTTP: #{} failed with {}", probe.transaction_id, failure);
            tk.blocking_flags |= ANALYSIS_FLAG_HTTP_BLOCKING;
        }
        return;
    }

    if ctrl.http_request.failure.is_some() {
        info!("HTTP: the control could not fetch the page");
        return;
    }
    httpdiff::analyze_http_diff(tk, &probe, &ctrl.http_request);
}
