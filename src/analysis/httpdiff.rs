// File: analysis/httpdiff.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! Compares the final response seen by the probe with the one the control
//! fetched. The thresholds are historical and shared with every other
//! client producing this measurement format; changing them changes the
//! classification of past and future results.

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use url::Url;

use super::{ANALYSIS_FLAG_HTTP_DIFF, ANALYSIS_FLAG_SUCCESS};
use crate::archival::HttpTransaction;
use crate::control::ControlHttpRequestResult;
use crate::testkeys::TestKeys;

const BODY_PROPORTION_FACTOR: f64 = 0.7;
const MIN_TITLE_WORD_LENGTH: usize = 5;

const COMMON_HEADERS: &[&str] = &[
    "date",
    "content-type",
    "server",
    "cache-control",
    "vary",
    "set-cookie",
    "location",
    "expires",
    "x-powered-by",
    "content-encoding",
    "last-modified",
    "accept-ranges",
    "pragma",
    "x-frame-options",
    "etag",
    "x-content-type-options",
    "age",
    "via",
    "p3p",
    "x-xss-protection",
    "content-language",
    "cf-ray",
    "strict-transport-security",
    "link",
    "x-varnish",
];

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<title>([^<]{1,512})</title>").expect("valid title regex"));

/// Extracts the content of the first `<title>` element.
pub fn web_get_title(body: &str) -> String {
    TITLE_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// The caller guarantees both transactions completed without failure.
pub fn analyze_http_diff(
    tk: &mut TestKeys,
    probe: &HttpTransaction,
    ctrl: &ControlHttpRequestResult,
) {
    let is_https = Url::parse(&probe.request.url)
        .map(|u| u.scheme() == "https")
        .unwrap_or(false);
    if is_https {
        info!(
            "HTTP: HTTPS && no error => #{} is successful",
            probe.transaction_id
        );
        tk.blocking_flags |= ANALYSIS_FLAG_SUCCESS;
        return;
    }

    if let Some((matches, proportion)) = body_length_check(probe, ctrl) {
        tk.body_length_match = Some(matches);
        tk.body_proportion = proportion;
    }
    tk.status_code_match = status_code_match(probe, ctrl);
    tk.headers_match = headers_match(probe, ctrl);
    tk.title_match = title_match(probe, ctrl);

    let status_ok = tk.status_code_match == Some(true);
    let any_feature = tk.body_length_match == Some(true)
        || tk.headers_match == Some(true)
        || tk.title_match == Some(true);
    if status_ok && any_feature {
        info!(
            "HTTP: status code and page features match => #{} is successful",
            probe.transaction_id
        );
        tk.blocking_flags |= ANALYSIS_FLAG_SUCCESS;
        return;
    }

    warn!("HTTP: it seems #{} is a case of http-diff", probe.transaction_id);
    tk.blocking_flags |= ANALYSIS_FLAG_HTTP_DIFF;
}

/// Returns the match and the smaller/larger length ratio, or `None` when
/// the lengths cannot be compared.
pub fn body_length_check(
    probe: &HttpTransaction,
    ctrl: &ControlHttpRequestResult,
) -> Option<(bool, f64)> {
    let control = ctrl.body_length;
    if control <= 0 {
        return None;
    }
    let response = &probe.response;
    if response.body_is_truncated {
        return None;
    }
    let measurement = response.body.len() as i64;
    if measurement <= 0 {
        return None;
    }
    let proportion = if measurement >= control {
        control as f64 / measurement as f64
    } else {
        measurement as f64 / control as f64
    };
    Some((proportion > BODY_PROPORTION_FACTOR, proportion))
}

pub fn status_code_match(probe: &HttpTransaction, ctrl: &ControlHttpRequestResult) -> Option<bool> {
    let control = ctrl.status_code;
    let measurement = probe.response.code;
    if control <= 0 || measurement <= 0 {
        return None;
    }
    let good = control == measurement;
    // a mismatch against a non-2xx control is likely a helper problem
    if !good && control / 100 != 2 {
        return None;
    }
    Some(good)
}

pub fn headers_match(probe: &HttpTransaction, ctrl: &ControlHttpRequestResult) -> Option<bool> {
    if probe.response.headers.is_empty() || ctrl.headers.is_empty() {
        return None;
    }
    let ours: BTreeSet<String> = probe
        .response
        .headers
        .keys()
        .map(|k| k.to_lowercase())
        .collect();
    let theirs: BTreeSet<String> = ctrl.headers.keys().map(|k| k.to_lowercase()).collect();
    if ours == theirs {
        return Some(true);
    }
    let uncommon = |key: &&String| !COMMON_HEADERS.contains(&key.as_str());
    let found = ours
        .iter()
        .filter(uncommon)
        .any(|key| theirs.contains(key));
    Some(found)
}

pub fn title_match(probe: &HttpTransaction, ctrl: &ControlHttpRequestResult) -> Option<bool> {
    let response = &probe.response;
    if response.code <= 0 || response.body_is_truncated || ctrl.status_code <= 0 {
        return None;
    }
    let measurement = web_get_title(&response.body.as_lossy_str());
    if ctrl.title.is_empty() || measurement.is_empty() {
        return None;
    }

    const IN_PROBE: u8 = 1 << 0;
    const IN_CONTROL: u8 = 1 << 1;
    let mut words: HashMap<String, u8> = HashMap::new();
    for word in measurement.split(' ').filter(|w| w.len() >= MIN_TITLE_WORD_LENGTH) {
        *words.entry(word.to_lowercase()).or_default() |= IN_PROBE;
    }
    for word in ctrl.title.split(' ').filter(|w| w.len() >= MIN_TITLE_WORD_LENGTH) {
        *words.entry(word.to_lowercase()).or_default() |= IN_CONTROL;
    }
    Some(words.values().all(|w| *w == IN_PROBE | IN_CONTROL))
}
