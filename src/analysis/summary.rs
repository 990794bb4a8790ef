// File: analysis/summary.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! The legacy `x_status` bitmask, derived from the final verdict.

use super::ANALYSIS_FLAG_TLS_BLOCKING;
use crate::failure::{CONNECTION_REFUSED, CONNECTION_RESET, DNS_NXDOMAIN_ERROR, EOF_ERROR};
use crate::testkeys::{Blocking, TestKeys};

pub const STATUS_SUCCESS_SECURE: i64 = 1 << 0;
pub const STATUS_SUCCESS_CLEARTEXT: i64 = 1 << 1;
pub const STATUS_SUCCESS_NXDOMAIN: i64 = 1 << 2;
pub const STATUS_ANOMALY_CONTROL_UNREACHABLE: i64 = 1 << 3;
pub const STATUS_ANOMALY_CONTROL_FAILURE: i64 = 1 << 4;
pub const STATUS_ANOMALY_DNS: i64 = 1 << 5;
pub const STATUS_ANOMALY_HTTP_DIFF: i64 = 1 << 6;
pub const STATUS_ANOMALY_CONNECT: i64 = 1 << 7;
pub const STATUS_ANOMALY_READ_WRITE: i64 = 1 << 8;
pub const STATUS_ANOMALY_UNKNOWN: i64 = 1 << 9;
pub const STATUS_ANOMALY_TLS_HANDSHAKE: i64 = 1 << 10;

fn final_request_is_secure(tk: &TestKeys) -> bool {
    tk.requests
        .first()
        .map(|r| r.failure.is_none() && r.request.url.starts_with("https://"))
        .unwrap_or(false)
}

pub fn status(tk: &TestKeys) -> i64 {
    let mut status = 0;
    if tk.control_failure.is_some() {
        status |= STATUS_ANOMALY_CONTROL_UNREACHABLE;
    } else if tk
        .control
        .as_ref()
        .map(|c| c.http_request.failure.is_some())
        .unwrap_or(false)
    {
        status |= STATUS_ANOMALY_CONTROL_FAILURE;
    }

    match (&tk.blocking, tk.accessible) {
        (Blocking::NotBlocked, Some(true)) => {
            if final_request_is_secure(tk) {
                status |= STATUS_SUCCESS_SECURE;
            } else {
                status |= STATUS_SUCCESS_CLEARTEXT;
            }
        }
        (Blocking::NotBlocked, _) => {
            if tk.dns_experiment_failure.as_deref() == Some(DNS_NXDOMAIN_ERROR) {
                status |= STATUS_SUCCESS_NXDOMAIN;
            }
        }
        (Blocking::Reason(reason), _) => match reason.as_str() {
            "dns" => status |= STATUS_ANOMALY_DNS,
            "tcp_ip" => status |= STATUS_ANOMALY_CONNECT,
            "http-diff" => status |= STATUS_ANOMALY_HTTP_DIFF,
            _ => status |= http_failure_status(tk),
        },
        // a missing control already explains the unknown verdict
        (Blocking::Unknown, _) => {
            if status == 0 {
                status |= STATUS_ANOMALY_UNKNOWN;
            }
        }
    }
    status
}

fn http_failure_status(tk: &TestKeys) -> i64 {
    if tk.blocking_flags & ANALYSIS_FLAG_TLS_BLOCKING != 0 {
        return STATUS_ANOMALY_TLS_HANDSHAKE;
    }
    match tk.http_experiment_failure.as_deref() {
        Some(CONNECTION_REFUSED) => STATUS_ANOMALY_CONNECT,
        Some(CONNECTION_RESET) | Some(EOF_ERROR) => STATUS_ANOMALY_READ_WRITE,
        _ => STATUS_ANOMALY_UNKNOWN,
    }
}
