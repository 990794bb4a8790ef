// File: analysis/nullnull.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! Heuristics for results where no blocking flag and no success flag is
//! set. Both recognise a website that is down everywhere rather than
//! blocked locally.

use log::info;

use crate::control::ControlResponse;
use crate::testkeys::TestKeys;

pub const ANALYSIS_NULL_NULL_NO_ADDRS: i64 = 1 << 0;
pub const ANALYSIS_NULL_NULL_ALL_CONNECTS_FAILED: i64 = 1 << 1;

/// Neither side resolved the domain nor connected anywhere, as happens for
/// expired domains.
pub fn detect_no_addrs(tk: &mut TestKeys, ctrl: Option<&ControlResponse>) -> bool {
    let Some(ctrl) = ctrl else {
        return false;
    };
    if !ctrl.dns.addrs.is_empty() || !ctrl.tcp_connect.is_empty() || !ctrl.tls_handshake.is_empty()
    {
        return false;
    }
    if tk.queries.iter().any(|q| !q.answers.is_empty()) {
        return false;
    }
    if !tk.tcp_connect.is_empty() || !tk.tls_handshakes.is_empty() {
        return false;
    }
    info!("null/null: neither the probe nor the control resolved any address");
    tk.null_null_flags |= ANALYSIS_NULL_NULL_NO_ADDRS;
    true
}

/// Every connect attempted by the probe and by the control failed.
pub fn detect_all_connects_failed(tk: &mut TestKeys, ctrl: Option<&ControlResponse>) -> bool {
    let Some(ctrl) = ctrl else {
        return false;
    };
    if ctrl.tcp_connect.is_empty() || ctrl.tcp_connect.values().any(|c| c.status) {
        return false;
    }
    if tk.tcp_connect.is_empty() || tk.tcp_connect.iter().any(|c| c.status.success) {
        return false;
    }
    info!("null/null: every connect failed for both the probe and the control");
    tk.null_null_flags |= ANALYSIS_NULL_NULL_ALL_CONNECTS_FAILED;
    true
}
