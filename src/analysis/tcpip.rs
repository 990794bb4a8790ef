// File: analysis/tcpip.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::warn;

use super::ANALYSIS_FLAG_TCPIP_BLOCKING;
use crate::control::ControlResponse;
use crate::failure::is_ipv6_unreachable;
use crate::testkeys::TestKeys;

/// Flags endpoints the probe could not connect to while the control could.
/// Endpoints without a control entry are inconclusive.
pub fn analyze_tcpip(tk: &mut TestKeys, ctrl: Option<&ControlResponse>) {
    let Some(ctrl) = ctrl else {
        return;
    };
    if ctrl.tcp_connect.is_empty() {
        return;
    }

    let mut flags = 0;
    for entry in tk.tcp_connect.iter_mut() {
        if entry.status.success {
            continue;
        }
        let endpoint = entry.endpoint();
        let Some(control) = ctrl.tcp_connect.get(&endpoint) else {
            continue;
        };
        if control.failure.is_some() || !control.status {
            continue;
        }
        let failure = entry.status.failure.as_deref().unwrap_or_default();
        if entry.ip.contains(':') && is_ipv6_unreachable(failure) {
            continue;
        }
        warn!(
            "TCP/IP: endpoint {} is blocked with {} (see #{})",
            endpoint, failure, entry.transaction_id
        );
        entry.status.blocked = Some(true);
        flags |= ANALYSIS_FLAG_TCPIP_BLOCKING;
    }
    tk.blocking_flags |= flags;
}
