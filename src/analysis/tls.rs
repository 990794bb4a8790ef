// File: analysis/tls.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::warn;

use super::ANALYSIS_FLAG_TLS_BLOCKING;
use crate::control::ControlResponse;
use crate::testkeys::TestKeys;

pub fn analyze_tls(tk: &mut TestKeys, ctrl: Option<&ControlResponse>) {
    let Some(ctrl) = ctrl else {
        return;
    };
    for entry in &tk.tls_handshakes {
        let Some(failure) = &entry.failure else {
            continue;
        };
        let Some(control) = ctrl.tls_handshake.get(&entry.address) else {
            continue;
        };
        if !control.status || control.failure.is_some() {
            continue;
        }
        warn!(
            "TLS: endpoint {} fails with {} (see #{})",
            entry.address, failure, entry.transaction_id
        );
        tk.blocking_flags |= ANALYSIS_FLAG_TLS_BLOCKING;
    }
}
