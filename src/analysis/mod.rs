// File: analysis/mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! Turns the raw observations of a measurement into the `blocking` and
//! `accessible` verdicts by comparing them with the control.
//!
//! The stages run in a fixed order. Each stage only ORs bits into
//! [`TestKeys::blocking_flags`]; the toplevel decision then picks the
//! first matching cause by precedence.

pub mod dns;
pub mod http;
pub mod httpdiff;
pub mod nullnull;
pub mod summary;
pub mod tcpip;
pub mod tls;

use log::{info, warn};

use crate::control::ControlResponse;
use crate::testkeys::{Blocking, TestKeys};

pub const ANALYSIS_FLAG_DNS_BLOCKING: i64 = 1 << 0;
pub const ANALYSIS_FLAG_TCPIP_BLOCKING: i64 = 1 << 1;
pub const ANALYSIS_FLAG_TLS_BLOCKING: i64 = 1 << 2;
pub const ANALYSIS_FLAG_HTTP_BLOCKING: i64 = 1 << 3;
pub const ANALYSIS_FLAG_HTTP_DIFF: i64 = 1 << 4;
pub const ANALYSIS_FLAG_SUCCESS: i64 = 1 << 5;

/// Runs every analysis stage and fills the verdict fields of `tk`.
pub fn analyze(tk: &mut TestKeys) {
    let control = tk.control.take();
    let ctrl = control.as_ref();

    dns::analyze_dns(tk, ctrl);
    tcpip::analyze_tcpip(tk, ctrl);
    tls::analyze_tls(tk, ctrl);
    http::analyze_http(tk, ctrl);
    toplevel(tk, ctrl);

    tk.control = control;
    tk.status = summary::status(tk);
}

fn set_verdict(tk: &mut TestKeys, blocking: Blocking, accessible: Option<bool>) {
    tk.blocking = blocking;
    tk.accessible = accessible;
}

fn toplevel(tk: &mut TestKeys, ctrl: Option<&ControlResponse>) {
    let flags = tk.blocking_flags;
    if flags & ANALYSIS_FLAG_DNS_BLOCKING != 0 {
        set_verdict(tk, Blocking::reason("dns"), Some(false));
        warn!("BLOCKING: dns (flags={})", flags);
    } else if flags & ANALYSIS_FLAG_TCPIP_BLOCKING != 0 {
        set_verdict(tk, Blocking::reason("tcp_ip"), Some(false));
        warn!("BLOCKING: tcp_ip (flags={})", flags);
    } else if flags & (ANALYSIS_FLAG_TLS_BLOCKING | ANALYSIS_FLAG_HTTP_BLOCKING) != 0 {
        set_verdict(tk, Blocking::reason("http-failure"), Some(false));
        warn!("BLOCKING: http-failure (flags={})", flags);
    } else if flags & ANALYSIS_FLAG_HTTP_DIFF != 0 {
        set_verdict(tk, Blocking::reason("http-diff"), Some(false));
        warn!("BLOCKING: http-diff (flags={})", flags);
    } else if flags == ANALYSIS_FLAG_SUCCESS {
        set_verdict(tk, Blocking::NotBlocked, Some(true));
        info!("ACCESSIBLE (flags={})", flags);
    } else if nullnull::detect_no_addrs(tk, ctrl) || nullnull::detect_all_connects_failed(tk, ctrl)
    {
        set_verdict(tk, Blocking::NotBlocked, Some(false));
        info!("SUCCESS (downtime) (null_null_flags={})", tk.null_null_flags);
    } else {
        set_verdict(tk, Blocking::Unknown, None);
        warn!("UNKNOWN (flags={})", flags);
    }
}
