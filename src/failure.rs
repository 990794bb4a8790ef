// File: failure.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! Maps low level errors onto the stable failure strings stored in
//! archival records.

use std::io::{self, ErrorKind};

pub const CONNECTION_REFUSED: &str = "connection_refused";
pub const CONNECTION_RESET: &str = "connection_reset";
pub const GENERIC_TIMEOUT_ERROR: &str = "generic_timeout_error";
pub const EOF_ERROR: &str = "eof_error";
pub const HOST_UNREACHABLE: &str = "host_unreachable";
pub const NETWORK_UNREACHABLE: &str = "network_unreachable";
pub const DNS_NXDOMAIN_ERROR: &str = "dns_nxdomain_error";
pub const DNS_NO_ANSWER: &str = "dns_no_answer";
pub const DNS_REFUSED_ERROR: &str = "dns_refused_error";
pub const DNS_SERVER_FAILURE: &str = "dns_server_failure";
pub const DNS_SERVER_MISBEHAVING: &str = "dns_server_misbehaving";
pub const SSL_INVALID_HOSTNAME: &str = "ssl_invalid_hostname";
pub const SSL_UNKNOWN_AUTHORITY: &str = "ssl_unknown_authority";
pub const SSL_INVALID_CERTIFICATE: &str = "ssl_invalid_certificate";
pub const SSL_FAILED_HANDSHAKE: &str = "ssl_failed_handshake";
pub const HTTP_REQUEST_FAILED: &str = "http_request_failed";
pub const INTERRUPTED: &str = "interrupted";

#[cfg(target_os = "linux")]
const ENETUNREACH: i32 = 101;
#[cfg(target_os = "linux")]
const EHOSTUNREACH: i32 = 113;
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
const ENETUNREACH: i32 = 51;
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
const EHOSTUNREACH: i32 = 65;
#[cfg(windows)]
const ENETUNREACH: i32 = 10051;
#[cfg(windows)]
const EHOSTUNREACH: i32 = 10065;
#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    windows
)))]
const ENETUNREACH: i32 = -1;
#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    windows
)))]
const EHOSTUNREACH: i32 = -1;

pub fn unknown_failure(message: impl std::fmt::Display) -> String {
    format!("unknown_failure: {}", message)
}

pub fn classify_io_error(err: &io::Error) -> String {
    if let Some(tls_err) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        return classify_tls_error(tls_err);
    }

    let failure = match err.kind() {
        ErrorKind::ConnectionRefused => CONNECTION_REFUSED,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            CONNECTION_RESET
        }
        ErrorKind::TimedOut => GENERIC_TIMEOUT_ERROR,
        ErrorKind::UnexpectedEof => EOF_ERROR,
        _ => match err.raw_os_error() {
            Some(code) if code == ENETUNREACH => NETWORK_UNREACHABLE,
            Some(code) if code == EHOSTUNREACH => HOST_UNREACHABLE,
            _ => return unknown_failure(err),
        },
    };
    failure.to_string()
}

pub fn classify_tls_error(err: &rustls::Error) -> String {
    use rustls::CertificateError;

    let failure = match err {
        rustls::Error::InvalidCertificate(CertificateError::NotValidForName) => {
            SSL_INVALID_HOSTNAME
        }
        rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer) => {
            SSL_UNKNOWN_AUTHORITY
        }
        rustls::Error::InvalidCertificate(_) => SSL_INVALID_CERTIFICATE,
        _ => SSL_FAILED_HANDSHAKE,
    };
    failure.to_string()
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return GENERIC_TIMEOUT_ERROR.to_string();
    }
    if err.is_status() {
        return HTTP_REQUEST_FAILED.to_string();
    }
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return classify_io_error(io_err);
        }
        source = inner.source();
    }
    if err.is_connect() {
        return CONNECTION_REFUSED.to_string();
    }
    unknown_failure(err)
}

/// The io error behind a hyper failure decides the string; a connection
/// closed before the response was complete is an EOF.
pub fn classify_hyper_error(err: &hyper::Error) -> String {
    if err.is_timeout() {
        return GENERIC_TIMEOUT_ERROR.to_string();
    }
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return classify_io_error(io_err);
        }
        source = inner.source();
    }
    if err.is_incomplete_message() {
        return EOF_ERROR.to_string();
    }
    unknown_failure(err)
}

pub fn timeout_failure() -> String {
    GENERIC_TIMEOUT_ERROR.to_string()
}

/// IPv6 attempts failing this way reflect a local IPv6 deficiency.
pub fn is_ipv6_unreachable(failure: &str) -> bool {
    failure == HOST_UNREACHABLE || failure == NETWORK_UNREACHABLE
}
