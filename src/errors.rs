// File: errors.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::fmt;

#[derive(Debug)]
pub enum ProbeError {
    InvalidInput(String),
    Interrupted,
    Fundamental(String),
    Control(String),
    Dns(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Http(reqwest::Error),
    Url(url::ParseError),
    GeoIp(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Self::Interrupted => write!(f, "context error: measurement interrupted"),
            Self::Fundamental(msg) => write!(f, "fundamental failure: {}", msg),
            Self::Control(msg) => write!(f, "control failure: {}", msg),
            Self::Dns(msg) => write!(f, "dns error: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Json(e) => write!(f, "JSON error: {}", e),
            Self::Http(e) => write!(f, "HTTP error: {}", e),
            Self::Url(e) => write!(f, "URL error: {}", e),
            Self::GeoIp(msg) => write!(f, "geoip error: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Http(e) => Some(e),
            Self::Url(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error)
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error)
    }
}

impl From<url::ParseError> for ProbeError {
    fn from(error: url::ParseError) -> Self {
        Self::Url(error)
    }
}

impl From<hickory_proto::error::ProtoError> for ProbeError {
    fn from(error: hickory_proto::error::ProtoError) -> Self {
        Self::Dns(error.to_string())
    }
}

impl From<maxminddb::MaxMindDBError> for ProbeError {
    fn from(error: maxminddb::MaxMindDBError) -> Self {
        Self::GeoIp(error.to_string())
    }
}

impl ProbeError {
    /// Hard errors suppress submission of the measurement entirely.
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::Interrupted | Self::Fundamental(_)
        )
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;
