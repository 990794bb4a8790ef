// File: httpinner.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::archival::{HeaderList, MaybeBinary};

/// A response read off the wire.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HttpInner {
    status: u16,
    headers: Vec<(String, Vec<u8>)>,
    body: Vec<u8>,
    body_is_truncated: bool,
}

impl HttpInner {
    pub fn new(status: u16, headers: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            status,
            headers,
            body: Vec::new(),
            body_is_truncated: false,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, Vec<u8>)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: Vec<u8>, truncated: bool) {
        self.body = body;
        self.body_is_truncated = truncated;
    }

    pub fn body_is_truncated(&self) -> bool {
        self.body_is_truncated
    }

    /// First value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| std::str::from_utf8(v).ok())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 307 | 308)
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    pub fn headers_list(&self) -> HeaderList {
        self.headers
            .iter()
            .map(|(k, v)| (k.clone(), MaybeBinary(v.clone())))
            .collect()
    }
}
