// File: config.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_UDP_RESOLVER: &str = "8.8.4.4:53";
pub const DEFAULT_DOH_URL: &str = "https://mozilla.cloudflare-dns.com/dns-query";
pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36"
);
pub const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
pub const DEFAULT_MAX_BODY_SIZE: usize = 1 << 19;

const DEFAULT_TEST_HELPERS: [&str; 4] = [
    "https://0.th.ooni.org/",
    "https://1.th.ooni.org/",
    "https://2.th.ooni.org/",
    "https://3.th.ooni.org/",
];

#[derive(Debug, Clone)]
pub struct ConfigParameter {
    udp_resolver: String,
    doh_url: String,
    test_helpers: Vec<String>,
    dns_timeout: u64,
    connect_timeout: u64,
    tls_timeout: u64,
    http_timeout: u64,
    control_timeout: u64,
    max_body_size: usize,
    max_redirects: u32,
    user_agent: String,
    accept: String,
    accept_language: String,
    alpn: Vec<String>,
    asn_database: Option<PathBuf>,
}

impl ConfigParameter {
    pub fn new() -> Self {
        Self {
            udp_resolver: DEFAULT_UDP_RESOLVER.to_string(),
            doh_url: DEFAULT_DOH_URL.to_string(),
            test_helpers: DEFAULT_TEST_HELPERS.iter().map(|s| s.to_string()).collect(),
            dns_timeout: 4,
            connect_timeout: 10,
            tls_timeout: 10,
            http_timeout: 10,
            control_timeout: 30,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_redirects: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            alpn: vec!["http/1.1".to_string()],
            asn_database: None,
        }
    }

    pub fn set_udp_resolver(&mut self, udp_resolver: impl Into<String>) {
        self.udp_resolver = udp_resolver.into();
    }

    pub fn udp_resolver(&self) -> &str {
        &self.udp_resolver
    }

    pub fn set_doh_url(&mut self, doh_url: impl Into<String>) {
        self.doh_url = doh_url.into();
    }

    pub fn doh_url(&self) -> &str {
        &self.doh_url
    }

    pub fn set_test_helpers(&mut self, test_helpers: Vec<String>) {
        self.test_helpers = test_helpers;
    }

    pub fn test_helpers(&self) -> &[String] {
        &self.test_helpers
    }

    pub fn set_dns_timeout(&mut self, secs: u64) {
        self.dns_timeout = secs;
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout)
    }

    pub fn set_connect_timeout(&mut self, secs: u64) {
        self.connect_timeout = secs;
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn set_tls_timeout(&mut self, secs: u64) {
        self.tls_timeout = secs;
    }

    pub fn tls_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_timeout)
    }

    pub fn set_http_timeout(&mut self, secs: u64) {
        self.http_timeout = secs;
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    pub fn set_control_timeout(&mut self, secs: u64) {
        self.control_timeout = secs;
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout)
    }

    pub fn set_max_body_size(&mut self, max_body_size: usize) {
        self.max_body_size = max_body_size;
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    pub fn set_max_redirects(&mut self, max_redirects: u32) {
        self.max_redirects = max_redirects;
    }

    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = user_agent.into();
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn set_accept(&mut self, accept: impl Into<String>) {
        self.accept = accept.into();
    }

    pub fn accept(&self) -> &str {
        &self.accept
    }

    pub fn set_accept_language(&mut self, accept_language: impl Into<String>) {
        self.accept_language = accept_language.into();
    }

    pub fn accept_language(&self) -> &str {
        &self.accept_language
    }

    pub fn set_alpn(&mut self, alpn: Vec<String>) {
        self.alpn = alpn;
    }

    pub fn alpn(&self) -> &[String] {
        &self.alpn
    }

    pub fn set_asn_database(&mut self, path: Option<PathBuf>) {
        self.asn_database = path;
    }

    pub fn asn_database(&self) -> Option<&PathBuf> {
        self.asn_database.as_ref()
    }
}

impl Default for ConfigParameter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
