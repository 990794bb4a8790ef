// File: cli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use crate::config::ConfigParameter;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    /// The http:// or https:// URL to measure
    pub url: String,

    #[arg(
        long = "th",
        help = "Test helper URL, may be repeated (tried in order)"
    )]
    pub test_helpers: Vec<String>,

    #[arg(long = "udp-resolver", help = "UDP resolver as ip:port")]
    pub udp_resolver: Option<String>,

    #[arg(long = "doh-url", help = "DNS-over-HTTPS resolver URL")]
    pub doh_url: Option<String>,

    #[arg(long = "asn-db", help = "MaxMind ASN database for address annotation")]
    pub asn_db: Option<PathBuf>,

    #[arg(long = "max-redirects", help = "Redirects followed across the measurement")]
    pub max_redirects: Option<u32>,

    #[arg(long = "user-agent")]
    pub user_agent: Option<String>,

    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,

    #[arg(long = "no-control", help = "Do not contact any test helper")]
    pub no_control: bool,

    #[arg(long = "no-color", help = "Disable colored output")]
    pub no_color: bool,
}

impl Cli {
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Warn)
    }

    /// Applies the flags on top of the default configuration.
    pub fn config(&self) -> ConfigParameter {
        let mut config = ConfigParameter::new();
        if let Some(resolver) = &self.udp_resolver {
            config.set_udp_resolver(resolver.as_str());
        }
        if let Some(url) = &self.doh_url {
            config.set_doh_url(url.as_str());
        }
        if self.no_control {
            config.set_test_helpers(Vec::new());
        } else if !self.test_helpers.is_empty() {
            config.set_test_helpers(self.test_helpers.clone());
        }
        if let Some(max) = self.max_redirects {
            config.set_max_redirects(max);
        }
        if let Some(ua) = &self.user_agent {
            config.set_user_agent(ua.as_str());
        }
        config.set_asn_database(self.asn_db.clone());
        config
    }
}
