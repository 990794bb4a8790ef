// File: lib.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_inception)]
#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]

pub mod analysis;
pub mod archival;
pub mod bogon;
pub mod cleartextflow;
pub mod cli;
pub mod config;
pub mod context;
pub mod control;
pub mod dnscache;
pub mod dnslookup;
pub mod dnsresolvers;
pub mod errors;
pub mod failure;
pub mod flow;
pub mod geoip;
pub mod http;
pub mod httpinner;
pub mod measurer;
pub mod priority;
pub mod redirects;
pub mod registry;
pub mod secureflow;
pub mod taskgroup;
pub mod testkeys;
pub mod tls;
pub mod trace;
