// File: common/mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(dead_code)]

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use wcprobe::config::ConfigParameter;
use wcprobe::geoip::NullAsnLookup;
use wcprobe::measurer::Measurer;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn create_mock_response(
    status: u16,
    body: &str,
    headers: HashMap<&str, &str>,
) -> ResponseTemplate {
    let mut response = ResponseTemplate::new(status).set_body_string(body);
    for (key, value) in headers {
        response = response.append_header(key, value);
    }
    response
}

pub fn create_html_response(content: &str) -> ResponseTemplate {
    let mut headers = HashMap::new();
    headers.insert("content-type", "text/html");
    create_mock_response(200, content, headers)
}

pub fn sample_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head>
    <title>Example Domain</title>
</head>
<body>
    <h1>Example Domain</h1>
    <p>This domain is for use in illustrative examples in documents.</p>
</body>
</html>"#
        .to_string()
}

/// Configuration that keeps every lookup and connect on the loopback
/// interface. The UDP resolver points at the discard port and the DoH
/// resolver at `doh`, so both fail quickly.
pub fn local_config(doh: &MockServer, test_helpers: Vec<String>) -> ConfigParameter {
    let mut config = ConfigParameter::new();
    config.set_udp_resolver("127.0.0.1:9");
    config.set_doh_url(format!("{}/dns-query", doh.uri()));
    config.set_test_helpers(test_helpers);
    config.set_dns_timeout(2);
    config.set_connect_timeout(2);
    config.set_tls_timeout(2);
    config.set_http_timeout(5);
    config.set_control_timeout(5);
    config
}

pub fn measurer(config: ConfigParameter) -> Measurer {
    Measurer::new(config, Arc::new(NullAsnLookup))
}

pub async fn failing_doh_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    server
}

/// A test helper that reports the page as reachable at `endpoint`.
pub async fn control_server(endpoint: &str, body_length: usize) -> MockServer {
    let server = MockServer::start().await;
    let mut tcp_connect = serde_json::Map::new();
    tcp_connect.insert(endpoint.to_string(), json!({"status": true, "failure": null}));
    let body = json!({
        "tcp_connect": tcp_connect,
        "tls_handshake": {},
        "http_request": {
            "body_length": body_length,
            "discovered_h3_endpoint": "",
            "failure": null,
            "title": "Example Domain",
            "headers": {"Content-Type": "text/html"},
            "status_code": 200
        },
        "dns": {"failure": null, "addrs": ["127.0.0.1"]},
        "ip_info": {}
    });
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}
