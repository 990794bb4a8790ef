// File: control.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! Client for the test helper that repeats the measurement from an
//! uncensored vantage point.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::archival::endpoint_string;
use crate::config::ConfigParameter;
use crate::errors::{ProbeError, ProbeResult};
use crate::geoip::AsnLookup;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub http_request: String,
    pub http_request_headers: BTreeMap<String, Vec<String>>,
    pub tcp_connect: Vec<String>,
    #[serde(default)]
    pub x_quic_enabled: bool,
}

impl ControlRequest {
    pub fn new(url: &Url, config: &ConfigParameter, addrs: &[IpAddr]) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), vec![config.accept().to_string()]);
        headers.insert(
            "Accept-Language".to_string(),
            vec![config.accept_language().to_string()],
        );
        headers.insert(
            "User-Agent".to_string(),
            vec![config.user_agent().to_string()],
        );
        Self {
            http_request: url.to_string(),
            http_request_headers: headers,
            tcp_connect: control_endpoints(url, addrs),
            x_quic_enabled: false,
        }
    }
}

/// With an explicit port in the URL only that port is checked, otherwise
/// both 443 and 80 are.
pub fn control_endpoints(url: &Url, addrs: &[IpAddr]) -> Vec<String> {
    let mut endpoints = Vec::new();
    for addr in addrs {
        let ip = addr.to_string();
        match url.port() {
            Some(port) => endpoints.push(endpoint_string(&ip, port)),
            None => {
                endpoints.push(endpoint_string(&ip, 443));
                endpoints.push(endpoint_string(&ip, 80));
            }
        }
    }
    endpoints
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlTcpConnectResult {
    pub status: bool,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlTlsHandshakeResult {
    #[serde(default)]
    pub server_name: String,
    pub status: bool,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlHttpRequestResult {
    #[serde(default)]
    pub body_length: i64,
    #[serde(default)]
    pub discovered_h3_endpoint: String,
    #[serde(default)]
    pub failure: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub status_code: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlDnsResult {
    #[serde(default)]
    pub failure: Option<String>,
    #[serde(default)]
    pub addrs: Vec<String>,
    /// Filled locally from the ASN database, never sent on the wire.
    #[serde(skip)]
    pub asns: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlIpInfo {
    pub asn: i64,
    pub flags: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    #[serde(default)]
    pub tcp_connect: BTreeMap<String, ControlTcpConnectResult>,
    #[serde(default)]
    pub tls_handshake: BTreeMap<String, ControlTlsHandshakeResult>,
    #[serde(default)]
    pub http_request: ControlHttpRequestResult,
    #[serde(default)]
    pub dns: ControlDnsResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_info: Option<BTreeMap<String, ControlIpInfo>>,
}

impl ControlResponse {
    /// Annotates the DNS result with the ASN of every address.
    pub fn annotate_asns(&mut self, asn: &dyn AsnLookup) {
        self.dns.asns = self
            .dns
            .addrs
            .iter()
            .filter_map(|a| a.parse::<IpAddr>().ok())
            .map(|a| asn.lookup(a).0)
            .collect();
    }
}

pub struct ControlClient {
    client: reqwest::Client,
    helpers: Vec<String>,
    asn: Arc<dyn AsnLookup>,
}

impl ControlClient {
    pub fn new(config: &ConfigParameter, asn: Arc<dyn AsnLookup>) -> ProbeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.control_timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent())
            .build()?;
        Ok(Self {
            client,
            helpers: config.test_helpers().to_vec(),
            asn,
        })
    }

    async fn call(&self, helper: &str, request: &ControlRequest) -> ProbeResult<ControlResponse> {
        let response = self
            .client
            .post(helper)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<ControlResponse>().await?)
    }

    /// Tries each configured test helper in order and returns the first
    /// successful response.
    pub async fn measure(&self, request: &ControlRequest) -> ProbeResult<ControlResponse> {
        let mut last_error = String::from("no test helper configured");
        for helper in &self.helpers {
            info!("control: using test helper {}", helper);
            match self.call(helper, request).await {
                Ok(mut response) => {
                    response.annotate_asns(self.asn.as_ref());
                    debug!(
                        "control: {} addrs, {} tcp results",
                        response.dns.addrs.len(),
                        response.tcp_connect.len()
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!("control: test helper {} failed: {}", helper, e);
                    last_error = e.to_string();
                }
            }
        }
        Err(ProbeError::Control(format!(
            "generic_control_failure: {}",
            last_error
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoip::NullAsnLookup;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct FixedAsn;

    impl AsnLookup for FixedAsn {
        fn lookup(&self, addr: IpAddr) -> (u32, String) {
            match addr.to_string().as_str() {
                "93.184.216.34" => (15133, "Edgecast".to_string()),
                _ => (0, String::new()),
            }
        }
    }

    #[test]
    fn test_control_endpoints() {
        let addrs: Vec<IpAddr> = vec!["1.2.3.4".parse().unwrap(), "::1".parse().unwrap()];
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(
            control_endpoints(&url, &addrs),
            vec!["1.2.3.4:443", "1.2.3.4:80", "[::1]:443", "[::1]:80"]
        );
        let url = Url::parse("http://example.com:8080/").unwrap();
        assert_eq!(
            control_endpoints(&url, &addrs),
            vec!["1.2.3.4:8080", "[::1]:8080"]
        );
    }

    #[test]
    fn test_request_serialization() {
        let url = Url::parse("https://example.com/").unwrap();
        let req = ControlRequest::new(&url, &ConfigParameter::new(), &[]);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["http_request"], json!("https://example.com/"));
        assert!(value["http_request_headers"]["User-Agent"].is_array());
        assert_eq!(value["x_quic_enabled"], json!(false));
    }

    #[test]
    fn test_response_parsing_and_asn_annotation() {
        let body = json!({
            "tcp_connect": {"93.184.216.34:443": {"status": true, "failure": null}},
            "tls_handshake": {
                "93.184.216.34:443": {"server_name": "example.com", "status": true, "failure": null}
            },
            "http_request": {"body_length": 1256, "failure": null, "title": "Example Domain",
                             "headers": {"Server": "ECS"}, "status_code": 200},
            "dns": {"failure": null, "addrs": ["93.184.216.34"]}
        });
        let mut resp: ControlResponse = serde_json::from_value(body).unwrap();
        resp.annotate_asns(&FixedAsn);
        assert_eq!(resp.dns.asns, vec![15133]);
        assert!(resp.tcp_connect["93.184.216.34:443"].status);
        assert_eq!(resp.http_request.title, "Example Domain");
        let out = serde_json::to_value(&resp).unwrap();
        assert!(out["dns"].get("asns").is_none());
    }

    #[tokio::test]
    async fn test_measure_without_helpers_fails() {
        let mut config = ConfigParameter::new();
        config.set_test_helpers(vec![]);
        let client = ControlClient::new(&config, Arc::new(NullAsnLookup)).unwrap();
        let url = Url::parse("https://example.com/").unwrap();
        let err = client
            .measure(&ControlRequest::new(&url, &config, &[]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("generic_control_failure"));
    }
}
