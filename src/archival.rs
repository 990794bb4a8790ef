// File: archival.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! Records appended to the test keys. Field names are part of the
//! measurement JSON format and must stay stable.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::net::IpAddr;

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryData {
    pub data: String,
    pub format: String,
}

impl BinaryData {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            format: "base64".to_string(),
        }
    }

    pub fn decode(&self) -> Option<Vec<u8>> {
        STANDARD.decode(self.data.as_bytes()).ok()
    }
}

/// A body or header value: emitted as a plain string when it is valid
/// UTF-8, otherwise as base64 encoded binary data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaybeBinary(pub Vec<u8>);

impl MaybeBinary {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_lossy_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<&str> for MaybeBinary {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl Serialize for MaybeBinary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(&self.0) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => BinaryData::from_bytes(&self.0).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for MaybeBinary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Binary(BinaryData),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Ok(Self(text.into_bytes())),
            Repr::Binary(bin) => bin
                .decode()
                .map(Self)
                .ok_or_else(|| serde::de::Error::custom("invalid base64 body")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsAnswer {
    pub answer_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub asn: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub as_org_name: String,
}

impl DnsAnswer {
    pub fn from_ip(addr: IpAddr, ttl: Option<u32>, asn: u32, as_org_name: String) -> Self {
        let mut answer = Self {
            ttl,
            asn,
            as_org_name,
            ..Default::default()
        };
        match addr {
            IpAddr::V4(v4) => {
                answer.answer_type = "A".to_string();
                answer.ipv4 = Some(v4.to_string());
            }
            IpAddr::V6(v6) => {
                answer.answer_type = "AAAA".to_string();
                answer.ipv6 = Some(v6.to_string());
            }
        }
        answer
    }

    pub fn cname(hostname: String, ttl: Option<u32>) -> Self {
        Self {
            answer_type: "CNAME".to_string(),
            hostname: Some(hostname),
            ttl,
            ..Default::default()
        }
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ipv4
            .as_deref()
            .or(self.ipv6.as_deref())
            .and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsLookup {
    pub answers: Vec<DnsAnswer>,
    pub engine: String,
    pub failure: Option<String>,
    pub hostname: String,
    pub query_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<BinaryData>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub rcode: i64,
    pub resolver_hostname: Option<String>,
    pub resolver_port: Option<String>,
    pub resolver_address: String,
    pub t0: f64,
    pub t: f64,
    pub tags: Vec<String>,
    pub transaction_id: i64,
}

impl DnsLookup {
    pub fn addresses(&self) -> Vec<IpAddr> {
        self.answers.iter().filter_map(DnsAnswer::ip).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpConnectStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
    pub failure: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpConnect {
    pub ip: String,
    pub port: u16,
    pub status: TcpConnectStatus,
    pub t0: f64,
    pub t: f64,
    pub tags: Vec<String>,
    pub transaction_id: i64,
}

impl TcpConnect {
    pub fn endpoint(&self) -> String {
        endpoint_string(&self.ip, self.port)
    }
}

/// Formats `ip:port`, bracketing IPv6 literals.
pub fn endpoint_string(ip: &str, port: u16) -> String {
    if ip.contains(':') {
        format!("[{}]:{}", ip, port)
    } else {
        format!("{}:{}", ip, port)
    }
}

/// Splits an endpoint produced by [`endpoint_string`] into host and port.
pub fn split_endpoint(endpoint: &str) -> Option<(String, u16)> {
    let (host, port) = endpoint.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Some((host.to_string(), port.parse().ok()?))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsHandshake {
    pub network: String,
    pub address: String,
    pub cipher_suite: String,
    pub failure: Option<String>,
    pub negotiated_protocol: String,
    pub no_tls_verify: bool,
    pub peer_certificates: Vec<BinaryData>,
    pub server_name: String,
    pub t0: f64,
    pub t: f64,
    pub tags: Vec<String>,
    pub tls_version: String,
    pub transaction_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpTor {
    pub exit_ip: Option<String>,
    pub exit_name: Option<String>,
    pub is_tor: bool,
}

pub type HeaderList = Vec<(String, MaybeBinary)>;

/// Builds the `headers` map view of a header list; the first value wins.
pub fn headers_map(list: &HeaderList) -> BTreeMap<String, MaybeBinary> {
    let mut map = BTreeMap::new();
    for (key, value) in list {
        map.entry(key.clone()).or_insert_with(|| value.clone());
    }
    map
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRequestRecord {
    pub body: MaybeBinary,
    pub body_is_truncated: bool,
    pub headers_list: HeaderList,
    pub headers: BTreeMap<String, MaybeBinary>,
    pub method: String,
    pub tor: HttpTor,
    pub x_transport: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpResponseRecord {
    pub body: MaybeBinary,
    pub body_is_truncated: bool,
    pub code: i64,
    pub headers_list: HeaderList,
    pub headers: BTreeMap<String, MaybeBinary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpTransaction {
    pub network: String,
    pub address: String,
    pub alpn: String,
    pub failure: Option<String>,
    pub request: HttpRequestRecord,
    pub response: HttpResponseRecord,
    pub t0: f64,
    pub t: f64,
    pub tags: Vec<String>,
    pub transaction_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub num_bytes: i64,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
    pub t0: f64,
    pub t: f64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub transaction_id: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnPriorityLogEntry {
    pub msg: String,
    pub t: f64,
}
