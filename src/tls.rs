// File: tls.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::{debug, trace};
use rustls::{ClientConfig, OwnedTrustAnchor, ProtocolVersion, RootCertStore, ServerName};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::archival::{BinaryData, NetworkEvent, TlsHandshake};
use crate::failure::{classify_io_error, timeout_failure};
use crate::trace::Trace;

pub fn client_config(alpn: &[String]) -> Arc<ClientConfig> {
    let mut root_store = RootCertStore::empty();
    root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    let mut config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    config.alpn_protocols = alpn.iter().map(|p| p.as_bytes().to_vec()).collect();
    Arc::new(config)
}

fn tls_version_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        ProtocolVersion::TLSv1_1 => "TLSv1.1".to_string(),
        ProtocolVersion::TLSv1_0 => "TLSv1.0".to_string(),
        other => format!("{:?}", other),
    }
}

/// rustls spells TLS 1.3 suites `TLS13_*`; the archival format uses `TLS_*`.
fn cipher_suite_name(suite: rustls::CipherSuite) -> String {
    let name = format!("{:?}", suite);
    match name.strip_prefix("TLS13_") {
        Some(rest) => format!("TLS_{}", rest),
        None => name,
    }
}

pub struct HandshakeResult {
    pub stream: Option<TlsStream<TcpStream>>,
    pub record: TlsHandshake,
    pub events: Vec<NetworkEvent>,
}

impl HandshakeResult {
    pub fn failure(&self) -> Option<&str> {
        self.record.failure.as_deref()
    }
}

pub async fn handshake(
    config: Arc<ClientConfig>,
    tcp: TcpStream,
    server_name: ServerName,
    sni: &str,
    address: &str,
    handshake_timeout: Duration,
    tr: &Trace,
) -> HandshakeResult {
    let started = Instant::now();
    let mut events = vec![tr.network_event("tls_handshake_start", None, None, started)];
    let connector = TlsConnector::from(config);

    let mut record = TlsHandshake {
        network: "tcp".to_string(),
        address: address.to_string(),
        server_name: sni.to_string(),
        t0: tr.since_zero(started),
        tags: tr.tags(),
        transaction_id: tr.index(),
        ..Default::default()
    };

    let outcome = match timeout(handshake_timeout, connector.connect(server_name, tcp)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => {
            debug!("TLS handshake with {} failed: {}", address, e);
            Err(classify_io_error(&e))
        }
        Err(_) => Err(timeout_failure()),
    };
    record.t = tr.now();

    let stream = match outcome {
        Ok(stream) => {
            let (_, conn) = stream.get_ref();
            record.cipher_suite = conn
                .negotiated_cipher_suite()
                .map(|s| cipher_suite_name(s.suite()))
                .unwrap_or_default();
            record.tls_version = conn
                .protocol_version()
                .map(tls_version_name)
                .unwrap_or_default();
            record.negotiated_protocol = conn
                .alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .unwrap_or_default();
            record.peer_certificates = conn
                .peer_certificates()
                .map(|certs| certs.iter().map(|c| BinaryData::from_bytes(&c.0)).collect())
                .unwrap_or_default();
            trace!(
                "TLS with {} negotiated {} {}",
                address,
                record.tls_version,
                record.cipher_suite
            );
            Some(stream)
        }
        Err(failure) => {
            record.failure = Some(failure);
            None
        }
    };

    events.push(tr.network_event(
        "tls_handshake_done",
        None,
        record.failure.clone(),
        started,
    ));
    HandshakeResult {
        stream,
        record,
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_client_config_alpn() {
        let config = client_config(&["h2".to_string(), "http/1.1".to_string()]);
        assert_eq!(
            config.alpn_protocols,
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
    }

    #[test]
    fn test_version_names() {
        assert_eq!(tls_version_name(ProtocolVersion::TLSv1_3), "TLSv1.3");
        assert_eq!(tls_version_name(ProtocolVersion::TLSv1_2), "TLSv1.2");
    }

    #[test]
    fn test_cipher_suite_names() {
        assert_eq!(
            cipher_suite_name(rustls::CipherSuite::TLS13_AES_128_GCM_SHA256),
            "TLS_AES_128_GCM_SHA256"
        );
        assert_eq!(
            cipher_suite_name(rustls::CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256),
            "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"
        );
    }
}
