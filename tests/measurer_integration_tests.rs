// File: measurer_integration_tests.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serial_test::serial;
use tokio_util::sync::CancellationToken;
use wcprobe::analysis::summary::STATUS_ANOMALY_CONTROL_UNREACHABLE;
use wcprobe::errors::ProbeError;
use wcprobe::measurer::{ExperimentMeasurer, LogCallbacks};
use wcprobe::testkeys::Blocking;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
#[serial]
async fn test_measure_local_page() {
    let site = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(create_html_response(&sample_page()))
        .mount(&site)
        .await;
    let doh = failing_doh_server().await;
    let th = control_server(&site.address().to_string(), sample_page().len()).await;

    let m = measurer(local_config(&doh, vec![th.uri()]));
    let url = format!("{}/", site.uri());
    let tk = m
        .run(&url, &LogCallbacks, CancellationToken::new())
        .await
        .unwrap();

    // an IP literal only goes through the system resolver
    assert_eq!(tk.queries.len(), 1);
    assert_eq!(tk.queries[0].engine, "getaddrinfo");

    assert_eq!(tk.requests.len(), 1);
    assert_eq!(tk.requests[0].response.code, 200);
    assert!(tk.requests[0]
        .response
        .body
        .as_lossy_str()
        .contains("Example Domain"));
    assert!(tk
        .tcp_connect
        .iter()
        .any(|c| c.port == site.address().port() && c.status.success));

    let request = tk.control_request.as_ref().unwrap();
    assert_eq!(request.tcp_connect, vec![site.address().to_string()]);
    assert!(tk.control.is_some());
    assert_eq!(tk.control_failure, None);

    // loopback answers are bogons
    assert_eq!(tk.dns_consistency.as_deref(), Some("inconsistent"));
    assert_eq!(tk.blocking, Blocking::reason("dns"));
    assert_eq!(tk.accessible, Some(false));
}

#[tokio::test]
#[serial]
async fn test_control_failure_is_recorded() {
    let site = setup_mock_server().await;
    Mock::given(method("GET"))
        .respond_with(create_html_response(&sample_page()))
        .mount(&site)
        .await;
    let doh = failing_doh_server().await;
    let th = setup_mock_server().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&th)
        .await;

    let m = measurer(local_config(&doh, vec![th.uri()]));
    let tk = m
        .run(&site.uri(), &LogCallbacks, CancellationToken::new())
        .await
        .unwrap();

    assert!(tk
        .control_failure
        .as_deref()
        .unwrap()
        .starts_with("generic_control_failure"));
    assert!(tk.control.is_none());
    assert!(tk.control_request.is_some());
    assert!(tk.status & STATUS_ANOMALY_CONTROL_UNREACHABLE != 0);
}

#[tokio::test]
#[serial]
async fn test_redirect_is_followed_with_cookies() {
    let site = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302)
                .append_header("Location", "/final")
                .append_header("Set-Cookie", "session=abc; Path=/"),
        )
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/final"))
        .and(header("cookie", "session=abc"))
        .respond_with(create_html_response(&sample_page()))
        .mount(&site)
        .await;
    let doh = failing_doh_server().await;

    let m = measurer(local_config(&doh, vec![]));
    let url = format!("{}/start", site.uri());
    let tk = m
        .run(&url, &LogCallbacks, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(tk.requests.len(), 2);
    assert!(tk.requests[0].request.url.ends_with("/final"));
    assert_eq!(tk.requests[0].response.code, 200);
    assert_eq!(tk.requests[1].response.code, 302);
    assert!(tk.requests[0]
        .request
        .headers_list
        .iter()
        .any(|(k, v)| k == "Referer" && v.as_lossy_str().ends_with("/start")));
    // the second hop is answered from the DNS cache
    assert_eq!(tk.queries.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_redirect_budget_is_respected() {
    let site = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(301).append_header("Location", "/loop"))
        .mount(&site)
        .await;
    let doh = failing_doh_server().await;

    let mut config = local_config(&doh, vec![]);
    config.set_max_redirects(2);
    let m = measurer(config);
    let url = format!("{}/loop", site.uri());
    let tk = m
        .run(&url, &LogCallbacks, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(tk.requests.len(), 3);
    assert!(tk.requests.iter().all(|r| r.response.code == 301));
}

#[tokio::test]
#[serial]
async fn test_without_control_verdict_is_dns_for_loopback() {
    let site = setup_mock_server().await;
    Mock::given(method("GET"))
        .respond_with(create_html_response(&sample_page()))
        .mount(&site)
        .await;
    let doh = failing_doh_server().await;

    let m = measurer(local_config(&doh, vec![]));
    let tk = m
        .run(&site.uri(), &LogCallbacks, CancellationToken::new())
        .await
        .unwrap();

    assert!(tk.control_request.is_none());
    assert!(tk.control.is_none());
    assert!(!tk.network_events.is_empty());
    assert!(tk
        .conn_priority_log
        .iter()
        .any(|e| e.msg.starts_with("prio: grant")));
    assert_eq!(tk.blocking, Blocking::reason("dns"));

    let value = serde_json::to_value(&tk).unwrap();
    assert_eq!(value["agent"], "redirect");
    assert!(value["x_conn_priority_log"].is_array());
    assert_eq!(value["blocking"], "dns");
}

#[tokio::test]
#[serial]
async fn test_invalid_input_is_rejected() {
    let doh = failing_doh_server().await;
    let m = measurer(local_config(&doh, vec![]));
    let err = m
        .run("ftp://127.0.0.1/", &LogCallbacks, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::InvalidInput(_)));
}
