// File: flow.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! Steps shared by the cleartext and secure flows.

use log::{debug, info, warn};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::archival::{
    endpoint_string, headers_map, HttpRequestRecord, HttpResponseRecord, HttpTransaction,
    MaybeBinary, TcpConnect, TcpConnectStatus,
};
use crate::context::MeasurementContext;
use crate::dnsresolvers::DnsResolvers;
use crate::failure::{classify_io_error, timeout_failure};
use crate::http::{host_header, round_trip, HttpRequestSpec, RoundTrip};
use crate::httpinner::HttpInner;
use crate::priority::PrioritySelector;
use crate::trace::{OperationLogger, Trace};

/// Per-address parameters of a flow.
#[derive(Clone)]
pub struct FlowParams {
    pub address: SocketAddr,
    pub url: Url,
    pub referer: Option<String>,
    pub follow_redirects: bool,
    pub priority: Option<Arc<PrioritySelector>>,
    pub depth: usize,
}

impl FlowParams {
    pub fn endpoint(&self) -> String {
        endpoint_string(&self.address.ip().to_string(), self.address.port())
    }

    /// May this flow fetch the page body?
    pub fn permission_to_fetch(&self) -> bool {
        match &self.priority {
            Some(ps) => ps.permission_to_fetch(self.address.ip()),
            None => false,
        }
    }
}

/// Failures building requests from the input URL are fundamental; the same
/// failure on a URL received through a redirect only stops the flow.
pub fn flow_failure(ctx: &MeasurementContext, referer: Option<&str>, message: String) {
    if referer.is_none() {
        warn!("fundamental failure: {}", message);
        ctx.tk.set_fundamental_failure(message);
    } else {
        warn!("stopping flow: {}", message);
    }
}

pub async fn tcp_connect(
    ctx: &MeasurementContext,
    tr: &Trace,
    address: SocketAddr,
) -> Option<TcpStream> {
    let endpoint = endpoint_string(&address.ip().to_string(), address.port());
    let ol = OperationLogger::new(tr.index(), format!("TCPConnect {}", endpoint));
    let started = Instant::now();

    let result = match timeout(ctx.config.connect_timeout(), TcpStream::connect(address)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(classify_io_error(&e)),
        Err(_) => Err(timeout_failure()),
    };
    let failure = result.as_ref().err().cloned();

    ctx.tk.append_tcp_connect(TcpConnect {
        ip: address.ip().to_string(),
        port: address.port(),
        status: TcpConnectStatus {
            blocked: None,
            failure: failure.clone(),
            success: failure.is_none(),
        },
        t0: tr.since_zero(started),
        t: tr.now(),
        tags: tr.tags(),
        transaction_id: tr.index(),
    });
    ctx.tk.append_network_events(vec![tr.network_event(
        "connect",
        Some(&endpoint),
        failure.clone(),
        started,
    )]);
    ol.stop(failure.as_deref());
    result.ok()
}

fn request_spec(ctx: &MeasurementContext, params: &FlowParams) -> HttpRequestSpec {
    let cookie = ctx
        .cookies
        .cookies(&params.url)
        .and_then(|v| v.to_str().ok().map(str::to_string));
    HttpRequestSpec {
        url: params.url.clone(),
        host_header: host_header(&params.url),
        accept: ctx.config.accept().to_string(),
        accept_language: ctx.config.accept_language().to_string(),
        user_agent: ctx.config.user_agent().to_string(),
        referer: params.referer.clone(),
        cookie,
    }
}

fn store_cookies(ctx: &MeasurementContext, url: &Url, response: &HttpInner) {
    let values: Vec<HeaderValue> = response
        .header_values("set-cookie")
        .filter_map(|v| HeaderValue::from_bytes(v).ok())
        .collect();
    if !values.is_empty() {
        ctx.cookies.set_cookies(&mut values.iter(), url);
    }
}

fn transaction_record(
    tr: &Trace,
    params: &FlowParams,
    request: &HttpRequestSpec,
    alpn: &str,
    rt: &RoundTrip,
    started: Instant,
) -> HttpTransaction {
    let headers_list = request.headers_list();
    let mut response = HttpResponseRecord::default();
    if let Some(inner) = &rt.response {
        let list = inner.headers_list();
        response = HttpResponseRecord {
            body: MaybeBinary(inner.body().to_vec()),
            body_is_truncated: inner.body_is_truncated(),
            code: inner.status() as i64,
            headers: headers_map(&list),
            headers_list: list,
        };
    }
    HttpTransaction {
        network: "tcp".to_string(),
        address: params.endpoint(),
        alpn: alpn.to_string(),
        failure: rt.failure.clone(),
        request: HttpRequestRecord {
            body: MaybeBinary::default(),
            body_is_truncated: false,
            headers: headers_map(&headers_list),
            headers_list,
            method: "GET".to_string(),
            tor: Default::default(),
            x_transport: "tcp".to_string(),
            url: params.url.to_string(),
        },
        response,
        t0: tr.since_zero(started),
        t: tr.now(),
        tags: tr.tags(),
        transaction_id: tr.index(),
    }
}

/// Performs the GET on an established connection and records it. Returns
/// the response only when the transaction completed without failure.
pub async fn http_fetch<S>(
    ctx: &MeasurementContext,
    tr: &Trace,
    params: &FlowParams,
    stream: S,
    alpn: &str,
) -> Option<HttpInner>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let request = request_spec(ctx, params);
    let ol = OperationLogger::new(
        tr.index(),
        format!("GET {} via {}", params.url, params.endpoint()),
    );
    let started = Instant::now();
    let mut events = vec![tr.network_event("http_transaction_start", None, None, started)];

    let rt = match timeout(
        ctx.config.http_timeout(),
        round_trip(stream, &request, ctx.config.max_body_size()),
    )
    .await
    {
        Ok(rt) => rt,
        Err(_) => RoundTrip {
            response: None,
            failure: Some(timeout_failure()),
        },
    };

    events.push(tr.network_event(
        "http_transaction_done",
        None,
        rt.failure.clone(),
        started,
    ));
    ctx.tk.append_network_events(events);
    ctx.tk
        .append_request(transaction_record(tr, params, &request, alpn, &rt, started));
    ol.stop(rt.failure.as_deref());

    if let Some(response) = &rt.response {
        store_cookies(ctx, &params.url, response);
    }
    match rt.failure {
        Some(_) => None,
        None => rt.response,
    }
}

/// Spawns a new resolvers task for the `Location` of a redirect response.
pub fn maybe_follow_redirect(ctx: &MeasurementContext, params: &FlowParams, response: &HttpInner) {
    if !params.follow_redirects || !response.is_redirect() {
        return;
    }
    let Some(location) = response.location() else {
        debug!("redirect from {} without Location", params.url);
        return;
    };
    let target = match params.url.join(location) {
        Ok(target) => target,
        Err(e) => {
            warn!("cannot parse redirect location {:?}: {}", location, e);
            return;
        }
    };
    if target.scheme() != "http" && target.scheme() != "https" {
        warn!("not following redirect to {}", target);
        return;
    }
    if !ctx.redirects.can_follow_one_more_redirect() {
        info!("redirect budget exhausted, not following {}", target);
        return;
    }
    info!("following redirect {} -> {}", params.url, target);
    DnsResolvers::new(
        ctx.clone(),
        target,
        Some(params.url.to_string()),
        params.depth + 1,
    )
    .start();
}
