// File: http.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! A single HTTP/1.1 GET sent over an already established connection.

use hyper::body::HttpBody as _;
use hyper::client::conn;
use hyper::{Body, Method, Request};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite};
use url::{Host, Position, Url};

use crate::archival::{HeaderList, MaybeBinary};
use crate::failure::{classify_hyper_error, unknown_failure};
use crate::httpinner::HttpInner;

#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    pub url: Url,
    pub host_header: String,
    pub accept: String,
    pub accept_language: String,
    pub user_agent: String,
    pub referer: Option<String>,
    pub cookie: Option<String>,
}

impl HttpRequestSpec {
    pub fn path_and_query(&self) -> &str {
        let path = &self.url[Position::BeforePath..Position::AfterQuery];
        if path.is_empty() {
            "/"
        } else {
            path
        }
    }

    pub fn headers_list(&self) -> HeaderList {
        let mut headers: HeaderList = vec![
            ("Accept".to_string(), self.accept.as_str().into()),
            (
                "Accept-Language".to_string(),
                self.accept_language.as_str().into(),
            ),
            ("Host".to_string(), self.host_header.as_str().into()),
        ];
        if let Some(referer) = &self.referer {
            headers.push(("Referer".to_string(), referer.as_str().into()));
        }
        headers.push(("User-Agent".to_string(), self.user_agent.as_str().into()));
        if let Some(cookie) = &self.cookie {
            headers.push(("Cookie".to_string(), cookie.as_str().into()));
        }
        headers
    }

    pub fn to_request(&self) -> Result<Request<Body>, hyper::http::Error> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(self.path_and_query());
        for (key, MaybeBinary(value)) in self.headers_list() {
            builder = builder.header(key.as_str(), value.as_slice());
        }
        builder.header("Connection", "close").body(Body::empty())
    }
}

/// `Host` header value: hostname plus the port when it is not the default.
pub fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Hostname used for DNS and SNI; IPv6 literals come without brackets.
pub fn url_hostname(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) if !domain.is_empty() => Some(domain.to_string()),
        Host::Domain(_) => None,
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

/// `content-type` becomes `Content-Type`.
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Outcome of a round trip. A response may be present together with a
/// failure when the body could not be read completely.
#[derive(Debug, Default)]
pub struct RoundTrip {
    pub response: Option<HttpInner>,
    pub failure: Option<String>,
}

impl RoundTrip {
    fn failed(failure: String) -> Self {
        Self {
            response: None,
            failure: Some(failure),
        }
    }
}

pub async fn round_trip<S>(stream: S, request: &HttpRequestSpec, max_body: usize) -> RoundTrip
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let req = match request.to_request() {
        Ok(req) => req,
        Err(e) => return RoundTrip::failed(unknown_failure(e)),
    };
    let (mut sender, connection) = match conn::Builder::new()
        .http1_title_case_headers(true)
        .handshake::<S, Body>(stream)
        .await
    {
        Ok(parts) => parts,
        Err(e) => return RoundTrip::failed(classify_hyper_error(&e)),
    };
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            trace!("connection closed: {}", e);
        }
    });

    let response = match sender.send_request(req).await {
        Ok(response) => response,
        Err(e) => return RoundTrip::failed(classify_hyper_error(&e)),
    };
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (canonical_header_name(k.as_str()), v.as_bytes().to_vec()))
        .collect::<Vec<_>>();
    let mut inner = HttpInner::new(response.status().as_u16(), headers);
    trace!(
        "{} answered {} with {} headers",
        request.url,
        inner.status(),
        inner.headers().len()
    );

    let mut body = response.into_body();
    let mut buf: Vec<u8> = Vec::new();
    let mut truncated = false;
    let mut failure = None;
    while let Some(frame) = body.data().await {
        match frame {
            Ok(chunk) => {
                buf.extend_from_slice(&chunk);
                if buf.len() > max_body {
                    buf.truncate(max_body);
                    truncated = true;
                    break;
                }
            }
            Err(e) => {
                failure = Some(classify_hyper_error(&e));
                break;
            }
        }
    }

    debug!(
        "{}: read {} body bytes (truncated: {})",
        request.url,
        buf.len(),
        truncated
    );
    inner.set_body(buf, truncated);
    RoundTrip {
        response: Some(inner),
        failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::EOF_ERROR;
    use pretty_assertions::assert_eq;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn spec(url: &str) -> HttpRequestSpec {
        let url = Url::parse(url).unwrap();
        HttpRequestSpec {
            host_header: host_header(&url),
            url,
            accept: "*/*".to_string(),
            accept_language: "en".to_string(),
            user_agent: "wcprobe-test".to_string(),
            referer: None,
            cookie: None,
        }
    }

    /// Answers the first request with `response` and returns what the
    /// client sent.
    async fn serve(
        response: &'static [u8],
        request: HttpRequestSpec,
        max: usize,
    ) -> (RoundTrip, String) {
        let (client, mut server) = duplex(1 << 20);
        let server_task = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let n = server.read(&mut buf).await.unwrap();
            server.write_all(response).await.unwrap();
            server.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        let result = round_trip(client, &request, max).await;
        let sent = server_task.await.unwrap();
        (result, sent)
    }

    #[test]
    fn test_request_headers() {
        let mut request = spec("http://example.com:8080/a/b?c=d");
        request.referer = Some("http://example.com/".to_string());
        let req = request.to_request().unwrap();
        assert_eq!(req.uri(), "/a/b?c=d");
        assert_eq!(req.headers()["host"], "example.com:8080");
        assert_eq!(req.headers()["referer"], "http://example.com/");
        assert_eq!(req.headers()["connection"], "close");
    }

    #[test]
    fn test_url_hostname() {
        let url = Url::parse("http://[::1]:8080/").unwrap();
        assert_eq!(url_hostname(&url), Some("::1".to_string()));
        let url = Url::parse("https://www.example.com/x").unwrap();
        assert_eq!(url_hostname(&url), Some("www.example.com".to_string()));
    }

    #[test]
    fn test_host_header_default_port() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(host_header(&url), "example.com");
        let url = Url::parse("http://[::1]:8080/").unwrap();
        assert_eq!(host_header(&url), "[::1]:8080");
    }

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("content-type"), "Content-Type");
        assert_eq!(canonical_header_name("x-cache"), "X-Cache");
        assert_eq!(canonical_header_name("SERVER"), "Server");
    }

    #[tokio::test]
    async fn test_round_trip_content_length() {
        let (rt, sent) = serve(
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nServer: test\r\n\r\nhello",
            spec("http://example.com/"),
            1024,
        )
        .await;
        assert!(sent.starts_with("GET / HTTP/1.1\r\n"));
        assert!(sent.contains("Host: example.com\r\n"));
        assert!(sent.contains("User-Agent: wcprobe-test\r\n"));
        assert_eq!(rt.failure, None);
        let resp = rt.response.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body(), b"hello");
        assert!(!resp.body_is_truncated());
        assert_eq!(resp.header("server"), Some("test"));
        assert!(resp.headers_list().iter().any(|(k, _)| k == "Server"));
    }

    #[tokio::test]
    async fn test_round_trip_truncates_large_bodies() {
        let (rt, _) = serve(
            b"HTTP/1.1 200 OK\r\n\r\n0123456789abcdef",
            spec("http://example.com/"),
            8,
        )
        .await;
        let resp = rt.response.unwrap();
        assert_eq!(resp.body(), b"01234567");
        assert!(resp.body_is_truncated());
    }

    #[tokio::test]
    async fn test_round_trip_chunked() {
        let (rt, _) = serve(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n",
            spec("http://example.com/"),
            1024,
        )
        .await;
        assert_eq!(rt.failure, None);
        assert_eq!(rt.response.unwrap().body(), b"abc");
    }

    #[tokio::test]
    async fn test_round_trip_huge_chunk_size() {
        let (rt, _) = serve(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nffffffffffffffff\r\nab",
            spec("http://example.com/"),
            1024,
        )
        .await;
        assert!(rt.failure.is_some());
        let resp = rt.response.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.body().len() <= 2);
    }

    #[tokio::test]
    async fn test_round_trip_eof_before_headers() {
        let (rt, _) = serve(b"HTTP/1.1 200", spec("http://example.com/"), 1024).await;
        assert!(rt.response.is_none());
        assert_eq!(rt.failure.as_deref(), Some(EOF_ERROR));
    }

    #[tokio::test]
    async fn test_round_trip_short_body_is_eof() {
        let (rt, _) = serve(
            b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc",
            spec("http://example.com/"),
            1024,
        )
        .await;
        assert_eq!(rt.failure.as_deref(), Some(EOF_ERROR));
        assert_eq!(rt.response.unwrap().body(), b"abc");
    }
}
