// File: dnslookup.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! The three resolvers used to look up the target: the system resolver,
//! a plain UDP resolver and a DNS-over-HTTPS resolver.

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use log::debug;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::archival::{BinaryData, DnsAnswer, DnsLookup};
use crate::errors::ProbeResult;
use crate::failure::{
    classify_io_error, classify_reqwest_error, timeout_failure, unknown_failure,
    DNS_NO_ANSWER, DNS_NXDOMAIN_ERROR, DNS_REFUSED_ERROR, DNS_SERVER_FAILURE,
    DNS_SERVER_MISBEHAVING, HTTP_REQUEST_FAILED,
};
use crate::geoip::AsnLookup;
use crate::trace::{OperationLogger, Trace};

pub const ENGINE_SYSTEM: &str = "getaddrinfo";
pub const ENGINE_UDP: &str = "udp";
pub const ENGINE_DOH: &str = "doh";

const DNS_TEMPORARY_FAILURE: &str = "dns_temporary_failure";
const MAX_UDP_RESPONSE: usize = 4096;

/// Records produced by one resolver plus the addresses it returned.
#[derive(Debug, Default)]
pub struct LookupOutcome {
    pub queries: Vec<DnsLookup>,
    pub addrs: Vec<IpAddr>,
}

struct QueryRecord<'a> {
    domain: &'a str,
    engine: &'a str,
    resolver_address: &'a str,
    query_type: &'a str,
    started: Instant,
}

impl QueryRecord<'_> {
    fn finish(
        &self,
        tr: &Trace,
        answers: Vec<DnsAnswer>,
        failure: Option<String>,
        raw: Option<&[u8]>,
        rcode: i64,
    ) -> DnsLookup {
        DnsLookup {
            answers,
            engine: self.engine.to_string(),
            failure,
            hostname: self.domain.to_string(),
            query_type: self.query_type.to_string(),
            raw_response: raw.map(BinaryData::from_bytes),
            rcode,
            resolver_hostname: None,
            resolver_port: None,
            resolver_address: self.resolver_address.to_string(),
            t0: tr.since_zero(self.started),
            t: tr.now(),
            tags: tr.tags(),
            transaction_id: tr.index(),
        }
    }
}

fn annotate(addr: IpAddr, ttl: Option<u32>, asn: &dyn AsnLookup) -> DnsAnswer {
    let (number, org) = asn.lookup(addr);
    DnsAnswer::from_ip(addr, ttl, number, org)
}

fn dedup(addrs: &mut Vec<IpAddr>) {
    let mut seen = std::collections::HashSet::new();
    addrs.retain(|a| seen.insert(*a));
}

fn classify_getaddrinfo_error(err: &std::io::Error) -> String {
    let msg = err.to_string();
    if msg.contains("not known")
        || msg.contains("nodename nor servname")
        || msg.contains("No such host")
    {
        DNS_NXDOMAIN_ERROR.to_string()
    } else if msg.contains("No address associated") {
        DNS_NO_ANSWER.to_string()
    } else if msg.contains("Temporary failure") {
        DNS_TEMPORARY_FAILURE.to_string()
    } else {
        classify_io_error(err)
    }
}

pub async fn lookup_system(
    domain: &str,
    tr: &Trace,
    asn: &dyn AsnLookup,
    lookup_timeout: Duration,
) -> LookupOutcome {
    let ol = OperationLogger::new(tr.index(), format!("lookup {} using getaddrinfo", domain));
    let record = QueryRecord {
        domain,
        engine: ENGINE_SYSTEM,
        resolver_address: "",
        query_type: "ANY",
        started: Instant::now(),
    };

    let result = match timeout(lookup_timeout, tokio::net::lookup_host((domain, 0u16))).await {
        Ok(Ok(iter)) => {
            let mut addrs: Vec<IpAddr> = iter.map(|sa| sa.ip()).collect();
            dedup(&mut addrs);
            if addrs.is_empty() {
                Err(DNS_NO_ANSWER.to_string())
            } else {
                Ok(addrs)
            }
        }
        Ok(Err(e)) => Err(classify_getaddrinfo_error(&e)),
        Err(_) => Err(timeout_failure()),
    };

    match result {
        Ok(addrs) => {
            let answers = addrs.iter().map(|a| annotate(*a, None, asn)).collect();
            ol.stop(None);
            LookupOutcome {
                queries: vec![record.finish(tr, answers, None, None, 0)],
                addrs,
            }
        }
        Err(failure) => {
            ol.stop(Some(&failure));
            LookupOutcome {
                queries: vec![record.finish(tr, Vec::new(), Some(failure), None, 0)],
                addrs: Vec::new(),
            }
        }
    }
}

pub fn build_query(domain: &str, qtype: RecordType, id: u16) -> ProbeResult<Vec<u8>> {
    let mut name = Name::from_ascii(domain)?;
    name.set_fqdn(true);
    let mut msg = Message::new();
    msg.set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name, qtype));
    Ok(msg.to_vec()?)
}

/// Parsed answer section of a response for `qtype`.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedResponse {
    pub addrs: Vec<(IpAddr, u32)>,
    pub cnames: Vec<(String, u32)>,
    pub rcode: i64,
    pub failure: Option<String>,
}

fn rcode_failure(code: ResponseCode) -> Option<&'static str> {
    match code {
        ResponseCode::NoError => None,
        ResponseCode::NXDomain => Some(DNS_NXDOMAIN_ERROR),
        ResponseCode::Refused => Some(DNS_REFUSED_ERROR),
        ResponseCode::ServFail => Some(DNS_SERVER_FAILURE),
        _ => Some(DNS_SERVER_MISBEHAVING),
    }
}

pub fn parse_response(raw: &[u8], qtype: RecordType) -> ParsedResponse {
    let msg = match Message::from_vec(raw) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("cannot parse DNS response: {}", e);
            return ParsedResponse {
                failure: Some(DNS_SERVER_MISBEHAVING.to_string()),
                ..Default::default()
            };
        }
    };
    let mut parsed = ParsedResponse {
        rcode: u16::from(msg.response_code()) as i64,
        ..Default::default()
    };
    if msg.message_type() != MessageType::Response {
        parsed.failure = Some(DNS_SERVER_MISBEHAVING.to_string());
        return parsed;
    }
    if let Some(failure) = rcode_failure(msg.response_code()) {
        parsed.failure = Some(failure.to_string());
        return parsed;
    }
    for record in msg.answers() {
        match record.data() {
            Some(RData::A(a)) if qtype == RecordType::A => {
                parsed.addrs.push((IpAddr::V4(a.0), record.ttl()));
            }
            Some(RData::AAAA(aaaa)) if qtype == RecordType::AAAA => {
                parsed.addrs.push((IpAddr::V6(aaaa.0), record.ttl()));
            }
            Some(RData::CNAME(cname)) => {
                parsed.cnames.push((cname.0.to_utf8(), record.ttl()));
            }
            _ => {}
        }
    }
    if parsed.addrs.is_empty() {
        parsed.failure = Some(DNS_NO_ANSWER.to_string());
    }
    parsed
}

fn qtype_name(qtype: RecordType) -> &'static str {
    match qtype {
        RecordType::AAAA => "AAAA",
        _ => "A",
    }
}

fn finish_parsed(
    record: &QueryRecord<'_>,
    tr: &Trace,
    raw: &[u8],
    parsed: ParsedResponse,
    asn: &dyn AsnLookup,
    addrs: &mut Vec<IpAddr>,
) -> DnsLookup {
    let mut answers: Vec<DnsAnswer> = parsed
        .cnames
        .into_iter()
        .map(|(name, ttl)| DnsAnswer::cname(name, Some(ttl)))
        .collect();
    for (addr, ttl) in parsed.addrs {
        answers.push(annotate(addr, Some(ttl), asn));
        addrs.push(addr);
    }
    record.finish(tr, answers, parsed.failure, Some(raw), parsed.rcode)
}

async fn udp_exchange(server: SocketAddr, query: &[u8], id: u16) -> std::io::Result<Vec<u8>> {
    let bind = match server {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.connect(server).await?;
    socket.send(query).await?;
    let mut buf = vec![0u8; MAX_UDP_RESPONSE];
    loop {
        let n = socket.recv(&mut buf).await?;
        // late or spoofed replies with another id are skipped
        if n >= 2 && u16::from_be_bytes([buf[0], buf[1]]) == id {
            buf.truncate(n);
            return Ok(buf);
        }
    }
}

async fn udp_query(
    domain: &str,
    server: &str,
    qtype: RecordType,
    tr: &Trace,
    asn: &dyn AsnLookup,
    lookup_timeout: Duration,
    addrs: &mut Vec<IpAddr>,
) -> DnsLookup {
    let record = QueryRecord {
        domain,
        engine: ENGINE_UDP,
        resolver_address: server,
        query_type: qtype_name(qtype),
        started: Instant::now(),
    };
    let server_addr: SocketAddr = match server.parse() {
        Ok(addr) => addr,
        Err(e) => return record.finish(tr, Vec::new(), Some(unknown_failure(e)), None, 0),
    };
    let id: u16 = rand::random();
    let query = match build_query(domain, qtype, id) {
        Ok(q) => q,
        Err(e) => return record.finish(tr, Vec::new(), Some(unknown_failure(e)), None, 0),
    };
    match timeout(lookup_timeout, udp_exchange(server_addr, &query, id)).await {
        Ok(Ok(raw)) => {
            let parsed = parse_response(&raw, qtype);
            finish_parsed(&record, tr, &raw, parsed, asn, addrs)
        }
        Ok(Err(e)) => record.finish(tr, Vec::new(), Some(classify_io_error(&e)), None, 0),
        Err(_) => record.finish(tr, Vec::new(), Some(timeout_failure()), None, 0),
    }
}

pub async fn lookup_udp(
    domain: &str,
    server: &str,
    tr: &Trace,
    asn: &dyn AsnLookup,
    lookup_timeout: Duration,
) -> LookupOutcome {
    let ol = OperationLogger::new(tr.index(), format!("lookup {} using {}", domain, server));
    let mut v4 = Vec::new();
    let mut v6 = Vec::new();
    let (a, aaaa) = tokio::join!(
        udp_query(domain, server, RecordType::A, tr, asn, lookup_timeout, &mut v4),
        udp_query(domain, server, RecordType::AAAA, tr, asn, lookup_timeout, &mut v6),
    );
    finish_pair(ol, a, aaaa, v4, v6)
}

async fn doh_query(
    domain: &str,
    url: &str,
    client: &reqwest::Client,
    qtype: RecordType,
    tr: &Trace,
    asn: &dyn AsnLookup,
    lookup_timeout: Duration,
    addrs: &mut Vec<IpAddr>,
) -> DnsLookup {
    let record = QueryRecord {
        domain,
        engine: ENGINE_DOH,
        resolver_address: url,
        query_type: qtype_name(qtype),
        started: Instant::now(),
    };
    let query = match build_query(domain, qtype, 0) {
        Ok(q) => q,
        Err(e) => return record.finish(tr, Vec::new(), Some(unknown_failure(e)), None, 0),
    };
    let exchange = async {
        let response = client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/dns-message")
            .header(reqwest::header::ACCEPT, "application/dns-message")
            .body(query)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(HTTP_REQUEST_FAILED.to_string());
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| classify_reqwest_error(&e))
    };
    match timeout(lookup_timeout, exchange).await {
        Ok(Ok(raw)) => {
            let parsed = parse_response(&raw, qtype);
            finish_parsed(&record, tr, &raw, parsed, asn, addrs)
        }
        Ok(Err(failure)) => record.finish(tr, Vec::new(), Some(failure), None, 0),
        Err(_) => record.finish(tr, Vec::new(), Some(timeout_failure()), None, 0),
    }
}

pub async fn lookup_doh(
    domain: &str,
    url: &str,
    client: &reqwest::Client,
    tr: &Trace,
    asn: &dyn AsnLookup,
    lookup_timeout: Duration,
) -> LookupOutcome {
    let ol = OperationLogger::new(tr.index(), format!("lookup {} using {}", domain, url));
    let mut v4 = Vec::new();
    let mut v6 = Vec::new();
    let (a, aaaa) = tokio::join!(
        doh_query(domain, url, client, RecordType::A, tr, asn, lookup_timeout, &mut v4),
        doh_query(domain, url, client, RecordType::AAAA, tr, asn, lookup_timeout, &mut v6),
    );
    finish_pair(ol, a, aaaa, v4, v6)
}

fn finish_pair(
    ol: OperationLogger,
    a: DnsLookup,
    aaaa: DnsLookup,
    v4: Vec<IpAddr>,
    v6: Vec<IpAddr>,
) -> LookupOutcome {
    let mut addrs = v4;
    addrs.extend(v6);
    dedup(&mut addrs);
    if addrs.is_empty() {
        let failure = a.failure.clone().unwrap_or_else(|| DNS_NO_ANSWER.to_string());
        ol.stop(Some(&failure));
    } else {
        ol.stop(None);
    }
    LookupOutcome {
        queries: vec![a, aaaa],
        addrs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoip::NullAsnLookup;
    use hickory_proto::rr::rdata::{A, CNAME};
    use hickory_proto::rr::Record;
    use pretty_assertions::assert_eq;

    fn response(rcode: ResponseCode, records: Vec<Record>) -> Vec<u8> {
        let mut msg = Message::new();
        msg.set_id(42)
            .set_message_type(MessageType::Response)
            .set_response_code(rcode);
        for r in records {
            msg.add_answer(r);
        }
        msg.to_vec().unwrap()
    }

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    #[test]
    fn test_build_query_roundtrip() {
        let raw = build_query("example.com", RecordType::AAAA, 7).unwrap();
        let msg = Message::from_vec(&raw).unwrap();
        assert_eq!(msg.id(), 7);
        assert_eq!(msg.queries().len(), 1);
        assert_eq!(msg.queries()[0].query_type(), RecordType::AAAA);
        assert!(msg.recursion_desired());
    }

    #[test]
    fn test_parse_a_answers_and_cname() {
        let raw = response(
            ResponseCode::NoError,
            vec![
                Record::from_rdata(
                    name("www.example.com."),
                    300,
                    RData::CNAME(CNAME(name("example.com."))),
                ),
                Record::from_rdata(
                    name("example.com."),
                    60,
                    RData::A(A(Ipv4Addr::new(93, 184, 216, 34))),
                ),
            ],
        );
        let parsed = parse_response(&raw, RecordType::A);
        assert_eq!(parsed.failure, None);
        assert_eq!(
            parsed.addrs,
            vec![(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)), 60)]
        );
        assert_eq!(parsed.cnames, vec![("example.com.".to_string(), 300)]);
    }

    #[test]
    fn test_parse_failures() {
        let nx = parse_response(&response(ResponseCode::NXDomain, vec![]), RecordType::A);
        assert_eq!(nx.failure.as_deref(), Some(DNS_NXDOMAIN_ERROR));
        assert_eq!(nx.rcode, 3);

        let refused = parse_response(&response(ResponseCode::Refused, vec![]), RecordType::A);
        assert_eq!(refused.failure.as_deref(), Some(DNS_REFUSED_ERROR));

        let servfail = parse_response(&response(ResponseCode::ServFail, vec![]), RecordType::A);
        assert_eq!(servfail.failure.as_deref(), Some(DNS_SERVER_FAILURE));

        let empty = parse_response(&response(ResponseCode::NoError, vec![]), RecordType::AAAA);
        assert_eq!(empty.failure.as_deref(), Some(DNS_NO_ANSWER));

        let garbage = parse_response(b"\x00", RecordType::A);
        assert_eq!(garbage.failure.as_deref(), Some(DNS_SERVER_MISBEHAVING));
    }

    #[tokio::test]
    async fn test_udp_lookup_against_local_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 512];
            for _ in 0..2 {
                let (n, peer) = server.recv_from(&mut buf).await.unwrap();
                let query = Message::from_vec(&buf[..n]).unwrap();
                let mut reply = Message::new();
                reply
                    .set_id(query.id())
                    .set_message_type(MessageType::Response)
                    .set_response_code(ResponseCode::NoError);
                if query.queries()[0].query_type() == RecordType::A {
                    reply.add_answer(Record::from_rdata(
                        name("example.com."),
                        30,
                        RData::A(A(Ipv4Addr::new(10, 0, 0, 1))),
                    ));
                }
                server.send_to(&reply.to_vec().unwrap(), peer).await.unwrap();
            }
        });

        let tr = Trace::new(1, Instant::now(), vec![]);
        let outcome = lookup_udp(
            "example.com",
            &server_addr,
            &tr,
            &NullAsnLookup,
            Duration::from_secs(4),
        )
        .await;
        assert_eq!(outcome.addrs, vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))]);
        assert_eq!(outcome.queries.len(), 2);
        assert_eq!(outcome.queries[0].query_type, "A");
        assert_eq!(outcome.queries[0].engine, "udp");
        assert_eq!(outcome.queries[0].failure, None);
        assert_eq!(outcome.queries[1].failure.as_deref(), Some(DNS_NO_ANSWER));
        assert!(outcome.queries[0].raw_response.is_some());
    }

    #[tokio::test]
    async fn test_system_lookup_ip_literal() {
        let tr = Trace::new(1, Instant::now(), vec![]);
        let outcome = lookup_system("127.0.0.1", &tr, &NullAsnLookup, Duration::from_secs(4)).await;
        assert_eq!(outcome.addrs, vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);
        assert_eq!(outcome.queries[0].engine, "getaddrinfo");
        assert_eq!(outcome.queries[0].query_type, "ANY");
    }
}
