// File: dnscache.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};

pub const DNS_ADDR_FLAG_SYSTEM_RESOLVER: u8 = 1 << 0;
pub const DNS_ADDR_FLAG_UDP: u8 = 1 << 1;
pub const DNS_ADDR_FLAG_HTTPS: u8 = 1 << 2;

/// An address plus the resolvers that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsEntry {
    pub addr: IpAddr,
    pub flags: u8,
}

impl DnsEntry {
    pub fn from_system_resolver(&self) -> bool {
        self.flags & DNS_ADDR_FLAG_SYSTEM_RESOLVER != 0
    }
}

/// Merges the three resolver outputs. The result is deduplicated, keeps
/// insertion order within each family and places IPv4 before IPv6.
pub fn merge_addresses(system: &[IpAddr], udp: &[IpAddr], https: &[IpAddr]) -> Vec<DnsEntry> {
    let mut entries: Vec<DnsEntry> = Vec::new();
    let mut index: HashMap<IpAddr, usize> = HashMap::new();
    let sources = [
        (system, DNS_ADDR_FLAG_SYSTEM_RESOLVER),
        (udp, DNS_ADDR_FLAG_UDP),
        (https, DNS_ADDR_FLAG_HTTPS),
    ];
    for (addrs, flag) in sources {
        for addr in addrs {
            match index.get(addr) {
                Some(&pos) => entries[pos].flags |= flag,
                None => {
                    index.insert(*addr, entries.len());
                    entries.push(DnsEntry {
                        addr: *addr,
                        flags: flag,
                    });
                }
            }
        }
    }
    // stable sort keeps insertion order within a family
    entries.sort_by_key(|entry| entry.addr.is_ipv6());
    entries
}

/// Domain to addresses memo shared across redirect hops. Entries never expire.
#[derive(Debug, Default)]
pub struct DnsCache {
    entries: Mutex<HashMap<String, Vec<DnsEntry>>>,
}

impl DnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, domain: &str) -> Option<Vec<DnsEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(domain)
            .cloned()
    }

    pub fn set(&self, domain: &str, entries: Vec<DnsEntry>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(domain.to_string(), entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_merge_dedups_and_orders_families() {
        let system = vec![ip("2001:4860::1"), ip("1.1.1.1")];
        let udp = vec![ip("1.1.1.1"), ip("2.2.2.2")];
        let https = vec![ip("2001:4860::1"), ip("3.3.3.3")];
        let merged = merge_addresses(&system, &udp, &https);

        let addrs: Vec<IpAddr> = merged.iter().map(|e| e.addr).collect();
        assert_eq!(
            addrs,
            vec![ip("1.1.1.1"), ip("2.2.2.2"), ip("3.3.3.3"), ip("2001:4860::1")]
        );
        assert_eq!(merged[0].flags, DNS_ADDR_FLAG_SYSTEM_RESOLVER | DNS_ADDR_FLAG_UDP);
        assert_eq!(merged[1].flags, DNS_ADDR_FLAG_UDP);
        assert_eq!(merged[2].flags, DNS_ADDR_FLAG_HTTPS);
        assert_eq!(
            merged[3].flags,
            DNS_ADDR_FLAG_SYSTEM_RESOLVER | DNS_ADDR_FLAG_HTTPS
        );
        assert!(merged[0].from_system_resolver());
        assert!(!merged[1].from_system_resolver());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let system = vec![ip("::1"), ip("10.0.0.1")];
        let udp = vec![ip("10.0.0.2")];
        let https = vec![];
        let a = merge_addresses(&system, &udp, &https);
        let b = merge_addresses(&system, &udp, &https);
        assert_eq!(a, b);
        let v4_done = a.iter().position(|e| e.addr.is_ipv6()).unwrap();
        assert!(a[v4_done..].iter().all(|e| e.addr.is_ipv6()));
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_addresses(&[], &[], &[]).is_empty());
    }

    #[test]
    fn test_cache_roundtrip() {
        let cache = DnsCache::new();
        assert!(cache.get("example.com").is_none());
        let entries = merge_addresses(&[ip("1.2.3.4")], &[], &[]);
        cache.set("example.com", entries.clone());
        assert_eq!(cache.get("example.com"), Some(entries));
    }
}
