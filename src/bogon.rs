// File: bogon.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use ipnet::IpNet;
use once_cell::sync::Lazy;
use std::net::IpAddr;

const BOGON_CIDRS: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "255.255.255.255/32",
    "::/128",
    "::1/128",
    "100::/64",
    "2001:2::/48",
    "2001:10::/28",
    "2001:db8::/32",
    "fc00::/7",
    "fe80::/10",
    "ff00::/8",
];

static BOGONS: Lazy<Vec<IpNet>> = Lazy::new(|| {
    BOGON_CIDRS
        .iter()
        .filter_map(|cidr| cidr.parse::<IpNet>().ok())
        .collect()
});

pub fn is_bogon(addr: IpAddr) -> bool {
    BOGONS.iter().any(|net| net.contains(&addr))
}

/// Like [`is_bogon`] but for textual addresses; unparseable input is not a bogon.
pub fn is_bogon_str(addr: &str) -> bool {
    addr.parse().map(is_bogon).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[test]
    fn test_all_cidrs_parse() {
        assert_eq!(BOGONS.len(), BOGON_CIDRS.len());
    }

    #[rstest]
    #[case("10.0.0.1", true)]
    #[case("127.0.0.1", true)]
    #[case("192.168.1.1", true)]
    #[case("100.64.0.1", true)]
    #[case("::1", true)]
    #[case("fe80::1", true)]
    #[case("2001:db8::1", true)]
    #[case("93.184.216.34", false)]
    #[case("8.8.8.8", false)]
    #[case("2606:2800:220:1:248:1893:25c8:1946", false)]
    fn test_is_bogon(#[case] addr: &str, #[case] expected: bool) {
        assert_eq!(is_bogon_str(addr), expected);
    }

    #[test]
    fn test_garbage_is_not_bogon() {
        assert!(!is_bogon_str("not-an-ip"));
    }
}
