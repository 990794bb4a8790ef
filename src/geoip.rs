// File: geoip.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::{debug, info};
use lru::LruCache;
use serde::Deserialize;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;

use crate::errors::ProbeResult;

const CACHE_CAPACITY: usize = 4096;

/// Resolves an address to `(asn, organization)`. Unknown addresses map
/// to `(0, "")`.
pub trait AsnLookup: Send + Sync {
    fn lookup(&self, addr: IpAddr) -> (u32, String);
}

/// Used when no ASN database is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAsnLookup;

impl AsnLookup for NullAsnLookup {
    fn lookup(&self, _addr: IpAddr) -> (u32, String) {
        (0, String::new())
    }
}

#[derive(Debug, Deserialize)]
struct AsnRecord {
    autonomous_system_number: Option<u32>,
    autonomous_system_organization: Option<String>,
}

pub struct MmdbAsnLookup {
    reader: maxminddb::Reader<Vec<u8>>,
    cache: Mutex<LruCache<IpAddr, (u32, String)>>,
}

impl MmdbAsnLookup {
    pub fn open(path: &Path) -> ProbeResult<Self> {
        let data = std::fs::read(path)?;
        let reader = maxminddb::Reader::from_source(data)?;
        info!("Loaded ASN database from {}", path.display());
        let cap = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            reader,
            cache: Mutex::new(LruCache::new(cap)),
        })
    }
}

impl AsnLookup for MmdbAsnLookup {
    fn lookup(&self, addr: IpAddr) -> (u32, String) {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&addr) {
                return cached.clone();
            }
        }

        let result = match self.reader.lookup::<AsnRecord>(addr) {
            Ok(record) => (
                record.autonomous_system_number.unwrap_or(0),
                record.autonomous_system_organization.unwrap_or_default(),
            ),
            Err(e) => {
                debug!("ASN lookup for {} failed: {}", addr, e);
                (0, String::new())
            }
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(addr, result.clone());
        }
        result
    }
}
