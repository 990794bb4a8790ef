// File: priority.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::info;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::archival::ConnPriorityLogEntry;
use crate::dnscache::{DnsEntry, DNS_ADDR_FLAG_SYSTEM_RESOLVER};
use crate::testkeys::TestKeysStore;

/// Decides which single flow may fetch the page body. The permit is
/// consumed on first grant and never re-armed.
#[derive(Debug)]
pub struct PrioritySelector {
    permit: Semaphore,
    flags: HashMap<IpAddr, u8>,
    zero_time: Instant,
    tk: TestKeysStore,
}

impl PrioritySelector {
    pub fn new(entries: &[DnsEntry], zero_time: Instant, tk: TestKeysStore) -> Self {
        Self {
            permit: Semaphore::new(1),
            flags: entries.iter().map(|e| (e.addr, e.flags)).collect(),
            zero_time,
            tk,
        }
    }

    fn log(&self, msg: String) {
        info!("{}", msg);
        self.tk.append_conn_priority_log(ConnPriorityLogEntry {
            msg,
            t: self.zero_time.elapsed().as_secs_f64(),
        });
    }

    pub fn permission_to_fetch(&self, addr: IpAddr) -> bool {
        let from_system = self
            .flags
            .get(&addr)
            .map(|flags| flags & DNS_ADDR_FLAG_SYSTEM_RESOLVER != 0)
            .unwrap_or(false);
        if !from_system {
            self.log(format!("prio: deny {}: not from system resolver", addr));
            return false;
        }
        match self.permit.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.log(format!("prio: grant {}", addr));
                true
            }
            Err(_) => {
                self.log(format!("prio: deny {}: permit already taken", addr));
                false
            }
        }
    }
}
