// File: secureflow.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::debug;
use rustls::ServerName;

use crate::context::MeasurementContext;
use crate::flow::{flow_failure, http_fetch, maybe_follow_redirect, tcp_connect, FlowParams};
use crate::http::url_hostname;
use crate::tls;
use crate::trace::OperationLogger;

/// TCP connect, TLS handshake and, when granted priority, a GET over TLS.
pub struct SecureFlow {
    ctx: MeasurementContext,
    params: FlowParams,
}

impl SecureFlow {
    pub fn new(ctx: MeasurementContext, params: FlowParams) -> Self {
        Self { ctx, params }
    }

    pub fn start(self) {
        let tasks = self.ctx.tasks.clone();
        tasks.spawn(self.run());
    }

    async fn run(self) {
        let tr = self.ctx.new_trace(self.params.depth);
        let Some(tcp) = tcp_connect(&self.ctx, &tr, self.params.address).await else {
            return;
        };

        let Some(sni) = url_hostname(&self.params.url) else {
            flow_failure(
                &self.ctx,
                self.params.referer.as_deref(),
                format!("no hostname in {}", self.params.url),
            );
            return;
        };
        let server_name = match ServerName::try_from(sni.as_str()) {
            Ok(name) => name,
            Err(e) => {
                flow_failure(
                    &self.ctx,
                    self.params.referer.as_deref(),
                    format!("invalid SNI {:?}: {}", sni, e),
                );
                return;
            }
        };

        let endpoint = self.params.endpoint();
        let ol = OperationLogger::new(
            tr.index(),
            format!(
                "TLSHandshake with {} SNI={} ALPN={:?}",
                endpoint,
                sni,
                self.ctx.config.alpn()
            ),
        );
        let result = tls::handshake(
            self.ctx.tls_config.clone(),
            tcp,
            server_name,
            &sni,
            &endpoint,
            self.ctx.config.tls_timeout(),
            &tr,
        )
        .await;
        ol.stop(result.failure());

        let alpn = result.record.negotiated_protocol.clone();
        self.ctx.tk.append_network_events(result.events);
        self.ctx.tk.append_tls_handshake(result.record);
        let Some(stream) = result.stream else {
            return;
        };

        if !self.params.permission_to_fetch() {
            debug!("[#{}] stop after TLS handshake with {}", tr.index(), endpoint);
            return;
        }

        if let Some(response) = http_fetch(&self.ctx, &tr, &self.params, stream, &alpn).await {
            maybe_follow_redirect(&self.ctx, &self.params, &response);
        }
    }
}
