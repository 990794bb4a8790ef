// File: cleartextflow.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::debug;

use crate::context::MeasurementContext;
use crate::flow::{http_fetch, maybe_follow_redirect, tcp_connect, FlowParams};

/// TCP connect and, when granted priority, a plaintext GET.
pub struct CleartextFlow {
    ctx: MeasurementContext,
    params: FlowParams,
}

impl CleartextFlow {
    pub fn new(ctx: MeasurementContext, params: FlowParams) -> Self {
        Self { ctx, params }
    }

    pub fn start(self) {
        let tasks = self.ctx.tasks.clone();
        tasks.spawn(self.run());
    }

    async fn run(self) {
        let tr = self.ctx.new_trace(self.params.depth);
        let Some(stream) = tcp_connect(&self.ctx, &tr, self.params.address).await else {
            return;
        };

        if !self.params.permission_to_fetch() {
            debug!(
                "[#{}] stop after TCP connect to {}",
                tr.index(),
                self.params.endpoint()
            );
            return;
        }

        if let Some(response) = http_fetch(&self.ctx, &tr, &self.params, stream, "").await {
            maybe_follow_redirect(&self.ctx, &self.params, &response);
        }
    }
}
