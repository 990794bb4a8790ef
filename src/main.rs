// File: main.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use simple_logger::SimpleLogger;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use wcprobe::cli::Cli;
use wcprobe::geoip::{AsnLookup, MmdbAsnLookup, NullAsnLookup};
use wcprobe::measurer::{Callbacks, EXPERIMENT_NAME};
use wcprobe::registry::ExperimentRegistry;
use wcprobe::testkeys::{Blocking, TestKeys};

struct SpinnerCallbacks {
    pb: ProgressBar,
}

impl Callbacks for SpinnerCallbacks {
    fn on_progress(&self, percentage: f64, message: &str) {
        self.pb
            .set_message(format!("{:>3.0}% {}", percentage * 100.0, message));
    }
}

fn verdict_line(url: &str, tk: &TestKeys) -> String {
    let verdict = match (&tk.blocking, tk.accessible) {
        (Blocking::NotBlocked, Some(true)) => "ACCESSIBLE".green().bold(),
        (Blocking::NotBlocked, _) => "DOWN (not blocked)".yellow().bold(),
        (Blocking::Reason(reason), _) => format!("BLOCKED ({})", reason).red().bold(),
        (Blocking::Unknown, _) => "UNKNOWN".yellow(),
    };
    format!("{}: {}", url, verdict)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    SimpleLogger::new()
        .with_level(cli.level_filter())
        .init()
        .context("cannot initialize the logger")?;
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = cli.config();
    let asn: Arc<dyn AsnLookup> = match config.asn_database() {
        Some(path) => Arc::new(
            MmdbAsnLookup::open(path)
                .with_context(|| format!("cannot open ASN database {}", path.display()))?,
        ),
        None => Arc::new(NullAsnLookup),
    };
    let registry = ExperimentRegistry::with_known_experiments(config, asn);
    let measurer = registry
        .get(EXPERIMENT_NAME)
        .context("web_connectivity is not registered")?;
    info!("{} {}", measurer.name(), measurer.version());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling the measurement");
            interrupt.cancel();
        }
    });

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let callbacks = SpinnerCallbacks { pb: pb.clone() };
    let result = measurer.run(&cli.url, &callbacks, cancel).await;
    pb.finish_and_clear();

    let tk = result.with_context(|| format!("cannot measure {}", cli.url))?;
    println!("{}", serde_json::to_string_pretty(&tk)?);
    eprintln!("{}", verdict_line(&cli.url, &tk));
    Ok(())
}
