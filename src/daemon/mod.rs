// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use anyhow::Context;
use serde::Serialize;
use std::{
    io::{self, Write},
    path::Path,
    sync::Arc,
};

use crate::{
    config::HpdConfig,
    hotplug::{cdev::CdevProvider, HpdCallbacks, HpdDetector, HpdDevice, HpdStatus},
};
use tokio::sync::watch;

mod interrupt;

/// One line of the daemon's event stream on stdout.
#[derive(Debug, PartialEq, Eq, Serialize)]
struct Event<'a> {
    line:  &'a str,
    event: &'static str,
}

fn format_event(line: &str, event: &'static str) -> io::Result<String> {
    serde_json::to_string(&Event { line, event }).map_err(io::Error::from)
}

fn emit(line: &str, event: &'static str) -> io::Result<()> {
    let json = format_event(line, event)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    stdout.flush()
}

/// Callbacks standing in for the display stack: every event is reported on stdout.
fn callbacks(line: &str) -> HpdCallbacks {
    let line: Arc<str> = Arc::from(line);
    let (configure, disconnect, attention) = (line.clone(), line.clone(), line);

    HpdCallbacks::new()
        .on_configure(move || emit(&configure, "connect"))
        .on_disconnect(move || emit(&disconnect, "disconnect"))
        .on_attention(move || emit(&attention, "attention"))
}

fn format_status(status: &HpdStatus) -> io::Result<String> {
    serde_json::to_string(status).map_err(io::Error::from)
}

/// Logs the line state after every worker step, until the worker stops.
async fn log_status(mut updates: watch::Receiver<HpdStatus>) {
    while updates.changed().await.is_ok() {
        let status = updates.borrow_and_update().clone();
        match format_status(&status) {
            Ok(json) => log::debug!("{}: status {}", status.name, json),
            Err(why) => log::warn!("{}: failed to format status: {}", status.name, why),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
pub async fn daemon(config_path: &Path) -> anyhow::Result<()> {
    log::info!("Starting daemon with config {}", config_path.display());
    let config = HpdConfig::new(config_path)
        .with_context(|| format!("failed to read config at {}", config_path.display()))?;

    let provider = CdevProvider;
    let device = HpdDevice::new(&config, &provider);
    let detector = HpdDetector::initialize(&device, callbacks(device.gpio_name()))?;
    tokio::spawn(log_status(detector.subscribe()));

    let sig = interrupt::wait().await.context("failed to install signal handlers")?;
    log::info!("caught signal: {}", sig);

    let status = detector.status();
    log::info!(
        "{}: stopping with hpd {} on {:?} edge",
        detector.name(),
        if status.hpd_high { "high" } else { "low" },
        status.current_edge
    );

    detector.teardown().await;
    Ok(())
}
