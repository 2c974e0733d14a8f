// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use clap::Parser;

mod daemon;
mod probe;

/// DisplayPort hot-plug-detect monitor for GPIO-backed HPD lines
#[derive(Parser)]
#[command(name = "dp-gpio-hpd", version, about)]
pub enum Command {
    Daemon(daemon::Command),
    Probe(probe::Command),
}

impl Command {
    pub fn run(&self) -> anyhow::Result<()> {
        match self {
            Self::Daemon(command) => command.run(),
            Self::Probe(command) => command.run(),
        }
    }
}
