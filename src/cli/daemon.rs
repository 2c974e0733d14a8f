// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use clap::Args;
use dp_gpio_hpd::{config::CONFIG_PATH, logging};
use log::LevelFilter;
use std::path::PathBuf;

/// Watches the configured HPD line and reports connect, disconnect and attention events as
/// JSON lines on stdout until a termination signal arrives
#[derive(Args)]
#[command(about = "Runs the hpd detector on the configured gpio line")]
pub struct Command {
    /// Path to the configuration file
    #[arg(long, short, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Set the verbosity of daemon logs to 'off' [default is 'info']
    #[arg(long, short, group = "verbosity")]
    quiet: bool,

    /// Set the verbosity of daemon logs to 'debug' [default is 'info']
    #[arg(long, short, group = "verbosity")]
    verbose: bool,
}

impl Command {
    pub fn run(&self) -> anyhow::Result<()> {
        let level = if self.quiet {
            LevelFilter::Off
        } else if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };

        logging::setup(level).unwrap_or_else(|why| {
            eprintln!("failed to set up logging: {}", why);
            std::process::exit(1);
        });

        dp_gpio_hpd::daemon::daemon(&self.config)
    }
}
