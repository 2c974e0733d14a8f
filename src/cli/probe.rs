// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use anyhow::Context;
use clap::Args;
use dp_gpio_hpd::{
    config::{HpdConfig, CONFIG_PATH, HPD_GPIO_NAME},
    hotplug::{cdev::CdevLine, HpdGpio},
    logging, HpdError,
};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Args)]
#[command(about = "Prints the current level of the configured hpd line")]
pub struct Command {
    /// Path to the configuration file
    #[arg(long, short, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Name of the line in the configuration
    #[arg(long, default_value = HPD_GPIO_NAME)]
    line: String,
}

impl Command {
    pub fn run(&self) -> anyhow::Result<()> {
        if let Err(why) = logging::setup(LevelFilter::Warn) {
            eprintln!("failed to set up logging: {}", why);
        }

        let config = HpdConfig::new(&self.config)
            .with_context(|| format!("failed to read config at {}", self.config.display()))?;
        let spec = config
            .line(&self.line)
            .ok_or_else(|| HpdError::ConfigurationMissing(self.line.clone()))?;

        let mut line = CdevLine::request(spec, "dp-hpd-probe")
            .with_context(|| format!("failed to request {}", self.line))?;

        let report = serde_json::json!({
            "line": self.line,
            "chip": spec.chip,
            "offset": spec.offset,
            "high": line.read_level(),
        });

        println!("{}", report);
        Ok(())
    }
}
