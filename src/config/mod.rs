// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

mod timing;

pub use self::timing::Timing;

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

pub const CONFIG_PATH: &str = "/etc/dp-gpio-hpd/config.toml";

/// Symbolic name the HPD line is looked up by.
pub const HPD_GPIO_NAME: &str = "qcom,dp-hpd-gpio";

/// Location of a GPIO line on a character device.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct LineSpec {
    pub chip:   PathBuf,
    pub offset: u32,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct HpdConfig {
    #[serde(default)]
    pub lines: BTreeMap<String, LineSpec>,

    #[serde(default)]
    pub timing: Timing,
}

impl HpdConfig {
    /// Reads the config at `path`, falling back to the defaults when it does not exist.
    pub fn new(path: &Path) -> io::Result<Self> {
        if !path.exists() {
            log::info!("config file does not exist at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        Self::read(path)
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        let buffer = fs::read_to_string(path)?;
        Self::parse(&buffer)
    }

    pub fn parse(buffer: &str) -> io::Result<Self> {
        toml::from_str(buffer).map_err(|why| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize hpd config: {}", why),
            )
        })
    }

    pub fn line(&self, name: &str) -> Option<&LineSpec> { self.lines.get(name) }

    pub fn with_line(mut self, name: &str, spec: LineSpec) -> Self {
        self.lines.insert(name.into(), spec);
        self
    }
}
