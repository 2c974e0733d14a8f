// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn settle_ms() -> u64 { 100 }

fn poll_count() -> u32 { 50 }

fn poll_interval_ms() -> u64 { 2 }

fn max_arm_attempts() -> u32 { 10 }

/// Debounce constants of the HPD protocol.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Timing {
    /// HPD must stay high this long before a rising edge counts as a connect.
    #[serde(default = "settle_ms")]
    pub settle_ms: u64,

    /// Number of level samples taken after a falling edge.
    #[serde(default = "poll_count")]
    pub poll_count: u32,

    #[serde(default = "poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on edge flips while chasing a bouncing line.
    #[serde(default = "max_arm_attempts")]
    pub max_arm_attempts: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_ms:        settle_ms(),
            poll_count:       poll_count(),
            poll_interval_ms: poll_interval_ms(),
            max_arm_attempts: max_arm_attempts(),
        }
    }
}

impl Timing {
    pub fn settle(&self) -> Duration { Duration::from_millis(self.settle_ms) }

    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }
}
