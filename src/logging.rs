// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use fern::{Dispatch, InitError};
use log::LevelFilter;
use std::io;

fn dispatch(filter: LevelFilter) -> Dispatch {
    Dispatch::new()
        // Exclude logs for crates that we use
        .level(LevelFilter::Off)
        // Include only the logs for this crate
        .level_for("dp_gpio_hpd", filter)
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
}

pub fn setup(filter: LevelFilter) -> Result<(), InitError> {
    dispatch(filter).chain(io::stderr()).apply()?;
    Ok(())
}
