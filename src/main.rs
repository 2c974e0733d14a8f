// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use clap::Parser;
use std::process;

mod cli;

fn main() {
    if let Err(why) = cli::Command::parse().run() {
        eprintln!("dp-gpio-hpd: {:#}", why);
        process::exit(1);
    }
}
