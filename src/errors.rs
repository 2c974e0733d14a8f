// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use std::io;

pub type Result<T> = std::result::Result<T, HpdError>;

#[derive(Debug, thiserror::Error)]
pub enum HpdError {
    #[error("invalid argument: {}", _0)]
    InvalidArgument(&'static str),
    #[error("gpio '{}' is not present in the configuration", _0)]
    ConfigurationMissing(String),
    #[error("failed to acquire {} for '{}': {}", what, name, why)]
    ResourceUnavailable { what: &'static str, name: String, why: io::Error },
    #[error("{} callback failed: {}", _0, _1)]
    IoFailure(&'static str, io::Error),
    #[error("hpd worker for '{}' has stopped", _0)]
    WorkerGone(String),
}

impl HpdError {
    pub(crate) fn unavailable(what: &'static str, name: &str, why: io::Error) -> Self {
        HpdError::ResourceUnavailable { what, name: name.into(), why }
    }
}
