// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod create;
pub mod inspect;
pub mod read;
pub mod unlink;
pub mod validate;
pub mod write;

use shmtoken_core::{Config, ConfigLoader, OpenToken};

use crate::CliError;

/// Load the configuration file if one was given, otherwise use defaults.
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            tracing::debug!(config = %path, "Loading configuration");
            Ok(ConfigLoader::load_file(path)?)
        }
        None => Ok(Config::default()),
    }
}

/// Decode a base64 token and make sure it describes a region.
pub fn decode_token(encoded: &str) -> Result<OpenToken, CliError> {
    let token = OpenToken::from_base64(encoded.trim());
    if !token.is_valid() {
        return Err(CliError::MalformedToken {
            reason: "not filename-safe base64".to_string(),
        });
    }
    if token.name().is_none() || token.region_size().is_none() {
        return Err(CliError::MalformedToken {
            reason: "payload does not describe a region".to_string(),
        });
    }
    Ok(token)
}
