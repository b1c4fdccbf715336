// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Errors raised by the CLI itself, before any region is touched.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Token could not be decoded: {reason}")]
    MalformedToken { reason: String },

    #[error("Region '{name}' holds no data at offset {offset}")]
    NothingToRead { name: String, offset: usize },
}
