// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for shmtoken.
//!
//! All errors are explicit enum variants. No `Box<dyn Error>`, no `anyhow::Result`.
//! Nothing panics across the public API; fallible operations return these types.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::AccessMode;

/// Errors raised by region, token and view operations.
#[derive(Debug, Error)]
pub enum ShmError {
    // =========================================================================
    // Invalid Arguments - Rejected Before Any System Call
    // =========================================================================
    #[error("Invalid region name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Invalid region size: {size} bytes")]
    InvalidSize { size: usize },

    #[error("Invalid open token: {reason}")]
    InvalidToken { reason: &'static str },

    // =========================================================================
    // Handle State Errors
    // =========================================================================
    #[error("A region is already open on this handle; close it first")]
    AlreadyOpen,

    #[error("No region is open on this handle")]
    NotOpen,

    // =========================================================================
    // Resource Conflicts
    // =========================================================================
    #[error("Shared memory region already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Shared memory region not found: {name}")]
    NotFound { name: String },

    #[error("Existing region '{name}' is {existing} bytes, smaller than the requested {requested}")]
    SizeMismatch {
        name: String,
        existing: usize,
        requested: usize,
    },

    // =========================================================================
    // View Errors
    // =========================================================================
    #[error("View offset {offset} is outside the region of {size} bytes")]
    OffsetOutOfRange { offset: usize, size: usize },

    #[error("Requested {requested} access exceeds the granted {granted} access")]
    AccessDenied {
        requested: AccessMode,
        granted: AccessMode,
    },

    #[error("View access of {len} bytes at offset {offset} exceeds the view size {size}")]
    ViewBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("View has been unmapped")]
    Unmapped,

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("{operation} failed for '{name}': {source}")]
    Os {
        operation: &'static str,
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl ShmError {
    /// Raw OS error code, if this error came from a system call.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Os { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Configuration errors. Any invalid field prevents the config from loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for region operations.
pub type ShmResult<T> = Result<T, ShmError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
