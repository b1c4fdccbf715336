// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Platform backends. Exactly one is compiled in; the region and view code only
//! talk to the items re-exported here.

use std::io;
use std::time::Duration;

use crate::error::ShmError;

#[cfg(unix)]
mod posix;
#[cfg(unix)]
pub(crate) use posix::{close, create_or_open, map, open_existing, unmap, Backing, PlatformHandle};

#[cfg(windows)]
mod win32;
#[cfg(windows)]
pub(crate) use win32::{close, create_or_open, map, open_existing, unmap, Backing, PlatformHandle};

/// Parameters for a create and/or open by name.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Request<'a> {
    /// Base name, already decorated for uniqueness if requested.
    pub name: &'a str,
    /// Page-aligned size in bytes.
    pub size: usize,
    pub try_create: bool,
    pub try_open: bool,
    /// The name carries a process-unique suffix.
    pub unique: bool,
    /// Hold the named creation mutex (POSIX only).
    pub lock: bool,
    pub lock_warn_timeout: Duration,
}

/// Map an OS error onto the error taxonomy.
pub(crate) fn classify(operation: &'static str, name: &str, err: io::Error) -> ShmError {
    match err.kind() {
        io::ErrorKind::AlreadyExists => ShmError::AlreadyExists {
            name: name.to_string(),
        },
        io::ErrorKind::NotFound => ShmError::NotFound {
            name: name.to_string(),
        },
        _ => ShmError::Os {
            operation,
            name: name.to_string(),
            source: err,
        },
    }
}
