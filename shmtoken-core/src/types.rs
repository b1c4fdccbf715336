// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::error::ShmError;

/// Validated base name of a shared memory region.
///
/// Must be non-empty and must not contain `/`, `\` or NUL. Platform decoration
/// (`/` on POSIX, `Local\` on Windows) is added later and never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionName(String);

impl RegionName {
    /// Create a new RegionName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ShmError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ShmError::InvalidName {
                name,
                reason: "name cannot be empty",
            });
        }

        if name.contains(['/', '\\']) {
            return Err(ShmError::InvalidName {
                name,
                reason: "name must not contain path separators",
            });
        }

        if name.contains('\0') {
            return Err(ShmError::InvalidName {
                name,
                reason: "name must not contain NUL characters",
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RegionName {
    type Error = ShmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for RegionName {
    type Error = ShmError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RegionName> for String {
    fn from(name: RegionName) -> Self {
        name.0
    }
}

/// Ways a region can be opened and a view can be mapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Inherit the access of the region (for views) or read-write (for opens).
    #[default]
    Default,

    /// Read-only access. Cannot be used to create a region.
    ReadOnly,

    /// Read-write access. Required for creation.
    ReadWrite,
}

impl AccessMode {
    /// Get the mode name for messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::ReadOnly => "read-only",
            Self::ReadWrite => "read-write",
        }
    }

    /// Whether writes are permitted under this mode.
    pub const fn is_writable(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Flags for `create`, `create_or_open` and `open`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CreateFlags(u32);

impl CreateFlags {
    /// Decorate the base name with the process id and a random suffix so that
    /// creation succeeds even if a region with the same base name exists.
    pub const MAKE_UNIQUE: Self = Self(0x0000_0001);

    /// Do not log failures at error level.
    pub const QUIET: Self = Self(0x0000_0002);

    /// Skip the named creation mutex. Only safe when the caller already
    /// serializes every process that may create or open the same name.
    pub const NO_MUTEX_LOCK: Self = Self(0x0000_0004);

    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bit value.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Check whether all bits of `other` are set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CreateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CreateFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Successful outcome of `create_or_open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenOutcome {
    /// A new region was created under the name.
    Created,
    /// An existing region with the name was opened.
    Opened,
}

impl fmt::Display for OpenOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Opened => write!(f, "opened"),
        }
    }
}
