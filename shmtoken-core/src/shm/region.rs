// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedMemory - handle to a named, system-wide shared memory region.
//!
//! A handle creates or opens one region at a time. Views created from it and
//! the handle itself are independent: either may be dropped first. The region
//! stays openable by name or token while any handle in any process has it open.

use crate::config::ShmConfig;
use crate::error::{ShmError, ShmResult};
use crate::shm::platform::{self, SystemGeometry};
use crate::shm::sys::{self, Backing, Request};
use crate::shm::token::{self, OpenToken};
use crate::shm::view::View;
use crate::types::{AccessMode, CreateFlags, OpenOutcome, RegionName};

/// State held while a region is open.
struct OpenRegion {
    backing: Backing,
    token: OpenToken,
    /// Base name as stored in the token (decorated if made unique).
    name: String,
    /// Page-aligned size in bytes.
    size: usize,
    access: AccessMode,
}

/// Handle to a named shared memory region.
///
/// # Platform differences
///
/// Opening an existing region with a larger size than it currently has grows
/// it on POSIX (`ftruncate`), but fails with [`ShmError::SizeMismatch`] on
/// Windows where sections cannot grow. Both behaviors are intentional.
pub struct SharedMemory {
    open: Option<OpenRegion>,
    geometry: SystemGeometry,
    config: ShmConfig,
}

impl Default for SharedMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemory {
    /// Create a handle with default settings. No region is open yet.
    pub fn new() -> Self {
        Self::with_config(&ShmConfig::default())
    }

    /// Create a handle with explicit settings.
    pub fn with_config(config: &ShmConfig) -> Self {
        Self {
            open: None,
            geometry: SystemGeometry::query(),
            config: config.clone(),
        }
    }

    /// Create a brand-new region, opened read-write.
    ///
    /// `size` is rounded up to the page size. Fails with
    /// [`ShmError::AlreadyExists`] if a region with the (possibly decorated)
    /// name exists. Pass [`CreateFlags::MAKE_UNIQUE`] to reduce that risk;
    /// regions leaked by crashed processes otherwise block creation.
    pub fn create(&mut self, name: &str, size: usize, flags: CreateFlags) -> ShmResult<()> {
        self.create_and_or_open(name, size, flags, false, true)
            .map(|_| ())
    }

    /// Create a region, or open the existing one with the same name.
    ///
    /// A region created with [`CreateFlags::MAKE_UNIQUE`] cannot be found by
    /// its base name; open it with its token instead.
    pub fn create_or_open(
        &mut self,
        name: &str,
        size: usize,
        flags: CreateFlags,
    ) -> ShmResult<OpenOutcome> {
        self.create_and_or_open(name, size, flags, true, true)
    }

    /// Open an existing region by name, read-write.
    pub fn open(&mut self, name: &str, size: usize, flags: CreateFlags) -> ShmResult<()> {
        self.create_and_or_open(name, size, flags, true, false)
            .map(|_| ())
    }

    /// Open an existing region described by a token.
    ///
    /// The token is validated before any system call. Fails with
    /// [`ShmError::SizeMismatch`] if the region under the token's name is
    /// smaller than the token says, as happens when a name is reused after the
    /// original region was unlinked. [`AccessMode::Default`]
    /// opens read-write. The granted access only limits later views: a
    /// read-write view of a read-only region fails in `create_view`.
    pub fn open_token(&mut self, token: &OpenToken, access: AccessMode) -> ShmResult<()> {
        if self.open.is_some() {
            tracing::error!("A region is still open on this handle; close it before opening another");
            return Err(ShmError::AlreadyOpen);
        }

        let layout = token.layout()?;

        if layout.region_size == 0 || layout.region_size % self.geometry.page_size != 0 {
            return Err(ShmError::InvalidToken {
                reason: "region size is zero or not page aligned",
            });
        }

        let name = RegionName::new(layout.name).map_err(|_| ShmError::InvalidToken {
            reason: "token carries an invalid region name",
        })?;

        let access = match access {
            AccessMode::Default => AccessMode::ReadWrite,
            other => other,
        };

        let backing = sys::open_existing(name.as_str(), layout.region_size, access)
            .map_err(|e| self.report(name.as_str(), "open by token", e, false))?;

        tracing::debug!(
            name = %name,
            size = layout.region_size,
            access = %access,
            "Opened shared memory region from token"
        );

        self.open = Some(OpenRegion {
            backing,
            token: token.clone(),
            name: name.into(),
            size: layout.region_size,
            access,
        });
        Ok(())
    }

    fn create_and_or_open(
        &mut self,
        name: &str,
        size: usize,
        flags: CreateFlags,
        try_open: bool,
        try_create: bool,
    ) -> ShmResult<OpenOutcome> {
        if self.open.is_some() {
            tracing::warn!("A region is still open on this handle; close it before creating another");
            return Err(ShmError::AlreadyOpen);
        }

        let base = RegionName::new(name)?;

        if size == 0 {
            return Err(ShmError::InvalidSize { size });
        }

        let quiet = flags.contains(CreateFlags::QUIET);
        let unique = flags.contains(CreateFlags::MAKE_UNIQUE);

        let raw_name: String = if unique {
            platform::unique_name(base.as_str())
        } else {
            base.into()
        };

        if raw_name.len() > u16::MAX as usize {
            return Err(ShmError::InvalidName {
                name: name.to_string(),
                reason: "name longer than 65535 bytes cannot be carried in a token",
            });
        }

        let size = platform::align_ceil(size, self.geometry.page_size)
            .ok_or(ShmError::InvalidSize { size })?;

        let request = Request {
            name: &raw_name,
            size,
            try_create,
            try_open,
            unique,
            lock: !flags.contains(CreateFlags::NO_MUTEX_LOCK),
            lock_warn_timeout: self.config.lock_warn_timeout,
        };

        let (backing, outcome) = sys::create_or_open(&request)
            .map_err(|e| self.report(&raw_name, "create/open", e, quiet))?;

        tracing::debug!(
            name = %raw_name,
            size = size,
            outcome = %outcome,
            "Shared memory region ready"
        );

        let token = OpenToken::from_payload(token::encode_payload(&raw_name, size));
        self.open = Some(OpenRegion {
            backing,
            token,
            name: raw_name,
            size,
            access: AccessMode::ReadWrite,
        });
        Ok(outcome)
    }

    fn report(&self, name: &str, operation: &str, err: ShmError, quiet: bool) -> ShmError {
        if !(quiet || self.config.quiet) {
            tracing::error!(name = %name, error = %err, "Failed to {} shared memory region", operation);
        }
        err
    }

    /// Map a view of the region.
    ///
    /// `offset` is rounded down to the page size for the view's reported
    /// offset, while `address()` still points at the requested byte. `size` 0
    /// maps the rest of the region; larger sizes are clamped to the region end.
    pub fn create_view(&self, offset: usize, size: usize, access: AccessMode) -> ShmResult<View> {
        let open = self.open.as_ref().ok_or(ShmError::NotOpen)?;

        if offset >= open.size {
            return Err(ShmError::OffsetOutOfRange {
                offset,
                size: open.size,
            });
        }

        let access = match access {
            AccessMode::Default => open.access,
            AccessMode::ReadWrite if open.access == AccessMode::ReadOnly => {
                return Err(ShmError::AccessDenied {
                    requested: AccessMode::ReadWrite,
                    granted: open.access,
                });
            }
            other => other,
        };

        let available = open.size - offset;
        let size = if size == 0 || size > available {
            available
        } else {
            size
        };

        View::map(
            &open.backing.handle,
            &open.name,
            offset,
            size,
            access,
            self.geometry.page_size,
            self.geometry.allocation_granularity,
        )
    }

    /// Close the region. No-op if nothing is open.
    ///
    /// On POSIX, the last handle system-wide to close unlinks the region and
    /// its reference count; `force_unlink` unlinks regardless. Existing views
    /// stay mapped either way.
    pub fn close(&mut self, force_unlink: bool) {
        let Some(open) = self.open.take() else {
            return;
        };

        let unlinked = sys::close(open.backing, &open.name, force_unlink);
        tracing::debug!(
            name = %open.name,
            unlinked = unlinked,
            "Closed shared memory region"
        );
    }

    /// Whether a region is open on this handle.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Token for opening this region elsewhere. Empty if nothing is open.
    pub fn get_open_token(&self) -> OpenToken {
        self.open
            .as_ref()
            .map(|open| open.token.clone())
            .unwrap_or_default()
    }

    /// Page-aligned size of the open region, or 0.
    pub fn size(&self) -> usize {
        self.open.as_ref().map_or(0, |open| open.size)
    }

    /// Granted access of the open region, or `Default` if nothing is open.
    pub fn access_mode(&self) -> AccessMode {
        self.open
            .as_ref()
            .map_or(AccessMode::Default, |open| open.access)
    }

    /// Name of the open region as carried in its token.
    pub fn name(&self) -> Option<&str> {
        self.open.as_ref().map(|open| open.name.as_str())
    }

    pub fn system_page_size(&self) -> usize {
        self.geometry.page_size
    }

    pub fn system_allocation_granularity(&self) -> usize {
        self.geometry.allocation_granularity
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        self.close(false);
    }
}
