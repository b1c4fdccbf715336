// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! View - a process-local mapping of all or part of a region.
//!
//! A view owns its mapping and unmaps it on drop. It does not borrow the
//! region handle and stays valid after that handle is closed.

use std::ptr::NonNull;

use crate::error::{ShmError, ShmResult};
use crate::shm::platform::align_floor;
use crate::shm::sys::{self, PlatformHandle};
use crate::types::AccessMode;

/// Mapped address range over a shared memory region.
///
/// Move-only: there is exactly one owner of each mapping.
#[derive(Debug)]
pub struct View {
    /// Base of the OS mapping (granularity aligned). None once unmapped.
    base: Option<NonNull<u8>>,
    /// Length of the OS mapping, including the alignment prefix.
    mapped_len: usize,
    /// Bytes accessible from `address()`.
    size: usize,
    /// Page-aligned offset of the view into the region.
    offset: usize,
    /// Distance from `base` to the first byte the caller asked for.
    page_offset: usize,
    access: AccessMode,
}

// SAFETY: the view exclusively owns its mapping; shared access only reads.
unsafe impl Send for View {}
unsafe impl Sync for View {}

impl View {
    /// Map `size` bytes starting at the region offset `offset`.
    ///
    /// The OS mapping starts at `offset` rounded down to the allocation
    /// granularity; `address()` hides that prefix.
    pub(crate) fn map(
        handle: &PlatformHandle,
        name: &str,
        offset: usize,
        size: usize,
        access: AccessMode,
        page_size: usize,
        allocation_granularity: usize,
    ) -> ShmResult<Self> {
        let map_offset = align_floor(offset, allocation_granularity);
        let page_offset = offset - map_offset;
        let mapped_len = size + page_offset;

        let base = sys::map(handle, map_offset, mapped_len, access).map_err(|e| {
            tracing::error!(
                name = %name,
                size = size,
                offset = offset,
                error = %e,
                "Failed to map shared memory view"
            );
            ShmError::Os {
                operation: "map",
                name: name.to_string(),
                source: e,
            }
        })?;

        tracing::debug!(
            name = %name,
            offset = offset,
            size = size,
            access = %access,
            "Mapped shared memory view"
        );

        Ok(Self {
            base: Some(base),
            mapped_len,
            size,
            offset: align_floor(offset, page_size),
            page_offset,
            access,
        })
    }

    /// Address of the first requested byte, or null if the view was unmapped.
    pub fn address(&self) -> *mut u8 {
        match self.base {
            // SAFETY: page_offset < mapped_len, so the result stays in the mapping
            Some(base) => unsafe { base.as_ptr().add(self.page_offset) },
            None => std::ptr::null_mut(),
        }
    }

    /// Accessible size in bytes. 0 once unmapped.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Page-aligned offset of this view into the region.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Access actually granted for this view.
    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    pub fn is_mapped(&self) -> bool {
        self.base.is_some()
    }

    fn check_bounds(&self, offset: usize, len: usize) -> ShmResult<()> {
        if self.base.is_none() {
            return Err(ShmError::Unmapped);
        }
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(ShmError::ViewBounds {
                offset,
                len,
                size: self.size,
            }),
        }
    }

    /// Copy bytes out of the view starting at `offset` (relative to `address()`).
    ///
    /// Other processes may write concurrently; coordinating that is the caller's job.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> ShmResult<()> {
        self.check_bounds(offset, buf.len())?;
        // SAFETY: bounds checked above and the mapping is live
        unsafe {
            std::ptr::copy_nonoverlapping(self.address().add(offset), buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    /// Copy bytes into the view starting at `offset` (relative to `address()`).
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> ShmResult<()> {
        if !self.access.is_writable() {
            return Err(ShmError::AccessDenied {
                requested: AccessMode::ReadWrite,
                granted: self.access,
            });
        }
        self.check_bounds(offset, data.len())?;
        // SAFETY: bounds and write access checked above and the mapping is live
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.address().add(offset), data.len());
        }
        Ok(())
    }

    /// Get a slice over the view. Empty once unmapped.
    ///
    /// # Safety
    /// Caller must ensure no other process or view writes the range while the
    /// slice is alive.
    pub unsafe fn as_slice(&self) -> &[u8] {
        if self.base.is_none() {
            return &[];
        }
        std::slice::from_raw_parts(self.address(), self.size)
    }

    /// Get a mutable slice over the view. Empty once unmapped.
    ///
    /// # Safety
    /// The view must be read-write, and the caller must ensure exclusive access
    /// to the range while the slice is alive.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.base.is_none() {
            return &mut [];
        }
        std::slice::from_raw_parts_mut(self.address(), self.size)
    }

    /// Unmap the view. Safe to call more than once.
    pub fn unmap(&mut self) {
        let Some(base) = self.base.take() else {
            return;
        };

        // SAFETY: base and mapped_len describe the mapping created in `map`
        if let Err(e) = unsafe { sys::unmap(base, self.mapped_len) } {
            tracing::error!(
                address = ?base.as_ptr(),
                error = %e,
                "Failed to unmap shared memory view"
            );
        }

        self.mapped_len = 0;
        self.size = 0;
        self.offset = 0;
        self.page_offset = 0;
        self.access = AccessMode::Default;
    }
}

impl Drop for View {
    fn drop(&mut self) {
        self.unmap();
    }
}
