// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Platform naming rules, system geometry and alignment helpers.

/// Prefix the OS expects on a shared memory object name.
#[cfg(unix)]
pub(crate) const MAPPING_PREFIX: &str = "/";
#[cfg(windows)]
pub(crate) const MAPPING_PREFIX: &str = "Local\\";

/// Longest decorated mapping name the OS accepts. Longer names are truncated.
#[cfg(target_os = "macos")]
pub(crate) const MAX_MAPPING_NAME: usize = 31; // PSHMNAMLEN
#[cfg(all(unix, not(target_os = "macos")))]
pub(crate) const MAX_MAPPING_NAME: usize = 255; // NAME_MAX
#[cfg(windows)]
pub(crate) const MAX_MAPPING_NAME: usize = 64 * 1024;

/// Longest decorated semaphore name. The system prepends "sem." internally.
#[cfg(target_os = "macos")]
pub(crate) const MAX_SEMAPHORE_NAME: usize = 31;
#[cfg(all(unix, not(target_os = "macos")))]
pub(crate) const MAX_SEMAPHORE_NAME: usize = 255 - 4;

/// Page size and mapping-offset granularity of the running system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemGeometry {
    pub page_size: usize,
    pub allocation_granularity: usize,
}

impl SystemGeometry {
    /// Query the running system.
    #[cfg(unix)]
    pub fn query() -> Self {
        // SAFETY: sysconf has no preconditions
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let page_size = if page_size > 0 { page_size as usize } else { 4096 };

        Self {
            page_size,
            allocation_granularity: page_size,
        }
    }

    /// Query the running system.
    #[cfg(windows)]
    pub fn query() -> Self {
        use windows::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

        let mut info = SYSTEM_INFO::default();
        // SAFETY: info is a valid, writable SYSTEM_INFO
        unsafe { GetSystemInfo(&mut info) };

        Self {
            page_size: info.dwPageSize as usize,
            allocation_granularity: info.dwAllocationGranularity as usize,
        }
    }
}

/// Round `size` up to a multiple of `align` (a power of two).
/// Returns None on overflow.
pub(crate) fn align_ceil(size: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    size.checked_add(align - 1).map(|s| s & !(align - 1))
}

/// Round `offset` down to a multiple of `align` (a power of two).
pub(crate) fn align_floor(offset: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    offset & !(align - 1)
}

/// Decorate a base name for the OS namespace and truncate it to `max_len` bytes.
pub(crate) fn decorated_name(name: &str, max_len: usize) -> String {
    let mut decorated = String::with_capacity(MAPPING_PREFIX.len() + name.len());
    decorated.push_str(MAPPING_PREFIX);
    decorated.push_str(name);

    if decorated.len() > max_len {
        let mut end = max_len;
        while !decorated.is_char_boundary(end) {
            end -= 1;
        }
        decorated.truncate(end);
    }

    decorated
}

/// OS name of the shared memory object for a base name.
pub(crate) fn mapping_name(name: &str) -> String {
    decorated_name(name, MAX_MAPPING_NAME)
}

/// OS name of the reference-count semaphore for a base name.
#[cfg(unix)]
pub(crate) fn semaphore_name(name: &str) -> String {
    decorated_name(name, MAX_SEMAPHORE_NAME)
}

/// Append the process id and a random number to a base name.
/// Adds at most 17 characters.
pub(crate) fn unique_name(name: &str) -> String {
    format!("{}{:x}-{:x}", name, std::process::id(), rand::random::<u32>())
}
