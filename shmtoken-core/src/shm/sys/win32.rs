// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Windows backend: pagefile-backed file mappings.
//!
//! CreateFileMappingW creates or opens atomically and the kernel reference
//! counts the section, so no external lock or reference count is needed.
//! Existing mappings cannot grow; opening one smaller than requested fails.

use std::ffi::c_void;
use std::io;
use std::ptr::NonNull;

use windows::core::{s, w, PCWSTR};
use windows::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE, INVALID_HANDLE_VALUE,
};
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};
use windows::Win32::System::Memory::{
    CreateFileMappingW, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, FILE_MAP,
    FILE_MAP_ALL_ACCESS, FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE,
};

use super::{classify, Request};
use crate::error::{ShmError, ShmResult};
use crate::shm::platform;
use crate::types::{AccessMode, OpenOutcome};

/// Owned file-mapping handle. Closed on drop.
#[derive(Debug)]
pub(crate) struct MappingHandle(HANDLE);

// SAFETY: kernel handles may be used and closed from any thread.
unsafe impl Send for MappingHandle {}

impl Drop for MappingHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from CreateFileMappingW/OpenFileMappingW and
        // is closed exactly once
        if let Err(e) = unsafe { CloseHandle(self.0) } {
            tracing::error!(error = %e, "Failed to close file mapping handle");
        }
    }
}

/// OS handle of an open region.
#[derive(Debug)]
pub(crate) enum PlatformHandle {
    Win32(MappingHandle),
}

/// Everything a process holds while a region is open.
pub(crate) struct Backing {
    pub handle: PlatformHandle,
}

fn wide(name: &str) -> Vec<u16> {
    name.encode_utf16().chain(std::iter::once(0)).collect()
}

fn access_flags(access: AccessMode) -> FILE_MAP {
    if access.is_writable() {
        FILE_MAP_ALL_ACCESS
    } else {
        FILE_MAP_READ
    }
}

#[repr(C)]
struct SectionBasicInformation {
    base_address: *mut c_void,
    allocation_attributes: u32,
    maximum_size: i64,
}

type NtQuerySection =
    unsafe extern "system" fn(HANDLE, i32, *mut c_void, u32, *mut usize) -> i32;

/// Size of an existing section, read through the undocumented NtQuerySection.
/// Returns None if ntdll does not export it or the query fails.
fn section_size(handle: HANDLE) -> Option<usize> {
    // SAFETY: ntdll is always loaded; the looked-up symbol has the
    // NtQuerySection signature and `info` matches SECTION_BASIC_INFORMATION.
    unsafe {
        let ntdll = GetModuleHandleW(w!("ntdll.dll")).ok()?;
        let proc = GetProcAddress(ntdll, s!("NtQuerySection"))?;
        let query: NtQuerySection = std::mem::transmute(proc);

        let mut info = SectionBasicInformation {
            base_address: std::ptr::null_mut(),
            allocation_attributes: 0,
            maximum_size: 0,
        };
        let mut read = 0usize;
        let status = query(
            handle,
            0, // SectionBasicInformation
            (&mut info as *mut SectionBasicInformation).cast(),
            std::mem::size_of::<SectionBasicInformation>() as u32,
            &mut read,
        );

        (status >= 0).then_some(info.maximum_size as usize)
    }
}

pub(crate) fn create_or_open(request: &Request<'_>) -> ShmResult<(Backing, OpenOutcome)> {
    let name = request.name;
    let mapping = wide(&platform::mapping_name(name));

    let (handle, already_existed) = if request.try_create {
        // SAFETY: mapping is a NUL-terminated UTF-16 string
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                None,
                PAGE_READWRITE,
                (request.size as u64 >> 32) as u32,
                request.size as u32,
                PCWSTR(mapping.as_ptr()),
            )
        }
        .map_err(|e| classify("CreateFileMappingW", name, io::Error::from(e)))?;
        // SAFETY: no intervening calls since CreateFileMappingW
        let existed = unsafe { GetLastError() } == ERROR_ALREADY_EXISTS;
        (MappingHandle(handle), existed)
    } else {
        // SAFETY: mapping is a NUL-terminated UTF-16 string
        let handle = unsafe {
            OpenFileMappingW(FILE_MAP_ALL_ACCESS.0, false, PCWSTR(mapping.as_ptr()))
        }
        .map_err(|e| classify("OpenFileMappingW", name, io::Error::from(e)))?;
        (MappingHandle(handle), true)
    };

    if already_existed && !request.try_open {
        return Err(ShmError::AlreadyExists {
            name: name.to_string(),
        });
    }

    if already_existed {
        if let Some(existing) = section_size(handle.0) {
            if request.size > existing {
                return Err(ShmError::SizeMismatch {
                    name: name.to_string(),
                    existing,
                    requested: request.size,
                });
            }
        }
    }

    let outcome = if already_existed {
        OpenOutcome::Opened
    } else {
        OpenOutcome::Created
    };

    let backing = Backing {
        handle: PlatformHandle::Win32(handle),
    };
    Ok((backing, outcome))
}

/// Open an existing section that must hold at least `size` bytes.
pub(crate) fn open_existing(name: &str, size: usize, access: AccessMode) -> ShmResult<Backing> {
    let mapping = wide(&platform::mapping_name(name));

    // SAFETY: mapping is a NUL-terminated UTF-16 string
    let handle = unsafe {
        OpenFileMappingW(access_flags(access).0, false, PCWSTR(mapping.as_ptr()))
    }
    .map(MappingHandle)
    .map_err(|e| classify("OpenFileMappingW", name, io::Error::from(e)))?;

    if let Some(existing) = section_size(handle.0) {
        if size > existing {
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                existing,
                requested: size,
            });
        }
    }

    Ok(Backing {
        handle: PlatformHandle::Win32(handle),
    })
}

/// Release a region. The kernel destroys the section once the last handle and
/// view are gone, so there is nothing to unlink.
pub(crate) fn close(backing: Backing, _name: &str, _force_unlink: bool) -> bool {
    drop(backing);
    false
}

pub(crate) fn map(
    handle: &PlatformHandle,
    offset: usize,
    len: usize,
    access: AccessMode,
) -> io::Result<NonNull<u8>> {
    let PlatformHandle::Win32(mapping) = handle;

    // SAFETY: the mapping handle is open and offset is granularity aligned
    let view = unsafe {
        MapViewOfFile(
            mapping.0,
            access_flags(access),
            (offset as u64 >> 32) as u32,
            offset as u32,
            len,
        )
    };

    NonNull::new(view.Value.cast::<u8>()).ok_or_else(io::Error::last_os_error)
}

/// # Safety
/// `ptr` must be the base address of a live view returned by `map`.
pub(crate) unsafe fn unmap(ptr: NonNull<u8>, _len: usize) -> io::Result<()> {
    UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS {
        Value: ptr.as_ptr().cast(),
    })
    .map_err(io::Error::from)
}
