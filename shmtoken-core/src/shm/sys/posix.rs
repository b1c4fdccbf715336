// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! POSIX backend: shm_open segments, mmap views and a named-semaphore reference count.
//!
//! POSIX has no atomic create-or-open spanning the segment and its reference
//! count, so the whole sequence runs under a named creation mutex.

use std::fs::{File, Permissions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::PermissionsExt;
use std::ptr::NonNull;

use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;

use super::{classify, Request};
use crate::error::{ShmError, ShmResult};
use crate::shm::platform;
use crate::shm::semaphore::{NamedSemaphore, RefCount, ALL_READ_WRITE};
use crate::types::{AccessMode, OpenOutcome};

/// OS handle of an open region.
#[derive(Debug)]
pub(crate) enum PlatformHandle {
    Fd(File),
}

/// Everything a process holds while a region is open.
pub(crate) struct Backing {
    pub handle: PlatformHandle,
    ref_count: RefCount,
}

fn open_segment(mapping: &str, flags: OFlag) -> io::Result<File> {
    shm_open(mapping, flags, Mode::from_bits_truncate(ALL_READ_WRITE as _))
        .map(File::from)
        .map_err(io::Error::from)
}

/// Drop a reference count taken during a failed create/open.
///
/// A count created here is unlinked again. An attached count gives back its
/// reference, and is unlinked too if the segment it guards no longer exists.
fn abandon(ref_count: RefCount, created: bool, segment_missing: bool) {
    if created {
        ref_count.unlink();
        return;
    }
    ref_count.release();
    if segment_missing {
        ref_count.unlink();
    }
}

fn acquire_ref_count(request: &Request<'_>) -> ShmResult<(RefCount, bool)> {
    if request.try_create {
        match RefCount::create_exclusive(request.name) {
            Ok(count) => return Ok((count, true)),
            // Someone else created it, or leaked it from a crashed process.
            Err(e) if !request.try_open => return Err(classify("sem_open", request.name, e)),
            Err(_) => {}
        }
    }

    RefCount::attach(request.name)
        .map(|count| (count, false))
        .map_err(|e| classify("sem_open", request.name, e))
}

pub(crate) fn create_or_open(request: &Request<'_>) -> ShmResult<(Backing, OpenOutcome)> {
    let name = request.name;
    let mapping = platform::mapping_name(name);

    // Uniquely named regions only race with this process, so they use a
    // per-process mutex. Everything else shares the global one.
    let mutex = request.lock.then(|| {
        NamedSemaphore::open(
            &NamedSemaphore::creation_mutex_name(request.unique),
            request.unique,
        )
    });
    let _guard = mutex
        .as_ref()
        .map(|mutex| mutex.lock(request.lock_warn_timeout));

    let (ref_count, created_count) = acquire_ref_count(request)?;

    let mut create_err = None;
    if request.try_create {
        match open_segment(&mapping, OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL) {
            Ok(file) => {
                // shm_open() is masked by umask.
                if let Err(e) = file.set_permissions(Permissions::from_mode(ALL_READ_WRITE)) {
                    tracing::debug!(name = %name, error = %e, "Could not widen region permissions");
                }

                if let Err(e) = file.set_len(request.size as u64) {
                    drop(file);
                    let _ = shm_unlink(mapping.as_str());
                    ref_count.unlink();
                    return Err(ShmError::Os {
                        operation: "ftruncate",
                        name: name.to_string(),
                        source: e,
                    });
                }

                // A count left behind by a crashed process outlived its
                // segment. The creator holds no reference, so start from 0.
                if !created_count {
                    tracing::debug!(name = %name, "Resetting stale reference count");
                    ref_count.reset();
                }

                let backing = Backing {
                    handle: PlatformHandle::Fd(file),
                    ref_count,
                };
                return Ok((backing, OpenOutcome::Created));
            }
            Err(e) => create_err = Some(e),
        }
    }

    if !request.try_open {
        let err = create_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AlreadyExists));
        abandon(ref_count, created_count, false);
        return Err(classify("shm_open", name, err));
    }

    let file = match open_segment(&mapping, OFlag::O_RDWR) {
        Ok(file) => file,
        Err(e) => {
            abandon(ref_count, created_count, e.kind() == io::ErrorKind::NotFound);
            return Err(classify("shm_open", name, e));
        }
    };

    // Grow an undersized region while the mutex is still held.
    let existing = match file.metadata() {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            abandon(ref_count, created_count, false);
            return Err(ShmError::Os {
                operation: "fstat",
                name: name.to_string(),
                source: e,
            });
        }
    };

    if request.size as u64 > existing {
        tracing::debug!(
            name = %name,
            from = existing,
            to = request.size,
            "Growing existing shared memory region"
        );
        if let Err(e) = file.set_len(request.size as u64) {
            abandon(ref_count, created_count, false);
            return Err(ShmError::Os {
                operation: "ftruncate",
                name: name.to_string(),
                source: e,
            });
        }
    }

    let backing = Backing {
        handle: PlatformHandle::Fd(file),
        ref_count,
    };
    Ok((backing, OpenOutcome::Opened))
}

/// Open an existing region that must hold at least `size` bytes.
///
/// A smaller segment means the caller's size is stale (the name was reused)
/// and mapping `size` bytes would fault past the end of the object.
pub(crate) fn open_existing(name: &str, size: usize, access: AccessMode) -> ShmResult<Backing> {
    let ref_count = RefCount::attach(name).map_err(|e| classify("sem_open", name, e))?;

    let flags = if access.is_writable() {
        OFlag::O_RDWR
    } else {
        OFlag::O_RDONLY
    };

    let file = match open_segment(&platform::mapping_name(name), flags) {
        Ok(file) => file,
        Err(e) => {
            abandon(ref_count, false, e.kind() == io::ErrorKind::NotFound);
            return Err(classify("shm_open", name, e));
        }
    };

    let existing = match file.metadata() {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            drop(file);
            abandon(ref_count, false, false);
            return Err(ShmError::Os {
                operation: "fstat",
                name: name.to_string(),
                source: e,
            });
        }
    };

    if (size as u64) > existing {
        drop(file);
        abandon(ref_count, false, false);
        return Err(ShmError::SizeMismatch {
            name: name.to_string(),
            existing: existing as usize,
            requested: size,
        });
    }

    Ok(Backing {
        handle: PlatformHandle::Fd(file),
        ref_count,
    })
}

/// Release a region. Returns true if the OS objects were unlinked.
///
/// The descriptor is closed before the unlink so that no mapping set up by
/// this handle races the removal.
pub(crate) fn close(backing: Backing, name: &str, force_unlink: bool) -> bool {
    let Backing { handle, ref_count } = backing;
    drop(handle);

    let last = ref_count.release();
    if !(last || force_unlink) {
        return false;
    }

    if let Err(e) = shm_unlink(platform::mapping_name(name).as_str()) {
        tracing::debug!(name = %name, error = %e, "shm_unlink failed");
    }
    ref_count.unlink();
    true
}

pub(crate) fn map(
    handle: &PlatformHandle,
    offset: usize,
    len: usize,
    access: AccessMode,
) -> io::Result<NonNull<u8>> {
    let PlatformHandle::Fd(file) = handle;

    let prot = if access.is_writable() {
        libc::PROT_READ | libc::PROT_WRITE
    } else {
        libc::PROT_READ
    };

    // SAFETY: the fd is open, offset is page aligned and len is non-zero
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            prot,
            libc::MAP_SHARED,
            file.as_raw_fd(),
            offset as libc::off_t,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }

    NonNull::new(ptr.cast::<u8>()).ok_or_else(|| io::Error::other("mmap returned null"))
}

/// # Safety
/// `ptr` and `len` must describe a live mapping returned by `map`.
pub(crate) unsafe fn unmap(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
    if libc::munmap(ptr.as_ptr().cast(), len) == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
