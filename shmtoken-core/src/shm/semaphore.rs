// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Named POSIX semaphores: the creation mutex and the per-region reference count.
//!
//! Both are system-wide objects shared with unrelated processes, so their names
//! and initial counts are part of the interprocess contract.

use std::ffi::CString;
use std::io;
use std::time::Duration;

use crate::shm::platform;

/// Name of the system-wide creation mutex.
///
/// Every process that creates or opens regions by name must agree on this
/// value. Changing it breaks interop with processes built against older versions.
pub const GLOBAL_SEMAPHORE_NAME: &str = "/carbonite-sharedmemory";

/// Permission bits forced onto every object created here (rw for all users).
pub(crate) const ALL_READ_WRITE: u32 = 0o666;

/// Retry a libc call while it fails with EINTR.
fn retry_eintr(mut f: impl FnMut() -> libc::c_int) -> libc::c_int {
    loop {
        let result = f();
        if result != -1 || io::Error::last_os_error().kind() != io::ErrorKind::Interrupted {
            return result;
        }
    }
}

/// Log and abort. Used when a semaphore that other processes depend on is in
/// an unusable state.
#[cold]
fn fatal(operation: &str, name: &str, err: io::Error) -> ! {
    tracing::error!(semaphore = %name, error = %err, "{} failed, aborting", operation);
    std::process::abort();
}

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// sem_open() is masked by umask, so force the permissions afterwards. Linux
/// keeps named semaphores under /dev/shm with a "sem." prefix; macOS semaphores
/// are not backed by the filesystem and keep their masked mode.
#[cfg(target_os = "linux")]
fn force_permissions(os_name: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = format!("/dev/shm/sem.{}", os_name.trim_start_matches('/'));
    let perms = std::fs::Permissions::from_mode(ALL_READ_WRITE);
    if let Err(e) = std::fs::set_permissions(&path, perms) {
        tracing::debug!(path = %path, error = %e, "Could not widen semaphore permissions");
    }
}

#[cfg(not(target_os = "linux"))]
fn force_permissions(_os_name: &str) {}

fn sem_open(os_name: &str, flags: libc::c_int, initial: u32) -> io::Result<*mut libc::sem_t> {
    let c = c_name(os_name)?;
    // SAFETY: c is a valid NUL-terminated string; mode and value are passed as
    // c_uint as required for the variadic arguments.
    let sem = unsafe {
        libc::sem_open(
            c.as_ptr(),
            flags,
            ALL_READ_WRITE as libc::c_uint,
            initial as libc::c_uint,
        )
    };

    if sem == libc::SEM_FAILED {
        return Err(io::Error::last_os_error());
    }

    if flags & libc::O_CREAT != 0 {
        force_permissions(os_name);
    }

    Ok(sem)
}

fn sem_unlink(os_name: &str) {
    if let Ok(c) = c_name(os_name) {
        // SAFETY: c is a valid NUL-terminated string
        unsafe { libc::sem_unlink(c.as_ptr()) };
    }
}

/// Named binary semaphore used as a cross-process mutex.
///
/// Opened with O_CREAT and an initial count of 1. Failure to open is fatal:
/// without the mutex no process can safely create regions.
pub(crate) struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: String,
    unlink_on_close: bool,
}

impl NamedSemaphore {
    pub(crate) fn open(name: &str, unlink_on_close: bool) -> Self {
        match sem_open(name, libc::O_CREAT, 1) {
            Ok(sem) => Self {
                sem,
                name: name.to_string(),
                unlink_on_close,
            },
            Err(e) => fatal("sem_open", name, e),
        }
    }

    /// Name of the mutex guarding creation for `unique` or global names.
    pub(crate) fn creation_mutex_name(unique: bool) -> String {
        if unique {
            // The PID suffix is part of the interprocess naming contract.
            format!("{}-{}", GLOBAL_SEMAPHORE_NAME, std::process::id())
        } else {
            GLOBAL_SEMAPHORE_NAME.to_string()
        }
    }

    /// Acquire the mutex. After `warn_after` a warning is logged and the wait
    /// continues without a deadline.
    pub(crate) fn lock(&self, warn_after: Duration) -> SemaphoreGuard<'_> {
        self.wait(warn_after);
        SemaphoreGuard { semaphore: self }
    }

    #[cfg(target_os = "linux")]
    fn wait(&self, warn_after: Duration) {
        let mut deadline = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: deadline is a valid, writable timespec
        unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut deadline) };

        let nanos = deadline.tv_nsec as u64 + u64::from(warn_after.subsec_nanos());
        deadline.tv_sec += (warn_after.as_secs() + nanos / 1_000_000_000) as libc::time_t;
        deadline.tv_nsec = (nanos % 1_000_000_000) as libc::c_long;

        // SAFETY: sem is a live semaphore and deadline is valid
        let result = retry_eintr(|| unsafe { libc::sem_timedwait(self.sem, &deadline) });
        if result == 0 {
            return;
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::TimedOut {
            fatal("sem_timedwait", &self.name, err);
        }

        // A crashed process can leave a system-wide semaphore locked.
        tracing::warn!(
            semaphore = %self.name,
            waited_ms = warn_after.as_millis() as u64,
            "Waiting on a global named semaphore is taking too long; it may be stuck. \
             Deleting /dev/shm/sem.{} and restarting the application may be required",
            self.name.trim_start_matches('/')
        );

        // SAFETY: sem is a live semaphore
        if retry_eintr(|| unsafe { libc::sem_wait(self.sem) }) != 0 {
            fatal("sem_wait", &self.name, io::Error::last_os_error());
        }
    }

    // macOS has no sem_timedwait(); block without hang detection.
    #[cfg(not(target_os = "linux"))]
    fn wait(&self, _warn_after: Duration) {
        // SAFETY: sem is a live semaphore
        if retry_eintr(|| unsafe { libc::sem_wait(self.sem) }) != 0 {
            fatal("sem_wait", &self.name, io::Error::last_os_error());
        }
    }

    fn post(&self) {
        // SAFETY: sem is a live semaphore
        if retry_eintr(|| unsafe { libc::sem_post(self.sem) }) != 0 {
            fatal("sem_post", &self.name, io::Error::last_os_error());
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // SAFETY: sem came from a successful sem_open and is closed exactly once
        if unsafe { libc::sem_close(self.sem) } != 0 {
            tracing::error!(
                semaphore = %self.name,
                error = %io::Error::last_os_error(),
                "Failed to close semaphore"
            );
        }
        if self.unlink_on_close {
            sem_unlink(&self.name);
        }
    }
}

/// Held lock on a NamedSemaphore. Releases on drop.
pub(crate) struct SemaphoreGuard<'a> {
    semaphore: &'a NamedSemaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.post();
    }
}

/// Per-region reference count kept in a named semaphore.
///
/// The creator opens it with a count of 0 and never posts; each opener posts
/// once. A closer whose non-blocking wait fails finds the count already at 0
/// and is therefore the last reference.
pub(crate) struct RefCount {
    sem: *mut libc::sem_t,
    os_name: String,
}

// SAFETY: a sem_t handle from sem_open may be used from any thread.
unsafe impl Send for RefCount {}

impl RefCount {
    /// Create the reference count for a new region. Fails with EEXIST if it exists.
    pub(crate) fn create_exclusive(region_name: &str) -> io::Result<Self> {
        let os_name = platform::semaphore_name(region_name);
        let sem = sem_open(&os_name, libc::O_CREAT | libc::O_EXCL, 0)?;
        Ok(Self { sem, os_name })
    }

    /// Attach to an existing reference count and add this process's reference.
    pub(crate) fn attach(region_name: &str) -> io::Result<Self> {
        let os_name = platform::semaphore_name(region_name);
        let sem = sem_open(&os_name, 0, 0)?;
        let count = Self { sem, os_name };
        // SAFETY: sem is a live semaphore
        if retry_eintr(|| unsafe { libc::sem_post(count.sem) }) != 0 {
            let err = io::Error::last_os_error();
            tracing::error!(
                semaphore = %count.os_name,
                error = %err,
                "Failed to add a reference to the region reference count"
            );
            return Err(err);
        }
        Ok(count)
    }

    /// Drop this process's reference. Returns true if it was the last one.
    pub(crate) fn release(&self) -> bool {
        // SAFETY: sem is a live semaphore
        let result = retry_eintr(|| unsafe { libc::sem_trywait(self.sem) });
        result == -1 && io::Error::last_os_error().kind() == io::ErrorKind::WouldBlock
    }

    /// Drain the count back to 0. Used when a stale count outlived its segment.
    pub(crate) fn reset(&self) {
        // SAFETY: sem is a live semaphore
        while retry_eintr(|| unsafe { libc::sem_trywait(self.sem) }) == 0 {}
    }

    /// Remove the semaphore name from the system namespace.
    pub(crate) fn unlink(&self) {
        sem_unlink(&self.os_name);
    }
}

impl Drop for RefCount {
    fn drop(&mut self) {
        // SAFETY: sem came from a successful sem_open and is closed exactly once
        unsafe { libc::sem_close(self.sem) };
    }
}
