// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared memory module.
//!
//! Named, system-wide regions that any process can reopen from a compact
//! token. POSIX uses shm_open plus a named-semaphore reference count; Windows
//! uses pagefile-backed file mappings.

mod platform;
mod region;
#[cfg(unix)]
mod semaphore;
mod sys;
mod token;
mod view;

pub use platform::SystemGeometry;
pub use region::SharedMemory;
#[cfg(unix)]
pub use semaphore::GLOBAL_SEMAPHORE_NAME;
pub use token::{OpenToken, TOKEN_HEADER_LEN};
pub use view::View;
