// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmtok unlink` command - Remove a leaked region by name.
//!
//! Processes that still have the region mapped keep their mappings.

use shmtoken_core::{Config, CreateFlags, SharedMemory};

pub async fn execute(config: &Config, name: &str, size: usize) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(name = %name, "Force-unlinking region");

    let mut shm = SharedMemory::with_config(&config.shm);
    shm.open(name, size, CreateFlags::QUIET)?;
    shm.close(true);

    println!("Unlinked '{}'", name);
    Ok(())
}
