// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmtok create` command - Create a region and hold it open.
//!
//! The token goes to stdout on its own line so scripts can capture it. The
//! region is released when the command is interrupted.

use shmtoken_core::{Config, CreateFlags, SharedMemory};

pub async fn execute(
    config: &Config,
    name: &str,
    size: Option<usize>,
    unique: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let size = size.unwrap_or(config.defaults.region_size);
    let flags = if unique {
        CreateFlags::MAKE_UNIQUE
    } else {
        CreateFlags::empty()
    };

    tracing::info!(name = %name, size = size, unique = unique, "Creating region");

    let mut shm = SharedMemory::with_config(&config.shm);
    shm.create(name, size, flags)?;

    let token = shm.get_open_token();
    match token.base64() {
        Some(encoded) => println!("{}", encoded),
        None => return Err("region was created without a token".into()),
    }

    eprintln!(
        "Holding '{}' ({} bytes). Press Ctrl-C to release.",
        shm.name().unwrap_or(name),
        shm.size()
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    shm.close(false);
    eprintln!("Released.");
    Ok(())
}
