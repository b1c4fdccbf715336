// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmtok write` command - Write bytes into a region reached by token.

use shmtoken_core::{AccessMode, Config, SharedMemory};

use super::decode_token;

pub async fn execute(
    config: &Config,
    encoded: &str,
    offset: usize,
    data: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = decode_token(encoded)?;

    let mut shm = SharedMemory::with_config(&config.shm);
    shm.open_token(&token, AccessMode::ReadWrite)?;

    let mut view = shm.create_view(offset, data.len(), AccessMode::ReadWrite)?;
    view.write_at(0, data.as_bytes())?;

    tracing::info!(
        name = shm.name().unwrap_or_default(),
        offset = offset,
        len = data.len(),
        "Wrote to region"
    );
    println!("Wrote {} bytes at offset {}", data.len(), offset);
    Ok(())
}
