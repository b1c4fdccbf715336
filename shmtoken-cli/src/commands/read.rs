// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmtok read` command - Dump bytes from a region reached by token.
//!
//! Prints the bytes followed by their CRC32 so two dumps can be compared.

use shmtoken_core::{AccessMode, Config, SharedMemory};

use super::decode_token;
use crate::CliError;

pub async fn execute(
    config: &Config,
    encoded: &str,
    offset: usize,
    len: usize,
    text: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = decode_token(encoded)?;

    let mut shm = SharedMemory::with_config(&config.shm);
    shm.open_token(&token, AccessMode::ReadOnly)?;

    let view = shm.create_view(offset, len, AccessMode::ReadOnly)?;
    if view.size() == 0 {
        return Err(CliError::NothingToRead {
            name: shm.name().unwrap_or_default().to_string(),
            offset,
        }
        .into());
    }

    let mut buf = vec![0u8; view.size()];
    view.read_at(0, &mut buf)?;

    if text {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        println!("{}", String::from_utf8_lossy(&buf[..end]));
    } else {
        println!("{}", hex_lines(&buf, offset));
    }
    println!("crc32: {:08x}", crc32fast::hash(&buf));
    Ok(())
}

/// Format bytes as 16-byte hex rows prefixed by their region offset.
fn hex_lines(bytes: &[u8], base: usize) -> String {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(i, row)| {
            let hex: Vec<String> = row.iter().map(|b| format!("{:02x}", b)).collect();
            format!("{:08x}  {}", base + i * 16, hex.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
