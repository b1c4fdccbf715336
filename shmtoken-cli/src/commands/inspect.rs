// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmtok inspect` command - Decode a token without opening the region.

use serde::Serialize;

use super::decode_token;

#[derive(Serialize)]
struct TokenReport<'a> {
    name: &'a str,
    region_size: usize,
    payload_len: usize,
}

pub async fn execute(encoded: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let token = decode_token(encoded)?;

    let report = TokenReport {
        name: token.name().unwrap_or_default(),
        region_size: token.region_size().unwrap_or_default(),
        payload_len: token.as_bytes().len(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Name:         {}", report.name);
    println!("Region size:  {} bytes", report.region_size);
    println!("Payload:      {} bytes", report.payload_len);
    Ok(())
}
