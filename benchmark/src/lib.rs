// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmtoken Benchmarks
//!
//! Criterion benchmarks for the region lifecycle, view mapping and token
//! encoding. Run with `cargo bench -p shmtoken-benchmark`.
//!
//! # Benchmark Groups
//!
//! - **region_lifecycle**: create/close, open by token and view map/unmap
//! - **token_codec**: base64 encode and decode of open tokens

use shmtoken_core::{CreateFlags, SharedMemory};

/// Region sizes exercised by the lifecycle benchmarks (in bytes).
pub const REGION_SIZES: &[usize] = &[4096, 64 * 1024, 1024 * 1024, 16 * 1024 * 1024];

/// Base name for regions created by a benchmark, unique to this process.
pub fn bench_region_name(tag: &str) -> String {
    format!("shmtoken-bench-{}-{}", tag, std::process::id())
}

/// Create a uniquely named region that lives for the whole benchmark.
pub fn fixture_region(tag: &str, size: usize) -> SharedMemory {
    let mut shm = SharedMemory::new();
    if let Err(e) = shm.create(&bench_region_name(tag), size, CreateFlags::MAKE_UNIQUE) {
        panic!("Failed to create benchmark region: {}", e);
    }
    shm
}
