// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmtok validate` command - Validate configuration file.

use shmtoken_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Region Manager Settings:");
            println!(
                "  Lock Warn Timeout:  {}ms",
                config.shm.lock_warn_timeout.as_millis()
            );
            println!("  Quiet:              {}", config.shm.quiet);
            println!();
            println!("Creation Defaults:");
            println!("  Region Size:        {} bytes", config.defaults.region_size);
            println!("  Make Unique:        {}", config.defaults.make_unique);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
