//! shmtoken Core Library
//!
//! Named shared memory regions that can be created in one process and opened
//! in any other from a base64 open token. Provides the region handle, mapped
//! views, token encoding, configuration and the error taxonomy.

pub mod config;
pub mod error;
pub mod shm;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, DefaultsConfig, ShmConfig};
pub use error::{ConfigError, ConfigResult, ShmError, ShmResult};
pub use shm::{OpenToken, SharedMemory, SystemGeometry, View};
pub use types::{AccessMode, CreateFlags, OpenOutcome, RegionName};
