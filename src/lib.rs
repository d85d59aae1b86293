//! # imgvault
//!
//! A personal image vault. Images captured from the web or from disk are
//! fingerprinted, checked against what is already stored, and replicated
//! to two image hosts before a record is written to a local index.
//!
//! ## Guarantees
//! - **Nothing half-stored** - a record exists only once the required host holds the image
//! - **No silent duplicates** - exact and near-duplicates are reported before any upload
//! - **Reversible deletes** - deleting moves a record to the trash; hosts are only purged on request
//!
//! ## Architecture
//! - `core` - The vault engine (hashing, detection, hosts, index, lifecycle)
//! - `config` - TOML configuration with environment overrides
//! - `events` - Progress events for front ends
//! - `error` - User-facing error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use crate::core::{Vault, VaultBuilder};
pub use error::{Result, VaultError};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process.
///
/// `RUST_LOG` takes precedence over `level`. Call once from the binary;
/// later calls leave the first subscriber in place.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
