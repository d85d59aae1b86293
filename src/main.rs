//! # imgvault CLI
//!
//! Command-line front end for the image vault.
//!
//! ## Usage
//! ```bash
//! imgvault ingest ~/Pictures/wallpapers --tags "desk, blue"
//! imgvault list --output json
//! imgvault trash 3f2c... && imgvault empty-trash
//! ```

mod cli;

use console::style;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
