//! Rellenar CLI
//!
//! # Usage
//!
//! ```bash
//! # Train from config
//! rellenar train config.yml
//!
//! # Train with overrides
//! rellenar train config.yml --max-iters 1000 --lr 0.0001
//!
//! # Validate config
//! rellenar validate config.yml
//!
//! # Show config info
//! rellenar info config.yml
//! ```

use clap::Parser;
use rellenar::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
