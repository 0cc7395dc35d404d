//! Prism CLI entry point
//!
//! Parses arguments, runs the command and prints failures through
//! [`user_friendly_error`] so users see details and a suggestion instead of a
//! bare error chain.

use anyhow::Result;
use clap::Parser;
use prism::cli;
use prism::core::error::user_friendly_error;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute() {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
