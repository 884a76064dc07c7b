use anyhow::Result;
use clap::Parser;
use fxkit_core::errors::FxError;

mod cli;
mod commands;

/// Exit code for a phase that left some resources in place
const EXIT_PARTIAL_SUCCESS: i32 = 2;
/// Exit code when another invocation holds the project lock
const EXIT_CONCURRENT_OPERATION: i32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    let parsed = cli::Cli::parse();

    match parsed.dispatch().await {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Some(partial) = err.downcast_ref::<commands::PartialSuccess>() {
                eprintln!("Warning: {}", partial);
                std::process::exit(EXIT_PARTIAL_SUCCESS);
            }

            if let Some(fx_error) = err.downcast_ref::<FxError>() {
                if fx_error.is_concurrent_operation() {
                    eprintln!("Error: {}", fx_error);
                    eprintln!("Another fxkit command is running on this project, try again once it finishes.");
                    std::process::exit(EXIT_CONCURRENT_OPERATION);
                }
            }

            Err(err)
        }
    }
}
