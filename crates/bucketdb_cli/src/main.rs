//! bucketdb CLI
//!
//! Command-line administration for bucketdb files.
//!
//! # Commands
//!
//! - `listbuckets` - List all buckets
//! - `createbucket` - Create a bucket (no-op if it exists)
//! - `deletebucket` - Delete a bucket and its entries
//! - `listkeys` - List the keys of a bucket
//! - `readall` - Print every key and value of a bucket
//! - `readkey` - Print the value of one key
//! - `insert` - Set a key to a value in an existing bucket
//! - `delete` - Delete a key from a bucket

mod commands;
mod error;

use clap::error::ErrorKind;
use clap::Parser;
use commands::Command;
use error::CliError;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// bucketdb command-line database tools.
#[derive(Debug, Parser)]
#[command(name = "bucketdb")]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true, disable_help_flag = true)]
struct Cli {
    /// Enable debug logging on standard error
    #[arg(global = true, long)]
    verbose: bool,

    /// Print help
    #[arg(global = true, long, action = clap::ArgAction::Help)]
    #[allow(dead_code)]
    help: Option<bool>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return report(&CliError::Usage(e)),
    };

    init_logging(cli.verbose);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match commands::dispatch(&cli.command, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

/// Logs go to standard error; standard output carries only command output.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Prints an error the way the operator should see it and picks the exit
/// status.
fn report(err: &CliError) -> ExitCode {
    match err {
        CliError::Usage(e)
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) =>
        {
            // Help and version requests are not failures.
            let _ = e.print();
            ExitCode::SUCCESS
        }
        CliError::Usage(_) => {
            let mut out = io::stdout().lock();
            let _ = out.write_all(commands::USAGE.as_bytes());
            let _ = out.flush();
            ExitCode::FAILURE
        }
        other => {
            eprintln!("Error: {other}");
            ExitCode::FAILURE
        }
    }
}
