mod application;
mod cli;
mod domain;
mod error;
mod infra;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

fn main() -> Result<ExitCode> {
    // Logs go to stderr so `select-gpus` output stays clean for eval
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dlrm_launch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let code = cli.run()?;
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
