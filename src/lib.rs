use clap::{Parser, Subcommand};
use colored::Colorize;
use once_cell::sync::Lazy;

#[macro_use]
pub mod utils;
pub mod bench;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod error;
pub mod invoke;
pub mod meta;
pub mod normalize;
pub mod record;
pub mod report;
pub mod testbed;

/// Image compressor comparison CLI
#[derive(Parser)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Run(commands::run::RunArgs),
    Report(commands::report::ReportArgs),
}

static CMD_ARGS: Lazy<Cli> = Lazy::new(|| {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    Cli::parse()
});

#[doc(hidden)]
pub fn main() -> anyhow::Result<()> {
    env_logger::init();
    let result = match &CMD_ARGS.command {
        Commands::Run(cmd) => cmd.run(),
        Commands::Report(cmd) => cmd.run(),
    };
    if let Err(err) = result {
        eprintln!("❌ {}: {}", "ERROR".red().bold(), err.to_string().red());
        let code = err
            .downcast_ref::<error::PipelineError>()
            .map(|e| e.exit_code())
            .unwrap_or(1);
        std::process::exit(code);
    }
    Ok(())
}
