//! ledgercal CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use ledgercal_core::{TracingConfig, init_tracing};

use ledgercal_client::cli::{Cli, Command, ConfigAction};
use ledgercal_client::commands::{self, Context};
use ledgercal_client::config::ClientConfig;
use ledgercal_client::error::ClientResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = match cli.command {
        Command::Server if !cli.quiet && cli.verbose == 0 => TracingConfig::daemon(),
        _ => TracingConfig::for_verbosity(cli.quiet, cli.verbose),
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    let ctx = Context::new(&cli, config);

    match cli.command {
        Command::Sync(args) => commands::sync::run(&ctx, &args).await,
        Command::Status { limit, json } => commands::status::run(&ctx, limit, json).await,
        Command::Server => commands::server::run(&ctx).await,
        Command::Events { action } => commands::events::run(&ctx, action),
        Command::Anniversaries { action } => commands::anniversaries::run(&ctx, action),
        Command::Companies { action } => commands::companies::run(&ctx, action),
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&ctx),
            ConfigAction::Path => commands::config::path(&ctx),
        },
    }
}
