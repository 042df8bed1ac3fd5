// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! axetune - autonomous tuning for AxeOS miners
//!
//! Entry point for the axetune CLI application.

use clap::Parser;

use axetune::cli::{Cli, Commands};
use axetune::commands::{self, Context};
use axetune::config::Settings;
use axetune::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing. `RUST_LOG` still takes precedence.
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    let directive = match cli.verbose {
        0 => None,
        1 => Some("axetune=info"),
        _ => Some("axetune=debug"),
    };
    if let Some(directive) = directive {
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Load settings
    let settings = Settings::resolve(cli.config.as_deref())?;

    let ctx = Context::new(settings, cli.state);
    let format = cli.format;

    // Dispatch to appropriate command
    match cli.command {
        Commands::Run => commands::run::execute(&ctx).await?,
        Commands::Status => commands::status::execute(&ctx, &format).await?,
        Commands::Detail(args) => commands::status::execute_detail(&ctx, &args, &format).await?,
        Commands::Enable(args) => commands::device::execute_enable(&ctx, &args, &format).await?,
        Commands::Disable(args) => commands::device::execute_disable(&ctx, &args, &format).await?,
        Commands::Limits(args) => commands::limits::execute(&ctx, &args, &format).await?,
        Commands::Profiles => commands::profiles::execute(&ctx, &format)?,
    }

    Ok(())
}
