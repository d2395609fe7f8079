//! unipack CLI - build and release orchestration for uni-app monorepos

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use unipack::util::diagnostic::{self, ConfigParseError};
use unipack::util::Shell;

fn main() {
    if let Err(e) = run() {
        if e.downcast_ref::<commands::AlreadyReported>().is_none() {
            // Config errors carry a source span worth rendering
            match e.downcast_ref::<ConfigParseError>() {
                Some(parse_error) => eprint!("{}", diagnostic::render(parse_error)),
                None => eprintln!("error: {:#}", e),
            }
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("unipack=debug")
    } else if cli.quiet {
        EnvFilter::new("unipack=error")
    } else {
        EnvFilter::new("unipack=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    let shell = Arc::new(Shell::from_flags(cli.quiet, cli.verbose, cli.no_color));

    // Execute command
    match cli.command {
        Commands::Optimize(args) => commands::optimize::execute(args, &shell),
        Commands::Create(args) => commands::create::execute(args, &shell),
        Commands::Version(args) => commands::version::execute(args, &shell),
        Commands::Release(args) => commands::release::execute(args, &shell),
        Commands::Cleanup(args) => commands::cleanup::execute(args, &shell),
        Commands::CopyPlugin(args) => commands::copy_plugin::execute(args, &shell),
        Commands::ElderTransform(args) => commands::elder_transform::execute(args, &shell),
        Commands::Apps(args) => commands::apps::execute(args, &shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
