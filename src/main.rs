//! Kindling - LiveReload server for static-site development.

use anyhow::Result;
use clap::{ColorChoice, Parser};

use kindling::cli::{Cli, Commands};
use kindling::config::Config;
use kindling::logger;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = Config::load(&cli.config)?;

    match &cli.command {
        Commands::Serve {
            site,
            interface,
            port,
        } => kindling::cli::serve(&config, site, *interface, *port),
    }
}
