//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Kindling LiveReload server CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: kindling.toml)
    #[arg(short = 'C', long, default_value = "kindling.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve reload notifications for a built site directory
    #[command(visible_alias = "s")]
    Serve {
        /// Built site directory to watch for changes
        #[arg(value_hint = clap::ValueHint::DirPath)]
        site: PathBuf,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_args_parse() {
        let cli = Cli::parse_from(["kindling", "serve", "public", "--port", "4000"]);
        match cli.command {
            Commands::Serve { site, port, .. } => {
                assert_eq!(site, PathBuf::from("public"));
                assert_eq!(port, Some(4000));
            }
        }
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::parse_from(["kindling", "serve", "public", "--verbose"]);
        assert!(cli.verbose);
    }
}
