/// CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "dockup")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.json, .toml or .yaml)
    #[arg(short, long, global = true, env = "DOCKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server and the backup scheduler
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = dockup::utils::DEFAULT_PORT)]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = dockup::utils::DEFAULT_HOST)]
        host: String,

        /// Enable CORS for cross-origin requests
        #[arg(long)]
        cors: bool,

        /// Do not run scheduled backups
        #[arg(long)]
        no_scheduler: bool,
    },

    /// Back up a database now
    Backup {
        /// Database name from the configuration
        name: String,
    },

    /// Restore a database from a stored backup
    Restore {
        /// Database name from the configuration
        name: String,

        /// Backup timestamp, as shown by `status`
        timestamp: String,
    },

    /// Show container status and stored backups
    Status,

    /// Check the configuration and exit
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_restore() {
        let cli = Cli::parse_from(["dockup", "-c", "db.toml", "restore", "orders", "01-03-2024-10:15"]);
        assert_eq!(cli.config, Some(PathBuf::from("db.toml")));
        match cli.command {
            Commands::Restore { name, timestamp } => {
                assert_eq!(name, "orders");
                assert_eq!(timestamp, "01-03-2024-10:15");
            }
            _ => panic!("expected restore"),
        }
    }

    #[cfg(feature = "server")]
    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::parse_from(["dockup", "serve", "--no-scheduler"]);
        match cli.command {
            Commands::Serve {
                port,
                host,
                cors,
                no_scheduler,
            } => {
                assert_eq!(port, 8080);
                assert_eq!(host, "127.0.0.1");
                assert!(!cors);
                assert!(no_scheduler);
            }
            _ => panic!("expected serve"),
        }
    }
}
