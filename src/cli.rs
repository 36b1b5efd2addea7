use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::settings::{DEFAULT_CONFIG_FILE, DEFAULT_ENV_PREFIX};

#[derive(Parser, Debug)]
#[command(name = "lkr")]
#[command(author, version, about = "Command line client for the Looker API", long_about = None)]
pub struct Cli {
    /// Verbose mode (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// INI configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Configuration section (defaults to the first one)
    #[arg(short, long)]
    pub section: Option<String>,

    /// Prefix of environment variables overriding the file, empty to disable
    #[arg(long, default_value = DEFAULT_ENV_PREFIX)]
    pub env_prefix: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolved configuration
    Config {
        /// Show the client secret (hidden by default)
        #[arg(long)]
        show_secrets: bool,
    },

    /// Check the configured credentials by logging in
    Login {
        /// End the session again right after logging in
        #[arg(long)]
        revoke: bool,
    },

    /// List the API versions the server supports
    Versions,

    /// Show the authenticated user
    Me {
        /// Comma separated list of fields to return
        #[arg(short, long)]
        fields: Option<String>,

        /// Act as this user for the request (sudo)
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: Option<String>,
    },

    /// Authenticated GET against any API path
    Get {
        /// Path relative to the API root, e.g. /dashboards
        path: String,

        /// Query parameter as key=value, may be repeated
        #[arg(short, long = "query")]
        query: Vec<String>,
    },
}

impl Cli {
    pub fn get_log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::ERROR,
            1 => tracing::Level::WARN,
            2 => tracing::Level::INFO,
            3 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
