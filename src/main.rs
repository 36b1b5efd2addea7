use anyhow::Result;
use clap::Parser;

use looker_rtl::cli::{Cli, Commands};
use looker_rtl::client::ApiClient;
use looker_rtl::handlers;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with verbosity level
    tracing_subscriber::fmt()
        .with_max_level(cli.get_log_level())
        .init();

    // .env values are picked up by the environment overlay
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env loaded: {}", e);
    }

    tracing::debug!("Starting lkr with command: {:?}", cli.command);

    let settings =
        handlers::resolve_settings(&cli.config, cli.section.as_deref(), &cli.env_prefix)?;

    match cli.command {
        Commands::Config { show_secrets } => {
            handlers::handle_show_config(&settings, show_secrets)?
        }
        Commands::Login { revoke } => {
            handlers::handle_login(&ApiClient::http(settings)?, revoke).await?
        }
        Commands::Versions => handlers::handle_versions(&ApiClient::http(settings)?).await?,
        Commands::Me { fields, as_user } => {
            handlers::handle_me(&ApiClient::http(settings)?, fields, as_user).await?
        }
        Commands::Get { path, query } => {
            handlers::handle_get(&ApiClient::http(settings)?, path, query).await?
        }
    }

    Ok(())
}
