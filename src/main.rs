mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands, ResolveArgs};
use ghrelay::api::{ApiServer, REQUEST_DEADLINE, Resolution, resolve_within, shutdown_signal};
use ghrelay::config::{Config, ConfigOrigin};
use ghrelay::observability;
use ghrelay::resolver::{AssetRef, GithubClient};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    observability::init_tracing(&config.telemetry)?;

    match &config.origin {
        ConfigOrigin::Missing(path) => warn!(
            path = %path.display(),
            "Configuration file not found, using defaults and environment overrides"
        ),
        origin => info!(%origin, "Configuration loaded"),
    }

    let client = GithubClient::new(&config.github)?;
    info!(api_url = %config.github.api_url, "GitHub client ready");

    match cli.command {
        Commands::Server(args) => {
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            let server = ApiServer::bind(&config.server, Arc::new(client)).await?;
            server.serve(shutdown_signal()).await?;
        }
        Commands::Resolve(args) => resolve_once(&client, args).await?,
    }

    Ok(())
}

async fn resolve_once(client: &GithubClient, args: ResolveArgs) -> Result<(), AnyError> {
    let asset = AssetRef::new(args.owner, args.repo, args.tag, args.asset);

    match resolve_within(client, &asset, REQUEST_DEADLINE, &CancellationToken::new()).await {
        Resolution::Resolved(url) => {
            println!("{url}");
            Ok(())
        }
        Resolution::Failed(err) => Err(format!("{asset}: {err}").into()),
        Resolution::TimedOut(_) => {
            Err(format!("{asset}: not resolved within {REQUEST_DEADLINE:?}").into())
        }
    }
}
