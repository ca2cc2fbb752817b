//! gamedex - command-line game catalog browser
//!
//! Pulls top-rated games from IGDB, caches them locally, and shows details
//! (screenshots, trailer) on demand.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gamedex::api::{CatalogClient, IgdbClient};
use gamedex::auth::{AuthConfig, ClientCredentialsExchange, FileTokenStore, TokenProvider};
use gamedex::cache::{self, RecordCache};
use gamedex::config::Config;
use gamedex::models::GameRecord;
use gamedex::sync::{
    RetryPolicy, SyncCommand, SyncCoordinator, SyncOutcome, SyncResponse, SyncState, SyncWorker,
};

#[derive(Parser)]
#[command(name = "gamedex")]
#[command(about = "Browse top-rated games from IGDB", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to fill in
    Init,

    /// Obtain an access token
    Auth {
        /// Request a new token even if the cached one is still valid
        #[arg(short, long)]
        force: bool,
    },

    /// Show cached token status
    Status,

    /// Fetch top-rated games and store them in the local cache
    Sync {
        /// Number of games to request (defaults to `listing_limit`)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List cached games
    List,

    /// Show a cached game with its screenshots and trailer
    Show {
        /// Local game id (from `list` output)
        id: i64,
    },

    /// Find a cached game by its IGDB id
    Lookup {
        /// IGDB game id
        igdb_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load_from(&config_path)?;

    match cli.command {
        Commands::Init => {
            if config_path.exists() {
                bail!("{} already exists", config_path.display());
            }
            Config::default().save(&config_path)?;
            println!("Wrote {}", config_path.display());
            println!("Set client_id and client_secret from your Twitch developer console.");
        }
        Commands::Auth { force } => {
            config.validate()?;
            let tokens = token_provider(&config)?;
            let result = if force {
                tokens.refresh().await
            } else {
                tokens.try_ensure_valid_token().await
            };
            let credential = result.context("Authentication failed")?;
            println!("Token valid until {}", format_millis(credential.expires_at_millis));
        }
        Commands::Status => {
            let tokens = token_provider(&config)?;
            let credential = tokens.current().await;
            if credential.is_empty() {
                println!("Access token: none");
                println!("\nRun 'gamedex auth' to authenticate.");
            } else if credential.is_expired_at(tokens.now_millis()) {
                println!("Access token: expired");
                println!("  expired_at: {}", format_millis(credential.expires_at_millis));
            } else {
                println!("Access token: valid");
                println!("  expires_at: {}", format_millis(credential.expires_at_millis));
            }
        }
        Commands::Sync { limit } => {
            config.validate()?;
            let coordinator = Arc::new(coordinator(&config).await?);
            run_sync(coordinator, limit.unwrap_or(config.listing_limit)).await?;
        }
        Commands::List => {
            let cache = open_cache(&config).await?;
            print_games(&cache.all().await?);
        }
        Commands::Show { id } => {
            config.validate()?;
            let coordinator = Arc::new(coordinator(&config).await?);
            run_show(coordinator, id).await?;
        }
        Commands::Lookup { igdb_id } => {
            let cache = open_cache(&config).await?;
            match cache.get_by_remote_id(&igdb_id).await? {
                Some(game) => print_game(&game),
                None => println!("No cached game with IGDB id {}", igdb_id),
            }
        }
    }

    Ok(())
}

fn token_provider(config: &Config) -> Result<Arc<TokenProvider>> {
    let exchange = ClientCredentialsExchange::new(&AuthConfig::from_config(config))?;
    let store = FileTokenStore::new(config.credentials_path()?);
    Ok(Arc::new(TokenProvider::new(Box::new(store), Arc::new(exchange))))
}

async fn open_cache(config: &Config) -> Result<RecordCache> {
    let path = config.database_path()?;
    let pool = cache::open_database(&path)
        .await
        .with_context(|| format!("Failed to open cache {}", path.display()))?;
    Ok(RecordCache::open(pool).await?)
}

async fn coordinator(config: &Config) -> Result<SyncCoordinator> {
    let tokens = token_provider(config)?;
    let catalog = CatalogClient::new(IgdbClient::new(&config.api_base, &config.client_id));
    let cache = open_cache(config).await?;

    Ok(SyncCoordinator::new(tokens, Arc::new(catalog), cache).with_retry(RetryPolicy {
        attempts: config.retry_attempts,
        backoff: Duration::from_millis(config.retry_backoff_ms),
    }))
}

async fn run_sync(coordinator: Arc<SyncCoordinator>, limit: usize) -> Result<()> {
    let mut state = coordinator.state();
    let mut updates = coordinator.games_stream();
    let watcher = tokio::spawn(async move {
        // First item is the list as it was before this sync.
        updates.next().await;
        loop {
            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *state.borrow_and_update() == SyncState::Fetched {
                        tracing::info!("Listing received, storing...");
                    }
                }
                Some(games) = updates.next() => {
                    tracing::debug!("Published list now holds {} games", games.len());
                }
            }
        }
    });

    let mut worker = SyncWorker::start(coordinator.clone());
    tracing::info!("Fetching top {} games...", limit);
    worker.send(SyncCommand::FetchGames { limit });

    let response = worker.recv().await;
    watcher.abort();

    match response {
        Some(SyncResponse::Synced(SyncOutcome::Published { fetched, stored })) => {
            print_games(&coordinator.games().borrow());
            println!("Fetched {} games, stored {}.", fetched, stored);
            Ok(())
        }
        Some(SyncResponse::Synced(SyncOutcome::Failed(e))) => {
            Err(e).context("Sync failed; the cached list is unchanged")
        }
        _ => bail!("Sync worker stopped unexpectedly"),
    }
}

async fn run_show(coordinator: Arc<SyncCoordinator>, id: i64) -> Result<()> {
    let Some(game) = coordinator.cache().get(id).await? else {
        bail!("No cached game with id {} (run 'gamedex list')", id);
    };
    print_game(&game);

    let mut worker = SyncWorker::start(coordinator);
    worker.send(SyncCommand::LoadEnrichment { record_id: id });

    if let Some(SyncResponse::Enrichment {
        record_id,
        enrichment: Some(enrichment),
    }) = worker.recv().await
    {
        tracing::debug!("Enrichment loaded for game {}", record_id);
        println!("  Screenshots:");
        if enrichment.screenshots.is_empty() {
            println!("    (none)");
        }
        for url in &enrichment.screenshots {
            println!("    {}", url);
        }
        match enrichment.video_url() {
            Some(url) => println!("  Trailer: {}", url),
            None => println!("  Trailer: (none)"),
        }
    }

    Ok(())
}

fn print_games(games: &[GameRecord]) {
    println!("\nCached Games:");
    println!("{:-<60}", "");

    if games.is_empty() {
        println!("  (no games cached -- run 'gamedex sync')");
        return;
    }

    for game in games {
        println!("{:>5}  {:<40} igdb:{}", game.id, truncate(&game.name, 40), game.remote_id);
    }
}

fn print_game(game: &GameRecord) {
    println!();
    println!("{}", game.name);
    println!("  ID:          {}", game.id);
    println!("  IGDB ID:     {}", game.remote_id);
    println!("  Cover:       {}", game.image_url);
    println!("  Summary:     {}", game.summary);
    println!("  Description: {}", game.description);
}

/// Truncate to `max` chars (char_indices avoids mid-codepoint panic).
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let end = text
        .char_indices()
        .nth(max.saturating_sub(3))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    format!("{}...", &text[..end])
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}
