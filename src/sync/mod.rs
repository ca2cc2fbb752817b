//! Sync coordination: token → catalog → cache.
//!
//! [`SyncCoordinator::fetch_games`] runs the bulk listing flow and leaves the
//! result in the record cache, whose live view is what subscribers observe.
//! [`SyncCoordinator::load_enrichment`] fetches detail-view extras for one
//! record without storing them.

pub mod worker;

pub use worker::{SyncCommand, SyncResponse, SyncWorker};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::api::Catalog;
use crate::auth::TokenProvider;
use crate::cache::RecordCache;
use crate::error::SyncError;
use crate::models::{Enrichment, GameRecord, NewGameRecord, RemoteGame};

/// Where the most recent bulk sync is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    TokenReady,
    Fetched,
    Mapped,
    Published,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::TokenReady => "token ready",
            SyncState::Fetched => "fetched",
            SyncState::Mapped => "mapped",
            SyncState::Published => "published",
            SyncState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal result of one bulk sync.
#[derive(Debug)]
pub enum SyncOutcome {
    /// `fetched` games came back; `stored` of them were written to the cache.
    Published { fetched: usize, stored: usize },
    /// Nothing was written; the published list is unchanged.
    Failed(SyncError),
}

/// Retry schedule for the listing call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub attempts: u32,
    /// Delay before the first retry; doubles each time, capped at 8x
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 0,
            backoff: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.pow(attempt.min(3)))
    }
}

pub struct SyncCoordinator {
    tokens: Arc<TokenProvider>,
    catalog: Arc<dyn Catalog>,
    cache: RecordCache,
    retry: RetryPolicy,
    state: watch::Sender<SyncState>,
}

impl SyncCoordinator {
    pub fn new(tokens: Arc<TokenProvider>, catalog: Arc<dyn Catalog>, cache: RecordCache) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            tokens,
            catalog,
            cache,
            retry: RetryPolicy::none(),
            state,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// Live record list, as persisted.
    pub fn games(&self) -> watch::Receiver<Vec<GameRecord>> {
        self.cache.subscribe()
    }

    pub fn games_stream(&self) -> WatchStream<Vec<GameRecord>> {
        self.cache.stream()
    }

    pub fn state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    fn enter(&self, state: SyncState) {
        tracing::debug!("Sync state: {}", state);
        self.state.send_replace(state);
    }

    fn fail(&self, err: SyncError) -> SyncOutcome {
        tracing::warn!("Game sync failed: {:#}", err);
        self.enter(SyncState::Failed);
        SyncOutcome::Failed(err)
    }

    /// Fetch the top `limit` games and store them.
    ///
    /// Nothing is written until the whole listing has been fetched and mapped.
    /// Individual insert failures are logged and skipped.
    pub async fn fetch_games(&self, limit: usize) -> SyncOutcome {
        self.enter(SyncState::Idle);

        let credential = self.tokens.ensure_valid_token().await;
        if credential.is_empty() {
            return self.fail(SyncError::Unauthenticated);
        }
        self.enter(SyncState::TokenReady);

        let games = match self.list_with_retry(&credential.token, limit).await {
            Ok(games) => games,
            Err(e) => return self.fail(e),
        };
        self.enter(SyncState::Fetched);

        let records: Vec<NewGameRecord> = games.iter().map(NewGameRecord::from_remote).collect();
        self.enter(SyncState::Mapped);

        let results = self.cache.insert_all(&records).await;
        let mut stored = 0;
        for (record, result) in records.iter().zip(results) {
            match result {
                Ok(_) => stored += 1,
                Err(e) => tracing::warn!(
                    "Failed to cache game {} ({}): {:#}",
                    record.remote_id,
                    record.name,
                    e
                ),
            }
        }

        self.enter(SyncState::Published);
        tracing::info!("Synced {} games ({} stored)", records.len(), stored);
        SyncOutcome::Published {
            fetched: records.len(),
            stored,
        }
    }

    async fn list_with_retry(&self, token: &str, limit: usize) -> Result<Vec<RemoteGame>, SyncError> {
        let mut attempt = 0;
        loop {
            match self.catalog.list_top_games(token, limit).await {
                Ok(games) => return Ok(games),
                Err(e) if e.is_transient() && attempt < self.retry.attempts => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        "Game listing failed: {:#}. Retrying in {}ms...",
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Screenshots and trailer for a published record.
    ///
    /// `None` if the record is not in the published list. Each half fails on
    /// its own into an empty value so the base record can always be shown.
    pub async fn load_enrichment(&self, record_id: i64) -> Option<Enrichment> {
        let record = self
            .cache
            .snapshot()
            .into_iter()
            .find(|g| g.id == record_id)?;

        let credential = self.tokens.ensure_valid_token().await;
        if credential.is_empty() {
            tracing::warn!(
                "Skipping enrichment for {}: {}",
                record.remote_id,
                SyncError::Unauthenticated
            );
            return Some(Enrichment::default());
        }

        let (screenshots, video) = tokio::join!(
            self.catalog.list_screenshots(&credential.token, &record.remote_id),
            self.catalog.fetch_video(&credential.token, &record.remote_id),
        );

        let screenshots = screenshots.unwrap_or_else(|e| {
            tracing::warn!("Screenshots for {} unavailable: {:#}", record.remote_id, e);
            Vec::new()
        });
        let video_id = video.unwrap_or_else(|e| {
            tracing::warn!("Video for {} unavailable: {:#}", record.remote_id, e);
            None
        });

        Some(Enrichment {
            screenshots,
            video_id,
        })
    }
}
