//! Background worker: keeps network and cache work off the caller's task.
//!
//! Uses an mpsc channel pair. The caller sends `SyncCommand` values, and a
//! background tokio task executes them and sends `SyncResponse` values back.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{SyncCoordinator, SyncOutcome};
use crate::models::Enrichment;

/// Commands sent to the worker.
#[derive(Debug)]
pub enum SyncCommand {
    FetchGames { limit: usize },
    LoadEnrichment { record_id: i64 },
}

/// Responses from the worker.
#[derive(Debug)]
pub enum SyncResponse {
    Synced(SyncOutcome),
    Enrichment {
        record_id: i64,
        enrichment: Option<Enrichment>,
    },
}

/// Handle for driving the worker.
pub struct SyncWorker {
    cmd_tx: mpsc::UnboundedSender<SyncCommand>,
    resp_rx: mpsc::UnboundedReceiver<SyncResponse>,
}

impl SyncWorker {
    /// Spawn the worker loop around a shared coordinator.
    pub fn start(coordinator: Arc<SyncCoordinator>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(worker_loop(coordinator, cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Send a command (non-blocking).
    pub fn send(&self, cmd: SyncCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Sync worker channel closed -- command dropped");
        }
    }

    /// Next response; `None` once the worker has gone away.
    pub async fn recv(&mut self) -> Option<SyncResponse> {
        self.resp_rx.recv().await
    }
}

/// Runs each command on its own task, so an enrichment never waits behind a
/// bulk sync. Overlapping syncs are not cancelled.
async fn worker_loop(
    coordinator: Arc<SyncCoordinator>,
    mut cmd_rx: mpsc::UnboundedReceiver<SyncCommand>,
    resp_tx: mpsc::UnboundedSender<SyncResponse>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let coordinator = Arc::clone(&coordinator);
        let resp_tx = resp_tx.clone();

        tokio::spawn(async move {
            let response = match cmd {
                SyncCommand::FetchGames { limit } => {
                    SyncResponse::Synced(coordinator.fetch_games(limit).await)
                }
                SyncCommand::LoadEnrichment { record_id } => SyncResponse::Enrichment {
                    record_id,
                    enrichment: coordinator.load_enrichment(record_id).await,
                },
            };
            let _ = resp_tx.send(response);
        });
    }
    tracing::debug!("Sync worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::{coordinator, game, FakeCatalog};

    #[tokio::test]
    async fn test_worker_runs_sync_then_enrichment() {
        let catalog = FakeCatalog {
            screenshots: Some(vec!["https://img/sc.jpg".into()]),
            video: Some(None),
            ..FakeCatalog::listing(vec![game(10, "Ten")])
        };
        let (coordinator, _catalog, _dir) = coordinator(catalog, true).await;
        let coordinator = Arc::new(coordinator);
        let mut games = coordinator.games();
        let mut worker = SyncWorker::start(coordinator.clone());

        worker.send(SyncCommand::FetchGames { limit: 5 });
        match worker.recv().await {
            Some(SyncResponse::Synced(SyncOutcome::Published { stored, .. })) => assert_eq!(stored, 1),
            other => panic!("unexpected response: {:?}", other),
        }

        games.changed().await.unwrap();
        let id = games.borrow()[0].id;

        worker.send(SyncCommand::LoadEnrichment { record_id: id });
        match worker.recv().await {
            Some(SyncResponse::Enrichment {
                record_id,
                enrichment: Some(enrichment),
            }) => {
                assert_eq!(record_id, id);
                assert_eq!(enrichment.screenshots.len(), 1);
                assert!(enrichment.video_id.is_none());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_worker_reports_failure() {
        let (coordinator, _catalog, _dir) = coordinator(FakeCatalog::default(), false).await;
        let mut worker = SyncWorker::start(Arc::new(coordinator));

        worker.send(SyncCommand::FetchGames { limit: 5 });
        assert!(matches!(
            worker.recv().await,
            Some(SyncResponse::Synced(SyncOutcome::Failed(_)))
        ));
    }
}
