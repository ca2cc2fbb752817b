//! Game record repository with a live, subscribable view.

use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;

use crate::error::SyncError;
use crate::models::{GameRecord, NewGameRecord, NO_SUMMARY};

const SELECT_GAMES: &str = "SELECT id, name, image, igdb_id, summary, description FROM games";

/// Durable store of game records keyed by a surrogate id.
///
/// Inserts are upserts on the IGDB id: a game that is already cached keeps its
/// surrogate id and gets its fields replaced. The full record list, in
/// insertion order, is republished to subscribers after every write.
#[derive(Clone)]
pub struct RecordCache {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
    published: Arc<watch::Sender<Vec<GameRecord>>>,
}

impl RecordCache {
    /// Wrap a migrated pool and load the current records for subscribers.
    pub async fn open(pool: SqlitePool) -> Result<Self, SyncError> {
        let initial = fetch_all(&pool).await?;
        tracing::debug!("Record cache opened with {} games", initial.len());
        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
            published: Arc::new(tx),
        })
    }

    /// Insert or update one record and republish.
    pub async fn insert(&self, record: &NewGameRecord) -> Result<GameRecord, SyncError> {
        let _guard = self.write_lock.lock().await;
        let stored = self.upsert(record).await?;
        self.publish().await?;
        Ok(stored)
    }

    /// Insert a batch; each record succeeds or fails on its own. Subscribers
    /// see one update after the whole batch.
    pub async fn insert_all(&self, records: &[NewGameRecord]) -> Vec<Result<GameRecord, SyncError>> {
        let _guard = self.write_lock.lock().await;
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(self.upsert(record).await);
        }
        if let Err(e) = self.publish().await {
            tracing::warn!("Failed to republish records after batch insert: {:#}", e);
        }
        results
    }

    /// Caller holds `write_lock`.
    async fn upsert(&self, record: &NewGameRecord) -> Result<GameRecord, SyncError> {
        let mut tx = self.pool.begin().await.map_err(write_error)?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM games WHERE igdb_id = ? ORDER BY id LIMIT 1")
                .bind(&record.remote_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(write_error)?;

        let id = match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE games SET name = ?, image = ?, summary = ?, description = ? WHERE id = ?",
                )
                .bind(&record.name)
                .bind(&record.image_url)
                .bind(&record.summary)
                .bind(&record.description)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(write_error)?;
                id
            }
            None => sqlx::query(
                "INSERT INTO games (name, image, igdb_id, summary, description) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&record.name)
            .bind(&record.image_url)
            .bind(&record.remote_id)
            .bind(&record.summary)
            .bind(&record.description)
            .execute(&mut *tx)
            .await
            .map_err(write_error)?
            .last_insert_rowid(),
        };

        tx.commit().await.map_err(write_error)?;

        Ok(GameRecord {
            id,
            remote_id: record.remote_id.clone(),
            name: record.name.clone(),
            image_url: record.image_url.clone(),
            summary: record.summary.clone(),
            description: record.description.clone(),
        })
    }

    /// All records, ordered by insertion.
    pub async fn all(&self) -> Result<Vec<GameRecord>, SyncError> {
        fetch_all(&self.pool).await
    }

    /// Point lookup by surrogate id.
    pub async fn get(&self, id: i64) -> Result<Option<GameRecord>, SyncError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_GAMES))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error)?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// Point lookup by IGDB id.
    pub async fn get_by_remote_id(&self, remote_id: &str) -> Result<Option<GameRecord>, SyncError> {
        let row = sqlx::query(&format!("{} WHERE igdb_id = ? ORDER BY id LIMIT 1", SELECT_GAMES))
            .bind(remote_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error)?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// Live view: holds the current list and is notified of every republish.
    pub fn subscribe(&self) -> watch::Receiver<Vec<GameRecord>> {
        self.published.subscribe()
    }

    /// [`subscribe`](Self::subscribe) as a `Stream`; yields the current list first.
    pub fn stream(&self) -> WatchStream<Vec<GameRecord>> {
        WatchStream::new(self.subscribe())
    }

    /// The list most recently published.
    pub fn snapshot(&self) -> Vec<GameRecord> {
        self.published.borrow().clone()
    }

    /// Re-read the table and push it to subscribers. Caller holds
    /// `write_lock`, so an older read can never replace a newer one.
    async fn publish(&self) -> Result<(), SyncError> {
        let records = fetch_all(&self.pool).await?;
        self.published.send_replace(records);
        Ok(())
    }
}

async fn fetch_all(pool: &SqlitePool) -> Result<Vec<GameRecord>, SyncError> {
    let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_GAMES))
        .fetch_all(pool)
        .await
        .map_err(read_error)?;
    Ok(rows.iter().map(record_from_row).collect())
}

fn record_from_row(row: &SqliteRow) -> GameRecord {
    GameRecord {
        id: row.get("id"),
        remote_id: row.get("igdb_id"),
        name: row.get("name"),
        image_url: row.get("image"),
        summary: row
            .get::<Option<String>, _>("summary")
            .unwrap_or_else(|| NO_SUMMARY.to_string()),
        description: row.get("description"),
    }
}

fn write_error(err: sqlx::Error) -> SyncError {
    SyncError::CacheWrite(err.to_string())
}

fn read_error(err: sqlx::Error) -> SyncError {
    SyncError::CacheRead(err.to_string())
}
