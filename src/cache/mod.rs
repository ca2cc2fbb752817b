//! Local SQLite cache of fetched game records.
//!
//! Schema changes are additive only: columns are appended with defaults and
//! never dropped, so a cache written by an older build keeps working.

mod records;

pub use records::RecordCache;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;

/// Bumped whenever a column is appended to `ADDITIVE_COLUMNS`.
const SCHEMA_VERSION: i64 = 2;

/// Columns added after the original `games` table, in order.
const ADDITIVE_COLUMNS: &[(&str, &str)] = &[
    ("summary", "TEXT"),
    (
        "description",
        "TEXT NOT NULL DEFAULT 'No description available'",
    ),
];

/// Open (creating if needed) the cache database and bring its schema up to date.
pub async fn open_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Create missing tables, then append any missing columns.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO meta (id, schema_version) VALUES (1, 1)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS games (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            image TEXT NOT NULL,
            igdb_id TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let existing: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('games')")
        .fetch_all(pool)
        .await?;

    for (column, definition) in ADDITIVE_COLUMNS {
        if existing.iter().any(|c| c == column) {
            continue;
        }
        tracing::info!("Adding column games.{}", column);
        sqlx::query(&format!("ALTER TABLE games ADD COLUMN {} {}", column, definition))
            .execute(pool)
            .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_games_igdb_id ON games(igdb_id)")
        .execute(pool)
        .await?;

    sqlx::query("UPDATE meta SET schema_version = ? WHERE id = 1 AND schema_version < ?")
        .bind(SCHEMA_VERSION)
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}
