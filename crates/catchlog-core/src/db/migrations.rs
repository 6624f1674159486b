//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &V1_STATEMENTS).await?;
    }
    if version < 2 {
        apply(conn, 2, &V2_STATEMENTS).await?;
    }
    if version < 3 {
        apply(conn, 3, &V3_STATEMENTS).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: record storage
const V1_STATEMENTS: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    // One table for all three collections; the JSON payload is the record
    "CREATE TABLE IF NOT EXISTS entities (
        collection TEXT NOT NULL,
        local_id TEXT NOT NULL,
        trip_id INTEGER,
        date TEXT,
        payload TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (collection, local_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_entities_trip ON entities(collection, trip_id)",
    "CREATE INDEX IF NOT EXISTS idx_entities_date ON entities(collection, date)",
    "CREATE INDEX IF NOT EXISTS idx_entities_created ON entities(collection, created_at)",
];

/// Version 2: namespaced key-value persistence (id mappings, sync queue)
const V2_STATEMENTS: [&str; 1] = ["CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )"];

/// Version 3: records are owned by the guest or by one signed-in user.
/// Existing rows predate sign-in scoping and become guest rows.
const V3_STATEMENTS: [&str; 7] = [
    "CREATE TABLE entities_scoped (
        owner TEXT NOT NULL,
        collection TEXT NOT NULL,
        local_id TEXT NOT NULL,
        trip_id INTEGER,
        date TEXT,
        payload TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (owner, collection, local_id)
    )",
    "INSERT INTO entities_scoped (owner, collection, local_id, trip_id, date, payload, created_at, updated_at)
     SELECT 'guest', collection, local_id, trip_id, date, payload, created_at, updated_at FROM entities",
    "DROP TABLE entities",
    "ALTER TABLE entities_scoped RENAME TO entities",
    "CREATE INDEX IF NOT EXISTS idx_entities_trip ON entities(owner, collection, trip_id)",
    "CREATE INDEX IF NOT EXISTS idx_entities_date ON entities(owner, collection, date)",
    "CREATE INDEX IF NOT EXISTS idx_entities_created ON entities(owner, collection, created_at)",
];

async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            [i64::from(version)],
        )
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version} (latest {CURRENT_VERSION})");
    Ok(())
}
