//! Key-value repository implementation

use libsql::{params, Connection};

use crate::error::Result;
use crate::util::unix_millis_now;

/// Trait for namespaced key-value storage (async)
#[allow(async_fn_in_trait)]
pub trait KeyValueRepository {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; returns false when the key was absent
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All entries whose key starts with `prefix`, ordered by key
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Remove all entries whose key starts with `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;
}

/// libSQL implementation of `KeyValueRepository`
pub struct LibSqlKeyValueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlKeyValueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

// substr() keeps user-supplied prefixes free of LIKE wildcard handling
fn prefix_len(prefix: &str) -> i64 {
    i64::try_from(prefix.chars().count()).unwrap_or(i64::MAX)
}

impl KeyValueRepository for LibSqlKeyValueRepository<'_> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv_store WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get::<String>(0)?))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)",
                params![key, value, unix_millis_now()],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?", [key])
            .await?;
        Ok(rows > 0)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT key, value FROM kv_store WHERE substr(key, 1, ?) = ? ORDER BY key",
                params![prefix_len(prefix), prefix],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push((row.get::<String>(0)?, row.get::<String>(1)?));
        }
        Ok(entries)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM kv_store WHERE substr(key, 1, ?) = ?",
                params![prefix_len(prefix), prefix],
            )
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_get_delete() {
        let db = setup().await;
        let repo = LibSqlKeyValueRepository::new(db.connection());

        assert_eq!(repo.get("missing").await.unwrap(), None);

        repo.set("a", "1").await.unwrap();
        repo.set("a", "2").await.unwrap();
        assert_eq!(repo.get("a").await.unwrap().as_deref(), Some("2"));

        assert!(repo.delete("a").await.unwrap());
        assert!(!repo.delete("a").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_prefix_operations_treat_wildcards_literally() {
        let db = setup().await;
        let repo = LibSqlKeyValueRepository::new(db.connection());

        repo.set("idmap:user_1:trips:1", "r1").await.unwrap();
        repo.set("idmap:user_1:trips:2", "r2").await.unwrap();
        repo.set("idmap:userX1:trips:3", "r3").await.unwrap();

        let entries = repo.list_prefix("idmap:user_1:").await.unwrap();
        assert_eq!(
            entries,
            vec![
                ("idmap:user_1:trips:1".to_string(), "r1".to_string()),
                ("idmap:user_1:trips:2".to_string(), "r2".to_string()),
            ]
        );

        assert_eq!(repo.delete_prefix("idmap:user_1:").await.unwrap(), 2);
        assert_eq!(repo.list_prefix("idmap:").await.unwrap().len(), 1);
    }
}
