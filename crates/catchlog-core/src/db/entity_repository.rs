//! Record repository implementation

use libsql::{params, Connection, Value};

use crate::error::Result;
use crate::models::{Collection, EntityFilter};
use crate::util::unix_millis_now;

/// A record as stored on disk: index columns plus the JSON payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntity {
    /// Owner scope key, see `LocalStore`
    pub owner: String,
    pub collection: Collection,
    pub local_id: String,
    pub trip_id: Option<i64>,
    pub date: Option<String>,
    pub payload: String,
}

/// Trait for record storage operations (async)
#[allow(async_fn_in_trait)]
pub trait EntityRepository {
    /// Insert a new record; fails if the id is already taken
    async fn insert(&self, entity: &StoredEntity) -> Result<()>;

    /// Insert or replace a record by `(owner, collection, local_id)`
    async fn upsert(&self, entity: &StoredEntity) -> Result<()>;

    /// Fetch a record payload by id
    async fn get(&self, owner: &str, collection: Collection, local_id: &str)
        -> Result<Option<String>>;

    /// List record payloads, oldest first
    async fn list(
        &self,
        owner: &str,
        collection: Collection,
        filter: &EntityFilter,
    ) -> Result<Vec<String>>;

    /// Replace an existing record; returns false when it does not exist
    async fn update(&self, entity: &StoredEntity) -> Result<bool>;

    /// Delete a record; returns false when it did not exist
    async fn delete(&self, owner: &str, collection: Collection, local_id: &str) -> Result<bool>;

    /// Delete every record of `collection` that belongs to trip `trip_id`
    async fn delete_by_trip(&self, owner: &str, collection: Collection, trip_id: i64)
        -> Result<u64>;

    /// Count records in a collection
    async fn count(&self, owner: &str, collection: Collection) -> Result<u64>;

    /// Delete every record of `owner` in every collection
    async fn clear_all(&self, owner: &str) -> Result<u64>;
}

/// libSQL implementation of `EntityRepository`
pub struct LibSqlEntityRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlEntityRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn collect_payloads(&self, mut rows: libsql::Rows) -> Result<Vec<String>> {
        let mut payloads = Vec::new();
        while let Some(row) = rows.next().await? {
            payloads.push(row.get::<String>(0)?);
        }
        Ok(payloads)
    }
}

fn optional_integer(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

impl EntityRepository for LibSqlEntityRepository<'_> {
    async fn insert(&self, entity: &StoredEntity) -> Result<()> {
        let now = unix_millis_now();
        self.conn
            .execute(
                "INSERT INTO entities (owner, collection, local_id, trip_id, date, payload, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    entity.owner.as_str(),
                    entity.collection.as_str(),
                    entity.local_id.as_str(),
                    optional_integer(entity.trip_id),
                    optional_text(entity.date.as_deref()),
                    entity.payload.as_str(),
                    now,
                    now
                ],
            )
            .await?;
        Ok(())
    }

    async fn upsert(&self, entity: &StoredEntity) -> Result<()> {
        let now = unix_millis_now();
        self.conn
            .execute(
                "INSERT INTO entities (owner, collection, local_id, trip_id, date, payload, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(owner, collection, local_id) DO UPDATE SET
                    trip_id = excluded.trip_id,
                    date = excluded.date,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at",
                params![
                    entity.owner.as_str(),
                    entity.collection.as_str(),
                    entity.local_id.as_str(),
                    optional_integer(entity.trip_id),
                    optional_text(entity.date.as_deref()),
                    entity.payload.as_str(),
                    now,
                    now
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(
        &self,
        owner: &str,
        collection: Collection,
        local_id: &str,
    ) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload FROM entities WHERE owner = ? AND collection = ? AND local_id = ?",
                [owner, collection.as_str(), local_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get::<String>(0)?))
        } else {
            Ok(None)
        }
    }

    async fn list(
        &self,
        owner: &str,
        collection: Collection,
        filter: &EntityFilter,
    ) -> Result<Vec<String>> {
        let rows = match filter {
            EntityFilter::All => {
                self.conn
                    .query(
                        "SELECT payload FROM entities
                         WHERE owner = ? AND collection = ?
                         ORDER BY created_at ASC, local_id ASC",
                        [owner, collection.as_str()],
                    )
                    .await?
            }
            EntityFilter::TripId(trip_id) => {
                self.conn
                    .query(
                        "SELECT payload FROM entities
                         WHERE owner = ? AND collection = ? AND trip_id = ?
                         ORDER BY created_at ASC, local_id ASC",
                        params![owner, collection.as_str(), *trip_id],
                    )
                    .await?
            }
            EntityFilter::Date(date) => {
                self.conn
                    .query(
                        "SELECT payload FROM entities
                         WHERE owner = ? AND collection = ? AND date = ?
                         ORDER BY created_at ASC, local_id ASC",
                        [owner, collection.as_str(), date.as_str()],
                    )
                    .await?
            }
        };

        self.collect_payloads(rows).await
    }

    async fn update(&self, entity: &StoredEntity) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE entities SET trip_id = ?, date = ?, payload = ?, updated_at = ?
                 WHERE owner = ? AND collection = ? AND local_id = ?",
                params![
                    optional_integer(entity.trip_id),
                    optional_text(entity.date.as_deref()),
                    entity.payload.as_str(),
                    unix_millis_now(),
                    entity.owner.as_str(),
                    entity.collection.as_str(),
                    entity.local_id.as_str()
                ],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn delete(&self, owner: &str, collection: Collection, local_id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM entities WHERE owner = ? AND collection = ? AND local_id = ?",
                [owner, collection.as_str(), local_id],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn delete_by_trip(
        &self,
        owner: &str,
        collection: Collection,
        trip_id: i64,
    ) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM entities WHERE owner = ? AND collection = ? AND trip_id = ?",
                params![owner, collection.as_str(), trip_id],
            )
            .await?;
        Ok(rows)
    }

    async fn count(&self, owner: &str, collection: Collection) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM entities WHERE owner = ? AND collection = ?",
                [owner, collection.as_str()],
            )
            .await?;

        let count = if let Some(row) = rows.next().await? {
            row.get::<i64>(0)?
        } else {
            0
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn clear_all(&self, owner: &str) -> Result<u64> {
        let rows = self
            .conn
            .execute("DELETE FROM entities WHERE owner = ?", [owner])
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    const GUEST: &str = "guest";

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn weather_row(local_id: &str, trip_id: i64) -> StoredEntity {
        StoredEntity {
            owner: GUEST.to_string(),
            collection: Collection::WeatherLogs,
            local_id: local_id.to_string(),
            trip_id: Some(trip_id),
            date: None,
            payload: format!(r#"{{"id":"{local_id}","tripId":{trip_id}}}"#),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_get() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.insert(&weather_row("1-1", 1)).await.unwrap();
        let payload = repo.get(GUEST, Collection::WeatherLogs, "1-1").await.unwrap();
        assert!(payload.unwrap().contains("\"tripId\":1"));

        assert!(repo.get(GUEST, Collection::Trips, "1-1").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_duplicate_fails_but_upsert_replaces() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.insert(&weather_row("1-1", 1)).await.unwrap();
        assert!(repo.insert(&weather_row("1-1", 1)).await.is_err());

        let mut replacement = weather_row("1-1", 1);
        replacement.payload = r#"{"id":"1-1","tripId":1,"sky":"Clear"}"#.to_string();
        repo.upsert(&replacement).await.unwrap();

        assert_eq!(repo.count(GUEST, Collection::WeatherLogs).await.unwrap(), 1);
        let payload = repo.get(GUEST, Collection::WeatherLogs, "1-1").await.unwrap().unwrap();
        assert!(payload.contains("Clear"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_by_trip_and_delete_by_trip() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.insert(&weather_row("1-1", 1)).await.unwrap();
        repo.insert(&weather_row("1-2", 1)).await.unwrap();
        repo.insert(&weather_row("2-1", 2)).await.unwrap();

        let trip_one = repo
            .list(GUEST, Collection::WeatherLogs, &EntityFilter::TripId(1))
            .await
            .unwrap();
        assert_eq!(trip_one.len(), 2);

        let removed = repo.delete_by_trip(GUEST, Collection::WeatherLogs, 1).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.count(GUEST, Collection::WeatherLogs).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_by_date() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        for (id, date) in [("1", "2024-01-15"), ("2", "2024-01-16"), ("3", "2024-01-15")] {
            repo.insert(&StoredEntity {
                owner: GUEST.to_string(),
                collection: Collection::Trips,
                local_id: id.to_string(),
                trip_id: None,
                date: Some(date.to_string()),
                payload: format!(r#"{{"id":{id}}}"#),
            })
            .await
            .unwrap();
        }

        let matches = repo
            .list(
                GUEST,
                Collection::Trips,
                &EntityFilter::Date("2024-01-15".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_and_delete_report_missing_rows() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        assert!(!repo.update(&weather_row("9-9", 9)).await.unwrap());
        assert!(!repo.delete(GUEST, Collection::WeatherLogs, "9-9").await.unwrap());

        repo.insert(&weather_row("9-9", 9)).await.unwrap();
        assert!(repo.update(&weather_row("9-9", 9)).await.unwrap());
        assert!(repo.delete(GUEST, Collection::WeatherLogs, "9-9").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_all() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.insert(&weather_row("1-1", 1)).await.unwrap();
        repo.insert(&weather_row("1-2", 1)).await.unwrap();
        assert_eq!(repo.clear_all(GUEST).await.unwrap(), 2);
        assert_eq!(repo.count(GUEST, Collection::WeatherLogs).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_owners_do_not_see_each_other() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.insert(&weather_row("1-1", 1)).await.unwrap();
        let mut theirs = weather_row("1-1", 1);
        theirs.owner = "user:alice".to_string();
        repo.insert(&theirs).await.unwrap();

        assert_eq!(repo.count(GUEST, Collection::WeatherLogs).await.unwrap(), 1);
        assert_eq!(repo.clear_all("user:alice").await.unwrap(), 1);
        assert!(repo
            .get(GUEST, Collection::WeatherLogs, "1-1")
            .await
            .unwrap()
            .is_some());
    }
}
