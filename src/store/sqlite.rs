//! Row-style persistence in a SQLite database file.
//!
//! Each item is one row: the schema fields are kept as a JSON object in the
//! `fields` column so one table serves every configured field set.
//! Timestamps are stored as RFC 3339 text with nanosecond precision.
//!
//! rusqlite is synchronous, so every call runs on the blocking pool while
//! holding the connection mutex. Each mutation is a single statement, and
//! its write ticket is claimed only once the connection is held. A mutation
//! abandoned while waiting for the connection therefore never runs.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde_json::{Map, Value as JsonValue};

use super::{self_test_value, ItemStore, StoreError, StoreResult, WriteTicket};
use crate::models::Item;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id TEXT PRIMARY KEY,
        fields TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS self_test (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        test_value TEXT NOT NULL
    );
";

const ITEM_COLUMNS: &str = "id, fields, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteItemStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteItemStore {
    /// Open (or create) the database file and ensure the `items` table exists
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::unavailable_with(format!("cannot create {}", parent.display()), e)
                })?;
            }
            let conn = Connection::open(&path).map_err(classify)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;").map_err(classify)?;
            Self::from_connection(conn)
        })
        .await
        .map_err(|e| StoreError::unavailable_with("SQLite open task failed", e))?
    }

    /// A private in-memory database, dropped with the store
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory().map_err(classify)?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA).map_err(classify)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::unavailable_with("SQLite task failed", e))?
    }

    /// Like `with_conn`, but `f` only runs if `ticket` can still be claimed
    async fn write_with_conn<T, F>(&self, ticket: &WriteTicket, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let ticket = ticket.clone();
        self.with_conn(move |conn| {
            ticket.begin()?;
            f(conn)
        })
        .await
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn load_all(&self) -> StoreResult<Vec<Item>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(&format!("SELECT {} FROM items ORDER BY rowid", ITEM_COLUMNS))
                .map_err(classify)?;
            let rows = stmt.query_map([], read_row).map_err(classify)?;
            let mut items = Vec::new();
            for row in rows {
                items.push(decode(row.map_err(classify)?)?);
            }
            tracing::debug!("Loaded {} items from SQLite", items.len());
            Ok(items)
        })
        .await
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Item> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                    params![id],
                    read_row,
                )
                .optional()
                .map_err(classify)?;
            match row {
                Some(row) => decode(row),
                None => Err(StoreError::not_found(id)),
            }
        })
        .await
    }

    async fn insert(&self, item: &Item, ticket: &WriteTicket) -> StoreResult<()> {
        let item = item.clone();
        self.write_with_conn(ticket, move |conn| {
            let fields = encode_fields(&item.fields)?;
            let result = conn.execute(
                "INSERT INTO items (id, fields, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    item.id,
                    fields,
                    format_timestamp(item.created_at),
                    format_timestamp(item.updated_at)
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::conflict(item.id))
                }
                Err(err) => Err(classify(err)),
            }
        })
        .await
    }

    async fn update(
        &self,
        id: &str,
        fields: &Map<String, JsonValue>,
        updated_at: DateTime<Utc>,
        ticket: &WriteTicket,
    ) -> StoreResult<Item> {
        let id = id.to_string();
        let fields = encode_fields(fields)?;
        self.write_with_conn(ticket, move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "UPDATE items SET fields = ?2, updated_at = ?3 WHERE id = ?1 RETURNING {}",
                        ITEM_COLUMNS
                    ),
                    params![id, fields, format_timestamp(updated_at)],
                    read_row,
                )
                .optional()
                .map_err(classify)?;
            match row {
                Some(row) => decode(row),
                None => Err(StoreError::not_found(id)),
            }
        })
        .await
    }

    async fn remove(&self, id: &str, ticket: &WriteTicket) -> StoreResult<()> {
        let id = id.to_string();
        self.write_with_conn(ticket, move |conn| {
            let removed = conn
                .execute("DELETE FROM items WHERE id = ?1", params![id])
                .map_err(classify)?;
            if removed == 0 {
                return Err(StoreError::not_found(id));
            }
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> StoreResult<String> {
        self.with_conn(|conn| {
            conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0))
                .map_err(classify)
        })
        .await
    }

    async fn self_test(&self) -> StoreResult<String> {
        let written = self_test_value();
        self.with_conn(move |conn| {
            conn.execute("INSERT INTO self_test (test_value) VALUES (?1)", params![written])
                .map_err(classify)?;
            let read: String = conn
                .query_row(
                    "SELECT test_value FROM self_test ORDER BY id DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .map_err(classify)?;
            if read != written {
                return Err(StoreError::corrupt(format!(
                    "self_test read back '{}', expected '{}'",
                    read, written
                )));
            }
            Ok(read)
        })
        .await
    }
}

/// Raw column values of one `items` row
struct RawRow {
    id: String,
    fields: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        fields: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn decode(raw: RawRow) -> StoreResult<Item> {
    let fields = match serde_json::from_str::<JsonValue>(&raw.fields) {
        Ok(JsonValue::Object(map)) => map,
        Ok(_) => {
            return Err(StoreError::corrupt(format!(
                "fields of item {} are not a JSON object",
                raw.id
            )))
        }
        Err(e) => {
            return Err(StoreError::corrupt_with(
                format!("fields of item {} are not valid JSON", raw.id),
                e,
            ))
        }
    };
    Ok(Item {
        created_at: parse_timestamp(&raw.id, "created_at", &raw.created_at)?,
        updated_at: parse_timestamp(&raw.id, "updated_at", &raw.updated_at)?,
        id: raw.id,
        fields,
    })
}

fn encode_fields(fields: &Map<String, JsonValue>) -> StoreResult<String> {
    serde_json::to_string(fields).map_err(|e| StoreError::corrupt_with("failed to encode fields", e))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(id: &str, column: &str, value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt_with(format!("{} of item {} is not a timestamp", column, id), e))
}

/// Map a rusqlite error onto the store taxonomy
fn classify(err: rusqlite::Error) -> StoreError {
    let corrupt = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            matches!(failure.code, ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase)
        }
        rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..) => true,
        _ => false,
    };
    if corrupt {
        StoreError::corrupt_with("unreadable data in SQLite database", err)
    } else {
        StoreError::unavailable_with("SQLite operation failed", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerError, ItemController};
    use crate::ids::{IdGenerator, IdStrategy};
    use crate::schema::ItemSchema;
    use serde_json::json;
    use std::time::Duration;

    fn ticket() -> WriteTicket {
        WriteTicket::new()
    }

    fn item(id: &str, name: &str) -> Item {
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!(name));
        fields.insert("price".to_string(), json!(9.99));
        Item::new(id.to_string(), fields, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let original = item("1", "Widget");
        store.insert(&original, &ticket()).await.unwrap();

        let loaded = store.get_by_id("1").await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_load_all_in_insertion_order() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        store.insert(&item("b", "second"), &ticket()).await.unwrap();
        store.insert(&item("a", "first"), &ticket()).await.unwrap();

        let ids: Vec<_> = store.load_all().await.unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        store.insert(&item("1", "a"), &ticket()).await.unwrap();
        let err = store.insert(&item("1", "b"), &ticket()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { id } if id == "1"));
    }

    #[tokio::test]
    async fn test_update_returns_row() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let original = item("1", "a");
        store.insert(&original, &ticket()).await.unwrap();

        let mut fields = original.fields.clone();
        fields.insert("price".to_string(), json!(12.5));
        let later = original.updated_at + chrono::Duration::milliseconds(3);
        let updated = store.update("1", &fields, later, &ticket()).await.unwrap();

        assert_eq!(updated.fields.get("price"), Some(&json!(12.5)));
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.updated_at, later);
    }

    #[tokio::test]
    async fn test_missing_rows_not_found() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        assert!(matches!(store.get_by_id("x").await.unwrap_err(), StoreError::NotFound { .. }));
        assert!(matches!(
            store.update("x", &Map::new(), Utc::now(), &ticket()).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(store.remove("x", &ticket()).await.unwrap_err(), StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_deletes_row() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        store.insert(&item("1", "a"), &ticket()).await.unwrap();
        store.remove("1", &ticket()).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_fields_column_is_corrupt() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO items (id, fields, created_at, updated_at) VALUES ('1', '[1,2]', 'x', 'x')",
                    [],
                )
                .map_err(classify)?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.get_by_id("1").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(matches!(store.load_all().await.unwrap_err(), StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("items.db");
        let original = item("1", "Widget");

        {
            let store = SqliteItemStore::open(&path).await.unwrap();
            store.insert(&original, &ticket()).await.unwrap();
        }

        let store = SqliteItemStore::open(&path).await.unwrap();
        assert_eq!(store.get_by_id("1").await.unwrap(), original);
        assert!(!store.health_check().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_self_test_round_trip() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let first = store.self_test().await.unwrap();
        assert!(first.starts_with("test-"));
        store.self_test().await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_delete_is_never_applied() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let controller = ItemController::new(
            Arc::new(store.clone()),
            ItemSchema::basic(),
            IdGenerator::new(IdStrategy::Timestamp),
            Duration::from_millis(50),
        );
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!("Widget"));
        let created = controller.create(&fields).await.unwrap();

        // Another connection user holds the database well past the timeout.
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let conn = Arc::clone(&store.conn);
        let holder = std::thread::spawn(move || {
            let _conn = conn.lock();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(300));
        });
        locked_rx.recv().unwrap();

        let err = controller.delete(&created.id).await.unwrap_err();
        assert!(matches!(err, ControllerError::Store(StoreError::Unavailable { .. })));

        holder.join().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.get_by_id(&created.id).await.unwrap(), created);

        controller.delete(&created.id).await.unwrap();
        assert!(matches!(
            store.get_by_id(&created.id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }
}
