//! SQLite-backed document store.
//!
//! Local stand-in for the hosted store: one table of JSON documents, queried
//! with `json_extract`. Default order is insertion order.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{Document, DocumentData, DocumentList, Query};
use super::{DocumentStore, StoreError};

/// SQLite backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Database file path.
    #[serde(default = "default_path")]
    pub path: PathBuf,
}

fn default_path() -> PathBuf {
    PathBuf::from("cinetrend.db")
}

/// SQLite-backed document store.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open the database file, creating the table if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_error)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    fn load(conn: &Connection, document_id: &str) -> Result<Document, StoreError> {
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;

        match data {
            Some(json) => to_document(document_id.to_string(), &json),
            None => Err(StoreError::NotFound(document_id.to_string())),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn list_documents(&self, queries: &[Query]) -> Result<DocumentList, StoreError> {
        let mut filters = Vec::new();
        let mut filter_params: Vec<SqlValue> = Vec::new();
        let mut order_by = Vec::new();
        let mut order_params: Vec<SqlValue> = Vec::new();
        let mut limit = None;

        for query in queries {
            match query {
                Query::Equal { attribute, values } => {
                    if values.is_empty() {
                        return Ok(DocumentList::default());
                    }
                    let placeholders = vec!["?"; values.len()].join(", ");
                    filters.push(format!("json_extract(data, ?) IN ({})", placeholders));
                    filter_params.push(SqlValue::Text(json_path(attribute)?));
                    filter_params.extend(values.iter().map(to_sql_value));
                }
                Query::OrderDesc { attribute } => {
                    order_by.push("json_extract(data, ?) DESC".to_string());
                    order_params.push(SqlValue::Text(json_path(attribute)?));
                }
                Query::Limit(n) => limit = Some(*n),
            }
        }
        order_by.push("seq ASC".to_string());

        let where_clause = if filters.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", filters.join(" AND "))
        };

        let conn = self.conn()?;

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM documents{}", where_clause),
                params_from_iter(filter_params.iter()),
                |row| row.get(0),
            )
            .map_err(db_error)?;

        let mut sql = format!(
            "SELECT id, data FROM documents{} ORDER BY {}",
            where_clause,
            order_by.join(", ")
        );
        let mut all_params = filter_params;
        all_params.extend(order_params);
        if let Some(n) = limit {
            sql.push_str(" LIMIT ?");
            all_params.push(SqlValue::Integer(n as i64));
        }

        let mut stmt = conn.prepare(&sql).map_err(db_error)?;
        let rows = stmt
            .query_map(params_from_iter(all_params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_error)?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, data) = row.map_err(db_error)?;
            documents.push(to_document(id, &data)?);
        }

        Ok(DocumentList {
            total: total as u64,
            documents,
        })
    }

    async fn create_document(
        &self,
        document_id: &str,
        data: DocumentData,
    ) -> Result<Document, StoreError> {
        let json = serde_json::to_string(&data)
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents (id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![document_id, json, now],
        )
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => StoreError::Conflict(document_id.to_string()),
            _ => db_error(e),
        })?;

        Ok(Document {
            id: document_id.to_string(),
            data,
        })
    }

    async fn update_document(
        &self,
        document_id: &str,
        data: DocumentData,
    ) -> Result<Document, StoreError> {
        let patch = serde_json::to_string(&data)
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE documents SET data = json_patch(data, ?1), updated_at = ?2 WHERE id = ?3",
                params![patch, now, document_id],
            )
            .map_err(db_error)?;

        if updated == 0 {
            return Err(StoreError::NotFound(document_id.to_string()));
        }

        Self::load(&conn, document_id)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

fn db_error(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn json_path(attribute: &str) -> Result<String, StoreError> {
    if attribute.is_empty()
        || !attribute
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StoreError::Database(format!(
            "unsupported attribute name: {:?}",
            attribute
        )));
    }
    Ok(format!("$.{}", attribute))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn to_document(id: String, json: &str) -> Result<Document, StoreError> {
    let data: DocumentData = serde_json::from_str(json)
        .map_err(|e| StoreError::ParseError(format!("Stored document {} is not JSON: {}", id, e)))?;
    Ok(Document { id, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn data(value: Value) -> DocumentData {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn seeded() -> SqliteDocumentStore {
        let store = SqliteDocumentStore::in_memory().unwrap();
        for (id, term, count) in [("a", "alien", 2), ("b", "dune", 5), ("c", "heat", 2), ("d", "up", 9)] {
            store
                .create_document(id, data(json!({ "searchTerm": term, "count": count })))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_create_and_filter() {
        let store = seeded().await;
        let list = store
            .list_documents(&[Query::equal("searchTerm", "dune")])
            .await
            .unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.documents[0].id, "b");
        assert_eq!(list.documents[0].get_i64("count"), Some(5));
    }

    #[tokio::test]
    async fn test_filter_no_match() {
        let store = seeded().await;
        let list = store
            .list_documents(&[Query::equal("searchTerm", "missing")])
            .await
            .unwrap();
        assert_eq!(list.total, 0);
        assert!(list.documents.is_empty());
    }

    #[tokio::test]
    async fn test_order_desc_with_limit_breaks_ties_by_insertion() {
        let store = seeded().await;
        let list = store
            .list_documents(&[Query::order_desc("count"), Query::limit(3)])
            .await
            .unwrap();
        let ids: Vec<&str> = list.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "a"]);
        assert_eq!(list.total, 4);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = seeded().await;
        let updated = store
            .update_document("a", data(json!({ "count": 3 })))
            .await
            .unwrap();
        assert_eq!(updated.get_i64("count"), Some(3));
        assert_eq!(updated.get_str("searchTerm"), Some("alien"));
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = seeded().await;
        let result = store.update_document("zzz", data(json!({ "count": 1 }))).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let store = seeded().await;
        let result = store
            .create_document("a", data(json!({ "searchTerm": "again" })))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_rejects_unsafe_attribute() {
        let store = seeded().await;
        let result = store
            .list_documents(&[Query::order_desc("count') --")])
            .await;
        assert!(matches!(result, Err(StoreError::Database(_))));
    }

    #[tokio::test]
    async fn test_persists_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.db");

        {
            let store = SqliteDocumentStore::new(&path).unwrap();
            store
                .create_document("x", data(json!({ "searchTerm": "dune", "count": 1 })))
                .await
                .unwrap();
        }

        let reopened = SqliteDocumentStore::new(&path).unwrap();
        let list = reopened.list_documents(&[]).await.unwrap();
        assert_eq!(list.documents.len(), 1);
        assert_eq!(reopened.backend_name(), "sqlite");
    }
}
