//! SQLite document store adapter
//!
//! Persists documents as JSON rows in a single `documents` table keyed by
//! (collection, id). Equality and array-contains filters are pushed down to
//! SQL via `json_extract`/`json_each` with bound JSON paths; patches run
//! inside an immediate transaction so array-union stays atomic with respect
//! to other writers. The change feed is per store instance (in-process
//! subscribers only).

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use super::{ChangeFeed, ChangeNotice, Document, DocumentStore, Filter, Patch};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SqliteStore {
    /// Open the store at the given path, creating file and schema if needed.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new document store: {}", db_path.display());
        } else {
            info!("Opened existing document store: {}", db_path.display());
        }

        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

        // WAL allows concurrent readers alongside the single writer
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        create_documents_table(&pool).await?;

        Ok(Self {
            pool,
            feed: ChangeFeed::default(),
        })
    }
}

async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn read_body(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &str,
) -> Result<Option<Value>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    match row {
        Some((body,)) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, collection: &str, body: Value) -> Result<String> {
        if !body.is_object() {
            return Err(Error::InvalidInput(format!(
                "document body for '{}' must be a JSON object",
                collection
            )));
        }
        let id = Uuid::new_v4().to_string();
        let encoded = serde_json::to_string(&body)?;
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(encoded)
            .execute(&self.pool)
            .await?;
        self.feed.notify(collection);
        Ok(id)
    }

    async fn put(&self, collection: &str, id: &str, body: Value) -> Result<()> {
        if !body.is_object() {
            return Err(Error::InvalidInput(format!(
                "document body for '{}' must be a JSON object",
                collection
            )));
        }
        let encoded = serde_json::to_string(&body)?;
        sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)
             ON CONFLICT (collection, id)
             DO UPDATE SET body = excluded.body, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(collection)
        .bind(id)
        .bind(encoded)
        .execute(&self.pool)
        .await?;
        self.feed.notify(collection);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut conn = self.pool.acquire().await?;
        Ok(read_body(&mut conn, collection, id)
            .await?
            .map(|body| Document {
                id: id.to_string(),
                body,
            }))
    }

    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // Immediate transaction takes the write lock before the read, so the
        // read-patch-write below cannot interleave with another writer
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let applied: Result<()> = async {
            let mut body = read_body(&mut conn, collection, id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("document {}/{}", collection, id)))?;
            patch.apply_to(&mut body);
            let encoded = serde_json::to_string(&body)?;
            sqlx::query(
                "UPDATE documents SET body = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE collection = ? AND id = ?",
            )
            .bind(encoded)
            .bind(collection)
            .bind(id)
            .execute(&mut *conn)
            .await?;
            Ok(())
        }
        .await;

        match applied {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                self.feed.notify(collection);
                Ok(())
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            self.feed.notify(collection);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
        for filter in filters {
            match filter {
                Filter::Eq(..) => sql.push_str(" AND json_extract(body, ?) = ?"),
                // json_each flattens scalars too; the json_type guard keeps
                // contains-on-non-array from matching
                Filter::Contains(..) => sql.push_str(
                    " AND json_type(body, ?) = 'array' AND EXISTS \
                     (SELECT 1 FROM json_each(documents.body, ?) WHERE json_each.value = ?)",
                ),
            }
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query_as::<_, (String, String)>(&sql).bind(collection.to_string());
        for filter in filters {
            match filter {
                Filter::Eq(field, value) => {
                    query = query.bind(json_path(field));
                    query = bind_filter_value(query, value)?;
                }
                Filter::Contains(field, value) => {
                    query = query.bind(json_path(field));
                    query = query.bind(json_path(field));
                    query = bind_filter_value(query, value)?;
                }
            }
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut documents = Vec::with_capacity(rows.len());
        for (id, body) in rows {
            documents.push(Document {
                id,
                body: serde_json::from_str(&body)?,
            });
        }
        Ok(documents)
    }

    fn changes(&self) -> broadcast::Receiver<ChangeNotice> {
        self.feed.subscribe()
    }
}

fn json_path(field: &str) -> String {
    format!("$.{}", field)
}

type DocumentRowQuery<'q> = sqlx::query::QueryAs<
    'q,
    sqlx::Sqlite,
    (String, String),
    sqlx::sqlite::SqliteArguments<'q>,
>;

fn bind_filter_value<'q>(query: DocumentRowQuery<'q>, value: &Value) -> Result<DocumentRowQuery<'q>> {
    match value {
        Value::String(s) => Ok(query.bind(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(query.bind(i))
            } else if let Some(f) = n.as_f64() {
                Ok(query.bind(f))
            } else {
                Err(Error::InvalidInput(format!(
                    "unsupported numeric filter value: {}",
                    n
                )))
            }
        }
        Value::Bool(b) => Ok(query.bind(*b)),
        other => Err(Error::InvalidInput(format!(
            "unsupported filter value: {}",
            other
        ))),
    }
}
