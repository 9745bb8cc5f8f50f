//! PostgresBackend - Self-hosted document storage
//!
//! TigerStyle: One JSONB table, explicit schema, classified errors.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS documents (
//!     collection TEXT NOT NULL,
//!     id TEXT NOT NULL,
//!     fields JSONB NOT NULL DEFAULT '{}',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     PRIMARY KEY (collection, id)
//! );
//! ```
//!
//! Ordered queries sort by the JSONB value at the field path, then by
//! insertion time. A missing field sorts like null.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::backend::DocumentBackend;
use crate::constants::{POSTGRES_CONNECTIONS_MAX, QUERY_LIMIT_MAX};
use crate::document::{assert_collection_name, merge_fields, Document, DocumentPath, Fields, Query, SortDirection};
use crate::error::{BackendError, BackendErrorKind, StoreResult};

// =============================================================================
// PostgresBackend
// =============================================================================

/// PostgreSQL document backend.
#[derive(Debug)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Connect and create the schema if needed.
    ///
    /// # Errors
    /// Returns error if the connection or schema creation fails.
    pub async fn connect(connection_string: &str, timeout: Duration) -> StoreResult<Self> {
        // Preconditions
        assert!(
            !connection_string.is_empty(),
            "connection string cannot be empty"
        );

        let pool = PgPoolOptions::new()
            .max_connections(POSTGRES_CONNECTIONS_MAX)
            .acquire_timeout(timeout)
            .connect(connection_string)
            .await
            .map_err(|e| classify("connect", e))?;

        Self::from_pool(pool).await
    }

    /// Use an existing pool.
    ///
    /// # Errors
    /// Returns error if schema creation fails.
    pub async fn from_pool(pool: PgPool) -> StoreResult<Self> {
        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                fields JSONB NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, id)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(collection, created_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| classify("create schema", e))?;

        Ok(())
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

fn row_to_document(row: &PgRow) -> StoreResult<Document> {
    let id: String = row
        .try_get("id")
        .map_err(|e| BackendError::internal(e.to_string()))?;
    let fields: serde_json::Value = row
        .try_get("fields")
        .map_err(|e| BackendError::internal(e.to_string()))?;

    match fields {
        serde_json::Value::Object(fields) => Ok(Document::new(id, fields)),
        other => Err(BackendError::internal(format!(
            "document {id} has non-object fields: {other}"
        ))),
    }
}

/// Classify a driver error by SQLSTATE.
fn classify(operation: &str, err: sqlx::Error) -> BackendError {
    let kind = match &err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // undefined_table, invalid_catalog_name
            Some("42P01" | "3D000") => BackendErrorKind::NotFound,
            Some("42501") => BackendErrorKind::PermissionDenied,
            Some("28000" | "28P01") => BackendErrorKind::Unauthenticated,
            Some(code) if code.starts_with("08") || code.starts_with("57") => {
                BackendErrorKind::Unavailable
            }
            Some(code) if code.starts_with("22") => BackendErrorKind::InvalidArgument,
            _ => BackendErrorKind::Internal,
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => BackendErrorKind::Unavailable,
        sqlx::Error::Configuration(_) => BackendErrorKind::InvalidArgument,
        _ => BackendErrorKind::Internal,
    };
    BackendError::new(kind, format!("failed to {operation}: {err}"))
}

// =============================================================================
// DocumentBackend Implementation
// =============================================================================

#[async_trait]
impl DocumentBackend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<Document> {
        assert_collection_name(collection);

        let id = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(serde_json::Value::Object(fields.clone()))
            .execute(&self.pool)
            .await
            .map_err(|e| classify("add document", e))?;

        Ok(Document::new(id, fields))
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let limit = query.max_results().unwrap_or(QUERY_LIMIT_MAX);

        let rows = match query.ordering() {
            Some((field, direction)) => {
                let order = match direction {
                    SortDirection::Ascending => "ASC NULLS FIRST",
                    SortDirection::Descending => "DESC NULLS LAST",
                };
                let sql = format!(
                    "SELECT id, fields FROM documents WHERE collection = $1 \
                     ORDER BY fields #> $2 {order}, created_at ASC LIMIT $3"
                );
                let path: Vec<String> = field.split('.').map(str::to_string).collect();
                sqlx::query(&sql)
                    .bind(query.collection_name())
                    .bind(path)
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query(
                    "SELECT id, fields FROM documents WHERE collection = $1 \
                     ORDER BY created_at ASC LIMIT $2",
                )
                .bind(query.collection_name())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| classify("query documents", e))?;

        let documents = rows.iter().map(row_to_document).collect::<StoreResult<Vec<_>>>()?;

        // Postcondition
        assert!(
            documents.len() <= limit,
            "result count {} exceeds limit {}",
            documents.len(),
            limit
        );
        Ok(documents)
    }

    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let row = sqlx::query("SELECT id, fields FROM documents WHERE collection = $1 AND id = $2")
            .bind(path.collection())
            .bind(path.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("get document", e))?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> StoreResult<()> {
        if !merge {
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, fields)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, id) DO UPDATE SET
                    fields = EXCLUDED.fields,
                    updated_at = now()
                "#,
            )
            .bind(path.collection())
            .bind(path.id())
            .bind(serde_json::Value::Object(fields))
            .execute(&self.pool)
            .await
            .map_err(|e| classify("replace document", e))?;
            return Ok(());
        }

        // Deep merge needs read-modify-write under a row lock.
        let mut tx = self.pool.begin().await.map_err(|e| classify("begin merge", e))?;

        sqlx::query(
            "INSERT INTO documents (collection, id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(path.collection())
        .bind(path.id())
        .execute(&mut *tx)
        .await
        .map_err(|e| classify("create document", e))?;

        let current: serde_json::Value = sqlx::query_scalar(
            "SELECT fields FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(path.collection())
        .bind(path.id())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify("lock document", e))?;

        let mut merged = match current {
            serde_json::Value::Object(existing) => existing,
            _ => Fields::new(),
        };
        merge_fields(&mut merged, fields);

        sqlx::query(
            "UPDATE documents SET fields = $3, updated_at = now() WHERE collection = $1 AND id = $2",
        )
        .bind(path.collection())
        .bind(path.id())
        .bind(serde_json::Value::Object(merged))
        .execute(&mut *tx)
        .await
        .map_err(|e| classify("merge document", e))?;

        tx.commit().await.map_err(|e| classify("commit merge", e))
    }

    async fn probe(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1 FROM documents LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("probe documents table", e))?;
        Ok(())
    }
}

// =============================================================================
// Tests (require running Postgres)
// =============================================================================
