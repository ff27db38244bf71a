use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Error as SqlxError;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{DocumentStore, PermissionStore, StoreError};

/// Postgres-backed document and permission store.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE documents (
///     id         UUID PRIMARY KEY,
///     title      TEXT NOT NULL,
///     content    TEXT NOT NULL DEFAULT '',
///     owner_id   TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE document_grants (
///     document_id UUID NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
///     user_id     TEXT NOT NULL,
///     can_edit    BOOLEAN NOT NULL DEFAULT FALSE,
///     granted_by  TEXT NOT NULL,
///     granted_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (document_id, user_id)
/// );
/// ```
///
/// Re-granting access for the same (document, user) pair updates the
/// existing row through the unique constraint; the sharing UI that writes
/// grants lives outside this service.
pub struct DbDocs {
    pool: PgPool,
}

impl DbDocs {
    /// Create a new database connection pool
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600)) // Close idle connections after 10 minutes
            .max_lifetime(Duration::from_secs(1800)) // Recycle connections after 30 minutes
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    pub fn _pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for DbDocs {
    async fn read(&self, document_id: Uuid) -> Result<Option<String>, StoreError> {
        debug!("Loading content of document {}", document_id);
        let content = sqlx::query_scalar::<_, String>(
            "SELECT content FROM documents WHERE id = $1",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(content)
    }

    async fn write(&self, document_id: Uuid, content: &str) -> Result<bool, StoreError> {
        debug!(
            "Writing {} characters to document {}",
            content.len(),
            document_id
        );
        let result = sqlx::query(
            "UPDATE documents SET content = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(document_id)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PermissionStore for DbDocs {
    async fn can_view(&self, document_id: Uuid, user_id: &str) -> Result<bool, StoreError> {
        // The owner always has view access; any grant, read-only or not,
        // also does.
        let allowed = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM documents d
                LEFT JOIN document_grants g
                    ON g.document_id = d.id AND g.user_id = $2
                WHERE d.id = $1
                    AND (d.owner_id = $2 OR g.user_id IS NOT NULL)
            )
            "#,
        )
        .bind(document_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(allowed)
    }

    async fn can_edit(&self, document_id: Uuid, user_id: &str) -> Result<bool, StoreError> {
        let allowed = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM documents d
                LEFT JOIN document_grants g
                    ON g.document_id = d.id AND g.user_id = $2 AND g.can_edit = TRUE
                WHERE d.id = $1
                    AND (d.owner_id = $2 OR g.user_id IS NOT NULL)
            )
            "#,
        )
        .bind(document_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(allowed)
    }
}
