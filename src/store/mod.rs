use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Failure talking to the backing store. Authorization callers treat any
/// store failure as a denial.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable document content, keyed by document id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current content of a document, or `None` when no such document exists.
    async fn read(&self, document_id: Uuid) -> Result<Option<String>, StoreError>;

    /// Overwrite a document's content, unconditionally replacing whatever
    /// was stored before. Returns `false` when the document does not exist,
    /// in which case nothing is written.
    async fn write(&self, document_id: Uuid, content: &str) -> Result<bool, StoreError>;
}

/// Per-document, per-user access checks.
///
/// A user can view a document they own or hold any grant on; editing
/// additionally requires ownership or a grant with the edit flag set.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn can_view(&self, document_id: Uuid, user_id: &str) -> Result<bool, StoreError>;

    async fn can_edit(&self, document_id: Uuid, user_id: &str) -> Result<bool, StoreError>;
}
