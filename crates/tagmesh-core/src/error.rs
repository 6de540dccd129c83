use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, TagError>;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Canonical tag not found: {0}")]
    CanonicalNotFound(Uuid),

    #[error("Alias not found: {0}")]
    AliasNotFound(Uuid),

    #[error("Tag {tag} is not linked to video {video}")]
    VideoTagNotFound { video: Uuid, tag: Uuid },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Embedding or translation provider failure. Absorbed by the resolver,
    /// only surfaced by direct provider calls.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<TagError>,
    },
}

/// Coarse classification used by callers to map errors onto
/// 404 / 400 / 500 style responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Internal,
}

impl TagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TagError::CanonicalNotFound(_)
            | TagError::AliasNotFound(_)
            | TagError::VideoTagNotFound { .. } => ErrorKind::NotFound,
            TagError::InvalidInput(_) => ErrorKind::InvalidInput,
            TagError::Context { source, .. } => source.kind(),
            _ => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_invalid_input(&self) -> bool {
        self.kind() == ErrorKind::InvalidInput
    }
}

/// Attach the failing layer/operation to an error.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| TagError::Context {
            context: context.into(),
            source: Box::new(source),
        })
    }
}
