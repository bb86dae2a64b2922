//! Error types for the media catalog

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while building the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    /// The catalog could not be opened or a statement against it failed
    StorageUnavailable,
    /// A schema migration step failed
    SchemaMigration,
    /// An insert was rejected by the unique base-title index
    ConstraintViolation,
    /// A directory or file could not be read during traversal
    TraversalIo,
    /// A filename field could not be parsed
    MetadataParse,
    /// The scan root is missing or is not a directory
    InvalidRoot,
}

impl CatalogErrorKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogErrorKind::StorageUnavailable => "storage_unavailable",
            CatalogErrorKind::SchemaMigration => "schema_migration",
            CatalogErrorKind::ConstraintViolation => "constraint_violation",
            CatalogErrorKind::TraversalIo => "traversal_io",
            CatalogErrorKind::MetadataParse => "metadata_parse",
            CatalogErrorKind::InvalidRoot => "invalid_root",
        }
    }
}

/// Represents an error raised by the catalog, the scanner or the extractor
#[derive(Debug, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct CatalogError {
    /// The kind of error
    pub kind: CatalogErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl CatalogError {
    /// Create a new catalog error
    pub fn new(kind: CatalogErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a storage error for the catalog at `path`
    pub fn storage(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::StorageUnavailable, path, message)
    }

    /// Create a migration error naming the failed step
    pub fn migration(step: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::new(
            CatalogErrorKind::SchemaMigration,
            None,
            format!("{}: {}", step, message.into()),
        )
    }

    /// Create a constraint violation error for a rejected base title
    pub fn constraint(base_title: &str) -> Self {
        Self::new(
            CatalogErrorKind::ConstraintViolation,
            None,
            format!("base title already present: {}", base_title),
        )
    }

    /// Create a traversal error
    pub fn traversal(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::TraversalIo, path, message)
    }

    /// Create a metadata parse error
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::MetadataParse, None, message)
    }

    /// Create an invalid root error
    pub fn invalid_root(path: PathBuf) -> Self {
        Self::new(
            CatalogErrorKind::InvalidRoot,
            Some(path.clone()),
            format!("Not a readable directory: {:?}", path),
        )
    }

    /// Attach a path to the error
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CatalogErrorKind::StorageUnavailable
                | CatalogErrorKind::SchemaMigration
                | CatalogErrorKind::InvalidRoot
        )
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        Self::traversal(None, err.to_string())
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => {
                Self::new(CatalogErrorKind::ConstraintViolation, None, err.to_string())
            }
            _ => Self::storage(None, err.to_string()),
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(CatalogError::storage(None, "gone").is_fatal());
        assert!(CatalogError::migration("create table", "boom").is_fatal());
        assert!(CatalogError::invalid_root(PathBuf::from("/nope")).is_fatal());
        assert!(!CatalogError::constraint("Movie").is_fatal());
        assert!(!CatalogError::traversal(None, "denied").is_fatal());
        assert!(!CatalogError::metadata("bad year").is_fatal());
    }

    #[test]
    fn test_migration_message_names_step() {
        let err = CatalogError::migration("create index idx_x", "disk I/O error");
        assert_eq!(err.kind, CatalogErrorKind::SchemaMigration);
        assert!(err.message.starts_with("create index idx_x"));
    }

    #[test]
    fn test_sqlite_constraint_maps_to_constraint_violation() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: CatalogError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert_eq!(err.kind, CatalogErrorKind::ConstraintViolation);

        let err: CatalogError = conn
            .execute("INSERT INTO missing VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert_eq!(err.kind, CatalogErrorKind::StorageUnavailable);
    }
}
