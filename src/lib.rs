//! Media catalog builder
//!
//! Walks a directory tree, derives a deduplication key from every filename and
//! records new titles in a SQLite catalog that migrates itself forward from any
//! earlier schema generation on every run.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod metadata;
pub mod models;
pub mod progress;
pub mod scanner;

pub use catalog::{run_catalog, BuildStats, CatalogBuilder, DuplicateSink};
pub use config::CatalogConfig;
pub use db::{CatalogStore, IndexInfo};
pub use error::{CatalogError, CatalogErrorKind, Result};
pub use metadata::MediaMetadata;
pub use models::{
    CatalogEntry, CatalogRecord, DuplicateReason, DuplicateReport, RunSummary, ScanResult,
    SchemaReport, VersionTag,
};
pub use progress::{ProgressReporter, RunPhase};
pub use scanner::{scan_tree, FileVisitor, ScanProgress};
