//! Core data models for the media catalog

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CatalogError;

/// Release version tags recognised in filenames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionTag {
    #[serde(rename = "3D")]
    ThreeD,
    #[serde(rename = "4K")]
    FourK,
    #[serde(rename = "UHD")]
    Uhd,
    #[serde(rename = "HDR")]
    Hdr,
    #[serde(rename = "1080P")]
    FullHd,
    #[serde(rename = "720P")]
    Hd,
}

impl VersionTag {
    /// Every tag, in the order they are tried
    pub const ALL: [VersionTag; 6] = [
        VersionTag::ThreeD,
        VersionTag::FourK,
        VersionTag::Uhd,
        VersionTag::Hdr,
        VersionTag::FullHd,
        VersionTag::Hd,
    ];

    /// Get the stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionTag::ThreeD => "3D",
            VersionTag::FourK => "4K",
            VersionTag::Uhd => "UHD",
            VersionTag::Hdr => "HDR",
            VersionTag::FullHd => "1080P",
            VersionTag::Hd => "720P",
        }
    }

    /// Parse a tag case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for VersionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A media file ready to be recorded (everything but the store-assigned id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Original filename including extension
    pub display_title: String,
    /// Deduplication key: display title without its extension
    pub base_title: String,
    /// Year from a `(YYYY)` group, 0 when absent
    pub year: i32,
    /// Version tag, empty when none matched
    pub version: String,
    /// Suffix after the last dot, empty when none
    pub extension: String,
    /// File size at scan time
    pub size_bytes: u64,
    /// Last modification date as `dd/mm/yyyy`
    pub modified_date: String,
    /// Root the scan was launched from
    pub source_root: String,
}

/// One persisted catalog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Store-assigned identity
    pub id: i64,
    #[serde(flatten)]
    pub entry: CatalogEntry,
}

/// Why a file was reported as a duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Another file with the same base title is already cataloged
    BaseTitleRegistered,
}

impl DuplicateReason {
    /// Human readable reason
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateReason::BaseTitleRegistered => "base title already registered",
        }
    }
}

impl std::fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A file that was not cataloged because its base title is already present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub display_title: String,
    pub year: i32,
    pub version: String,
    pub source_root: String,
    pub reason: DuplicateReason,
}

impl DuplicateReport {
    /// Build a report for an entry rejected as a duplicate
    pub fn for_entry(entry: &CatalogEntry, reason: DuplicateReason) -> Self {
        Self {
            display_title: entry.display_title.clone(),
            year: entry.year,
            version: entry.version.clone(),
            source_root: entry.source_root.clone(),
            reason,
        }
    }
}

impl std::fmt::Display for DuplicateReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) [{}] {} -> {}",
            self.display_title, self.year, self.version, self.source_root, self.reason
        )
    }
}

/// What `ensure_schema` changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReport {
    /// Whether the table had to be created
    pub table_created: bool,
    /// Columns added to an existing table
    pub columns_added: Vec<String>,
    /// Rows whose base title was backfilled
    pub rows_backfilled: u64,
    /// Rows deleted to resolve duplicate keys
    pub duplicates_removed: u64,
    /// Superseded indexes that were present and dropped
    pub indexes_dropped: Vec<String>,
}

impl SchemaReport {
    /// True when the catalog was already at the current generation
    pub fn is_noop(&self) -> bool {
        !self.table_created
            && self.columns_added.is_empty()
            && self.rows_backfilled == 0
            && self.duplicates_removed == 0
            && self.indexes_dropped.is_empty()
    }
}

/// Result of one directory traversal
#[derive(Debug, Default, Serialize)]
pub struct ScanResult {
    /// Files handed to the visitor
    pub total_files: u64,
    /// Directories traversed
    pub total_dirs: u64,
    /// Entries skipped by the excluded marker or extension filter
    pub skipped_entries: u64,
    /// Files reached again through another path in the same run
    pub revisited_files: u64,
    /// Errors contained during traversal
    #[serde(skip)]
    pub errors: Vec<CatalogError>,
    /// Total scan duration in milliseconds
    pub duration_ms: u64,
}

impl ScanResult {
    /// Create a new empty scan result
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Check if the scan completed without errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of a full run: migration, traversal and cataloging
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub schema: SchemaReport,
    pub scan: ScanResult,
    /// New rows written
    pub inserted: u64,
    /// Inserts that failed for reasons other than a duplicate key
    pub insert_failures: u64,
    pub duplicates: Vec<DuplicateReport>,
}

impl RunSummary {
    /// Whether any duplicate was found
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }
}
