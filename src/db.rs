//! Catalog storage: schema migration and record access
//!
//! The store keeps only the catalog location. Every operation opens its own
//! connection and drops it before returning, so no transaction spans a scan.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, CatalogErrorKind, Result};
use crate::metadata;
use crate::models::{CatalogEntry, CatalogRecord, SchemaReport};

/// Name of the catalog table
pub const CATALOG_TABLE: &str = "media";

/// Unique index on the deduplication key
pub const BASE_TITLE_INDEX: &str = "idx_media_base_title";

/// Lookup index on (base title, year, version)
pub const BASE_TITLE_VARIANT_INDEX: &str = "idx_media_base_title_year_version";

/// Indexes from earlier schema generations, dropped on migration
pub const SUPERSEDED_INDEXES: &[&str] = &[
    "idx_media_display_title",
    "idx_media_display_title_year_version",
    "idx_media_source_path",
];

const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS media (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        display_title TEXT NOT NULL,
        base_title TEXT NOT NULL DEFAULT '',
        year INTEGER,
        version TEXT,
        extension TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        modified_date TEXT NOT NULL,
        source_root TEXT NOT NULL DEFAULT ''
    )";

const RECORD_COLUMNS: &str =
    "id, display_title, base_title, year, version, extension, size_bytes, modified_date, source_root";

/// One self-checking migration step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MigrationStep {
    /// Create the table with the current column set if it is absent
    CreateTable,
    /// Add a column introduced after the table's original shape
    AddColumn {
        name: &'static str,
        definition: &'static str,
    },
    /// Derive blank base titles from display title and extension
    BackfillBaseTitle,
    /// Keep the lowest id of every group sharing `key`
    RemoveDuplicates { key: &'static str },
    DropIndex(&'static str),
    CreateIndex {
        name: &'static str,
        sql: &'static str,
    },
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStep::CreateTable => write!(f, "create table {}", CATALOG_TABLE),
            MigrationStep::AddColumn { name, .. } => write!(f, "add column {}", name),
            MigrationStep::BackfillBaseTitle => write!(f, "backfill base_title"),
            MigrationStep::RemoveDuplicates { key } => write!(f, "remove duplicates by {}", key),
            MigrationStep::DropIndex(name) => write!(f, "drop index {}", name),
            MigrationStep::CreateIndex { name, .. } => write!(f, "create index {}", name),
        }
    }
}

/// Ordered steps bringing any schema generation to the current one
const MIGRATION_STEPS: &[MigrationStep] = &[
    MigrationStep::CreateTable,
    MigrationStep::AddColumn {
        name: "version",
        definition: "version TEXT",
    },
    MigrationStep::AddColumn {
        name: "source_root",
        definition: "source_root TEXT NOT NULL DEFAULT ''",
    },
    MigrationStep::AddColumn {
        name: "base_title",
        definition: "base_title TEXT NOT NULL DEFAULT ''",
    },
    MigrationStep::BackfillBaseTitle,
    MigrationStep::RemoveDuplicates { key: "base_title" },
    MigrationStep::RemoveDuplicates {
        key: "display_title",
    },
    MigrationStep::DropIndex("idx_media_display_title"),
    MigrationStep::DropIndex("idx_media_display_title_year_version"),
    MigrationStep::DropIndex("idx_media_source_path"),
    MigrationStep::CreateIndex {
        name: BASE_TITLE_INDEX,
        sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_media_base_title ON media(base_title)",
    },
    MigrationStep::CreateIndex {
        name: BASE_TITLE_VARIANT_INDEX,
        sql: "CREATE INDEX IF NOT EXISTS idx_media_base_title_year_version ON media(base_title, year, version)",
    },
];

/// Index description returned by [`CatalogStore::indexes`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
}

/// Persisted media catalog
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    /// Create a store for the catalog at `path`; nothing is opened yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the catalog file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection for a single operation
    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.path).map_err(|e| {
            CatalogError::storage(
                Some(self.path.clone()),
                format!("cannot open catalog: {}", e),
            )
        })
    }

    /// Bring the catalog to the current schema generation
    ///
    /// Safe to call on every start: each step checks the current state before
    /// changing anything, so a second call reports no changes.
    pub fn ensure_schema(&self) -> Result<SchemaReport> {
        let mut conn = self.connect()?;
        let mut report = SchemaReport::default();

        for step in MIGRATION_STEPS {
            apply_step(&mut conn, *step, &mut report)
                .map_err(|e| CatalogError::migration(step, e.to_string()))?;
        }

        if report.is_noop() {
            log::debug!("Catalog {:?} already at current schema", self.path);
        } else {
            log::info!(
                "Catalog {:?} migrated: created={} columns={:?} backfilled={} duplicates_removed={} indexes_dropped={:?}",
                self.path,
                report.table_created,
                report.columns_added,
                report.rows_backfilled,
                report.duplicates_removed,
                report.indexes_dropped
            );
        }
        Ok(report)
    }

    /// Whether a row with exactly this base title exists
    pub fn exists(&self, base_title: &str) -> Result<bool> {
        let conn = self.connect()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM media WHERE base_title = ?1 LIMIT 1",
                [base_title],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Whether a row with this base title, year and version exists
    pub fn exists_variant(&self, base_title: &str, year: i32, version: &str) -> Result<bool> {
        let conn = self.connect()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM media WHERE base_title = ?1 AND year = ?2 AND version = ?3 LIMIT 1",
                params![base_title, year, version],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a new record and return its id
    ///
    /// A duplicate base title is returned as a `ConstraintViolation` error and
    /// leaves the existing row untouched.
    pub fn insert(&self, entry: &CatalogEntry) -> Result<i64> {
        let conn = self.connect()?;
        let size = i64::try_from(entry.size_bytes).unwrap_or(i64::MAX);
        conn.execute(
            "INSERT INTO media
             (display_title, base_title, year, version, extension, size_bytes, modified_date, source_root)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.display_title,
                entry.base_title,
                entry.year,
                entry.version,
                entry.extension,
                size,
                entry.modified_date,
                entry.source_root,
            ],
        )
        .map_err(|e| match CatalogError::from(e) {
            err if err.kind == CatalogErrorKind::ConstraintViolation => {
                CatalogError::constraint(&entry.base_title)
            }
            err => err.with_path(self.path.clone()),
        })?;
        Ok(conn.last_insert_rowid())
    }

    /// Look up a record by base title
    pub fn find(&self, base_title: &str) -> Result<Option<CatalogRecord>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {} FROM media WHERE base_title = ?1", RECORD_COLUMNS);
        let record = conn.query_row(&sql, [base_title], record_from_row).optional()?;
        Ok(record)
    }

    /// All records ordered by id
    pub fn records(&self) -> Result<Vec<CatalogRecord>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {} FROM media ORDER BY id", RECORD_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Number of records
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Column names of the catalog table
    pub fn columns(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('media') ORDER BY cid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    /// Indexes on the catalog table, excluding SQLite's implicit ones
    pub fn indexes(&self) -> Result<Vec<IndexInfo>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT name, \"unique\" FROM pragma_index_list('media')
             WHERE name NOT LIKE 'sqlite_autoindex%' ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(IndexInfo {
                name: row.get(0)?,
                unique: row.get::<_, i64>(1)? != 0,
            })
        })?;

        let mut indexes = Vec::new();
        for row in rows {
            indexes.push(row?);
        }
        Ok(indexes)
    }

    /// Remove the whole catalog file
    ///
    /// Returns false when there was nothing to delete.
    pub fn delete_catalog(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Catalog deleted: {:?}", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Catalog does not exist: {:?}", self.path);
                Ok(false)
            }
            Err(e) => Err(CatalogError::storage(
                Some(self.path.clone()),
                format!("cannot delete catalog: {}", e),
            )),
        }
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
    Ok(CatalogRecord {
        id: row.get(0)?,
        entry: CatalogEntry {
            display_title: row.get(1)?,
            base_title: row.get(2)?,
            year: row.get::<_, Option<i32>>(3)?.unwrap_or(0),
            version: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            extension: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            size_bytes: row.get::<_, i64>(6)?.max(0) as u64,
            modified_date: row.get(7)?,
            source_root: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        },
    })
}

fn apply_step(
    conn: &mut Connection,
    step: MigrationStep,
    report: &mut SchemaReport,
) -> rusqlite::Result<()> {
    match step {
        MigrationStep::CreateTable => {
            report.table_created = !table_exists(conn)?;
            conn.execute(CREATE_TABLE_SQL, [])?;
        }
        MigrationStep::AddColumn { name, definition } => {
            if !column_exists(conn, name)? {
                conn.execute(&format!("ALTER TABLE media ADD COLUMN {}", definition), [])?;
                report.columns_added.push(name.to_string());
            }
        }
        MigrationStep::BackfillBaseTitle => {
            report.rows_backfilled = backfill_base_titles(conn)?;
        }
        MigrationStep::RemoveDuplicates { key } => {
            // NULL keys never collide under a unique index
            let removed = conn.execute(
                &format!(
                    "DELETE FROM media WHERE {key} IS NOT NULL
                     AND id NOT IN (SELECT MIN(id) FROM media WHERE {key} IS NOT NULL GROUP BY {key})"
                ),
                [],
            )?;
            report.duplicates_removed += removed as u64;
        }
        MigrationStep::DropIndex(name) => {
            if index_exists(conn, name)? {
                conn.execute(&format!("DROP INDEX IF EXISTS {}", name), [])?;
                report.indexes_dropped.push(name.to_string());
            }
        }
        MigrationStep::CreateIndex { sql, .. } => {
            conn.execute(sql, [])?;
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [CATALOG_TABLE],
        |row| row.get(0),
    )
}

fn column_exists(conn: &Connection, column: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('media') WHERE lower(name) = lower(?1)",
        [column],
        |row| row.get(0),
    )
}

fn index_exists(conn: &Connection, index: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'index' AND name = ?1",
        [index],
        |row| row.get(0),
    )
}

/// Fill blank base titles using the same rule as live scanning
///
/// A title made only of whitespace keys to itself; such rows stay selected but
/// the update leaves them alone, so they are not counted again.
fn backfill_base_titles(conn: &mut Connection) -> rusqlite::Result<u64> {
    let tx = conn.transaction()?;
    let mut updated = 0u64;
    {
        let mut select = tx.prepare(
            "SELECT id, display_title, extension FROM media
             WHERE base_title IS NULL OR TRIM(base_title) = ''",
        )?;
        let pending = select
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut update = tx.prepare(
            "UPDATE media SET base_title = ?1 WHERE id = ?2 AND base_title IS NOT ?1",
        )?;
        for (id, display_title, extension) in pending {
            let base = metadata::base_title(&display_title, extension.as_deref().unwrap_or(""));
            updated += update.execute(params![base, id])? as u64;
        }
    }
    tx.commit()?;
    Ok(updated)
}
