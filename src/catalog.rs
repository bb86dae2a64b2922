//! Per-file cataloging and the full run: migrate, scan, collect duplicates

use std::fs::Metadata;
use std::path::Path;
use std::sync::mpsc;

use crate::config::CatalogConfig;
use crate::db::CatalogStore;
use crate::error::{CatalogError, CatalogErrorKind, Result};
use crate::metadata::MediaMetadata;
use crate::models::{DuplicateReason, DuplicateReport, RunSummary};
use crate::progress::{ProgressReporter, RunPhase};
use crate::scanner::{self, FileVisitor};

/// Receives duplicate reports as they are found
pub trait DuplicateSink {
    fn report(&mut self, report: DuplicateReport);
}

impl DuplicateSink for Vec<DuplicateReport> {
    fn report(&mut self, report: DuplicateReport) {
        self.push(report);
    }
}

impl DuplicateSink for mpsc::Sender<DuplicateReport> {
    fn report(&mut self, report: DuplicateReport) {
        if self.send(report).is_err() {
            log::warn!("Duplicate collector closed, report dropped");
        }
    }
}

/// Counters kept by [`CatalogBuilder`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub inserted: u64,
    pub duplicates: u64,
    pub insert_failures: u64,
    pub lookup_failures: u64,
}

/// Decides for each discovered file whether it is new or a duplicate
pub struct CatalogBuilder<'a> {
    store: &'a CatalogStore,
    source_root: String,
    sink: &'a mut dyn DuplicateSink,
    stats: BuildStats,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(
        store: &'a CatalogStore,
        source_root: impl Into<String>,
        sink: &'a mut dyn DuplicateSink,
    ) -> Self {
        Self {
            store,
            source_root: source_root.into(),
            sink,
            stats: BuildStats::default(),
        }
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Catalog one file, or report it when its base title is taken
    pub fn process(&mut self, path: &Path, metadata: &Metadata) {
        let entry = MediaMetadata::from_file(path, metadata).into_entry(self.source_root.as_str());

        match self.store.exists(&entry.base_title) {
            Ok(true) => {
                log::debug!("Duplicate base title {:?} at {:?}", entry.base_title, path);
                self.stats.duplicates += 1;
                self.sink.report(DuplicateReport::for_entry(
                    &entry,
                    DuplicateReason::BaseTitleRegistered,
                ));
                return;
            }
            Ok(false) => {}
            Err(e) => {
                log::error!("Lookup failed for {:?}: {}", path, e);
                self.stats.lookup_failures += 1;
                return;
            }
        }

        match self.store.insert(&entry) {
            Ok(id) => {
                log::debug!(
                    "Cataloged #{}: {} ({}) {}",
                    id,
                    entry.display_title,
                    entry.year,
                    entry.version
                );
                self.stats.inserted += 1;
            }
            Err(e) if e.kind == CatalogErrorKind::ConstraintViolation => {
                log::warn!("Insert rejected for {:?}: {}", path, e.message);
                self.stats.duplicates += 1;
                self.sink.report(DuplicateReport::for_entry(
                    &entry,
                    DuplicateReason::BaseTitleRegistered,
                ));
            }
            Err(e) => {
                log::error!("Insert failed for {:?}: {}", path, e);
                self.stats.insert_failures += 1;
            }
        }
    }
}

impl FileVisitor for CatalogBuilder<'_> {
    fn visit(&mut self, path: &Path, metadata: &Metadata) {
        self.process(path, metadata);
    }
}

/// Run one full catalog pass: optional reset, migration, then scan
///
/// Storage and migration failures abort before any record is written; every
/// per-file problem is contained and logged.
pub fn run_catalog(config: &CatalogConfig, reporter: &ProgressReporter) -> Result<RunSummary> {
    let root = config.root.as_deref().ok_or_else(|| {
        CatalogError::new(CatalogErrorKind::InvalidRoot, None, "no scan root configured")
    })?;
    let root = scanner::resolve_root(root)?;
    let store = CatalogStore::new(config.db_path.clone());

    log::info!("Cataloging {:?} into {:?}", root, store.path());
    reporter.report_start(&root, store.path());

    if config.delete_catalog {
        store.delete_catalog()?;
    }

    reporter.report_phase(RunPhase::Migrate);
    let schema = store.ensure_schema().map_err(|e| {
        log::error!("Catalog setup failed: {}", e);
        e
    })?;

    reporter.report_phase(RunPhase::Scan);
    let (sender, receiver) = mpsc::channel::<DuplicateReport>();
    let (scan, stats) = {
        let mut sink = sender;
        let mut builder = CatalogBuilder::new(&store, root.to_string_lossy(), &mut sink);
        let scan = scanner::scan_tree(&root, config, &mut builder, reporter)?;
        (scan, builder.stats())
    };
    let duplicates: Vec<_> = receiver.try_iter().collect();

    let summary = RunSummary {
        root,
        db_path: store.path().to_path_buf(),
        schema,
        scan,
        inserted: stats.inserted,
        insert_failures: stats.insert_failures + stats.lookup_failures,
        duplicates,
    };

    if summary.has_duplicates() {
        log::info!("{} duplicates found", summary.duplicates.len());
    } else {
        log::info!("No duplicates found");
    }
    reporter.report_phase(RunPhase::Done);
    reporter.report_done(&summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup() -> (tempfile::TempDir, CatalogStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(tmp.path().join("catalog.db"));
        store.ensure_schema().unwrap();
        (tmp, store)
    }

    #[test]
    fn test_new_file_is_inserted() {
        let (tmp, store) = setup();
        let file = tmp.path().join("Film (1999) 4K.mp4");
        fs::write(&file, b"data").unwrap();

        let mut reports: Vec<DuplicateReport> = Vec::new();
        let mut builder = CatalogBuilder::new(&store, "/media", &mut reports);
        builder.process(&file, &fs::metadata(&file).unwrap());
        assert_eq!(builder.stats().inserted, 1);

        let record = store.find("Film (1999) 4K").unwrap().unwrap();
        assert_eq!(record.entry.year, 1999);
        assert_eq!(record.entry.version, "4K");
        assert_eq!(record.entry.size_bytes, 4);
        assert_eq!(record.entry.source_root, "/media");
        assert!(reports.is_empty());
    }

    #[test]
    fn test_same_base_title_is_reported_not_inserted() {
        let (tmp, store) = setup();
        let first = tmp.path().join("Movie.mkv");
        let second = tmp.path().join("Movie.mp4");
        fs::write(&first, b"one").unwrap();
        fs::write(&second, b"two").unwrap();

        let mut reports: Vec<DuplicateReport> = Vec::new();
        let mut builder = CatalogBuilder::new(&store, "/media", &mut reports);
        builder.process(&first, &fs::metadata(&first).unwrap());
        builder.process(&second, &fs::metadata(&second).unwrap());
        assert_eq!(
            builder.stats(),
            BuildStats {
                inserted: 1,
                duplicates: 1,
                ..Default::default()
            }
        );

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].display_title, "Movie.mp4");
        assert_eq!(reports[0].reason.as_str(), "base title already registered");
        assert_eq!(store.find("Movie").unwrap().unwrap().entry.extension, "mkv");
    }

    #[test]
    fn test_lookup_failure_skips_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(tmp.path().join("missing").join("catalog.db"));
        let file = tmp.path().join("Movie.mkv");
        fs::write(&file, b"x").unwrap();

        let mut reports: Vec<DuplicateReport> = Vec::new();
        let mut builder = CatalogBuilder::new(&store, "/media", &mut reports);
        builder.process(&file, &fs::metadata(&file).unwrap());
        assert_eq!(builder.stats().lookup_failures, 1);
        assert_eq!(builder.stats().inserted, 0);
        assert!(reports.is_empty());
    }

    #[test]
    fn test_rejected_insert_is_reported_as_duplicate() {
        let (tmp, store) = setup();
        // Stands in for a concurrent writer taking the title between lookup and insert
        let conn = rusqlite::Connection::open(store.path()).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_media BEFORE INSERT ON media
             BEGIN SELECT RAISE(ABORT, 'taken'); END;",
        )
        .unwrap();
        drop(conn);

        let file = tmp.path().join("Film (2001) HDR.mkv");
        fs::write(&file, b"x").unwrap();

        let mut reports: Vec<DuplicateReport> = Vec::new();
        let mut builder = CatalogBuilder::new(&store, "/media", &mut reports);
        builder.process(&file, &fs::metadata(&file).unwrap());
        assert_eq!(
            builder.stats(),
            BuildStats {
                duplicates: 1,
                ..Default::default()
            }
        );

        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].display_title, "Film (2001) HDR.mkv");
        assert_eq!(reports[0].reason, DuplicateReason::BaseTitleRegistered);
    }

    #[test]
    fn test_run_without_root_is_invalid() {
        let reporter = ProgressReporter::new(false, 0);
        let err = run_catalog(&CatalogConfig::default(), &reporter).unwrap_err();
        assert_eq!(err.kind, CatalogErrorKind::InvalidRoot);
    }
}
