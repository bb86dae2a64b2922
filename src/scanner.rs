//! Scanner module - recursive traversal handing each file to a visitor once

use std::cell::Cell;
use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::models::ScanResult;
use crate::progress::ProgressReporter;

/// Receives every distinct file found by [`scan_tree`]
pub trait FileVisitor {
    /// Handle one file; `path` is the entry as listed, not the resolved target
    fn visit(&mut self, path: &Path, metadata: &Metadata);
}

impl<F> FileVisitor for F
where
    F: FnMut(&Path, &Metadata),
{
    fn visit(&mut self, path: &Path, metadata: &Metadata) {
        self(path, metadata)
    }
}

/// Scan progress information
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    /// Files handed to the visitor so far
    pub scanned_files: u64,
    /// Directories traversed so far
    pub scanned_dirs: u64,
    /// Entries skipped so far
    pub skipped_entries: u64,
    /// Current directory being scanned
    pub current_dir: String,
    /// Elapsed time in milliseconds
    pub elapsed_ms: u64,
}

/// Check that `root` is a readable directory and return its absolute form
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    match std::fs::canonicalize(root) {
        Ok(resolved) if resolved.is_dir() => Ok(resolved),
        _ => Err(CatalogError::invalid_root(root.to_path_buf())),
    }
}

/// Walk `root` depth-first, handing each distinct file to `visitor`
///
/// Entries whose name carries the excluded marker are skipped together with
/// their contents. A file reached through several listings (symlinks, aliases)
/// is visited only for the first one, keyed by its resolved path. Unreadable
/// directories are logged and skipped.
pub fn scan_tree(
    root: &Path,
    config: &CatalogConfig,
    visitor: &mut dyn FileVisitor,
    reporter: &ProgressReporter,
) -> Result<ScanResult> {
    let root = resolve_root(root)?;
    let start = Instant::now();
    let mut result = ScanResult::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut current_dir = String::new();
    let excluded = Cell::new(0u64);

    let walker = WalkDir::new(&root)
        .follow_links(config.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let keep = !config.is_excluded(&entry.file_name().to_string_lossy());
            if !keep {
                log::debug!("Skipping excluded entry {:?}", entry.path());
                excluded.set(excluded.get() + 1);
            }
            keep
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(|p| p.to_path_buf());
                log::warn!("Skipping unreadable entry {:?}: {}", path, e);
                let err = CatalogError::traversal(path, e.to_string());
                reporter.report_error(&err);
                result.errors.push(err);
                continue;
            }
        };

        let path = entry.path();

        if entry.file_type().is_dir() {
            result.total_dirs += 1;
            current_dir = path.to_string_lossy().to_string();
            continue;
        }

        if !entry.file_type().is_file() {
            continue;
        }

        let extension = crate::metadata::extract_extension(&entry.file_name().to_string_lossy())
            .to_string();
        if !config.should_include_extension(&extension) {
            result.skipped_entries += 1;
            continue;
        }

        let resolved = match std::fs::canonicalize(path) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::warn!("Cannot resolve {:?}: {}", path, e);
                let err = CatalogError::traversal(Some(path.to_path_buf()), e.to_string());
                reporter.report_error(&err);
                result.errors.push(err);
                continue;
            }
        };

        if !visited.insert(resolved) {
            log::debug!("Already visited {:?}", path);
            result.revisited_files += 1;
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("Cannot read metadata of {:?}: {}", path, e);
                let err = CatalogError::traversal(Some(path.to_path_buf()), e.to_string());
                reporter.report_error(&err);
                result.errors.push(err);
                continue;
            }
        };

        visitor.visit(path, &metadata);
        result.total_files += 1;

        if reporter.should_report() {
            reporter.report_progress(&ScanProgress {
                scanned_files: result.total_files,
                scanned_dirs: result.total_dirs,
                skipped_entries: result.skipped_entries + excluded.get(),
                current_dir: current_dir.clone(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }
    }

    result.skipped_entries += excluded.get();
    result.duration_ms = start.elapsed().as_millis() as u64;
    log::info!(
        "Scanned {:?}: {} files, {} dirs, {} skipped, {} errors in {}ms",
        root,
        result.total_files,
        result.total_dirs,
        result.skipped_entries,
        result.error_count(),
        result.duration_ms
    );
    Ok(result)
}
