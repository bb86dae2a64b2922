//! Progress reporting module for catalog runs
//!
//! Messages are written to stderr as JSON lines so a wrapping process can
//! follow a long scan without parsing log output.

use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::CatalogError;
use crate::models::RunSummary;
use crate::scanner::ScanProgress;

/// Run phase indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    /// Bringing the catalog schema up to date
    #[default]
    Migrate,
    /// Traversing the root and cataloging files
    Scan,
    /// Run completed
    Done,
}

impl RunPhase {
    /// Get string representation of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Migrate => "migrate",
            RunPhase::Scan => "scan",
            RunPhase::Done => "done",
        }
    }
}

/// Start message sent when a run begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    /// Scan root
    pub root: String,
    /// Catalog location
    pub db: String,
}

impl StartMessage {
    /// Create a new start message
    pub fn new(seq: u64, ts: u64, root: String, db: String) -> Self {
        Self {
            msg_type: "start",
            seq,
            ts,
            root,
            db,
        }
    }
}

/// Phase change message
#[derive(Debug, Clone, Serialize)]
pub struct PhaseMessage {
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    pub phase: RunPhase,
}

/// Progress message sent during the scan
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    /// Files handed to the catalog
    #[serde(rename = "f")]
    pub files: u64,
    /// Directories traversed
    #[serde(rename = "d")]
    pub dirs: u64,
    /// Entries skipped
    #[serde(rename = "s")]
    pub skipped: u64,
    /// Current directory
    pub dir: String,
    /// Elapsed time in milliseconds
    pub ms: u64,
}

/// Error message sent when a traversal error is contained
#[derive(Debug, Clone, Serialize)]
pub struct ErrorProgressMessage {
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Done message sent when the run completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    /// Files seen
    #[serde(rename = "tf")]
    pub total_files: u64,
    /// Rows inserted
    #[serde(rename = "ins")]
    pub inserted: u64,
    /// Duplicates reported
    #[serde(rename = "dup")]
    pub duplicates: usize,
    /// Inserts that failed
    #[serde(rename = "if")]
    pub insert_failures: u64,
    /// Traversal errors
    #[serde(rename = "ec")]
    pub error_count: usize,
    pub ms: u64,
}

/// Progress reporter for outputting run progress to stderr
pub struct ProgressReporter {
    enabled: bool,
    /// Reporting interval in milliseconds
    interval_ms: u64,
    last_report: std::cell::Cell<Instant>,
    seq: AtomicU64,
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a new ProgressReporter
    ///
    /// # Arguments
    /// * `enabled` - Whether progress reporting is enabled
    /// * `interval_ms` - Minimum interval between progress messages in milliseconds
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            interval_ms,
            last_report: std::cell::Cell::new(now),
            seq: AtomicU64::new(0),
            start_time: now,
        }
    }

    /// Check if enough time has passed since the last report
    pub fn should_report(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let elapsed = self.last_report.get().elapsed().as_millis() as u64;
        elapsed >= self.interval_ms
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            eprintln!("{}", json);
            std::io::stderr().flush().ok();
        }
    }

    /// Report run start
    pub fn report_start(&self, root: &std::path::Path, db: &std::path::Path) {
        if !self.enabled {
            return;
        }
        let msg = StartMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            root.to_string_lossy().to_string(),
            db.to_string_lossy().to_string(),
        );
        self.output_to_stderr(&msg);
    }

    /// Report a phase change
    pub fn report_phase(&self, phase: RunPhase) {
        if !self.enabled {
            return;
        }
        let msg = PhaseMessage {
            msg_type: "phase",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            phase,
        };
        self.output_to_stderr(&msg);
    }

    /// Report scan progress, respecting the interval
    ///
    /// Returns true if a message was actually sent.
    pub fn report_progress(&self, progress: &ScanProgress) -> bool {
        if !self.should_report() {
            return false;
        }

        let msg = ProgressMessage {
            msg_type: "p",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            files: progress.scanned_files,
            dirs: progress.scanned_dirs,
            skipped: progress.skipped_entries,
            dir: progress.current_dir.clone(),
            ms: progress.elapsed_ms,
        };

        self.output_to_stderr(&msg);
        self.last_report.set(Instant::now());
        true
    }

    /// Report a contained error immediately
    pub fn report_error(&self, error: &CatalogError) {
        if !self.enabled {
            return;
        }
        let msg = ErrorProgressMessage {
            msg_type: "err",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            error_type: error.kind.as_str().to_string(),
            message: error.message.clone(),
            path: error.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        };
        self.output_to_stderr(&msg);
    }

    /// Report run completion
    pub fn report_done(&self, summary: &RunSummary) {
        if !self.enabled {
            return;
        }
        let msg = DoneMessage {
            msg_type: "done",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            total_files: summary.scan.total_files,
            inserted: summary.inserted,
            duplicates: summary.duplicates.len(),
            insert_failures: summary.insert_failures,
            error_count: summary.scan.error_count(),
            ms: self.current_timestamp(),
        };
        self.output_to_stderr(&msg);
    }

    /// Check if the reporter is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_phase_serialization() {
        assert_eq!(serde_json::to_string(&RunPhase::Migrate).unwrap(), "\"migrate\"");
        assert_eq!(serde_json::to_string(&RunPhase::Scan).unwrap(), "\"scan\"");
        assert_eq!(RunPhase::Done.as_str(), "done");
    }

    #[test]
    fn test_start_message_serialization() {
        let msg = StartMessage::new(1, 100, "/media".to_string(), "catalog.db".to_string());
        let parsed: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(parsed["_t"], "start");
        assert_eq!(parsed["seq"], 1);
        assert_eq!(parsed["root"], "/media");
        assert_eq!(parsed["db"], "catalog.db");
    }

    #[test]
    fn test_error_message_without_path() {
        let msg = ErrorProgressMessage {
            msg_type: "err",
            seq: 1,
            ts: 100,
            error_type: "traversal_io".to_string(),
            message: "denied".to_string(),
            path: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("\"path\""));
    }

    #[test]
    fn test_done_message_field_names() {
        let msg = DoneMessage {
            msg_type: "done",
            seq: 4,
            ts: 10,
            total_files: 12,
            inserted: 10,
            duplicates: 2,
            insert_failures: 0,
            error_count: 1,
            ms: 10,
        };
        let parsed: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(parsed["tf"], 12);
        assert_eq!(parsed["ins"], 10);
        assert_eq!(parsed["dup"], 2);
        assert_eq!(parsed["if"], 0);
        assert_eq!(parsed["ec"], 1);
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let reporter = ProgressReporter::new(true, 200);
        assert_eq!(reporter.next_seq(), 0);
        assert_eq!(reporter.next_seq(), 1);
    }

    #[test]
    fn test_disabled_reporter_is_silent() {
        let reporter = ProgressReporter::new(false, 0);
        assert!(!reporter.is_enabled());
        assert!(!reporter.should_report());
        reporter.report_phase(RunPhase::Scan);
        reporter.report_error(&CatalogError::traversal(None, "denied"));
        assert!(!reporter.report_progress(&ScanProgress::default()));
        assert_eq!(reporter.next_seq(), 0);
    }

    #[test]
    fn test_should_report_timing() {
        let reporter = ProgressReporter::new(true, 10);
        reporter.last_report.set(Instant::now());
        assert!(!reporter.should_report());
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(reporter.should_report());
    }
}
