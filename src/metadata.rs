//! Filename metadata extraction
//!
//! Every function here is pure: the same filename and attributes always yield
//! the same fields, whether computed during a scan or during a catalog backfill.

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::Metadata;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CatalogError;
use crate::models::{CatalogEntry, VersionTag};

static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d{4})\)").expect("year pattern is valid"));

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(3d|4k|uhd|hdr|1080p|720p)").expect("version pattern is valid")
});

/// Format used for `modified_date`
pub const MODIFIED_DATE_FORMAT: &str = "%d/%m/%Y";

/// Year from the first `(YYYY)` group, or 0
///
/// `\d` is Unicode aware, so a group of non-ASCII digits matches but does not
/// parse; that case is logged and yields 0.
pub fn extract_year(file_name: &str) -> i32 {
    let Some(caps) = YEAR_PATTERN.captures(file_name) else {
        return 0;
    };
    let digits = &caps[1];
    match digits.parse::<i32>() {
        Ok(year) => year,
        Err(e) => {
            let err = CatalogError::metadata(format!("unparsable year {:?}: {}", digits, e));
            log::warn!("{} in {:?}", err.message, file_name);
            0
        }
    }
}

/// First version tag found in the filename, case-insensitively
///
/// Matching runs on the lowercased name so that whatever the pattern accepts,
/// [`VersionTag::parse`] accepts too.
pub fn extract_version(file_name: &str) -> Option<VersionTag> {
    let lowered = file_name.to_lowercase();
    VERSION_PATTERN
        .find(&lowered)
        .and_then(|m| VersionTag::parse(m.as_str()))
}

/// Suffix after the last dot, empty when there is none or the only dot leads
pub fn extract_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[idx + 1..],
        _ => "",
    }
}

/// Deduplication key for a display title
///
/// Without an extension or a dot the title is returned as is; otherwise the
/// last `len(extension) + 1` characters are removed.
pub fn base_title(display_title: &str, extension: &str) -> String {
    if extension.is_empty() || !display_title.contains('.') {
        return display_title.to_string();
    }
    let strip = extension.chars().count() + 1;
    let total = display_title.chars().count();
    if strip >= total {
        return display_title.to_string();
    }
    display_title.chars().take(total - strip).collect()
}

/// Format a modification time as `dd/mm/yyyy` in local time
pub fn format_modified_date(time: SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    local.format(MODIFIED_DATE_FORMAT).to_string()
}

/// Fields derived from a filename and its attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMetadata {
    pub display_title: String,
    pub base_title: String,
    pub year: i32,
    pub version: String,
    pub extension: String,
    pub size_bytes: u64,
    pub modified_date: String,
}

impl MediaMetadata {
    /// Extract every field from a filename, a size and a modification time
    pub fn extract(file_name: &str, size_bytes: u64, modified: SystemTime) -> Self {
        let extension = extract_extension(file_name).to_string();
        Self {
            display_title: file_name.to_string(),
            base_title: base_title(file_name, &extension),
            year: extract_year(file_name),
            version: extract_version(file_name)
                .map(|tag| tag.as_str().to_string())
                .unwrap_or_default(),
            extension,
            size_bytes,
            modified_date: format_modified_date(modified),
        }
    }

    /// Extract from a discovered file
    pub fn from_file(path: &Path, metadata: &Metadata) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let modified = metadata.modified().unwrap_or_else(|e| {
            log::warn!("No modification time for {:?}: {}", path, e);
            UNIX_EPOCH
        });

        Self::extract(&file_name, metadata.len(), modified)
    }

    /// Attach provenance to obtain an insertable entry
    pub fn into_entry(self, source_root: impl Into<String>) -> CatalogEntry {
        CatalogEntry {
            display_title: self.display_title,
            base_title: self.base_title,
            year: self.year,
            version: self.version,
            extension: self.extension,
            size_bytes: self.size_bytes,
            modified_date: self.modified_date,
            source_root: source_root.into(),
        }
    }
}
