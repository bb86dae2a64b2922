//! Configuration for a catalog run

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default catalog file name
pub const DEFAULT_CATALOG_NAME: &str = "media_catalog.db";

/// Marker carried by the side folders NAS indexers generate next to media
pub const DEFAULT_EXCLUDED_MARKER: &str = "SYNOINDEX MEDIA INFO";

/// Default progress reporting interval in milliseconds
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Configuration for a catalog run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory to scan
    pub root: Option<PathBuf>,

    /// Location of the catalog file
    pub db_path: PathBuf,

    /// Entries whose name contains this marker are skipped with their contents
    pub excluded_marker: String,

    /// File extensions to include (whitelist, lowercase)
    /// If empty, every file is cataloged
    pub extensions: HashSet<String>,

    /// Whether symbolic links are followed during traversal
    pub follow_links: bool,

    /// Drop the catalog before migrating and scanning
    pub delete_catalog: bool,

    /// Whether to emit JSON progress on stderr
    pub show_progress: bool,

    /// Minimum interval between progress messages
    pub progress_interval_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: None,
            db_path: PathBuf::from(DEFAULT_CATALOG_NAME),
            excluded_marker: DEFAULT_EXCLUDED_MARKER.to_string(),
            extensions: HashSet::new(),
            follow_links: true,
            delete_catalog: false,
            show_progress: false,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl CatalogConfig {
    /// Create a new config scanning the given root
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Some(root),
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder::new()
    }

    /// Resolve a user supplied catalog name, falling back to the default when blank
    pub fn catalog_path_from(name: Option<&str>) -> PathBuf {
        match name.map(str::trim) {
            Some(name) if !name.is_empty() => PathBuf::from(name),
            _ => PathBuf::from(DEFAULT_CATALOG_NAME),
        }
    }

    /// Check if a directory or file name carries the excluded marker
    pub fn is_excluded(&self, name: &str) -> bool {
        !self.excluded_marker.is_empty() && name.contains(&self.excluded_marker)
    }

    /// Check if a file extension should be cataloged
    pub fn should_include_extension(&self, ext: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        self.extensions.contains(&ext.to_lowercase())
    }

    /// Path of the catalog file
    pub fn catalog_path(&self) -> &Path {
        &self.db_path
    }
}

/// Builder for CatalogConfig
#[derive(Debug, Default)]
pub struct CatalogConfigBuilder {
    config: CatalogConfig,
}

impl CatalogConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan root
    pub fn root(mut self, root: PathBuf) -> Self {
        self.config.root = Some(root);
        self
    }

    /// Set the catalog path
    pub fn db_path(mut self, path: PathBuf) -> Self {
        self.config.db_path = path;
        self
    }

    /// Set the catalog path from a user supplied name
    pub fn catalog_name(mut self, name: Option<&str>) -> Self {
        self.config.db_path = CatalogConfig::catalog_path_from(name);
        self
    }

    /// Set the excluded-folder marker (empty disables exclusion)
    pub fn excluded_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.excluded_marker = marker.into();
        self
    }

    /// Set the extensions whitelist
    pub fn extensions(mut self, extensions: HashSet<String>) -> Self {
        self.config.extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Add one extension to the whitelist
    pub fn add_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.extensions.insert(ext.into().to_lowercase());
        self
    }

    /// Enable or disable following symbolic links
    pub fn follow_links(mut self, enabled: bool) -> Self {
        self.config.follow_links = enabled;
        self
    }

    /// Drop the catalog before the run
    pub fn delete_catalog(mut self, enabled: bool) -> Self {
        self.config.delete_catalog = enabled;
        self
    }

    /// Enable or disable progress output
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    /// Set the progress interval
    pub fn progress_interval_ms(mut self, interval: u64) -> Self {
        self.config.progress_interval_ms = interval;
        self
    }

    /// Build the config
    pub fn build(self) -> CatalogConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();
        assert!(config.root.is_none());
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_CATALOG_NAME));
        assert_eq!(config.excluded_marker, DEFAULT_EXCLUDED_MARKER);
        assert!(config.follow_links);
        assert!(!config.delete_catalog);
    }

    #[test]
    fn test_catalog_path_from() {
        assert_eq!(
            CatalogConfig::catalog_path_from(None),
            PathBuf::from(DEFAULT_CATALOG_NAME)
        );
        assert_eq!(
            CatalogConfig::catalog_path_from(Some("   ")),
            PathBuf::from(DEFAULT_CATALOG_NAME)
        );
        assert_eq!(
            CatalogConfig::catalog_path_from(Some("  films.db ")),
            PathBuf::from("films.db")
        );
    }

    #[test]
    fn test_is_excluded() {
        let config = CatalogConfig::default();
        assert!(config.is_excluded("SYNOINDEX MEDIA INFO"));
        assert!(config.is_excluded("@eaDir SYNOINDEX MEDIA INFO 2"));
        assert!(!config.is_excluded("Movies"));

        let disabled = CatalogConfig::builder().excluded_marker("").build();
        assert!(!disabled.is_excluded("SYNOINDEX MEDIA INFO"));
    }

    #[test]
    fn test_should_include_extension() {
        let config = CatalogConfig::default();
        assert!(config.should_include_extension("txt"));
        assert!(config.should_include_extension(""));

        let config = CatalogConfig::builder().add_extension("MKV").build();
        assert!(config.should_include_extension("mkv"));
        assert!(config.should_include_extension("MKV"));
        assert!(!config.should_include_extension("mp4"));
    }

    #[test]
    fn test_config_builder() {
        let config = CatalogConfig::builder()
            .root(PathBuf::from("/media"))
            .catalog_name(Some("films.db"))
            .follow_links(false)
            .delete_catalog(true)
            .show_progress(true)
            .build();

        assert_eq!(config.root, Some(PathBuf::from("/media")));
        assert_eq!(config.catalog_path(), Path::new("films.db"));
        assert!(!config.follow_links);
        assert!(config.delete_catalog);
        assert!(config.show_progress);
    }
}
