//! Media Catalog CLI
//!
//! Catalogs media files under a directory, reporting titles already present.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use media_catalog::{
    run_catalog, CatalogConfig, CatalogError, CatalogStore, ProgressReporter, RunSummary,
};

const ABOUT: &str = r#"
Media Catalog - title-deduplicated catalog of media files

Examples:
  media_catalog scan -r /volume1/movies              catalog a directory
  media_catalog scan -r /movies -d films.db          use another catalog file
  media_catalog scan -r /movies --reset              rebuild the catalog from scratch
  media_catalog scan -r /movies --json               print the summary as JSON
  media_catalog migrate -d films.db                  upgrade a catalog schema only
  media_catalog list -d films.db                     print cataloged titles
"#;

/// Media catalog builder
#[derive(Parser)]
#[command(name = "media_catalog")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory and catalog new titles
    Scan {
        /// Directory to scan
        #[arg(short = 'r', long)]
        root: PathBuf,

        /// Catalog file (blank uses the default name)
        #[arg(short = 'd', long)]
        db: Option<String>,

        /// Skip entries whose name contains this marker
        #[arg(long, default_value = media_catalog::config::DEFAULT_EXCLUDED_MARKER)]
        exclude: String,

        /// Only catalog these extensions (repeatable)
        #[arg(short = 'e', long = "ext")]
        extensions: Vec<String>,

        /// Delete the catalog before scanning
        #[arg(long)]
        reset: bool,

        /// Do not follow symbolic links
        #[arg(long)]
        no_follow_links: bool,

        /// Emit JSON progress lines on stderr
        #[arg(long)]
        progress: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bring a catalog to the current schema without scanning
    Migrate {
        #[arg(short = 'd', long)]
        db: Option<String>,
    },
    /// Print cataloged records
    List {
        #[arg(short = 'd', long)]
        db: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Delete the catalog file
    Delete {
        #[arg(short = 'd', long)]
        db: Option<String>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Some(Commands::Scan {
            root,
            db,
            exclude,
            extensions,
            reset,
            no_follow_links,
            progress,
            json,
        }) => {
            let config = CatalogConfig::builder()
                .root(root)
                .catalog_name(db.as_deref())
                .excluded_marker(exclude)
                .extensions(extensions.into_iter().collect())
                .follow_links(!no_follow_links)
                .delete_catalog(reset)
                .show_progress(progress)
                .build();
            scan(&config, json)
        }
        Some(Commands::Migrate { db }) => migrate(db.as_deref()),
        Some(Commands::List { db, json }) => list(db.as_deref(), json),
        Some(Commands::Delete { db }) => {
            let store = CatalogStore::new(CatalogConfig::catalog_path_from(db.as_deref()));
            store.delete_catalog().map(|_| ())
        }
        None => {
            println!("{}", ABOUT);
            println!("Use 'media_catalog --help' for the full command list");
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn scan(config: &CatalogConfig, json: bool) -> Result<(), CatalogError> {
    info!("Starting catalog scan of {:?}", config.root);
    info!("Catalog: {:?}", config.db_path);
    info!("Excluded marker: {:?}", config.excluded_marker);

    let reporter = ProgressReporter::new(config.show_progress, config.progress_interval_ms);
    let summary = run_catalog(config, &reporter)?;

    if json {
        print_json(&summary);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Scan completed:");
    println!("  Root: {}", summary.root.display());
    println!("  Catalog: {}", summary.db_path.display());
    println!("  Files: {}", summary.scan.total_files);
    println!("  Cataloged: {}", summary.inserted);
    println!("  Failed inserts: {}", summary.insert_failures);
    println!("  Errors: {}", summary.scan.error_count());
    println!("  Duration: {}ms", summary.scan.duration_ms);

    if summary.has_duplicates() {
        println!("Duplicates ({}):", summary.duplicates.len());
        for duplicate in &summary.duplicates {
            println!("  - {}", duplicate);
        }
    } else {
        println!("No duplicates found.");
    }
}

fn migrate(db: Option<&str>) -> Result<(), CatalogError> {
    let store = CatalogStore::new(CatalogConfig::catalog_path_from(db));
    let report = store.ensure_schema()?;
    if report.is_noop() {
        println!("{} is up to date", store.path().display());
    } else {
        println!("Migrated {}:", store.path().display());
        println!("  Table created: {}", report.table_created);
        println!("  Columns added: {:?}", report.columns_added);
        println!("  Base titles backfilled: {}", report.rows_backfilled);
        println!("  Duplicate rows removed: {}", report.duplicates_removed);
        println!("  Indexes dropped: {:?}", report.indexes_dropped);
    }
    Ok(())
}

fn list(db: Option<&str>, json: bool) -> Result<(), CatalogError> {
    let store = CatalogStore::new(CatalogConfig::catalog_path_from(db));
    store.ensure_schema()?;
    let records = store.records()?;

    if json {
        print_json(&records);
        return Ok(());
    }
    for record in &records {
        let entry = &record.entry;
        println!(
            "{:>6}  {} ({}) [{}] {} bytes {} {}",
            record.id,
            entry.display_title,
            entry.year,
            entry.version,
            entry.size_bytes,
            entry.modified_date,
            entry.source_root
        );
    }
    println!("{} records", records.len());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Cannot serialize output: {}", e),
    }
}
