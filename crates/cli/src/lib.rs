use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_model::{tags, DocumentKind, PageNumber};
use serde::Serialize;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{FileStorage, ImportReport};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use viewer_core::{ViewerConfig, ViewerController, ViewerError};

#[derive(Debug, Parser)]
#[command(name = "marginalia")]
#[command(about = "Inspect, export and import stored document annotations")]
pub struct Cli {
    /// Directory holding persisted annotation state.
    #[arg(long, global = true, value_name = "DIR", env = "MARGINALIA_STORE_DIR")]
    store: Option<PathBuf>,
    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Summarise the stored annotations for a document.
    Show {
        #[arg(value_name = "SOURCE")]
        source: String,
    },
    /// Write a document's annotations to an export file.
    Export {
        #[arg(value_name = "SOURCE")]
        source: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace a document's annotations with the contents of an export file.
    Import {
        #[arg(value_name = "SOURCE")]
        source: String,
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Page count of the document; pages beyond it are rejected.
        #[arg(long)]
        pages: Option<u32>,
    },
    /// Check an export file without storing anything.
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        pages: Option<u32>,
    },
    /// Print the comment tag vocabulary.
    Tags,
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    source: String,
    kind: DocumentKind,
    pages: Vec<PageSummary>,
    annotations: usize,
    comments: usize,
}

#[derive(Debug, Serialize)]
struct PageSummary {
    page: PageNumber,
    annotations: usize,
    comments: usize,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match cli.command {
        Commands::Show { source } => run_show(&open_store(cli.store)?, &source),
        Commands::Export { source, output } => {
            run_export(open_store(cli.store)?, &source, output.as_deref())
        }
        Commands::Import { source, file, pages } => {
            run_import(open_store(cli.store)?, &source, &file, pages)
        }
        Commands::Validate { file, pages } => run_validate(&file, pages),
        Commands::Tags => {
            for tag in tags::VOCABULARY {
                println!("{tag}");
            }
            Ok(())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Err(error) =
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init()
    {
        debug!(%error, "keeping existing tracing subscriber");
    }
}

fn open_store(root: Option<PathBuf>) -> Result<FileStorage> {
    match root {
        Some(root) => Ok(FileStorage::with_root(root)),
        None => FileStorage::from_default_project().context("failed to locate data directory"),
    }
}

/// Load a document into a controller backed by `store`. Without a known page
/// count every positive page number is in range.
fn open_viewer(store: FileStorage, source: &str, pages: Option<u32>) -> Result<ViewerController> {
    let mut viewer = ViewerController::new(Box::new(store), ViewerConfig::new());
    let ticket = viewer.open_document(source);

    if !viewer.complete_load(&ticket, pages.unwrap_or(u32::MAX)) {
        anyhow::bail!("failed to load annotations for {source}");
    }

    Ok(viewer)
}

fn run_show(store: &FileStorage, source: &str) -> Result<()> {
    let state = storage::load_state(store, source);

    let pages: BTreeSet<PageNumber> =
        state.annotations.keys().chain(state.comments.keys()).copied().collect();
    let pages = pages
        .into_iter()
        .map(|page| PageSummary {
            page,
            annotations: state.page_annotations(page).len(),
            comments: state.page_comments(page).len(),
        })
        .collect();

    let payload = ShowOutput {
        source: source.to_owned(),
        kind: DocumentKind::detect(source),
        pages,
        annotations: state.annotation_count(),
        comments: state.comment_count(),
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_export(store: FileStorage, source: &str, output: Option<&Path>) -> Result<()> {
    let viewer = open_viewer(store, source, None)?;
    let json = viewer.export_json().context("failed to serialize annotations")?;

    let output = match output {
        Some(output) => output.to_path_buf(),
        None => PathBuf::from(storage::suggested_file_name(source)),
    };

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(&output, json)
        .with_context(|| format!("failed to write export to {}", output.display()))?;

    info!(source, output = %output.display(), "exported annotations");
    println!("{}", output.display());
    Ok(())
}

fn run_import(store: FileStorage, source: &str, file: &Path, pages: Option<u32>) -> Result<()> {
    let bytes = read_input(file)?;
    let mut viewer = open_viewer(store, source, pages)?;

    let report = match viewer.import_json(&bytes) {
        Ok(report) => report,
        Err(ViewerError::Storage(error)) => {
            return Err(error)
                .with_context(|| format!("failed to store imported annotations for {source}"));
        }
        Err(error) => return Err(error).context("failed to parse import"),
    };

    print_report(&report)
}

fn run_validate(file: &Path, pages: Option<u32>) -> Result<()> {
    let bytes = read_input(file)?;
    let outcome = storage::parse_import(&bytes, pages).context("failed to parse import")?;

    print_report(&outcome.report)?;

    if !outcome.report.is_clean() {
        anyhow::bail!("{} record(s) rejected", outcome.report.rejected.len());
    }

    Ok(())
}

fn read_input(file: &Path) -> Result<Vec<u8>> {
    if !file.is_file() {
        anyhow::bail!("file does not exist: {}", file.display());
    }

    fs::read(file).with_context(|| format!("failed to read {}", file.display()))
}

fn print_report(report: &ImportReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
