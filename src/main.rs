#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use listscraper::application::{ListScraper, SchemaNormalizer, ScrapeRequest};
use listscraper::domain::{CollectionKind, PageSelection, Record, Schema};
use listscraper::infrastructure::export::{self, OutputFormat, collection_stem};
use listscraper::infrastructure::logging::{init_logging, log_system_info};
use listscraper::infrastructure::{AppConfig, CrawlSession, HttpClient, ScrapeError};

/// Top-level CLI entry point.
#[derive(Debug, Parser)]
#[command(name = "listscraper", version, about = "Scrape Letterboxd lists and diaries to CSV or JSON")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Configuration file (TOML, JSON or YAML).
    #[arg(global = true, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Only log warnings and errors.
    #[arg(global = true, short, long)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape one or more list or diary URLs.
    Scrape(ScrapeArgs),
    /// Normalize a structured diary dump (JSON) and export it.
    Normalize(NormalizeArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    List,
    Diary,
}

impl From<KindArg> for CollectionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::List => Self::List,
            KindArg::Diary => Self::Diary,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => Self::Csv,
            FormatArg::Json => Self::Json,
        }
    }
}

#[derive(Debug, Args)]
struct ScrapeArgs {
    /// Collection URLs (lists or diaries).
    #[arg(required = true, value_name = "URL")]
    urls: Vec<String>,
    /// Collection type; detected from each URL when omitted.
    #[arg(long = "type", value_enum)]
    kind: Option<KindArg>,
    /// Pages to visit: `*` for all, or numbers and ranges like `1,3,5-7`.
    #[arg(short, long)]
    pages: Option<String>,
    /// Output format.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
    /// Directory for output files.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Output file name without extension.
    #[arg(long, value_name = "NAME")]
    output_name: Option<String>,
    /// Merge all collections of the same type into one file with a List_URL column.
    #[arg(long)]
    concat: bool,
    /// Stop issuing requests after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    deadline_secs: Option<u64>,
    /// Films enriched concurrently within a page.
    #[arg(long)]
    concurrency: Option<usize>,
    /// Fetch each diary entry's film page for the director.
    #[arg(long)]
    enrich_diary: bool,
}

#[derive(Debug, Args)]
struct NormalizeArgs {
    /// Structured diary dump.
    #[arg(long, value_name = "FILE")]
    input: PathBuf,
    /// Output file; defaults to the output directory and the input file name.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("❌ {:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.quiet {
        config.logging.level = "warn".to_string();
    }
    init_logging(&config.logging)?;
    log_system_info();

    match cli.command {
        Commands::Scrape(args) => scrape(config, args).await,
        Commands::Normalize(args) => normalize(&config, &args),
    }
}

async fn scrape(mut config: AppConfig, args: ScrapeArgs) -> Result<ExitCode> {
    if let Some(concurrency) = args.concurrency {
        config.crawl.enrichment_concurrency = concurrency;
    }
    if args.deadline_secs.is_some() {
        config.crawl.deadline_seconds = args.deadline_secs;
    }
    config.crawl.enrich_diary_entries |= args.enrich_diary;
    config.validate()?;

    let pages = args
        .pages
        .as_deref()
        .map(str::parse::<PageSelection>)
        .transpose()
        .context("Invalid --pages value")?;
    let format = output_format(args.format, &config)?;
    let output_dir = args.output_dir.clone().unwrap_or_else(|| config.output.directory.clone());

    let fetcher = Arc::new(HttpClient::new(&config.http)?);
    let session = Arc::new(CrawlSession::from_config(&config, fetcher, CancellationToken::new())?);
    let scraper = ListScraper::new(&config, session.clone())?;
    let _deadline = scraper.arm_deadline();

    let token = session.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupted, finishing with partial results");
            token.cancel();
        }
    });

    let mut failed = false;
    let mut merged: BTreeMap<&'static str, (Arc<Schema>, Vec<Record>)> = BTreeMap::new();

    for (i, url) in args.urls.iter().enumerate() {
        if session.is_cancelled() {
            warn!("Skipping {} after cancellation", url);
            continue;
        }

        let mut request = ScrapeRequest::new(url).with_list_url_column(args.concat);
        if let Some(kind) = args.kind {
            request = request.with_kind(kind.into());
        }
        if let Some(pages) = &pages {
            request = request.with_pages(pages.clone());
        }

        match scraper.scrape(&request).await {
            Ok(outcome) if args.concat => {
                merged
                    .entry(request.kind.as_str())
                    .or_insert_with(|| (outcome.schema.clone(), Vec::new()))
                    .1
                    .extend(outcome.records);
            }
            Ok(outcome) => {
                let stem = match (&args.output_name, args.urls.len()) {
                    (Some(name), 1) => name.clone(),
                    (Some(name), _) => format!("{}_{}", name, i + 1),
                    (None, _) => collection_stem(url),
                };
                export::export(&output_dir, &stem, format, &outcome.schema, &outcome.records)?;
            }
            Err(ScrapeError::PrivateOrForbiddenCollection { .. }) => {
                error!("🔒 {} is private: {}", request.kind, url);
                failed = true;
            }
            Err(e) => {
                error!("❌ Failed to scrape {}: {}", url, e);
                failed = true;
            }
        }
    }

    let kinds = merged.len();
    for (kind, (schema, records)) in &merged {
        let stem = match &args.output_name {
            Some(name) if kinds > 1 => format!("{}_{}", name, kind),
            Some(name) => name.clone(),
            None => format!("{}_output", kind),
        };
        export::export(&output_dir, &stem, format, schema, records)?;
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn normalize(config: &AppConfig, args: &NormalizeArgs) -> Result<ExitCode> {
    let file = File::open(&args.input).with_context(|| format!("Failed to open {}", args.input.display()))?;
    let normalizer = SchemaNormalizer::default();
    let records = normalizer
        .normalize_reader(BufReader::new(file))
        .with_context(|| format!("{} is not valid JSON", args.input.display()))?;
    info!("Normalized {} diary entries from {}", records.len(), args.input.display());

    let format: OutputFormat = match (args.format, args.output.as_deref().and_then(Path::extension)) {
        (Some(format), _) => format.into(),
        (None, Some(ext)) => ext.to_string_lossy().parse()?,
        (None, None) => output_format(None, config)?,
    };
    let (directory, stem) = match &args.output {
        Some(path) => (
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
            file_stem(path)?,
        ),
        None => (config.output.directory.clone(), file_stem(&args.input)?),
    };

    export::export(&directory, &stem, format, normalizer.schema(), &records)?;
    Ok(ExitCode::SUCCESS)
}

fn output_format(arg: Option<FormatArg>, config: &AppConfig) -> Result<OutputFormat> {
    match arg {
        Some(format) => Ok(format.into()),
        None => Ok(config.output.format.parse()?),
    }
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))
}
