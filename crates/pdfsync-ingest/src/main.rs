//! pdfsync - mirror PDF reports and convert their tables to CSV

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdfsync_common::files::write_atomic;
use pdfsync_common::logging::{init_logging, LogConfig, LogLevel};
use pdfsync_ingest::detect::{CamelotDetector, TableDetector};
use pdfsync_ingest::discovery::{HtmlLinkDiscovery, SourceDiscovery, StaticDiscovery};
use pdfsync_ingest::pipeline::{http_client, Pipeline};
use pdfsync_ingest::reconcile::TableReconciler;
use pdfsync_ingest::IngestConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pdfsync")]
#[command(author, version, about = "Mirror PDF reports and extract their tables as CSV")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, transform and archive every discovered report
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Directory for downloaded PDFs
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Directory for CSV output
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Zip archive written at the end of the run
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Number of transform workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Queue capacity between fetch and transform (0 = unbounded)
        #[arg(long)]
        queue_capacity: Option<usize>,

        /// HTTP timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        #[command(flatten)]
        detector: DetectorArgs,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the report URLs found on the index page
    Discover {
        /// Index page to scrape
        #[arg(long)]
        index_url: Option<String>,
    },

    /// Extract the table from one local PDF
    Extract {
        /// PDF file
        pdf: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        detector: DetectorArgs,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Index page to scrape
    #[arg(long)]
    index_url: Option<String>,

    /// Process these URLs instead of scraping the index page
    #[arg(long = "url", conflicts_with = "index_url")]
    urls: Vec<String>,
}

#[derive(Args, Debug)]
struct DetectorArgs {
    /// Table detection program
    #[arg(long)]
    detector: Option<String>,

    /// Detection flavor (lattice or stream)
    #[arg(long)]
    flavor: Option<String>,
}

impl DetectorArgs {
    fn apply(self, config: &mut IngestConfig) {
        if let Some(program) = self.detector {
            config.detector_program = program;
        }
        if let Some(flavor) = self.flavor {
            config.detector_flavor = flavor;
        }
    }
}

fn detector_for(config: &IngestConfig) -> Arc<dyn TableDetector> {
    Arc::new(CamelotDetector::new(
        config.detector_program.clone(),
        config.detector_flavor.clone(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("pdfsync")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env()?;

    match cli.command {
        Command::Run {
            source,
            cache_dir,
            output_dir,
            archive,
            workers,
            queue_capacity,
            timeout,
            detector,
            json,
        } => {
            if let Some(url) = source.index_url {
                config.index_url = url;
            }
            if let Some(dir) = cache_dir {
                config.cache_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(path) = archive {
                config.archive_path = path;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(capacity) = queue_capacity {
                config.queue_capacity = capacity;
            }
            if let Some(secs) = timeout {
                config.timeout_secs = secs;
            }
            detector.apply(&mut config);
            config.validate()?;

            let discovery: Arc<dyn SourceDiscovery> = if source.urls.is_empty() {
                Arc::new(HtmlLinkDiscovery::new(
                    http_client(&config)?,
                    config.index_url.clone(),
                    config.link_selector.clone(),
                ))
            } else {
                Arc::new(StaticDiscovery::new(source.urls))
            };

            info!(
                cache_dir = %config.cache_dir.display(),
                output_dir = %config.output_dir.display(),
                workers = config.workers,
                "Starting run"
            );

            let detector = detector_for(&config);
            let report = Pipeline::new(config, discovery, detector)?.run().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        },
        Command::Discover { index_url } => {
            if let Some(url) = index_url {
                config.index_url = url;
            }
            let discovery =
                HtmlLinkDiscovery::new(http_client(&config)?, config.index_url.clone(), config.link_selector.clone());

            for url in discovery.discover().await? {
                println!("{}", url);
            }
        },
        Command::Extract {
            pdf,
            output,
            detector,
        } => {
            detector.apply(&mut config);
            let reconciler = TableReconciler::new(detector_for(&config));

            let document = pdf.clone();
            let csv = tokio::task::spawn_blocking(move || reconciler.extract_csv(&document))
                .await?
                .with_context(|| format!("Failed to extract table from {}", pdf.display()))?;

            match output {
                Some(path) => {
                    write_atomic(&path, csv.as_bytes())?;
                    info!(path = %path.display(), "CSV written");
                },
                None => print!("{}", csv),
            }
        },
    }

    Ok(())
}
