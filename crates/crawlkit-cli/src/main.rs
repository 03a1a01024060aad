//! CrawlKit CLI - fetch platform content into a local store

use clap::{Args, Parser, Subcommand, ValueEnum};
use crawlkit::{
    Crawler, CrawlerConfig, Credentials, FetchRequest, OfflineSessions, OutputFormat,
    PlatformRouter,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Output format written to the record directory
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Format {
    Text,
    #[default]
    Markdown,
    Html,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Markdown => OutputFormat::Markdown,
            Format::Html => OutputFormat::Html,
        }
    }
}

/// CrawlKit - multi-platform content acquisition
#[derive(Parser, Debug)]
#[command(name = "crawlkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Args, Debug, Clone)]
struct FetchArgs {
    /// Storage root
    #[arg(long, default_value = "downloads")]
    dest: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "markdown")]
    format: Format,

    /// Do not download images or videos
    #[arg(long)]
    no_images: bool,

    /// Sub-items (answers, posts, notes) to keep
    #[arg(long, default_value_t = crawlkit::DEFAULT_MAX_ITEMS)]
    max_items: usize,

    /// Keep an existing record instead of rewriting it
    #[arg(long)]
    no_force: bool,

    /// Cookie header string, or a path to a JSON cookie export
    #[arg(long)]
    cookies: Option<String>,

    /// Durable cache backend, e.g. redis://127.0.0.1/
    #[arg(long)]
    redis_url: Option<String>,

    /// Custom User-Agent
    #[arg(long)]
    user_agent: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch one target and print the result as JSON
    Fetch {
        /// URL or pseudo-URL (e.g. xhs_keyword:coffee)
        target: String,

        #[command(flatten)]
        args: FetchArgs,
    },
    /// Fetch several targets concurrently
    Batch {
        #[arg(required = true)]
        targets: Vec<String>,

        /// Parallel fetches, capped by the crawler's concurrency bound
        #[arg(long, default_value_t = 3)]
        max_concurrent: usize,

        #[command(flatten)]
        args: FetchArgs,
    },
    /// List supported platforms and target shapes
    Platforms,
    /// Show how a target would be routed
    Info {
        target: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Fetch { target, args } => run_fetch(&target, &args).await,
        Commands::Batch {
            targets,
            max_concurrent,
            args,
        } => run_batch(targets, max_concurrent, &args).await,
        Commands::Platforms => print_json(&PlatformRouter::new().supported_platforms()),
        Commands::Info { target } => print_json(&PlatformRouter::new().platform_info(&target)),
    }
}

/// Log to stderr so stdout carries only JSON
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn build_crawler(args: &FetchArgs) -> Crawler {
    let mut config = CrawlerConfig {
        download_dir: args.dest.clone(),
        redis_url: args.redis_url.clone(),
        ..Default::default()
    };
    if let Some(ua) = &args.user_agent {
        config.user_agent = ua.clone();
    }
    Crawler::from_config(config).await.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    })
}

fn build_request(target: &str, args: &FetchArgs) -> FetchRequest {
    let mut request = FetchRequest::new(target)
        .destination(&args.dest)
        .save_images(!args.no_images)
        .output_format(args.format.into())
        .max_items(args.max_items)
        .force_save(!args.no_force);
    if let Some(raw) = &args.cookies {
        match load_credentials(raw) {
            Ok(credentials) => request = request.credentials(credentials),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
    request
}

/// Read cookies from a JSON export file, or take the value as a header
fn load_credentials(raw: &str) -> Result<Credentials, String> {
    let path = PathBuf::from(raw);
    if !path.is_file() {
        return Ok(Credentials::Header(raw.to_string()));
    }
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&contents).map_err(|e| format!("invalid cookie file {}: {}", path.display(), e))
}

async fn run_fetch(target: &str, args: &FetchArgs) {
    let crawler = build_crawler(args).await;
    let result = crawler
        .fetch(&build_request(target, args), &OfflineSessions)
        .await;
    print_json(&result);
    if !result.success {
        std::process::exit(1);
    }
}

async fn run_batch(targets: Vec<String>, max_concurrent: usize, args: &FetchArgs) {
    let crawler = build_crawler(args).await;
    let requests = targets.iter().map(|t| build_request(t, args)).collect();
    let batch = crawler
        .batch_fetch(requests, max_concurrent, &OfflineSessions)
        .await;
    print_json(&batch);
}

fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        std::process::exit(1);
    });
    writeln_safe(&json);
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}
