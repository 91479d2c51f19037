use clap::{Args, Parser, Subcommand};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_PATH: &str = "data/seodesk.db";
pub const DEFAULT_MAX_URLS: usize = 500;
pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "seodesk")]
#[command(about = "Backend and anchor-text analyzer for an SEO agency website", long_about = None)]
pub struct Cli {
    /// Path to configuration file (JSON, TOML, or YAML)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Crawl a site and report its anchor-text usage
    Analyze(AnalyzeArgs),

    /// Apply database migrations and seed default rows
    Migrate(DatabaseArgs),

    /// Regenerate the redirection cache file from the database
    RebuildRedirects(DatabaseArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on (default: 3000)
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// SQLite database file
    #[arg(long)]
    pub database: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct DatabaseArgs {
    /// SQLite database file
    #[arg(long)]
    pub database: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct AnalyzeArgs {
    /// The site to analyze
    #[arg(value_name = "URL")]
    pub url: String,

    /// Use this sitemap instead of discovering one
    #[arg(long)]
    pub sitemap: Option<String>,

    /// Analyze these pages instead of a sitemap (repeatable)
    #[arg(long = "page", value_name = "URL")]
    pub pages: Vec<String>,

    /// Maximum number of pages to analyze (default: 500)
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_MAX_URLS,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_urls: usize,

    /// Crawl only the first --max-urls pages when the sitemap lists more
    #[arg(long)]
    pub accept_limit: bool,

    /// Number of concurrent requests (default: 5)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Rate limit for requests per second (optional, e.g., 1.0 for 1 req/s)
    #[arg(short = 'r', long)]
    pub rate_limit: Option<f64>,

    /// Output format: text, json or csv
    #[arg(short, long, default_value = "text")]
    pub output: String,

    /// Save report to file
    #[arg(short, long)]
    pub save: Option<String>,
}
