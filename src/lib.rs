pub mod anchors;
pub mod auth;
pub mod cli;
pub mod cms;
pub mod config;
pub mod crawler;
pub mod db;
pub mod error;
pub mod export;
pub mod http_client;
pub mod models;
pub mod newsletter;
pub mod pages;
pub mod recaptcha;
pub mod redirects;
pub mod robots;
pub mod seo;
pub mod server;
pub mod sitemap;
pub mod workflow;

use anyhow::{Context, Result, bail};
use cli::{AnalyzeArgs, Cli, Command, DatabaseArgs, ServeArgs};
use colored::*;
use config::{AuthEnv, Config};
use db::Database;
use export::{ExportFormat, Exporter};
use redirects::RedirectionCache;
use server::AppState;
use workflow::{AnalysisRequest, AnalysisStep, Analyzer, InputStep, ManualUrls};

pub async fn run(args: Cli) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Serve(serve_args) => serve(&config, &serve_args).await,
        Command::Analyze(analyze_args) => analyze(&config, &analyze_args, args.verbose).await,
        Command::Migrate(db_args) => migrate(&config, &db_args),
        Command::RebuildRedirects(db_args) => rebuild_redirects(&config, &db_args),
    }
}

async fn serve(config: &Config, args: &ServeArgs) -> Result<()> {
    // Secrets are checked before anything touches the database
    let auth_env = AuthEnv::from_env()?;

    let args = config.merge_serve_args(args);
    let settings = config.settings(args.database.as_deref());

    println!("{}", "SEO Desk - API Server".bright_cyan().bold());
    println!("{}", "=".repeat(50).bright_blue());
    println!("{} {}", "Database:".bright_white().bold(), settings.database_path.display());
    println!("{} {}", "Site URL:".bright_white().bold(), settings.site.url);
    println!(
        "{} http://{}:{}",
        "Listening on:".bright_white().bold(),
        args.host,
        args.port
    );
    println!();

    let state = AppState::bootstrap(&settings, &auth_env)?;
    server::run_server(state, &args.host, args.port).await
}

async fn analyze(config: &Config, args: &AnalyzeArgs, verbose: bool) -> Result<()> {
    let args = config.merge_analyze_args(args);
    let format = ExportFormat::parse(&args.output)?;
    let print_banner = format == ExportFormat::Text;

    let mut settings = config.settings(None).analyzer;
    settings.max_urls = args.max_urls.max(1);
    settings.concurrency = args.concurrency.max(1);
    settings.requests_per_second = args.rate_limit;

    if print_banner {
        println!("{}", "Anchor Cloud - Anchor Text Analyzer".bright_cyan().bold());
        println!("{}", "=".repeat(50).bright_blue());
        println!();
        println!("{} {}", "Site:".bright_white().bold(), args.url);
        println!("{} {}", "Max URLs:".bright_white().bold(), settings.max_urls);
        println!("{} {}", "Concurrency:".bright_white().bold(), settings.concurrency);
        if let Some(rps) = settings.requests_per_second {
            println!("{} {} req/s", "Rate limit:".bright_white().bold(), rps);
        }
        println!();
    }

    let request = analysis_request(&args);
    if verbose {
        println!("{} {:?}", "Starting at step:".bright_yellow(), request.step);
    }

    let mut analyzer = Analyzer::new(settings)?;
    if print_banner {
        analyzer = analyzer.with_progress_bar();
    }

    let response = analyzer.run(&request).await?;

    if let Some(prompt) = response.prompt() {
        let hint = match prompt.step {
            InputStep::NoSitemapFound | InputStep::ManualUrlsNeeded => {
                "Pass --sitemap <URL> or one or more --page <URL>"
            }
            InputStep::SitemapInputNeeded => "Pass --sitemap <URL>",
            InputStep::UrlLimitExceeded => "Pass --accept-limit or raise --max-urls",
        };
        bail!("{} ({})", prompt.message, hint);
    }

    let Some(result) = response.result() else {
        bail!("Analyzer returned no result");
    };

    match format {
        ExportFormat::Text => Exporter::print_text_report(result),
        other => println!("{}", Exporter::render(result, other)?),
    }

    if let Some(filename) = &args.save {
        let save_format = ExportFormat::from_extension(filename).unwrap_or(format);
        Exporter::save(result, save_format, filename)?;
    }

    Ok(())
}

fn analysis_request(args: &AnalyzeArgs) -> AnalysisRequest {
    let mut request = AnalysisRequest::discover(args.url.clone());
    request.accept_url_limit = args.accept_limit;

    if !args.pages.is_empty() {
        request.step = AnalysisStep::ManualUrls;
        request.manual_urls = Some(ManualUrls::List(args.pages.clone()));
    } else if let Some(sitemap) = &args.sitemap {
        request.step = AnalysisStep::ManualSitemap;
        request.sitemap_url = Some(sitemap.clone());
    }

    request
}

fn open_database(config: &Config, args: &DatabaseArgs) -> Result<(Database, config::Settings)> {
    let settings = config.settings(args.database.as_deref());
    let db = Database::open(&settings.database_path).with_context(|| {
        format!("Failed to open database {}", settings.database_path.display())
    })?;
    Ok((db, settings))
}

fn migrate(config: &Config, args: &DatabaseArgs) -> Result<()> {
    let (db, settings) = open_database(config, args)?;
    let report = db.with_conn(db::seed::seed_defaults)?;

    println!(
        "{} {} is at schema version {}",
        "Success:".bright_green().bold(),
        settings.database_path.display(),
        db.schema_version()?
    );
    if report.authors + report.categories > 0 {
        println!(
            "  Seeded {} author(s) and {} categor{}",
            report.authors,
            report.categories,
            if report.categories == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}

fn rebuild_redirects(config: &Config, args: &DatabaseArgs) -> Result<()> {
    let (db, settings) = open_database(config, args)?;
    let cache = RedirectionCache::new(&settings.redirects_cache_path);
    let count = cache.update(&db)?;

    println!(
        "{} wrote {} redirection(s) to {}",
        "Success:".bright_green().bold(),
        count,
        cache.path().display()
    );
    Ok(())
}
