use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cli::{
    AnalyzeArgs, DEFAULT_CONCURRENCY, DEFAULT_DATABASE_PATH, DEFAULT_HOST, DEFAULT_MAX_URLS,
    DEFAULT_PORT, ServeArgs,
};

pub const DEFAULT_REDIRECTS_CACHE_PATH: &str = "data/redirects.json";
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DEFAULT_SITE_NAME: &str = "SEO Desk";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_STORYBLOK_API_BASE: &str = "https://api.storyblok.com/v2";
pub const DEFAULT_RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
pub const DEFAULT_RECAPTCHA_MIN_SCORE: f64 = 0.5;

/// Configuration file structure. All fields are optional to allow partial
/// configuration; CLI flags win over anything set here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Address the HTTP API binds to
    pub host: Option<String>,

    /// Port the HTTP API listens on
    pub port: Option<u16>,

    /// SQLite database file
    pub database_path: Option<String>,

    /// Where the redirection cache JSON is written
    pub redirects_cache_path: Option<String>,

    /// Public origin of the website, used for canonical URLs
    pub site_url: Option<String>,

    pub site_name: Option<String>,

    /// Maximum number of pages one analysis may crawl
    pub max_urls: Option<usize>,

    /// Number of concurrent requests while crawling
    pub concurrency: Option<usize>,

    /// Rate limit for requests per second
    pub rate_limit: Option<f64>,

    pub request_timeout_secs: Option<u64>,

    /// Upper bound for one analyzer request on the server
    pub analysis_timeout_secs: Option<u64>,

    /// Output format for `analyze`: text, json or csv
    pub output: Option<String>,

    pub storyblok_api_base: Option<String>,

    /// Storyblok content version: published or draft
    pub storyblok_version: Option<String>,

    pub recaptcha_verify_url: Option<String>,

    pub recaptcha_min_score: Option<f64>,
}

/// Configuration file format based on file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                "toml" => Some(ConfigFormat::Toml),
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                _ => None,
            })
    }

    pub fn extensions(&self) -> &[&str] {
        match self {
            ConfigFormat::Json => &["json"],
            ConfigFormat::Toml => &["toml"],
            ConfigFormat::Yaml => &["yaml", "yml"],
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let format = ConfigFormat::from_path(path)
            .with_context(|| format!("Unsupported config file format: {}", path.display()))?;

        let config = match format {
            ConfigFormat::Json => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            ConfigFormat::Toml => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            ConfigFormat::Yaml => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
        };

        Ok(config)
    }

    /// Default configuration file paths in order of priority: current
    /// directory first, then the user config directory.
    pub fn default_paths() -> Vec<PathBuf> {
        let formats = [ConfigFormat::Json, ConfigFormat::Toml, ConfigFormat::Yaml];
        let mut paths = Vec::new();

        for format in &formats {
            for ext in format.extensions() {
                paths.push(PathBuf::from(format!("seodesk.{}", ext)));
            }
        }

        // XDG_CONFIG_HOME if set and non-empty, otherwise ~/.config
        let config_home = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")));

        if let Some(config_home) = config_home {
            let app_dir = config_home.join("seodesk");
            for format in &formats {
                for ext in format.extensions() {
                    paths.push(app_dir.join(format!("config.{}", ext)));
                }
            }
        }

        paths
    }

    /// Returns the first configuration file found, or None if no config exists
    pub fn from_default_paths() -> Result<Option<Self>> {
        for path in Self::default_paths() {
            if path.exists() {
                return Ok(Some(Self::from_file(&path)?));
            }
        }
        Ok(None)
    }

    /// Loads an explicit config file when given, otherwise the first default
    /// path that exists, otherwise an empty configuration.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(Path::new(path)),
            None => Ok(Self::from_default_paths()?.unwrap_or_default()),
        }
    }

    /// Merge with `serve` arguments. CLI arguments take precedence.
    pub fn merge_serve_args(&self, args: &ServeArgs) -> ServeArgs {
        ServeArgs {
            host: if args.host != DEFAULT_HOST {
                args.host.clone()
            } else {
                self.host.clone().unwrap_or_else(|| args.host.clone())
            },
            port: if args.port != DEFAULT_PORT {
                args.port
            } else {
                self.port.unwrap_or(args.port)
            },
            database: args.database.clone().or_else(|| self.database_path.clone()),
        }
    }

    /// Merge with `analyze` arguments. CLI arguments take precedence.
    pub fn merge_analyze_args(&self, args: &AnalyzeArgs) -> AnalyzeArgs {
        AnalyzeArgs {
            url: args.url.clone(),
            sitemap: args.sitemap.clone(),
            pages: args.pages.clone(),
            max_urls: if args.max_urls != DEFAULT_MAX_URLS {
                args.max_urls
            } else {
                self.max_urls.unwrap_or(args.max_urls)
            },
            accept_limit: args.accept_limit,
            concurrency: if args.concurrency != DEFAULT_CONCURRENCY {
                args.concurrency
            } else {
                self.concurrency.unwrap_or(args.concurrency)
            },
            rate_limit: args.rate_limit.or(self.rate_limit),
            output: if args.output != "text" {
                args.output.clone()
            } else {
                self.output.clone().unwrap_or_else(|| args.output.clone())
            },
            save: args.save.clone(),
        }
    }

    /// Resolves every setting the server and analyzer need, filling defaults.
    pub fn settings(&self, database_override: Option<&str>) -> Settings {
        Settings {
            database_path: PathBuf::from(
                database_override
                    .map(str::to_string)
                    .or_else(|| self.database_path.clone())
                    .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            ),
            redirects_cache_path: PathBuf::from(
                self.redirects_cache_path
                    .clone()
                    .unwrap_or_else(|| DEFAULT_REDIRECTS_CACHE_PATH.to_string()),
            ),
            site: SiteSettings {
                url: self
                    .site_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SITE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                name: self
                    .site_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SITE_NAME.to_string()),
            },
            analyzer: AnalyzerSettings {
                max_urls: self.max_urls.unwrap_or(DEFAULT_MAX_URLS).max(1),
                concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1),
                requests_per_second: self.rate_limit,
                request_timeout_secs: self
                    .request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
                analysis_timeout_secs: self
                    .analysis_timeout_secs
                    .unwrap_or(DEFAULT_ANALYSIS_TIMEOUT_SECS),
            },
            storyblok: StoryblokSettings {
                api_base: self
                    .storyblok_api_base
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STORYBLOK_API_BASE.to_string()),
                version: self
                    .storyblok_version
                    .clone()
                    .unwrap_or_else(|| "published".to_string()),
                token: env_non_empty("STORYBLOK_TOKEN"),
            },
            recaptcha: RecaptchaSettings {
                verify_url: self
                    .recaptcha_verify_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_RECAPTCHA_VERIFY_URL.to_string()),
                min_score: self
                    .recaptcha_min_score
                    .unwrap_or(DEFAULT_RECAPTCHA_MIN_SCORE),
                secret: env_non_empty("RECAPTCHA_SECRET_KEY"),
            },
        }
    }
}

/// Fully resolved application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub redirects_cache_path: PathBuf,
    pub site: SiteSettings,
    pub analyzer: AnalyzerSettings,
    pub storyblok: StoryblokSettings,
    pub recaptcha: RecaptchaSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteSettings {
    /// Origin without a trailing slash
    pub url: String,
    pub name: String,
}

impl SiteSettings {
    pub fn absolute(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.url, path)
        } else {
            format!("{}/{}", self.url, path)
        }
    }

    pub fn is_https(&self) -> bool {
        self.url.starts_with("https://")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    pub max_urls: usize,
    pub concurrency: usize,
    pub requests_per_second: Option<f64>,
    pub request_timeout_secs: u64,
    pub analysis_timeout_secs: u64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            max_urls: DEFAULT_MAX_URLS,
            concurrency: DEFAULT_CONCURRENCY,
            requests_per_second: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            analysis_timeout_secs: DEFAULT_ANALYSIS_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoryblokSettings {
    pub api_base: String,
    pub version: String,
    /// No token means the CMS is not consulted
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecaptchaSettings {
    pub verify_url: String,
    pub min_score: f64,
    /// No secret means verification is skipped
    pub secret: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),
}

/// Secrets the admin subsystem cannot start without
#[derive(Clone)]
pub struct AuthEnv {
    pub jwt_secret: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl std::fmt::Debug for AuthEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEnv")
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

impl AuthEnv {
    /// Reads `JWT_SECRET`, `ADMIN_EMAIL` and `ADMIN_PASSWORD`. Any of them
    /// missing or empty is fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            jwt_secret: env_non_empty("JWT_SECRET").ok_or(ConfigError::MissingEnv("JWT_SECRET"))?,
            admin_email: env_non_empty("ADMIN_EMAIL")
                .ok_or(ConfigError::MissingEnv("ADMIN_EMAIL"))?,
            admin_password: env_non_empty("ADMIN_PASSWORD")
                .ok_or(ConfigError::MissingEnv("ADMIN_PASSWORD"))?,
        })
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
