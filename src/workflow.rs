//! The anchor-cloud analyzer workflow.
//!
//! A request names the step the client is on. The server walks an explicit
//! state machine from that step until it either needs more input from the
//! user or has a finished [`AnalysisResult`]:
//!
//! ```text
//! Discover ──────────────┐
//! ManualSitemap ─▶ LoadSitemap ─┼─▶ CheckLimit ─▶ Crawl ─▶ Completed
//! ParseManualUrls ───────┘            │
//!        (any of the above) ──────────┴─▶ NeedsInput
//! ```

use crate::anchors::AnchorAggregator;
use crate::config::AnalyzerSettings;
use crate::crawler::{AnchorCrawler, CrawlerConfig};
use crate::http_client::build_http_client;
use crate::models::AnalysisResult;
use crate::sitemap::{DiscoveryOutcome, SitemapDiscovery};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStep {
    #[default]
    Discover,
    ManualSitemap,
    ManualUrls,
}

/// Why the workflow stopped to ask the user for something
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputStep {
    NoSitemapFound,
    SitemapInputNeeded,
    ManualUrlsNeeded,
    UrlLimitExceeded,
}

/// Pages typed in by the user, either as a list or as one blob of text
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ManualUrls {
    List(Vec<String>),
    Text(String),
}

impl ManualUrls {
    /// Non-empty entries, split on newlines and commas
    pub fn entries(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            ManualUrls::List(list) => list.iter().map(String::as_str).collect(),
            ManualUrls::Text(text) => vec![text.as_str()],
        };

        raw.into_iter()
            .flat_map(|s| s.split(['\n', ',']))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub url: String,
    #[serde(default)]
    pub recaptcha_token: Option<String>,
    #[serde(default)]
    pub step: AnalysisStep,
    #[serde(default)]
    pub sitemap_url: Option<String>,
    #[serde(default)]
    pub manual_urls: Option<ManualUrls>,
    /// Crawl only the first `max_urls` pages instead of asking
    #[serde(default)]
    pub accept_url_limit: bool,
}

impl AnalysisRequest {
    pub fn discover(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            recaptcha_token: None,
            step: AnalysisStep::Discover,
            sitemap_url: None,
            manual_urls: None,
            accept_url_limit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputPrompt {
    pub needs_user_input: bool,
    pub step: InputStep,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl InputPrompt {
    fn new(step: InputStep, message: impl Into<String>, options: &[&str]) -> Self {
        Self {
            needs_user_input: true,
            step,
            message: message.into(),
            options: if options.is_empty() {
                None
            } else {
                Some(options.iter().map(|o| o.to_string()).collect())
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalyzerResponse {
    Success {
        success: bool,
        data: Box<AnalysisResult>,
    },
    NeedsInput(InputPrompt),
}

impl AnalyzerResponse {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AnalyzerResponse::Success { data, .. } => Some(data),
            AnalyzerResponse::NeedsInput(_) => None,
        }
    }

    pub fn prompt(&self) -> Option<&InputPrompt> {
        match self {
            AnalyzerResponse::NeedsInput(prompt) => Some(prompt),
            AnalyzerResponse::Success { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug)]
enum State {
    Discover,
    ManualSitemap,
    LoadSitemap(Url),
    ParseManualUrls,
    CheckLimit(Vec<Url>),
    Crawl(Vec<Url>),
    NeedsInput(InputPrompt),
    Completed(Box<AnalysisResult>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Discover,
    ManualSitemap,
    LoadSitemap,
    ParseManualUrls,
    CheckLimit,
    Crawl,
    NeedsInput,
    Completed,
}

impl State {
    fn kind(&self) -> StateKind {
        match self {
            State::Discover => StateKind::Discover,
            State::ManualSitemap => StateKind::ManualSitemap,
            State::LoadSitemap(_) => StateKind::LoadSitemap,
            State::ParseManualUrls => StateKind::ParseManualUrls,
            State::CheckLimit(_) => StateKind::CheckLimit,
            State::Crawl(_) => StateKind::Crawl,
            State::NeedsInput(_) => StateKind::NeedsInput,
            State::Completed(_) => StateKind::Completed,
        }
    }
}

/// Every legal transition of the workflow
pub const TRANSITIONS: &[(StateKind, StateKind)] = &[
    (StateKind::Discover, StateKind::CheckLimit),
    (StateKind::Discover, StateKind::NeedsInput),
    (StateKind::ManualSitemap, StateKind::LoadSitemap),
    (StateKind::ManualSitemap, StateKind::NeedsInput),
    (StateKind::LoadSitemap, StateKind::CheckLimit),
    (StateKind::LoadSitemap, StateKind::NeedsInput),
    (StateKind::ParseManualUrls, StateKind::CheckLimit),
    (StateKind::ParseManualUrls, StateKind::NeedsInput),
    (StateKind::CheckLimit, StateKind::Crawl),
    (StateKind::CheckLimit, StateKind::NeedsInput),
    (StateKind::Crawl, StateKind::Completed),
];

pub fn is_allowed_transition(from: StateKind, to: StateKind) -> bool {
    TRANSITIONS.contains(&(from, to))
}

pub struct Analyzer {
    settings: AnalyzerSettings,
    discovery: SitemapDiscovery,
    progress_bar: bool,
}

impl Analyzer {
    pub fn new(settings: AnalyzerSettings) -> anyhow::Result<Self> {
        let client = build_http_client(settings.request_timeout_secs)?;
        Ok(Self {
            settings,
            discovery: SitemapDiscovery::new(client),
            progress_bar: false,
        })
    }

    /// Shows a progress bar while crawling (CLI only)
    pub fn with_progress_bar(mut self) -> Self {
        self.progress_bar = true;
        self
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalyzerResponse, AnalysisError> {
        let base_url = normalize_site_url(&request.url)?;

        let mut state = match request.step {
            AnalysisStep::Discover => State::Discover,
            AnalysisStep::ManualSitemap => State::ManualSitemap,
            AnalysisStep::ManualUrls => State::ParseManualUrls,
        };

        loop {
            state = match state {
                State::NeedsInput(prompt) => {
                    tracing::info!(url = %base_url, step = ?prompt.step, "Analyzer needs user input");
                    return Ok(AnalyzerResponse::NeedsInput(prompt));
                }
                State::Completed(result) => {
                    return Ok(AnalyzerResponse::Success {
                        success: true,
                        data: result,
                    });
                }
                current => {
                    let from = current.kind();
                    let next = self.advance(current, request, &base_url).await?;
                    if !is_allowed_transition(from, next.kind()) {
                        return Err(AnalysisError::Internal(anyhow::anyhow!(
                            "Illegal workflow transition {:?} -> {:?}",
                            from,
                            next.kind()
                        )));
                    }
                    next
                }
            };
        }
    }

    async fn advance(
        &self,
        state: State,
        request: &AnalysisRequest,
        base_url: &Url,
    ) -> Result<State, AnalysisError> {
        let next = match state {
            State::Discover => match self.discovery.discover(base_url).await {
                DiscoveryOutcome::Found { pages, .. } => State::CheckLimit(pages),
                DiscoveryOutcome::Empty { sitemap_url } => State::NeedsInput(InputPrompt::new(
                    InputStep::SitemapInputNeeded,
                    format!(
                        "The sitemap at {} does not list any pages. Enter the URL of a sitemap that does.",
                        sitemap_url
                    ),
                    &[],
                )),
                DiscoveryOutcome::NotFound => State::NeedsInput(InputPrompt::new(
                    InputStep::NoSitemapFound,
                    "No sitemap was found for this site. Enter a sitemap URL or a list of pages to analyze.",
                    &["manual_sitemap", "manual_urls"],
                )),
            },

            State::ManualSitemap => {
                let sitemap_url = request
                    .sitemap_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .and_then(|s| base_url.join(s).ok());

                match sitemap_url {
                    Some(url) => State::LoadSitemap(url),
                    None => State::NeedsInput(InputPrompt::new(
                        InputStep::SitemapInputNeeded,
                        "Enter the URL of the sitemap to analyze.",
                        &[],
                    )),
                }
            }

            State::LoadSitemap(sitemap_url) => match self.discovery.load(&sitemap_url).await {
                Ok(pages) if !pages.is_empty() => State::CheckLimit(pages),
                Ok(_) => State::NeedsInput(InputPrompt::new(
                    InputStep::ManualUrlsNeeded,
                    format!(
                        "The sitemap at {} does not list any pages. Enter the pages to analyze instead.",
                        sitemap_url
                    ),
                    &[],
                )),
                Err(e) => {
                    tracing::warn!(sitemap = %sitemap_url, error = %e, "Failed to load sitemap");
                    State::NeedsInput(InputPrompt::new(
                        InputStep::ManualUrlsNeeded,
                        format!(
                            "The sitemap at {} could not be loaded ({}). Enter the pages to analyze instead.",
                            sitemap_url, e
                        ),
                        &[],
                    ))
                }
            },

            State::ParseManualUrls => {
                let urls = request
                    .manual_urls
                    .as_ref()
                    .map(|m| parse_manual_urls(&m.entries(), base_url))
                    .unwrap_or_default();

                if urls.is_empty() {
                    State::NeedsInput(InputPrompt::new(
                        InputStep::ManualUrlsNeeded,
                        "Enter at least one page URL (http or https), one per line.",
                        &[],
                    ))
                } else {
                    State::CheckLimit(urls)
                }
            }

            State::CheckLimit(mut urls) => {
                let limit = self.settings.max_urls;
                if urls.len() <= limit {
                    State::Crawl(urls)
                } else if request.accept_url_limit {
                    tracing::info!(found = urls.len(), limit, "Truncating URL list to the limit");
                    urls.truncate(limit);
                    State::Crawl(urls)
                } else {
                    let analyze_first = format!("analyze_first_{}", limit);
                    State::NeedsInput(InputPrompt::new(
                        InputStep::UrlLimitExceeded,
                        format!(
                            "Found {} pages, more than the {} page limit. Analyze the first {} pages or enter the pages to analyze.",
                            urls.len(),
                            limit,
                            limit
                        ),
                        &[analyze_first.as_str(), "manual_urls"],
                    ))
                }
            }

            State::Crawl(urls) => {
                tracing::info!(url = %base_url, pages = urls.len(), "Starting anchor crawl");
                let config = CrawlerConfig {
                    concurrent_requests: self.settings.concurrency,
                    requests_per_second: self.settings.requests_per_second,
                    request_timeout_secs: self.settings.request_timeout_secs,
                };
                let mut crawler = AnchorCrawler::new(base_url.as_str(), config)?;
                if self.progress_bar {
                    crawler.enable_progress_bar(urls.len() as u64);
                }

                let crawls = crawler.crawl(&urls).await;
                let result = AnchorAggregator::build_result(base_url.as_str(), &crawls);
                tracing::info!(
                    url = %base_url,
                    anchors = result.insights.total_anchors,
                    errors = result.insights.pages_with_errors,
                    "Anchor crawl finished"
                );
                State::Completed(Box::new(result))
            }

            terminal @ (State::NeedsInput(_) | State::Completed(_)) => terminal,
        };

        Ok(next)
    }
}

/// Accepts `https://site`, `http://site` and a bare `site` (https is
/// assumed). Any other scheme is rejected.
pub fn normalize_site_url(raw: &str) -> Result<Url, AnalysisError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::InvalidRequest("URL is required".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|_| AnalysisError::InvalidRequest(format!("Invalid URL: {}", trimmed)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(AnalysisError::InvalidRequest(
            "URL must start with http:// or https://".to_string(),
        )),
    }
}

/// Resolves entries against the site, keeps http(s) only, drops duplicates
pub fn parse_manual_urls(entries: &[String], base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter_map(|entry| base_url.join(entry).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialization() {
        let json = r#"{
            "url": "https://example.com",
            "recaptchaToken": "tok",
            "step": "manual_urls",
            "manualUrls": "https://example.com/a\nhttps://example.com/b, /c"
        }"#;
        let request: AnalysisRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.step, AnalysisStep::ManualUrls);
        assert_eq!(request.recaptcha_token.as_deref(), Some("tok"));
        assert_eq!(
            request.manual_urls.unwrap().entries(),
            vec!["https://example.com/a", "https://example.com/b", "/c"]
        );

        let request: AnalysisRequest =
            serde_json::from_str(r#"{"url": "example.com", "manualUrls": ["/x", " "]}"#).unwrap();
        assert_eq!(request.step, AnalysisStep::Discover);
        assert_eq!(request.manual_urls.unwrap().entries(), vec!["/x"]);
    }

    #[test]
    fn test_prompt_serialization() {
        let prompt = InputPrompt::new(
            InputStep::NoSitemapFound,
            "No sitemap",
            &["manual_sitemap", "manual_urls"],
        );
        let value = serde_json::to_value(AnalyzerResponse::NeedsInput(prompt)).unwrap();
        assert_eq!(value["needsUserInput"], true);
        assert_eq!(value["step"], "no_sitemap_found");
        assert_eq!(value["options"][1], "manual_urls");

        let prompt = InputPrompt::new(InputStep::ManualUrlsNeeded, "Enter pages", &[]);
        let value = serde_json::to_value(&prompt).unwrap();
        assert!(value.get("options").is_none());
    }

    #[test]
    fn test_normalize_site_url() {
        assert_eq!(
            normalize_site_url("example.com").unwrap().as_str(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_site_url(" http://localhost:8080/x ").unwrap().as_str(),
            "http://localhost:8080/x"
        );
        assert!(normalize_site_url("ftp://example.com").is_err());
        assert!(normalize_site_url("").is_err());
    }

    #[test]
    fn test_parse_manual_urls() {
        let base = Url::parse("https://example.com/").unwrap();
        let entries = vec![
            "/about".to_string(),
            "https://example.com/about".to_string(),
            "mailto:me@example.com".to_string(),
            "https://example.com/contact".to_string(),
        ];
        let urls = parse_manual_urls(&entries, &base);
        let urls: Vec<&str> = urls.iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/about", "https://example.com/contact"]
        );
    }

    #[test]
    fn test_transition_table() {
        assert!(is_allowed_transition(StateKind::Discover, StateKind::CheckLimit));
        assert!(is_allowed_transition(StateKind::CheckLimit, StateKind::NeedsInput));
        assert!(is_allowed_transition(StateKind::Crawl, StateKind::Completed));
        assert!(!is_allowed_transition(StateKind::Discover, StateKind::Crawl));
        assert!(!is_allowed_transition(StateKind::Crawl, StateKind::NeedsInput));
        assert!(!is_allowed_transition(StateKind::Completed, StateKind::Discover));
    }

    #[tokio::test]
    async fn test_manual_urls_missing_prompts_for_input() {
        let analyzer = Analyzer::new(AnalyzerSettings::default()).unwrap();
        let request = AnalysisRequest {
            step: AnalysisStep::ManualUrls,
            ..AnalysisRequest::discover("https://example.com")
        };

        let response = analyzer.run(&request).await.unwrap();
        assert_eq!(response.prompt().unwrap().step, InputStep::ManualUrlsNeeded);
    }

    #[tokio::test]
    async fn test_manual_sitemap_without_url_prompts_for_sitemap() {
        let analyzer = Analyzer::new(AnalyzerSettings::default()).unwrap();
        let request = AnalysisRequest {
            step: AnalysisStep::ManualSitemap,
            sitemap_url: Some("  ".to_string()),
            ..AnalysisRequest::discover("https://example.com")
        };

        let response = analyzer.run(&request).await.unwrap();
        assert_eq!(response.prompt().unwrap().step, InputStep::SitemapInputNeeded);
    }

    #[tokio::test]
    async fn test_url_limit_exceeded_for_manual_urls() {
        let settings = AnalyzerSettings {
            max_urls: 2,
            ..Default::default()
        };
        let analyzer = Analyzer::new(settings).unwrap();
        let request = AnalysisRequest {
            step: AnalysisStep::ManualUrls,
            manual_urls: Some(ManualUrls::Text("/a\n/b\n/c".to_string())),
            ..AnalysisRequest::discover("https://example.com")
        };

        let response = analyzer.run(&request).await.unwrap();
        let prompt = response.prompt().unwrap();
        assert_eq!(prompt.step, InputStep::UrlLimitExceeded);
        assert_eq!(
            prompt.options,
            Some(vec!["analyze_first_2".to_string(), "manual_urls".to_string()])
        );
    }
}
