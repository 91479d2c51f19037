use crate::anchors::NO_TEXT;
use crate::http_client::build_http_client;
use crate::models::{CrawledPage, PageAnchor, PageCrawl};
use anyhow::{Context, Result, anyhow};
use futures::stream::{self, StreamExt};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::num::NonZeroU32;
use url::Url;

/// Configuration for the anchor crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub concurrent_requests: usize,
    pub requests_per_second: Option<f64>,
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrent_requests: 5,
            requests_per_second: None,
            request_timeout_secs: 30,
        }
    }
}

// Cached selectors to avoid repeated parsing
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("title selector should be valid"));
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("a[href] selector should be valid"));
static IMG_ALT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[alt]").expect("img[alt] selector should be valid"));

const SKIPPED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:", "data:", "sms:"];

/// Fetches a fixed list of pages and extracts their anchors. Nothing is
/// followed: the URL list is the whole crawl.
pub struct AnchorCrawler {
    client: reqwest::Client,
    base_url: Url,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    concurrent_requests: usize,
    progress_bar: Option<ProgressBar>,
}

impl AnchorCrawler {
    pub fn new(base_url: &str, config: CrawlerConfig) -> Result<Self> {
        let base_url = Url::parse(base_url).context("Invalid URL")?;

        match base_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(anyhow!(
                    "Invalid URL scheme '{}': only http and https are supported",
                    scheme
                ));
            }
        }

        let rate_limiter = config
            .requests_per_second
            .and_then(|rps| NonZeroU32::new(rps.ceil() as u32))
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client: build_http_client(config.request_timeout_secs)?,
            base_url,
            rate_limiter,
            concurrent_requests: config.concurrent_requests.max(1),
            progress_bar: None,
        })
    }

    pub fn enable_progress_bar(&mut self, total: u64) {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} pages")
                .expect("Progress bar template should be valid"),
        );
        self.progress_bar = Some(pb);
    }

    /// Crawls every URL once. Results come back in input order. A page that
    /// fails is recorded with its error and does not stop the crawl.
    pub async fn crawl(&self, urls: &[Url]) -> Vec<PageCrawl> {
        let results = stream::iter(urls)
            .map(|url| async move {
                let crawl = match self.fetch_page(url).await {
                    Ok(crawl) => crawl,
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Failed to crawl page");
                        PageCrawl {
                            page: CrawledPage::failed(url.as_str(), None, e.to_string()),
                            anchors: vec![],
                        }
                    }
                };
                if let Some(ref pb) = self.progress_bar {
                    pb.inc(1);
                }
                crawl
            })
            .buffered(self.concurrent_requests)
            .collect::<Vec<_>>()
            .await;

        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message(format!("Crawled {} pages", results.len()));
        }

        results
    }

    async fn fetch_page(&self, url: &Url) -> Result<PageCrawl> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let response = self.client.get(url.clone()).send().await?;
        let status_code = response.status().as_u16();

        if !response.status().is_success() {
            return Ok(PageCrawl {
                page: CrawledPage::failed(url.as_str(), Some(status_code), format!("HTTP {}", status_code)),
                anchors: vec![],
            });
        }

        // A missing content type is parsed as HTML
        if let Some(ct) = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .filter(|ct| !is_html_content_type(ct))
        {
            tracing::warn!(url = %url, content_type = %ct, "Skipping non-HTML page");
            return Ok(PageCrawl {
                page: CrawledPage::failed(
                    url.as_str(),
                    Some(status_code),
                    format!("Unsupported content type {}", ct),
                ),
                anchors: vec![],
            });
        }

        // Relative links resolve against the final URL after redirects
        let page_url = response.url().clone();
        let html_content = response.text().await?;
        let document = Html::parse_document(&html_content);

        let anchors = self.extract_anchors(&document, &page_url);

        Ok(PageCrawl {
            page: CrawledPage {
                url: url.to_string(),
                status_code: Some(status_code),
                title: Self::extract_title(&document),
                link_count: anchors.len(),
                error: None,
            },
            anchors,
        })
    }

    fn extract_title(document: &Html) -> Option<String> {
        document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    }

    pub fn extract_anchors(&self, document: &Html, page_url: &Url) -> Vec<PageAnchor> {
        let mut anchors = Vec::new();

        for element in document.select(&ANCHOR_SELECTOR) {
            let Some(raw_href) = element.value().attr("href").map(str::trim) else {
                continue;
            };

            let lowered = raw_href.to_lowercase();
            if raw_href.is_empty()
                || raw_href.starts_with('#')
                || SKIPPED_SCHEMES.iter().any(|s| lowered.starts_with(s))
            {
                continue;
            }

            let Ok(mut absolute_url) = page_url.join(raw_href) else {
                continue;
            };
            if !matches!(absolute_url.scheme(), "http" | "https") {
                continue;
            }
            absolute_url.set_fragment(None);

            let nofollow = element
                .value()
                .attr("rel")
                .map(|rel| {
                    rel.split_ascii_whitespace()
                        .any(|r| r.eq_ignore_ascii_case("nofollow"))
                })
                .unwrap_or(false);

            anchors.push(PageAnchor {
                text: anchor_text(&element),
                is_external: self.is_external_url(&absolute_url),
                href: absolute_url.to_string(),
                nofollow,
            });
        }

        anchors
    }

    /// External means a different host than the analyzed site, ignoring a
    /// leading `www.`
    fn is_external_url(&self, url: &Url) -> bool {
        let strip = |host: Option<&str>| {
            host.map(|h| h.trim_start_matches("www.").to_lowercase())
        };
        strip(url.host_str()) != strip(self.base_url.host_str())
            || url.port_or_known_default() != self.base_url.port_or_known_default()
    }
}

/// Visible text of an anchor; image-only anchors fall back to the image alt
fn anchor_text(element: &ElementRef) -> String {
    let text = collapse_whitespace(&element.text().collect::<String>());
    if !text.is_empty() {
        return text;
    }

    element
        .select(&IMG_ALT_SELECTOR)
        .filter_map(|img| img.value().attr("alt"))
        .map(collapse_whitespace)
        .find(|alt| !alt.is_empty())
        .map(|alt| format!("[image] {}", alt))
        .unwrap_or_else(|| NO_TEXT.to_string())
}

fn is_html_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_lowercase();
    lowered.contains("text/html") || lowered.contains("application/xhtml")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
