use crate::robots::RobotsTxt;
use anyhow::{Result, bail};
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::collections::{HashSet, VecDeque};
use std::io::Cursor;
use url::Url;

/// Paths probed when robots.txt declares no sitemap
pub const COMMON_SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap-index.xml",
    "/wp-sitemap.xml",
];

/// How deep sitemap indexes are followed
const MAX_SITEMAP_DEPTH: usize = 3;

/// Stop collecting page URLs past this many
const MAX_COLLECTED_URLS: usize = 50_000;

/// Entries of one sitemap document
#[derive(Debug, Default, PartialEq)]
pub struct SitemapContents {
    pub pages: Vec<Url>,
    pub sitemaps: Vec<Url>,
}

/// Parses a `<urlset>` or `<sitemapindex>` document. Malformed entries are
/// skipped.
pub fn parse_sitemap(xml: &[u8]) -> SitemapContents {
    let mut contents = SitemapContents::default();

    for entity in SiteMapReader::new(Cursor::new(xml)) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    contents.pages.push(url);
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    contents.sitemaps.push(url);
                }
            }
            SiteMapEntity::Err(e) => {
                tracing::debug!(error = ?e, "Skipping malformed sitemap entry");
            }
        }
    }

    contents
}

#[derive(Debug, PartialEq)]
pub enum DiscoveryOutcome {
    /// A sitemap listing at least one page
    Found { sitemap_url: Url, pages: Vec<Url> },
    /// Sitemaps exist but list no pages
    Empty { sitemap_url: Url },
    NotFound,
}

pub struct SitemapDiscovery {
    client: reqwest::Client,
}

impl SitemapDiscovery {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Candidate sitemap locations for a site: robots.txt declarations
    /// first, then the common paths.
    pub async fn candidates(&self, base_url: &Url) -> Vec<Url> {
        let robots = match RobotsTxt::fetch(&self.client, base_url).await {
            Ok(robots) => robots,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read robots.txt, continuing anyway");
                RobotsTxt::default()
            }
        };

        let mut candidates = robots.sitemaps;
        for path in COMMON_SITEMAP_PATHS {
            if let Ok(url) = base_url.join(path)
                && !candidates.contains(&url)
            {
                candidates.push(url);
            }
        }
        candidates
    }

    /// Tries each candidate in order and returns the first that lists pages
    pub async fn discover(&self, base_url: &Url) -> DiscoveryOutcome {
        let mut empty: Option<Url> = None;

        for candidate in self.candidates(base_url).await {
            match self.load(&candidate).await {
                Ok(pages) if !pages.is_empty() => {
                    tracing::info!(sitemap = %candidate, pages = pages.len(), "Sitemap discovered");
                    return DiscoveryOutcome::Found {
                        sitemap_url: candidate,
                        pages,
                    };
                }
                Ok(_) => {
                    tracing::debug!(sitemap = %candidate, "Sitemap lists no pages");
                    empty.get_or_insert(candidate);
                }
                Err(e) => {
                    tracing::debug!(sitemap = %candidate, error = %e, "No sitemap at candidate");
                }
            }
        }

        match empty {
            Some(sitemap_url) => DiscoveryOutcome::Empty { sitemap_url },
            None => DiscoveryOutcome::NotFound,
        }
    }

    /// Loads a sitemap and every nested sitemap it indexes. Fails only when
    /// the top-level document cannot be fetched.
    pub async fn load(&self, sitemap_url: &Url) -> Result<Vec<Url>> {
        let root = self.fetch(sitemap_url).await?;

        let mut pages = Vec::new();
        let mut seen_pages = HashSet::new();
        let mut seen_sitemaps = HashSet::from([sitemap_url.clone()]);
        let mut queue: VecDeque<(SitemapContents, usize)> = VecDeque::from([(root, 0)]);

        while let Some((contents, depth)) = queue.pop_front() {
            for page in contents.pages {
                if pages.len() >= MAX_COLLECTED_URLS {
                    tracing::warn!(limit = MAX_COLLECTED_URLS, "Sitemap truncated");
                    return Ok(pages);
                }
                if seen_pages.insert(page.clone()) {
                    pages.push(page);
                }
            }

            if depth >= MAX_SITEMAP_DEPTH {
                continue;
            }

            for nested in contents.sitemaps {
                if !seen_sitemaps.insert(nested.clone()) {
                    continue;
                }
                match self.fetch(&nested).await {
                    Ok(nested_contents) => queue.push_back((nested_contents, depth + 1)),
                    Err(e) => {
                        tracing::warn!(sitemap = %nested, error = %e, "Failed to load nested sitemap");
                    }
                }
            }
        }

        Ok(pages)
    }

    async fn fetch(&self, url: &Url) -> Result<SitemapContents> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            bail!("HTTP {}", response.status().as_u16());
        }
        let body = response.bytes().await?;
        Ok(parse_sitemap(&body))
    }
}
