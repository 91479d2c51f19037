use serde::{Deserialize, Serialize};

/// One `<a href>` found on one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnchor {
    pub text: String,
    pub href: String,
    pub is_external: bool,
    pub nofollow: bool,
}

/// Outcome of fetching one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawledPage {
    pub url: String,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub link_count: usize,
    pub error: Option<String>,
}

impl CrawledPage {
    pub fn failed(url: impl Into<String>, status_code: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status_code,
            title: None,
            link_count: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A crawled page together with the anchors it contained
#[derive(Debug, Clone)]
pub struct PageCrawl {
    pub page: CrawledPage,
    pub anchors: Vec<PageAnchor>,
}

/// Usage of one (text, href) pair across the crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub text: String,
    pub href: String,
    pub count: usize,
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub href: String,
    pub count: usize,
}

/// Usage of one anchor text, possibly pointing at several destinations.
/// `href` is the comma-joined list of destination hrefs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorData {
    pub text: String,
    pub href: String,
    pub count: usize,
    pub pages: Vec<String>,
    pub destinations: Vec<Destination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopAnchor {
    pub text: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub total_anchors: usize,
    pub unique_anchor_texts: usize,
    pub unique_destinations: usize,
    pub internal_links: usize,
    pub external_links: usize,
    pub nofollow_links: usize,
    pub empty_anchors: usize,
    pub generic_anchors: usize,
    pub anchors_with_multiple_destinations: usize,
    pub pages_crawled: usize,
    pub pages_with_errors: usize,
    pub average_links_per_page: f64,
    pub top_anchors: Vec<TopAnchor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub url: String,
    pub anchors: Vec<AnchorData>,
    pub insights: Insights,
    pub crawled_pages: Vec<CrawledPage>,
    pub pages_with_no_links: Vec<String>,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCloudEntry {
    pub text: String,
    pub count: usize,
    /// `count / max_count`, in (0, 1]
    pub weight: f64,
}
