use crate::models::{
    AnalysisResult, AnchorData, AnchorRecord, Destination, Insights, PageCrawl, TopAnchor,
    WordCloudEntry,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Text used for anchors with neither text nor an image alt
pub const NO_TEXT: &str = "[no text]";

/// Anchor texts that tell neither readers nor search engines where a link goes
pub const GENERIC_ANCHOR_TEXTS: &[&str] = &[
    "click here",
    "read more",
    "learn more",
    "here",
    "more",
    "this",
    "link",
    "this link",
    "go",
    "website",
];

const TOP_ANCHOR_COUNT: usize = 10;

pub struct AnchorAggregator;

impl AnchorAggregator {
    /// Builds the analysis result for a finished crawl
    pub fn build_result(url: &str, crawls: &[PageCrawl]) -> AnalysisResult {
        let records = Self::collect_records(crawls);
        let anchors = Self::group_by_text(&records);
        let insights = Self::insights(crawls, &anchors);

        AnalysisResult {
            url: url.to_string(),
            anchors,
            insights,
            crawled_pages: crawls.iter().map(|c| c.page.clone()).collect(),
            pages_with_no_links: Self::pages_with_no_links(crawls),
            analyzed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// One record per distinct (text, href) pair across all successful pages
    pub fn collect_records(crawls: &[PageCrawl]) -> Vec<AnchorRecord> {
        let mut by_pair: BTreeMap<(String, String), (usize, BTreeSet<String>)> = BTreeMap::new();

        for crawl in crawls.iter().filter(|c| c.page.is_ok()) {
            for anchor in &crawl.anchors {
                let entry = by_pair
                    .entry((anchor.text.clone(), anchor.href.clone()))
                    .or_default();
                entry.0 += 1;
                entry.1.insert(crawl.page.url.clone());
            }
        }

        by_pair
            .into_iter()
            .map(|((text, href), (count, pages))| AnchorRecord {
                text,
                href,
                count,
                pages: pages.into_iter().collect(),
            })
            .collect()
    }

    /// Merges records by anchor text: counts are summed, pages unioned and
    /// each distinct href keeps its own count in `destinations`.
    ///
    /// The output does not depend on the order of `records`: anchors are
    /// sorted by count (desc) then text, destinations by count (desc) then
    /// href, pages lexicographically.
    pub fn group_by_text(records: &[AnchorRecord]) -> Vec<AnchorData> {
        #[derive(Default)]
        struct Group {
            count: usize,
            pages: BTreeSet<String>,
            destinations: HashMap<String, usize>,
        }

        let mut groups: HashMap<&str, Group> = HashMap::new();
        for record in records {
            let group = groups.entry(record.text.as_str()).or_default();
            group.count += record.count;
            group.pages.extend(record.pages.iter().cloned());
            *group.destinations.entry(record.href.clone()).or_insert(0) += record.count;
        }

        let mut anchors: Vec<AnchorData> = groups
            .into_iter()
            .map(|(text, group)| {
                let mut destinations: Vec<Destination> = group
                    .destinations
                    .into_iter()
                    .map(|(href, count)| Destination { href, count })
                    .collect();
                destinations.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.href.cmp(&b.href)));

                AnchorData {
                    text: text.to_string(),
                    href: destinations
                        .iter()
                        .map(|d| d.href.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    count: group.count,
                    pages: group.pages.into_iter().collect(),
                    destinations,
                }
            })
            .collect();

        anchors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.text.cmp(&b.text)));
        anchors
    }

    pub fn insights(crawls: &[PageCrawl], anchors: &[AnchorData]) -> Insights {
        let ok_pages: Vec<&PageCrawl> = crawls.iter().filter(|c| c.page.is_ok()).collect();
        let all_anchors = ok_pages.iter().flat_map(|c| c.anchors.iter());

        let mut insights = Insights {
            unique_anchor_texts: anchors.len(),
            anchors_with_multiple_destinations: anchors
                .iter()
                .filter(|a| a.destinations.len() > 1)
                .count(),
            pages_crawled: crawls.len(),
            pages_with_errors: crawls.len() - ok_pages.len(),
            top_anchors: anchors
                .iter()
                .take(TOP_ANCHOR_COUNT)
                .map(|a| TopAnchor {
                    text: a.text.clone(),
                    count: a.count,
                })
                .collect(),
            ..Default::default()
        };

        let mut destinations = HashSet::new();
        for anchor in all_anchors {
            insights.total_anchors += 1;
            destinations.insert(anchor.href.as_str());

            if anchor.is_external {
                insights.external_links += 1;
            } else {
                insights.internal_links += 1;
            }
            if anchor.nofollow {
                insights.nofollow_links += 1;
            }
            if anchor.text == NO_TEXT {
                insights.empty_anchors += 1;
            } else if is_generic(&anchor.text) {
                insights.generic_anchors += 1;
            }
        }
        insights.unique_destinations = destinations.len();

        if !ok_pages.is_empty() {
            let average = insights.total_anchors as f64 / ok_pages.len() as f64;
            insights.average_links_per_page = (average * 100.0).round() / 100.0;
        }

        insights
    }

    /// Successfully fetched pages that contained no anchors at all
    pub fn pages_with_no_links(crawls: &[PageCrawl]) -> Vec<String> {
        crawls
            .iter()
            .filter(|c| c.page.is_ok() && c.anchors.is_empty())
            .map(|c| c.page.url.clone())
            .collect()
    }

    /// The `limit` most used anchors weighted against the most used one
    pub fn word_cloud(anchors: &[AnchorData], limit: usize) -> Vec<WordCloudEntry> {
        let Some(max_count) = anchors.iter().map(|a| a.count).max().filter(|m| *m > 0) else {
            return Vec::new();
        };

        anchors
            .iter()
            .filter(|a| a.text != NO_TEXT)
            .take(limit)
            .map(|a| WordCloudEntry {
                text: a.text.clone(),
                count: a.count,
                weight: a.count as f64 / max_count as f64,
            })
            .collect()
    }
}

pub fn is_generic(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    let lowered = lowered.trim_end_matches(['.', '!', '>', '»', '→']).trim();
    GENERIC_ANCHOR_TEXTS.contains(&lowered)
}
