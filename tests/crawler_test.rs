mod server;

use seodesk::anchors::{AnchorAggregator, NO_TEXT};
use seodesk::crawler::{AnchorCrawler, CrawlerConfig};
use server::start_site_server;
use url::Url;

fn test_config() -> CrawlerConfig {
    CrawlerConfig {
        concurrent_requests: 2,
        requests_per_second: None,
        request_timeout_secs: 5,
    }
}

fn urls(base: &str, paths: &[&str]) -> Vec<Url> {
    paths
        .iter()
        .map(|p| Url::parse(&format!("{}{}", base, p)).unwrap())
        .collect()
}

#[tokio::test]
async fn test_crawl_extracts_anchors() {
    let base_url = start_site_server().await;
    let crawler = AnchorCrawler::new(&base_url, test_config()).expect("Failed to create crawler");

    let crawls = crawler.crawl(&urls(&base_url, &["/"])).await;
    assert_eq!(crawls.len(), 1);

    let home = &crawls[0];
    assert!(home.page.is_ok());
    assert_eq!(home.page.status_code, Some(200));
    assert_eq!(home.page.title.as_deref(), Some("Agency Home"));

    // mailto and in-page fragments are not links
    assert_eq!(home.anchors.len(), 3);
    assert_eq!(home.page.link_count, 3);

    let read_more = home.anchors.iter().find(|a| a.text == "Read more").unwrap();
    assert_eq!(read_more.href, format!("{}/blog/first", base_url));
    assert!(!read_more.is_external);

    let partner = home.anchors.iter().find(|a| a.text == "Partner").unwrap();
    assert!(partner.is_external);
    assert!(partner.nofollow);
}

#[tokio::test]
async fn test_image_and_empty_anchor_text() {
    let base_url = start_site_server().await;
    let crawler = AnchorCrawler::new(&base_url, test_config()).unwrap();

    let crawls = crawler.crawl(&urls(&base_url, &["/about"])).await;
    let texts: Vec<_> = crawls[0].anchors.iter().map(|a| a.text.as_str()).collect();

    assert!(texts.contains(&"SEO services"));
    assert!(texts.contains(&"[image] Agency logo"));
    assert!(texts.contains(&NO_TEXT));
}

#[tokio::test]
async fn test_failed_pages_do_not_stop_the_crawl() {
    let base_url = start_site_server().await;
    let crawler = AnchorCrawler::new(&base_url, test_config()).unwrap();

    let mut targets = urls(&base_url, &["/", "/missing", "/about"]);
    // Nothing listens on port 1
    targets.push(Url::parse("http://127.0.0.1:1/").unwrap());

    let crawls = crawler.crawl(&targets).await;
    assert_eq!(crawls.len(), 4, "every URL gets a result");

    // Results come back in input order
    for (crawl, url) in crawls.iter().zip(&targets) {
        assert_eq!(crawl.page.url, url.as_str());
    }

    let missing = &crawls[1].page;
    assert_eq!(missing.status_code, Some(404));
    assert_eq!(missing.error.as_deref(), Some("HTTP 404"));
    assert!(crawls[1].anchors.is_empty());

    let unreachable = &crawls[3].page;
    assert_eq!(unreachable.status_code, None);
    assert!(unreachable.error.is_some());

    assert!(crawls[0].page.is_ok());
    assert!(crawls[2].page.is_ok());

    let result = AnchorAggregator::build_result(&base_url, &crawls);
    assert_eq!(result.insights.pages_crawled, 4);
    assert_eq!(result.insights.pages_with_errors, 2);

    let services = result
        .anchors
        .iter()
        .find(|a| a.text == "SEO services")
        .expect("anchor used on two pages");
    assert_eq!(services.count, 2);
    assert_eq!(services.pages.len(), 2);
    assert_eq!(services.destinations.len(), 1);
}

#[tokio::test]
async fn test_non_html_pages_contribute_no_anchors() {
    let base_url = start_site_server().await;
    let crawler = AnchorCrawler::new(&base_url, test_config()).unwrap();

    let crawls = crawler
        .crawl(&urls(&base_url, &["/notes.txt", "/services"]))
        .await;

    let notes = &crawls[0];
    assert_eq!(notes.page.status_code, Some(200));
    assert!(notes.anchors.is_empty());
    assert_eq!(notes.page.link_count, 0);
    assert!(
        notes
            .page
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Unsupported content type text/plain"))
    );
    assert!(crawls[1].page.is_ok());

    let result = AnchorAggregator::build_result(&base_url, &crawls);
    assert_eq!(result.insights.pages_with_errors, 1);
    assert!(result.anchors.iter().all(|a| a.text != "SEO services"));
}

#[tokio::test]
async fn test_rate_limited_crawl_still_completes() {
    let base_url = start_site_server().await;
    let config = CrawlerConfig {
        requests_per_second: Some(50.0),
        ..test_config()
    };
    let crawler = AnchorCrawler::new(&base_url, config).unwrap();

    let crawls = crawler
        .crawl(&urls(&base_url, &["/", "/about", "/blog/first"]))
        .await;
    assert_eq!(crawls.len(), 3);
    assert!(crawls.iter().all(|c| c.page.is_ok()));
    assert!(crawls[2].anchors.is_empty());
}

#[test]
fn test_rejects_non_http_base_url() {
    assert!(AnchorCrawler::new("ftp://example.com", CrawlerConfig::default()).is_err());
    assert!(AnchorCrawler::new("not a url", CrawlerConfig::default()).is_err());
}
