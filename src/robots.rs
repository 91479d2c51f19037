use anyhow::Result;
use url::Url;

/// Sitemaps declared in a site's robots.txt
#[derive(Debug, Default)]
pub struct RobotsTxt {
    pub sitemaps: Vec<Url>,
}

impl RobotsTxt {
    /// Fetches robots.txt for the site of `base_url`. A missing or
    /// unreachable file is treated as empty.
    pub async fn fetch(client: &reqwest::Client, base_url: &Url) -> Result<Self> {
        let robots_url = Self::robots_url(base_url);

        let response = match client.get(robots_url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::info!(url = %robots_url, error = %e, "robots.txt unreachable");
                return Ok(Self::default());
            }
        };

        if !response.status().is_success() {
            tracing::info!(
                url = %robots_url,
                status = %response.status(),
                "robots.txt not found"
            );
            return Ok(Self::default());
        }

        let content = response.text().await?;
        Ok(Self::parse(&content, base_url))
    }

    /// Collects `Sitemap:` directives. Relative locations are resolved
    /// against the site root; duplicates are dropped.
    pub fn parse(content: &str, base_url: &Url) -> Self {
        let mut sitemaps: Vec<Url> = Vec::new();

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();

            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            if !field.trim().eq_ignore_ascii_case("sitemap") {
                continue;
            }

            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            if let Ok(url) = base_url.join(value)
                && !sitemaps.contains(&url)
            {
                sitemaps.push(url);
            }
        }

        Self { sitemaps }
    }

    pub fn robots_url(base_url: &Url) -> Url {
        let mut url = base_url.clone();
        url.set_path("/robots.txt");
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}
