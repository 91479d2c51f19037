//! Storyblok headless CMS client.
//!
//! Stories are decoded into typed content at this boundary; a story whose
//! `component` is not one the site renders becomes [`StoryContent::Unknown`].

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::StoryblokSettings;
use crate::http_client::build_api_client;

pub const STORIES_PER_PAGE: usize = 100;
const CMS_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("CMS request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("CMS returned HTTP {0}")]
    Status(u16),

    #[error("Failed to build CMS client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPostContent {
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Rendered HTML or Storyblok rich text
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default)]
    pub featured_image: Option<Asset>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorContent {
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<Asset>,
    #[serde(default)]
    pub job_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "component", rename_all = "snake_case")]
pub enum StoryContent {
    BlogPost(BlogPostContent),
    Author(AuthorContent),
    Page(PageContent),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    #[serde(default)]
    pub uuid: Option<String>,
    pub name: String,
    pub slug: String,
    pub full_slug: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub first_published_at: Option<String>,
    #[serde(default)]
    pub tag_list: Vec<String>,
    pub content: StoryContent,
}

#[derive(Deserialize)]
struct StoryResponse {
    story: Story,
}

#[derive(Deserialize)]
struct StoriesResponse {
    stories: Vec<Story>,
}

/// Anything that can fetch a single story by its full slug
pub trait StoryFetcher {
    fn fetch_story(
        &self,
        slug: &str,
    ) -> impl Future<Output = Result<Option<Story>, CmsError>> + Send;
}

#[derive(Debug, Clone)]
pub struct StoryblokClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
    version: String,
}

impl StoryblokClient {
    pub fn new(api_base: &str, token: &str, version: &str) -> Result<Self, CmsError> {
        Ok(Self {
            client: build_api_client(CMS_TIMEOUT_SECS).map_err(|e| CmsError::Client(e.to_string()))?,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            version: version.to_string(),
        })
    }

    /// `None` when no token is configured
    pub fn from_settings(settings: &StoryblokSettings) -> Result<Option<Self>, CmsError> {
        match settings.token.as_deref() {
            Some(token) => Self::new(&settings.api_base, token, &settings.version).map(Some),
            None => {
                debug!("STORYBLOK_TOKEN not set, CMS disabled");
                Ok(None)
            }
        }
    }

    /// A 404 from the CMS is `Ok(None)`
    pub async fn get_story(&self, slug: &str) -> Result<Option<Story>, CmsError> {
        let url = format!("{}/cdn/stories/{}", self.api_base, slug.trim_start_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str()), ("version", self.version.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CmsError::Status(status.as_u16()));
        }

        Ok(Some(response.json::<StoryResponse>().await?.story))
    }

    /// Every story of one content type, fetched page by page until a short
    /// page comes back
    pub async fn get_all_stories(&self, content_type: &str) -> Result<Vec<Story>, CmsError> {
        let url = format!("{}/cdn/stories", self.api_base);
        let per_page = STORIES_PER_PAGE.to_string();
        let mut stories = Vec::new();
        let mut page = 1usize;

        loop {
            let page_param = page.to_string();
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("token", self.token.as_str()),
                    ("version", self.version.as_str()),
                    ("content_type", content_type),
                    ("per_page", per_page.as_str()),
                    ("page", page_param.as_str()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(CmsError::Status(response.status().as_u16()));
            }

            let batch = response.json::<StoriesResponse>().await?.stories;
            let fetched = batch.len();
            stories.extend(batch);

            if fetched < STORIES_PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(content_type, count = stories.len(), "Fetched stories");
        Ok(stories)
    }
}

impl StoryFetcher for StoryblokClient {
    async fn fetch_story(&self, slug: &str) -> Result<Option<Story>, CmsError> {
        self.get_story(slug).await
    }
}

/// Full slugs to try for a blog URL slug, in order
pub fn slug_candidates(slug: &str) -> Vec<String> {
    let slug = slug.trim_matches('/');
    let mut candidates = vec![
        format!("blog/{}", slug),
        slug.to_string(),
        format!("blog/{}/", slug),
    ];
    candidates.dedup();
    candidates
}

/// Tries each candidate slug and returns the first story found. Failed
/// lookups are logged and the next candidate is tried.
pub async fn resolve_story<F: StoryFetcher>(fetcher: &F, slug: &str) -> Option<Story> {
    for candidate in slug_candidates(slug) {
        match fetcher.fetch_story(&candidate).await {
            Ok(Some(story)) => {
                debug!(slug, candidate = %candidate, "Resolved CMS story");
                return Some(story);
            }
            Ok(None) => continue,
            Err(e) => {
                warn!(candidate = %candidate, error = %e, "CMS lookup failed");
                continue;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingFetcher {
        found_at: &'static str,
        failing: &'static [&'static str],
        calls: Mutex<Vec<String>>,
    }

    impl RecordingFetcher {
        fn new(found_at: &'static str) -> Self {
            Self {
                found_at,
                failing: &[],
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn story(full_slug: &str) -> Story {
        serde_json::from_value(json!({
            "id": 1,
            "name": "Foo",
            "slug": "foo",
            "full_slug": full_slug,
            "content": { "component": "blog_post", "title": "Foo" }
        }))
        .unwrap()
    }

    impl StoryFetcher for RecordingFetcher {
        async fn fetch_story(&self, slug: &str) -> Result<Option<Story>, CmsError> {
            self.calls.lock().unwrap().push(slug.to_string());
            if self.failing.contains(&slug) {
                return Err(CmsError::Status(500));
            }
            Ok((slug == self.found_at).then(|| story(slug)))
        }
    }

    #[test]
    fn test_slug_candidates() {
        assert_eq!(slug_candidates("foo"), vec!["blog/foo", "foo", "blog/foo/"]);
        assert_eq!(slug_candidates("/foo/"), vec!["blog/foo", "foo", "blog/foo/"]);
    }

    #[tokio::test]
    async fn test_resolve_stops_at_first_hit() {
        let fetcher = RecordingFetcher::new("foo");
        let found = resolve_story(&fetcher, "foo").await.unwrap();
        assert_eq!(found.full_slug, "foo");
        assert_eq!(fetcher.calls(), vec!["blog/foo", "foo"]);
    }

    #[tokio::test]
    async fn test_resolve_skips_errors() {
        let fetcher = RecordingFetcher {
            found_at: "blog/foo/",
            failing: &["blog/foo"],
            calls: Mutex::new(Vec::new()),
        };
        assert!(resolve_story(&fetcher, "foo").await.is_some());
        assert_eq!(fetcher.calls().len(), 3);

        let nothing = RecordingFetcher::new("elsewhere");
        assert!(resolve_story(&nothing, "foo").await.is_none());
    }

    #[test]
    fn test_story_content_is_typed() {
        let post = story("blog/foo");
        assert!(matches!(post.content, StoryContent::BlogPost(ref c) if c.title == "Foo"));

        let unknown: Story = serde_json::from_value(json!({
            "id": 2,
            "name": "Hero",
            "slug": "hero",
            "full_slug": "hero",
            "content": { "component": "hero_banner", "headline": "Hi" }
        }))
        .unwrap();
        assert_eq!(unknown.content, StoryContent::Unknown);

        let author: Story = serde_json::from_value(json!({
            "id": 3,
            "name": "Jane",
            "slug": "jane",
            "full_slug": "authors/jane",
            "content": {
                "component": "author",
                "name": "Jane",
                "avatar": { "filename": "https://a.storyblok.com/jane.png", "alt": "Jane" }
            }
        }))
        .unwrap();
        match author.content {
            StoryContent::Author(content) => {
                assert_eq!(content.avatar.unwrap().alt.as_deref(), Some("Jane"));
            }
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_blog_post_without_title_is_rejected() {
        let result: Result<Story, _> = serde_json::from_value(json!({
            "id": 4,
            "name": "Broken",
            "slug": "broken",
            "full_slug": "blog/broken",
            "content": { "component": "blog_post" }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_client_requires_token() {
        let settings = StoryblokSettings {
            api_base: "https://api.storyblok.com/v2/".to_string(),
            version: "published".to_string(),
            token: None,
        };
        assert!(StoryblokClient::from_settings(&settings).unwrap().is_none());

        let with_token = StoryblokSettings {
            token: Some("abc".to_string()),
            ..settings
        };
        let client = StoryblokClient::from_settings(&with_token).unwrap().unwrap();
        assert_eq!(client.api_base, "https://api.storyblok.com/v2");
    }
}
