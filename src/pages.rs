//! Data for the public author, blog and category pages.
//!
//! Each assembler returns `None` when the page does not exist. Storage
//! failures are logged and treated the same way, so a broken query renders
//! a 404 instead of an error page.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::cms::{BlogPostContent, StoryContent, StoryFetcher, resolve_story};
use crate::config::SiteSettings;
use crate::db::articles::{Article, ArticleFilter, get_published_article_by_slug, list_published_articles};
use crate::db::authors::{Author, get_author_by_id, get_author_by_slug, list_authors};
use crate::db::categories::{Category, get_category_by_id, get_category_by_slug, list_categories};
use crate::db::{Database, DbError};
use crate::seo::{
    self, MetadataInput, PageMetadata, PostingInput, author_path, blog_path, category_path,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub title: String,
    pub slug: String,
    pub url: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub featured_image_alt: Option<String>,
    pub published_at: Option<String>,
    pub author: Option<AuthorRef>,
    pub category: Option<CategoryRef>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorPage {
    pub author: Author,
    pub articles: Vec<ArticleSummary>,
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogIndex {
    pub articles: Vec<ArticleSummary>,
    pub categories: Vec<CategoryRef>,
    pub active_category: Option<CategoryRef>,
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPage {
    pub category: Category,
    pub articles: Vec<ArticleSummary>,
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSource {
    Cms,
    Database,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostPage {
    pub source: PostSource,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    /// HTML for local articles; HTML or rich text JSON for CMS stories
    pub content: Value,
    pub featured_image: Option<String>,
    pub featured_image_alt: Option<String>,
    pub author: Option<AuthorRef>,
    pub category: Option<CategoryRef>,
    pub tags: Vec<String>,
    pub published_at: Option<String>,
    pub view_count: Option<i64>,
    pub metadata: PageMetadata,
}

/// Logs a storage failure and turns it into `None`
fn logged<T>(result: Result<Option<T>, DbError>, what: &str) -> Option<T> {
    result.unwrap_or_else(|e| {
        error!(error = %e, "Failed to load {}", what);
        None
    })
}

fn author_ref(author: &Author) -> AuthorRef {
    AuthorRef {
        name: author.name.clone(),
        slug: author.slug.clone(),
    }
}

fn category_ref(category: &Category) -> CategoryRef {
    CategoryRef {
        name: category.name.clone(),
        slug: category.slug.clone(),
    }
}

/// Published articles as summaries, with author and category names joined in
fn summaries(db: &Database, filter: &ArticleFilter) -> Vec<ArticleSummary> {
    let loaded = db.with_conn(|conn| {
        let articles = list_published_articles(conn, filter)?;
        let authors: HashMap<i64, AuthorRef> = list_authors(conn)?
            .iter()
            .map(|a| (a.id, author_ref(a)))
            .collect();
        let categories: HashMap<i64, CategoryRef> = list_categories(conn)?
            .iter()
            .map(|c| (c.id, category_ref(c)))
            .collect();
        Ok((articles, authors, categories))
    });

    let (articles, authors, categories) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            error!(error = %e, "Failed to load articles");
            return Vec::new();
        }
    };

    articles
        .into_iter()
        .map(|article| ArticleSummary {
            url: blog_path(&article.slug),
            author: authors.get(&article.author_id).cloned(),
            category: article.category_id.and_then(|id| categories.get(&id).cloned()),
            title: article.title,
            slug: article.slug,
            excerpt: article.excerpt,
            featured_image: article.featured_image,
            featured_image_alt: article.featured_image_alt,
            published_at: article.published_at,
            tags: article.tags,
        })
        .collect()
}

pub fn author_page(db: &Database, site: &SiteSettings, slug: &str) -> Option<AuthorPage> {
    let author = logged(db.with_conn(|conn| get_author_by_slug(conn, slug)), "author")?;

    let articles = summaries(
        db,
        &ArticleFilter {
            author_id: Some(author.id),
            ..Default::default()
        },
    );

    let title = author.meta_title.as_deref().unwrap_or(&author.name);
    let description = author
        .meta_description
        .as_deref()
        .or(author.bio.as_deref())
        .unwrap_or_default();

    let metadata = seo::build_metadata(
        site,
        MetadataInput {
            title,
            description,
            path: &author_path(&author.slug),
            og_type: "profile",
            image: author.avatar.as_deref(),
            noindex: author.noindex,
            nofollow: author.nofollow,
            json_ld: seo::person_schema(site, &author),
        },
    );

    Some(AuthorPage {
        author,
        articles,
        metadata,
    })
}

/// The blog listing, optionally narrowed to one category. `None` only when
/// the category does not exist.
pub fn blog_index(db: &Database, site: &SiteSettings, category_slug: Option<&str>) -> Option<BlogIndex> {
    let active = match category_slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => Some(logged(
            db.with_conn(|conn| get_category_by_slug(conn, slug)),
            "category",
        )?),
        None => None,
    };

    let articles = summaries(
        db,
        &ArticleFilter {
            category_id: active.as_ref().map(|c| c.id),
            ..Default::default()
        },
    );

    let categories = db
        .with_conn(list_categories)
        .map(|all| all.iter().map(category_ref).collect())
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to load categories");
            Vec::new()
        });

    let (title, path) = match &active {
        Some(category) => (format!("{} Articles", category.name), category_path(&category.slug)),
        None => ("Blog".to_string(), "/blog".to_string()),
    };
    let description = active
        .as_ref()
        .and_then(|c| c.description.clone())
        .unwrap_or_else(|| format!("Articles and guides from {}", site.name));

    let metadata = seo::build_metadata(
        site,
        MetadataInput {
            title: &title,
            description: &description,
            path: &path,
            og_type: "website",
            image: None,
            noindex: active.as_ref().is_some_and(|c| c.noindex),
            nofollow: active.as_ref().is_some_and(|c| c.nofollow),
            json_ld: seo::collection_schema(site, &title, &path, &description),
        },
    );

    Some(BlogIndex {
        articles,
        categories,
        active_category: active.as_ref().map(category_ref),
        metadata,
    })
}

pub fn category_page(db: &Database, site: &SiteSettings, slug: &str) -> Option<CategoryPage> {
    let category = logged(db.with_conn(|conn| get_category_by_slug(conn, slug)), "category")?;

    let articles = summaries(
        db,
        &ArticleFilter {
            category_id: Some(category.id),
            ..Default::default()
        },
    );

    let title = category.meta_title.as_deref().unwrap_or(&category.name);
    let description = category
        .meta_description
        .as_deref()
        .or(category.description.as_deref())
        .unwrap_or_default();
    let path = category_path(&category.slug);

    let metadata = seo::build_metadata(
        site,
        MetadataInput {
            title,
            description,
            path: &path,
            og_type: "website",
            image: None,
            noindex: category.noindex,
            nofollow: category.nofollow,
            json_ld: seo::collection_schema(site, &category.name, &path, description),
        },
    );

    Some(CategoryPage {
        category,
        articles,
        metadata,
    })
}

/// A blog post from the CMS when one resolves, otherwise from the local
/// article table
pub async fn blog_post_page<F: StoryFetcher>(
    cms: Option<&F>,
    db: &Database,
    site: &SiteSettings,
    slug: &str,
) -> Option<BlogPostPage> {
    if let Some(fetcher) = cms
        && let Some(story) = resolve_story(fetcher, slug).await
    {
        match story.content {
            StoryContent::BlogPost(content) => {
                let published_at = story.first_published_at.or(story.published_at);
                return Some(cms_post(db, site, slug, content, published_at, story.tag_list));
            }
            _ => {
                tracing::debug!(slug, full_slug = %story.full_slug, "CMS story is not a blog post");
            }
        }
    }

    let article = logged(
        db.with_conn(|conn| get_published_article_by_slug(conn, slug)),
        "article",
    )?;
    Some(local_post(db, site, article))
}

fn cms_post(
    db: &Database,
    site: &SiteSettings,
    slug: &str,
    content: BlogPostContent,
    published_at: Option<String>,
    tags: Vec<String>,
) -> BlogPostPage {
    let author = content.author.as_deref().and_then(|author_slug| {
        logged(db.with_conn(|conn| get_author_by_slug(conn, author_slug)), "author")
    });
    let category = content.category.as_deref().and_then(|category_slug| {
        logged(db.with_conn(|conn| get_category_by_slug(conn, category_slug)), "category")
    });

    let image = content
        .featured_image
        .as_ref()
        .map(|asset| asset.filename.clone())
        .filter(|f| !f.is_empty());
    let image_alt = content.featured_image.as_ref().and_then(|asset| asset.alt.clone());

    let path = blog_path(slug);
    let title = content.meta_title.as_deref().unwrap_or(&content.title);
    let description = content
        .meta_description
        .as_deref()
        .or(content.excerpt.as_deref())
        .unwrap_or_default();

    let json_ld = seo::blog_posting_schema(
        site,
        &PostingInput {
            title: &content.title,
            description,
            path: &path,
            image: image.as_deref(),
            author_name: author.as_ref().map(|a| a.name.as_str()),
            author_slug: author.as_ref().map(|a| a.slug.as_str()),
            published_at: published_at.as_deref(),
            modified_at: None,
            keywords: &tags,
        },
    );
    let metadata = seo::build_metadata(
        site,
        MetadataInput {
            title,
            description,
            path: &path,
            og_type: "article",
            image: image.as_deref(),
            noindex: false,
            nofollow: false,
            json_ld,
        },
    );

    BlogPostPage {
        source: PostSource::Cms,
        title: content.title,
        slug: slug.to_string(),
        excerpt: content.excerpt,
        content: content.body,
        featured_image: image,
        featured_image_alt: image_alt,
        author: author.as_ref().map(author_ref),
        category: category.as_ref().map(category_ref),
        tags,
        published_at,
        view_count: None,
        metadata,
    }
}

fn local_post(db: &Database, site: &SiteSettings, article: Article) -> BlogPostPage {
    let author = logged(
        db.with_conn(|conn| get_author_by_id(conn, article.author_id)),
        "author",
    );
    let category = article
        .category_id
        .and_then(|id| logged(db.with_conn(|conn| get_category_by_id(conn, id)), "category"));

    let path = blog_path(&article.slug);
    let title = article.meta_title.as_deref().unwrap_or(&article.title);
    let description = article
        .meta_description
        .as_deref()
        .or(article.excerpt.as_deref())
        .or(article.content.as_deref())
        .unwrap_or_default();

    let json_ld = seo::blog_posting_schema(
        site,
        &PostingInput {
            title: &article.title,
            description,
            path: &path,
            image: article.featured_image.as_deref(),
            author_name: author.as_ref().map(|a| a.name.as_str()),
            author_slug: author.as_ref().map(|a| a.slug.as_str()),
            published_at: article.published_at.as_deref(),
            modified_at: Some(article.updated_at.as_str()),
            keywords: &article.tags,
        },
    );
    let metadata = seo::build_metadata(
        site,
        MetadataInput {
            title,
            description,
            path: &path,
            og_type: "article",
            image: article.featured_image.as_deref(),
            noindex: false,
            nofollow: false,
            json_ld,
        },
    );

    BlogPostPage {
        source: PostSource::Database,
        content: Value::String(article.content.unwrap_or_default()),
        title: article.title,
        slug: article.slug,
        excerpt: article.excerpt,
        featured_image: article.featured_image,
        featured_image_alt: article.featured_image_alt,
        author: author.as_ref().map(author_ref),
        category: category.as_ref().map(category_ref),
        tags: article.tags,
        published_at: article.published_at,
        view_count: Some(article.view_count),
        metadata,
    }
}
