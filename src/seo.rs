//! Page metadata: title, description, canonical URL, robots directives,
//! Open Graph and JSON-LD.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::config::SiteSettings;
use crate::db::authors::Author;

pub const MAX_DESCRIPTION_LENGTH: usize = 160;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenGraph {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub site_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub canonical: String,
    pub robots: String,
    pub open_graph: OpenGraph,
    pub json_ld: Value,
}

/// Inputs shared by every page's metadata
pub struct MetadataInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub path: &'a str,
    pub og_type: &'a str,
    pub image: Option<&'a str>,
    pub noindex: bool,
    pub nofollow: bool,
    pub json_ld: Value,
}

pub fn robots_directive(noindex: bool, nofollow: bool) -> String {
    format!(
        "{}, {}",
        if noindex { "noindex" } else { "index" },
        if nofollow { "nofollow" } else { "follow" }
    )
}

/// Strips tags and collapses whitespace, cutting at a word boundary
pub fn plain_description(text: &str, max_len: usize) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                plain.push(' ');
            }
            _ if !in_tag => plain.push(c),
            _ => {}
        }
    }
    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_len {
        return collapsed;
    }

    let cut: String = collapsed.chars().take(max_len.saturating_sub(3)).collect();
    let trimmed = match cut.rfind(' ') {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", trimmed.trim_end_matches([',', '.', ';', ':']))
}

pub fn build_metadata(site: &SiteSettings, input: MetadataInput<'_>) -> PageMetadata {
    let canonical = site.absolute(input.path);
    let description = plain_description(input.description, MAX_DESCRIPTION_LENGTH);
    let title = format!("{} | {}", input.title, site.name);

    PageMetadata {
        open_graph: OpenGraph {
            title: input.title.to_string(),
            description: description.clone(),
            url: canonical.clone(),
            kind: input.og_type.to_string(),
            site_name: site.name.clone(),
            image: input.image.map(|img| absolute_url(site, img)),
        },
        title,
        description,
        canonical,
        robots: robots_directive(input.noindex, input.nofollow),
        json_ld: input.json_ld,
    }
}

fn absolute_url(site: &SiteSettings, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        site.absolute(url)
    }
}

pub fn author_path(slug: &str) -> String {
    format!("/authors/{}", slug)
}

pub fn blog_path(slug: &str) -> String {
    format!("/blog/{}", slug)
}

pub fn category_path(slug: &str) -> String {
    format!("/blog/category/{}", slug)
}

/// The author's `custom_schema` when it parses as JSON, otherwise a
/// generated `Person`
pub fn person_schema(site: &SiteSettings, author: &Author) -> Value {
    if let Some(raw) = author.custom_schema.as_deref().filter(|s| !s.trim().is_empty()) {
        match serde_json::from_str::<Value>(raw) {
            Ok(schema) => return schema,
            Err(e) => {
                warn!(author = %author.slug, error = %e, "Ignoring invalid custom schema");
            }
        }
    }

    let mut person = json!({
        "@context": "https://schema.org",
        "@type": "Person",
        "name": author.name,
        "url": site.absolute(&author_path(&author.slug)),
    });

    if let Some(job_title) = &author.job_title {
        person["jobTitle"] = json!(job_title);
    }
    if let Some(bio) = &author.bio {
        person["description"] = json!(plain_description(bio, MAX_DESCRIPTION_LENGTH));
    }
    if let Some(avatar) = &author.avatar {
        person["image"] = json!(absolute_url(site, avatar));
    }
    if let Some(location) = &author.location {
        person["address"] = json!({ "@type": "PostalAddress", "addressLocality": location });
    }
    if !author.expertise.is_empty() {
        person["knowsAbout"] = json!(author.expertise);
    }
    let same_as = author.profile_links();
    if !same_as.is_empty() {
        person["sameAs"] = json!(same_as);
    }
    person["worksFor"] = json!({
        "@type": "Organization",
        "name": site.name,
        "url": site.url,
    });

    person
}

pub struct PostingInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub path: &'a str,
    pub image: Option<&'a str>,
    pub author_name: Option<&'a str>,
    pub author_slug: Option<&'a str>,
    pub published_at: Option<&'a str>,
    pub modified_at: Option<&'a str>,
    pub keywords: &'a [String],
}

pub fn blog_posting_schema(site: &SiteSettings, post: &PostingInput<'_>) -> Value {
    let url = site.absolute(post.path);
    let mut posting = json!({
        "@context": "https://schema.org",
        "@type": "BlogPosting",
        "headline": post.title,
        "description": plain_description(post.description, MAX_DESCRIPTION_LENGTH),
        "url": url,
        "mainEntityOfPage": { "@type": "WebPage", "@id": url },
        "publisher": {
            "@type": "Organization",
            "name": site.name,
            "url": site.url,
        },
    });

    if let Some(image) = post.image {
        posting["image"] = json!(absolute_url(site, image));
    }
    if let Some(name) = post.author_name {
        let mut author = json!({ "@type": "Person", "name": name });
        if let Some(slug) = post.author_slug {
            author["url"] = json!(site.absolute(&author_path(slug)));
        }
        posting["author"] = author;
    }
    if let Some(published) = post.published_at {
        posting["datePublished"] = json!(published);
    }
    if let Some(modified) = post.modified_at.or(post.published_at) {
        posting["dateModified"] = json!(modified);
    }
    if !post.keywords.is_empty() {
        posting["keywords"] = json!(post.keywords.join(", "));
    }

    posting
}

pub fn collection_schema(site: &SiteSettings, name: &str, path: &str, description: &str) -> Value {
    json!({
        "@context": "https://schema.org",
        "@type": "CollectionPage",
        "name": name,
        "description": plain_description(description, MAX_DESCRIPTION_LENGTH),
        "url": site.absolute(path),
        "isPartOf": { "@type": "WebSite", "name": site.name, "url": site.url },
    })
}
