use rusqlite::Connection;
use tracing::info;

use super::DbError;
use super::authors::{NewAuthor, count_authors, create_author};
use super::categories::{NewCategory, count_categories, create_category};

const DEFAULT_CATEGORIES: [(&str, &str); 4] = [
    ("SEO", "Search engine optimization strategies and news"),
    ("Content Marketing", "Planning, writing and promoting content that ranks"),
    ("Technical SEO", "Crawling, indexing, site speed and structured data"),
    ("Local SEO", "Visibility in local search and maps"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub authors: usize,
    pub categories: usize,
}

fn default_author() -> NewAuthor {
    NewAuthor {
        name: "Editorial Team".to_string(),
        slug: "editorial-team".to_string(),
        bio: Some("Articles written by the agency's editorial team.".to_string()),
        job_title: Some("SEO Specialists".to_string()),
        expertise: vec![
            "Technical SEO".to_string(),
            "Content Strategy".to_string(),
            "Link Building".to_string(),
        ],
        ..Default::default()
    }
}

/// Inserts the default author and categories into empty tables. Tables that
/// already have rows are left alone.
pub fn seed_defaults(conn: &Connection) -> Result<SeedReport, DbError> {
    let mut report = SeedReport::default();

    if count_authors(conn)? == 0 {
        create_author(conn, &default_author())?;
        report.authors = 1;
    }

    if count_categories(conn)? == 0 {
        for (name, description) in DEFAULT_CATEGORIES {
            create_category(conn, &NewCategory::named(name, description))?;
            report.categories += 1;
        }
    }

    if report != SeedReport::default() {
        info!(
            authors = report.authors,
            categories = report.categories,
            "Seeded default content"
        );
    }
    Ok(report)
}
