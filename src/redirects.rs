//! JSON snapshot of the redirection table.
//!
//! The server answers unknown paths from this file instead of querying the
//! database on every request. It is rewritten after each admin change and
//! by the `rebuild-redirects` command.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::db::redirections::{list_redirections, normalize_path};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectTarget {
    pub to: String,
    pub status_code: u16,
}

pub type RedirectMap = BTreeMap<String, RedirectTarget>;

#[derive(Debug, Clone)]
pub struct RedirectionCache {
    path: PathBuf,
}

impl RedirectionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the cache from the database. The file is written next to
    /// the target and renamed over it, so readers never see a partial file.
    pub fn update(&self, db: &Database) -> Result<usize> {
        let redirections = db
            .with_conn(list_redirections)
            .context("Failed to read redirections")?;

        let map: RedirectMap = redirections
            .into_iter()
            .map(|r| {
                (
                    r.from_path,
                    RedirectTarget {
                        to: r.to_path,
                        status_code: r.status_code,
                    },
                )
            })
            .collect();

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(&map)?)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        info!(path = %self.path.display(), count = map.len(), "Updated redirection cache");
        Ok(map.len())
    }

    /// Reads the cache. A missing or unreadable file is an empty map.
    pub fn load(&self) -> RedirectMap {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No redirection cache");
                return RedirectMap::new();
            }
        };

        serde_json::from_slice(&contents).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Ignoring corrupt redirection cache");
            RedirectMap::new()
        })
    }

    pub fn lookup(&self, path: &str) -> Option<RedirectTarget> {
        lookup(&self.load(), path)
    }
}

/// Finds the redirect for a request path, with or without a trailing slash
pub fn lookup(map: &RedirectMap, path: &str) -> Option<RedirectTarget> {
    map.get(&normalize_path(path))
        .or_else(|| map.get(path))
        .cloned()
}
