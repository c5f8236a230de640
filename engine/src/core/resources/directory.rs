//! Local directory resource fetcher
//!
//! Serves a lesson tree laid out exactly like the published site
//! (`subtitles/`, `audios/`, `psalm-config.json`) from disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::ResourceFetcher;
use crate::core::fs::resolve_resource_path;
use crate::core::{CoreError, CoreResult};

/// Fetcher rooted at a local directory
#[derive(Clone, Debug)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> CoreResult<PathBuf> {
        resolve_resource_path(&self.root, url).map_err(|reason| CoreError::unavailable(url, reason))
    }
}

#[async_trait]
impl ResourceFetcher for DirectoryFetcher {
    async fn fetch_text(&self, url: &str) -> CoreResult<String> {
        let path = self.resolve(url)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CoreError::unavailable(url, e.to_string()))
    }

    async fn exists(&self, url: &str) -> bool {
        let Ok(path) = self.resolve(url) else {
            return false;
        };
        tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}
