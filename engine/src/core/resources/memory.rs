//! In-memory resource fetcher
//!
//! Serves resources from a map. Used when embedding lesson content directly
//! and by tests, which inspect the request log to assert what was fetched.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::ResourceFetcher;
use crate::core::{CoreError, CoreResult};

/// Fetcher backed by a `url -> content` map
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    resources: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every response, for exercising timeouts
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, url: &str, content: &str) {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), content.to_string());
    }

    pub fn remove(&self, url: &str) {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url);
    }

    /// Every URL requested so far, fetches and probes alike
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_requests(&self) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, url: &str) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }

    fn lookup(&self, url: &str) -> Option<String> {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ResourceFetcher for MemoryFetcher {
    async fn fetch_text(&self, url: &str) -> CoreResult<String> {
        self.record(url);
        self.simulate_latency().await;
        self.lookup(url)
            .ok_or_else(|| CoreError::unavailable(url, "not found"))
    }

    async fn exists(&self, url: &str) -> bool {
        self.record(url);
        self.simulate_latency().await;
        self.lookup(url).is_some()
    }
}
