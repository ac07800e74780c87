//! Upstream HTTP plumbing
//!
//! Every provider call goes through [`HttpFetch`]. [`CachedFetcher`] wraps any
//! fetcher with the HTTP cache tier, keyed by the canonical request URL so two
//! spellings of the same query share one entry.

use crate::error::{FantasyError, FantasyResult};
use async_trait::async_trait;
use cache_layer::{CacheStats, Clock, MemoCache};
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Opaque per-request credential headers.
///
/// Header values never reach logs or cache keys.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    headers: BTreeMap<String, String>,
}

impl CredentialBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Header `name` read from environment variable `var`, when set and non-empty.
    pub fn from_env(name: &str, var: &str) -> Self {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Self::new().with_header(name, value.trim()),
            _ => Self::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A GET request against a provider.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub credentials: CredentialBundle,
    /// Identifier used in `missing` manifests and error messages
    pub source_id: String,
}

impl HttpRequest {
    pub fn new(url: Url, source_id: impl Into<String>) -> Self {
        Self { url, credentials: CredentialBundle::new(), source_id: source_id.into() }
    }

    /// Parse `url`, surfacing malformed templates as internal errors.
    pub fn parse(url: &str, source_id: impl Into<String>) -> FantasyResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| FantasyError::Internal(format!("invalid provider url '{url}': {e}")))?;
        Ok(Self::new(url, source_id))
    }

    pub fn with_credentials(mut self, credentials: CredentialBundle) -> Self {
        self.credentials = credentials;
        self
    }

    /// Canonical URL: query pairs sorted, fragment dropped.
    pub fn cache_key(&self) -> String {
        let mut canonical = self.url.clone();
        canonical.set_fragment(None);

        let mut pairs: Vec<(String, String)> =
            self.url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        if pairs.is_empty() {
            canonical.set_query(None);
        } else {
            pairs.sort();
            canonical.query_pairs_mut().clear().extend_pairs(pairs);
        }

        canonical.to_string()
    }
}

/// Fetches a JSON document from an upstream provider.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get_json(&self, request: &HttpRequest) -> FantasyResult<Value>;
}

/// Default fetcher backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> FantasyResult<Self> {
        let client = Client::builder().timeout(timeout).user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get_json(&self, request: &HttpRequest) -> FantasyResult<Value> {
        debug!("Fetching {} from: {}", request.source_id, request.url);

        let mut builder = self.client.get(request.url.clone());
        for (name, value) in request.credentials.iter() {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FantasyError::upstream(&request.source_id, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FantasyError::upstream(
                &request.source_id,
                format!("request failed with status: {status}"),
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| {
                FantasyError::upstream(&request.source_id, format!("unparseable body: {e}"))
            })
    }
}

/// HTTP cache tier: memoizes successful bodies by canonical URL.
///
/// Credentials are not part of the key; every caller of a given URL is
/// expected to be entitled to the same body.
pub struct CachedFetcher {
    inner: Arc<dyn HttpFetch>,
    cache: MemoCache<String, Value>,
    ttl: Duration,
}

impl CachedFetcher {
    pub fn new(
        inner: Arc<dyn HttpFetch>,
        ttl: Duration,
        capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!("HTTP cache tier: ttl {:?}, capacity {}", ttl, capacity);
        Self { inner, cache: MemoCache::bounded(capacity, clock), ttl }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl HttpFetch for CachedFetcher {
    async fn get_json(&self, request: &HttpRequest) -> FantasyResult<Value> {
        let inner = &self.inner;
        self.cache
            .remember(request.cache_key(), self.ttl, move || async move {
                inner.get_json(request).await
            })
            .await
    }
}
