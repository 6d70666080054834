//! Property display metadata with a scoped in-process cache.
//!
//! Details change rarely but get read on every dashboard load, so they sit
//! in an injected in-memory cache rather than a module-level map. The cache
//! instance owns its lifecycle; `clear` exists for tests.

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenProvider;
use crate::report::client::{ReportResult, ReportingClient};
use crate::report::query::PropertyId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub property: PropertyId,
    pub display_name: String,
    pub time_zone: Option<String>,
    pub currency_code: Option<String>,
}

pub struct PropertyCache {
    client: Arc<dyn ReportingClient>,
    tokens: Arc<dyn TokenProvider>,
    cache: Cache<PropertyId, PropertyDetails>,
}

impl PropertyCache {
    pub fn new(
        client: Arc<dyn ReportingClient>,
        tokens: Arc<dyn TokenProvider>,
        max_entries: u64,
        ttl: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self {
            client,
            tokens,
            cache,
        }
    }

    /// Cached lookup; fetches from the upstream admin endpoint on a miss.
    /// Fetch failures are not cached.
    pub async fn get(&self, property: &PropertyId) -> anyhow::Result<PropertyDetails> {
        if let Some(details) = self.cache.get(property).await {
            return Ok(details);
        }

        let token = self.tokens.bearer_token().await?;
        let details = self.fetch(property, &token).await?;
        self.cache.insert(property.clone(), details.clone()).await;
        Ok(details)
    }

    async fn fetch(
        &self,
        property: &PropertyId,
        token: &crate::auth::BearerToken,
    ) -> ReportResult<PropertyDetails> {
        self.client.fetch_property_details(property, token).await
    }

    /// Drop all cached entries.
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        // run_pending_tasks makes the invalidation visible to immediate reads
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{BearerToken, StaticTokenProvider};
    use crate::report::client::ReportError;
    use crate::report::query::ReportQuery;
    use crate::report::rows::ReportRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAdmin {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ReportingClient for CountingAdmin {
        async fn fetch_report(
            &self,
            _query: &ReportQuery,
            _token: &BearerToken,
        ) -> ReportResult<Vec<ReportRow>> {
            Err(ReportError::Upstream {
                status: reqwest::StatusCode::NOT_FOUND,
                body: "not stubbed".to_string(),
            })
        }

        async fn fetch_realtime_report(
            &self,
            _query: &ReportQuery,
            _token: &BearerToken,
        ) -> ReportResult<Vec<ReportRow>> {
            Ok(Vec::new())
        }

        async fn fetch_property_details(
            &self,
            property: &PropertyId,
            _token: &BearerToken,
        ) -> ReportResult<PropertyDetails> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(PropertyDetails {
                property: property.clone(),
                display_name: "Acme".to_string(),
                time_zone: Some("UTC".to_string()),
                currency_code: None,
            })
        }
    }

    fn cache_with(client: Arc<CountingAdmin>) -> PropertyCache {
        let tokens = Arc::new(StaticTokenProvider::new(BearerToken::new("t").unwrap()));
        PropertyCache::new(client, tokens, 100, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn details_fetch_once_until_cleared() {
        let client = Arc::new(CountingAdmin {
            fetches: AtomicUsize::new(0),
        });
        let cache = cache_with(Arc::clone(&client));
        let property = PropertyId::new("123").unwrap();

        let details = cache.get(&property).await.unwrap();
        assert_eq!(details.display_name, "Acme");
        assert_eq!(client.fetches.load(Ordering::SeqCst), 1);

        cache.get(&property).await.unwrap();
        assert_eq!(client.fetches.load(Ordering::SeqCst), 1);

        cache.clear().await;
        cache.get(&property).await.unwrap();
        assert_eq!(client.fetches.load(Ordering::SeqCst), 2);
    }
}
