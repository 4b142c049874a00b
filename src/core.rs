use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    cache::{Cache, QueryCache},
    config::Settings,
    mutation::{RetryPolicy, SubmitFoodRecord},
    query::{FoodDataQuery, FoodList},
    transport::{HttpTransport, Transport},
};

/// Shared collaborators for every mutation and query issued against one backend
#[derive(Clone)]
pub struct FoodClient {
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache<FoodList>>,
    policy: RetryPolicy,
}

impl FoodClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<QueryCache<FoodList>>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            cache,
            policy,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let transport = HttpTransport::new(settings.api_base.clone(), settings.request_timeout)
            .context("Failed to build HTTP client")?;
        let cache = QueryCache::new(settings.cache_capacity, settings.cache_ttl);

        tracing::info!(
            api_base = %transport.base(),
            retries = settings.retry.retries,
            "food client ready"
        );

        Ok(Self::new(
            Arc::new(transport),
            Arc::new(cache),
            settings.retry.clone(),
        ))
    }

    /// A fresh mutation with its own state, sharing this client's transport and cache
    pub fn submit_mutation(&self) -> SubmitFoodRecord {
        let cache: Arc<dyn Cache> = self.cache.clone();
        SubmitFoodRecord::new(self.transport.clone(), cache, self.policy.clone())
    }

    pub fn food_data(&self) -> FoodDataQuery {
        FoodDataQuery::new(self.transport.clone(), self.cache.clone())
    }

    pub fn cache(&self) -> &Arc<QueryCache<FoodList>> {
        &self.cache
    }
}
