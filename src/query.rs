use std::sync::Arc;

use thiserror::Error;

use crate::{
    cache::{Cache, QueryCache},
    domain::FoodRecord,
    mutation::{FOOD_DATA_KEY, FOOD_PATH},
    transport::{Transport, TransportError},
};

pub type FoodList = Arc<Vec<FoodRecord>>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("could not decode food data: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Read side of the `food-data` collection
pub struct FoodDataQuery {
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache<FoodList>>,
}

impl FoodDataQuery {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<QueryCache<FoodList>>) -> Self {
        Self { transport, cache }
    }

    /// Cached list if it is still fresh, otherwise `GET <base>/food`
    #[tracing::instrument(name = "query::food_data", skip(self))]
    pub async fn fetch(&self) -> Result<FoodList, Arc<QueryError>> {
        self.cache.get_or_fetch(FOOD_DATA_KEY, || self.load()).await
    }

    pub async fn refetch(&self) -> Result<FoodList, Arc<QueryError>> {
        if let Err(e) = self.cache.invalidate(FOOD_DATA_KEY).await {
            tracing::warn!(error = %e, key = FOOD_DATA_KEY, "failed to invalidate query");
        }
        self.fetch().await
    }

    async fn load(&self) -> Result<FoodList, QueryError> {
        let response = self.transport.get(FOOD_PATH).await?;
        let raw: Vec<serde_json::Value> = response.json()?;
        let total = raw.len();

        // one malformed entry must not hide the rest
        let records: Vec<FoodRecord> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed food record");
                    None
                }
            })
            .collect();

        tracing::debug!(
            count = records.len(),
            skipped = total - records.len(),
            "food data loaded"
        );
        Ok(Arc::new(records))
    }
}
