use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use uuid::Uuid;

use crate::{
    cache::Cache,
    domain::FoodRecord,
    transport::{ApiResponse, Transport, TransportError},
};

/// Query collection that goes stale whenever a record is submitted
pub const FOOD_DATA_KEY: &str = "food-data";
pub const FOOD_PATH: &str = "food";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationState {
    #[default]
    Idle,
    InFlight,
    Success,
    Failed,
}

impl MutationState {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
    /// Send one `Idempotency-Key` per submission so retried POSTs can be deduplicated
    pub idempotency_keys: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::ZERO,
            idempotency_keys: true,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("submission failed after {attempts} attempt(s): {source}")]
    TransportFailure {
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("could not encode the record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Submits food records to the backend and marks the `food-data` query stale
/// once a submission lands.
///
/// Each instance tracks the state of its latest submission; callers that fire
/// several at once are responsible for ordering them.
pub struct SubmitFoodRecord {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn Cache>,
    policy: RetryPolicy,
    state: watch::Sender<MutationState>,
}

impl SubmitFoodRecord {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<dyn Cache>, policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(MutationState::Idle);
        Self {
            transport,
            cache,
            policy,
            state,
        }
    }

    pub fn state(&self) -> MutationState {
        *self.state.borrow()
    }

    /// Observe state transitions of this instance
    pub fn subscribe(&self) -> watch::Receiver<MutationState> {
        self.state.subscribe()
    }

    pub fn reset(&self) {
        self.state.send_replace(MutationState::Idle);
    }

    /// Submit `record`, retrying transport failures up to the policy's limit.
    ///
    /// On success the response is returned untouched and `food-data` has
    /// already been invalidated by the time the state reads `Success`.
    #[tracing::instrument(name = "mutation::submit_food_record", skip_all, fields(name = %record.name))]
    pub async fn submit(&self, record: &FoodRecord) -> Result<ApiResponse, MutationError> {
        self.state.send_replace(MutationState::InFlight);

        let body = match record.to_json_bytes() {
            Ok(body) => body,
            Err(e) => {
                self.state.send_replace(MutationState::Failed);
                return Err(MutationError::Encode(e));
            }
        };

        let idempotency_key = self
            .policy
            .idempotency_keys
            .then(|| Uuid::new_v4().to_string());

        match self.post_with_retries(body, idempotency_key.as_deref()).await {
            Ok(response) => {
                if let Err(e) = self.cache.invalidate(FOOD_DATA_KEY).await {
                    tracing::warn!(error = %e, key = FOOD_DATA_KEY, "failed to invalidate query");
                }
                self.state.send_replace(MutationState::Success);
                Ok(response)
            }
            Err(e) => {
                self.state.send_replace(MutationState::Failed);
                Err(e)
            }
        }
    }

    /// Schedule a submission and return immediately
    pub fn spawn(
        self: &Arc<Self>,
        record: FoodRecord,
    ) -> JoinHandle<Result<ApiResponse, MutationError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.submit(&record).await })
    }

    async fn post_with_retries(
        &self,
        body: Bytes,
        idempotency_key: Option<&str>,
    ) -> Result<ApiResponse, MutationError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self
                .transport
                .post_json(FOOD_PATH, body.clone(), idempotency_key)
                .await
            {
                Ok(response) => {
                    tracing::debug!(attempts, status = %response.status, "record submitted");
                    return Ok(response);
                }
                Err(source) if attempts >= max_attempts => {
                    tracing::debug!(attempts, error = %source, "giving up on submission");
                    return Err(MutationError::TransportFailure { attempts, source });
                }
                Err(e) => {
                    tracing::debug!(attempts, max_attempts, error = %e, "submission failed, retrying");
                }
            }

            if !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }
        }
    }
}
