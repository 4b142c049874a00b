use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use food_client::cache::Cache;

use super::{Event, Events};

#[derive(Clone)]
pub struct RecordingCache {
    events: Events,
    should_fail: Arc<Mutex<bool>>,
}

impl RecordingCache {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        *self.should_fail.lock().unwrap() = should_fail;
    }

    pub fn invalidated_keys(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::Invalidate(key) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Cache for RecordingCache {
    async fn invalidate(&self, key: &str) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(Event::Invalidate(key.to_string()));

        if *self.should_fail.lock().unwrap() {
            return Err(anyhow!("Simulated invalidation failure"));
        }
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<()> {
        Ok(())
    }
}
