#![allow(dead_code)]

pub mod mock_cache;
pub mod mock_transport;

use std::sync::{Arc, Mutex};

/// Calls seen by the mocks, in the order they completed
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Post,
    Get,
    Invalidate(String),
}

pub type Events = Arc<Mutex<Vec<Event>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}
