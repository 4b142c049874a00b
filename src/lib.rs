pub mod cache;
pub mod config;
pub mod core;
pub mod domain;
pub mod mutation;
pub mod query;
pub mod transport;

pub use crate::core::FoodClient;
pub use domain::FoodRecord;
pub use mutation::{FOOD_DATA_KEY, MutationError, MutationState, RetryPolicy, SubmitFoodRecord};
