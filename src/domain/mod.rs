mod food;

pub use food::FoodRecord;
