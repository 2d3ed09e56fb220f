pub mod classifier;
pub mod ingestor;
pub mod stream;
pub mod window;

// Re-export the window types for convenient access
// (e.g. `use crate::market_data::PressureWindow`).
pub use classifier::Classifier;
pub use ingestor::FeedIngestor;
pub use window::{InsertOutcome, PressureWindow, WindowSnapshot};
