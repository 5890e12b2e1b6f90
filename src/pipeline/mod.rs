//! Hint-guided colorization pipeline.

pub mod batch;
mod colorizer;
mod config;
mod session;
mod working_set;

pub use batch::{BatchRunner, BatchSummary, Chapter};
pub use colorizer::Colorizer;
pub use config::{Config, PrepareOptions};
pub use session::InferenceSession;
pub use working_set::{OutputLayout, WorkingSet};
