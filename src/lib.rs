mod builder;
mod cache;
mod error;
mod metrics;
pub mod key;
pub mod lifecycle;
pub mod listener;
pub mod store;

pub use builder::{CacheBuilder, DEFAULT_COMPACTION_FACTOR, LOW_MEMORY_COMPACTION_FRACTION};
pub use cache::{Cache, RendererCache};
pub use error::{Error, Result};
pub use key::{InterfaceStyle, Key, Size};
pub use metrics::stats::Metrics;
