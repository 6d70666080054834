mod cache;
mod memory;
mod models;
mod postgres;
mod sqlite;
mod trait_def;

pub use cache::{CacheKey, ReportCache};
pub use memory::MemoryStore;
pub use models::{CacheEntry, DailySnapshot, SnapshotMetrics};
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use trait_def::Store;
