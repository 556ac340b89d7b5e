//! ProximaDB pgvector Integration Tests
//!
//! Store behavior through the public API. Tests against a live
//! PostgreSQL/YugabyteDB run only when `PROXIMADB_TEST_DATABASE_URL` is set.

pub mod common;
pub mod test_filter_compilation;
pub mod test_live_pgvector;
pub mod test_store_lifecycle;

// Re-export common utilities
pub use common::*;
