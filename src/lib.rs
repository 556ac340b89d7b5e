/*
 * Copyright 2025 Vijaykumar Singh
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # ProximaDB pgvector Embedding Store
//!
//! Embedding storage on PostgreSQL or YugabyteDB with the pgvector extension.
//!
//! ## Key Features
//!
//! - **Pluggable Metadata Storage**: typed column per key, JSON document, or
//!   GIN-indexed JSONB document
//! - **Safe Filter Compilation**: structured filters become parameterized SQL;
//!   literal values are always bound, never spliced
//! - **Vector Index Strategies**: HNSW (including YugabyteDB `ybhnsw`) or exact scan
//! - **Idempotent Schema Management**: concurrent stores converge on one table and index
//!
//! ```no_run
//! use std::sync::Arc;
//! use proximadb_pgvector::{
//!     EmbeddingStore, Metadata, MetadataFilter, PerformanceConfig, RecordingConnectionProvider,
//!     SearchRequest, TableSchema,
//! };
//!
//! # async fn demo() -> proximadb_pgvector::Result<()> {
//! let schema = TableSchema::builder("documents").dimension(4).build()?;
//! let provider = Arc::new(RecordingConnectionProvider::new());
//! let store = EmbeddingStore::new(schema, provider, PerformanceConfig::default()).await?;
//!
//! store.add(vec![1.0, 0.0, 0.0, 0.0], "a", Metadata::new()).await?;
//! let hits = store
//!     .search(
//!         &SearchRequest::new(vec![1.0, 0.0, 0.0, 0.0], 2)
//!             .filter(MetadataFilter::eq("genre", "comedy")),
//!     )
//!     .await?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod index;
pub mod query;
pub mod schema;
pub mod storage;

pub use crate::core::{
    probe_dimension, ConnectionConfig, DistanceMetric, Embedder, EmbeddingMatch, EmbeddingRecord,
    Metadata, MetadataValue, PerformanceConfig, PoolConfig, Result, StoreConfig, Vector,
    VectorId, VectorStoreError,
};
pub use crate::index::{HnswConfig, HnswIndex, IndexDescriptor, NoIndex, VectorIndex, VectorIndexConfig};
pub use crate::query::{FieldCondition, FilterCompiler, FilterResult, MetadataFilter};
pub use crate::schema::{TableSchema, TableSchemaBuilder, TableSettings};
pub use crate::storage::{
    EmbeddingStore, MetadataColumn, MetadataColumnType, MetadataIndexType, MetadataStorageConfig,
    MetadataStorageMode, PgConnectionProvider, RecordingConnectionProvider, SearchRequest,
    StoreStats, TableState,
};
