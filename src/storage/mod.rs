// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

pub mod connection;
pub mod embedding_store;
pub mod metadata;

pub use connection::{
    Connection, ConnectionProvider, DriverError, PgConnectionProvider, RecordingConnectionProvider,
};
pub use embedding_store::{EmbeddingStore, SearchRequest, StoreStats, TableState};
pub use metadata::{
    MetadataColumn, MetadataColumnType, MetadataIndexType, MetadataStorage,
    MetadataStorageConfig, MetadataStorageFactory, MetadataStorageMode,
};
