// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

use crate::core::types::DistanceMetric;
use crate::schema::EMBEDDING_COLUMN;
use crate::storage::connection::Statement;

use super::{HnswConfig, IndexDescriptor, VectorIndex};

/// Access method YugabyteDB builds when plain `hnsw` is requested.
pub const YUGABYTE_HNSW: &str = "ybhnsw";
pub const PGVECTOR_HNSW: &str = "hnsw";

/// HNSW graph index on the embedding column.
///
/// YugabyteDB accepts `USING hnsw` but transparently creates a `ybhnsw` index,
/// so the catalog reports a different access method than the one requested.
/// Verification therefore accepts either spelling. This substitution is a
/// YugabyteDB behavior; stock PostgreSQL reports exactly what was requested.
#[derive(Debug, Clone)]
pub struct HnswIndex {
    table: String,
    descriptor: IndexDescriptor,
    ef_search: Option<u32>,
}

impl HnswIndex {
    /// `config` must already be validated against `table`.
    pub fn new(config: &HnswConfig, table: &str, metric: DistanceMetric) -> Self {
        Self {
            table: table.to_string(),
            descriptor: IndexDescriptor {
                algorithm: config.algorithm.clone(),
                m: config.m,
                ef_construction: config.ef_construction,
                operator_class: metric.operator_class(),
                name: config.index_name(table),
            },
            ef_search: config.ef_search,
        }
    }
}

impl VectorIndex for HnswIndex {
    fn descriptor(&self) -> Option<&IndexDescriptor> {
        Some(&self.descriptor)
    }

    fn create_index_ddl(&self) -> Option<String> {
        let d = &self.descriptor;
        Some(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING {} ({} {}) WITH (m = {}, ef_construction = {})",
            d.name, self.table, d.algorithm, EMBEDDING_COLUMN, d.operator_class, d.m, d.ef_construction
        ))
    }

    fn accepted_access_methods(&self) -> Vec<String> {
        let requested = self.descriptor.algorithm.to_lowercase();
        let mut accepted = vec![requested.clone()];
        match requested.as_str() {
            PGVECTOR_HNSW => accepted.push(YUGABYTE_HNSW.to_string()),
            YUGABYTE_HNSW => accepted.push(PGVECTOR_HNSW.to_string()),
            _ => {}
        }
        accepted
    }

    fn search_settings(&self) -> Vec<Statement> {
        self.ef_search
            .map(|ef| vec![Statement::raw(format!("SET LOCAL hnsw.ef_search = {}", ef))])
            .unwrap_or_default()
    }
}

/// No vector index. Every search is an exact sequential scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndex;

impl VectorIndex for NoIndex {
    fn descriptor(&self) -> Option<&IndexDescriptor> {
        None
    }

    fn create_index_ddl(&self) -> Option<String> {
        None
    }

    fn accepted_access_methods(&self) -> Vec<String> {
        Vec::new()
    }

    fn search_settings(&self) -> Vec<Statement> {
        Vec::new()
    }
}
