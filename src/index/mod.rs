// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Vector Index Strategies
//!
//! - `HnswIndex` - approximate nearest neighbor graph index (pgvector `hnsw`,
//!   YugabyteDB `ybhnsw`)
//! - `NoIndex` - no DDL, exact sequential scan on every search
//!
//! The strategy is chosen once per store by [`VectorIndexFactory`].

pub mod hnsw;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{Result, VectorStoreError};
use crate::core::types::DistanceMetric;
use crate::schema::{validate_identifier, EMBEDDING_COLUMN};
use crate::storage::connection::Statement;

pub use hnsw::{HnswIndex, NoIndex};

/// pgvector refuses to build HNSW indexes on wider `vector` columns.
pub const MAX_HNSW_DIMENSION: usize = 2_000;

/// Vector index choice as it appears in the schema and configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VectorIndexConfig {
    /// HNSW graph index
    Hnsw(HnswConfig),

    /// No vector index; searches scan the whole table
    None,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self::Hnsw(HnswConfig::default())
    }
}

impl VectorIndexConfig {
    /// Validate build parameters against the table they will be created on.
    pub fn validate(&self, table: &str, dimension: usize) -> Result<()> {
        match self {
            Self::Hnsw(config) => config.validate(table, dimension),
            Self::None => Ok(()),
        }
    }

    /// Name of the vector index created on `table`, if any.
    pub fn index_name(&self, table: &str) -> Option<String> {
        match self {
            Self::Hnsw(config) => Some(config.index_name(table)),
            Self::None => None,
        }
    }
}

/// HNSW build and search parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HnswConfig {
    /// Access method requested from the backend (`hnsw` or `ybhnsw`)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Graph degree
    #[serde(default = "default_m")]
    pub m: u32,

    /// Candidate list size during construction
    #[serde(default = "default_ef_construction")]
    pub ef_construction: u32,

    /// Candidate list size during search; backend default when unset
    #[serde(default)]
    pub ef_search: Option<u32>,

    /// Explicit index name; derived from table, column and algorithm when unset
    #[serde(default)]
    pub name: Option<String>,
}

fn default_algorithm() -> String {
    "hnsw".to_string()
}

fn default_m() -> u32 {
    16
}

fn default_ef_construction() -> u32 {
    64
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            m: default_m(),
            ef_construction: default_ef_construction(),
            ef_search: None,
            name: None,
        }
    }
}

impl HnswConfig {
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn with_m(mut self, m: u32) -> Self {
        self.m = m;
        self
    }

    pub fn with_ef_construction(mut self, ef_construction: u32) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    pub fn with_ef_search(mut self, ef_search: u32) -> Self {
        self.ef_search = Some(ef_search);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Index name used in DDL and catalog lookups.
    pub fn index_name(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| default_index_name(table, &self.algorithm))
    }

    pub fn validate(&self, table: &str, dimension: usize) -> Result<()> {
        validate_identifier("index algorithm", &self.algorithm)?;
        validate_identifier("index", &self.index_name(table))?;

        if !(2..=100).contains(&self.m) {
            return Err(VectorStoreError::configuration(format!(
                "HNSW m must be between 2 and 100, got {}",
                self.m
            )));
        }
        if !(4..=1000).contains(&self.ef_construction) || self.ef_construction < 2 * self.m {
            return Err(VectorStoreError::configuration(format!(
                "HNSW ef_construction must be between 4 and 1000 and at least 2 * m ({}), got {}",
                2 * self.m,
                self.ef_construction
            )));
        }
        if let Some(ef_search) = self.ef_search {
            if !(1..=1000).contains(&ef_search) {
                return Err(VectorStoreError::configuration(format!(
                    "HNSW ef_search must be between 1 and 1000, got {}",
                    ef_search
                )));
            }
        }
        if dimension > MAX_HNSW_DIMENSION {
            return Err(VectorStoreError::configuration(format!(
                "HNSW indexes support at most {} dimensions, table has {}",
                MAX_HNSW_DIMENSION, dimension
            )));
        }
        Ok(())
    }
}

/// `<table>_<column>_<algorithm>_idx`
pub fn default_index_name(table: &str, algorithm: &str) -> String {
    format!("{}_{}_{}_idx", table, EMBEDDING_COLUMN, algorithm)
}

/// Concrete vector index as it will be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub algorithm: String,
    pub m: u32,
    pub ef_construction: u32,
    pub operator_class: &'static str,
    pub name: String,
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} USING {} (m={}, ef_construction={}, {})",
            self.name, self.algorithm, self.m, self.ef_construction, self.operator_class
        )
    }
}

/// Strategy rendering vector index DDL and per-search settings.
pub trait VectorIndex: Send + Sync + fmt::Debug {
    /// Descriptor of the index, `None` when nothing is created.
    fn descriptor(&self) -> Option<&IndexDescriptor>;

    /// Single idempotent `CREATE INDEX IF NOT EXISTS` statement.
    fn create_index_ddl(&self) -> Option<String>;

    /// Access methods that count as a successfully created index when read
    /// back from the catalog.
    fn accepted_access_methods(&self) -> Vec<String>;

    /// Transaction-local settings issued before a search.
    fn search_settings(&self) -> Vec<Statement>;
}

pub struct VectorIndexFactory;

impl VectorIndexFactory {
    pub fn create(
        config: &VectorIndexConfig,
        table: &str,
        metric: DistanceMetric,
    ) -> Box<dyn VectorIndex> {
        match config {
            VectorIndexConfig::Hnsw(hnsw) => Box::new(HnswIndex::new(hnsw, table, metric)),
            VectorIndexConfig::None => Box::new(NoIndex),
        }
    }
}
