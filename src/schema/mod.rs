// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Table Schema Model
//!
//! Immutable description of one embedding table: vector dimension, distance
//! metric, metadata storage and vector index choice. Built once through
//! [`TableSchemaBuilder`], which performs every validation up front; the store
//! only ever sees a valid schema.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, VectorStoreError};
use crate::core::types::DistanceMetric;
use crate::index::VectorIndexConfig;
use crate::storage::metadata::MetadataStorageConfig;

/// PostgreSQL truncates identifiers beyond this length.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Largest dimension accepted by the pgvector `vector` type.
pub const MAX_VECTOR_DIMENSION: usize = 16_000;

pub const ID_COLUMN: &str = "id";
pub const EMBEDDING_COLUMN: &str = "embedding";
pub const TEXT_COLUMN: &str = "text";
/// Alias of the similarity column in search results.
pub const SCORE_COLUMN: &str = "score";

/// Names metadata columns may not take: the fixed table columns plus the
/// search result alias.
pub const RESERVED_COLUMNS: [&str; 4] = [ID_COLUMN, EMBEDDING_COLUMN, TEXT_COLUMN, SCORE_COLUMN];

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

static METADATA_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid metadata key regex"));

/// Validate a SQL identifier (table, column or index name) before it is
/// spliced into generated DDL/DML.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(VectorStoreError::validation(format!(
            "{} name exceeds {} characters: {}",
            kind, MAX_IDENTIFIER_LENGTH, name
        )));
    }
    if !IDENTIFIER_PATTERN.is_match(name) {
        return Err(VectorStoreError::validation(format!(
            "{} name must match [A-Za-z_][A-Za-z0-9_]*",
            kind
        )));
    }
    Ok(())
}

/// Validate a metadata key before it is embedded into a JSON path expression.
///
/// The key is the only caller-supplied text ever placed into SQL text; values
/// always travel as bound parameters.
pub fn validate_metadata_key(key: &str) -> Result<()> {
    if key.len() > MAX_IDENTIFIER_LENGTH || !METADATA_KEY_PATTERN.is_match(key) {
        return Err(VectorStoreError::validation(
            "metadata key must match [A-Za-z0-9_]+ and be at most 63 characters",
        ));
    }
    Ok(())
}

/// Immutable per-table configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    table_name: String,
    dimension: usize,
    metric: DistanceMetric,
    metadata: MetadataStorageConfig,
    index: VectorIndexConfig,
    create_if_not_exists: bool,
}

impl TableSchema {
    pub fn builder(table_name: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder::new(table_name)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn metadata(&self) -> &MetadataStorageConfig {
        &self.metadata
    }

    pub fn index(&self) -> &VectorIndexConfig {
        &self.index
    }

    pub fn create_if_not_exists(&self) -> bool {
        self.create_if_not_exists
    }

    /// Check a vector against the declared dimension.
    pub fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::validation(format!(
                "vector dimension {} does not match table dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

/// Serializable table settings as they appear in the store configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSettings {
    pub name: String,
    pub dimension: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default = "default_create_if_not_exists")]
    pub create_if_not_exists: bool,
    #[serde(default)]
    pub metadata: MetadataStorageConfig,
    #[serde(default)]
    pub index: VectorIndexConfig,
}

fn default_create_if_not_exists() -> bool {
    true
}

impl TableSettings {
    /// Validate the settings into a schema.
    pub fn to_schema(&self) -> Result<TableSchema> {
        TableSchema::builder(self.name.clone())
            .dimension(self.dimension)
            .metric(self.metric)
            .metadata(self.metadata.clone())
            .index(self.index.clone())
            .create_if_not_exists(self.create_if_not_exists)
            .build()
    }
}

/// Validating builder for [`TableSchema`].
#[derive(Debug, Clone)]
pub struct TableSchemaBuilder {
    table_name: String,
    dimension: Option<usize>,
    metric: DistanceMetric,
    metadata: MetadataStorageConfig,
    index: VectorIndexConfig,
    create_if_not_exists: bool,
}

impl TableSchemaBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            dimension: None,
            metric: DistanceMetric::default(),
            metadata: MetadataStorageConfig::default(),
            index: VectorIndexConfig::default(),
            create_if_not_exists: true,
        }
    }

    pub fn dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn metadata(mut self, metadata: MetadataStorageConfig) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn index(mut self, index: VectorIndexConfig) -> Self {
        self.index = index;
        self
    }

    pub fn create_if_not_exists(mut self, create: bool) -> Self {
        self.create_if_not_exists = create;
        self
    }

    pub fn build(self) -> Result<TableSchema> {
        validate_identifier("table", &self.table_name)?;

        let dimension = self
            .dimension
            .ok_or_else(|| VectorStoreError::validation("dimension is required"))?;
        if dimension == 0 {
            return Err(VectorStoreError::validation("dimension must be positive"));
        }
        if dimension > MAX_VECTOR_DIMENSION {
            return Err(VectorStoreError::validation(format!(
                "dimension {} exceeds the pgvector limit of {}",
                dimension, MAX_VECTOR_DIMENSION
            )));
        }

        // Storage and index configs are validated again here so that configs
        // deserialized from a file go through the same checks as built ones.
        self.metadata.validate()?;
        self.index.validate(&self.table_name, dimension)?;
        let taken: Vec<String> = self.index.index_name(&self.table_name).into_iter().collect();
        self.metadata.validate_index_names(&self.table_name, &taken)?;

        Ok(TableSchema {
            table_name: self.table_name,
            dimension,
            metric: self.metric,
            metadata: self.metadata,
            index: self.index,
            create_if_not_exists: self.create_if_not_exists,
        })
    }
}
