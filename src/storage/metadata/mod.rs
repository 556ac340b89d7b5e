// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Metadata Storage Strategies
//!
//! Per-record metadata can be laid out three ways:
//! - `COLUMN_PER_KEY` - one typed column per declared key, optional B-tree/hash indexes
//! - `COMBINED_JSON` - one JSON document column, never indexed (full scan + runtime extraction)
//! - `COMBINED_JSONB` - one JSONB document column with a GIN index over the whole document
//!
//! The concrete strategy is chosen once by [`MetadataStorageFactory`] and then
//! renders every metadata-dependent SQL fragment for the store and the filter
//! compiler.

pub mod column_per_key;
pub mod combined_json;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::core::error::{Result, VectorStoreError};
use crate::core::types::{Metadata, MetadataValue};
use crate::query::params::ParamBuffer;
use crate::schema::{validate_identifier, validate_metadata_key, RESERVED_COLUMNS};
use crate::storage::connection::{DriverError, SqlRow, SqlType};

pub use column_per_key::ColumnPerKeyStorage;
pub use combined_json::CombinedJsonStorage;

/// Default name of the combined document column.
pub const DEFAULT_METADATA_COLUMN: &str = "metadata";

/// Name of the secondary index on a `COLUMN_PER_KEY` column.
pub fn column_index_name(table: &str, column: &str) -> String {
    format!("{}_{}_idx", table, column)
}

/// Name of the GIN index over a whole JSONB document column.
pub fn document_index_name(table: &str, column: &str) -> String {
    format!("{}_{}_gin_idx", table, column)
}

/// Name of a per-key expression index on a JSONB document column.
pub fn key_index_name(table: &str, column: &str, key: &str) -> String {
    format!("{}_{}_{}_idx", table, column, key)
}

/// Physical encoding of per-record metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MetadataStorageMode {
    #[serde(rename = "COLUMN_PER_KEY")]
    ColumnPerKey,
    #[serde(rename = "COMBINED_JSON")]
    CombinedJson,
    #[serde(rename = "COMBINED_JSONB")]
    CombinedJsonb,
}

impl Default for MetadataStorageMode {
    fn default() -> Self {
        Self::CombinedJsonb
    }
}

impl fmt::Display for MetadataStorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ColumnPerKey => "COLUMN_PER_KEY",
            Self::CombinedJson => "COMBINED_JSON",
            Self::CombinedJsonb => "COMBINED_JSONB",
        };
        f.write_str(name)
    }
}

/// Declared scalar type of a `COLUMN_PER_KEY` metadata column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataColumnType {
    Text,
    Integer,
    Float,
    Boolean,
}

impl MetadataColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "BIGINT",
            Self::Float => "DOUBLE PRECISION",
            Self::Boolean => "BOOLEAN",
        }
    }

    pub fn bind_type(&self) -> SqlType {
        match self {
            Self::Text => SqlType::Text,
            Self::Integer => SqlType::BigInt,
            Self::Float => SqlType::Double,
            Self::Boolean => SqlType::Boolean,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// One declared metadata column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: MetadataColumnType,
}

impl MetadataColumn {
    pub fn new(name: impl Into<String>, column_type: MetadataColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, MetadataColumnType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, MetadataColumnType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, MetadataColumnType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, MetadataColumnType::Boolean)
    }
}

/// Secondary index access method for metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MetadataIndexType {
    #[serde(rename = "BTREE")]
    BTree,
    #[serde(rename = "HASH")]
    Hash,
    #[serde(rename = "GIN")]
    Gin,
}

impl MetadataIndexType {
    pub fn access_method(&self) -> &'static str {
        match self {
            Self::BTree => "btree",
            Self::Hash => "hash",
            Self::Gin => "gin",
        }
    }
}

/// Companion of the storage mode: column declarations and secondary indexes.
///
/// For `COLUMN_PER_KEY`, `indexes` names declared columns. For `COMBINED_JSONB`,
/// `indexes` names document keys that additionally get an expression index
/// (the whole-document GIN index is always created). `COMBINED_JSON` cannot be
/// indexed, so any index there is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataStorageConfig {
    #[serde(default)]
    pub mode: MetadataStorageMode,
    #[serde(default = "default_metadata_column")]
    pub column_name: String,
    #[serde(default)]
    pub columns: Vec<MetadataColumn>,
    #[serde(default)]
    pub indexes: Vec<String>,
    #[serde(default)]
    pub index_type: Option<MetadataIndexType>,
}

fn default_metadata_column() -> String {
    DEFAULT_METADATA_COLUMN.to_string()
}

impl Default for MetadataStorageConfig {
    fn default() -> Self {
        Self {
            mode: MetadataStorageMode::default(),
            column_name: default_metadata_column(),
            columns: Vec::new(),
            indexes: Vec::new(),
            index_type: None,
        }
    }
}

impl MetadataStorageConfig {
    pub fn column_per_key(columns: Vec<MetadataColumn>) -> MetadataStorageConfigBuilder {
        MetadataStorageConfigBuilder::new(MetadataStorageMode::ColumnPerKey).columns(columns)
    }

    pub fn combined_json() -> MetadataStorageConfigBuilder {
        MetadataStorageConfigBuilder::new(MetadataStorageMode::CombinedJson)
    }

    pub fn combined_jsonb() -> MetadataStorageConfigBuilder {
        MetadataStorageConfigBuilder::new(MetadataStorageMode::CombinedJsonb)
    }

    /// Index type actually used for secondary indexes of this config.
    pub fn effective_index_type(&self) -> MetadataIndexType {
        self.index_type.unwrap_or(MetadataIndexType::BTree)
    }

    /// Metadata index names derived for `table`, in creation order.
    pub fn index_names(&self, table: &str) -> Vec<String> {
        match self.mode {
            MetadataStorageMode::ColumnPerKey => self
                .indexes
                .iter()
                .map(|column| column_index_name(table, column))
                .collect(),
            MetadataStorageMode::CombinedJson => Vec::new(),
            MetadataStorageMode::CombinedJsonb => std::iter::once(document_index_name(table, &self.column_name))
                .chain(
                    self.indexes
                        .iter()
                        .map(|key| key_index_name(table, &self.column_name, key)),
                )
                .collect(),
        }
    }

    /// Check the derived index names for `table`. Each must be a legal
    /// identifier and distinct from the others and from `taken`, since
    /// `CREATE INDEX IF NOT EXISTS` skips a second index under the same name.
    pub fn validate_index_names(&self, table: &str, taken: &[String]) -> Result<()> {
        // Unquoted names are case-folded by the backend.
        let mut seen: HashSet<String> = taken.iter().map(|name| name.to_lowercase()).collect();
        for name in self.index_names(table) {
            validate_identifier("metadata index", &name)?;
            if !seen.insert(name.to_lowercase()) {
                return Err(VectorStoreError::configuration(format!(
                    "metadata index name '{}' collides with another index on {}",
                    name, table
                )));
            }
        }
        Ok(())
    }

    /// Check the configuration. Illegal mode/index combinations are
    /// configuration errors; malformed identifiers are validation errors.
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            MetadataStorageMode::ColumnPerKey => self.validate_column_per_key(),
            MetadataStorageMode::CombinedJson => {
                if !self.indexes.is_empty() || self.index_type.is_some() {
                    return Err(VectorStoreError::configuration(
                        "COMBINED_JSON metadata cannot be indexed; use COMBINED_JSONB for indexed metadata",
                    ));
                }
                self.validate_combined()
            }
            MetadataStorageMode::CombinedJsonb => {
                if let Some(index_type) = self.index_type {
                    if index_type == MetadataIndexType::Gin {
                        return Err(VectorStoreError::configuration(
                            "per-key JSONB indexes use BTREE or HASH; the document GIN index is implicit",
                        ));
                    }
                }
                for key in &self.indexes {
                    validate_metadata_key(key)?;
                }
                self.validate_combined()
            }
        }
    }

    fn validate_combined(&self) -> Result<()> {
        if !self.columns.is_empty() {
            return Err(VectorStoreError::configuration(format!(
                "{} metadata does not take column definitions",
                self.mode
            )));
        }
        validate_identifier("metadata column", &self.column_name)?;
        if RESERVED_COLUMNS.contains(&self.column_name.as_str()) {
            return Err(VectorStoreError::configuration(format!(
                "metadata column name '{}' is reserved",
                self.column_name
            )));
        }
        Ok(())
    }

    fn validate_column_per_key(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(VectorStoreError::configuration(
                "COLUMN_PER_KEY metadata requires at least one column definition",
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            validate_identifier("metadata column", &column.name)?;
            if RESERVED_COLUMNS.contains(&column.name.as_str()) {
                return Err(VectorStoreError::configuration(format!(
                    "metadata column name '{}' is reserved",
                    column.name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(VectorStoreError::configuration(format!(
                    "metadata column '{}' declared twice",
                    column.name
                )));
            }
        }

        if self.index_type == Some(MetadataIndexType::Gin) {
            return Err(VectorStoreError::configuration(
                "GIN indexes are not supported on scalar metadata columns",
            ));
        }
        for index in &self.indexes {
            if !seen.contains(index.as_str()) {
                return Err(VectorStoreError::configuration(format!(
                    "index references undeclared metadata column '{}'",
                    index
                )));
            }
        }
        Ok(())
    }
}

/// Builder that validates on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct MetadataStorageConfigBuilder {
    config: MetadataStorageConfig,
}

impl MetadataStorageConfigBuilder {
    pub fn new(mode: MetadataStorageMode) -> Self {
        Self {
            config: MetadataStorageConfig {
                mode,
                ..MetadataStorageConfig::default()
            },
        }
    }

    pub fn columns(mut self, columns: Vec<MetadataColumn>) -> Self {
        self.config.columns = columns;
        self
    }

    pub fn column_name(mut self, name: impl Into<String>) -> Self {
        self.config.column_name = name.into();
        self
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.config.indexes.push(name.into());
        self
    }

    pub fn indexes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.indexes.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn index_type(mut self, index_type: MetadataIndexType) -> Self {
        self.config.index_type = Some(index_type);
        self
    }

    pub fn build(self) -> Result<MetadataStorageConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// How a filtered key compares against literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Typed column; literals are bound with the column's type.
    Column(MetadataColumnType),
    /// Text produced by JSON extraction; numeric literals require a cast.
    JsonText,
}

/// SQL expression addressing one metadata key in a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTarget {
    pub expression: String,
    pub kind: TargetKind,
}

/// Strategy rendering every metadata-dependent SQL fragment.
pub trait MetadataStorage: Send + Sync + fmt::Debug {
    fn mode(&self) -> MetadataStorageMode;

    /// Column definitions appended to `CREATE TABLE`.
    fn column_ddl(&self) -> Vec<String>;

    /// Idempotent secondary index statements.
    fn index_ddl(&self, table: &str) -> Vec<String>;

    /// Columns receiving metadata on insert, in bind order.
    fn insert_columns(&self) -> Vec<String>;

    /// Bind one record's metadata; returns one value expression per insert column.
    fn bind_insert(&self, metadata: &Metadata, params: &mut ParamBuffer) -> Result<Vec<String>>;

    /// Expression addressing `key` inside a filter predicate.
    fn filter_target(&self, key: &str) -> Result<FilterTarget>;

    /// Projection added to `SELECT` so that [`decode_row`](Self::decode_row) can rebuild the map.
    fn select_projection(&self) -> Vec<String>;

    fn decode_row(&self, row: &SqlRow) -> std::result::Result<Metadata, DriverError>;
}

/// Builds the concrete strategy from a validated config.
pub struct MetadataStorageFactory;

impl MetadataStorageFactory {
    pub fn create(config: &MetadataStorageConfig) -> Result<Box<dyn MetadataStorage>> {
        config.validate()?;
        let storage: Box<dyn MetadataStorage> = match config.mode {
            MetadataStorageMode::ColumnPerKey => Box::new(ColumnPerKeyStorage::new(
                config.columns.clone(),
                config.indexes.clone(),
                config.effective_index_type(),
            )),
            MetadataStorageMode::CombinedJson => {
                Box::new(CombinedJsonStorage::json(config.column_name.clone()))
            }
            MetadataStorageMode::CombinedJsonb => Box::new(CombinedJsonStorage::jsonb(
                config.column_name.clone(),
                config.indexes.clone(),
                config.effective_index_type(),
            )),
        };
        tracing::debug!("🗂️ Metadata storage strategy: {}", config.mode);
        Ok(storage)
    }
}

/// Reject values that cannot be stored faithfully.
pub(crate) fn check_storable(metadata: &Metadata) -> Result<()> {
    for (key, value) in metadata {
        if let MetadataValue::Float(f) = value {
            if !f.is_finite() {
                return Err(VectorStoreError::validation(format!(
                    "metadata '{}' holds a non-finite float",
                    key
                )));
            }
        }
    }
    Ok(())
}
