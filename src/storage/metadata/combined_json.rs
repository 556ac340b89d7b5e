// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Whole metadata map stored as one JSON or JSONB document.
//!
//! Keys are addressed with `->>` text extraction. The key is spliced into the
//! SQL text because JSON operators do not accept a bound key, so it is
//! validated against `[A-Za-z0-9_]+` first. Values are always bound.

use crate::core::error::{Result, VectorStoreError};
use crate::core::types::{Metadata, MetadataValue};
use crate::query::params::ParamBuffer;
use crate::schema::validate_metadata_key;
use crate::storage::connection::{DriverError, SqlRow, SqlValue};

use super::{
    check_storable, document_index_name, key_index_name, FilterTarget, MetadataIndexType, MetadataStorage, MetadataStorageMode,
    TargetKind,
};

#[derive(Debug, Clone)]
pub struct CombinedJsonStorage {
    column: String,
    binary: bool,
    key_indexes: Vec<String>,
    index_type: MetadataIndexType,
}

impl CombinedJsonStorage {
    /// Plain JSON column. Never indexed.
    pub fn json(column: String) -> Self {
        Self {
            column,
            binary: false,
            key_indexes: Vec::new(),
            index_type: MetadataIndexType::BTree,
        }
    }

    /// JSONB column with a GIN index over the document plus optional per-key
    /// expression indexes.
    pub fn jsonb(column: String, key_indexes: Vec<String>, index_type: MetadataIndexType) -> Self {
        Self {
            column,
            binary: true,
            key_indexes,
            index_type,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    fn sql_type(&self) -> &'static str {
        if self.binary {
            "JSONB"
        } else {
            "JSON"
        }
    }

    fn extraction(&self, key: &str) -> String {
        format!("{}->>'{}'", self.column, key)
    }
}

impl MetadataStorage for CombinedJsonStorage {
    fn mode(&self) -> MetadataStorageMode {
        if self.binary {
            MetadataStorageMode::CombinedJsonb
        } else {
            MetadataStorageMode::CombinedJson
        }
    }

    fn column_ddl(&self) -> Vec<String> {
        vec![format!("{} {}", self.column, self.sql_type())]
    }

    fn index_ddl(&self, table: &str) -> Vec<String> {
        if !self.binary {
            return Vec::new();
        }

        let mut statements = vec![format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING gin ({})",
            document_index_name(table, &self.column),
            table,
            self.column
        )];
        for key in &self.key_indexes {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} USING {} (({}))",
                key_index_name(table, &self.column, key),
                table,
                self.index_type.access_method(),
                self.extraction(key)
            ));
        }
        statements
    }

    fn insert_columns(&self) -> Vec<String> {
        vec![self.column.clone()]
    }

    fn bind_insert(&self, metadata: &Metadata, params: &mut ParamBuffer) -> Result<Vec<String>> {
        check_storable(metadata)?;
        let document = serde_json::to_string(metadata)
            .map_err(|e| VectorStoreError::validation(format!("metadata is not JSON-encodable: {}", e)))?;
        let placeholder = params.push(SqlValue::Text(document));
        Ok(vec![format!("{}::{}", placeholder, self.sql_type().to_lowercase())])
    }

    fn filter_target(&self, key: &str) -> Result<FilterTarget> {
        validate_metadata_key(key)?;
        Ok(FilterTarget {
            expression: self.extraction(key),
            kind: TargetKind::JsonText,
        })
    }

    fn select_projection(&self) -> Vec<String> {
        vec![format!("{}::text AS {}", self.column, self.column)]
    }

    fn decode_row(&self, row: &SqlRow) -> std::result::Result<Metadata, DriverError> {
        let document = match row.get_text(&self.column)? {
            Some(document) => document,
            None => return Ok(Metadata::new()),
        };
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&document)
            .map_err(|e| DriverError::Decode(format!("metadata column '{}': {}", self.column, e)))?;

        Ok(object
            .iter()
            .filter_map(|(key, value)| MetadataValue::from_json(value).map(|v| (key.clone(), v)))
            .collect())
    }
}
