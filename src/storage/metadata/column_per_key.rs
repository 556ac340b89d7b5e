// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! One typed column per declared metadata key.

use crate::core::error::{Result, VectorStoreError};
use crate::core::types::{Metadata, MetadataValue};
use crate::query::params::ParamBuffer;
use crate::storage::connection::{DriverError, SqlRow, SqlValue};

use super::{
    check_storable, column_index_name, FilterTarget, MetadataColumn, MetadataColumnType,
    MetadataIndexType, MetadataStorage, MetadataStorageMode, TargetKind,
};

#[derive(Debug, Clone)]
pub struct ColumnPerKeyStorage {
    columns: Vec<MetadataColumn>,
    indexes: Vec<String>,
    index_type: MetadataIndexType,
}

impl ColumnPerKeyStorage {
    /// Columns and indexes must already be validated by
    /// [`MetadataStorageConfig::validate`](super::MetadataStorageConfig::validate).
    pub fn new(
        columns: Vec<MetadataColumn>,
        indexes: Vec<String>,
        index_type: MetadataIndexType,
    ) -> Self {
        Self {
            columns,
            indexes,
            index_type,
        }
    }

    pub fn columns(&self) -> &[MetadataColumn] {
        &self.columns
    }

    fn column(&self, key: &str) -> Option<&MetadataColumn> {
        self.columns.iter().find(|column| column.name == key)
    }

    fn bind_value(column: &MetadataColumn, value: Option<&MetadataValue>) -> Result<SqlValue> {
        let value = match value {
            Some(value) => value,
            None => return Ok(SqlValue::Null(column.column_type.bind_type())),
        };

        match (column.column_type, value) {
            (MetadataColumnType::Text, MetadataValue::String(s)) => Ok(SqlValue::Text(s.clone())),
            (MetadataColumnType::Integer, MetadataValue::Integer(i)) => Ok(SqlValue::BigInt(*i)),
            (MetadataColumnType::Float, MetadataValue::Float(f)) => Ok(SqlValue::Double(*f)),
            (MetadataColumnType::Boolean, MetadataValue::Boolean(b)) => Ok(SqlValue::Boolean(*b)),
            (column_type, value) => Err(VectorStoreError::validation(format!(
                "metadata '{}' is a {} value but the column is {}",
                column.name,
                value.type_name(),
                column_type.sql_type()
            ))),
        }
    }
}

impl MetadataStorage for ColumnPerKeyStorage {
    fn mode(&self) -> MetadataStorageMode {
        MetadataStorageMode::ColumnPerKey
    }

    fn column_ddl(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| format!("{} {} NULL", column.name, column.column_type.sql_type()))
            .collect()
    }

    fn index_ddl(&self, table: &str) -> Vec<String> {
        self.indexes
            .iter()
            .map(|column| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} USING {} ({})",
                    column_index_name(table, column),
                    table,
                    self.index_type.access_method(),
                    column
                )
            })
            .collect()
    }

    fn insert_columns(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    fn bind_insert(&self, metadata: &Metadata, params: &mut ParamBuffer) -> Result<Vec<String>> {
        check_storable(metadata)?;
        if let Some(key) = metadata.keys().find(|key| self.column(key).is_none()) {
            return Err(VectorStoreError::validation(format!(
                "metadata key '{}' is not a declared column",
                key
            )));
        }

        self.columns
            .iter()
            .map(|column| Self::bind_value(column, metadata.get(&column.name)).map(|v| params.push(v)))
            .collect()
    }

    fn filter_target(&self, key: &str) -> Result<FilterTarget> {
        let column = self.column(key).ok_or_else(|| {
            VectorStoreError::validation(format!("filter key '{}' is not a declared metadata column", key))
        })?;
        Ok(FilterTarget {
            expression: column.name.clone(),
            kind: TargetKind::Column(column.column_type),
        })
    }

    fn select_projection(&self) -> Vec<String> {
        self.insert_columns()
    }

    fn decode_row(&self, row: &SqlRow) -> std::result::Result<Metadata, DriverError> {
        let mut metadata = Metadata::new();
        for column in &self.columns {
            let value = match column.column_type {
                MetadataColumnType::Text => row.get_text(&column.name)?.map(MetadataValue::String),
                MetadataColumnType::Integer => row.get_i64(&column.name)?.map(MetadataValue::Integer),
                MetadataColumnType::Float => row.get_f64(&column.name)?.map(MetadataValue::Float),
                MetadataColumnType::Boolean => match row.get(&column.name) {
                    Some(SqlValue::Boolean(b)) => Some(MetadataValue::Boolean(*b)),
                    Some(SqlValue::Null(_)) => None,
                    Some(other) => {
                        return Err(DriverError::Decode(format!(
                            "column '{}' is {:?}, expected boolean",
                            column.name,
                            other.sql_type()
                        )))
                    }
                    None => {
                        return Err(DriverError::Decode(format!("missing column '{}'", column.name)))
                    }
                },
            };
            if let Some(value) = value {
                metadata.insert(column.name.clone(), value);
            }
        }
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::connection::SqlType;

    fn storage() -> ColumnPerKeyStorage {
        ColumnPerKeyStorage::new(
            vec![
                MetadataColumn::text("genre"),
                MetadataColumn::integer("year"),
                MetadataColumn::float("rating"),
                MetadataColumn::boolean("published"),
            ],
            vec!["genre".to_string(), "year".to_string()],
            MetadataIndexType::Hash,
        )
    }

    #[test]
    fn test_ddl() {
        let storage = storage();
        assert_eq!(
            storage.column_ddl(),
            vec![
                "genre TEXT NULL",
                "year BIGINT NULL",
                "rating DOUBLE PRECISION NULL",
                "published BOOLEAN NULL",
            ]
        );
        assert_eq!(
            storage.index_ddl("items"),
            vec![
                "CREATE INDEX IF NOT EXISTS items_genre_idx ON items USING hash (genre)",
                "CREATE INDEX IF NOT EXISTS items_year_idx ON items USING hash (year)",
            ]
        );
    }

    #[test]
    fn test_insert_binds_declared_columns_in_order() {
        let storage = storage();
        let mut metadata = Metadata::new();
        metadata.insert("year".to_string(), MetadataValue::Integer(1999));
        metadata.insert("genre".to_string(), MetadataValue::from("comedy"));
        metadata.insert("rating".to_string(), MetadataValue::Float(4.0));

        let mut params = ParamBuffer::starting_at(4);
        let placeholders = storage.bind_insert(&metadata, &mut params).unwrap();
        assert_eq!(placeholders, vec!["$4", "$5", "$6", "$7"]);
        assert_eq!(
            params.values(),
            &[
                SqlValue::Text("comedy".to_string()),
                SqlValue::BigInt(1999),
                SqlValue::Double(4.0),
                SqlValue::Null(SqlType::Boolean),
            ]
        );
    }

    #[test]
    fn test_insert_rejects_undeclared_and_mistyped_values() {
        let storage = storage();
        let mut params = ParamBuffer::new();

        let mut metadata = Metadata::new();
        metadata.insert("author".to_string(), MetadataValue::from("x"));
        assert!(storage.bind_insert(&metadata, &mut params).unwrap_err().is_validation());

        let mut metadata = Metadata::new();
        metadata.insert("year".to_string(), MetadataValue::Float(1999.5));
        assert!(storage.bind_insert(&metadata, &mut params).unwrap_err().is_validation());

        // A float column would hand an integer back as Float.
        let mut metadata = Metadata::new();
        metadata.insert("rating".to_string(), MetadataValue::Integer(4));
        assert!(storage.bind_insert(&metadata, &mut params).unwrap_err().is_validation());
    }

    #[test]
    fn test_bound_metadata_decodes_to_the_same_map() {
        let storage = storage();
        let mut metadata = Metadata::new();
        metadata.insert("genre".to_string(), MetadataValue::from("comedy"));
        metadata.insert("year".to_string(), MetadataValue::Integer(1999));
        metadata.insert("rating".to_string(), MetadataValue::Float(4.0));

        let mut params = ParamBuffer::new();
        storage.bind_insert(&metadata, &mut params).unwrap();
        let row = storage
            .insert_columns()
            .into_iter()
            .zip(params.values().iter().cloned())
            .fold(SqlRow::new(), |row, (column, value)| row.with(column, value));

        assert_eq!(storage.decode_row(&row).unwrap(), metadata);
    }

    #[test]
    fn test_filter_target_requires_declared_column() {
        let storage = storage();
        assert_eq!(
            storage.filter_target("year").unwrap(),
            FilterTarget {
                expression: "year".to_string(),
                kind: TargetKind::Column(MetadataColumnType::Integer),
            }
        );
        assert!(storage.filter_target("author").unwrap_err().is_validation());
    }

    #[test]
    fn test_decode_skips_nulls() {
        let storage = storage();
        let row = SqlRow::new()
            .with("genre", SqlValue::from("drama"))
            .with("year", SqlValue::Null(SqlType::BigInt))
            .with("rating", SqlValue::Double(3.5))
            .with("published", SqlValue::Boolean(true));

        let metadata = storage.decode_row(&row).unwrap();
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata["genre"], MetadataValue::from("drama"));
        assert_eq!(metadata["rating"], MetadataValue::Float(3.5));
        assert_eq!(metadata["published"], MetadataValue::Boolean(true));
    }
}
