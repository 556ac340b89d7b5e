// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

use crate::storage::connection::SqlValue;

/// Ordered bind values with their `$n` placeholders.
///
/// Every value pushed gets the next placeholder number, so the rendered SQL and
/// the parameter list can never drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBuffer {
    first: usize,
    values: Vec<SqlValue>,
}

impl Default for ParamBuffer {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl ParamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering at `$first` (placeholders are 1-based).
    pub fn starting_at(first: usize) -> Self {
        Self {
            first: first.max(1),
            values: Vec::new(),
        }
    }

    /// Bind a value, returning its placeholder.
    pub fn push(&mut self, value: SqlValue) -> String {
        let placeholder = format!("${}", self.next_index());
        self.values.push(value);
        placeholder
    }

    /// Number the next pushed value will receive.
    pub fn next_index(&self) -> usize {
        self.first + self.values.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}
