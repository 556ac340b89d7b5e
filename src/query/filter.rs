// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Metadata filter expression tree.
//!
//! Filters are built programmatically (there is no textual DSL) and handed to
//! the [`FilterCompiler`](super::FilterCompiler).

use serde::{Deserialize, Serialize};
use std::ops::Not;

use crate::core::types::MetadataValue;

/// Boolean predicate over metadata keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataFilter {
    /// Single key condition
    Field {
        key: String,
        condition: FieldCondition,
    },

    /// Logical AND of all children
    And(Vec<MetadataFilter>),

    /// Logical OR of all children
    Or(Vec<MetadataFilter>),

    /// Logical NOT
    Not(Box<MetadataFilter>),
}

/// Comparison applied to one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCondition {
    Equals(MetadataValue),
    NotEquals(MetadataValue),
    GreaterThan(MetadataValue),
    GreaterThanOrEqual(MetadataValue),
    LessThan(MetadataValue),
    LessThanOrEqual(MetadataValue),
    In(Vec<MetadataValue>),
    NotIn(Vec<MetadataValue>),
}

impl MetadataFilter {
    pub fn field(key: impl Into<String>, condition: FieldCondition) -> Self {
        Self::Field {
            key: key.into(),
            condition,
        }
    }

    pub fn eq(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::field(key, FieldCondition::Equals(value.into()))
    }

    pub fn ne(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::field(key, FieldCondition::NotEquals(value.into()))
    }

    pub fn gt(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::field(key, FieldCondition::GreaterThan(value.into()))
    }

    pub fn gte(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::field(key, FieldCondition::GreaterThanOrEqual(value.into()))
    }

    pub fn lt(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::field(key, FieldCondition::LessThan(value.into()))
    }

    pub fn lte(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::field(key, FieldCondition::LessThanOrEqual(value.into()))
    }

    pub fn is_in<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<MetadataValue>,
    {
        Self::field(key, FieldCondition::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn not_in<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<MetadataValue>,
    {
        Self::field(key, FieldCondition::NotIn(values.into_iter().map(Into::into).collect()))
    }

    pub fn and(self, other: MetadataFilter) -> Self {
        Self::And(vec![self, other])
    }

    pub fn or(self, other: MetadataFilter) -> Self {
        Self::Or(vec![self, other])
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Keys referenced anywhere in the tree, in visiting order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, keys: &mut Vec<&'a str>) {
        match self {
            Self::Field { key, .. } => keys.push(key.as_str()),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_keys(keys);
                }
            }
            Self::Not(child) => child.collect_keys(keys),
        }
    }
}

impl Not for MetadataFilter {
    type Output = MetadataFilter;

    fn not(self) -> Self::Output {
        self.negate()
    }
}
