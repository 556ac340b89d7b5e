// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::core::error::{Result, VectorStoreError};

pub type VectorId = String;
pub type Vector = Vec<f32>;

/// Per-record metadata: string keys to tagged scalars.
pub type Metadata = HashMap<String, MetadataValue>;

/// Scalar metadata value.
///
/// The tag drives how filters are rendered (numeric cast vs. text comparison),
/// so callers never rely on runtime type inspection of an untyped value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    /// Text form as produced by JSON `->>` extraction.
    pub fn to_text(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
        }
    }

    /// Convert from a JSON value. Only scalars are accepted; `null` yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Similarity function used to rank vectors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DistanceMetric {
    #[serde(rename = "COSINE")]
    Cosine,
    #[serde(rename = "EUCLIDEAN")]
    Euclidean,
    #[serde(rename = "DOT_PRODUCT")]
    DotProduct,
}

impl DistanceMetric {
    /// pgvector distance operator used in `ORDER BY`.
    pub fn distance_operator(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::Euclidean => "<->",
            DistanceMetric::DotProduct => "<#>",
        }
    }

    /// pgvector operator class for index creation.
    pub fn operator_class(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "vector_cosine_ops",
            DistanceMetric::Euclidean => "vector_l2_ops",
            DistanceMetric::DotProduct => "vector_ip_ops",
        }
    }

    /// SQL expression turning a raw distance expression into a score where
    /// higher always means more similar.
    pub fn score_expression(&self, distance: &str) -> String {
        match self {
            // <=> is 1 - cosine similarity
            DistanceMetric::Cosine => format!("(1 - ({}))", distance),
            DistanceMetric::Euclidean => format!("(1 / (1 + ({})))", distance),
            // <#> is the negated inner product
            DistanceMetric::DotProduct => format!("(-({}))", distance),
        }
    }

    /// Client-side counterpart of [`score_expression`](Self::score_expression).
    pub fn distance_to_score(&self, distance: f64) -> f64 {
        match self {
            DistanceMetric::Cosine => 1.0 - distance,
            DistanceMetric::Euclidean => 1.0 / (1.0 + distance),
            DistanceMetric::DotProduct => -distance,
        }
    }
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Cosine
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistanceMetric::Cosine => "COSINE",
            DistanceMetric::Euclidean => "EUCLIDEAN",
            DistanceMetric::DotProduct => "DOT_PRODUCT",
        };
        f.write_str(name)
    }
}

/// One stored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: VectorId,
    pub vector: Vector,
    pub text: String,
    pub metadata: Metadata,
}

impl EmbeddingRecord {
    /// Build a record with a freshly generated UUID.
    pub fn new(vector: Vector, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            text: text.into(),
            metadata,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Search hit returned by the store, ordered by descending score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatch {
    pub id: VectorId,
    pub vector: Vector,
    pub text: String,
    pub metadata: Metadata,
    /// Similarity score (higher = more similar)
    pub score: f64,
}

/// Encode a vector as a pgvector text literal, e.g. `[1,0.5,-2]`.
pub fn encode_vector(vector: &[f32]) -> String {
    let values: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

/// Decode a pgvector text literal.
pub fn decode_vector(literal: &str) -> Result<Vector> {
    let inner = literal
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| VectorStoreError::validation(format!("malformed vector literal of length {}", literal.len())))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|component| {
            component
                .trim()
                .parse::<f32>()
                .map_err(|_| VectorStoreError::validation("malformed vector component"))
        })
        .collect()
}
