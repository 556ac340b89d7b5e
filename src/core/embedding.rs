// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Embedding function collaborator.
//!
//! The store never computes embeddings itself; callers plug in a model that maps
//! text to a fixed-length vector.

use async_trait::async_trait;

use crate::core::error::{Result, VectorStoreError};
use crate::core::types::Vector;

const DIMENSION_PROBE_TEXT: &str = "dimension probe";

/// Maps text to a fixed-length `f32` vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vector>;
}

/// Determine a model's output dimension from one observed embedding.
pub async fn probe_dimension(embedder: &dyn Embedder) -> Result<usize> {
    let vector = embedder.embed(DIMENSION_PROBE_TEXT).await?;
    if vector.is_empty() {
        return Err(VectorStoreError::validation(
            "embedder returned an empty vector",
        ));
    }
    tracing::debug!("📐 Probed embedding dimension: {}", vector.len());
    Ok(vector.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder(usize);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vector> {
            Ok(vec![0.5; self.0])
        }
    }

    #[tokio::test]
    async fn test_probe_dimension() {
        assert_eq!(probe_dimension(&FixedEmbedder(384)).await.unwrap(), 384);
        assert!(probe_dimension(&FixedEmbedder(0)).await.unwrap_err().is_validation());
    }
}
