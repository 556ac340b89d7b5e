//! Live PostgreSQL/YugabyteDB tests
//!
//! Each test returns early unless `PROXIMADB_TEST_DATABASE_URL` points at a
//! database with the pgvector extension available.

use super::common::*;
use anyhow::Result;
use proximadb_pgvector::{
    DistanceMetric, EmbeddingStore, MetadataColumn, MetadataFilter, MetadataStorageConfig,
    MetadataValue, PerformanceConfig, PgConnectionProvider, SearchRequest, TableSchema,
    VectorIndexConfig,
};
use std::sync::Arc;

#[cfg(test)]
mod live_pgvector_tests {
    use super::*;

    async fn open(provider: &PgConnectionProvider, schema: TableSchema) -> Result<EmbeddingStore> {
        Ok(EmbeddingStore::new(schema, Arc::new(provider.clone()), PerformanceConfig::default()).await?)
    }

    fn storage_modes() -> Result<Vec<MetadataStorageConfig>> {
        Ok(vec![
            MetadataStorageConfig::column_per_key(vec![
                MetadataColumn::text("genre"),
                MetadataColumn::integer("year"),
                MetadataColumn::float("rating"),
                MetadataColumn::boolean("published"),
            ])
            .index("genre")
            .build()?,
            MetadataStorageConfig::combined_json().build()?,
            MetadataStorageConfig::combined_jsonb().index("genre").build()?,
        ])
    }

    #[tokio::test]
    async fn test_round_trip_in_every_mode() -> Result<()> {
        init_test_env();
        let provider = match live_provider().await {
            Some(provider) => provider,
            None => return Ok(()),
        };

        for storage in storage_modes()? {
            let table = generate_test_table_name();
            let schema = TableSchema::builder(table.as_str())
                .dimension(4)
                .metadata(storage.clone())
                .build()?;
            let store = open(&provider, schema).await?;

            let md = metadata(&[
                ("genre", MetadataValue::from("comedy")),
                ("year", MetadataValue::Integer(1999)),
                ("rating", MetadataValue::Float(4.5)),
                ("published", MetadataValue::Boolean(true)),
            ]);
            let vector = vec![0.1, 0.2, 0.3, 0.4];
            store.add(vector.clone(), "round trip", md.clone()).await?;
            store.add(unit_vector(4, 3), "other", metadata(&[])).await?;

            let matches = store.search(&SearchRequest::new(vector.clone(), 1)).await?;
            assert_eq!(matches.len(), 1, "mode {}", storage.mode);
            assert_eq!(matches[0].text, "round trip");
            assert_eq!(matches[0].metadata, md, "mode {}", storage.mode);
            assert_eq!(matches[0].vector, vector);
            assert!((matches[0].score - 1.0).abs() < 1e-5);

            drop_table(&provider, &table).await;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_genre_scenario() -> Result<()> {
        init_test_env();
        let provider = match live_provider().await {
            Some(provider) => provider,
            None => return Ok(()),
        };

        let table = generate_test_table_name();
        let schema = TableSchema::builder(table.as_str())
            .dimension(4)
            .metric(DistanceMetric::Cosine)
            .metadata(MetadataStorageConfig::combined_jsonb().build()?)
            .build()?;
        let store = open(&provider, schema).await?;

        store
            .add(vec![1.0, 0.0, 0.0, 0.0], "a", metadata(&[("genre", MetadataValue::from("comedy"))]))
            .await?;
        store
            .add(vec![0.0, 1.0, 0.0, 0.0], "b", metadata(&[("genre", MetadataValue::from("drama"))]))
            .await?;

        let matches = store
            .search(
                &SearchRequest::new(vec![1.0, 0.0, 0.0, 0.0], 2)
                    .filter(MetadataFilter::eq("genre", "comedy")),
            )
            .await?;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "a");

        // Orthogonal vector scores 0 under cosine and is cut by the threshold.
        let matches = store
            .search(&SearchRequest::new(vec![1.0, 0.0, 0.0, 0.0], 2).min_score(0.5))
            .await?;
        assert_eq!(matches.len(), 1);

        drop_table(&provider, &table).await;
        Ok(())
    }

    #[tokio::test]
    async fn test_injection_leaves_rows_intact() -> Result<()> {
        init_test_env();
        let provider = match live_provider().await {
            Some(provider) => provider,
            None => return Ok(()),
        };

        for storage in storage_modes()? {
            let table = generate_test_table_name();
            let schema = TableSchema::builder(table.as_str())
                .dimension(4)
                .metadata(storage.clone())
                .build()?;
            let store = open(&provider, schema).await?;
            store
                .add(unit_vector(4, 0), "a", metadata(&[("genre", MetadataValue::from("comedy"))]))
                .await?;
            store
                .add(unit_vector(4, 1), "b", metadata(&[("genre", MetadataValue::from("drama"))]))
                .await?;
            let before = store.count().await?;

            for payload in [
                format!("'; DROP TABLE {}; --", table),
                "' OR '1'='1".to_string(),
                "comedy' OR 'a'='a".to_string(),
            ] {
                let result = store
                    .search(
                        &SearchRequest::new(unit_vector(4, 0), 10)
                            .filter(MetadataFilter::eq("genre", payload.as_str())),
                    )
                    .await;
                match result {
                    Ok(matches) => assert!(matches.is_empty(), "mode {}", storage.mode),
                    Err(e) => assert!(e.is_query()),
                }
            }

            assert_eq!(store.count().await?, before);
            drop_table(&provider, &table).await;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_keys_follow_null_policy() -> Result<()> {
        init_test_env();
        let provider = match live_provider().await {
            Some(provider) => provider,
            None => return Ok(()),
        };

        for storage in storage_modes()? {
            let table = generate_test_table_name();
            let schema = TableSchema::builder(table.as_str())
                .dimension(4)
                .metadata(storage.clone())
                .index(VectorIndexConfig::None)
                .build()?;
            let store = open(&provider, schema).await?;
            store.add_with_id("bare", unit_vector(4, 0), "no genre", metadata(&[])).await?;

            let query = || SearchRequest::new(unit_vector(4, 0), 5);
            let equals = store
                .search(&query().filter(MetadataFilter::eq("genre", "comedy")))
                .await?;
            assert!(equals.is_empty(), "mode {}", storage.mode);

            let not_equals = store
                .search(&query().filter(MetadataFilter::ne("genre", "comedy")))
                .await?;
            assert_eq!(not_equals.len(), 1, "mode {}", storage.mode);

            let not_in = store
                .search(&query().filter(MetadataFilter::not_in("genre", ["comedy", "drama"])))
                .await?;
            assert_eq!(not_in.len(), 1, "mode {}", storage.mode);

            drop_table(&provider, &table).await;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_in_filter_and_removals() -> Result<()> {
        init_test_env();
        let provider = match live_provider().await {
            Some(provider) => provider,
            None => return Ok(()),
        };

        let table = generate_test_table_name();
        let schema = TableSchema::builder(table.as_str())
            .dimension(4)
            .metric(DistanceMetric::Euclidean)
            .build()?;
        let store = open(&provider, schema).await?;

        let genres = ["x", "y", "z", "w"];
        let ids = store
            .add_all(
                None,
                (0..4).map(|axis| unit_vector(4, axis)).collect(),
                genres.iter().map(|g| g.to_string()).collect(),
                genres
                    .iter()
                    .map(|g| metadata(&[("genre", MetadataValue::from(*g))]))
                    .collect(),
            )
            .await?;
        assert_eq!(ids.len(), 4);

        for order in [["x", "y", "z"], ["z", "y", "x"], ["y", "x", "z"]] {
            let matches = store
                .search(&SearchRequest::new(unit_vector(4, 0), 10).filter(MetadataFilter::is_in("genre", order)))
                .await?;
            let mut texts: Vec<String> = matches.into_iter().map(|m| m.text).collect();
            texts.sort();
            assert_eq!(texts, vec!["x", "y", "z"]);
        }

        assert!(store.remove(&ids[0]).await?);
        assert!(!store.remove(&ids[0]).await?);
        assert_eq!(store.remove_all_matching(&MetadataFilter::eq("genre", "w")).await?, 1);
        assert_eq!(store.remove_all(&ids[1..2]).await?, 1);
        assert_eq!(store.count().await?, 1);
        assert_eq!(store.clear().await?, 1);
        assert_eq!(store.count().await?, 0);
        assert!(store.health_check().await?);

        drop_table(&provider, &table).await;
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_schema_creation() -> Result<()> {
        init_test_env();
        let provider = match live_provider().await {
            Some(provider) => provider,
            None => return Ok(()),
        };

        let table = generate_test_table_name();
        let schema = TableSchema::builder(table.as_str()).dimension(4).build()?;
        let stores = futures::future::try_join_all((0..4).map(|_| open(&provider, schema.clone()))).await?;
        for store in &stores {
            store.ensure_schema().await?;
        }
        assert_eq!(stores[0].count().await?, 0);

        drop_table(&provider, &table).await;
        Ok(())
    }
}
