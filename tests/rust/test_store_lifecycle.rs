//! Store lifecycle tests against the in-memory recording provider

use super::common::*;
use anyhow::Result;
use proximadb_pgvector::storage::connection::{DriverError, SqlRow, SqlValue};
use proximadb_pgvector::{
    EmbeddingStore, HnswConfig, MetadataColumn, MetadataFilter, MetadataStorageConfig,
    MetadataValue, PerformanceConfig, RecordingConnectionProvider, SearchRequest, StoreConfig,
    TableSchema, TableState, VectorIndexConfig,
};
use std::sync::Arc;

#[cfg(test)]
mod store_lifecycle_tests {
    use super::*;

    async fn open(provider: &RecordingConnectionProvider, schema: TableSchema) -> Result<EmbeddingStore> {
        Ok(EmbeddingStore::new(schema, Arc::new(provider.clone()), PerformanceConfig::default()).await?)
    }

    #[tokio::test]
    async fn test_concurrent_startup_converges() -> Result<()> {
        init_test_env();
        let provider = RecordingConnectionProvider::new().rewrite_access_method("hnsw", "ybhnsw");
        let schema = TableSchema::builder("shared").dimension(8).build()?;

        let stores = futures::future::try_join_all(
            (0..4).map(|_| open(&provider, schema.clone())),
        )
        .await?;

        for store in &stores {
            assert_eq!(store.table_state().await, TableState::Ready);
        }
        assert_eq!(provider.tables().len(), 1);
        assert_eq!(
            provider.index_names().iter().filter(|n| n.ends_with("_hnsw_idx")).count(),
            1
        );
        assert_eq!(provider.outstanding_connections(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_from_config_file_settings() -> Result<()> {
        init_test_env();
        let config = StoreConfig::from_toml_str(
            r#"
            [connection]
            database_url = "postgres://localhost/unused"

            [table]
            name = "films"
            dimension = 4
            metric = "EUCLIDEAN"

            [table.metadata]
            mode = "COLUMN_PER_KEY"
            indexes = ["year"]

            [[table.metadata.columns]]
            name = "genre"
            type = "TEXT"

            [[table.metadata.columns]]
            name = "year"
            type = "INTEGER"

            [table.index]
            type = "none"
            "#,
        )?;

        let provider = RecordingConnectionProvider::new();
        let store = EmbeddingStore::new(
            config.table_schema()?,
            Arc::new(provider.clone()),
            config.performance.clone(),
        )
        .await?;

        assert!(provider.index_names().contains("films_year_idx"));
        assert!(!provider.executed_sql().iter().any(|sql| sql.contains("USING hnsw")));

        provider.clear_log();
        store
            .search(
                &SearchRequest::new(unit_vector(4, 0), 3)
                    .filter(MetadataFilter::gte("year", 1990).and(MetadataFilter::ne("genre", "noir"))),
            )
            .await?;
        let sql = &provider.statements()[0].sql;
        assert!(sql.contains("WHERE (year >= $2 AND (genre IS NULL OR genre != $3))"));
        assert!(sql.contains("ORDER BY embedding <-> $1::vector LIMIT $4"));

        let err = store
            .search(&SearchRequest::new(unit_vector(4, 0), 3).filter(MetadataFilter::eq("author", "x")))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        Ok(())
    }

    #[tokio::test]
    async fn test_search_decodes_rows_in_backend_order() -> Result<()> {
        init_test_env();
        let provider = RecordingConnectionProvider::new();
        let store = open(&provider, TableSchema::builder("items").dimension(4).build()?).await?;

        provider.push_rows(vec![
            SqlRow::new()
                .with("id", SqlValue::from("a"))
                .with("embedding", SqlValue::from("[1,0,0,0]"))
                .with("text", SqlValue::from("a"))
                .with("metadata", SqlValue::from(r#"{"genre":"comedy","year":2001}"#))
                .with("score", SqlValue::Double(1.0)),
            SqlRow::new()
                .with("id", SqlValue::from("b"))
                .with("embedding", SqlValue::from("[0.5,0.5,0,0]"))
                .with("text", SqlValue::from("b"))
                .with("metadata", SqlValue::from("{}"))
                .with("score", SqlValue::Double(0.7)),
        ]);

        let matches = store.search(&SearchRequest::new(unit_vector(4, 0), 2)).await?;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert_eq!(matches[0].metadata["year"], MetadataValue::Integer(2001));
        assert!(matches[1].metadata.is_empty());
        assert!(matches[0].score >= matches[1].score);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_rows_surface_as_query_errors() -> Result<()> {
        init_test_env();
        let provider = RecordingConnectionProvider::new();
        let store = open(&provider, TableSchema::builder("items").dimension(4).build()?).await?;

        provider.push_rows(vec![SqlRow::new()
            .with("id", SqlValue::from("a"))
            .with("embedding", SqlValue::from("not a vector"))
            .with("text", SqlValue::from("a"))
            .with("metadata", SqlValue::from("{}"))
            .with("score", SqlValue::Double(1.0))]);

        let err = store
            .search(&SearchRequest::new(unit_vector(4, 0), 1))
            .await
            .unwrap_err();
        assert!(err.is_query());
        Ok(())
    }

    #[tokio::test]
    async fn test_ef_search_and_stats() -> Result<()> {
        init_test_env();
        let provider = RecordingConnectionProvider::new();
        let schema = TableSchema::builder("items")
            .dimension(4)
            .index(VectorIndexConfig::Hnsw(HnswConfig::default().with_m(8).with_ef_search(64)))
            .build()?;
        let store = open(&provider, schema).await?;

        store
            .add_all(
                None,
                vec![unit_vector(4, 0), unit_vector(4, 1)],
                vec!["a".to_string(), "b".to_string()],
                vec![
                    metadata(&[("genre", MetadataValue::from("comedy"))]),
                    metadata(&[("genre", MetadataValue::from("drama"))]),
                ],
            )
            .await?;
        store.search(&SearchRequest::new(unit_vector(4, 0), 1)).await?;

        let transactions = provider.transactions();
        assert!(transactions
            .iter()
            .any(|tx| tx[0].sql == "SET LOCAL hnsw.ef_search = 64"));

        let stats = store.stats().await;
        assert_eq!(stats.rows_inserted, 2);
        assert_eq!(stats.failed_queries, 0);
        assert!(stats.avg_query_time_ms >= 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_backend_outage_is_a_connection_error() -> Result<()> {
        init_test_env();
        let provider = RecordingConnectionProvider::new();
        provider.set_acquire_failure(Some(DriverError::Unavailable("connection refused".to_string())));

        let err = EmbeddingStore::new(
            TableSchema::builder("items").dimension(4).build()?,
            Arc::new(provider.clone()),
            PerformanceConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(err.is_connection());
        assert!(err.to_string().contains("ensure_schema on items"));
        Ok(())
    }

    #[tokio::test]
    async fn test_illegal_metadata_config_never_connects() -> Result<()> {
        init_test_env();
        let err = MetadataStorageConfig::combined_json().index("genre").build().unwrap_err();
        assert!(err.is_configuration());

        let err = TableSchema::builder("items")
            .dimension(4)
            .metadata(MetadataStorageConfig {
                indexes: vec!["genre".to_string()],
                ..MetadataStorageConfig::combined_json().build()?
            })
            .build()
            .unwrap_err();
        assert!(err.is_configuration());

        let err = MetadataStorageConfig::column_per_key(vec![MetadataColumn::text("genre")])
            .index("year")
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
        Ok(())
    }
}
