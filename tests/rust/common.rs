//! Common utilities for integration tests

use proximadb_pgvector::{
    ConnectionConfig, Metadata, MetadataValue, PgConnectionProvider, PoolConfig,
};
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Environment variable naming the live database used by the live suite.
pub const DATABASE_URL_VAR: &str = "PROXIMADB_TEST_DATABASE_URL";

/// Initialize test environment
pub fn init_test_env() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Generate unique table name for testing
pub fn generate_test_table_name() -> String {
    // Short enough that derived index names stay within 63 characters.
    let suffix = Uuid::new_v4().simple().to_string();
    format!("test_emb_{}", &suffix[..12])
}

/// Build metadata from literal pairs
pub fn metadata(pairs: &[(&str, MetadataValue)]) -> Metadata {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// Unit vector along `axis`
pub fn unit_vector(dimension: usize, axis: usize) -> Vec<f32> {
    (0..dimension)
        .map(|i| if i == axis { 1.0 } else { 0.0 })
        .collect()
}

/// Live database pool, or `None` when no database is configured.
pub async fn live_provider() -> Option<PgConnectionProvider> {
    let database_url = match std::env::var(DATABASE_URL_VAR) {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            tracing::info!("⏭️ {} not set, skipping live test", DATABASE_URL_VAR);
            return None;
        }
    };

    let config = ConnectionConfig {
        database_url,
        pool: PoolConfig {
            max_connections: 5,
            connect_timeout_secs: 10,
            ..PoolConfig::default()
        },
    };
    match PgConnectionProvider::connect(&config).await {
        Ok(provider) => Some(provider),
        Err(e) => panic!("{} is set but the database is unreachable: {}", DATABASE_URL_VAR, e),
    }
}

/// Drop a table created by a live test.
pub async fn drop_table(provider: &PgConnectionProvider, table: &str) {
    use proximadb_pgvector::storage::connection::{ConnectionProvider, Statement};

    if let Ok(mut conn) = provider.acquire().await {
        let _ = conn
            .execute(&Statement::raw(format!("DROP TABLE IF EXISTS {}", table)))
            .await;
    }
}
