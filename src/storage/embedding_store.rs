// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Embedding Store
//!
//! Façade over one pgvector table. Composes the table schema, the metadata
//! storage strategy, the filter compiler and the vector index strategy with a
//! pooled [`ConnectionProvider`].
//!
//! Every operation acquires one connection, bounds the round trip with the
//! configured query timeout and releases the connection on every exit path,
//! including when the caller drops the future.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

use crate::core::config::{PerformanceConfig, StoreConfig};
use crate::core::embedding::Embedder;
use crate::core::error::{Result, VectorStoreError};
use crate::core::types::{
    decode_vector, encode_vector, EmbeddingMatch, EmbeddingRecord, Metadata, Vector, VectorId,
};
use crate::index::{VectorIndex, VectorIndexFactory};
use crate::query::{FilterCompiler, MetadataFilter, ParamBuffer};
use crate::schema::{TableSchema, EMBEDDING_COLUMN, ID_COLUMN, SCORE_COLUMN, TEXT_COLUMN};
use crate::storage::connection::{
    Connection, ConnectionProvider, DriverError, DriverResult, PgConnectionProvider, SqlRow,
    SqlValue, Statement,
};
use crate::storage::metadata::{MetadataStorage, MetadataStorageFactory};

/// SQLSTATEs raised when concurrent `IF NOT EXISTS` DDL loses a race:
/// duplicate_table, duplicate_object, unique_violation on the catalog.
const DDL_RACE_SQLSTATES: [&str; 3] = ["42P07", "42710", "23505"];

/// PostgreSQL wire protocol limit on bind parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// Table readiness. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableState {
    Uninitialized,
    TableCreated,
    IndexCreated,
    Ready,
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_queries: u64,
    pub failed_queries: u64,
    pub avg_query_time_ms: f64,
    pub rows_inserted: u64,
    pub rows_deleted: u64,
}

/// Similarity search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Vector,
    pub max_results: usize,
    /// Only matches scoring at least this much are returned
    pub min_score: Option<f64>,
    pub filter: Option<MetadataFilter>,
}

impl SearchRequest {
    pub fn new(query: Vector, max_results: usize) -> Self {
        Self {
            query,
            max_results,
            min_score: None,
            filter: None,
        }
    }

    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

pub struct EmbeddingStore {
    schema: TableSchema,
    metadata: Box<dyn MetadataStorage>,
    index: Box<dyn VectorIndex>,
    provider: Arc<dyn ConnectionProvider>,
    performance: PerformanceConfig,
    state: Mutex<TableState>,
    stats: RwLock<StoreStats>,
}

impl std::fmt::Debug for EmbeddingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingStore")
            .field("table", &self.schema.table_name())
            .field("provider", &self.provider.provider_name())
            .field("metadata", &self.metadata)
            .field("index", &self.index)
            .finish()
    }
}

impl EmbeddingStore {
    /// Build the store. Storage and index strategies are selected here, so
    /// configuration errors surface before any connection is acquired. When
    /// the schema asks for it, the table and its indexes are created.
    pub async fn new(
        schema: TableSchema,
        provider: Arc<dyn ConnectionProvider>,
        performance: PerformanceConfig,
    ) -> Result<Self> {
        performance.validate()?;
        let metadata = MetadataStorageFactory::create(schema.metadata())?;
        let index = VectorIndexFactory::create(schema.index(), schema.table_name(), schema.metric());

        let store = Self {
            schema,
            metadata,
            index,
            provider,
            performance,
            state: Mutex::new(TableState::Uninitialized),
            stats: RwLock::new(StoreStats::default()),
        };

        tracing::info!(
            "🚀 Embedding store for '{}' (dimension={}, metric={}, metadata={}, provider={})",
            store.schema.table_name(),
            store.schema.dimension(),
            store.schema.metric(),
            store.metadata.mode(),
            store.provider.provider_name()
        );

        if store.schema.create_if_not_exists() {
            store.ensure_schema().await?;
        }
        Ok(store)
    }

    /// Validate the configuration, open a PostgreSQL pool and build the store.
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let schema = config.table_schema()?;
        let provider = PgConnectionProvider::connect(&config.connection).await?;
        Self::new(schema, Arc::new(provider), config.performance.clone()).await
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn metadata_storage(&self) -> &dyn MetadataStorage {
        self.metadata.as_ref()
    }

    pub fn vector_index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub async fn table_state(&self) -> TableState {
        *self.state.lock().await
    }

    pub async fn stats(&self) -> StoreStats {
        self.stats.read().await.clone()
    }

    fn table(&self) -> &str {
        self.schema.table_name()
    }

    fn create_table_ddl(&self) -> String {
        let mut columns = vec![
            format!("{} TEXT PRIMARY KEY", ID_COLUMN),
            format!("{} vector({}) NOT NULL", EMBEDDING_COLUMN, self.schema.dimension()),
            format!("{} TEXT", TEXT_COLUMN),
        ];
        columns.extend(self.metadata.column_ddl());
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table(),
            columns.join(", ")
        )
    }

    /// Create the table, the vector index and the metadata indexes if they
    /// do not exist. Safe to call repeatedly and from concurrent stores: all
    /// DDL is `IF NOT EXISTS` and lost creation races are absorbed.
    #[tracing::instrument(skip_all, fields(table = %self.schema.table_name(), operation = "ensure_schema"))]
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state == TableState::Ready {
            return Ok(());
        }

        if *state == TableState::Uninitialized {
            self.run_ddl(Statement::raw("CREATE EXTENSION IF NOT EXISTS vector")).await?;
            self.run_ddl(Statement::raw(self.create_table_ddl())).await?;
            *state = TableState::TableCreated;
            tracing::debug!("📋 Table '{}' ensured", self.table());
        }

        if *state == TableState::TableCreated {
            if let Some(ddl) = self.index.create_index_ddl() {
                self.run_ddl(Statement::raw(ddl)).await?;
                self.verify_vector_index().await?;
            }
            *state = TableState::IndexCreated;
        }

        for ddl in self.metadata.index_ddl(self.table()) {
            self.run_ddl(Statement::raw(ddl)).await?;
        }
        *state = TableState::Ready;

        tracing::info!("✅ Schema ready for '{}'", self.table());
        Ok(())
    }

    async fn run_ddl(&self, statement: Statement) -> Result<()> {
        match self.execute("ensure_schema", &statement).await {
            Ok(_) => Ok(()),
            Err(e) if e.sqlstate().map_or(false, |code| DDL_RACE_SQLSTATES.contains(&code)) => {
                tracing::debug!(
                    "🔄 Concurrent DDL already created the object (sqlstate {}): {}",
                    e.sqlstate().unwrap_or_default(),
                    statement.sql
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Read the index back from the catalog. Either HNSW spelling counts,
    /// since YugabyteDB rewrites `hnsw` to `ybhnsw`.
    async fn verify_vector_index(&self) -> Result<()> {
        let descriptor = match self.index.descriptor() {
            Some(descriptor) => descriptor,
            None => return Ok(()),
        };

        // Unquoted identifiers are folded to lower case in the catalog. The
        // table is created unqualified, so it lives in the current schema.
        let statement = Statement::new(
            "SELECT indexdef FROM pg_indexes \
             WHERE schemaname = current_schema() AND tablename = $1 AND indexname = $2",
            vec![
                SqlValue::Text(self.table().to_lowercase()),
                SqlValue::Text(descriptor.name.to_lowercase()),
            ],
        );
        let rows = self.fetch("ensure_schema", &statement).await?;

        let definition = rows
            .first()
            .map(|row| row.get_text("indexdef"))
            .transpose()
            .map_err(|e| VectorStoreError::from_driver(e, "ensure_schema", self.table(), &statement.sql))?
            .flatten()
            .ok_or_else(|| VectorStoreError::Query {
                operation: "ensure_schema",
                table: self.table().to_string(),
                sqlstate: None,
                statement: format!("vector index {} missing after creation", descriptor.name),
            })?;

        let method = access_method(&definition).unwrap_or_default();
        if self.index.accepted_access_methods().contains(&method) {
            tracing::debug!("🔍 Vector index {} present (access method {})", descriptor.name, method);
        } else {
            tracing::warn!(
                "⚠️ Index {} exists with access method '{}', expected one of {:?}",
                descriptor.name,
                method,
                self.index.accepted_access_methods()
            );
        }
        Ok(())
    }

    /// Insert one embedding under a generated id.
    pub async fn add(&self, vector: Vector, text: impl Into<String>, metadata: Metadata) -> Result<VectorId> {
        self.add_record(EmbeddingRecord::new(vector, text, metadata)).await
    }

    /// Insert or replace one embedding under a caller-chosen id.
    pub async fn add_with_id(
        &self,
        id: impl Into<String>,
        vector: Vector,
        text: impl Into<String>,
        metadata: Metadata,
    ) -> Result<VectorId> {
        self.add_record(EmbeddingRecord::new(vector, text, metadata).with_id(id))
            .await
    }

    #[tracing::instrument(skip_all, fields(table = %self.schema.table_name(), operation = "add"))]
    pub async fn add_record(&self, record: EmbeddingRecord) -> Result<VectorId> {
        self.check_record(&record)?;
        let statement = self.insert_statement(std::slice::from_ref(&record))?;
        self.execute("add", &statement).await?;
        self.stats.write().await.rows_inserted += 1;
        Ok(record.id)
    }

    /// Embed `text` with `embedder` and insert it.
    pub async fn add_text(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        metadata: Metadata,
    ) -> Result<VectorId> {
        let vector = embedder.embed(text).await?;
        self.add(vector, text, metadata).await
    }

    /// Batch insert. `ids` are generated when absent. Either every row is
    /// written or none: all chunks run in one transaction.
    pub async fn add_all(
        &self,
        ids: Option<Vec<VectorId>>,
        vectors: Vec<Vector>,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<Vec<VectorId>> {
        if texts.len() != vectors.len() || metadatas.len() != vectors.len() {
            return Err(VectorStoreError::validation(format!(
                "add_all needs one text and one metadata map per vector: {} vectors, {} texts, {} metadata maps",
                vectors.len(),
                texts.len(),
                metadatas.len()
            )));
        }
        if let Some(ids) = &ids {
            if ids.len() != vectors.len() {
                return Err(VectorStoreError::validation(format!(
                    "add_all got {} ids for {} vectors",
                    ids.len(),
                    vectors.len()
                )));
            }
        }

        let mut ids = ids.map(Vec::into_iter);
        let records = vectors
            .into_iter()
            .zip(texts)
            .zip(metadatas)
            .map(|((vector, text), metadata)| {
                let record = EmbeddingRecord::new(vector, text, metadata);
                match ids.as_mut().and_then(Iterator::next) {
                    Some(id) => record.with_id(id),
                    None => record,
                }
            })
            .collect();
        self.add_records(records).await
    }

    #[tracing::instrument(skip_all, fields(table = %self.schema.table_name(), operation = "add_all", rows = records.len()))]
    pub async fn add_records(&self, records: Vec<EmbeddingRecord>) -> Result<Vec<VectorId>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            self.check_record(record)?;
            if !seen.insert(record.id.as_str()) {
                return Err(VectorStoreError::validation(format!(
                    "duplicate id '{}' in batch",
                    record.id
                )));
            }
        }

        let params_per_row = 3 + self.metadata.insert_columns().len();
        let rows_per_statement = self
            .performance
            .batch_size
            .min(MAX_BIND_PARAMS / params_per_row)
            .max(1);
        let statements = records
            .chunks(rows_per_statement)
            .map(|chunk| self.insert_statement(chunk))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "📝 Inserting {} rows in {} statements",
            records.len(),
            statements.len()
        );
        self.execute_atomic("add_all", &statements).await?;
        self.stats.write().await.rows_inserted += records.len() as u64;
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    fn check_record(&self, record: &EmbeddingRecord) -> Result<()> {
        if record.id.is_empty() {
            return Err(VectorStoreError::validation("record id must not be empty"));
        }
        self.schema.check_dimension(&record.vector)?;
        if record.vector.iter().any(|v| !v.is_finite()) {
            return Err(VectorStoreError::validation("vector components must be finite"));
        }
        Ok(())
    }

    /// Multi-row upsert for `records`.
    fn insert_statement(&self, records: &[EmbeddingRecord]) -> Result<Statement> {
        let metadata_columns = self.metadata.insert_columns();
        let mut params = ParamBuffer::new();
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            let mut values = vec![
                params.push(SqlValue::Text(record.id.clone())),
                format!("{}::vector", params.push(SqlValue::Text(encode_vector(&record.vector)))),
                params.push(SqlValue::Text(record.text.clone())),
            ];
            values.extend(self.metadata.bind_insert(&record.metadata, &mut params)?);
            rows.push(format!("({})", values.join(", ")));
        }

        let mut columns = vec![
            ID_COLUMN.to_string(),
            EMBEDDING_COLUMN.to_string(),
            TEXT_COLUMN.to_string(),
        ];
        columns.extend(metadata_columns);
        let updates = columns
            .iter()
            .skip(1)
            .map(|column| format!("{} = EXCLUDED.{}", column, column))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO UPDATE SET {}",
            self.table(),
            columns.join(", "),
            rows.join(", "),
            ID_COLUMN,
            updates
        );
        Ok(Statement::new(sql, params.into_values()))
    }

    /// Delete one record. Returns whether it existed.
    #[tracing::instrument(skip_all, fields(table = %self.schema.table_name(), operation = "remove"))]
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let statement = Statement::new(
            format!("DELETE FROM {} WHERE {} = $1", self.table(), ID_COLUMN),
            vec![SqlValue::Text(id.to_string())],
        );
        let deleted = self.execute("remove", &statement).await?;
        self.stats.write().await.rows_deleted += deleted;
        Ok(deleted > 0)
    }

    /// Delete every listed id, atomically.
    #[tracing::instrument(skip_all, fields(table = %self.schema.table_name(), operation = "remove_all", ids = ids.len()))]
    pub async fn remove_all(&self, ids: &[VectorId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let statements = ids
            .chunks(self.performance.batch_size.min(MAX_BIND_PARAMS))
            .map(|chunk| {
                let mut params = ParamBuffer::new();
                let placeholders: Vec<String> = chunk
                    .iter()
                    .map(|id| params.push(SqlValue::Text(id.clone())))
                    .collect();
                Statement::new(
                    format!(
                        "DELETE FROM {} WHERE {} IN ({})",
                        self.table(),
                        ID_COLUMN,
                        placeholders.join(", ")
                    ),
                    params.into_values(),
                )
            })
            .collect::<Vec<_>>();

        let deleted = self.execute_atomic("remove_all", &statements).await?;
        self.stats.write().await.rows_deleted += deleted;
        Ok(deleted)
    }

    /// Delete every record matching `filter`.
    #[tracing::instrument(skip_all, fields(table = %self.schema.table_name(), operation = "remove_all_matching"))]
    pub async fn remove_all_matching(&self, filter: &MetadataFilter) -> Result<u64> {
        let compiled = FilterCompiler::new(self.metadata.as_ref()).compile(Some(filter))?;
        let sql = format!("DELETE FROM {}{}", self.table(), compiled.where_clause());
        let (_, params) = compiled.into_parts();
        let deleted = self.execute("remove_all_matching", &Statement::new(sql, params)).await?;
        self.stats.write().await.rows_deleted += deleted;
        Ok(deleted)
    }

    /// Delete every record.
    #[tracing::instrument(skip_all, fields(table = %self.schema.table_name(), operation = "clear"))]
    pub async fn clear(&self) -> Result<u64> {
        let statement = Statement::raw(format!("DELETE FROM {}", self.table()));
        let deleted = self.execute("clear", &statement).await?;
        self.stats.write().await.rows_deleted += deleted;
        tracing::info!("🗑️ Cleared {} rows from '{}'", deleted, self.table());
        Ok(deleted)
    }

    /// Top-k similarity search, best match first.
    ///
    /// Scores are higher-is-better for every metric. `min_score` is applied in
    /// the same query before `LIMIT`, so fewer than `max_results` matches may
    /// come back even when the table holds more rows.
    #[tracing::instrument(skip_all, fields(table = %self.schema.table_name(), operation = "search", k = request.max_results))]
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<EmbeddingMatch>> {
        let statement = self.search_statement(request)?;
        let settings = self.index.search_settings();

        let rows = if settings.is_empty() {
            self.fetch("search", &statement).await?
        } else {
            let (settings, query) = (&settings, &statement);
            self.run("search", &statement.sql, |mut conn| async move {
                conn.fetch_with_settings(settings, query).await
            })
            .await?
        };

        let matches = rows
            .iter()
            .map(|row| self.decode_match(row))
            .collect::<DriverResult<Vec<_>>>()
            .map_err(|e| VectorStoreError::from_driver(e, "search", self.table(), &statement.sql))?;
        tracing::debug!("🔍 Search returned {} matches", matches.len());
        Ok(matches)
    }

    fn search_statement(&self, request: &SearchRequest) -> Result<Statement> {
        self.schema.check_dimension(&request.query)?;
        if request.query.iter().any(|v| !v.is_finite()) {
            return Err(VectorStoreError::validation("query vector components must be finite"));
        }
        if request.max_results == 0 {
            return Err(VectorStoreError::validation("max_results must be positive"));
        }
        let max_results = i64::try_from(request.max_results)
            .map_err(|_| VectorStoreError::validation("max_results exceeds the LIMIT range"))?;
        if let Some(min_score) = request.min_score {
            if !min_score.is_finite() {
                return Err(VectorStoreError::validation("min_score must be finite"));
            }
        }

        let mut params = ParamBuffer::new();
        let query = params.push(SqlValue::Text(encode_vector(&request.query)));
        let distance = format!(
            "{} {} {}::vector",
            EMBEDDING_COLUMN,
            self.schema.metric().distance_operator(),
            query
        );
        let score = self.schema.metric().score_expression(&distance);

        let compiled = FilterCompiler::new(self.metadata.as_ref())
            .compile_from(request.filter.as_ref(), params.next_index())?;
        let (clause, filter_params) = compiled.into_parts();
        let mut conditions = Vec::new();
        if !clause.is_empty() {
            conditions.push(clause);
        }
        for value in filter_params {
            params.push(value);
        }
        if let Some(min_score) = request.min_score {
            let placeholder = params.push(SqlValue::Double(min_score));
            conditions.push(format!("{} >= {}", score, placeholder));
        }
        let limit = params.push(SqlValue::BigInt(max_results));

        let mut projection = vec![
            ID_COLUMN.to_string(),
            format!("{}::text AS {}", EMBEDDING_COLUMN, EMBEDDING_COLUMN),
            TEXT_COLUMN.to_string(),
        ];
        projection.extend(self.metadata.select_projection());
        projection.push(format!("{} AS {}", score, SCORE_COLUMN));

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} LIMIT {}",
            projection.join(", "),
            self.table(),
            where_clause,
            distance,
            limit
        );
        Ok(Statement::new(sql, params.into_values()))
    }

    fn decode_match(&self, row: &SqlRow) -> DriverResult<EmbeddingMatch> {
        let id = row
            .get_text(ID_COLUMN)?
            .ok_or_else(|| DriverError::Decode("null id".to_string()))?;
        let literal = row
            .get_text(EMBEDDING_COLUMN)?
            .ok_or_else(|| DriverError::Decode("null embedding".to_string()))?;
        let vector = decode_vector(&literal)
            .map_err(|_| DriverError::Decode(format!("malformed embedding for id {}", id)))?;
        let score = row
            .get_f64(SCORE_COLUMN)?
            .ok_or_else(|| DriverError::Decode("null score".to_string()))?;

        Ok(EmbeddingMatch {
            id,
            vector,
            text: row.get_text(TEXT_COLUMN)?.unwrap_or_default(),
            metadata: self.metadata.decode_row(row)?,
            score,
        })
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<u64> {
        self.count_matching(None).await
    }

    /// Number of records matching `filter` (all records when `None`).
    #[tracing::instrument(skip_all, fields(table = %self.schema.table_name(), operation = "count"))]
    pub async fn count_matching(&self, filter: Option<&MetadataFilter>) -> Result<u64> {
        let compiled = FilterCompiler::new(self.metadata.as_ref()).compile(filter)?;
        let sql = format!("SELECT COUNT(*) AS count FROM {}{}", self.table(), compiled.where_clause());
        let (_, params) = compiled.into_parts();
        let statement = Statement::new(sql, params);

        let rows = self.fetch("count", &statement).await?;
        let count = rows
            .first()
            .ok_or_else(|| DriverError::Decode("COUNT returned no row".to_string()))
            .and_then(|row| row.get_i64("count"))
            .map_err(|e| VectorStoreError::from_driver(e, "count", self.table(), &statement.sql))?;
        Ok(count.unwrap_or_default().max(0) as u64)
    }

    /// Round trip to the backend.
    pub async fn health_check(&self) -> Result<bool> {
        let rows = self.fetch("health_check", &Statement::raw("SELECT 1 AS ok")).await?;
        tracing::debug!("❤️ Health check on '{}' returned {} rows", self.table(), rows.len());
        Ok(true)
    }

    async fn execute(&self, operation: &'static str, statement: &Statement) -> Result<u64> {
        self.run(operation, &statement.sql, |mut conn| async move {
            conn.execute(statement).await
        })
        .await
    }

    async fn execute_atomic(&self, operation: &'static str, statements: &[Statement]) -> Result<u64> {
        let shape = statements
            .first()
            .map(|s| s.sql.as_str())
            .unwrap_or_default();
        self.run(operation, shape, |mut conn| async move {
            conn.execute_atomic(statements).await
        })
        .await
    }

    async fn fetch(&self, operation: &'static str, statement: &Statement) -> Result<Vec<SqlRow>> {
        self.run(operation, &statement.sql, |mut conn| async move {
            conn.fetch_all(statement).await
        })
        .await
    }

    /// Acquire a connection, run `work` on it under the query timeout and
    /// record statistics. The connection is owned by `work`'s future, so it is
    /// released when that future completes, fails, times out or is dropped.
    async fn run<T, F, Fut>(&self, operation: &'static str, sql: &str, work: F) -> Result<T>
    where
        F: FnOnce(Box<dyn Connection>) -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        let started = Instant::now();
        tracing::debug!("📤 {} on '{}': {}", operation, self.table(), sql);

        let result = async {
            let conn = self
                .provider
                .acquire()
                .await
                .map_err(|e| VectorStoreError::from_driver(e, operation, self.table(), sql))?;
            let timeout = Duration::from_secs(self.performance.query_timeout_secs);
            match tokio::time::timeout(timeout, work(conn)).await {
                Ok(outcome) => {
                    outcome.map_err(|e| VectorStoreError::from_driver(e, operation, self.table(), sql))
                }
                Err(_) => Err(VectorStoreError::timed_out(operation, self.table(), sql)),
            }
        }
        .await;

        self.record(started.elapsed(), result.is_ok()).await;
        if let Err(e) = &result {
            tracing::debug!("❌ {} failed: {}", operation, e);
        }
        result
    }

    async fn record(&self, elapsed: Duration, succeeded: bool) {
        let mut stats = self.stats.write().await;
        stats.total_queries += 1;
        if !succeeded {
            stats.failed_queries += 1;
        }
        stats.avg_query_time_ms = (stats.avg_query_time_ms * (stats.total_queries - 1) as f64
            + elapsed.as_secs_f64() * 1000.0)
            / stats.total_queries as f64;
    }
}

/// Access method named in an index definition, e.g. `hnsw` in
/// `CREATE INDEX i ON public.t USING hnsw (embedding vector_cosine_ops)`.
fn access_method(definition: &str) -> Option<String> {
    let mut tokens = definition.split_whitespace();
    tokens.find(|token| token.eq_ignore_ascii_case("USING"))?;
    tokens.next().map(|method| method.to_lowercase())
}
