// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! PostgreSQL / YugabyteDB Connection Provider
//!
//! sqlx connection pool. Acquisition honours the pool's acquire timeout and a
//! checked-out connection goes back to the pool when the boxed
//! [`Connection`] is dropped. Transactions roll back when dropped uncommitted.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Connection as SqlxConnection, Postgres, Row, TypeInfo};
use std::time::Duration;

use super::{
    Connection, ConnectionProvider, DriverError, DriverResult, SqlRow, SqlType, SqlValue,
    Statement,
};
use crate::core::config::{ConnectionConfig, PoolConfig};
use crate::core::error::{Result, VectorStoreError};

/// sqlx-backed pooled connection provider.
#[derive(Debug, Clone)]
pub struct PgConnectionProvider {
    pool: PgPool,
}

impl PgConnectionProvider {
    /// Open the pool and establish `min_connections` eagerly.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        tracing::info!(
            "🔗 Connecting PostgreSQL pool (min={}, max={})",
            config.pool.min_connections,
            config.pool.max_connections
        );
        let pool = pool_options(&config.pool)
            .connect(&config.database_url)
            .await
            .map_err(|e| connect_error(map_sqlx_error(e)))?;
        Ok(Self { pool })
    }

    /// Build the pool without touching the network; connections open on first use.
    pub fn connect_lazy(config: &ConnectionConfig) -> Result<Self> {
        let pool = pool_options(&config.pool)
            .connect_lazy(&config.database_url)
            .map_err(|e| connect_error(map_sqlx_error(e)))?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("🔌 PostgreSQL pool closed");
    }
}

fn pool_options(pool: &PoolConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(pool.min_connections)
        .max_connections(pool.max_connections)
        .acquire_timeout(Duration::from_secs(pool.connect_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(pool.idle_timeout_secs)))
        .max_lifetime(Some(Duration::from_secs(pool.max_lifetime_secs)))
}

fn connect_error(error: DriverError) -> VectorStoreError {
    VectorStoreError::Connection {
        operation: "connect",
        table: "*".to_string(),
        message: error.to_string(),
    }
}

/// Translate a sqlx error, dropping database message text.
fn map_sqlx_error(error: sqlx::Error) -> DriverError {
    match error {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned());
            match code {
                // class 28: invalid authorization specification
                Some(ref c) if c.starts_with("28") => {
                    DriverError::Unavailable(format!("authentication failed (sqlstate {})", c))
                }
                _ => DriverError::Rejected { code },
            }
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::TypeNotFound { .. } => DriverError::Decode(error.to_string()),
        other => DriverError::Unavailable(other.to_string()),
    }
}

fn bind_params<'q>(sql: &'q str, params: &'q [SqlValue]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            SqlValue::Null(SqlType::Text) => query.bind(None::<String>),
            SqlValue::Null(SqlType::BigInt) => query.bind(None::<i64>),
            SqlValue::Null(SqlType::Double) => query.bind(None::<f64>),
            SqlValue::Null(SqlType::Boolean) => query.bind(None::<bool>),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::BigInt(i) => query.bind(*i),
            SqlValue::Double(f) => query.bind(*f),
            SqlValue::Boolean(b) => query.bind(*b),
        };
    }
    query
}

fn decode_pg_row(row: &PgRow) -> DriverResult<SqlRow> {
    let mut decoded = SqlRow::new();
    for column in row.columns() {
        let index = column.ordinal();
        let name = column.name();
        let value = match column.type_info().name() {
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
                .try_get::<Option<String>, _>(index)
                .map(|v| v.map_or(SqlValue::Null(SqlType::Text), SqlValue::Text)),
            "INT8" => row
                .try_get::<Option<i64>, _>(index)
                .map(|v| v.map_or(SqlValue::Null(SqlType::BigInt), SqlValue::BigInt)),
            "INT4" => row
                .try_get::<Option<i32>, _>(index)
                .map(|v| v.map_or(SqlValue::Null(SqlType::BigInt), |i| SqlValue::BigInt(i as i64))),
            "INT2" => row
                .try_get::<Option<i16>, _>(index)
                .map(|v| v.map_or(SqlValue::Null(SqlType::BigInt), |i| SqlValue::BigInt(i as i64))),
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(index)
                .map(|v| v.map_or(SqlValue::Null(SqlType::Double), SqlValue::Double)),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(index)
                .map(|v| v.map_or(SqlValue::Null(SqlType::Double), |f| SqlValue::Double(f as f64))),
            "BOOL" => row
                .try_get::<Option<bool>, _>(index)
                .map(|v| v.map_or(SqlValue::Null(SqlType::Boolean), SqlValue::Boolean)),
            other => {
                return Err(DriverError::Decode(format!(
                    "unsupported column type {} for '{}'",
                    other, name
                )))
            }
        }
        .map_err(map_sqlx_error)?;
        decoded.push(name, value);
    }
    Ok(decoded)
}

struct PgPooledConnection {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl Connection for PgPooledConnection {
    async fn execute(&mut self, statement: &Statement) -> DriverResult<u64> {
        let result = bind_params(&statement.sql, &statement.params)
            .execute(&mut *self.conn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, statement: &Statement) -> DriverResult<Vec<SqlRow>> {
        let rows = bind_params(&statement.sql, &statement.params)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(decode_pg_row).collect()
    }

    async fn execute_atomic(&mut self, statements: &[Statement]) -> DriverResult<u64> {
        let mut tx = SqlxConnection::begin(&mut *self.conn)
            .await
            .map_err(map_sqlx_error)?;
        let mut affected = 0;
        for statement in statements {
            affected += bind_params(&statement.sql, &statement.params)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .rows_affected();
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(affected)
    }

    async fn fetch_with_settings(
        &mut self,
        settings: &[Statement],
        query: &Statement,
    ) -> DriverResult<Vec<SqlRow>> {
        let mut tx = SqlxConnection::begin(&mut *self.conn)
            .await
            .map_err(map_sqlx_error)?;
        for setting in settings {
            bind_params(&setting.sql, &setting.params)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        let rows = bind_params(&query.sql, &query.params)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        rows.iter().map(decode_pg_row).collect()
    }
}

#[async_trait]
impl ConnectionProvider for PgConnectionProvider {
    fn provider_name(&self) -> &'static str {
        "postgresql"
    }

    async fn acquire(&self) -> DriverResult<Box<dyn Connection>> {
        let conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgPooledConnection { conn }))
    }
}
