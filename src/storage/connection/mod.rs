// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Pooled Connection Providers
//!
//! The store talks to the backend only through [`ConnectionProvider`] and
//! [`Connection`]:
//! - `PgConnectionProvider` - sqlx connection pool against PostgreSQL/YugabyteDB
//! - `RecordingConnectionProvider` - in-memory provider for development and tests
//!
//! A connection is acquired per operation and released when it is dropped, so
//! success, error and cancellation (dropping the future) all return it to the pool.

pub mod postgres;
pub mod recording;

use async_trait::async_trait;
use std::fmt;

pub use postgres::PgConnectionProvider;
pub use recording::RecordingConnectionProvider;

/// Failure reported by a connection provider. The store wraps it into a
/// [`VectorStoreError`](crate::core::error::VectorStoreError) before it
/// crosses the public boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverError {
    /// Backend unreachable, pool exhausted or closed, authentication failed.
    Unavailable(String),
    /// Backend rejected the statement. Only the SQLSTATE is kept; message text
    /// may echo bound values.
    Rejected { code: Option<String> },
    /// A result row could not be decoded.
    Decode(String),
}

impl DriverError {
    pub fn rejected(code: &str) -> Self {
        Self::Rejected {
            code: Some(code.to_string()),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code } => code.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "backend unavailable: {}", message),
            Self::Rejected { code } => write!(
                f,
                "statement rejected (sqlstate {})",
                code.as_deref().unwrap_or("n/a")
            ),
            Self::Decode(message) => write!(f, "row decode failed: {}", message),
        }
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Wire type of a bound parameter or result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Text,
    BigInt,
    Double,
    Boolean,
}

/// Bound parameter or decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Typed NULL, so the driver can declare the parameter type.
    Null(SqlType),
    Text(String),
    BigInt(i64),
    Double(f64),
    Boolean(bool),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    pub fn sql_type(&self) -> SqlType {
        match self {
            Self::Null(t) => *t,
            Self::Text(_) => SqlType::Text,
            Self::BigInt(_) => SqlType::BigInt,
            Self::Double(_) => SqlType::Double,
            Self::Boolean(_) => SqlType::Boolean,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::BigInt(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Parameterized statement: SQL text with `$n` placeholders plus bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Statement without parameters (DDL, settings).
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

/// One decoded result row, columns in projection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: SqlValue) {
        self.columns.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    fn require(&self, name: &str) -> DriverResult<&SqlValue> {
        self.get(name)
            .ok_or_else(|| DriverError::Decode(format!("missing column '{}'", name)))
    }

    pub fn get_text(&self, name: &str) -> DriverResult<Option<String>> {
        match self.require(name)? {
            SqlValue::Null(_) => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            other => Err(DriverError::Decode(format!(
                "column '{}' is {:?}, expected text",
                name,
                other.sql_type()
            ))),
        }
    }

    pub fn get_i64(&self, name: &str) -> DriverResult<Option<i64>> {
        match self.require(name)? {
            SqlValue::Null(_) => Ok(None),
            SqlValue::BigInt(i) => Ok(Some(*i)),
            other => Err(DriverError::Decode(format!(
                "column '{}' is {:?}, expected bigint",
                name,
                other.sql_type()
            ))),
        }
    }

    pub fn get_f64(&self, name: &str) -> DriverResult<Option<f64>> {
        match self.require(name)? {
            SqlValue::Null(_) => Ok(None),
            SqlValue::Double(f) => Ok(Some(*f)),
            SqlValue::BigInt(i) => Ok(Some(*i as f64)),
            other => Err(DriverError::Decode(format!(
                "column '{}' is {:?}, expected double",
                name,
                other.sql_type()
            ))),
        }
    }
}

/// Connection checked out of a pool. Returned to the pool on drop.
#[async_trait]
pub trait Connection: Send {
    /// Execute one statement, returning the affected row count.
    async fn execute(&mut self, statement: &Statement) -> DriverResult<u64>;

    /// Run one query and collect its rows.
    async fn fetch_all(&mut self, statement: &Statement) -> DriverResult<Vec<SqlRow>>;

    /// Execute all statements in one transaction; nothing is applied on error.
    async fn execute_atomic(&mut self, statements: &[Statement]) -> DriverResult<u64>;

    /// Apply transaction-local settings, then run a query in the same transaction.
    async fn fetch_with_settings(
        &mut self,
        settings: &[Statement],
        query: &Statement,
    ) -> DriverResult<Vec<SqlRow>>;
}

/// Source of pooled connections.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Provider name for logging.
    fn provider_name(&self) -> &'static str;

    /// Check out a connection, failing with [`DriverError::Unavailable`]
    /// instead of waiting past the configured acquire timeout.
    async fn acquire(&self) -> DriverResult<Box<dyn Connection>>;
}
