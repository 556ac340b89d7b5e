// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Error taxonomy surfaced by the embedding store.
//!
//! Every failure that crosses the public boundary is one of four kinds. Driver
//! errors never leak out: the connection layer reports a [`DriverError`] and the
//! store wraps it with the operation name and table before returning it.

use thiserror::Error;

use crate::storage::connection::DriverError;

/// SQLSTATE reported when a statement exceeds the configured timeout.
pub const QUERY_CANCELED_SQLSTATE: &str = "57014";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorStoreError {
    /// Caller-input contract violation: dimension mismatch, undeclared filter key,
    /// malformed identifier. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Illegal storage-mode/index combination or malformed configuration.
    /// Raised before any connection is opened.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Pool exhaustion, network or authentication failure.
    #[error("Connection error during {operation} on {table}: {message}")]
    Connection {
        operation: &'static str,
        table: String,
        message: String,
    },

    /// The backend rejected a statement. `statement` holds the placeholder-only
    /// SQL text; bound values are never included.
    #[error("Query error during {operation} on {table} (sqlstate {}): {statement}", .sqlstate.as_deref().unwrap_or("n/a"))]
    Query {
        operation: &'static str,
        table: String,
        sqlstate: Option<String>,
        statement: String,
    },
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;

impl VectorStoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap a driver failure with the operation context.
    pub fn from_driver(
        error: DriverError,
        operation: &'static str,
        table: &str,
        statement: &str,
    ) -> Self {
        match error {
            DriverError::Unavailable(message) => Self::Connection {
                operation,
                table: table.to_string(),
                message,
            },
            DriverError::Rejected { code } => Self::Query {
                operation,
                table: table.to_string(),
                sqlstate: code,
                statement: statement.to_string(),
            },
            DriverError::Decode(message) => Self::Query {
                operation,
                table: table.to_string(),
                sqlstate: None,
                statement: format!("{} (decode failed: {})", statement, message),
            },
        }
    }

    /// Statement exceeded the configured query timeout.
    pub fn timed_out(operation: &'static str, table: &str, statement: &str) -> Self {
        Self::Query {
            operation,
            table: table.to_string(),
            sqlstate: Some(QUERY_CANCELED_SQLSTATE.to_string()),
            statement: statement.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }

    /// SQLSTATE of a rejected statement, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Query { sqlstate, .. } => sqlstate.as_deref(),
            _ => None,
        }
    }
}
