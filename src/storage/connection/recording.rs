// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Recording Connection Provider
//!
//! In-memory provider for development and testing. It records every statement,
//! keeps a tiny index catalog so index verification behaves like a real backend,
//! returns scripted rows, and can fail acquisition or individual statements on
//! demand. It never interprets DML.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{
    Connection, ConnectionProvider, DriverError, DriverResult, SqlRow, SqlValue, Statement,
};

#[derive(Default)]
struct RecordingState {
    statements: Mutex<Vec<Statement>>,
    transactions: Mutex<Vec<Vec<Statement>>>,
    tables: Mutex<HashSet<String>>,
    indexes: Mutex<HashMap<String, String>>,
    access_method_rewrites: Mutex<HashMap<String, String>>,
    scripted_rows: Mutex<VecDeque<Vec<SqlRow>>>,
    statement_failures: Mutex<Vec<(String, DriverError)>>,
    acquire_failure: Mutex<Option<DriverError>>,
    latency: Mutex<Option<Duration>>,
    outstanding: AtomicUsize,
    acquisitions: AtomicUsize,
}

impl RecordingState {
    fn take_failure(&self, sql: &str) -> Option<DriverError> {
        let mut failures = self.statement_failures.lock();
        let position = failures.iter().position(|(fragment, _)| sql.contains(fragment.as_str()))?;
        Some(failures.remove(position).1)
    }

    /// Record the statement and apply catalog side effects of DDL.
    fn apply(&self, statement: &Statement) -> DriverResult<u64> {
        self.statements.lock().push(statement.clone());
        if let Some(error) = self.take_failure(&statement.sql) {
            return Err(error);
        }

        let tokens: Vec<&str> = statement.sql.split_whitespace().collect();
        if statement.sql.starts_with("CREATE TABLE IF NOT EXISTS") {
            if let Some(table) = tokens.get(5) {
                self.tables.lock().insert(table.to_string());
            }
        } else if statement.sql.starts_with("CREATE INDEX IF NOT EXISTS") {
            let name = tokens.get(5).copied().unwrap_or_default();
            let table = token_after(&tokens, "ON").unwrap_or_default();
            let method = token_after(&tokens, "USING").unwrap_or_default();
            let method = self
                .access_method_rewrites
                .lock()
                .get(method)
                .cloned()
                .unwrap_or_else(|| method.to_string());
            let definition = format!("CREATE INDEX {} ON public.{} USING {} (...)", name, table, method);
            self.indexes.lock().entry(name.to_string()).or_insert(definition);
        }
        Ok(1)
    }

    fn query(&self, statement: &Statement) -> DriverResult<Vec<SqlRow>> {
        self.statements.lock().push(statement.clone());
        if let Some(error) = self.take_failure(&statement.sql) {
            return Err(error);
        }

        if statement.sql.contains("FROM pg_indexes") {
            let index_name = match statement.params.get(1) {
                Some(SqlValue::Text(name)) => name.clone(),
                _ => return Ok(Vec::new()),
            };
            return Ok(self
                .indexes
                .lock()
                .get(&index_name)
                .map(|definition| {
                    vec![SqlRow::new().with("indexdef", SqlValue::Text(definition.clone()))]
                })
                .unwrap_or_default());
        }

        Ok(self.scripted_rows.lock().pop_front().unwrap_or_default())
    }
}

fn token_after<'a>(tokens: &[&'a str], keyword: &str) -> Option<&'a str> {
    tokens
        .iter()
        .position(|token| *token == keyword)
        .and_then(|i| tokens.get(i + 1).copied())
}

/// In-memory provider that records statements instead of running them.
#[derive(Clone, Default)]
pub struct RecordingConnectionProvider {
    state: Arc<RecordingState>,
}

impl RecordingConnectionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a backend that transparently swaps index access methods,
    /// e.g. YugabyteDB building `ybhnsw` when `hnsw` is requested.
    pub fn rewrite_access_method(self, requested: &str, actual: &str) -> Self {
        self.state
            .access_method_rewrites
            .lock()
            .insert(requested.to_string(), actual.to_string());
        self
    }

    /// Delay every statement, to exercise timeouts and cancellation.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.state.latency.lock() = Some(latency);
        self
    }

    /// Rows returned by the next non-catalog query.
    pub fn push_rows(&self, rows: Vec<SqlRow>) {
        self.state.scripted_rows.lock().push_back(rows);
    }

    /// Fail the next statement whose SQL contains `fragment`.
    pub fn fail_statement(&self, fragment: &str, error: DriverError) {
        self.state
            .statement_failures
            .lock()
            .push((fragment.to_string(), error));
    }

    /// Fail every acquisition until cleared with `None`.
    pub fn set_acquire_failure(&self, error: Option<DriverError>) {
        *self.state.acquire_failure.lock() = error;
    }

    /// Every statement seen, in order, including those inside transactions.
    pub fn statements(&self) -> Vec<Statement> {
        self.state.statements.lock().clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }

    /// Committed transactions.
    pub fn transactions(&self) -> Vec<Vec<Statement>> {
        self.state.transactions.lock().clone()
    }

    pub fn clear_log(&self) {
        self.state.statements.lock().clear();
        self.state.transactions.lock().clear();
    }

    pub fn tables(&self) -> HashSet<String> {
        self.state.tables.lock().clone()
    }

    pub fn index_names(&self) -> HashSet<String> {
        self.state.indexes.lock().keys().cloned().collect()
    }

    pub fn index_definition(&self, name: &str) -> Option<String> {
        self.state.indexes.lock().get(name).cloned()
    }

    /// Connections currently checked out.
    pub fn outstanding_connections(&self) -> usize {
        self.state.outstanding.load(Ordering::SeqCst)
    }

    pub fn total_acquisitions(&self) -> usize {
        self.state.acquisitions.load(Ordering::SeqCst)
    }
}

struct RecordingConnection {
    state: Arc<RecordingState>,
}

impl RecordingConnection {
    async fn simulate_latency(&self) {
        let latency = *self.state.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Drop for RecordingConnection {
    fn drop(&mut self) {
        self.state.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn execute(&mut self, statement: &Statement) -> DriverResult<u64> {
        self.simulate_latency().await;
        self.state.apply(statement)
    }

    async fn fetch_all(&mut self, statement: &Statement) -> DriverResult<Vec<SqlRow>> {
        self.simulate_latency().await;
        self.state.query(statement)
    }

    async fn execute_atomic(&mut self, statements: &[Statement]) -> DriverResult<u64> {
        self.simulate_latency().await;
        let mut affected = 0;
        for statement in statements {
            affected += self.state.apply(statement)?;
        }
        self.state.transactions.lock().push(statements.to_vec());
        Ok(affected)
    }

    async fn fetch_with_settings(
        &mut self,
        settings: &[Statement],
        query: &Statement,
    ) -> DriverResult<Vec<SqlRow>> {
        self.simulate_latency().await;
        for setting in settings {
            self.state.apply(setting)?;
        }
        let rows = self.state.query(query)?;
        let mut committed = settings.to_vec();
        committed.push(query.clone());
        self.state.transactions.lock().push(committed);
        Ok(rows)
    }
}

#[async_trait]
impl ConnectionProvider for RecordingConnectionProvider {
    fn provider_name(&self) -> &'static str {
        "recording"
    }

    async fn acquire(&self) -> DriverResult<Box<dyn Connection>> {
        if let Some(error) = self.state.acquire_failure.lock().clone() {
            return Err(error);
        }
        self.state.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.state.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingConnection {
            state: Arc::clone(&self.state),
        }))
    }
}
