// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Filter Compiler
//!
//! Turns a [`MetadataFilter`] into a SQL predicate with `$n` placeholders and
//! the matching ordered parameter list, dispatching key addressing to the
//! active [`MetadataStorage`].
//!
//! Every literal becomes a bound parameter. The only caller text spliced into
//! the SQL is a metadata key, and only after it matched `[A-Za-z0-9_]+`.
//!
//! Null policy: `Equals` never matches a record missing the key, while
//! `NotEquals`/`NotIn` always do.

use crate::core::error::{Result, VectorStoreError};
use crate::core::types::MetadataValue;
use crate::query::filter::{FieldCondition, MetadataFilter};
use crate::query::params::ParamBuffer;
use crate::schema::validate_metadata_key;
use crate::storage::connection::SqlValue;
use crate::storage::metadata::{FilterTarget, MetadataColumnType, MetadataStorage, TargetKind};

/// Compiled predicate: SQL fragment plus bind values in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterResult {
    clause: String,
    params: Vec<SqlValue>,
}

impl FilterResult {
    /// No filter: empty fragment, no parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    /// `" WHERE <clause>"`, or nothing when there is no filter.
    pub fn where_clause(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clause)
        }
    }

    pub fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.clause, self.params)
    }
}

/// Compiles filters against one metadata storage strategy.
#[derive(Debug, Clone, Copy)]
pub struct FilterCompiler<'a> {
    storage: &'a dyn MetadataStorage,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(storage: &'a dyn MetadataStorage) -> Self {
        Self { storage }
    }

    /// Compile with placeholders starting at `$1`.
    pub fn compile(&self, filter: Option<&MetadataFilter>) -> Result<FilterResult> {
        self.compile_from(filter, 1)
    }

    /// Compile with placeholders starting at `$first_placeholder`, for
    /// embedding into a statement that already binds earlier parameters.
    pub fn compile_from(
        &self,
        filter: Option<&MetadataFilter>,
        first_placeholder: usize,
    ) -> Result<FilterResult> {
        let filter = match filter {
            Some(filter) => filter,
            None => return Ok(FilterResult::empty()),
        };

        let mut params = ParamBuffer::starting_at(first_placeholder);
        let clause = self.render(filter, &mut params)?;
        tracing::trace!("🔎 Compiled filter with {} parameters: {}", params.len(), clause);
        Ok(FilterResult {
            clause,
            params: params.into_values(),
        })
    }

    fn render(&self, filter: &MetadataFilter, params: &mut ParamBuffer) -> Result<String> {
        match filter {
            MetadataFilter::Field { key, condition } => self.render_field(key, condition, params),
            MetadataFilter::And(children) => self.render_group(children, "AND", "TRUE", params),
            MetadataFilter::Or(children) => self.render_group(children, "OR", "FALSE", params),
            MetadataFilter::Not(child) => Ok(format!("NOT ({})", self.render(child, params)?)),
        }
    }

    fn render_group(
        &self,
        children: &[MetadataFilter],
        operator: &str,
        identity: &str,
        params: &mut ParamBuffer,
    ) -> Result<String> {
        if children.is_empty() {
            return Ok(identity.to_string());
        }
        let rendered = children
            .iter()
            .map(|child| self.render(child, params))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("({})", rendered.join(&format!(" {} ", operator))))
    }

    fn render_field(
        &self,
        key: &str,
        condition: &FieldCondition,
        params: &mut ParamBuffer,
    ) -> Result<String> {
        validate_metadata_key(key)?;
        let target = self.storage.filter_target(key)?;
        let expr = &target.expression;

        let clause = match condition {
            FieldCondition::Equals(value) => {
                let (lhs, placeholder) = bind_comparison(&target, value, params)?;
                format!("({} IS NOT NULL AND {} = {})", expr, lhs, placeholder)
            }
            FieldCondition::NotEquals(value) => {
                let (lhs, placeholder) = bind_comparison(&target, value, params)?;
                format!("({} IS NULL OR {} != {})", expr, lhs, placeholder)
            }
            FieldCondition::GreaterThan(value) => {
                let (lhs, placeholder) = bind_comparison(&target, value, params)?;
                format!("{} > {}", lhs, placeholder)
            }
            FieldCondition::GreaterThanOrEqual(value) => {
                let (lhs, placeholder) = bind_comparison(&target, value, params)?;
                format!("{} >= {}", lhs, placeholder)
            }
            FieldCondition::LessThan(value) => {
                let (lhs, placeholder) = bind_comparison(&target, value, params)?;
                format!("{} < {}", lhs, placeholder)
            }
            FieldCondition::LessThanOrEqual(value) => {
                let (lhs, placeholder) = bind_comparison(&target, value, params)?;
                format!("{} <= {}", lhs, placeholder)
            }
            FieldCondition::In(values) => {
                if values.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let (lhs, placeholders) = bind_list(&target, values, params)?;
                format!("{} IN ({})", lhs, placeholders.join(", "))
            }
            FieldCondition::NotIn(values) => {
                if values.is_empty() {
                    return Ok("TRUE".to_string());
                }
                let (lhs, placeholders) = bind_list(&target, values, params)?;
                format!("({} IS NULL OR {} NOT IN ({}))", expr, lhs, placeholders.join(", "))
            }
        };
        Ok(clause)
    }
}

/// Left-hand side for a literal of the given tag. Schemaless JSON text gets an
/// explicit numeric cast when compared against numbers.
fn comparison_lhs(target: &FilterTarget, numeric: bool) -> String {
    match target.kind {
        TargetKind::JsonText if numeric => format!("({})::numeric", target.expression),
        _ => target.expression.clone(),
    }
}

fn bind_comparison(
    target: &FilterTarget,
    value: &MetadataValue,
    params: &mut ParamBuffer,
) -> Result<(String, String)> {
    let bound = literal_to_param(target, value)?;
    Ok((comparison_lhs(target, value.is_numeric()), params.push(bound)))
}

fn bind_list(
    target: &FilterTarget,
    values: &[MetadataValue],
    params: &mut ParamBuffer,
) -> Result<(String, Vec<String>)> {
    let numeric = values.iter().filter(|v| v.is_numeric()).count();
    if numeric != 0 && numeric != values.len() {
        return Err(VectorStoreError::validation(
            "list filter values must be all numbers or all non-numbers",
        ));
    }

    let placeholders = values
        .iter()
        .map(|value| literal_to_param(target, value).map(|bound| params.push(bound)))
        .collect::<Result<Vec<_>>>()?;
    Ok((comparison_lhs(target, numeric != 0), placeholders))
}

/// Convert a literal into the bind value matching the target's semantics.
fn literal_to_param(target: &FilterTarget, value: &MetadataValue) -> Result<SqlValue> {
    if let MetadataValue::Float(f) = value {
        if !f.is_finite() {
            return Err(VectorStoreError::validation("filter values must be finite numbers"));
        }
    }

    match target.kind {
        TargetKind::JsonText => Ok(match value {
            MetadataValue::Integer(i) => SqlValue::BigInt(*i),
            MetadataValue::Float(f) => SqlValue::Double(*f),
            // ->> yields the JSON text form, e.g. 'true'
            MetadataValue::Boolean(b) => SqlValue::Text(b.to_string()),
            MetadataValue::String(s) => SqlValue::Text(s.clone()),
        }),
        TargetKind::Column(column_type) => match (column_type, value) {
            (MetadataColumnType::Text, MetadataValue::String(s)) => Ok(SqlValue::Text(s.clone())),
            (MetadataColumnType::Boolean, MetadataValue::Boolean(b)) => Ok(SqlValue::Boolean(*b)),
            (t, MetadataValue::Integer(i)) if t.is_numeric() => Ok(SqlValue::BigInt(*i)),
            (t, MetadataValue::Float(f)) if t.is_numeric() => Ok(SqlValue::Double(*f)),
            (t, v) => Err(VectorStoreError::validation(format!(
                "cannot compare {} column '{}' with a {} value",
                t.sql_type(),
                target.expression,
                v.type_name()
            ))),
        },
    }
}
