// Copyright 2026 Tessera Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Filter DSL.
//!
//! A closed operator set replaces duck-typed filter objects: unknown
//! operators are rejected at construction, so a filter that exists is a
//! filter the backend understands. Filters in a list are ANDed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::core::errors::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    Is,
}

impl Operator {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "eq" => Ok(Self::Eq),
            "neq" => Ok(Self::Neq),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "like" => Ok(Self::Like),
            "in" => Ok(Self::In),
            "is" => Ok(Self::Is),
            other => Err(CoreError::InvalidFilter(format!(
                "unknown operator '{other}'"
            ))),
        }
    }
}

/// One `{column, operator, value}` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: Operator,
    pub value: Value,
}

impl Filter {
    /// Construction gate for externally supplied filters: the operator string
    /// must belong to the closed set, and `in` requires an array value.
    pub fn parse(column: &str, op: &str, value: Value) -> Result<Self, CoreError> {
        let op = Operator::parse(op)?;
        if op == Operator::In && !value.is_array() {
            return Err(CoreError::InvalidFilter(format!(
                "'in' filter on '{column}' requires an array value"
            )));
        }
        Ok(Self {
            column: column.to_string(),
            op,
            value,
        })
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: Operator::Eq,
            value: value.into(),
        }
    }

    pub fn neq(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: Operator::Neq,
            value: value.into(),
        }
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: Operator::Gt,
            value: value.into(),
        }
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: Operator::Lt,
            value: value.into(),
        }
    }

    pub fn like(column: &str, pattern: &str) -> Self {
        Self {
            column: column.to_string(),
            op: Operator::Like,
            value: Value::String(pattern.to_string()),
        }
    }

    pub fn any_of(column: &str, values: Vec<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: Operator::In,
            value: Value::Array(values),
        }
    }

    pub fn is_null(column: &str) -> Self {
        Self {
            column: column.to_string(),
            op: Operator::Is,
            value: Value::Null,
        }
    }

    /// Evaluates this condition against a flat JSON record. Missing columns
    /// are treated as null.
    pub fn matches(&self, record: &Value) -> bool {
        let field = record.get(&self.column).unwrap_or(&Value::Null);
        match self.op {
            Operator::Eq => loose_eq(field, &self.value),
            Operator::Neq => !loose_eq(field, &self.value),
            Operator::Gt => matches!(compare(field, &self.value), Some(Ordering::Greater)),
            Operator::Gte => matches!(
                compare(field, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lt => matches!(compare(field, &self.value), Some(Ordering::Less)),
            Operator::Lte => matches!(
                compare(field, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Like => match (field.as_str(), self.value.as_str()) {
                (Some(text), Some(pattern)) => like_match(text, pattern),
                _ => false,
            },
            Operator::In => match &self.value {
                Value::Array(candidates) => candidates.iter().any(|c| loose_eq(field, c)),
                _ => false,
            },
            Operator::Is => match &self.value {
                Value::Null => field.is_null(),
                Value::Bool(b) => field.as_bool() == Some(*b),
                _ => false,
            },
        }
    }
}

/// Converts a plain key → value map into all-`eq` filters, preserving key
/// order.
pub fn filters_from_map(map: &Map<String, Value>) -> Vec<Filter> {
    map.iter()
        .map(|(column, value)| Filter::eq(column, value.clone()))
        .collect()
}

/// Equality that tolerates integer/float representation differences.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Total-enough ordering for filterable scalars; incomparable pairs never
/// match a range operator.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

/// SQL LIKE with `%` wildcards.
fn like_match(text: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return text == pattern;
    }

    let mut remaining = text;
    if let Some(first) = parts.first() {
        if !remaining.starts_with(first) {
            return false;
        }
        remaining = &remaining[first.len()..];
    }
    let last = parts[parts.len() - 1];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last)
}

/// Sort direction for a single-column ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

/// Ordering and pagination. `limit` alone selects the first N rows;
/// `limit` + `offset` selects the inclusive range [offset, offset+limit-1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl QueryOptions {
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            order_by: None,
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    pub fn first(limit: usize) -> Self {
        Self {
            order_by: None,
            limit: Some(limit),
            offset: None,
        }
    }

    pub fn ordered(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }
}
