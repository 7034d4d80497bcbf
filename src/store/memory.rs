//! In-memory data store backend
//!
//! Holds whole tables as JSON rows and evaluates queries locally with the
//! same observable semantics as PostgREST for the subset of the query
//! language pitwall issues: many-to-one embedding, `!inner` joins, `eq`,
//! `gte`, `lte`, `ilike` and a single-column sort.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;

use crate::query::{Filter, FilterOp, Query};
use crate::{Error, Result};

use super::schema::{self, ForeignKey};
use super::{DataStore, StoreError, StoreResponse};

type Evaluation<T> = std::result::Result<T, StoreError>;

/// Tables held in memory
pub struct MemoryStore {
    tables: HashMap<String, Vec<Value>>,
    foreign_keys: &'static [ForeignKey],
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            foreign_keys: schema::F1_FOREIGN_KEYS,
        }
    }

    /// Load `{"<table>": [rows...]}` from disk
    pub async fn from_fixture(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).await?;
        let value: Value = serde_json::from_slice(&bytes)?;
        let store = Self::from_value(value)?;

        tracing::info!(
            path = %path.display(),
            tables = store.tables.len(),
            "Loaded memory store fixture"
        );

        Ok(store)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(tables) = value else {
            return Err(Error::Fixture(
                "fixture must be an object of table name to rows".to_string(),
            ));
        };

        let mut store = Self::new();
        for (name, rows) in tables {
            let Value::Array(rows) = rows else {
                return Err(Error::Fixture(format!("table '{}' must be an array", name)));
            };
            if rows.iter().any(|row| !row.is_object()) {
                return Err(Error::Fixture(format!(
                    "table '{}' must only contain objects",
                    name
                )));
            }
            store.tables.insert(name, rows);
        }

        Ok(store)
    }

    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Value>) -> Self {
        self.tables.insert(name.into(), rows);
        self
    }

    fn related<'a>(&'a self, row: &Value, key: &ForeignKey) -> Option<&'a Value> {
        let value = row.get(key.column).filter(|v| !v.is_null())?;
        self.tables
            .get(key.references)?
            .iter()
            .find(|candidate| candidate.get(key.referenced_column) == Some(value))
    }

    fn evaluate(&self, query: &Query) -> Evaluation<Vec<Value>> {
        let rows = self.tables.get(&query.table).ok_or_else(|| {
            StoreError::new(format!(
                "relation \"public.{}\" does not exist",
                query.table
            ))
            .with_code("42P01")
        })?;

        let mut joins = Vec::with_capacity(query.select.relations.len());
        for relation in &query.select.relations {
            let key = schema::foreign_key(self.foreign_keys, &query.table, &relation.table)
                .ok_or_else(|| {
                    StoreError::new(format!(
                        "Could not find a relationship between '{}' and '{}' in the schema cache",
                        query.table, relation.table
                    ))
                    .with_code("PGRST200")
                })?;
            joins.push((relation, key));
        }

        let mut base_filters = Vec::new();
        let mut relation_filters: HashMap<&str, Vec<(&str, &Filter)>> = HashMap::new();
        for filter in &query.filters {
            match filter.relation_path() {
                Some((relation, column)) => {
                    if query.select.relation(relation).is_none() {
                        return Err(StoreError::new(format!(
                            "'{}' is not an embedded resource in this request",
                            relation
                        ))
                        .with_code("PGRST108"));
                    }
                    relation_filters
                        .entry(relation)
                        .or_default()
                        .push((column, filter));
                }
                None => base_filters.push(filter),
            }
        }

        let mut matched: Vec<(&Value, Value)> = Vec::new();

        'rows: for row in rows {
            for filter in &base_filters {
                if !matches(&query.table, row, &filter.column, filter)? {
                    continue 'rows;
                }
            }

            let mut embedded = Map::new();
            for (relation, key) in &joins {
                let mut related = self.related(row, key);
                if let (Some(candidate), Some(filters)) =
                    (related, relation_filters.get(relation.table.as_str()))
                {
                    for (column, filter) in filters {
                        if !matches(&relation.table, candidate, column, filter)? {
                            related = None;
                            break;
                        }
                    }
                }

                match related {
                    Some(related) => {
                        embedded.insert(
                            relation.table.clone(),
                            project(&relation.table, related, &relation.columns)?,
                        );
                    }
                    None if relation.inner => continue 'rows,
                    None => {
                        embedded.insert(relation.table.clone(), Value::Null);
                    }
                }
            }

            let mut output = if query.select.is_all() {
                row.as_object().cloned().unwrap_or_default()
            } else if query.select.columns.is_empty() {
                Map::new()
            } else {
                match project(&query.table, row, &query.select.columns)? {
                    Value::Object(map) => map,
                    _ => Map::new(),
                }
            };
            output.extend(embedded);

            matched.push((row, Value::Object(output)));
        }

        if let Some(order) = &query.order {
            if let Some((row, _)) = matched.first() {
                if row.get(&order.column).is_none() {
                    return Err(missing_column(&query.table, &order.column));
                }
            }
            matched.sort_by(|(a, _), (b, _)| {
                compare_for_order(a.get(&order.column), b.get(&order.column), order.ascending)
            });
        }

        Ok(matched.into_iter().map(|(_, output)| output).collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn execute(&self, query: &Query) -> Result<StoreResponse> {
        match self.evaluate(query) {
            Ok(rows) => Ok(StoreResponse::rows(rows)),
            Err(error) => Ok(StoreResponse::failed(error)),
        }
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

fn missing_column(table: &str, column: &str) -> StoreError {
    StoreError::new(format!("column {}.{} does not exist", table, column)).with_code("42703")
}

fn project(table: &str, row: &Value, columns: &[String]) -> Evaluation<Value> {
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return Ok(row.clone());
    }

    let mut map = Map::with_capacity(columns.len());
    for column in columns {
        let value = row
            .get(column)
            .ok_or_else(|| missing_column(table, column))?;
        map.insert(column.clone(), value.clone());
    }
    Ok(Value::Object(map))
}

fn matches(table: &str, row: &Value, column: &str, filter: &Filter) -> Evaluation<bool> {
    let cell = row.get(column).ok_or_else(|| missing_column(table, column))?;

    if filter.op == FilterOp::ILike {
        let text = match cell {
            Value::Null => return Ok(false),
            Value::String(s) => s.to_lowercase(),
            other => other.to_string().to_lowercase(),
        };
        return Ok(like(&text, &filter.value.to_lowercase()));
    }

    let Some(ordering) = compare_operand(cell, &filter.value)? else {
        return Ok(false);
    };

    Ok(match filter.op {
        FilterOp::Eq => ordering == Ordering::Equal,
        FilterOp::Gte => ordering != Ordering::Less,
        FilterOp::Lte => ordering != Ordering::Greater,
        FilterOp::ILike => false,
    })
}

/// Compare a stored cell with a textual operand, coercing like Postgres would
fn compare_operand(cell: &Value, operand: &str) -> Evaluation<Option<Ordering>> {
    match cell {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(stored) = n.as_i64() {
                let parsed = operand
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| invalid_input("integer", operand))?;
                Ok(Some(stored.cmp(&parsed)))
            } else {
                let stored = n.as_f64().unwrap_or(f64::NAN);
                let parsed = operand
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| invalid_input("numeric", operand))?;
                Ok(stored.partial_cmp(&parsed))
            }
        }
        Value::Bool(stored) => {
            let parsed = match operand.trim().to_ascii_lowercase().as_str() {
                "true" | "t" => true,
                "false" | "f" => false,
                _ => return Err(invalid_input("boolean", operand)),
            };
            Ok(Some(stored.cmp(&parsed)))
        }
        Value::String(stored) => Ok(Some(stored.as_str().cmp(operand))),
        Value::Array(_) | Value::Object(_) => Ok(None),
    }
}

fn invalid_input(kind: &str, operand: &str) -> StoreError {
    StoreError::new(format!(
        "invalid input syntax for type {}: \"{}\"",
        kind, operand
    ))
    .with_code("22P02")
}

/// Postgres default null placement: last when ascending, first when descending
fn compare_for_order(a: Option<&Value>, b: Option<&Value>, ascending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => {
            if ascending {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (Some(_), None) => {
            if ascending {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (Some(a), Some(b)) => {
            let ordering = compare_values(a, b);
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// SQL `LIKE`: `%` (or PostgREST's `*`) matches any run, `_` one character
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern
        .chars()
        .map(|c| if c == '*' { '%' } else { c })
        .collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, mark)) = backtrack {
            p = star + 1;
            t = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}
