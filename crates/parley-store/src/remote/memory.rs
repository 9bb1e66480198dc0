//! In-process [`RestClient`] used by the remote store tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::rest::{Filter, Order, RestClient};
use crate::error::{Result, StoreError};

#[derive(Default)]
pub struct MemoryRest {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    widest_in: Mutex<usize>,
}

fn cell(row: &Value, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| match f {
        Filter::Eq(c, v) => cell(row, c) == *v,
        Filter::In(c, vs) => vs.contains(&cell(row, c)),
    })
}

fn rows_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        row => vec![row],
    }
}

impl MemoryRest {
    fn with_tables<T>(&self, f: impl FnOnce(&mut HashMap<String, Vec<Value>>) -> T) -> Result<T> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&mut tables))
    }

    fn note_filters(&self, filters: &[Filter]) {
        let widest = filters
            .iter()
            .map(|f| match f {
                Filter::In(_, vs) => vs.len(),
                Filter::Eq(..) => 0,
            })
            .max()
            .unwrap_or(0);
        if let Ok(mut seen) = self.widest_in.lock() {
            *seen = (*seen).max(widest);
        }
    }

    /// Most values any single `in` filter has carried so far.
    pub fn widest_in_filter(&self) -> usize {
        self.widest_in.lock().map_or(0, |seen| *seen)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.with_tables(|t| t.get(table).map_or(0, Vec::len)).unwrap_or(0)
    }
}

#[async_trait]
impl RestClient for MemoryRest {
    async fn select(&self, table: &str, filters: &[Filter], order: Option<Order>) -> Result<Vec<Value>> {
        self.note_filters(filters);
        self.with_tables(|t| {
            let mut rows: Vec<Value> = t
                .get(table)
                .map(|rows| rows.iter().filter(|r| matches(r, filters)).cloned().collect())
                .unwrap_or_default();
            if let Some(order) = order {
                rows.sort_by_key(|r| cell(r, order.column));
                if order.descending {
                    rows.reverse();
                }
            }
            rows
        })
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<()> {
        self.with_tables(|t| t.entry(table.to_string()).or_default().extend(rows_of(rows)))
    }

    async fn upsert(&self, table: &str, rows: Value) -> Result<()> {
        self.with_tables(|t| {
            let existing = t.entry(table.to_string()).or_default();
            for row in rows_of(rows) {
                let id = cell(&row, "id");
                match existing.iter_mut().find(|r| cell(r, "id") == id) {
                    Some(slot) => *slot = row,
                    None => existing.push(row),
                }
            }
        })
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<usize> {
        self.with_tables(|t| {
            let mut updated = 0;
            for row in t.get_mut(table).into_iter().flatten() {
                if !matches(row, filters) {
                    continue;
                }
                if let (Value::Object(target), Value::Object(fields)) = (&mut *row, &patch) {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }
                updated += 1;
            }
            updated
        })
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize> {
        self.note_filters(filters);
        self.with_tables(|t| {
            let Some(rows) = t.get_mut(table) else {
                return 0;
            };
            let before = rows.len();
            rows.retain(|r| !matches(r, filters));
            before - rows.len()
        })
    }
}
