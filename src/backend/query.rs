//! Query descriptions for table reads
//!
//! A [`Query`] is a plain value describing `select * from <table>` with
//! equality/range filters, ordering and an optional limit. The REST client
//! renders it to PostgREST query parameters; the in-memory backend
//! evaluates it directly against stored rows.

use crate::types::Table;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison operator of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

impl FilterOp {
    fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
        }
    }
}

/// A single column filter
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A read-only table query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    /// `select *` over a whole table
    pub fn select(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        });
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::Gte,
            value: value.into(),
        });
        self
    }

    pub fn lte(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::Lte,
            value: value.into(),
        });
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render as PostgREST query parameters
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        for filter in &self.filters {
            params.push((
                filter.column.clone(),
                format!("{}.{}", filter.op.as_str(), filter.value),
            ));
        }
        if let Some((column, direction)) = &self.order {
            let dir = match direction {
                Direction::Ascending => "asc",
                Direction::Descending => "desc",
            };
            params.push(("order".to_string(), format!("{}.{}", column, dir)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Evaluate the query against in-memory rows
    pub fn apply(&self, rows: &[Value]) -> Vec<Value> {
        let mut out: Vec<Value> = rows
            .iter()
            .filter(|row| self.filters.iter().all(|f| matches_filter(row, f)))
            .cloned()
            .collect();

        if let Some((column, direction)) = &self.order {
            out.sort_by(|a, b| {
                let ord = compare_cells(a.get(column), b.get(column));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Format a timestamp for use as a filter value
pub fn timestamp_param(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn matches_filter(row: &Value, filter: &Filter) -> bool {
    let Some(cell) = row.get(&filter.column) else {
        return false;
    };
    let target = Value::String(filter.value.clone());
    let ord = compare_cells(Some(cell), Some(&target));
    match filter.op {
        FilterOp::Eq => ord == Ordering::Equal,
        FilterOp::Gte => ord != Ordering::Less,
        FilterOp::Lte => ord != Ordering::Greater,
    }
}

/// Compare two JSON cells the way the store would: numbers numerically,
/// timestamps chronologically, everything else as text.
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let (ta, tb) = (cell_text(a), cell_text(b));
            if let (Ok(x), Ok(y)) = (ta.parse::<f64>(), tb.parse::<f64>()) {
                return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            }
            if let (Ok(x), Ok(y)) = (
                crate::types::parse_timestamp(&ta),
                crate::types::parse_timestamp(&tb),
            ) {
                return x.cmp(&y);
            }
            ta.cmp(&tb)
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
