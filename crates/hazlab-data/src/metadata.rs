//! Hazard model metadata records and their logic-tree fields.
//!
//! The store serializes logic trees as text. Older records use the Python
//! literal dialect (single quotes, `True`/`None`, integer dict keys, tuples),
//! newer ones plain JSON; [`LogicTree::parse`] accepts both.

use crate::{HazardError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata record describing one hazard model run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardMetadata {
    /// Hazard model identifier.
    #[serde(rename = "hazard_model_id")]
    pub hazard_id: String,
    /// Intensity measure types with curves.
    #[serde(rename = "imts")]
    pub intensity_measure_types: Vec<String>,
    /// Site VS30 in m/s.
    pub vs30: u32,
    /// Aggregate statistic labels with curves.
    #[serde(rename = "aggs", default)]
    pub aggregate_labels: Vec<String>,
    /// Serialized realization logic tree.
    #[serde(rename = "rlz_lt")]
    pub realization_lt: String,
    /// Serialized source logic tree.
    #[serde(rename = "src_lt")]
    pub source_lt: String,
    /// Serialized ground motion logic tree.
    #[serde(rename = "gsim_lt", default)]
    pub gsim_lt: String,
    /// Hazard solution identifier.
    #[serde(rename = "haz_sol_id")]
    pub solution_id: String,
    /// Range keys of the solution/VS30 combinations.
    #[serde(default)]
    pub hazsol_vs30_rk: Vec<String>,
    /// Location codes with curves.
    #[serde(rename = "locs")]
    pub locations: Vec<String>,
}

/// A parsed logic tree: named columns, one entry per branch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogicTree {
    columns: BTreeMap<String, Vec<Value>>,
}

impl LogicTree {
    /// Parse a serialized logic tree.
    ///
    /// The top level must be a mapping from column name to either a list or a
    /// mapping keyed by branch index (the latter is ordered by index).
    pub fn parse(text: &str) -> Result<Self> {
        let json = python_literal_to_json(text)?;
        let value: Value =
            serde_json::from_str(&json).map_err(|e| HazardError::LogicTree(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build from an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(HazardError::LogicTree("top level is not a mapping".into()));
        };

        let mut columns = BTreeMap::new();
        for (name, column) in map {
            let entries = match column {
                Value::Array(items) => items,
                Value::Object(indexed) => {
                    let mut items = Vec::with_capacity(indexed.len());
                    for (idx, v) in indexed {
                        let idx: usize = idx.parse().map_err(|_| {
                            HazardError::LogicTree(format!(
                                "column '{name}' has non-integer index '{idx}'"
                            ))
                        })?;
                        items.push((idx, v));
                    }
                    items.sort_by_key(|(idx, _)| *idx);
                    items.into_iter().map(|(_, v)| v).collect()
                }
                other => vec![other],
            };
            columns.insert(name, entries);
        }
        Ok(Self { columns })
    }

    /// Entries of a column, if present.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Column names, sorted.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Branch weights from the `weight` column.
    pub fn weights(&self) -> Result<Vec<f64>> {
        let column = self
            .column("weight")
            .ok_or_else(|| HazardError::LogicTree("missing 'weight' column".into()))?;
        column
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| HazardError::LogicTree(format!("non-numeric weight {v}")))
            })
            .collect()
    }

    /// Number of branches, i.e. the length of the `weight` column.
    pub fn branch_count(&self) -> Result<usize> {
        self.column("weight")
            .map(<[Value]>::len)
            .ok_or_else(|| HazardError::LogicTree("missing 'weight' column".into()))
    }
}

/// Rewrite Python literal syntax as JSON.
///
/// Handles single- and double-quoted strings, `True`/`False`/`None`, tuples,
/// and bare (numeric) dict keys. Plain JSON passes through unchanged.
fn python_literal_to_json(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len() + 16);
    let mut chars = text.chars().peekable();
    // Start of the last bare token written to `out`, for quoting dict keys.
    let mut token_start: Option<usize> = None;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                token_start = None;
                out.push('"');
                let mut closed = false;
                while let Some(s) = chars.next() {
                    match s {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(e) => {
                                out.push('\\');
                                out.push(e);
                            }
                            None => break,
                        },
                        _ if s == c => {
                            closed = true;
                            break;
                        }
                        '"' => out.push_str("\\\""),
                        _ => out.push(s),
                    }
                }
                if !closed {
                    return Err(HazardError::LogicTree("unterminated string".into()));
                }
                out.push('"');
            }
            ':' => {
                if let Some(start) = token_start.take() {
                    let key = out[start..].trim_end().to_string();
                    out.truncate(start);
                    out.push('"');
                    out.push_str(&key);
                    out.push('"');
                }
                out.push(':');
            }
            '(' => {
                token_start = None;
                out.push('[');
            }
            ')' => {
                token_start = None;
                out.push(']');
            }
            c if c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '+') => {
                let start = out.len();
                let mut token = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_alphanumeric() || matches!(n, '_' | '.' | '-' | '+') {
                        token.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match token.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    _ => out.push_str(token.strip_prefix('+').unwrap_or(&token)),
                }
                token_start = Some(start);
            }
            c if c.is_whitespace() => out.push(c),
            _ => {
                token_start = None;
                out.push(c);
            }
        }
    }
    Ok(fix_trailing_commas(&out))
}

/// Python allows `[1, 2,]` and `(1,)`; JSON does not.
fn fix_trailing_commas(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_comma: Option<String> = None;

    for c in json.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if let Some(mut buf) = pending_comma.take() {
            if c.is_whitespace() {
                buf.push(c);
                pending_comma = Some(buf);
                continue;
            }
            if matches!(c, ']' | '}') {
                out.push_str(&buf[1..]);
            } else {
                out.push_str(&buf);
            }
        }
        match c {
            ',' => pending_comma = Some(String::from(",")),
            '"' => {
                in_string = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    if let Some(buf) = pending_comma {
        out.push_str(&buf);
    }
    out
}
