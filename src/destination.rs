//! Destination-side schema: the typed columns of the table a job loads into.
//!
//! Tables are usually described in a YAML/JSON document produced by
//! introspecting the target database. For quick experiments columns can also
//! be given inline as `name:type[:not-null][=default]`.

use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationColumn {
    pub name: String,
    #[serde(rename = "type", alias = "sql_type")]
    pub sql_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl DestinationColumn {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default = "default_schema_name")]
    pub schema_name: String,
    #[serde(default)]
    pub table_name: String,
    pub columns: Vec<DestinationColumn>,
}

fn default_schema_name() -> String {
    "public".to_string()
}

impl TableSchema {
    pub fn new(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        columns: Vec<DestinationColumn>,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            columns,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        persist::load_from_path(path)
            .with_context(|| format!("Loading destination schema {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        persist::save_to_path(path, self)
            .with_context(|| format!("Writing destination schema {path:?}"))
    }

    pub fn qualified_name(&self) -> String {
        if self.table_name.is_empty() {
            self.schema_name.clone()
        } else {
            format!("{}.{}", self.schema_name, self.table_name)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColumnSpecError {
    #[error("Column definition '{0}' must use the form name:type")]
    MissingType(String),
    #[error("Column name cannot be empty in definition '{0}'")]
    EmptyName(String),
    #[error("Column '{0}' has an empty type")]
    EmptyType(String),
    #[error("Column '{column}' has unknown modifier '{modifier}'")]
    UnknownModifier { column: String, modifier: String },
    #[error("Duplicate column name '{0}' provided")]
    Duplicate(String),
}

/// Parses inline destination columns. Each entry may hold several
/// comma-separated definitions; a type may itself contain a comma inside
/// parentheses, as in `amount:decimal(18,2)`.
pub fn parse_column_specs(specs: &[String]) -> Result<Vec<DestinationColumn>, ColumnSpecError> {
    let mut columns = Vec::new();
    let mut seen = HashSet::new();

    for raw in specs {
        for token in split_outside_parens(raw) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let column = parse_column_spec(token)?;
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(ColumnSpecError::Duplicate(column.name));
            }
            columns.push(column);
        }
    }
    Ok(columns)
}

fn parse_column_spec(token: &str) -> Result<DestinationColumn, ColumnSpecError> {
    let (definition, default) = match token.split_once('=') {
        Some((definition, default)) => (definition, Some(default.trim().to_string())),
        None => (token, None),
    };
    let (name, rest) = definition
        .split_once(':')
        .ok_or_else(|| ColumnSpecError::MissingType(token.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ColumnSpecError::EmptyName(token.to_string()));
    }

    let mut parts = rest.split(':');
    let sql_type = parts.next().unwrap_or_default().trim();
    if sql_type.is_empty() {
        return Err(ColumnSpecError::EmptyType(name.to_string()));
    }

    let mut nullable = true;
    for modifier in parts {
        match modifier.trim().to_ascii_lowercase().as_str() {
            "not-null" | "notnull" | "required" => nullable = false,
            "null" | "nullable" => nullable = true,
            other => {
                return Err(ColumnSpecError::UnknownModifier {
                    column: name.to_string(),
                    modifier: other.to_string(),
                });
            }
        }
    }

    Ok(DestinationColumn {
        name: name.to_string(),
        sql_type: sql_type.to_string(),
        nullable,
        default: default.filter(|d| !d.is_empty()),
    })
}

fn split_outside_parens(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (idx, ch) in raw.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&raw[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}
