//! `CREATE TABLE` generation for jobs that load into a new destination table.
//!
//! Column definitions come from the column mappings: excluded or unmapped
//! columns are skipped, the rest are emitted in `column_order`. Every
//! generated table also receives `created_at`/`updated_at` audit columns and,
//! when any mapping is flagged as a key, a `PRIMARY KEY` constraint.

use std::{collections::HashSet, fmt, sync::OnceLock};

use clap::ValueEnum;
use heck::ToSnakeCase;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    compat::Compatibility,
    mapper::ColumnMapping,
    source::{SemanticType, SourceSchema},
};

const MAX_IDENTIFIER_LEN: usize = 63;
const AUDIT_COLUMNS: &[&str] = &["created_at", "updated_at"];
const RESERVED_WORDS: &[&str] = &[
    "user", "table", "column", "index", "view", "select", "insert", "update", "delete", "create",
    "drop", "alter", "grant", "revoke",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgresql,
    Redshift,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Postgresql => "postgresql",
            Dialect::Redshift => "redshift",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DdlError {
    #[error("{kind} name cannot be empty")]
    EmptyIdentifier { kind: &'static str },
    #[error(
        "{kind} name must start with a letter or underscore and contain only alphanumeric characters, underscores, and hyphens: {name}"
    )]
    InvalidIdentifier { kind: &'static str, name: String },
    #[error("{kind} name too long (max 63 characters): {name}")]
    IdentifierTooLong { kind: &'static str, name: String },
    #[error("{kind} name '{name}' is a SQL reserved word")]
    ReservedWord { kind: &'static str, name: String },
    #[error("no mapped columns to create")]
    NoColumns,
    #[error("destination column '{0}' is defined more than once")]
    DuplicateColumn(String),
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("identifier pattern compiles")
    })
}

pub fn validate_identifier(name: &str, kind: &'static str) -> Result<(), DdlError> {
    if name.is_empty() {
        return Err(DdlError::EmptyIdentifier { kind });
    }
    if !identifier_pattern().is_match(name) {
        return Err(DdlError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        });
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(DdlError::IdentifierTooLong {
            kind,
            name: name.to_string(),
        });
    }
    if RESERVED_WORDS.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(DdlError::ReservedWord {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Identifiers are emitted bare when they are plain and double-quoted
/// otherwise (spaces, hyphens, reserved words).
fn column_identifier(name: &str) -> String {
    let plain = identifier_pattern().is_match(name)
        && !name.contains('-')
        && !RESERVED_WORDS.contains(&name.to_ascii_lowercase().as_str());
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

pub fn default_sql_type(semantic: SemanticType) -> &'static str {
    match semantic {
        SemanticType::Text => "TEXT",
        SemanticType::Number => "NUMERIC",
        SemanticType::Date => "TIMESTAMP",
        SemanticType::Boolean => "BOOLEAN",
    }
}

/// Maps a mapping's destination type onto the SQL type written to the DDL.
/// Unrecognised types fall back to `TEXT`.
pub fn map_sql_type(type_name: &str, dialect: Dialect) -> String {
    let upper = type_name.trim().to_ascii_uppercase();
    let mapped = match upper.as_str() {
        "TEXT" | "STRING" => "TEXT",
        "VARCHAR" => "VARCHAR(255)",
        "INTEGER" | "INT" => "INTEGER",
        "BIGINT" => "BIGINT",
        "NUMERIC" | "NUMBER" | "FLOAT" => "NUMERIC",
        "DECIMAL" => "DECIMAL(18,2)",
        "TIMESTAMP" | "DATETIME" => "TIMESTAMP",
        "TIMESTAMPTZ" => "TIMESTAMP WITH TIME ZONE",
        "DATE" => {
            // lower-case `date` is the source family name, not the SQL type
            if type_name.trim() == "date" {
                "TIMESTAMP"
            } else {
                "DATE"
            }
        }
        "TIME" => "TIME",
        "BOOLEAN" | "BOOL" => "BOOLEAN",
        "JSON" | "JSONB" => match dialect {
            Dialect::Postgresql => return upper,
            Dialect::Redshift => "SUPER",
        },
        _ if ["VARCHAR", "DECIMAL", "NUMERIC", "CHAR"]
            .iter()
            .any(|prefix| upper.starts_with(&format!("{prefix}("))) =>
        {
            return upper;
        }
        _ => "TEXT",
    };
    mapped.to_string()
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn column_definition(mapping: &ColumnMapping, name: &str, dialect: Dialect) -> String {
    let sql_type = match mapping.destination_type.as_deref() {
        Some(ty) => map_sql_type(ty, dialect),
        None => default_sql_type(mapping.source_type).to_string(),
    };
    let mut definition = format!("{} {sql_type}", column_identifier(name));
    if !mapping.is_nullable {
        definition.push_str(" NOT NULL");
    }
    if let Some(default) = mapping.default_value.as_deref().filter(|d| !d.is_empty()) {
        let textual = ["TEXT", "VARCHAR", "CHAR"]
            .iter()
            .any(|prefix| sql_type.starts_with(prefix));
        if textual {
            definition.push_str(&format!(" DEFAULT {}", quote_literal(default)));
        } else {
            definition.push_str(&format!(" DEFAULT {default}"));
        }
    }
    definition
}

pub fn generate_ddl(
    schema: &str,
    table: &str,
    mappings: &[ColumnMapping],
    dialect: Dialect,
) -> Result<String, DdlError> {
    validate_identifier(schema, "schema")?;
    validate_identifier(table, "table")?;

    let active: Vec<(&ColumnMapping, &str)> = mappings
        .iter()
        .filter(|m| !m.exclude)
        .filter_map(|m| m.destination_column.as_deref().map(|name| (m, name)))
        .sorted_by_key(|(m, _)| m.column_order)
        .collect();
    if active.is_empty() {
        return Err(DdlError::NoColumns);
    }

    let mut seen = HashSet::new();
    let mut definitions = Vec::with_capacity(active.len() + 3);
    for (mapping, name) in &active {
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(DdlError::DuplicateColumn(name.to_string()));
        }
        definitions.push(column_definition(mapping, name, dialect));
    }

    for audit in AUDIT_COLUMNS {
        if !seen.contains(*audit) {
            definitions.push(format!("{audit} TIMESTAMP DEFAULT CURRENT_TIMESTAMP NOT NULL"));
        }
    }

    let keys = active
        .iter()
        .filter(|(m, _)| m.is_primary_key)
        .map(|(_, name)| column_identifier(name))
        .join(", ");
    if !keys.is_empty() {
        definitions.push(format!("PRIMARY KEY ({keys})"));
    }

    Ok(format!(
        "CREATE TABLE {}.{} (\n    {}\n);",
        column_identifier(schema),
        column_identifier(table),
        definitions.join(",\n    ")
    ))
}

/// Proposes a new destination column for every source column: snake_case
/// names (deduplicated with a numeric suffix) and the default SQL type of
/// the inferred family.
pub fn propose_destination(source: &SourceSchema) -> Vec<ColumnMapping> {
    let mut used = HashSet::new();
    source
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let mut base = column.name.to_snake_case();
            if base.is_empty() {
                base = format!("column_{}", idx + 1);
            } else if base.starts_with(|c: char| c.is_ascii_digit()) {
                base = format!("col_{base}");
            }
            let mut name = base.clone();
            let mut suffix = 2;
            while !used.insert(name.clone()) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            ColumnMapping {
                source_column: column.name.clone(),
                destination_column: Some(name),
                source_type: column.inferred_type,
                destination_type: Some(default_sql_type(column.inferred_type).to_string()),
                transformation: None,
                is_nullable: column.is_nullable,
                default_value: None,
                exclude: false,
                is_calculated: false,
                column_order: idx,
                is_primary_key: false,
                match_kind: None,
                similarity: None,
                compatibility: Some(Compatibility::Compatible),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceColumn;

    fn mapping(dest: &str, ty: &str, order: usize) -> ColumnMapping {
        ColumnMapping {
            source_column: dest.to_string(),
            destination_column: Some(dest.to_string()),
            source_type: SemanticType::Text,
            destination_type: Some(ty.to_string()),
            transformation: None,
            is_nullable: true,
            default_value: None,
            exclude: false,
            is_calculated: false,
            column_order: order,
            is_primary_key: false,
            match_kind: None,
            similarity: None,
            compatibility: None,
        }
    }

    #[test]
    fn renders_ordered_columns_audit_fields_and_key() {
        let mut id = mapping("id", "INTEGER", 0);
        id.is_nullable = false;
        id.is_primary_key = true;
        let mut status = mapping("status", "varchar(20)", 2);
        status.default_value = Some("it's new".to_string());
        let mut skipped = mapping("ignored", "text", 3);
        skipped.exclude = true;
        let amount = mapping("amount", "decimal", 1);

        let ddl = generate_ddl(
            "public",
            "orders",
            &[status, skipped, id, amount],
            Dialect::Postgresql,
        )
        .expect("ddl");

        assert_eq!(
            ddl,
            "CREATE TABLE public.orders (\n    id INTEGER NOT NULL,\n    amount DECIMAL(18,2),\n    status VARCHAR(20) DEFAULT 'it''s new',\n    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP NOT NULL,\n    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP NOT NULL,\n    PRIMARY KEY (id)\n);"
        );
    }

    #[test]
    fn rejects_bad_identifiers() {
        let columns = [mapping("id", "int", 0)];
        assert_eq!(
            generate_ddl("public", "user", &columns, Dialect::Postgresql),
            Err(DdlError::ReservedWord {
                kind: "table",
                name: "user".to_string()
            })
        );
        assert!(matches!(
            generate_ddl("1public", "orders", &columns, Dialect::Postgresql),
            Err(DdlError::InvalidIdentifier { kind: "schema", .. })
        ));
        let long = "t".repeat(64);
        assert!(matches!(
            generate_ddl("public", &long, &columns, Dialect::Postgresql),
            Err(DdlError::IdentifierTooLong { .. })
        ));
        assert_eq!(
            generate_ddl("public", "orders", &[], Dialect::Postgresql),
            Err(DdlError::NoColumns)
        );
    }

    #[test]
    fn type_mapping_follows_dialect() {
        assert_eq!(map_sql_type("jsonb", Dialect::Postgresql), "JSONB");
        assert_eq!(map_sql_type("jsonb", Dialect::Redshift), "SUPER");
        assert_eq!(map_sql_type("varchar(40)", Dialect::Postgresql), "VARCHAR(40)");
        assert_eq!(map_sql_type("numeric(12, 2)", Dialect::Redshift), "NUMERIC(12, 2)");
        assert_eq!(map_sql_type("geometry", Dialect::Postgresql), "TEXT");
        assert_eq!(map_sql_type("date", Dialect::Postgresql), "TIMESTAMP");
        assert_eq!(map_sql_type("DATE", Dialect::Postgresql), "DATE");
    }

    #[test]
    fn proposals_are_snake_case_and_unique() {
        let source = SourceSchema {
            origin: None,
            row_count: 0,
            columns: vec![
                SourceColumn::new("Full Name", SemanticType::Text),
                SourceColumn::new("full-name", SemanticType::Text),
                SourceColumn::new("2nd Score", SemanticType::Number),
                SourceColumn::new("Signed Up", SemanticType::Date),
            ],
        };
        let proposed = propose_destination(&source);
        let names: Vec<&str> = proposed
            .iter()
            .filter_map(|m| m.destination_column.as_deref())
            .collect();
        assert_eq!(names, vec!["full_name", "full_name_2", "col_2nd_score", "signed_up"]);
        assert_eq!(proposed[2].destination_type.as_deref(), Some("NUMERIC"));
        assert_eq!(proposed[3].destination_type.as_deref(), Some("TIMESTAMP"));

        let ddl = generate_ddl("public", "signups", &proposed, Dialect::Redshift).expect("ddl");
        assert!(ddl.contains("col_2nd_score NUMERIC"));
    }

    #[test]
    fn hyphenated_schema_and_table_are_quoted() {
        let ddl = generate_ddl(
            "my-schema",
            "daily-orders",
            &[mapping("id", "integer", 0)],
            Dialect::Postgresql,
        )
        .expect("ddl");
        assert!(ddl.starts_with("CREATE TABLE \"my-schema\".\"daily-orders\" (\n"));

        let plain = generate_ddl("sales", "orders", &[mapping("id", "integer", 0)], Dialect::Redshift)
            .expect("ddl");
        assert!(plain.starts_with("CREATE TABLE sales.orders (\n"));
    }

    #[test]
    fn odd_column_names_are_quoted() {
        let ddl = generate_ddl(
            "public",
            "t",
            &[mapping("Order Total", "numeric", 0), mapping("select", "text", 1)],
            Dialect::Postgresql,
        )
        .expect("ddl");
        assert!(ddl.contains("\"Order Total\" NUMERIC"));
        assert!(ddl.contains("\"select\" TEXT"));
    }
}
