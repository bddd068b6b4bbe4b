//! Source-side schema: the columns of an uploaded CSV together with the
//! semantic type inferred for each of them.

use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::{is_boolean_token, is_numeric, is_temporal},
    io_utils, persist,
};

const MAX_SAMPLE_VALUES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Text,
    Number,
    Date,
    Boolean,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Text => "text",
            SemanticType::Number => "number",
            SemanticType::Date => "date",
            SemanticType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(SemanticType::Text),
            "number" | "numeric" => Ok(SemanticType::Number),
            "date" | "datetime" => Ok(SemanticType::Date),
            "boolean" | "bool" => Ok(SemanticType::Boolean),
            other => Err(anyhow!(
                "Unknown source type '{other}' (expected text, number, date, or boolean)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceColumn {
    pub name: String,
    #[serde(alias = "data_type", alias = "type")]
    pub inferred_type: SemanticType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<String>,
    #[serde(default)]
    pub null_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_count: Option<usize>,
    #[serde(default = "default_true")]
    pub is_nullable: bool,
}

fn default_true() -> bool {
    true
}

impl SourceColumn {
    pub fn new(name: impl Into<String>, inferred_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            inferred_type,
            sample_values: Vec::new(),
            null_count: 0,
            unique_count: None,
            is_nullable: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<PathBuf>,
    #[serde(default)]
    pub row_count: usize,
    pub columns: Vec<SourceColumn>,
}

impl SourceSchema {
    pub fn load(path: &Path) -> Result<Self> {
        persist::load_from_path(path).with_context(|| format!("Loading source schema {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        persist::save_to_path(path, self)
            .with_context(|| format!("Writing source schema {path:?}"))
    }

    pub fn column(&self, name: &str) -> Option<&SourceColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InferenceOptions {
    /// Rows to sample; `0` scans the whole file.
    pub sample_rows: usize,
    pub delimiter: u8,
    /// Explicit input encoding; `None` sniffs a BOM, then assumes UTF-8.
    pub encoding: Option<&'static Encoding>,
}

#[derive(Debug, Default)]
struct ColumnProfile {
    non_empty: usize,
    null_count: usize,
    possible_boolean: bool,
    possible_number: bool,
    possible_date: bool,
    boolean_values: BTreeSet<String>,
    distinct: HashSet<String>,
    samples: Vec<String>,
}

impl ColumnProfile {
    fn new() -> Self {
        Self {
            possible_boolean: true,
            possible_number: true,
            possible_date: true,
            ..Self::default()
        }
    }

    fn observe(&mut self, raw: &str) {
        let value = raw.trim();
        if value.is_empty() {
            self.null_count += 1;
            return;
        }
        self.non_empty += 1;
        if self.samples.len() < MAX_SAMPLE_VALUES {
            self.samples.push(value.to_string());
        }
        self.distinct.insert(value.to_string());

        if self.possible_boolean {
            if is_boolean_token(value) {
                self.boolean_values.insert(value.to_ascii_lowercase());
                if self.boolean_values.len() > 2 {
                    self.possible_boolean = false;
                }
            } else {
                self.possible_boolean = false;
            }
        }
        if self.possible_number && !is_numeric(value) {
            self.possible_number = false;
        }
        if self.possible_date && !is_temporal(value) {
            self.possible_date = false;
        }
    }

    fn decide(&self) -> SemanticType {
        if self.non_empty == 0 {
            SemanticType::Text
        } else if self.possible_boolean {
            SemanticType::Boolean
        } else if self.possible_number {
            SemanticType::Number
        } else if self.possible_date {
            SemanticType::Date
        } else {
            SemanticType::Text
        }
    }

    fn into_column(self, name: String) -> SourceColumn {
        let inferred_type = self.decide();
        SourceColumn {
            name,
            inferred_type,
            sample_values: self.samples,
            null_count: self.null_count,
            unique_count: Some(self.distinct.len()),
            is_nullable: self.null_count > 0,
        }
    }
}

pub fn infer_source_schema(path: &Path, options: &InferenceOptions) -> Result<SourceSchema> {
    let mut reader = io_utils::open_csv_reader(path, options.delimiter, options.encoding)?;
    let headers = io_utils::reader_headers(&mut reader)
        .with_context(|| format!("Reading headers from {path:?}"))?;
    let mut profiles: Vec<ColumnProfile> = headers.iter().map(|_| ColumnProfile::new()).collect();

    let mut record = csv::ByteRecord::new();
    let mut processed = 0usize;
    loop {
        if options.sample_rows > 0 && processed >= options.sample_rows {
            break;
        }
        let more = reader
            .read_byte_record(&mut record)
            .with_context(|| format!("Reading row {} of {path:?}", processed + 2))?;
        if !more {
            break;
        }
        let fields = io_utils::decode_record(&record)
            .with_context(|| format!("Decoding row {}", processed + 2))?;
        for (idx, profile) in profiles.iter_mut().enumerate() {
            // missing trailing fields count as empty
            profile.observe(fields.get(idx).map(String::as_str).unwrap_or(""));
        }
        processed += 1;
    }

    let columns = headers
        .into_iter()
        .zip(profiles)
        .map(|(name, profile)| {
            let column = profile.into_column(name.trim().to_string());
            debug!(
                "Column '{}' inferred as {} ({} null)",
                column.name, column.inferred_type, column.null_count
            );
            column
        })
        .collect();

    Ok(SourceSchema {
        origin: (!io_utils::is_dash(path)).then(|| path.to_path_buf()),
        row_count: processed,
        columns,
    })
}
