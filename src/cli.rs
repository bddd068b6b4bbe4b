use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{config::ColorMode, ddl::Dialect};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Map CSV sources onto database tables and follow ETL job runs",
    long_about = None
)]
pub struct Cli {
    /// Settings file (defaults to $ETL_MAPPER_CONFIG, then ./etl-mapper.yml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer the semantic type of every column of a CSV file
    Probe(ProbeArgs),
    /// Suggest column mappings from a source schema onto a destination table
    Map(MapArgs),
    /// Classify the compatibility of a source type and a destination type
    Compat(CompatArgs),
    /// Print the bigram similarity of two column names
    Score(ScoreArgs),
    /// Render CREATE TABLE DDL from column mappings or a source schema
    Ddl(DdlArgs),
    /// Follow the progress event stream of a job run
    Watch(WatchArgs),
    /// Inspect or initialise the settings file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input CSV file to inspect (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination schema document (.json or .yml); stdout when omitted
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long, default_value_t = 2000)]
    pub sample_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (a byte-order mark wins; defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct SourceInput {
    /// Source schema produced by `probe`
    #[arg(short = 's', long = "source", conflicts_with = "input", required_unless_present = "input")]
    pub source: Option<PathBuf>,
    /// CSV file to probe on the fly instead of a saved source schema
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Rows to sample when probing --input (0 means full scan)
    #[arg(long, default_value_t = 2000)]
    pub sample_rows: usize,
    /// CSV delimiter character for --input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of --input (a byte-order mark wins; defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub source: SourceInput,
    /// Destination table schema document
    #[arg(short = 'd', long = "dest", required_unless_present = "dest_columns")]
    pub dest: Option<PathBuf>,
    /// Inline destination columns such as `id:integer:not-null,name:varchar=unknown`
    #[arg(long = "dest-column", action = clap::ArgAction::Append)]
    pub dest_columns: Vec<String>,
    /// Write the mappings to this .json/.yml file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Fuzzy-match threshold overriding the settings file
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Treat unlisted type pairs as compatible
    #[arg(long)]
    pub permissive: bool,
    /// Allow several source columns to share a destination column
    #[arg(long = "allow-shared")]
    pub allow_shared: bool,
    /// Report format written to stdout
    #[arg(long, value_enum, default_value = "table")]
    pub format: ReportFormat,
    /// Colorize the table report
    #[arg(long, value_enum)]
    pub color: Option<ColorMode>,
    /// Exit with an error when a mapped column is incompatible or unknown
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    Table,
    Json,
    Yaml,
    None,
}

#[derive(Debug, Args)]
pub struct CompatArgs {
    /// Source type (text, number, date, boolean, or an SQL type)
    pub source_type: String,
    /// Destination SQL type
    pub destination_type: String,
    /// Treat unlisted type pairs as compatible
    #[arg(long)]
    pub permissive: bool,
}

#[derive(Debug, Args)]
pub struct ScoreArgs {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Args)]
pub struct DdlArgs {
    /// Column mappings produced by `map`
    #[arg(short = 'm', long = "mappings", conflicts_with = "source", required_unless_present = "source")]
    pub mappings: Option<PathBuf>,
    /// Source schema to propose a brand-new table from
    #[arg(short = 's', long = "source")]
    pub source: Option<PathBuf>,
    /// Destination schema name
    #[arg(long = "schema", default_value = "public")]
    pub schema: String,
    /// Destination table name
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// Target database dialect
    #[arg(long, value_enum, default_value = "postgresql")]
    pub dialect: Dialect,
    /// Comma-separated destination columns forming the primary key
    #[arg(long = "primary-key", value_delimiter = ',')]
    pub primary_key: Vec<String>,
    /// Write the DDL to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Job-run identifier being followed
    #[arg(short = 'r', long = "run-id")]
    pub run_id: u64,
    /// Event stream to read (`-` for stdin, e.g. piped from `curl -N`)
    #[arg(short = 'i', long = "input", default_value = "-")]
    pub input: PathBuf,
    /// Only print the final outcome
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings as YAML
    Show,
    /// Write default settings to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
