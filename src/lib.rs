pub mod cli;
pub mod compat;
pub mod config;
pub mod data;
pub mod ddl;
mod ddl_cmd;
pub mod destination;
pub mod io_utils;
mod map_cmd;
pub mod mapper;
pub mod persist;
pub mod progress;
pub mod similarity;
pub mod source;
pub mod sse;
pub mod table;
mod watch_cmd;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, ConfigAction},
    compat::classify_pair,
    config::Settings,
    persist::DocumentFormat,
    source::InferenceOptions,
};

pub use crate::{
    compat::{Compatibility, SqlFamily, type_compatibility},
    mapper::{ColumnMapping, MatchKind, auto_map, auto_map_columns},
    similarity::{dice_similarity, name_similarity},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("etl_mapper", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let settings_path = Settings::resolve_path(cli.config.as_deref());
    let settings = Settings::load(&settings_path)?;
    debug!("Effective settings: {settings:?}");

    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Map(args) => map_cmd::execute(&args, &settings),
        Commands::Compat(args) => handle_compat(&args, &settings),
        Commands::Score(args) => {
            println!("{:.4}", name_similarity(&args.left, &args.right));
            Ok(())
        }
        Commands::Ddl(args) => ddl_cmd::execute(&args),
        Commands::Watch(args) => watch_cmd::execute(&args),
        Commands::Config(args) => handle_config(&args.action, &settings, &settings_path),
    }
}

pub(crate) fn inference_options(
    input: &Path,
    sample_rows: usize,
    delimiter: Option<u8>,
    encoding: Option<&str>,
) -> Result<InferenceOptions> {
    Ok(InferenceOptions {
        sample_rows,
        delimiter: io_utils::resolve_input_delimiter(input, delimiter),
        encoding: io_utils::resolve_encoding(encoding)?,
    })
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let options = inference_options(
        &args.input,
        args.sample_rows,
        args.delimiter,
        args.input_encoding.as_deref(),
    )?;
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(options.delimiter)
    );
    let schema = source::infer_source_schema(&args.input, &options)
        .with_context(|| format!("Inferring source schema from {:?}", args.input))?;

    match &args.output {
        Some(path) => {
            schema.save(path)?;
            info!(
                "Inferred {} column(s) from {} row(s), written to {:?}",
                schema.columns.len(),
                schema.row_count,
                path
            );
        }
        None => print!("{}", persist::to_string(&schema, DocumentFormat::Yaml)?),
    }
    Ok(())
}

fn handle_compat(args: &cli::CompatArgs, settings: &Settings) -> Result<()> {
    let mut matching = settings.matching.clone();
    matching.permissive_fallback |= args.permissive;
    let verdict = classify_pair(&args.source_type, &args.destination_type, &matching);
    println!(
        "{} -> {}: {verdict}",
        args.source_type, args.destination_type
    );
    Ok(())
}

fn handle_config(action: &ConfigAction, settings: &Settings, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", persist::to_string(settings, DocumentFormat::Yaml)?);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("Settings file {path:?} already exists (use --force to overwrite)");
            }
            Settings::default().persist(path)?;
            info!("Wrote default settings to {path:?}");
        }
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
