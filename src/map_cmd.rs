use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::{
    cli::{MapArgs, ReportFormat, SourceInput},
    config::Settings,
    destination::{TableSchema, parse_column_specs},
    inference_options,
    mapper::{self, MappingSummary},
    persist::{self, DocumentFormat},
    printable_delimiter,
    source::{self, SourceSchema},
    table,
};

pub fn execute(args: &MapArgs, settings: &Settings) -> Result<()> {
    let source = load_source(&args.source)?;
    let destination = load_destination(args)?;
    if destination.columns.is_empty() {
        bail!("Destination {} has no columns", destination.qualified_name());
    }

    let mut matching = settings.matching.clone();
    if let Some(threshold) = args.threshold {
        matching.similarity_threshold = threshold;
    }
    matching.permissive_fallback |= args.permissive;
    matching.allow_shared_destinations |= args.allow_shared;
    matching.validate()?;

    let mappings = mapper::auto_map(&source, &destination, &matching);
    let summary = mapper::summarize(&mappings);
    log_summary(&summary, &destination);

    if let Some(path) = &args.output {
        mapper::save_mappings(path, &mappings)?;
        info!("Mappings written to {path:?}");
    }

    match args.format {
        ReportFormat::Table => {
            let color = args.color.unwrap_or(settings.display.color).enabled();
            print!("{}", table::render_mappings(&mappings, color));
        }
        ReportFormat::Json => print!("{}", persist::to_string(&mappings, DocumentFormat::Json)?),
        ReportFormat::Yaml => print!("{}", persist::to_string(&mappings, DocumentFormat::Yaml)?),
        ReportFormat::None => {}
    }

    if args.strict && summary.needs_review() {
        bail!(
            "{} mapped column(s) are incompatible or of unknown compatibility",
            summary.verdict_count("incompatible") + summary.verdict_count("unknown")
        );
    }
    Ok(())
}

fn load_source(input: &SourceInput) -> Result<SourceSchema> {
    if let Some(path) = &input.source {
        return SourceSchema::load(path);
    }
    let Some(path) = &input.input else {
        bail!("Either --source or --input is required");
    };
    let options = inference_options(
        path,
        input.sample_rows,
        input.delimiter,
        input.input_encoding.as_deref(),
    )?;
    info!(
        "Probing '{}' with delimiter '{}'",
        path.display(),
        printable_delimiter(options.delimiter)
    );
    source::infer_source_schema(path, &options)
        .with_context(|| format!("Inferring source schema from {path:?}"))
}

fn load_destination(args: &MapArgs) -> Result<TableSchema> {
    let mut destination = match &args.dest {
        Some(path) => TableSchema::load(path)?,
        None => TableSchema::new("public", "", Vec::new()),
    };
    if !args.dest_columns.is_empty() {
        let inline = parse_column_specs(&args.dest_columns)?;
        for column in inline {
            if destination
                .columns
                .iter()
                .any(|existing| existing.name.eq_ignore_ascii_case(&column.name))
            {
                bail!(
                    "Destination column '{}' is defined twice",
                    column.name
                );
            }
            destination.columns.push(column);
        }
    }
    Ok(destination)
}

fn log_summary(summary: &MappingSummary, destination: &TableSchema) {
    info!(
        "Mapped {} of {} source column(s) onto {}",
        summary.mapped,
        summary.total,
        destination.qualified_name()
    );
    if summary.unmapped > 0 {
        warn!("{} source column(s) have no destination", summary.unmapped);
    }
    if summary.needs_review() {
        warn!(
            "{} incompatible and {} unknown type pairing(s) need review",
            summary.verdict_count("incompatible"),
            summary.verdict_count("unknown")
        );
    }
}
