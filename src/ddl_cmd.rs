use std::fs;

use anyhow::{Context, Result, bail};
use log::info;

use crate::{
    cli::DdlArgs,
    ddl::{generate_ddl, propose_destination},
    mapper::{ColumnMapping, load_mappings},
    source::SourceSchema,
};

pub fn execute(args: &DdlArgs) -> Result<()> {
    let mut mappings = match (&args.mappings, &args.source) {
        (Some(path), _) => load_mappings(path)?,
        (None, Some(path)) => propose_destination(&SourceSchema::load(path)?),
        (None, None) => bail!("Either --mappings or --source is required"),
    };
    apply_primary_key(&mut mappings, &args.primary_key)?;

    let statement = generate_ddl(&args.schema, &args.table, &mappings, args.dialect)
        .with_context(|| format!("Generating DDL for {}.{}", args.schema, args.table))?;

    match &args.output {
        Some(path) => {
            fs::write(path, format!("{statement}\n"))
                .with_context(|| format!("Writing DDL to {path:?}"))?;
            info!(
                "{} DDL for {}.{} written to {path:?}",
                args.dialect, args.schema, args.table
            );
        }
        None => println!("{statement}"),
    }
    Ok(())
}

/// Marks the named destination columns as primary-key members; they lose
/// nullability.
fn apply_primary_key(mappings: &mut [ColumnMapping], keys: &[String]) -> Result<()> {
    for key in keys.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
        let mapping = mappings
            .iter_mut()
            .filter(|m| !m.exclude)
            .find(|m| {
                m.destination_column
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(key))
            });
        match mapping {
            Some(mapping) => {
                mapping.is_primary_key = true;
                mapping.is_nullable = false;
            }
            None => bail!("Primary key column '{key}' is not a mapped destination column"),
        }
    }
    Ok(())
}
