//! Loading and saving serde documents (schemas, mappings, settings).
//!
//! The on-disk format follows the file extension: `.json` is JSON, anything
//! else is YAML. A path of `-` reads from stdin or writes to stdout.

use std::{
    fs::File,
    io::{self, Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};

use crate::io_utils::is_dash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

fn read_to_string(path: &Path) -> Result<String> {
    let mut buf = String::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_string(&mut buf)
            .context("Reading document from stdin")?;
    } else {
        let mut file = File::open(path).with_context(|| format!("Opening {path:?}"))?;
        file.read_to_string(&mut buf)
            .with_context(|| format!("Reading {path:?}"))?;
    }
    Ok(buf)
}

pub fn from_str<T: DeserializeOwned>(raw: &str, format: DocumentFormat) -> Result<T> {
    match format {
        DocumentFormat::Json => serde_json::from_str(raw).context("Parsing JSON document"),
        DocumentFormat::Yaml => serde_yaml::from_str(raw).context("Parsing YAML document"),
    }
}

pub fn to_string<T: Serialize>(value: &T, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Json => {
            let mut out = serde_json::to_string_pretty(value).context("Serializing JSON")?;
            out.push('\n');
            Ok(out)
        }
        DocumentFormat::Yaml => serde_yaml::to_string(value).context("Serializing YAML"),
    }
}

pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = read_to_string(path)?;
    from_str(&raw, DocumentFormat::for_path(path)).with_context(|| format!("Decoding {path:?}"))
}

pub fn save_to_path<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let serialized = to_string(value, DocumentFormat::for_path(path))?;
    if is_dash(path) {
        let mut stdout = io::stdout().lock();
        stdout.write_all(serialized.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }
    let mut file = File::create(path).with_context(|| format!("Creating {path:?}"))?;
    file.write_all(serialized.as_bytes())?;
    file.flush()?;
    Ok(())
}
