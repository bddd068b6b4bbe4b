//! Runtime settings.
//!
//! A [`Settings`] value is loaded once per invocation and passed explicitly to
//! whatever needs it; nothing reads configuration from global state. The
//! lifecycle is: resolve the path (`--config`, then `ETL_MAPPER_CONFIG`, then
//! `etl-mapper.yml` in the working directory), [`Settings::load`] it (a missing
//! file yields defaults), apply command-line overrides, and optionally
//! [`Settings::persist`] it back as YAML.

use std::{
    env,
    io::IsTerminal,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::persist;

pub const CONFIG_ENV_VAR: &str = "ETL_MAPPER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "etl-mapper.yml";
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub matching: MatchSettings,
    pub display: DisplaySettings,
}

/// Knobs for the column mapper and the compatibility classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// Fuzzy matches must score strictly above this Dice similarity.
    pub similarity_threshold: f64,
    /// Destination type substrings that turn a text->number cast into
    /// `::numeric` instead of `::integer`.
    pub numeric_cast_keywords: Vec<String>,
    /// Report unlisted type pairs as compatible instead of unknown.
    pub permissive_fallback: bool,
    /// Let several source columns map onto the same destination column.
    pub allow_shared_destinations: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            numeric_cast_keywords: vec!["decimal".to_string(), "numeric".to_string()],
            permissive_fallback: false,
            allow_shared_destinations: false,
        }
    }
}

impl MatchSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.similarity_threshold),
            "similarity_threshold must be within 0.0..=1.0 (got {})",
            self.similarity_threshold
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub color: ColorMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }
}

impl Settings {
    /// Picks the settings file: explicit path, then the environment, then the
    /// working-directory default.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match env::var_os(CONFIG_ENV_VAR) {
            Some(value) if !value.is_empty() => PathBuf::from(value),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings file at {path:?}; using defaults");
            return Ok(Self::default());
        }
        let settings: Settings = persist::load_from_path(path)
            .with_context(|| format!("Loading settings from {path:?}"))?;
        settings
            .matching
            .validate()
            .with_context(|| format!("Validating settings in {path:?}"))?;
        debug!("Loaded settings from {path:?}");
        Ok(settings)
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        self.matching.validate()?;
        persist::save_to_path(path, self).with_context(|| format!("Writing settings to {path:?}"))
    }
}
