//! Column mapper: aligns source columns with destination columns and
//! annotates every pairing with a type-compatibility verdict.
//!
//! Matching runs in three tiers, each over all still-unmatched source columns
//! in source order:
//!
//! 1. exact: names equal ignoring case,
//! 2. normalized: names equal after [`normalize_name`],
//! 3. fuzzy: highest Dice similarity strictly above the configured threshold,
//!    ties resolved in favour of the earlier destination column.
//!
//! Running a whole tier before the next one means an exact or normalized
//! match can never be taken by an earlier column's fuzzy guess. Unless
//! [`MatchSettings::allow_shared_destinations`] is set, a destination column
//! is claimed by the first source column matched to it.

use std::{collections::HashMap, fmt, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    compat::{Compatibility, classify_pair},
    config::MatchSettings,
    destination::{DestinationColumn, TableSchema},
    persist,
    similarity::{name_similarity, normalize_name},
    source::{SemanticType, SourceColumn, SourceSchema},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Normalized,
    Fuzzy,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchKind::Exact => "exact",
            MatchKind::Normalized => "normalized",
            MatchKind::Fuzzy => "fuzzy",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_column: String,
    pub destination_column: Option<String>,
    pub source_type: SemanticType,
    pub destination_type: Option<String>,
    pub transformation: Option<String>,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    pub exclude: bool,
    pub is_calculated: bool,
    pub column_order: usize,
    pub is_primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_kind: Option<MatchKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<Compatibility>,
}

impl ColumnMapping {
    pub fn is_mapped(&self) -> bool {
        self.destination_column.is_some()
    }

    fn unmapped(source: &SourceColumn, column_order: usize) -> Self {
        Self {
            source_column: source.name.clone(),
            destination_column: None,
            source_type: source.inferred_type,
            destination_type: None,
            transformation: None,
            is_nullable: true,
            default_value: None,
            exclude: true,
            is_calculated: false,
            column_order,
            is_primary_key: false,
            match_kind: None,
            similarity: None,
            compatibility: None,
        }
    }

    fn matched(
        source: &SourceColumn,
        destination: &DestinationColumn,
        column_order: usize,
        found: Match,
        settings: &MatchSettings,
    ) -> Self {
        let compatibility =
            classify_pair(source.inferred_type.as_str(), &destination.sql_type, settings);
        Self {
            source_column: source.name.clone(),
            destination_column: Some(destination.name.clone()),
            source_type: source.inferred_type,
            destination_type: Some(destination.sql_type.clone()),
            transformation: compatibility.cast().map(str::to_string),
            is_nullable: destination.nullable,
            default_value: destination.default.clone(),
            exclude: false,
            is_calculated: false,
            column_order,
            is_primary_key: false,
            match_kind: Some(found.kind),
            similarity: Some(found.score),
            compatibility: Some(compatibility),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Match {
    destination: usize,
    kind: MatchKind,
    score: f64,
}

impl Match {
    fn certain(destination: usize, kind: MatchKind) -> Self {
        Self {
            destination,
            kind,
            score: 1.0,
        }
    }
}

struct Claims {
    taken: Vec<bool>,
    shared: bool,
}

impl Claims {
    fn available(&self, idx: usize) -> bool {
        self.shared || !self.taken[idx]
    }

    fn claim(&mut self, idx: usize) {
        self.taken[idx] = true;
    }
}

/// Maps every source column onto at most one destination column.
///
/// The result has one entry per source column, in source order, with
/// `column_order` equal to the source index.
pub fn auto_map_columns(
    sources: &[SourceColumn],
    destinations: &[DestinationColumn],
    settings: &MatchSettings,
) -> Vec<ColumnMapping> {
    let mut found: Vec<Option<Match>> = vec![None; sources.len()];
    let mut claims = Claims {
        taken: vec![false; destinations.len()],
        shared: settings.allow_shared_destinations,
    };

    let lowered: Vec<String> = destinations.iter().map(|d| d.name.to_lowercase()).collect();
    assign_tier(sources, &mut found, &mut claims, |source, claims| {
        let name = source.name.to_lowercase();
        (0..destinations.len())
            .find(|&idx| claims.available(idx) && lowered[idx] == name)
            .map(|idx| Match::certain(idx, MatchKind::Exact))
    });

    let normalized: Vec<String> = destinations.iter().map(|d| normalize_name(&d.name)).collect();
    assign_tier(sources, &mut found, &mut claims, |source, claims| {
        let name = normalize_name(&source.name);
        if name.is_empty() {
            return None;
        }
        (0..destinations.len())
            .find(|&idx| claims.available(idx) && normalized[idx] == name)
            .map(|idx| Match::certain(idx, MatchKind::Normalized))
    });

    assign_tier(sources, &mut found, &mut claims, |source, claims| {
        best_fuzzy(source, destinations, claims, settings.similarity_threshold)
    });

    sources
        .iter()
        .zip(found)
        .enumerate()
        .map(|(order, (source, found))| match found {
            Some(found) => {
                let destination = &destinations[found.destination];
                debug!(
                    "Mapped '{}' -> '{}' ({} match, score {:.3})",
                    source.name, destination.name, found.kind, found.score
                );
                ColumnMapping::matched(source, destination, order, found, settings)
            }
            None => {
                debug!("No destination for '{}'", source.name);
                ColumnMapping::unmapped(source, order)
            }
        })
        .collect()
}

/// Runs one matching tier over the source columns that are still unmatched.
fn assign_tier<F>(
    sources: &[SourceColumn],
    found: &mut [Option<Match>],
    claims: &mut Claims,
    candidate: F,
) where
    F: Fn(&SourceColumn, &Claims) -> Option<Match>,
{
    for (idx, source) in sources.iter().enumerate() {
        if found[idx].is_some() {
            continue;
        }
        if let Some(matched) = candidate(source, claims) {
            claims.claim(matched.destination);
            found[idx] = Some(matched);
        }
    }
}

/// Highest-scoring available destination strictly above `threshold`; the
/// first one wins a tie.
fn best_fuzzy(
    source: &SourceColumn,
    destinations: &[DestinationColumn],
    claims: &Claims,
    threshold: f64,
) -> Option<Match> {
    let mut best: Option<Match> = None;
    for (idx, destination) in destinations.iter().enumerate() {
        if !claims.available(idx) {
            continue;
        }
        let score = name_similarity(&source.name, &destination.name);
        if score <= threshold {
            continue;
        }
        match best {
            Some(current) if score <= current.score => {}
            _ => {
                best = Some(Match {
                    destination: idx,
                    kind: MatchKind::Fuzzy,
                    score,
                })
            }
        }
    }
    best
}

pub fn auto_map(
    source: &SourceSchema,
    destination: &TableSchema,
    settings: &MatchSettings,
) -> Vec<ColumnMapping> {
    auto_map_columns(&source.columns, &destination.columns, settings)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSummary {
    pub total: usize,
    pub mapped: usize,
    pub unmapped: usize,
    pub by_verdict: HashMap<&'static str, usize>,
}

impl MappingSummary {
    pub fn verdict_count(&self, label: &str) -> usize {
        self.by_verdict.get(label).copied().unwrap_or(0)
    }

    /// True when at least one mapped column cannot be loaded without review.
    pub fn needs_review(&self) -> bool {
        self.verdict_count("incompatible") > 0 || self.verdict_count("unknown") > 0
    }
}

pub fn summarize(mappings: &[ColumnMapping]) -> MappingSummary {
    let mapped = mappings.iter().filter(|m| m.is_mapped()).count();
    MappingSummary {
        total: mappings.len(),
        mapped,
        unmapped: mappings.len() - mapped,
        by_verdict: mappings
            .iter()
            .filter_map(|m| m.compatibility.as_ref().map(Compatibility::label))
            .counts(),
    }
}

pub fn load_mappings(path: &Path) -> Result<Vec<ColumnMapping>> {
    persist::load_from_path(path).with_context(|| format!("Loading column mappings {path:?}"))
}

pub fn save_mappings(path: &Path, mappings: &[ColumnMapping]) -> Result<()> {
    persist::save_to_path(path, &mappings)
        .with_context(|| format!("Writing column mappings {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(name: &str, ty: SemanticType) -> SourceColumn {
        SourceColumn::new(name, ty)
    }

    fn dst(name: &str, ty: &str) -> DestinationColumn {
        DestinationColumn::new(name, ty)
    }

    #[test]
    fn full_name_and_signup_date_scenario() {
        let sources = vec![
            src("Full Name", SemanticType::Text),
            src("signup_date", SemanticType::Date),
        ];
        let destinations = vec![dst("full_name", "varchar"), dst("signup_date", "timestamp")];

        let mappings = auto_map_columns(&sources, &destinations, &MatchSettings::default());
        assert_eq!(mappings.len(), 2);

        assert_eq!(mappings[0].destination_column.as_deref(), Some("full_name"));
        assert_eq!(mappings[0].match_kind, Some(MatchKind::Normalized));
        assert_eq!(mappings[0].compatibility, Some(Compatibility::Compatible));

        assert_eq!(mappings[1].destination_column.as_deref(), Some("signup_date"));
        assert_eq!(mappings[1].match_kind, Some(MatchKind::Exact));
        assert_eq!(mappings[1].compatibility, Some(Compatibility::Compatible));
        assert_eq!(mappings[1].transformation, None);
    }

    #[test]
    fn exact_match_is_not_stolen_by_earlier_fuzzy_match() {
        let sources = vec![
            src("customer_ids", SemanticType::Number),
            src("CUSTOMER_ID", SemanticType::Number),
        ];
        let destinations = vec![dst("customer_id", "integer")];

        let mappings = auto_map_columns(&sources, &destinations, &MatchSettings::default());
        assert_eq!(mappings[0].destination_column, None);
        assert!(mappings[0].exclude);
        assert_eq!(mappings[1].destination_column.as_deref(), Some("customer_id"));
        assert_eq!(mappings[1].match_kind, Some(MatchKind::Exact));
    }

    #[test]
    fn shared_destinations_can_be_enabled() {
        let sources = vec![
            src("customer_ids", SemanticType::Number),
            src("customer_id", SemanticType::Number),
        ];
        let destinations = vec![dst("customer_id", "integer")];
        let settings = MatchSettings {
            allow_shared_destinations: true,
            ..MatchSettings::default()
        };

        let mappings = auto_map_columns(&sources, &destinations, &settings);
        assert_eq!(mappings[0].match_kind, Some(MatchKind::Fuzzy));
        assert_eq!(mappings[1].match_kind, Some(MatchKind::Exact));
    }

    #[test]
    fn fuzzy_picks_best_and_breaks_ties_by_destination_order() {
        let sources = vec![src("cust_id", SemanticType::Number)];
        let destinations = vec![
            dst("unrelated", "text"),
            dst("customer_id", "integer"),
            dst("customer_id", "bigint"),
        ];
        let settings = MatchSettings {
            allow_shared_destinations: true,
            ..MatchSettings::default()
        };
        let mappings = auto_map_columns(&sources, &destinations, &settings);
        assert_eq!(mappings[0].destination_type.as_deref(), Some("integer"));
        assert_eq!(mappings[0].match_kind, Some(MatchKind::Fuzzy));
        let score = mappings[0].similarity.expect("score");
        assert!(score > 0.6);
    }

    #[test]
    fn cast_is_recorded_as_transformation() {
        let sources = vec![src("amount", SemanticType::Text)];
        let destinations = vec![dst("amount", "DECIMAL(10,2)")];
        let mappings = auto_map_columns(&sources, &destinations, &MatchSettings::default());
        assert_eq!(mappings[0].transformation.as_deref(), Some("::numeric"));
        assert_eq!(
            mappings[0].compatibility,
            Some(Compatibility::CastNeeded("::numeric".to_string()))
        );
    }

    #[test]
    fn destination_nullability_and_default_are_carried() {
        let sources = vec![src("status", SemanticType::Text)];
        let destinations = vec![DestinationColumn {
            name: "status".to_string(),
            sql_type: "varchar(20)".to_string(),
            nullable: false,
            default: Some("pending".to_string()),
        }];
        let mappings = auto_map_columns(&sources, &destinations, &MatchSettings::default());
        assert!(!mappings[0].is_nullable);
        assert_eq!(mappings[0].default_value.as_deref(), Some("pending"));
    }

    #[test]
    fn summary_counts_verdicts() {
        let sources = vec![
            src("id", SemanticType::Number),
            src("created", SemanticType::Text),
            src("misc", SemanticType::Text),
        ];
        let destinations = vec![dst("id", "integer"), dst("created", "date")];
        let mappings = auto_map_columns(&sources, &destinations, &MatchSettings::default());
        let summary = summarize(&mappings);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.mapped, 2);
        assert_eq!(summary.unmapped, 1);
        assert_eq!(summary.verdict_count("compatible"), 1);
        assert_eq!(summary.verdict_count("incompatible"), 1);
        assert!(summary.needs_review());
    }
}
