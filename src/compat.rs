//! Type-compatibility classification between a source column and a
//! destination SQL column.
//!
//! Both sides are reduced to a [`SqlFamily`] first. Pairs inside one family
//! are compatible, a fixed set of cross-family pairs can be loaded with a
//! cast, text/number into a date column is rejected, and everything else is
//! reported as [`Compatibility::Unknown`] so the caller has to confirm it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MatchSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlFamily {
    Text,
    Number,
    Date,
    Boolean,
}

const TEXT_TYPES: &[&str] = &[
    "text",
    "string",
    "varchar",
    "char",
    "character",
    "character varying",
    "nvarchar",
    "nchar",
    "bpchar",
    "citext",
];

const NUMBER_TYPES: &[&str] = &[
    "number",
    "numeric",
    "decimal",
    "int",
    "int2",
    "int4",
    "int8",
    "integer",
    "smallint",
    "bigint",
    "tinyint",
    "serial",
    "smallserial",
    "bigserial",
    "real",
    "float",
    "float4",
    "float8",
    "double",
    "double precision",
    "money",
];

const DATE_TYPES: &[&str] = &[
    "date",
    "time",
    "timetz",
    "datetime",
    "timestamp",
    "timestamptz",
    "timestamp with time zone",
    "timestamp without time zone",
    "time with time zone",
    "time without time zone",
];

const BOOLEAN_TYPES: &[&str] = &["bool", "boolean"];

/// Types that contain a family keyword without belonging to the family
/// (`interval` and `point` hold "int", ranges and arrays hold their element).
const EXCLUDED_KEYWORDS: &[&str] = &[
    "interval", "json", "uuid", "point", "range", "array", "[]",
];

const BOOLEAN_KEYWORDS: &[&str] = &["bool"];
const DATE_KEYWORDS: &[&str] = &["date", "time"];
const NUMBER_KEYWORDS: &[&str] = &[
    "int", "serial", "numeric", "decimal", "real", "double", "float", "number", "money",
];
const TEXT_KEYWORDS: &[&str] = &["char", "text", "string"];

impl SqlFamily {
    /// Classifies a semantic or SQL type name, ignoring case and any
    /// `(precision, scale)` suffix. Well-known names are looked up directly;
    /// anything else is classified by the first family keyword it contains,
    /// checking boolean, date/time, number, then text. Returns `None` for
    /// types outside the four families (json, uuid, intervals, arrays,
    /// custom types, ...).
    pub fn classify(type_name: &str) -> Option<Self> {
        let base = base_type_name(type_name);
        Self::known_type(&base).or_else(|| Self::by_keyword(&base))
    }

    fn known_type(base: &str) -> Option<Self> {
        if BOOLEAN_TYPES.contains(&base) {
            Some(SqlFamily::Boolean)
        } else if DATE_TYPES.contains(&base) {
            Some(SqlFamily::Date)
        } else if NUMBER_TYPES.contains(&base) {
            Some(SqlFamily::Number)
        } else if TEXT_TYPES.contains(&base) {
            Some(SqlFamily::Text)
        } else {
            None
        }
    }

    fn by_keyword(base: &str) -> Option<Self> {
        let has = |keywords: &[&str]| keywords.iter().any(|kw| base.contains(kw));
        if has(EXCLUDED_KEYWORDS) {
            None
        } else if has(BOOLEAN_KEYWORDS) {
            Some(SqlFamily::Boolean)
        } else if has(DATE_KEYWORDS) {
            Some(SqlFamily::Date)
        } else if has(NUMBER_KEYWORDS) {
            Some(SqlFamily::Number)
        } else if has(TEXT_KEYWORDS) {
            Some(SqlFamily::Text)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SqlFamily::Text => "text",
            SqlFamily::Number => "number",
            SqlFamily::Date => "date",
            SqlFamily::Boolean => "boolean",
        }
    }
}

/// Lower-cased type name with any `(...)` modifier removed and whitespace
/// collapsed; trailing qualifiers such as `with time zone` are kept.
fn base_type_name(type_name: &str) -> String {
    let lowered = type_name.trim().to_ascii_lowercase();
    let base = match lowered.split_once('(') {
        Some((head, tail)) => {
            let rest = tail.split_once(')').map(|(_, r)| r).unwrap_or("");
            format!("{}{}", head.trim_end(), rest)
        }
        None => lowered,
    };
    base.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl fmt::Display for SqlFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for loading a source column into a destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "cast", rename_all = "snake_case")]
pub enum Compatibility {
    Compatible,
    /// Loadable through the carried cast expression, e.g. `::text`.
    CastNeeded(String),
    Incompatible,
    Unknown,
}

impl Compatibility {
    pub fn label(&self) -> &'static str {
        match self {
            Compatibility::Compatible => "compatible",
            Compatibility::CastNeeded(_) => "cast_needed",
            Compatibility::Incompatible => "incompatible",
            Compatibility::Unknown => "unknown",
        }
    }

    pub fn cast(&self) -> Option<&str> {
        match self {
            Compatibility::CastNeeded(cast) => Some(cast.as_str()),
            _ => None,
        }
    }

    pub fn is_loadable(&self) -> bool {
        matches!(
            self,
            Compatibility::Compatible | Compatibility::CastNeeded(_)
        )
    }
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compatibility::CastNeeded(cast) => write!(f, "cast_needed ({cast})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Classifies `source_type -> destination_type` using default settings.
pub fn type_compatibility(source_type: &str, destination_type: &str) -> Compatibility {
    classify_pair(source_type, destination_type, &MatchSettings::default())
}

pub fn classify_pair(
    source_type: &str,
    destination_type: &str,
    settings: &MatchSettings,
) -> Compatibility {
    let fallback = || {
        if settings.permissive_fallback {
            Compatibility::Compatible
        } else {
            Compatibility::Unknown
        }
    };

    let (Some(source), Some(destination)) = (
        SqlFamily::classify(source_type),
        SqlFamily::classify(destination_type),
    ) else {
        return fallback();
    };

    use SqlFamily::{Boolean, Date, Number, Text};
    match (source, destination) {
        (s, d) if s == d => Compatibility::Compatible,
        (Number | Date | Boolean, Text) => Compatibility::CastNeeded("::text".to_string()),
        (Text, Number) => Compatibility::CastNeeded(numeric_cast(destination_type, settings)),
        (Text, Boolean) => Compatibility::CastNeeded("::boolean".to_string()),
        (Text | Number, Date) => Compatibility::Incompatible,
        _ => fallback(),
    }
}

fn numeric_cast(destination_type: &str, settings: &MatchSettings) -> String {
    let lowered = destination_type.to_ascii_lowercase();
    let wants_numeric = settings
        .numeric_cast_keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_ascii_lowercase()));
    if wants_numeric {
        "::numeric".to_string()
    } else {
        "::integer".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_handles_precision_and_qualifiers() {
        assert_eq!(SqlFamily::classify("VARCHAR(255)"), Some(SqlFamily::Text));
        assert_eq!(SqlFamily::classify("decimal(18,2)"), Some(SqlFamily::Number));
        assert_eq!(
            SqlFamily::classify("TIMESTAMP(3) WITH TIME ZONE"),
            Some(SqlFamily::Date)
        );
        assert_eq!(SqlFamily::classify("character  varying"), Some(SqlFamily::Text));
        assert_eq!(SqlFamily::classify("jsonb"), None);
        assert_eq!(SqlFamily::classify("point"), None);
    }

    #[test]
    fn vendor_type_names_classify_by_keyword() {
        let cases = [
            ("TINYTEXT", Some(SqlFamily::Text)),
            ("LONGTEXT", Some(SqlFamily::Text)),
            ("VARCHAR2(20)", Some(SqlFamily::Text)),
            ("MEDIUMINT", Some(SqlFamily::Number)),
            ("INT UNSIGNED", Some(SqlFamily::Number)),
            ("int64", Some(SqlFamily::Number)),
            ("DATETIME2", Some(SqlFamily::Date)),
            ("SMALLDATETIME", Some(SqlFamily::Date)),
            ("TINYINT(1) UNSIGNED", Some(SqlFamily::Number)),
            ("interval day to second", None),
            ("daterange", None),
            ("integer[]", None),
            ("uuid", None),
            ("geometry", None),
        ];
        for (name, expected) in cases {
            assert_eq!(SqlFamily::classify(name), expected, "classifying {name}");
        }
        assert_eq!(
            type_compatibility("number", "INT UNSIGNED"),
            Compatibility::Compatible
        );
    }

    #[test]
    fn every_enumerated_pair_has_its_verdict() {
        let cast = |c: &str| Compatibility::CastNeeded(c.to_string());
        let cases = [
            ("text", "varchar", Compatibility::Compatible),
            ("number", "bigint", Compatibility::Compatible),
            ("date", "timestamp", Compatibility::Compatible),
            ("boolean", "bool", Compatibility::Compatible),
            ("number", "text", cast("::text")),
            ("date", "text", cast("::text")),
            ("boolean", "text", cast("::text")),
            ("text", "decimal(12,2)", cast("::numeric")),
            ("text", "integer", cast("::integer")),
            ("text", "boolean", cast("::boolean")),
            ("text", "date", Compatibility::Incompatible),
            ("number", "date", Compatibility::Incompatible),
            ("boolean", "date", Compatibility::Unknown),
            ("date", "boolean", Compatibility::Unknown),
            ("number", "boolean", Compatibility::Unknown),
        ];
        for (source, destination, expected) in cases {
            assert_eq!(
                type_compatibility(source, destination),
                expected,
                "{source} -> {destination}"
            );
        }
        assert_eq!(
            type_compatibility("text", "TINYTEXT"),
            Compatibility::Compatible
        );
        assert_eq!(
            type_compatibility("text", "SMALLDATETIME"),
            Compatibility::Incompatible
        );
    }

    #[test]
    fn text_to_number_picks_cast_from_destination_name() {
        assert_eq!(
            type_compatibility("text", "NUMERIC(10,2)"),
            Compatibility::CastNeeded("::numeric".to_string())
        );
        assert_eq!(
            type_compatibility("text", "bigint"),
            Compatibility::CastNeeded("::integer".to_string())
        );
    }

    #[test]
    fn unenumerated_pairs_are_unknown_unless_permissive() {
        assert_eq!(type_compatibility("date", "integer"), Compatibility::Unknown);
        assert_eq!(type_compatibility("text", "jsonb"), Compatibility::Unknown);

        let settings = MatchSettings {
            permissive_fallback: true,
            ..MatchSettings::default()
        };
        assert_eq!(
            classify_pair("date", "integer", &settings),
            Compatibility::Compatible
        );
    }

    #[test]
    fn custom_numeric_keywords_are_honoured() {
        let settings = MatchSettings {
            numeric_cast_keywords: vec!["money".to_string()],
            ..MatchSettings::default()
        };
        assert_eq!(
            classify_pair("text", "MONEY", &settings),
            Compatibility::CastNeeded("::numeric".to_string())
        );
        assert_eq!(
            classify_pair("text", "numeric", &settings),
            Compatibility::CastNeeded("::integer".to_string())
        );
    }

    #[test]
    fn verdict_serializes_with_tag() {
        let json = serde_json::to_string(&Compatibility::CastNeeded("::text".into())).unwrap();
        assert_eq!(json, r#"{"verdict":"cast_needed","cast":"::text"}"#);
        let json = serde_json::to_string(&Compatibility::Incompatible).unwrap();
        assert_eq!(json, r#"{"verdict":"incompatible"}"#);
    }
}
