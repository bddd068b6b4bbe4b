//! Plain-text rendering of mapping reports.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{compat::Compatibility, mapper::ColumnMapping};

const HEADERS: &[&str] = &[
    "#", "source", "type", "destination", "dest type", "match", "score", "verdict", "cast",
];

const RED: &str = "\u{1b}[31m";
const GREEN: &str = "\u{1b}[32m";
const YELLOW: &str = "\u{1b}[33m";
const DIM: &str = "\u{1b}[2m";
const RESET: &str = "\u{1b}[0m";

pub fn render_mappings(mappings: &[ColumnMapping], color: bool) -> String {
    let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    let rows: Vec<Vec<String>> = mappings
        .iter()
        .map(|mapping| mapping_row(mapping, color))
        .collect();
    render_table(&headers, &rows)
}

fn mapping_row(mapping: &ColumnMapping, color: bool) -> Vec<String> {
    let verdict = match &mapping.compatibility {
        Some(verdict) => paint(verdict.label(), verdict_color(verdict), color),
        None => paint("unmapped", DIM, color),
    };
    vec![
        mapping.column_order.to_string(),
        mapping.source_column.clone(),
        mapping.source_type.to_string(),
        mapping.destination_column.clone().unwrap_or_else(|| "-".to_string()),
        mapping.destination_type.clone().unwrap_or_else(|| "-".to_string()),
        mapping
            .match_kind
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| "-".to_string()),
        mapping
            .similarity
            .map(|score| format!("{score:.2}"))
            .unwrap_or_else(|| "-".to_string()),
        verdict,
        mapping.transformation.clone().unwrap_or_default(),
    ]
}

fn verdict_color(verdict: &Compatibility) -> &'static str {
    match verdict {
        Compatibility::Compatible => GREEN,
        Compatibility::CastNeeded(_) => YELLOW,
        Compatibility::Incompatible => RED,
        Compatibility::Unknown => YELLOW,
    }
}

fn paint(text: &str, code: &str, color: bool) -> String {
    if color {
        format!("{code}{text}{RESET}")
    } else {
        text.to_string()
    }
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(1))).collect();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let cells: Vec<String> = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect();
    cells.join("  ").trim_end().to_string()
}

/// Visible width of `value`, not counting ANSI color sequences.
fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MatchSettings,
        destination::DestinationColumn,
        mapper::auto_map_columns,
        source::{SemanticType, SourceColumn},
    };

    #[test]
    fn colored_cells_do_not_skew_alignment() {
        assert_eq!(display_width("\u{1b}[32mok\u{1b}[0m"), 2);
        let headers = vec!["a".to_string(), "b".to_string()];
        let rows = vec![vec![paint("ok", GREEN, true), "x".to_string()]];
        let rendered = render_table(&headers, &rows);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "a   b");
        assert!(lines[2].ends_with("  x"));
    }

    #[test]
    fn mapping_report_lists_every_source_column() {
        let mappings = auto_map_columns(
            &[
                SourceColumn::new("email", SemanticType::Text),
                SourceColumn::new("zzz", SemanticType::Text),
            ],
            &[DestinationColumn::new("email", "varchar(320)")],
            &MatchSettings::default(),
        );
        let rendered = render_mappings(&mappings, false);
        assert_eq!(rendered.lines().count(), 4);
        assert!(rendered.contains("compatible"));
        assert!(rendered.contains("unmapped"));
    }
}
