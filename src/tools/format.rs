//! Output formatting for schema results.
//!
//! Introspection rows are rendered as pretty JSON (default), an ASCII grid
//! like the MySQL CLI prints, or a Markdown table.

use crate::models::QueryRow;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Output format for introspection results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// ASCII table format (like MySQL CLI)
    Table,
    /// Markdown table format
    Markdown,
}

/// Format a byte count with 1024-based units.
///
/// # Examples
///
/// ```
/// use schema_mcp_server::tools::format::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1024), "1 kB");
/// assert_eq!(format_size(1048576), "1 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::WINDOWS)
}

/// Add `total_size_formatted` next to every numeric `total_size`.
pub fn annotate_sizes(rows: &mut [QueryRow]) {
    for row in rows {
        let formatted = row
            .get("total_size")
            .and_then(JsonValue::as_u64)
            .map(format_size);
        if let Some(formatted) = formatted {
            row.insert(
                "total_size_formatted".to_string(),
                JsonValue::String(formatted),
            );
        }
    }
}

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    }
}

/// Column names in first-seen order across all rows.
pub fn column_names(rows: &[QueryRow]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }
    names
}

/// Render rows in the requested format.
pub fn render_rows(rows: &[QueryRow], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Table => format_as_table(&column_names(rows), rows),
        OutputFormat::Markdown => format_as_markdown(&column_names(rows), rows),
    }
}

pub fn format_as_table(columns: &[String], rows: &[QueryRow]) -> String {
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            if let Some(value) = row.get(col) {
                widths[i] = widths[i].max(format_value(value).width());
            }
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", pad_center(col, *w)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in rows {
        let row_str: String = columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| {
                let value = row.get(col).unwrap_or(&JsonValue::Null);
                let formatted = format_value(value);
                if value.is_number() {
                    format!("| {} ", pad_left(&formatted, *w))
                } else {
                    format!("| {} ", pad_right(&formatted, *w))
                }
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    output.push_str(&format!("{} {} in set\n", rows.len(), row_text));

    output
}

pub fn format_as_markdown(columns: &[String], rows: &[QueryRow]) -> String {
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output = String::new();

    let header: String = columns
        .iter()
        .map(|c| format!("| {} ", c))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);

    let sep: String = columns.iter().map(|_| "|---").collect::<String>() + "|\n";
    output.push_str(&sep);

    for row in rows {
        let row_str: String = columns
            .iter()
            .map(|col| {
                let value = row.get(col).unwrap_or(&JsonValue::Null);
                format!("| {} ", format_value(value).replace('|', "\\|"))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&format!("\n*{} rows*", rows.len()));

    output
}

// std's `{:<width$}` counts chars, not display columns.
fn pad_right(s: &str, width: usize) -> String {
    format!("{}{}", s, " ".repeat(width.saturating_sub(s.width())))
}

fn pad_left(s: &str, width: usize) -> String {
    format!("{}{}", " ".repeat(width.saturating_sub(s.width())), s)
}

fn pad_center(s: &str, width: usize) -> String {
    let gap = width.saturating_sub(s.width());
    let left = gap / 2;
    format!("{}{}{}", " ".repeat(left), s, " ".repeat(gap - left))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: JsonValue) -> Vec<QueryRow> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_format_size_bytes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn test_format_size_larger_units() {
        assert_eq!(format_size(1536), "1.50 kB");
        assert_eq!(format_size(1073741824), "1 GB");
    }

    #[test]
    fn test_annotate_sizes_skips_missing_values() {
        let mut rows = rows(json!([
            { "table_name": "users", "total_size": 16384 },
            { "table_name": "v_users", "total_size": null }
        ]));
        annotate_sizes(&mut rows);
        assert_eq!(rows[0]["total_size_formatted"], "16 kB");
        assert!(!rows[1].contains_key("total_size_formatted"));
    }

    #[test]
    fn test_column_names_first_seen_order() {
        let rows = rows(json!([{ "b": 1 }, { "c": 3, "a": 4 }]));
        assert_eq!(column_names(&rows), ["b", "a", "c"]);
    }

    #[test]
    fn test_format_as_table() {
        let rows = rows(json!([{ "table_name": "users", "total_size": 8192 }]));
        let table = format_as_table(&column_names(&rows), &rows);
        assert!(table.contains("| table_name | total_size |"));
        assert!(table.contains("| users      |       8192 |"));
        assert!(table.ends_with("1 row in set\n"));
    }

    #[test]
    fn test_format_as_table_wide_chars() {
        let rows = rows(json!([{ "name": "日本" }]));
        let table = format_as_table(&column_names(&rows), &rows);
        assert!(table.contains("| 日本 |"));
        assert!(table.starts_with("+------+\n"));
    }

    #[test]
    fn test_format_as_markdown() {
        let rows = rows(json!([{ "name": "a|b" }]));
        let md = format_as_markdown(&column_names(&rows), &rows);
        assert!(md.starts_with("| name |\n|---|\n"));
        assert!(md.contains("| a\\|b |"));
        assert!(md.ends_with("*1 rows*"));
    }

    #[test]
    fn test_render_rows_json_is_pretty() {
        let rows = rows(json!([{ "table_name": "users" }]));
        let text = render_rows(&rows, OutputFormat::Json);
        assert!(text.contains("\n"));
        assert!(text.contains("\"table_name\": \"users\""));
    }

    #[test]
    fn test_empty_rows() {
        assert_eq!(render_rows(&[], OutputFormat::Table), "Empty set");
        assert_eq!(render_rows(&[], OutputFormat::Markdown), "*Empty set*");
    }
}
