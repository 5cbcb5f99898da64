//! Output formatting for the CLI.

use anyhow::Result;
use chrono::{DateTime, Utc};
use console::style;
use issuefields_core::{BulkFieldStatus, ChangeGroup, ErrorCollection, FieldMeta, MoveFieldStatus};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

fn print_serialized<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Human => {}
    }
    Ok(())
}

/// Print a list in the specified format.
pub fn print_list<T: Serialize + HumanDisplay>(values: &[T], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Human = format {
        for value in values {
            println!("{}", value.human_display());
        }
        return Ok(());
    }
    print_serialized(values, format)
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => println!("{}", style(message).green()),
        _ => print_serialized(&serde_json::json!({"status": "ok", "message": message}), format)?,
    }
    Ok(())
}

/// Print validation errors to stderr.
pub fn print_errors(errors: &ErrorCollection, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Human = format {
        for message in errors.error_messages() {
            eprintln!("{} {message}", style("error:").red().bold());
        }
        for (field, message) in errors.errors() {
            eprintln!("{} {}: {message}", style("error:").red().bold(), style(field).bold());
        }
        return Ok(());
    }
    print_serialized(errors, format)
}

/// Print rows under headings with dynamic column widths.
pub fn print_table(headings: &[String], rows: &[Vec<String>], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Human = format {
        if rows.is_empty() {
            println!("No issues found.");
            return Ok(());
        }
        print!("{}", table(headings, rows));
        return Ok(());
    }
    let records: Vec<serde_json::Map<String, Value>> = rows
        .iter()
        .map(|row| {
            headings
                .iter()
                .cloned()
                .zip(row.iter().map(|cell| Value::String(cell.clone())))
                .collect()
        })
        .collect();
    print_serialized(&records, format)
}

fn table(headings: &[String], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headings
        .iter()
        .enumerate()
        .map(|(i, heading)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(heading.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", line(headings));
    let _ = writeln!(out, "{}", "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
    for row in rows {
        let _ = writeln!(out, "{}", line(row));
    }
    out
}

/// Print an issue's field JSON.
pub fn print_issue(issue: &Value, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Human = format {
        print!("{}", issue_display(issue));
        return Ok(());
    }
    print_serialized(issue, format)
}

fn issue_display(issue: &Value) -> String {
    let mut out = String::new();
    let key = issue["key"].as_str().unwrap_or("(unsaved)");
    let _ = writeln!(out, "{}", style(key).bold());

    if let Some(fields) = issue["fields"].as_object() {
        let width = fields.keys().map(String::len).max().unwrap_or(0);
        for (id, value) in fields {
            if value.is_null() || value.as_array().is_some_and(Vec::is_empty) {
                continue;
            }
            let _ = writeln!(out, "  {id:<width$}  {}", compact(value));
        }
    }
    out
}

/// One-line rendering of a field value: names over ids, lists joined.
fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(compact).collect::<Vec<_>>().join(", "),
        Value::Object(object) => ["displayName", "name", "key", "value", "body", "id"]
            .iter()
            .find_map(|name| object.get(*name).filter(|v| !v.is_null()))
            .map_or_else(|| value.to_string(), compact),
        other => other.to_string(),
    }
}

/// Trait for human-readable display.
pub trait HumanDisplay {
    fn human_display(&self) -> String;
}

impl HumanDisplay for FieldMeta {
    fn human_display(&self) -> String {
        let mut flags = Vec::new();
        if self.custom {
            flags.push("custom");
        }
        if self.orderable {
            flags.push("orderable");
        }
        if self.navigable {
            flags.push("navigable");
        }
        if self.searchable {
            flags.push("searchable");
        }
        format!("{:<28} {:<28} {}", self.id, self.name, flags.join(","))
    }
}

impl HumanDisplay for ChangeGroup {
    fn human_display(&self) -> String {
        let author = self.author.as_deref().unwrap_or("anonymous");
        let mut out = format!("[{}] {author}", format_time(&self.created));
        for item in &self.items {
            let from = item.from_string.as_deref().unwrap_or("(none)");
            let to = item.to_string.as_deref().unwrap_or("(none)");
            let _ = write!(out, "\n  {}: {from} → {to}", item.field);
        }
        if let Some(comment_id) = self.comment_id {
            let _ = write!(out, "\n  comment {comment_id}");
        }
        out
    }
}

impl HumanDisplay for BulkFieldStatus {
    fn human_display(&self) -> String {
        let status = self.unavailable.map_or_else(
            || style("available").green().to_string(),
            |reason| style(reason).yellow().to_string(),
        );
        format!("{:<28} {:<28} {status}", self.field_id, self.name)
    }
}

impl HumanDisplay for MoveFieldStatus {
    fn human_display(&self) -> String {
        let mut out = format!("{:<28} {:<28}", self.field_id, self.name);
        if self.result.needs_input {
            let _ = write!(out, " {}", style("needs input").yellow());
        }
        if let Some(message) = &self.result.message {
            let _ = write!(out, " {message}");
        }
        out
    }
}

fn format_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_compact_prefers_names() {
        assert_eq!(compact(&json!({"id": "1", "name": "Bug"})), "Bug");
        assert_eq!(compact(&json!({"name": "fred", "displayName": "Fred Normal"})), "Fred Normal");
        assert_eq!(compact(&json!([{"id": "10000", "name": "Backend"}, {"id": "10001", "name": "UI"}])), "Backend, UI");
        assert_eq!(compact(&json!(3600)), "3600");
    }

    #[test]
    fn test_table_pads_columns() {
        let headings = vec!["Key".to_string(), "Summary".to_string()];
        let rows = vec![
            vec!["HR-1".to_string(), "Payroll".to_string()],
            vec!["MKT-10".to_string(), "Plan".to_string()],
        ];

        let expected = "Key     Summary\n---------------\nHR-1    Payroll\nMKT-10  Plan\n";
        assert_eq!(table(&headings, &rows), expected);
    }
}
