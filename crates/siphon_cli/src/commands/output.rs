//! Table and JSON rendering shared by the listing commands.

use clap::ValueEnum;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

/// Output format for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Render `rows` in the requested format.
pub(crate) fn render<T>(rows: &[T], format: OutputFormat) -> Result<String, serde_json::Error>
where
    T: Serialize + Tabled,
{
    match format {
        OutputFormat::Table => {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            Ok(table.to_string())
        }
        OutputFormat::Json => serde_json::to_string_pretty(rows),
    }
}

/// Print `rows`, or `empty` when there are none and the output is a table.
pub(crate) fn print_rows<T>(
    rows: &[T],
    format: OutputFormat,
    empty: &str,
) -> Result<(), Box<dyn std::error::Error>>
where
    T: Serialize + Tabled,
{
    if rows.is_empty() && format == OutputFormat::Table {
        println!("{}", empty);
        return Ok(());
    }
    println!("{}", render(rows, format)?);
    Ok(())
}

/// Cut `text` to `max` characters, marking the cut with an ellipsis.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
