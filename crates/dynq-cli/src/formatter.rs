//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use dynq_core::proto::{Document, PaginatedDocs};
use serde_json::{json, Value};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format one page of a find.
    fn format_page(&self, page: &PaginatedDocs) -> String;

    /// Format the result of a find-one.
    fn format_document(&self, doc: Option<&Document>) -> String;

    /// Format a count.
    fn format_count(&self, collection: &str, count: u64) -> String;

    /// Format the catalog's collections.
    fn format_collections(&self, slugs: &[String]) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_page(&self, page: &PaginatedDocs) -> String {
        let mut output = if page.docs.is_empty() {
            "No results".to_string()
        } else {
            documents_table(&page.docs).to_string()
        };

        output.push_str(&format!(
            "\npage {} of {} ({} document(s))",
            page.page, page.total_pages, page.total_docs
        ));
        if let Some(cursor) = &page.next_cursor {
            output.push_str(&format!("\nnext cursor: {}", cursor));
        }
        output
    }

    fn format_document(&self, doc: Option<&Document>) -> String {
        match doc {
            Some(doc) => documents_table(std::slice::from_ref(doc)).to_string(),
            None => "No results".to_string(),
        }
    }

    fn format_count(&self, collection: &str, count: u64) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Collection", "Count"]);
        table.add_row(vec![collection.to_string(), count.to_string()]);
        table.to_string()
    }

    fn format_collections(&self, slugs: &[String]) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Collection"]);

        for slug in slugs {
            table.add_row(vec![slug]);
        }

        table.to_string()
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_page(&self, page: &PaginatedDocs) -> String {
        serde_json::to_string_pretty(page).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_document(&self, doc: Option<&Document>) -> String {
        serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "null".to_string())
    }

    fn format_count(&self, collection: &str, count: u64) -> String {
        json!({
            "collection": collection,
            "totalDocs": count
        })
        .to_string()
    }

    fn format_collections(&self, slugs: &[String]) -> String {
        serde_json::to_string_pretty(slugs).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_message(&self, message: &str) -> String {
        json!({
            "message": message
        })
        .to_string()
    }
}

/// Lay documents out with one column per top-level attribute, `id` first.
fn documents_table(docs: &[Document]) -> Table {
    let mut columns: Vec<&str> = Vec::new();
    for doc in docs {
        for key in doc.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }
    if let Some(pos) = columns.iter().position(|c| *c == "id") {
        let id = columns.remove(pos);
        columns.insert(0, id);
    }

    let mut table = Table::new();
    table.set_header(columns.iter().map(|c| Cell::new(c)).collect::<Vec<_>>());

    for doc in docs {
        let row: Vec<Cell> = columns
            .iter()
            .map(|column| Cell::new(doc.get(*column).map(format_value).unwrap_or_default()))
            .collect();
        table.add_row(row);
    }

    table
}

/// Format a value for display.
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
