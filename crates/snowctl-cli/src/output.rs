//! Output routing
//!
//! Commands never print directly. They hand an [`OutputData`] container to
//! an [`OutputSink`], which renders it as aligned text tables or as JSON
//! depending on the global `--format` flag.

use clap::ValueEnum;
use console::{Alignment, measure_text_width, pad_str, style};
use indexmap::IndexMap;
use serde_json::{Value, json};
use snowctl_core::{Description, StreamlitApp};
use std::io::{self, Write};

/// Output format selected with `--format`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

/// A single result produced by a command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Status line returned by the service
    Message(String),
    /// Ordered rows with named columns
    Rows(Vec<IndexMap<String, Value>>),
    /// A single key/value record
    Record(IndexMap<String, Value>),
    /// A link to an application
    Url(String),
}

impl CommandResult {
    /// Rows for `streamlit list`
    pub fn apps(apps: &[StreamlitApp]) -> Self {
        CommandResult::Rows(apps.iter().map(app_row).collect())
    }

    /// Record for `streamlit describe`
    pub fn description(description: &Description) -> Self {
        CommandResult::Record(
            description
                .fields()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().map(Value::String).unwrap_or(Value::Null)))
                .collect(),
        )
    }

    fn to_json(&self) -> Value {
        match self {
            CommandResult::Message(message) => json!({ "message": message }),
            CommandResult::Url(url) => json!({ "url": url }),
            CommandResult::Record(record) => Value::Object(record.clone().into_iter().collect()),
            CommandResult::Rows(rows) => Value::Array(
                rows.iter()
                    .map(|row| Value::Object(row.clone().into_iter().collect()))
                    .collect(),
            ),
        }
    }

    fn to_text(&self) -> String {
        match self {
            CommandResult::Message(message) => message.clone(),
            CommandResult::Url(url) => url.clone(),
            CommandResult::Record(record) => {
                let rows: Vec<Vec<String>> = record
                    .iter()
                    .map(|(k, v)| vec![k.clone(), cell(v)])
                    .collect();
                table(&["property", "value"], &rows)
            }
            CommandResult::Rows(rows) => {
                let Some(first) = rows.first() else {
                    return style("No results").dim().to_string();
                };
                let headers: Vec<&str> = first.keys().map(String::as_str).collect();
                let cells: Vec<Vec<String>> = rows
                    .iter()
                    .map(|row| {
                        headers
                            .iter()
                            .map(|h| row.get(*h).map(cell).unwrap_or_default())
                            .collect()
                    })
                    .collect();
                table(&headers, &cells)
            }
        }
    }
}

/// Ordered container of results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputData {
    items: Vec<CommandResult>,
}

impl OutputData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container holding a single result
    pub fn single(result: CommandResult) -> Self {
        Self::new().add(result)
    }

    /// Append a result
    pub fn add(mut self, result: CommandResult) -> Self {
        self.items.push(result);
        self
    }

    #[cfg(test)]
    pub fn results(&self) -> impl Iterator<Item = &CommandResult> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render for the given format
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => {
                let value = match self.items.as_slice() {
                    [only] => only.to_json(),
                    items => Value::Array(items.iter().map(CommandResult::to_json).collect()),
                };
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }
            OutputFormat::Table => self
                .items
                .iter()
                .map(CommandResult::to_text)
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// Destination for command output
pub trait OutputSink: Send {
    fn emit(&mut self, data: &OutputData) -> io::Result<()>;
}

/// Renders output to a writer in the selected format
pub struct Renderer<W: Write + Send> {
    format: OutputFormat,
    writer: W,
}

impl Renderer<io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(format, io::stdout())
    }
}

impl<W: Write + Send> Renderer<W> {
    pub fn new(format: OutputFormat, writer: W) -> Self {
        Self { format, writer }
    }
}

impl<W: Write + Send> OutputSink for Renderer<W> {
    fn emit(&mut self, data: &OutputData) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        writeln!(self.writer, "{}", data.render(self.format))?;
        self.writer.flush()
    }
}

fn app_row(app: &StreamlitApp) -> IndexMap<String, Value> {
    let opt = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);

    let mut row = IndexMap::new();
    row.insert("name".to_string(), Value::String(app.name.clone()));
    row.insert("database_name".to_string(), opt(&app.database_name));
    row.insert("schema_name".to_string(), opt(&app.schema_name));
    row.insert("title".to_string(), opt(&app.title));
    row.insert("owner".to_string(), opt(&app.owner));
    row.insert("query_warehouse".to_string(), opt(&app.query_warehouse));
    row.insert("url_id".to_string(), opt(&app.url_id));
    row.insert(
        "created_on".to_string(),
        app.created_on
            .map(|t| Value::String(t.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
    );
    row
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render an aligned table with bold, upper-cased headers
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| measure_text_width(h)).collect();
    for row in rows {
        for (idx, value) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(idx) {
                *w = (*w).max(measure_text_width(value));
            }
        }
    }

    let line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| pad_str(c, *w, Alignment::Left, None).to_string())
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 1);
    out.push(line(
        headers
            .iter()
            .map(|h| style(h.to_uppercase()).bold().to_string())
            .collect(),
    ));
    for row in rows {
        out.push(line(row.clone()));
    }
    out.join("\n")
}
