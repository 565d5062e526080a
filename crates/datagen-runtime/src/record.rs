//! Contracts between generated models and the writers and sinks that consume their records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;

/// Output encodings supported by the `gen` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Csv,
    Json,
    Xml,
    Stdout,
    Serialised,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Csv,
        Format::Json,
        Format::Xml,
        Format::Stdout,
        Format::Serialised,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Stdout => "stdout",
            Self::Serialised => "serialised",
        }
    }

    /// File extension used when the output path names a directory.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Serialised => "bin",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|f| f.as_str()).collect();
                format!("unknown format {value:?}, expected one of {}", known.join(", "))
            })
    }
}

/// Per-model metadata declared in the `metadata` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub count: usize,
    pub tags: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new(count: usize, tags: &[(&str, &str)]) -> Self {
        Self {
            count,
            tags: tags
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }
}

/// One generated row.
pub trait Record: Send + Sync {
    fn csv_headers(&self) -> Vec<&'static str>;

    fn to_csv(&self) -> Vec<String>;

    /// The record as a JSON object keyed by field name.
    fn to_json(&self) -> Value;

    fn to_xml(&self) -> String;

    /// Bytes produced by the model's `serialiser` section; empty when none is declared.
    fn serialise(&self) -> Vec<u8>;

    /// Encode as a single line in `format`, without a trailing newline.
    fn encode(&self, format: Format) -> Result<Vec<u8>, csv::Error> {
        let bytes = match format {
            Format::Csv => csv_line(&self.to_csv())?,
            Format::Json | Format::Stdout => self.to_json().to_string().into_bytes(),
            Format::Xml => self.to_xml().into_bytes(),
            Format::Serialised => self.serialise(),
        };
        Ok(bytes)
    }
}

/// Producer of records for one model.
pub trait RecordGenerator: Send + Sync {
    /// Qualified model name.
    fn name(&self) -> &'static str;

    fn metadata(&self) -> Metadata;

    fn generate(&self, iter: usize) -> Box<dyn Record>;
}

/// Lock a memo cache, recovering the data if a previous holder panicked.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Render a value as a CSV or XML cell: strings verbatim, everything else as JSON text.
pub fn cell<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(text)) => text,
        Ok(Value::Null) => String::new(),
        Ok(other) => other.to_string(),
        Err(err) => format!("<unserialisable: {err}>"),
    }
}

/// Serialize a record to a JSON value, falling back to `null` for unrepresentable data.
pub fn json<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Escape text for use inside an XML element.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Build `<tag><field>value</field>..</tag>` from already rendered cells.
pub fn xml_element(tag: &str, fields: &[(&str, String)]) -> String {
    let mut out = format!("<{tag}>");
    for (name, value) in fields {
        out.push_str(&format!("<{name}>{}</{name}>", xml_escape(value)));
    }
    out.push_str(&format!("</{tag}>"));
    out
}

fn csv_line(cells: &[String]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(cells)?;
    let mut bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    Ok(bytes)
}
