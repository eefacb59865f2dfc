//! Section spec documents
//!
//! The section spec is a JSON array of section nodes. Each node is parsed once
//! into a [`SectionSpec`] whose content mode is already resolved, so the
//! renderer never has to inspect raw JSON shapes.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while parsing section specs
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("section spec is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("section spec must be a JSON array of sections")]
    NotAnArray,

    #[error("section {index} is malformed: {message}")]
    MalformedSection { index: usize, message: String },

    #[error("section '{title}' uses unknown content mode '{mode}'")]
    UnknownMode { title: String, mode: String },
}

/// One section node
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpec {
    /// Author-supplied stable id
    pub id: Option<String>,
    pub title: String,
    /// Prose paragraphs shown before the content
    pub descriptions: Vec<String>,
    /// Auto-format override for this node (and, for groups, its descendants)
    pub auto_format: Option<bool>,
    pub start_collapsed: bool,
    pub content: Content,
}

/// The content region of a section
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Only the descriptions
    Empty,
    /// Inline author markup
    Html(String),
    /// Markup loaded from a file next to the spec
    Fetch { src: String },
    /// Nested subsections
    Group(Vec<SectionSpec>),
    /// An embedded table / combo list
    Table(TableSpec),
}

/// A table region as written in the spec
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSpec {
    /// `type` plus inline overrides
    pub table: Map<String, Value>,
    pub rows: Vec<Value>,
    pub rows_html: Vec<Value>,
    /// CSV file providing additional rows
    pub csv: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(one) => vec![one],
            OneOrMany::Many(many) => many,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSection {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "name", alias = "heading")]
    title: String,
    #[serde(default, alias = "description")]
    descriptions: OneOrMany,
    #[serde(default, alias = "auto_format")]
    auto_format: Option<bool>,
    #[serde(default, alias = "start_collapsed", alias = "collapsed")]
    start_collapsed: Option<bool>,
    #[serde(default)]
    table: Option<Map<String, Value>>,
    #[serde(default)]
    rows: Vec<Value>,
    #[serde(default, rename = "rows_html", alias = "rowsHtml")]
    rows_html: Vec<Value>,
    #[serde(default)]
    csv: Option<String>,
    #[serde(default)]
    content: Option<Map<String, Value>>,
}

fn str_field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| object.get(*key).and_then(Value::as_str))
}

impl SectionSpec {
    /// Parse one section node (and, recursively, its group children)
    pub fn from_value(value: Value, index: usize) -> Result<Self, SpecError> {
        let raw: RawSection =
            serde_json::from_value(value).map_err(|e| SpecError::MalformedSection {
                index,
                message: e.to_string(),
            })?;

        let mut auto_format = raw.auto_format;
        let content = match raw.content {
            None => Self::implicit_content(raw.table, raw.rows, raw.rows_html, raw.csv),
            Some(content) => {
                if auto_format.is_none() {
                    auto_format = content.get("autoFormat").and_then(Value::as_bool);
                }
                Self::explicit_content(&raw.title, content, raw.table, raw.rows, raw.rows_html, raw.csv)
            }
        };

        Ok(Self {
            id: raw.id.filter(|id| !id.trim().is_empty()),
            title: raw.title,
            descriptions: raw.descriptions.into_vec(),
            auto_format,
            start_collapsed: raw.start_collapsed.unwrap_or(true),
            content,
        })
    }

    fn implicit_content(
        table: Option<Map<String, Value>>,
        rows: Vec<Value>,
        rows_html: Vec<Value>,
        csv: Option<String>,
    ) -> Content {
        if table.is_none() && rows.is_empty() && rows_html.is_empty() && csv.is_none() {
            return Content::Empty;
        }
        Content::Table(TableSpec {
            table: table.unwrap_or_default(),
            rows,
            rows_html,
            csv,
        })
    }

    fn explicit_content(
        title: &str,
        mut content: Map<String, Value>,
        table: Option<Map<String, Value>>,
        rows: Vec<Value>,
        rows_html: Vec<Value>,
        csv: Option<String>,
    ) -> Content {
        let mode = str_field(&content, &["mode", "type"])
            .unwrap_or("")
            .to_ascii_lowercase();

        match mode.as_str() {
            "html" | "markup" | "raw" => {
                Content::Html(str_field(&content, &["html", "markup"]).unwrap_or("").to_string())
            }
            "fetch" | "external" | "url" | "src" => {
                match str_field(&content, &["src", "url", "href", "path"]) {
                    Some(src) => Content::Fetch {
                        src: src.to_string(),
                    },
                    None => {
                        log::warn!("Section '{}' fetches content without a source", title);
                        Content::Empty
                    }
                }
            }
            "group" | "sections" => {
                let children = ["sections", "children", "items"]
                    .iter()
                    .find_map(|key| match content.remove(*key) {
                        Some(Value::Array(children)) => Some(children),
                        _ => None,
                    })
                    .unwrap_or_default();
                Content::Group(parse_sections(children))
            }
            "combo-list" | "combo" | "table" | "combos" => {
                let table = match content.remove("table") {
                    Some(Value::Object(inline)) => Some(inline),
                    _ => table,
                };
                let rows = match content.remove("rows") {
                    Some(Value::Array(rows)) => rows,
                    _ => rows,
                };
                let rows_html = match content.remove("rows_html").or_else(|| content.remove("rowsHtml")) {
                    Some(Value::Array(rows_html)) => rows_html,
                    _ => rows_html,
                };
                let csv = str_field(&content, &["csv"]).map(str::to_string).or(csv);
                Content::Table(TableSpec {
                    table: table.unwrap_or_default(),
                    rows,
                    rows_html,
                    csv,
                })
            }
            _ => {
                log::warn!(
                    "{}",
                    SpecError::UnknownMode {
                        title: title.to_string(),
                        mode,
                    }
                );
                Content::Empty
            }
        }
    }

    /// Every fetched fragment source in this subtree
    pub fn fetch_sources(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_sources(&mut out, &|content| match content {
            Content::Fetch { src } => Some(src.as_str()),
            _ => None,
        });
        out
    }

    /// Every CSV source in this subtree
    pub fn csv_sources(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_sources(&mut out, &|content| match content {
            Content::Table(TableSpec { csv: Some(csv), .. }) => Some(csv.as_str()),
            _ => None,
        });
        out
    }

    fn collect_sources<'a>(
        &'a self,
        out: &mut Vec<&'a str>,
        pick: &dyn Fn(&'a Content) -> Option<&'a str>,
    ) {
        if let Some(src) = pick(&self.content) {
            out.push(src);
        }
        if let Content::Group(children) = &self.content {
            for child in children {
                child.collect_sources(out, pick);
            }
        }
    }
}

/// Parse a list of section nodes, skipping malformed ones with a warning
pub fn parse_sections(values: Vec<Value>) -> Vec<SectionSpec> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match SectionSpec::from_value(value, index) {
            Ok(spec) => Some(spec),
            Err(e) => {
                log::warn!("Skipping section: {}", e);
                None
            }
        })
        .collect()
}

fn document_values(json: &str) -> Result<Vec<Value>, SpecError> {
    let value: Value = serde_json::from_str(json)?;
    match value {
        Value::Array(values) => Ok(values),
        Value::Object(mut object) => match object.remove("sections") {
            Some(Value::Array(values)) => Ok(values),
            _ => Err(SpecError::NotAnArray),
        },
        _ => Err(SpecError::NotAnArray),
    }
}

/// Parse a section spec document
///
/// The document is a JSON array; an object with a `sections` array is also
/// accepted.
pub fn parse_document(json: &str) -> Result<Vec<SectionSpec>, SpecError> {
    Ok(parse_sections(document_values(json)?))
}

/// Problems with the top-level entries of a section spec document
///
/// Entries listed here are the ones [`parse_document`] skips.
pub fn check_document(json: &str) -> Result<Vec<SpecError>, SpecError> {
    Ok(document_values(json)?
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| SectionSpec::from_value(value, index).err())
        .collect())
}
