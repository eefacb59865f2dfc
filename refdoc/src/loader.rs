//! Loading the documents behind a rendering root
//!
//! A root needs one required document (the section spec) and two optional
//! ones (formatting rules, table definitions). The three are read together,
//! then every fragment and CSV file the sections reference is read together.
//! Everything is joined before rendering starts.

use crate::section::{parse_document, SectionSpec, SpecError};
use crate::table::{DefinitionError, TableDefinitions};
use crate::text_format::{FormatError, TextFormatter};
use itertools::Itertools;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Errors raised while loading a root's documents
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}", path = .0.display(), source = .1)]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("Error parsing sections in {path}: {source}", path = .0.display(), source = .1)]
    SpecError(PathBuf, #[source] SpecError),

    #[error("Error parsing formatting rules in {path}: {source}", path = .0.display(), source = .1)]
    FormatError(PathBuf, #[source] FormatError),

    #[error("Error parsing table definitions in {path}: {source}", path = .0.display(), source = .1)]
    DefinitionError(PathBuf, #[source] DefinitionError),

    #[error("Error reading CSV {path}: {source}", path = .0.display(), source = .1)]
    CsvError(PathBuf, #[source] csv::Error),
}

/// Where a root's documents live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSource {
    /// Id of the rendering root
    pub id: String,
    /// Section spec (required)
    pub sections: PathBuf,
    /// Formatting rules (optional)
    pub formatting: Option<PathBuf>,
    /// Table definitions (optional)
    pub tables: Option<PathBuf>,
}

impl RootSource {
    pub fn new(id: impl Into<String>, sections: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            sections: sections.into(),
            formatting: None,
            tables: None,
        }
    }

    /// Directory that fragment and CSV references are relative to
    pub fn base_dir(&self) -> &Path {
        self.sections.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Resolve a path referenced from the section spec
    pub fn resolve(&self, reference: &str) -> PathBuf {
        self.base_dir().join(reference)
    }
}

/// Externally referenced content, keyed by the reference as written
///
/// Failed loads are kept as messages so the renderer can show them in place.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    fragments: HashMap<String, Result<String, String>>,
    csv: HashMap<String, Result<Vec<Value>, String>>,
}

impl Resources {
    pub fn insert_fragment(&mut self, reference: impl Into<String>, markup: Result<String, String>) {
        self.fragments.insert(reference.into(), markup);
    }

    pub fn insert_csv(&mut self, reference: impl Into<String>, rows: Result<Vec<Value>, String>) {
        self.csv.insert(reference.into(), rows);
    }

    /// A fragment's markup, or why it could not be loaded
    pub fn fragment(&self, reference: &str) -> Option<Result<&str, &str>> {
        self.fragments
            .get(reference)
            .map(|loaded| loaded.as_deref().map_err(String::as_str))
    }

    /// A CSV file's data rows, or why they could not be loaded
    pub fn csv_rows(&self, reference: &str) -> Option<Result<&[Value], &str>> {
        self.csv.get(reference).map(|loaded| match loaded {
            Ok(rows) => Ok(rows.as_slice()),
            Err(message) => Err(message.as_str()),
        })
    }

    /// References that failed to load, with the reason
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.fragments
            .iter()
            .filter_map(|(reference, loaded)| {
                loaded.as_ref().err().map(|e| (reference.as_str(), e.as_str()))
            })
            .chain(self.csv.iter().filter_map(|(reference, loaded)| {
                loaded.as_ref().err().map(|e| (reference.as_str(), e.as_str()))
            }))
            .sorted_unstable()
            .collect()
    }
}

/// Everything a root needs to render
#[derive(Debug)]
pub struct LoadedRoot {
    pub source: RootSource,
    /// Parsed sections, or the reason the required document is unusable
    pub sections: Result<Vec<SectionSpec>, LoadError>,
    pub formatter: TextFormatter,
    pub definitions: TableDefinitions,
    pub resources: Resources,
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|e| LoadError::IoError(path.to_path_buf(), e))
}

fn load_sections(path: &Path) -> Result<Vec<SectionSpec>, LoadError> {
    let content = read(path)?;
    parse_document(&content).map_err(|e| LoadError::SpecError(path.to_path_buf(), e))
}

fn load_formatter(path: Option<&Path>) -> TextFormatter {
    let Some(path) = path else {
        return TextFormatter::empty();
    };
    let loaded = read(path).and_then(|content| {
        TextFormatter::from_json(&content).map_err(|e| LoadError::FormatError(path.to_path_buf(), e))
    });
    loaded.unwrap_or_else(|e| {
        log::warn!("{}; auto-formatting will only escape", e);
        TextFormatter::empty()
    })
}

fn load_definitions(path: Option<&Path>) -> TableDefinitions {
    let Some(path) = path else {
        return TableDefinitions::empty();
    };
    let loaded = read(path).and_then(|content| {
        TableDefinitions::from_json(&content)
            .map_err(|e| LoadError::DefinitionError(path.to_path_buf(), e))
    });
    loaded.unwrap_or_else(|e| {
        log::warn!("{}; only built-in columns are available", e);
        TableDefinitions::empty()
    })
}

/// Read a CSV file into rows of string cells; the header row is skipped
pub fn load_csv(path: &Path) -> Result<Vec<Value>, LoadError> {
    let to_error = |e| LoadError::CsvError(path.to_path_buf(), e);
    let mut reader = csv::Reader::from_path(path).map_err(to_error)?;
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(to_error)?;
        rows.push(Value::Array(
            record.iter().map(|cell| Value::String(cell.to_string())).collect(),
        ));
    }
    Ok(rows)
}

#[cfg(feature = "parallel")]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    rayon::join(a, b)
}

#[cfg(not(feature = "parallel"))]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA,
    B: FnOnce() -> RB,
{
    (a(), b())
}

fn load_resources(source: &RootSource, sections: &[SectionSpec]) -> Resources {
    let fragment_refs: Vec<&str> = sections
        .iter()
        .flat_map(SectionSpec::fetch_sources)
        .unique()
        .collect();
    let csv_refs: Vec<&str> = sections
        .iter()
        .flat_map(SectionSpec::csv_sources)
        .unique()
        .collect();

    let load_fragment = |reference: &&str| {
        let markup = read(&source.resolve(reference)).map_err(|e| {
            log::warn!("{}", e);
            e.to_string()
        });
        (reference.to_string(), markup)
    };
    let load_rows = |reference: &&str| {
        let rows = load_csv(&source.resolve(reference)).map_err(|e| {
            log::warn!("{}", e);
            e.to_string()
        });
        (reference.to_string(), rows)
    };

    #[cfg(feature = "parallel")]
    let (fragments, csv): (Vec<_>, Vec<_>) = join(
        || fragment_refs.par_iter().map(load_fragment).collect(),
        || csv_refs.par_iter().map(load_rows).collect(),
    );

    #[cfg(not(feature = "parallel"))]
    let (fragments, csv): (Vec<_>, Vec<_>) = join(
        || fragment_refs.iter().map(load_fragment).collect(),
        || csv_refs.iter().map(load_rows).collect(),
    );

    let mut resources = Resources::default();
    for (reference, markup) in fragments {
        resources.insert_fragment(reference, markup);
    }
    for (reference, rows) in csv {
        resources.insert_csv(reference, rows);
    }
    resources
}

/// Load one root
///
/// Only the section spec is required. Optional documents that fail to load
/// are logged and replaced by empty defaults.
pub fn load_root(source: &RootSource) -> LoadedRoot {
    log::info!("Loading root '{}' from {}", source.id, source.sections.display());

    let (sections, (formatter, definitions)) = join(
        || load_sections(&source.sections),
        || {
            join(
                || load_formatter(source.formatting.as_deref()),
                || load_definitions(source.tables.as_deref()),
            )
        },
    );

    let resources = match &sections {
        Ok(sections) => load_resources(source, sections),
        Err(e) => {
            log::warn!("Root '{}' cannot render: {}", source.id, e);
            Resources::default()
        }
    };

    LoadedRoot {
        source: source.clone(),
        sections,
        formatter,
        definitions,
        resources,
    }
}

/// Load several roots, preserving their order
pub fn load_roots(sources: &[RootSource]) -> Vec<LoadedRoot> {
    #[cfg(feature = "parallel")]
    let loaded = sources.par_iter().map(load_root).collect();

    #[cfg(not(feature = "parallel"))]
    let loaded = sources.iter().map(load_root).collect();

    loaded
}
