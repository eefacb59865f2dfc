//! Table definitions and inheritance resolution
//!
//! A table definitions document maps type names to definitions. A definition
//! may `extends` another; resolving a type walks that chain and merges from
//! the most ancestral definition downward. Every field is replaced by the more
//! specific definition except `attributes`, which is merged key by key.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Name of the definition every table is layered over
pub const DEFAULT_TYPE: &str = "default";

/// Columns used when nothing else defines any
pub const FALLBACK_COLUMNS: &[&str] = &["Combo", "Damage", "Meter", "Notes"];

const EXTENDS: &str = "extends";
const ATTRIBUTES: &str = "attributes";
const COLUMNS: &str = "columns";
const COLUMNS_HTML: &str = "columnsHtml";

/// Problems found while resolving definitions
///
/// None of these abort rendering; they are reported and the affected
/// definition degrades.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("table definitions are not valid JSON: {0}")]
    Json(String),

    #[error("table definitions document must be a JSON object")]
    NotAnObject,

    #[error("table definition '{0}' is not an object")]
    MalformedDefinition(String),

    #[error("unknown table type '{0}'")]
    UnknownType(String),

    #[error("table type '{child}' extends unknown type '{parent}'")]
    MissingParent { child: String, parent: String },

    #[error("inheritance cycle: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },
}

/// A table definition: an open set of fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDefinition {
    fields: Map<String, Value>,
}

impl TableDefinition {
    /// Wrap an object's fields
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The built-in definition underneath every table
    pub fn fallback() -> Self {
        let columns = FALLBACK_COLUMNS
            .iter()
            .map(|label| Value::String((*label).to_string()))
            .collect();
        let mut fields = Map::new();
        fields.insert(COLUMNS.to_string(), Value::Array(columns));
        Self { fields }
    }

    /// The parent type, if any
    pub fn extends(&self) -> Option<&str> {
        self.fields.get(EXTENDS).and_then(Value::as_str)
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a string field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Whether no fields are set
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merged `attributes` as ordered string pairs
    pub fn attributes(&self) -> Vec<(String, String)> {
        let Some(Value::Object(attributes)) = self.get(ATTRIBUTES) else {
            return Vec::new();
        };
        attributes
            .iter()
            .filter_map(|(name, value)| match value {
                Value::String(s) => Some((name.clone(), s.clone())),
                Value::Number(n) => Some((name.clone(), n.to_string())),
                Value::Bool(true) => Some((name.clone(), String::new())),
                _ => None,
            })
            .collect()
    }

    /// Layer `overlay` on top of this definition
    ///
    /// `extends` is not carried over; it only drives resolution. Setting one of
    /// `columns`/`columnsHtml` replaces both, since they are alternative
    /// spellings of the same column list.
    pub fn merge(&mut self, overlay: &TableDefinition) {
        for (key, value) in &overlay.fields {
            match key.as_str() {
                EXTENDS => {}
                ATTRIBUTES => match (self.fields.get_mut(ATTRIBUTES), value) {
                    (Some(Value::Object(base)), Value::Object(extra)) => {
                        for (name, attr) in extra {
                            base.insert(name.clone(), attr.clone());
                        }
                    }
                    _ => {
                        self.fields.insert(key.clone(), value.clone());
                    }
                },
                COLUMNS | COLUMNS_HTML => {
                    self.fields.remove(COLUMNS);
                    self.fields.remove(COLUMNS_HTML);
                    self.fields.insert(key.clone(), value.clone());
                }
                _ => {
                    self.fields.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// All named definitions from a table definitions document
#[derive(Debug, Clone, Default)]
pub struct TableDefinitions {
    definitions: BTreeMap<String, TableDefinition>,
}

impl TableDefinitions {
    /// No definitions: tables fall back to built-in columns
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a table definitions document
    ///
    /// Entries that are not objects are skipped with a warning.
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| DefinitionError::Json(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build from an already parsed document
    pub fn from_value(value: Value) -> Result<Self, DefinitionError> {
        let Value::Object(entries) = value else {
            return Err(DefinitionError::NotAnObject);
        };

        let mut definitions = BTreeMap::new();
        for (name, entry) in entries {
            match entry {
                Value::Object(fields) => {
                    definitions.insert(name, TableDefinition::from_map(fields));
                }
                _ => log::warn!("{}", DefinitionError::MalformedDefinition(name)),
            }
        }
        Ok(Self { definitions })
    }

    /// Insert or replace a named definition
    pub fn insert(&mut self, name: impl Into<String>, definition: TableDefinition) {
        self.definitions.insert(name.into(), definition);
    }

    /// Defined type names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether there are no definitions
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Resolve a type, returning the merged definition and any diagnostic
    ///
    /// A cycle yields an empty definition. An unknown type yields an empty
    /// definition. A missing ancestor stops the walk; what was found so far is
    /// still merged.
    pub fn try_resolve(&self, type_name: &str) -> (TableDefinition, Option<DefinitionError>) {
        let mut chain: Vec<&str> = Vec::new();
        let mut lineage: Vec<&TableDefinition> = Vec::new();
        let mut current = type_name;

        let diagnostic = loop {
            if chain.contains(&current) {
                let mut cycle: Vec<String> = chain.iter().map(|s| s.to_string()).collect();
                cycle.push(current.to_string());
                return (
                    TableDefinition::default(),
                    Some(DefinitionError::Cycle { chain: cycle }),
                );
            }

            let Some(definition) = self.definitions.get(current) else {
                break match chain.last() {
                    None => Some(DefinitionError::UnknownType(current.to_string())),
                    Some(child) => Some(DefinitionError::MissingParent {
                        child: child.to_string(),
                        parent: current.to_string(),
                    }),
                };
            };

            chain.push(current);
            lineage.push(definition);
            match definition.extends() {
                Some(parent) => current = parent,
                None => break None,
            }
        };

        let mut resolved = TableDefinition::default();
        for definition in lineage.iter().rev() {
            resolved.merge(definition);
        }
        (resolved, diagnostic)
    }

    /// Resolve a type, logging any diagnostic
    pub fn resolve(&self, type_name: &str) -> TableDefinition {
        let (resolved, diagnostic) = self.try_resolve(type_name);
        if let Some(error) = diagnostic {
            log::warn!("{}", error);
        }
        resolved
    }

    /// Resolve the full definition of one table
    ///
    /// Precedence, lowest first: built-in fallback columns, the `default`
    /// type, the table's named `type` (or `extends`), then the table's inline
    /// fields.
    pub fn resolve_table(&self, inline: &Map<String, Value>) -> TableDefinition {
        let mut resolved = TableDefinition::fallback();

        if self.definitions.contains_key(DEFAULT_TYPE) {
            resolved.merge(&self.resolve(DEFAULT_TYPE));
        }

        let type_name = inline
            .get("type")
            .or_else(|| inline.get(EXTENDS))
            .and_then(Value::as_str);
        if let Some(type_name) = type_name.filter(|name| *name != DEFAULT_TYPE) {
            resolved.merge(&self.resolve(type_name));
        }

        let mut overrides = inline.clone();
        overrides.remove("type");
        resolved.merge(&TableDefinition::from_map(overrides));
        resolved
    }

    /// Diagnostics for every definition, for validation
    pub fn diagnostics(&self) -> Vec<DefinitionError> {
        self.definitions
            .keys()
            .filter_map(|name| self.try_resolve(name).1)
            .collect()
    }
}
