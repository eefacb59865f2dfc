//! Column configuration
//!
//! Column entries arrive in several spellings (a bare label string, an object
//! with alternate key names, legacy color aliases, sort shorthands). They are
//! normalized here, once per table render, into [`ColumnConfig`] values that
//! header and cell rendering both consume.

use super::definition::TableDefinition;
use serde_json::{Map, Value};
use thiserror::Error;

/// Malformed column entries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColumnError {
    #[error("column {index} must be a string or an object")]
    NotAnObject { index: usize },

    #[error("column {index} has no label")]
    MissingLabel { index: usize },
}

/// How sort keys are derived for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortType {
    #[default]
    Text,
    Number,
}

impl SortType {
    /// Parse a type name, accepting the numeric synonyms
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "number" | "numeric" | "digit" | "digits" => Some(Self::Number),
            "text" | "string" | "alpha" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Reduction applied when a cell holds several numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    First,
    Min,
    Max,
    Sum,
}

impl Strategy {
    /// Parse a strategy name
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "first" => Some(Self::First),
            "min" | "minimum" => Some(Self::Min),
            "max" | "maximum" => Some(Self::Max),
            "sum" | "total" => Some(Self::Sum),
            _ => None,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// Parse an order name
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Ascending),
            "desc" | "descending" => Some(Self::Descending),
            _ => None,
        }
    }

    /// The other direction
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    /// Value for the `aria-sort` attribute
    pub fn aria(self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

/// Text comparison flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sorter {
    /// Case-insensitive, numeric-substring-aware collation
    #[default]
    Natural,
    /// Plain lexicographic comparison
    Plain,
}

impl Sorter {
    /// Parse a sorter name
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "natural" | "locale" | "collate" => Some(Self::Natural),
            "plain" | "lexical" | "lexicographic" => Some(Self::Plain),
            _ => None,
        }
    }
}

/// Normalized sort settings of a sortable column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub kind: SortType,
    pub strategy: Strategy,
    pub sorter: Sorter,
    pub initial_order: SortDirection,
}

/// Sort configuration of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnSort {
    /// Nothing configured: sortable with default text comparison
    #[default]
    Unconfigured,
    /// Explicit settings
    Configured(SortSpec),
    /// `sort: false`: no interaction at all
    Disabled,
}

impl ColumnSort {
    /// Effective settings, or `None` when sorting is disabled
    pub fn spec(&self) -> Option<SortSpec> {
        match self {
            Self::Unconfigured => Some(SortSpec::default()),
            Self::Configured(spec) => Some(*spec),
            Self::Disabled => None,
        }
    }

    /// Whether the column reacts to activation
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Normalize every sort-related spelling found on a column object
    pub fn from_column(column: &Map<String, Value>) -> Self {
        let disabled = column.get("sort") == Some(&Value::Bool(false))
            || column.get("sortable") == Some(&Value::Bool(false))
            || column.get("sortDisabled") == Some(&Value::Bool(true));
        if disabled {
            return Self::Disabled;
        }

        let mut spec = SortSpec::default();
        let mut configured = false;

        match column.get("sort") {
            Some(Value::Bool(true)) => configured = true,
            Some(Value::String(kind)) => {
                configured = true;
                spec.kind = parse_or_warn(kind, SortType::parse, "sort type");
            }
            Some(Value::Object(settings)) => {
                configured = true;
                apply_settings(&mut spec, settings, ["type", "strategy", "sorter"]);
            }
            _ => {}
        }

        if column.get("sortable") == Some(&Value::Bool(true)) {
            configured = true;
        }
        configured |= apply_settings(&mut spec, column, ["sortType", "sortStrategy", "sorter"]);

        if configured {
            Self::Configured(spec)
        } else {
            Self::Unconfigured
        }
    }
}

/// Apply type/strategy/sorter/order keys; returns whether any was present
fn apply_settings(spec: &mut SortSpec, settings: &Map<String, Value>, keys: [&str; 3]) -> bool {
    let [type_key, strategy_key, sorter_key] = keys;
    let mut any = false;

    if let Some(kind) = settings
        .get(type_key)
        .or_else(|| settings.get("kind"))
        .and_then(Value::as_str)
    {
        spec.kind = parse_or_warn(kind, SortType::parse, "sort type");
        any = true;
    }
    if let Some(strategy) = settings.get(strategy_key).and_then(Value::as_str) {
        spec.strategy = parse_or_warn(strategy, Strategy::parse, "sort strategy");
        any = true;
    }
    if let Some(sorter) = settings.get(sorter_key).and_then(Value::as_str) {
        spec.sorter = parse_or_warn(sorter, Sorter::parse, "sorter");
        any = true;
    }
    let order = ["initialOrder", "sortOrder", "defaultOrder", "order"]
        .iter()
        .find_map(|key| settings.get(*key).and_then(Value::as_str));
    if let Some(order) = order {
        spec.initial_order = parse_or_warn(order, SortDirection::parse, "sort order");
        any = true;
    }
    any
}

fn parse_or_warn<T: Default>(value: &str, parse: fn(&str) -> Option<T>, what: &str) -> T {
    parse(value).unwrap_or_else(|| {
        log::warn!("Unknown {} '{}', using the default", what, value);
        T::default()
    })
}

/// Header label content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLabel {
    /// Plain text, escaped on output
    Text(String),
    /// Author markup, emitted verbatim
    Html(String),
}

/// Header cell presentation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderStyle {
    pub align: Option<String>,
    pub class_name: Option<String>,
    pub style: Option<String>,
    pub attributes: Vec<(String, String)>,
}

impl HeaderStyle {
    fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(header)) = value else {
            return Self::default();
        };
        Self {
            align: string_field(header, &["align", "textAlign"]),
            class_name: string_field(header, &["className", "class"]),
            style: string_field(header, &["style"]),
            attributes: match header.get("attributes") {
                Some(Value::Object(attributes)) => attributes
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}

/// A column, flattened and type-normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConfig {
    /// Index of the cell in each source row
    pub source_index: usize,
    pub label: HeaderLabel,
    /// `false` keeps cell content on one line
    pub wrap: bool,
    /// Literal text placed before the cell text
    pub before: Option<String>,
    /// Literal text placed after the cell text
    pub after: Option<String>,
    /// Cell text color (from `color`, `colour` or `textColor`)
    pub color: Option<String>,
    /// Class applied to body cells
    pub class_name: Option<String>,
    pub header: HeaderStyle,
    pub sort: ColumnSort,
}

impl ColumnConfig {
    /// A plain text column with no extra settings
    pub fn plain(source_index: usize, label: impl Into<String>) -> Self {
        Self {
            source_index,
            label: HeaderLabel::Text(label.into()),
            wrap: true,
            before: None,
            after: None,
            color: None,
            class_name: None,
            header: HeaderStyle::default(),
            sort: ColumnSort::Unconfigured,
        }
    }

    /// A raw-markup column; these never sort
    pub fn html(source_index: usize, markup: impl Into<String>) -> Self {
        Self {
            label: HeaderLabel::Html(markup.into()),
            sort: ColumnSort::Disabled,
            ..Self::plain(source_index, "")
        }
    }

    /// Normalize one `columns` entry
    pub fn from_value(value: &Value, source_index: usize) -> Result<Self, ColumnError> {
        let column = match value {
            Value::String(label) => return Ok(Self::plain(source_index, label.clone())),
            Value::Object(column) => column,
            _ => {
                return Err(ColumnError::NotAnObject {
                    index: source_index,
                })
            }
        };

        let label = if let Some(html) = string_field(column, &["html"]) {
            HeaderLabel::Html(html)
        } else if let Some(text) = string_field(column, &["text", "label", "title", "name"]) {
            HeaderLabel::Text(text)
        } else {
            return Err(ColumnError::MissingLabel {
                index: source_index,
            });
        };

        Ok(Self {
            source_index,
            label,
            wrap: column.get("wrap").and_then(Value::as_bool).unwrap_or(true),
            before: string_field(column, &["before", "prefix"]),
            after: string_field(column, &["after", "suffix"]),
            color: string_field(column, &["color", "colour", "textColor"]),
            class_name: string_field(column, &["className", "class"]),
            header: HeaderStyle::from_value(column.get("header")),
            sort: ColumnSort::from_column(column),
        })
    }
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Build the column list of a resolved table definition
///
/// Malformed entries are skipped with a warning. Each config remembers its
/// source index so the i-th rendered column always reads the matching cell.
pub fn column_configs(definition: &TableDefinition) -> Vec<ColumnConfig> {
    if let Some(Value::Array(columns)) = definition.get("columnsHtml") {
        return columns
            .iter()
            .enumerate()
            .filter_map(|(index, column)| match column {
                Value::String(markup) => Some(ColumnConfig::html(index, markup.clone())),
                _ => {
                    log::warn!("Skipping raw column {}: not a string", index);
                    None
                }
            })
            .collect();
    }

    let Some(Value::Array(columns)) = definition.get("columns") else {
        return Vec::new();
    };
    columns
        .iter()
        .enumerate()
        .filter_map(|(index, column)| match ColumnConfig::from_value(column, index) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Skipping column: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sort_of(value: Value) -> ColumnSort {
        match value {
            Value::Object(map) => ColumnSort::from_column(&map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_absent_sort_is_unconfigured_but_enabled() {
        let sort = sort_of(json!({ "text": "Name" }));
        assert_eq!(sort, ColumnSort::Unconfigured);
        assert!(sort.is_enabled());
        assert_eq!(sort.spec(), Some(SortSpec::default()));
    }

    #[test]
    fn test_sort_false_disables() {
        let sort = sort_of(json!({ "text": "Name", "sort": false }));
        assert_eq!(sort, ColumnSort::Disabled);
        assert_eq!(sort.spec(), None);
        assert_eq!(sort_of(json!({ "sortDisabled": true })), ColumnSort::Disabled);
        assert_eq!(sort_of(json!({ "sortable": false })), ColumnSort::Disabled);
    }

    #[test]
    fn test_shorthands() {
        assert_eq!(
            sort_of(json!({ "sort": true })),
            ColumnSort::Configured(SortSpec::default())
        );
        for synonym in ["number", "numeric", "digit", "Number"] {
            let sort = sort_of(json!({ "sort": synonym }));
            assert_eq!(sort.spec().unwrap().kind, SortType::Number, "{}", synonym);
        }
    }

    #[test]
    fn test_full_object_and_column_level_keys() {
        let sort = sort_of(json!({
            "sort": { "type": "numeric", "strategy": "max", "initialOrder": "desc" }
        }));
        assert_eq!(
            sort,
            ColumnSort::Configured(SortSpec {
                kind: SortType::Number,
                strategy: Strategy::Max,
                sorter: Sorter::Natural,
                initial_order: SortDirection::Descending,
            })
        );

        let sort = sort_of(json!({ "sortType": "digit", "sortStrategy": "sum", "sorter": "plain" }));
        let spec = sort.spec().unwrap();
        assert_eq!(spec.kind, SortType::Number);
        assert_eq!(spec.strategy, Strategy::Sum);
        assert_eq!(spec.sorter, Sorter::Plain);
    }

    #[test]
    fn test_unknown_names_fall_back_to_defaults() {
        let spec = sort_of(json!({ "sort": { "type": "weird", "strategy": "median" } }))
            .spec()
            .unwrap();
        assert_eq!(spec.kind, SortType::Text);
        assert_eq!(spec.strategy, Strategy::First);
    }

    #[test]
    fn test_column_from_object_with_aliases() {
        let column = ColumnConfig::from_value(
            &json!({
                "label": "Damage",
                "wrap": false,
                "colour": "red",
                "after": "%",
                "header": { "align": "right", "class": "num", "attributes": { "abbr": "Dmg" } }
            }),
            1,
        )
        .unwrap();
        assert_eq!(column.source_index, 1);
        assert_eq!(column.label, HeaderLabel::Text("Damage".to_string()));
        assert!(!column.wrap);
        assert_eq!(column.color.as_deref(), Some("red"));
        assert_eq!(column.after.as_deref(), Some("%"));
        assert_eq!(column.header.align.as_deref(), Some("right"));
        assert_eq!(column.header.class_name.as_deref(), Some("num"));
        assert_eq!(
            column.header.attributes,
            vec![("abbr".to_string(), "Dmg".to_string())]
        );
    }

    #[test]
    fn test_malformed_columns_keep_source_indices() {
        let definition = TableDefinition::from_map(
            json!({ "columns": ["A", 42, { "nolabel": true }, { "text": "D" }] })
                .as_object()
                .unwrap()
                .clone(),
        );
        let columns = column_configs(&definition);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].source_index, 0);
        assert_eq!(columns[1].source_index, 3);
    }

    #[test]
    fn test_html_columns_are_sort_disabled() {
        let definition = TableDefinition::from_map(
            json!({ "columnsHtml": ["<b>A</b>", "<i>B</i>"] })
                .as_object()
                .unwrap()
                .clone(),
        );
        let columns = column_configs(&definition);
        assert_eq!(columns.len(), 2);
        assert!(columns.iter().all(|c| !c.sort.is_enabled()));
        assert_eq!(columns[1].label, HeaderLabel::Html("<i>B</i>".to_string()));
    }
}
