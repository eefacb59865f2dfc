//! Table rendering and in-place sorting
//!
//! Rendering resolves the table definition, normalizes its columns once, and
//! emits the header and body. Sort keys for every cell are computed at the
//! same time and kept in a [`TableModel`], so a header activation only has to
//! reorder the existing `<tr>` elements.

use super::column::{column_configs, ColumnConfig, HeaderLabel, SortDirection};
use super::definition::TableDefinitions;
use super::sort::{sort_key, sorted_order, SortKey, SortState};
use crate::dom::{Element, Node};
use crate::text_format::TextFormatter;
use serde_json::{Map, Value};

/// Attribute carrying a row's position in the source order
pub const ROW_INDEX_ATTR: &str = "data-row-index";

const INDICATOR_CLASS: &str = "sort-indicator";

/// Everything the renderer needs to know about one table region
#[derive(Debug, Clone, Copy)]
pub struct TableRegion<'a> {
    /// Id of the rendered `<table>`
    pub region_id: &'a str,
    /// Inline table settings (`type` plus overrides)
    pub inline: &'a Map<String, Value>,
    /// Structured rows
    pub rows: &'a [Value],
    /// Rows whose cells are raw markup
    pub rows_html: &'a [Value],
}

/// Sort bookkeeping for one rendered table
#[derive(Debug, Clone)]
pub struct TableModel {
    pub region_id: String,
    pub columns: Vec<ColumnConfig>,
    /// Keys indexed `[column][row]`
    keys: Vec<Vec<SortKey>>,
    state: SortState,
}

impl TableModel {
    /// Number of body rows
    pub fn row_count(&self) -> usize {
        self.keys.first().map_or(0, Vec::len)
    }

    /// The sort key of a cell
    pub fn key(&self, column: usize, row: usize) -> Option<&SortKey> {
        self.keys.get(column).and_then(|keys| keys.get(row))
    }

    /// Current sort state
    pub fn state(&self) -> SortState {
        self.state
    }

    /// Activate a column
    ///
    /// Returns the new direction and the row order, or `None` when the column
    /// does not exist or has sorting disabled.
    pub fn activate(&mut self, column: usize) -> Option<(SortDirection, Vec<usize>)> {
        let spec = self.columns.get(column)?.sort.spec()?;
        let direction = self.state.activate(column, spec.initial_order);
        let order = sorted_order(&self.keys[column], direction, spec.sorter);
        Some((direction, order))
    }
}

/// Normalize the rows of a region into cell lists
///
/// Malformed rows are skipped with a warning.
fn collect_rows(region: &TableRegion) -> Vec<Vec<Value>> {
    let mut rows = Vec::with_capacity(region.rows.len() + region.rows_html.len());

    for (index, row) in region.rows.iter().enumerate() {
        match row {
            Value::Array(cells) => rows.push(cells.clone()),
            Value::Object(object) => match object.get("cells") {
                Some(Value::Array(cells)) => rows.push(cells.clone()),
                _ => log::warn!(
                    "Skipping row {} of table '{}': object row without cells",
                    index,
                    region.region_id
                ),
            },
            _ => log::warn!(
                "Skipping row {} of table '{}': not a list of cells",
                index,
                region.region_id
            ),
        }
    }

    for (index, row) in region.rows_html.iter().enumerate() {
        let Value::Array(cells) = row else {
            log::warn!(
                "Skipping markup row {} of table '{}': not a list of cells",
                index,
                region.region_id
            );
            continue;
        };
        let cells = cells
            .iter()
            .map(|cell| match cell {
                Value::String(markup) => {
                    let mut object = Map::new();
                    object.insert("html".to_string(), Value::String(markup.clone()));
                    Value::Object(object)
                }
                other => other.clone(),
            })
            .collect();
        rows.push(cells);
    }

    rows
}

/// Render a table region
pub fn render_table(
    region: &TableRegion,
    definitions: &TableDefinitions,
    formatter: &TextFormatter,
    auto_format: bool,
) -> (Element, TableModel) {
    let definition = definitions.resolve_table(region.inline);
    let columns = column_configs(&definition);
    let auto_format = definition
        .get("autoFormat")
        .and_then(Value::as_bool)
        .unwrap_or(auto_format);
    let rows = collect_rows(region);

    let mut class = "refdoc-table".to_string();
    if let Some(extra) = definition.get_str("className") {
        class.push(' ');
        class.push_str(extra);
    }

    let mut table = Element::new("table")
        .with_attr("id", region.region_id)
        .with_attr("class", class)
        .with_attr("data-region", region.region_id);
    for (name, value) in definition.attributes() {
        if name != "id" && name != "class" {
            table.set_attr(name, value);
        }
    }

    if let Some(caption) = definition.get_str("caption") {
        table.push(Element::new("caption").with_text(caption));
    }

    table.push(render_header(&columns));

    let mut keys: Vec<Vec<SortKey>> = vec![Vec::with_capacity(rows.len()); columns.len()];
    let mut body = Element::new("tbody");
    for (row_index, cells) in rows.iter().enumerate() {
        let mut tr = Element::new("tr").with_attr(ROW_INDEX_ATTR, row_index.to_string());
        for (column_index, column) in columns.iter().enumerate() {
            let cell = cells.get(column.source_index);
            let key = match column.sort.spec() {
                Some(spec) => sort_key(cell, &spec),
                None => SortKey::Missing,
            };
            tr.push(render_cell(cell, column, &key, formatter, auto_format));
            keys[column_index].push(key);
        }
        body.push(tr);
    }
    table.push(body);

    let model = TableModel {
        region_id: region.region_id.to_string(),
        columns,
        keys,
        state: SortState::default(),
    };
    (table, model)
}

fn render_header(columns: &[ColumnConfig]) -> Element {
    let mut row = Element::new("tr");
    for (index, column) in columns.iter().enumerate() {
        let mut th = Element::new("th")
            .with_attr("scope", "col")
            .with_attr("data-column", index.to_string());

        let mut classes: Vec<&str> = Vec::new();
        if let Some(class_name) = &column.header.class_name {
            classes.push(class_name);
        }
        if column.sort.is_enabled() {
            classes.push("sortable");
        }
        if !classes.is_empty() {
            th.set_attr("class", classes.join(" "));
        }

        let mut style = String::new();
        if let Some(align) = &column.header.align {
            style.push_str(&format!("text-align: {};", align));
        }
        if let Some(extra) = &column.header.style {
            if !style.is_empty() {
                style.push(' ');
            }
            style.push_str(extra);
        }
        if !style.is_empty() {
            th.set_attr("style", style);
        }
        for (name, value) in &column.header.attributes {
            th.set_attr(name.clone(), value.clone());
        }

        match &column.label {
            HeaderLabel::Text(text) => th.push(Node::Text(text.clone())),
            HeaderLabel::Html(markup) => th.push(Node::Raw(markup.clone())),
        }

        if column.sort.is_enabled() {
            th.set_attr("tabindex", "0");
            th.set_attr("data-sortable", "true");
            th.push(
                Element::new("span")
                    .with_attr("class", INDICATOR_CLASS)
                    .with_attr("aria-hidden", "true"),
            );
        }

        row.push(th);
    }
    Element::new("thead").with_child(row)
}

fn render_cell(
    cell: Option<&Value>,
    column: &ColumnConfig,
    key: &SortKey,
    formatter: &TextFormatter,
    auto_format: bool,
) -> Element {
    let mut td = Element::new("td");

    let mut classes: Vec<String> = Vec::new();
    if let Some(class_name) = &column.class_name {
        classes.push(class_name.clone());
    }
    if !column.wrap {
        classes.push("nowrap".to_string());
    }
    if let Some(Value::Object(object)) = cell {
        if let Some(class_name) = object.get("className").and_then(Value::as_str) {
            classes.push(class_name.to_string());
        }
        if let Some(title) = object.get("title").and_then(Value::as_str) {
            td.set_attr("title", title);
        }
    }
    if !classes.is_empty() {
        td.set_attr("class", classes.join(" "));
    }
    if let Some(color) = &column.color {
        td.set_attr("style", format!("color: {};", color));
    }
    if let Some(value) = key.attribute_value() {
        td.set_attr("data-sort-value", value);
    }

    if let Some(before) = &column.before {
        td.push(Node::Text(before.clone()));
    }
    if let Some(cell) = cell {
        td.children
            .extend(render_cell_value(cell, formatter, auto_format));
    }
    if let Some(after) = &column.after {
        td.push(Node::Text(after.clone()));
    }
    td
}

/// Render the content of a cell value
pub fn render_cell_value(value: &Value, formatter: &TextFormatter, auto_format: bool) -> Vec<Node> {
    match value {
        Value::Null => Vec::new(),
        Value::Bool(b) => vec![Node::Text(b.to_string())],
        Value::Number(n) => vec![Node::Text(n.to_string())],
        Value::String(text) => vec![Node::Raw(formatter.format(text, auto_format))],
        Value::Array(items) => {
            let mut list = Element::new("ul").with_attr("class", "cell-list");
            for item in items {
                let mut li = Element::new("li");
                li.children
                    .extend(render_cell_value(item, formatter, auto_format));
                list.push(li);
            }
            vec![Node::Element(list)]
        }
        Value::Object(object) => {
            if let Some(markup) = object.get("html").and_then(Value::as_str) {
                vec![Node::Raw(markup.to_string())]
            } else if let Some(inner) = object.get("text").or_else(|| object.get("value")) {
                let auto_format = object
                    .get("autoFormat")
                    .and_then(Value::as_bool)
                    .unwrap_or(auto_format);
                render_cell_value(inner, formatter, auto_format)
            } else if let Some(items) = object.get("items") {
                render_cell_value(items, formatter, auto_format)
            } else {
                Vec::new()
            }
        }
    }
}

/// Reflect a sort on a rendered table
///
/// Body rows are reordered by their original index, the activated header gets
/// the direction indicator and `aria-sort`, and every other header loses both.
pub fn apply_sort(table: &mut Element, column: usize, direction: SortDirection, order: &[usize]) {
    if let Some(thead) = table.find_mut(&|e| e.tag == "thead") {
        for th in thead
            .child_elements_mut()
            .flat_map(|tr| tr.child_elements_mut())
        {
            let is_active = th.attr("data-column") == Some(column.to_string().as_str());
            set_header_state(th, is_active.then_some(direction));
        }
    }

    if let Some(tbody) = table.find_mut(&|e| e.tag == "tbody") {
        let mut positions = vec![usize::MAX; order.iter().max().map_or(0, |max| max + 1)];
        for (position, &row) in order.iter().enumerate() {
            positions[row] = position;
        }

        let mut rows = std::mem::take(&mut tbody.children);
        rows.sort_by_cached_key(|node| match node {
            Node::Element(tr) => tr
                .attr(ROW_INDEX_ATTR)
                .and_then(|value| value.parse::<usize>().ok())
                .and_then(|index| positions.get(index).copied())
                .unwrap_or(usize::MAX),
            _ => usize::MAX,
        });
        tbody.children = rows;
    }
}

fn set_header_state(th: &mut Element, direction: Option<SortDirection>) {
    th.remove_class("sorted-asc");
    th.remove_class("sorted-desc");
    let indicator = th.find_mut(&|e| e.has_class(INDICATOR_CLASS));

    match direction {
        Some(direction) => {
            if let Some(indicator) = indicator {
                let arrow = match direction {
                    SortDirection::Ascending => "▲",
                    SortDirection::Descending => "▼",
                };
                indicator.children = vec![Node::Text(arrow.to_string())];
            }
            th.add_class(match direction {
                SortDirection::Ascending => "sorted-asc",
                SortDirection::Descending => "sorted-desc",
            });
            th.set_attr("aria-sort", direction.aria());
        }
        None => {
            if let Some(indicator) = indicator {
                indicator.children.clear();
            }
            th.remove_attr("aria-sort");
        }
    }
}

/// Row indices of a rendered table body, top to bottom
pub fn row_order(table: &Element) -> Vec<usize> {
    table
        .find(&|e| e.tag == "tbody")
        .map(|tbody| {
            tbody
                .child_elements()
                .filter_map(|tr| tr.attr(ROW_INDEX_ATTR)?.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}
