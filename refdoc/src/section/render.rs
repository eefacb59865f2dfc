//! Section rendering
//!
//! Each section becomes a `<section>` holding a heading with a collapse
//! toggle and a content region. Collapsing only flips attributes; content is
//! rendered once and never unmounted.

use super::spec::{Content, SectionSpec, TableSpec};
use crate::dom::{Element, Node};
use crate::ids::IdAllocator;
use crate::loader::Resources;
use crate::signal::{Bus, Notification};
use crate::table::{render_table, TableDefinitions, TableModel, TableRegion};
use crate::text_format::TextFormatter;

/// Suffix of a section's content region id
pub const CONTENT_SUFFIX: &str = "-content";

/// Class carried by every rendered section
pub const SECTION_CLASS: &str = "refdoc-section";

const INDICATOR_CLASS: &str = "collapse-indicator";
const TOGGLE_CLASS: &str = "section-toggle";
const COLLAPSED_INDICATOR: &str = "▸";
const EXPANDED_INDICATOR: &str = "▾";

/// Renders section specs for one rendering root
pub struct SectionRenderer<'a> {
    root_id: &'a str,
    formatter: &'a TextFormatter,
    definitions: &'a TableDefinitions,
    resources: &'a Resources,
    ids: &'a mut IdAllocator,
    bus: &'a Bus,
    tables: Vec<TableModel>,
}

impl<'a> SectionRenderer<'a> {
    pub fn new(
        root_id: &'a str,
        formatter: &'a TextFormatter,
        definitions: &'a TableDefinitions,
        resources: &'a Resources,
        ids: &'a mut IdAllocator,
        bus: &'a Bus,
    ) -> Self {
        Self {
            root_id,
            formatter,
            definitions,
            resources,
            ids,
            bus,
            tables: Vec::new(),
        }
    }

    /// Render top-level sections
    ///
    /// Returns the section elements and the sort models of every table
    /// rendered along the way.
    pub fn render(
        mut self,
        sections: &[SectionSpec],
        auto_format: bool,
    ) -> (Vec<Element>, Vec<TableModel>) {
        let elements = sections
            .iter()
            .map(|spec| self.render_section(spec, 0, auto_format))
            .collect();
        (elements, self.tables)
    }

    fn render_section(&mut self, spec: &SectionSpec, depth: usize, inherited: bool) -> Element {
        let auto_format = spec.auto_format.unwrap_or(inherited);
        let id = self.ids.allocate(spec.id.as_deref(), &spec.title);
        let content_id = self.ids.derive(&format!("{}{}", id, CONTENT_SUFFIX));
        let expanded = !spec.start_collapsed;
        let level = (depth + 2).min(6);

        let toggle = Element::new("button")
            .with_attr("type", "button")
            .with_attr("class", TOGGLE_CLASS)
            .with_attr("aria-expanded", expanded.to_string())
            .with_attr("aria-controls", content_id.as_str())
            .with_child(
                Element::new("span")
                    .with_attr("class", INDICATOR_CLASS)
                    .with_attr("aria-hidden", "true")
                    .with_text(indicator(expanded)),
            )
            .with_text(spec.title.as_str());
        let heading = Element::new(format!("h{}", level))
            .with_attr("id", id.as_str())
            .with_attr("class", "section-heading")
            .with_child(toggle);

        let mut region = Element::new("div")
            .with_attr("id", content_id.as_str())
            .with_attr("class", "section-content")
            .with_attr("role", "region")
            .with_attr("aria-labelledby", id.as_str());
        if !expanded {
            region.set_attr("hidden", "");
        }

        for description in &spec.descriptions {
            region.push(
                Element::new("p")
                    .with_attr("class", "section-description")
                    .with_raw(self.formatter.format(description, auto_format)),
            );
        }

        match &spec.content {
            Content::Empty => {}
            Content::Html(markup) => region.push(
                Element::new("div")
                    .with_attr("class", "section-html")
                    .with_raw(markup.as_str()),
            ),
            Content::Fetch { src } => region.push(self.render_fragment(src)),
            Content::Group(children) => {
                let mut group = Element::new("div").with_attr("class", "section-group");
                for child in children {
                    group.push(self.render_section(child, depth + 1, auto_format));
                }
                region.push(group);
            }
            Content::Table(table) => region.push(self.render_table_region(&id, table, auto_format)),
        }

        Element::new("section")
            .with_attr("class", SECTION_CLASS)
            .with_attr("data-section", id.as_str())
            .with_attr("data-depth", depth.to_string())
            .with_child(heading)
            .with_child(region)
    }

    fn render_fragment(&self, src: &str) -> Element {
        match self.resources.fragment(src) {
            Some(Ok(markup)) => Element::new("div")
                .with_attr("class", "section-fragment")
                .with_attr("data-src", src)
                .with_raw(markup),
            _ => error_message(&format!("Unable to load {}", src)),
        }
    }

    fn render_table_region(&mut self, section_id: &str, spec: &TableSpec, auto_format: bool) -> Element {
        let region_id = self.ids.derive(&format!("{}-table", section_id));

        let mut rows = spec.rows.clone();
        if let Some(csv) = &spec.csv {
            match self.resources.csv_rows(csv) {
                Some(Ok(extra)) => rows.extend(extra.iter().cloned()),
                Some(Err(message)) => log::warn!("Table '{}' skips CSV rows: {}", region_id, message),
                None => log::warn!("Table '{}' skips CSV rows: '{}' was not loaded", region_id, csv),
            }
        }

        let region = TableRegion {
            region_id: &region_id,
            inline: &spec.table,
            rows: &rows,
            rows_html: &spec.rows_html,
        };
        let (table, model) = render_table(&region, self.definitions, self.formatter, auto_format);
        self.tables.push(model);

        self.bus.publish(Notification::TableRendered {
            root_id: self.root_id.to_string(),
            region_id: region_id.clone(),
        });

        Element::new("div")
            .with_attr("class", "table-region")
            .with_child(table)
    }
}

fn indicator(expanded: bool) -> &'static str {
    if expanded {
        EXPANDED_INDICATOR
    } else {
        COLLAPSED_INDICATOR
    }
}

/// A static, user-visible error message
pub fn error_message(message: &str) -> Element {
    Element::new("p")
        .with_attr("class", "refdoc-error")
        .with_attr("role", "alert")
        .with_text(message)
}

/// Whether the section headed by `heading_id` is expanded
pub fn is_section_expanded(root: &Element, heading_id: &str) -> Option<bool> {
    let heading = root.find_by_id(heading_id)?;
    let toggle = heading.find(&|e| e.has_class(TOGGLE_CLASS))?;
    Some(toggle.attr("aria-expanded") == Some("true"))
}

/// Id of the content region controlled by the section heading `heading_id`
pub fn content_region_id(root: &Element, heading_id: &str) -> Option<String> {
    root.find_by_id(heading_id)?
        .find(&|e| e.has_class(TOGGLE_CLASS))?
        .attr("aria-controls")
        .map(str::to_string)
}

/// Expand or collapse the section headed by `heading_id`
///
/// Returns `false` when `root` has no such section.
pub fn set_section_expanded(root: &mut Element, heading_id: &str, expanded: bool) -> bool {
    let Some(content_id) = content_region_id(root, heading_id) else {
        return false;
    };
    let Some(heading) = root.find_by_id_mut(heading_id) else {
        return false;
    };
    let Some(toggle) = heading.find_mut(&|e| e.has_class(TOGGLE_CLASS)) else {
        return false;
    };
    toggle.set_attr("aria-expanded", expanded.to_string());
    if let Some(marker) = toggle.find_mut(&|e| e.has_class(INDICATOR_CLASS)) {
        marker.children = vec![Node::Text(indicator(expanded).to_string())];
    }

    let Some(region) = root.find_by_id_mut(&content_id) else {
        return false;
    };
    if expanded {
        region.remove_attr("hidden");
    } else {
        region.set_attr("hidden", "");
    }
    true
}

/// Flip a section, returning its new state
pub fn toggle_section(root: &mut Element, heading_id: &str) -> Option<bool> {
    let expanded = !is_section_expanded(root, heading_id)?;
    set_section_expanded(root, heading_id, expanded).then_some(expanded)
}

/// Heading ids of the sections enclosing `id`, outermost first
pub fn enclosing_sections(root: &Element, id: &str) -> Vec<String> {
    root.ancestors_of(id)
        .unwrap_or_default()
        .into_iter()
        .filter(|element| element.has_class(SECTION_CLASS))
        .filter_map(|section| section.attr("data-section").map(str::to_string))
        .filter(|section_id| section_id != id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::parse_document;
    use crate::text_format::FormattingRule;

    fn render(json: &str, formatter: &TextFormatter) -> (Element, Vec<TableModel>, Vec<Notification>) {
        let specs = parse_document(json).unwrap();
        let bus = Bus::new();
        let inbox = bus.subscribe();
        let resources = Resources::default();
        let definitions = TableDefinitions::empty();
        let mut ids = IdAllocator::new();
        let renderer =
            SectionRenderer::new("main", formatter, &definitions, &resources, &mut ids, &bus);
        let (sections, tables) = renderer.render(&specs, true);
        let mut root = Element::new("div").with_attr("id", "main");
        for section in sections {
            root.push(section);
        }
        (root, tables, inbox.try_iter().collect())
    }

    #[test]
    fn test_heading_and_region_wiring() {
        let (root, _, _) = render(r#"[{ "title": "Basics", "descriptions": ["a < b"] }]"#, &TextFormatter::empty());

        let heading = root.find_by_id("basics").unwrap();
        assert_eq!(heading.tag, "h2");
        assert_eq!(heading.text_content(), "Basics");

        let html = root.to_html();
        assert!(html.contains("aria-expanded=\"false\" aria-controls=\"basics-content\""));
        assert!(html.contains("<div id=\"basics-content\" class=\"section-content\" role=\"region\" aria-labelledby=\"basics\" hidden>"));
        assert!(html.contains("<p class=\"section-description\">a &lt; b</p>"));
        assert_eq!(is_section_expanded(&root, "basics"), Some(false));
    }

    #[test]
    fn test_start_collapsed_override() {
        let (root, _, _) = render(r#"[{ "title": "Open", "startCollapsed": false }]"#, &TextFormatter::empty());
        assert_eq!(is_section_expanded(&root, "open"), Some(true));
        assert!(!root.find_by_id("open-content").unwrap().has_attr("hidden"));
    }

    #[test]
    fn test_toggle_flips_attributes_only() {
        let (mut root, _, _) = render(
            r#"[{ "title": "A", "content": { "mode": "html", "html": "<p>kept</p>" } }]"#,
            &TextFormatter::empty(),
        );
        assert_eq!(toggle_section(&mut root, "a"), Some(true));
        assert!(root.to_html().contains("<p>kept</p>"));
        assert!(root.to_html().contains("▾"));
        assert_eq!(toggle_section(&mut root, "a"), Some(false));
        assert!(root.to_html().contains("<p>kept</p>"));
        assert!(root.find_by_id("a-content").unwrap().has_attr("hidden"));
        assert_eq!(toggle_section(&mut root, "missing"), None);
    }

    #[test]
    fn test_group_nesting_levels_and_auto_format_inheritance() {
        // Arrange: group disables auto-format; one grandchild re-enables it
        let formatter = TextFormatter::from_rules(&[FormattingRule {
            tokens: vec!["Heat".to_string()],
            tag: Some("b".to_string()),
            ..Default::default()
        }]);
        let json = r#"[{
            "title": "Parent",
            "autoFormat": false,
            "content": { "mode": "group", "sections": [
                { "title": "Child", "descriptions": ["Heat"], "content": { "mode": "group", "sections": [
                    { "title": "Grandchild", "descriptions": ["Heat"], "autoFormat": true }
                ] } }
            ] }
        }]"#;

        // Act
        let (root, _, _) = render(json, &formatter);

        // Assert
        assert_eq!(root.find_by_id("child").unwrap().tag, "h3");
        assert_eq!(root.find_by_id("grandchild").unwrap().tag, "h4");
        let child_region = root.find_by_id("child-content").unwrap();
        let child_description = child_region.child_elements().next().unwrap();
        assert_eq!(child_description.to_html(), "<p class=\"section-description\">Heat</p>");
        let grandchild = root.find_by_id("grandchild-content").unwrap();
        assert!(grandchild.to_html().contains("<b>Heat</b>"));
        assert_eq!(enclosing_sections(&root, "grandchild"), vec!["parent", "child"]);
    }

    #[test]
    fn test_table_region_publishes_notification() {
        let (root, tables, notifications) = render(
            r#"[{ "title": "Combos", "rows": [["Combo X", 100, 30, "note"]] }]"#,
            &TextFormatter::empty(),
        );
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].region_id, "combos-table");
        assert!(root.find_by_id("combos-table").is_some());
        assert_eq!(
            notifications,
            vec![Notification::TableRendered {
                root_id: "main".to_string(),
                region_id: "combos-table".to_string()
            }]
        );
    }

    fn id_count(root: &Element, id: &str) -> usize {
        root.to_html().matches(&format!(" id=\"{}\"", id)).count()
    }

    #[test]
    fn test_region_ids_never_shadow_headings() {
        // Arrange: the first heading's slug is the second heading's region id
        let (mut root, _, _) = render(r#"[{ "title": "Moves Content" }, { "title": "Moves" }]"#, &TextFormatter::empty());
        assert_eq!(id_count(&root, "moves-content"), 1);
        assert_eq!(content_region_id(&root, "moves").as_deref(), Some("moves-content-2"));

        // Act
        let expanded = toggle_section(&mut root, "moves");

        // Assert
        assert_eq!(expanded, Some(true));
        assert!(!root.find_by_id("moves-content-2").unwrap().has_attr("hidden"));
        assert_eq!(is_section_expanded(&root, "moves-content"), Some(false));
        assert!(root.find_by_id("moves-content-content").unwrap().has_attr("hidden"));
    }

    #[test]
    fn test_author_ids_with_region_suffixes_stay_unique() {
        let json = r#"[
            { "title": "Combos", "rows": [["Combo X", 100, 30, "note"]] },
            { "title": "Notes", "id": "combos-table" },
            { "title": "Extra", "id": "combos-content" }
        ]"#;
        let (mut root, tables, _) = render(json, &TextFormatter::empty());

        assert_eq!(tables[0].region_id, "combos-table");
        for id in ["combos", "combos-content", "combos-table", "notes", "extra"] {
            assert!(id_count(&root, id) <= 1, "{} is not unique", id);
        }
        assert_eq!(root.find_by_id("combos-table-2").unwrap().tag, "h2");
        assert_eq!(root.find_by_id("combos-content-2").unwrap().tag, "h2");

        assert_eq!(toggle_section(&mut root, "combos-content-2"), Some(true));
        let region = content_region_id(&root, "combos-content-2").unwrap();
        assert!(!root.find_by_id(&region).unwrap().has_attr("hidden"));
        assert!(root.find_by_id("combos-content").unwrap().has_attr("hidden"));
    }

    #[test]
    fn test_missing_fragment_renders_error() {
        let (root, _, _) = render(
            r#"[{ "title": "F", "content": { "mode": "fetch", "src": "gone.html" } }]"#,
            &TextFormatter::empty(),
        );
        assert!(root
            .to_html()
            .contains("<p class=\"refdoc-error\" role=\"alert\">Unable to load gone.html</p>"));
    }
}
