//! The page: rendering roots, their styles and their ids
//!
//! Style injection and id allocation are page-scoped. Styles are registered
//! by name with "ensure present" semantics, so rendering several roots never
//! duplicates a stylesheet, and ids are unique across every root on the page.

use crate::dom::Element;
use crate::ids::IdAllocator;
use crate::loader::{LoadedRoot, Resources};
use crate::section::{error_message, SectionRenderer, SectionSpec};
use crate::signal::{Bus, Notification};
use crate::table::{TableDefinitions, TableModel};
use crate::text_format::{escape_html, TextFormatter};
use crate::toc::{collect_headings, Heading, TocTree};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

/// Errors that can occur while working with a page
#[derive(Error, Debug)]
pub enum PageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("No rendering root with id '{0}'")]
    UnknownRoot(String),
}

/// Named stylesheets, each present at most once
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: Vec<(String, String)>,
}

impl StyleRegistry {
    /// Register `css` under `name` unless a sheet with that name exists.
    /// Returns `true` when the sheet was added.
    pub fn ensure(&mut self, name: &str, css: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.styles.push((name.to_string(), css.to_string()));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.iter().any(|(existing, _)| existing == name)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    fn write(&self, output: &mut String) {
        for (name, css) in &self.styles {
            output.push_str(&format!("<style data-style=\"{}\">\n", escape_html(name)));
            output.push_str(css);
            output.push_str("</style>\n");
        }
    }
}

/// A rendered root and what it needs to render more content
#[derive(Debug)]
pub struct RenderedRoot {
    pub id: String,
    pub element: Element,
    pub tables: Vec<TableModel>,
    pub auto_format: bool,
    formatter: TextFormatter,
    definitions: TableDefinitions,
    resources: Resources,
}

/// A page holding any number of independent rendering roots
#[derive(Debug)]
pub struct Page {
    pub title: String,
    roots: Vec<RenderedRoot>,
    styles: StyleRegistry,
    ids: IdAllocator,
    bus: Rc<Bus>,
}

impl Page {
    pub fn new(title: impl Into<String>) -> Self {
        let mut styles = StyleRegistry::default();
        styles.ensure("base", BASE_CSS);
        Self {
            title: title.into(),
            roots: Vec::new(),
            styles,
            ids: IdAllocator::new(),
            bus: Rc::new(Bus::new()),
        }
    }

    /// The page's notification bus
    pub fn bus(&self) -> Rc<Bus> {
        Rc::clone(&self.bus)
    }

    /// Register a stylesheet once
    pub fn ensure_style(&mut self, name: &str, css: &str) -> bool {
        self.styles.ensure(name, css)
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn roots(&self) -> &[RenderedRoot] {
        &self.roots
    }

    pub fn root(&self, id: &str) -> Option<&RenderedRoot> {
        self.roots.iter().find(|root| root.id == id)
    }

    pub(crate) fn roots_mut(&mut self) -> &mut [RenderedRoot] {
        &mut self.roots
    }

    /// Render a loaded root and add it to the page
    ///
    /// A root whose section spec could not be loaded shows a static error
    /// message instead of content.
    pub fn add_root(&mut self, loaded: LoadedRoot, auto_format: bool) -> &RenderedRoot {
        let LoadedRoot {
            source,
            sections,
            formatter,
            definitions,
            resources,
        } = loaded;

        let id = self.ids.allocate(Some(source.id.as_str()), &source.id);
        if id != source.id {
            log::warn!("Root id '{}' is already used on this page; renamed to '{}'", source.id, id);
        }
        self.ensure_style("sections", SECTION_CSS);

        let mut element = Element::new("div")
            .with_attr("id", id.as_str())
            .with_attr("class", "refdoc-root")
            .with_attr("data-root", id.as_str());
        let mut tables = Vec::new();

        match sections {
            Ok(specs) => {
                log::info!("Rendering {} sections into '{}'", specs.len(), id);
                let renderer = SectionRenderer::new(
                    &id,
                    &formatter,
                    &definitions,
                    &resources,
                    &mut self.ids,
                    &self.bus,
                );
                let (children, models) = renderer.render(&specs, auto_format);
                for child in children {
                    element.push(child);
                }
                tables = models;
            }
            Err(e) => {
                log::warn!("{}", e);
                element.push(error_message(&format!("Unable to load sections: {}", e)));
            }
        }

        if !tables.is_empty() {
            self.ensure_style("tables", TABLE_CSS);
        }

        self.roots.push(RenderedRoot {
            id,
            element,
            tables,
            auto_format,
            formatter,
            definitions,
            resources,
        });
        &self.roots[self.roots.len() - 1]
    }

    /// Render more sections at the end of an existing root
    ///
    /// Publishes [`Notification::ContentChanged`] for the root.
    pub fn append_sections(&mut self, root_id: &str, specs: &[SectionSpec]) -> Result<usize, PageError> {
        let root = self
            .roots
            .iter_mut()
            .find(|root| root.id == root_id)
            .ok_or_else(|| PageError::UnknownRoot(root_id.to_string()))?;

        let renderer = SectionRenderer::new(
            &root.id,
            &root.formatter,
            &root.definitions,
            &root.resources,
            &mut self.ids,
            &self.bus,
        );
        let (children, models) = renderer.render(specs, root.auto_format);
        let added = children.len();
        for child in children {
            root.element.push(child);
        }
        let has_tables = !models.is_empty();
        root.tables.extend(models);

        if has_tables {
            self.styles.ensure("tables", TABLE_CSS);
        }
        self.bus.publish(Notification::ContentChanged {
            root_id: root_id.to_string(),
        });
        Ok(added)
    }

    /// A rendered table and its sort model, by region id
    pub fn table_mut(&mut self, region_id: &str) -> Option<(&mut Element, &mut TableModel)> {
        self.roots.iter_mut().find_map(|root| {
            let model = root
                .tables
                .iter_mut()
                .find(|model| model.region_id == region_id)?;
            let table = root.element.find_by_id_mut(region_id)?;
            Some((table, model))
        })
    }

    /// Headings of every root, in page order
    pub fn headings(&self) -> Vec<Heading> {
        collect_headings(self.roots.iter().map(|root| &root.element))
    }

    /// Serialize the page with its outline
    pub fn to_html(&self, toc: &TocTree) -> String {
        let mut output = String::new();

        write_html_header(&mut output, &self.title, &self.styles, !toc.is_empty());

        output.push_str("<body>\n");
        output.push_str("<div class=\"container\">\n");
        if !self.title.is_empty() {
            output.push_str(&format!(
                "<h1 class=\"document-title\">{}</h1>\n",
                escape_html(&self.title)
            ));
        }

        output.push_str("<div class=\"refdoc-layout\">\n");
        if !toc.is_empty() {
            output.push_str(&toc.to_html());
            output.push('\n');
        }
        output.push_str("<main>\n");
        for root in &self.roots {
            output.push_str(&root.element.to_html());
            output.push('\n');
        }
        output.push_str("</main>\n");
        output.push_str("</div>\n");

        output.push_str("</div>\n");
        output.push_str("</body>\n");
        output.push_str("</html>\n");
        output
    }

    /// Write the page to a file, creating parent directories
    pub fn write(&self, toc: &TocTree, output_path: &Path) -> Result<(), PageError> {
        let output = self.to_html(toc);

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(output_path)?;
        file.write_all(output.as_bytes())?;

        Ok(())
    }
}

/// Write HTML header with the registered stylesheets
fn write_html_header(output: &mut String, title: &str, styles: &StyleRegistry, with_toc: bool) {
    output.push_str("<!DOCTYPE html>\n");
    output.push_str("<html lang=\"en\">\n");
    output.push_str("<head>\n");
    output.push_str("<meta charset=\"UTF-8\">\n");
    output.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    output.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    styles.write(output);
    if with_toc && !styles.contains("toc") {
        output.push_str("<style data-style=\"toc\">\n");
        output.push_str(TOC_CSS);
        output.push_str("</style>\n");
    }
    output.push_str("</head>\n");
}

const BASE_CSS: &str = r#"
* {
    box-sizing: border-box;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', sans-serif;
    line-height: 1.6;
    color: #333;
    background-color: #f5f5f5;
    margin: 0;
    padding: 20px;
}

.container {
    max-width: 1200px;
    margin: 0 auto;
    background: white;
    padding: 40px;
    box-shadow: 0 2px 4px rgba(0, 0, 0, 0.1);
    border-radius: 4px;
}

.document-title {
    font-size: 2.2em;
    color: #1a1a1a;
    border-bottom: 3px solid #0066cc;
    padding-bottom: 10px;
}

.refdoc-layout {
    display: flex;
    gap: 32px;
    align-items: flex-start;
}

.refdoc-layout main {
    flex: 1;
    min-width: 0;
}

.refdoc-error {
    color: #b00020;
    font-weight: 600;
}

[hidden] {
    display: none !important;
}
"#;

const SECTION_CSS: &str = r#"
.section-heading {
    margin: 24px 0 8px;
    border-bottom: 2px solid #e0e0e0;
}

.section-toggle {
    font: inherit;
    color: inherit;
    background: none;
    border: none;
    padding: 0;
    cursor: pointer;
    text-align: left;
}

.collapse-indicator {
    display: inline-block;
    width: 1.2em;
}

.section-content {
    padding-left: 1.2em;
}
"#;

const TABLE_CSS: &str = r#"
.refdoc-table {
    width: 100%;
    border-collapse: collapse;
    margin-bottom: 20px;
    font-size: 0.95em;
}

.refdoc-table th {
    padding: 10px;
    text-align: left;
    background-color: #f6f8fa;
    border-bottom: 2px solid #d0d7de;
}

.refdoc-table th.sortable {
    cursor: pointer;
    user-select: none;
}

.refdoc-table td {
    padding: 8px 10px;
    border-bottom: 1px solid #d0d7de;
}

.refdoc-table .nowrap {
    white-space: nowrap;
}

.cell-list {
    margin: 0;
    padding-left: 1.2em;
}
"#;

const TOC_CSS: &str = r#"
.toc {
    position: sticky;
    top: 20px;
    min-width: 220px;
    max-height: calc(100vh - 40px);
    overflow-y: auto;
    font-size: 0.9em;
}

.toc-list {
    list-style: none;
    margin: 0;
    padding-left: 1em;
}

.toc a[aria-current="location"] {
    font-weight: 700;
    color: #0066cc;
}

.toc-toggle {
    background: none;
    border: none;
    cursor: pointer;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadError, RootSource};
    use crate::section::parse_document;
    use std::path::PathBuf;

    fn loaded(id: &str, json: &str) -> LoadedRoot {
        LoadedRoot {
            source: RootSource::new(id, format!("{}.json", id)),
            sections: Ok(parse_document(json).unwrap()),
            formatter: TextFormatter::empty(),
            definitions: TableDefinitions::empty(),
            resources: Resources::default(),
        }
    }

    #[test]
    fn test_ensure_style_is_idempotent() {
        let mut page = Page::new("T");
        assert!(!page.ensure_style("base", "ignored"));
        assert!(page.ensure_style("extra", "p {}"));
        assert!(!page.ensure_style("extra", "p {}"));
        assert_eq!(page.styles().len(), 2);
    }

    #[test]
    fn test_ids_are_unique_across_roots() {
        let mut page = Page::new("T");
        page.add_root(loaded("one", r#"[{ "title": "Intro" }]"#), true);
        page.add_root(loaded("two", r#"[{ "title": "Intro" }]"#), true);

        let ids: Vec<String> = page.headings().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["intro", "intro-2"]);
        assert_eq!(page.styles().len(), 2);
    }

    #[test]
    fn test_failed_root_shows_error() {
        let mut page = Page::new("T");
        let root = LoadedRoot {
            sections: Err(LoadError::IoError(
                PathBuf::from("x.json"),
                std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            )),
            ..loaded("main", "[]")
        };

        let rendered = page.add_root(root, true);

        let html = rendered.element.to_html();
        assert!(html.contains("<p class=\"refdoc-error\" role=\"alert\">Unable to load sections: IO error reading x.json: missing</p>"));
    }

    #[test]
    fn test_append_publishes_content_changed() {
        let mut page = Page::new("T");
        let inbox = page.bus().subscribe();
        page.add_root(loaded("main", r#"[{ "title": "A" }]"#), true);

        let added = page
            .append_sections("main", &parse_document(r#"[{ "title": "B" }]"#).unwrap())
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(page.headings().len(), 2);
        assert_eq!(
            inbox.try_iter().last(),
            Some(Notification::ContentChanged { root_id: "main".to_string() })
        );
        assert!(matches!(
            page.append_sections("nope", &[]),
            Err(PageError::UnknownRoot(_))
        ));
    }

    #[test]
    fn test_page_html_layout() {
        let mut page = Page::new("Frame <Data>");
        page.add_root(loaded("main", r#"[{ "title": "Moves", "rows": [["A", 1, 2, "n"]] }]"#), true);
        let toc = TocTree::build(&page.headings());

        let html = page.to_html(&toc);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Frame &lt;Data&gt;</title>"));
        assert!(html.contains("<style data-style=\"tables\">"));
        assert!(html.contains("<nav class=\"toc\""));
        assert!(html.contains("<div id=\"main\" class=\"refdoc-root\" data-root=\"main\">"));
        assert!(page.table_mut("moves-table").is_some());
    }
}
