//! Outline tree
//!
//! Headings are collected in document order and nested by level into an arena
//! of [`TocEntry`] values. Entries refer to each other by [`EntryId`]; parents
//! are plain indices, so the tree never holds reference cycles. A rebuild
//! constructs a new tree and replaces the old one.

use crate::dom::Element;
use std::collections::{HashMap, HashSet};

/// Class carried by the rendered outline
pub const TOC_CLASS: &str = "toc";

/// A heading found in rendered content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub id: String,
    pub text: String,
    /// 1 to 6
    pub level: u8,
}

impl Heading {
    pub fn new(id: impl Into<String>, text: impl Into<String>, level: u8) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            level,
        }
    }
}

fn heading_level(tag: &str) -> Option<u8> {
    let digit = tag.strip_prefix('h')?;
    match digit.parse::<u8>() {
        Ok(level @ 1..=6) => Some(level),
        _ => None,
    }
}

/// Collect `h1`..`h6` elements carrying an id, in document order
///
/// Only the first heading with a given id is kept.
pub fn collect_headings<'a>(roots: impl IntoIterator<Item = &'a Element>) -> Vec<Heading> {
    let mut seen = HashSet::new();
    let mut headings = Vec::new();

    for root in roots {
        for element in root.descendants() {
            let Some(level) = heading_level(&element.tag) else {
                continue;
            };
            let Some(id) = element.id().filter(|id| !id.is_empty()) else {
                continue;
            };
            if !seen.insert(id.to_string()) {
                log::warn!("Duplicate heading id '{}' left out of the outline", id);
                continue;
            }
            headings.push(Heading::new(id, element.text_content().trim(), level));
        }
    }

    headings
}

/// Index of an entry within its [`TocTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub usize);

/// One outline node
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub heading_id: String,
    pub text: String,
    pub level: u8,
    pub parent: Option<EntryId>,
    pub children: Vec<EntryId>,
    pub expanded: bool,
}

/// The outline of a page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TocTree {
    entries: Vec<TocEntry>,
    roots: Vec<EntryId>,
    by_heading: HashMap<String, EntryId>,
    active: Option<EntryId>,
}

impl TocTree {
    /// Nest headings by level
    ///
    /// Ancestors whose level is at least the current heading's level are
    /// popped before the heading is attached to the new stack top, so skipped
    /// levels nest under the closest shallower heading.
    pub fn build(headings: &[Heading]) -> Self {
        let mut tree = TocTree::default();
        let mut stack: Vec<EntryId> = Vec::new();

        for heading in headings {
            while let Some(&top) = stack.last() {
                if tree.entries[top.0].level >= heading.level {
                    stack.pop();
                } else {
                    break;
                }
            }

            let id = EntryId(tree.entries.len());
            let parent = stack.last().copied();
            tree.by_heading.entry(heading.id.clone()).or_insert(id);
            tree.entries.push(TocEntry {
                heading_id: heading.id.clone(),
                text: heading.text.clone(),
                level: heading.level,
                parent,
                children: Vec::new(),
                expanded: false,
            });
            match parent {
                Some(parent) => tree.entries[parent.0].children.push(id),
                None => tree.roots.push(id),
            }
            stack.push(id);
        }

        tree
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn roots(&self) -> &[EntryId] {
        &self.roots
    }

    pub fn entry(&self, id: EntryId) -> Option<&TocEntry> {
        self.entries.get(id.0)
    }

    /// All entries in document order
    pub fn entries(&self) -> impl Iterator<Item = (EntryId, &TocEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (EntryId(index), entry))
    }

    /// The entry for a heading id
    pub fn lookup(&self, heading_id: &str) -> Option<EntryId> {
        self.by_heading.get(heading_id).copied()
    }

    pub fn active(&self) -> Option<EntryId> {
        self.active
    }

    /// Heading id of the active entry
    pub fn active_heading(&self) -> Option<&str> {
        self.active
            .and_then(|id| self.entry(id))
            .map(|entry| entry.heading_id.as_str())
    }

    pub fn is_expanded(&self, id: EntryId) -> bool {
        self.entry(id).is_some_and(|entry| entry.expanded)
    }

    /// Entries from the top-level ancestor down to `id`, inclusive
    pub fn path_to(&self, id: EntryId) -> Vec<EntryId> {
        let mut path = Vec::new();
        let mut current = self.entry(id).map(|_| id);
        while let Some(step) = current {
            path.push(step);
            current = self.entries[step.0].parent;
        }
        path.reverse();
        path
    }

    /// The top-level ancestor of `id`
    pub fn root_of(&self, id: EntryId) -> Option<EntryId> {
        self.path_to(id).first().copied()
    }

    /// Make `id` the active entry
    ///
    /// The path from its top-level ancestor down to it is expanded, and every
    /// entry in any other top-level branch is collapsed. Expansion state
    /// elsewhere in the active branch is left alone.
    pub fn activate(&mut self, id: EntryId) -> bool {
        let path = self.path_to(id);
        let Some(&branch) = path.first() else {
            return false;
        };

        for index in 0..self.entries.len() {
            let entry = EntryId(index);
            if self.root_of(entry) != Some(branch) {
                self.entries[index].expanded = false;
            }
        }
        for step in &path {
            self.entries[step.0].expanded = true;
        }

        if self.active != Some(id) {
            log::debug!("Active outline entry: {}", self.entries[id.0].heading_id);
        }
        self.active = Some(id);
        true
    }

    /// Flip an entry's expanded flag, returning the new state
    ///
    /// Entries on the active path stay expanded.
    pub fn toggle(&mut self, id: EntryId) -> Option<bool> {
        let on_active_path = self
            .active
            .is_some_and(|active| self.path_to(active).contains(&id));
        let entry = self.entries.get_mut(id.0)?;
        if !(on_active_path && entry.expanded) {
            entry.expanded = !entry.expanded;
        }
        Some(entry.expanded)
    }

    /// Carry user state from a previous tree into a rebuilt one
    ///
    /// Expanded flags survive for headings that still exist, and the previous
    /// active heading is activated again if present.
    pub fn carry_over(&mut self, previous: &TocTree) {
        let expanded: HashSet<&str> = previous
            .entries
            .iter()
            .filter(|entry| entry.expanded)
            .map(|entry| entry.heading_id.as_str())
            .collect();
        for entry in &mut self.entries {
            if expanded.contains(entry.heading_id.as_str()) {
                entry.expanded = true;
            }
        }

        if let Some(active) = previous.active_heading().and_then(|id| self.lookup(id)) {
            self.activate(active);
        }
    }

    /// Render the outline as a `<nav>` of nested lists
    pub fn to_element(&self) -> Element {
        let mut nav = Element::new("nav")
            .with_attr("class", TOC_CLASS)
            .with_attr("aria-label", "Contents");
        if !self.roots.is_empty() {
            nav.push(self.render_list(&self.roots, None));
        }
        nav
    }

    fn render_list(&self, ids: &[EntryId], list_id: Option<String>) -> Element {
        let mut list = Element::new("ul").with_attr("class", "toc-list");
        if let Some(list_id) = list_id {
            list.set_attr("id", list_id);
        }
        for &id in ids {
            list.push(self.render_entry(id));
        }
        list
    }

    fn render_entry(&self, id: EntryId) -> Element {
        let entry = &self.entries[id.0];
        let mut item = Element::new("li")
            .with_attr("class", "toc-entry")
            .with_attr("data-level", entry.level.to_string());

        let mut link = Element::new("a")
            .with_attr("href", format!("#{}", entry.heading_id))
            .with_text(entry.text.as_str());
        if self.active == Some(id) {
            link.set_attr("aria-current", "location");
        }

        if entry.children.is_empty() {
            item.push(link);
            return item;
        }

        let list_id = format!("toc-{}", entry.heading_id);
        item.add_class("has-children");
        item.push(
            Element::new("button")
                .with_attr("type", "button")
                .with_attr("class", "toc-toggle")
                .with_attr("aria-expanded", entry.expanded.to_string())
                .with_attr("aria-controls", list_id.as_str())
                .with_attr("aria-label", format!("Toggle {}", entry.text)),
        );
        item.push(link);
        let mut children = self.render_list(&entry.children, Some(list_id));
        if !entry.expanded {
            children.set_attr("hidden", "");
        }
        item.push(children);
        item
    }

    /// Plain-text outline, two spaces per depth
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for (id, entry) in self.entries() {
            let depth = self.path_to(id).len() - 1;
            let marker = if self.active == Some(id) { '*' } else { '-' };
            out.push_str(&format!(
                "{}{} {} [{}]\n",
                "  ".repeat(depth),
                marker,
                entry.text,
                entry.heading_id
            ));
        }
        out
    }

    /// Outline as an HTML string
    pub fn to_html(&self) -> String {
        self.to_element().to_html()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headings(spec: &[(&str, u8)]) -> Vec<Heading> {
        spec.iter()
            .map(|(id, level)| Heading::new(*id, id.to_uppercase(), *level))
            .collect()
    }

    fn ids(tree: &TocTree, ids: &[EntryId]) -> Vec<String> {
        ids.iter()
            .map(|id| tree.entry(*id).unwrap().heading_id.clone())
            .collect()
    }

    #[test]
    fn test_flat_headings_nest_by_level() {
        let tree = TocTree::build(&headings(&[("a", 2), ("a1", 3), ("a2", 3), ("b", 2)]));

        assert_eq!(ids(&tree, tree.roots()), vec!["a", "b"]);
        let a = tree.entry(tree.roots()[0]).unwrap();
        assert_eq!(ids(&tree, &a.children), vec!["a1", "a2"]);
        assert!(tree.entry(tree.roots()[1]).unwrap().children.is_empty());
    }

    #[test]
    fn test_lookup_maps_heading_ids_to_entries() {
        let tree = TocTree::build(&headings(&[("a", 2), ("a1", 3), ("a", 2)]));

        for (id, entry) in tree.entries().take(2) {
            assert_eq!(tree.lookup(&entry.heading_id), Some(id));
        }
        assert_eq!(tree.lookup("a"), Some(EntryId(0)));
        assert_eq!(tree.lookup("missing"), None);
        assert_eq!(TocTree::default().lookup("a"), None);
    }

    #[test]
    fn test_level_skip_attaches_to_nearest_shallower() {
        let tree = TocTree::build(&headings(&[("a", 2), ("deep", 4), ("mid", 3), ("top", 1)]));

        let a = tree.lookup("a").unwrap();
        let deep = tree.lookup("deep").unwrap();
        let mid = tree.lookup("mid").unwrap();
        assert_eq!(tree.entry(deep).unwrap().parent, Some(a));
        assert_eq!(tree.entry(mid).unwrap().parent, Some(a));
        assert_eq!(ids(&tree, tree.roots()), vec!["a", "top"]);
    }

    #[test]
    fn test_activation_is_branch_exclusive() {
        // Arrange
        let mut tree = TocTree::build(&headings(&[
            ("a", 2),
            ("a1", 3),
            ("a1x", 4),
            ("a2", 3),
            ("b", 2),
            ("b1", 3),
        ]));
        let a1x = tree.lookup("a1x").unwrap();
        let a2 = tree.lookup("a2").unwrap();
        let b1 = tree.lookup("b1").unwrap();
        tree.activate(a1x);
        tree.toggle(a2);
        assert!(tree.is_expanded(tree.lookup("a1").unwrap()));

        // Act
        tree.activate(b1);

        // Assert
        for id in ["a", "a1", "a1x", "a2"] {
            assert!(!tree.is_expanded(tree.lookup(id).unwrap()), "{} stayed open", id);
        }
        assert!(tree.is_expanded(tree.lookup("b").unwrap()));
        assert!(tree.is_expanded(b1));
        assert_eq!(tree.active_heading(), Some("b1"));
    }

    #[test]
    fn test_activation_keeps_same_branch_state() {
        let mut tree = TocTree::build(&headings(&[("a", 2), ("a1", 3), ("a1x", 4), ("a2", 3), ("a2x", 4)]));
        let a1 = tree.lookup("a1").unwrap();
        tree.toggle(a1);
        tree.activate(tree.lookup("a2x").unwrap());
        assert!(tree.is_expanded(a1));
    }

    #[test]
    fn test_toggle_cannot_collapse_active_path() {
        let mut tree = TocTree::build(&headings(&[("a", 2), ("a1", 3)]));
        let a = tree.lookup("a").unwrap();
        tree.activate(tree.lookup("a1").unwrap());
        assert_eq!(tree.toggle(a), Some(true));
        assert_eq!(tree.toggle(EntryId(99)), None);
    }

    #[test]
    fn test_carry_over_preserves_state() {
        let mut old = TocTree::build(&headings(&[("a", 2), ("a1", 3), ("b", 2), ("b1", 3)]));
        old.activate(old.lookup("b1").unwrap());

        let mut rebuilt = TocTree::build(&headings(&[("a", 2), ("a1", 3), ("b", 2), ("b1", 3), ("c", 2)]));
        rebuilt.carry_over(&old);

        assert_eq!(rebuilt.active_heading(), Some("b1"));
        assert!(rebuilt.is_expanded(rebuilt.lookup("b").unwrap()));
        assert!(!rebuilt.is_expanded(rebuilt.lookup("a").unwrap()));
    }

    #[test]
    fn test_collect_headings_skips_duplicates_and_indicators() {
        let root = Element::new("div")
            .with_child(
                Element::new("h2").with_attr("id", "x").with_child(
                    Element::new("button")
                        .with_child(
                            Element::new("span")
                                .with_attr("aria-hidden", "true")
                                .with_text("▸"),
                        )
                        .with_text("Moves"),
                ),
            )
            .with_child(Element::new("h3").with_attr("id", "x").with_text("Again"))
            .with_child(Element::new("h3").with_text("No id"))
            .with_child(Element::new("header").with_attr("id", "hdr"));

        let headings = collect_headings([&root]);

        assert_eq!(headings, vec![Heading::new("x", "Moves", 2)]);
    }

    #[test]
    fn test_rendered_outline() {
        let mut tree = TocTree::build(&headings(&[("a", 2), ("a1", 3), ("b", 2)]));
        tree.activate(tree.lookup("a1").unwrap());

        let html = tree.to_html();
        assert!(html.starts_with("<nav class=\"toc\" aria-label=\"Contents\">"));
        assert!(html.contains("<a href=\"#a1\" aria-current=\"location\">A1</a>"));
        assert!(html.contains("aria-expanded=\"true\" aria-controls=\"toc-a\""));
        assert_eq!(html.matches("aria-current").count(), 1);

        assert_eq!(tree.outline(), "- A [a]\n  * A1 [a1]\n- B [b]\n");
    }
}
