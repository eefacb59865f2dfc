//! Scroll-spy: picking the outline entry for a scroll position

use super::tree::{EntryId, TocTree};
use std::collections::HashMap;

/// Pixels of lookahead below the scroll offset
pub const SCROLL_SPY_THRESHOLD: f64 = 80.0;

/// Document-relative heading positions, as measured by the host
pub trait Layout {
    /// Top of the heading carrying `id`, or `None` when it is not laid out
    fn heading_top(&self, id: &str) -> Option<f64>;
}

impl Layout for HashMap<String, f64> {
    fn heading_top(&self, id: &str) -> Option<f64> {
        self.get(id).copied()
    }
}

/// A page that has not been laid out; no heading has a position
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLayout;

impl Layout for NoLayout {
    fn heading_top(&self, _id: &str) -> Option<f64> {
        None
    }
}

/// The entry whose heading is the last one at or above `scroll_offset + threshold`
///
/// Falls back to the first entry when no heading qualifies; `None` only for
/// an empty tree.
pub fn entry_at(tree: &TocTree, layout: &dyn Layout, scroll_offset: f64, threshold: f64) -> Option<EntryId> {
    let line = scroll_offset + threshold;
    let selected = tree
        .entries()
        .filter(|(_, entry)| {
            layout
                .heading_top(&entry.heading_id)
                .is_some_and(|top| top <= line)
        })
        .map(|(id, _)| id)
        .last();

    selected.or_else(|| tree.entries().next().map(|(id, _)| id))
}
