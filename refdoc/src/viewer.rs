//! Interactive session over a rendered page
//!
//! The viewer owns every piece of interactive state: section collapse flags
//! (in the DOM), table sort state, the outline and its active entry, and the
//! current location hash. Event handlers only record work; [`Viewer::frame`]
//! performs at most one outline rebuild and one scroll-spy pass per call.

use crate::page::{Page, PageError};
use crate::section::{
    enclosing_sections, set_section_expanded, toggle_section, SectionSpec,
};
use crate::signal::{FrameGate, Notification};
use crate::table::{apply_sort, SortDirection};
use crate::toc::{entry_at, Layout, TocTree, SCROLL_SPY_THRESHOLD};
use std::sync::mpsc::Receiver;

/// Result of navigating to a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// The target became active; the host should bring it into view
    Jump,
    /// The target was already active; nothing moves
    AlreadyActive,
    /// No outline entry carries that id
    Unknown,
}

/// What one frame did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub rebuilt: bool,
    pub active_changed: bool,
}

/// A headless, single-threaded viewer
#[derive(Debug)]
pub struct Viewer {
    page: Page,
    toc: TocTree,
    inbox: Receiver<Notification>,
    rebuild: FrameGate,
    spy: FrameGate,
    scroll_offset: f64,
    threshold: f64,
    hash: Option<String>,
    rebuilds: usize,
}

impl Viewer {
    /// Start a session; the outline is built immediately
    pub fn new(page: Page) -> Self {
        let inbox = page.bus().subscribe();
        let toc = TocTree::build(&page.headings());
        Self {
            page,
            toc,
            inbox,
            rebuild: FrameGate::default(),
            spy: FrameGate::default(),
            scroll_offset: 0.0,
            threshold: SCROLL_SPY_THRESHOLD,
            hash: None,
            rebuilds: 0,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn toc(&self) -> &TocTree {
        &self.toc
    }

    /// Current location fragment, without `#`
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Number of outline rebuilds performed by [`Viewer::frame`]
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    /// Handle a click on a section heading
    pub fn toggle_section(&mut self, heading_id: &str) -> Option<bool> {
        let expanded = self
            .page
            .roots_mut()
            .iter_mut()
            .find_map(|root| toggle_section(&mut root.element, heading_id))?;
        self.spy.request();
        Some(expanded)
    }

    /// Handle a click on a table header
    ///
    /// Returns the new direction, or `None` for unknown regions, unknown
    /// columns and columns with sorting disabled.
    pub fn activate_column(&mut self, region_id: &str, column: usize) -> Option<SortDirection> {
        let (table, model) = self.page.table_mut(region_id)?;
        let (direction, order) = model.activate(column)?;
        apply_sort(table, column, direction, &order);
        log::debug!("Sorted '{}' by column {} {:?}", region_id, column, direction);
        Some(direction)
    }

    /// Handle a click on an outline branch toggle
    pub fn toggle_toc_entry(&mut self, heading_id: &str) -> Option<bool> {
        let id = self.toc.lookup(heading_id)?;
        self.toc.toggle(id)
    }

    /// Handle a scroll event
    pub fn scroll(&mut self, offset: f64) {
        self.scroll_offset = offset;
        self.spy.request();
    }

    /// Handle a resize event
    pub fn resize(&mut self) {
        self.spy.request();
    }

    /// Handle activation of an outline link
    pub fn follow_link(&mut self, heading_id: &str) -> NavOutcome {
        self.navigate_hash(heading_id)
    }

    /// Select the entry named by a location fragment
    ///
    /// The entry's outline path and every section enclosing its heading are
    /// expanded, and the fragment becomes the current location.
    pub fn navigate_hash(&mut self, hash: &str) -> NavOutcome {
        let target = hash.strip_prefix('#').unwrap_or(hash);
        let Some(id) = self.toc.lookup(target) else {
            log::debug!("No outline entry for '#{}'", target);
            return NavOutcome::Unknown;
        };

        let already_active = self.toc.active() == Some(id);
        self.toc.activate(id);
        self.hash = Some(target.to_string());

        for root in self.page.roots_mut() {
            for section in enclosing_sections(&root.element, target) {
                set_section_expanded(&mut root.element, &section, true);
            }
        }

        if already_active {
            NavOutcome::AlreadyActive
        } else {
            NavOutcome::Jump
        }
    }

    /// Render more sections into a root; the outline catches up next frame
    pub fn append_sections(&mut self, root_id: &str, specs: &[SectionSpec]) -> Result<usize, PageError> {
        self.page.append_sections(root_id, specs)
    }

    /// Run one animation frame
    ///
    /// Pending notifications collapse into at most one rebuild, and pending
    /// scroll/resize requests into at most one scroll-spy pass.
    pub fn frame(&mut self, layout: &dyn Layout) -> FrameReport {
        for notification in self.inbox.try_iter() {
            log::debug!("Frame notification: {:?}", notification);
            self.rebuild.request();
        }

        let mut report = FrameReport::default();

        if self.rebuild.take() {
            let mut rebuilt = TocTree::build(&self.page.headings());
            rebuilt.carry_over(&self.toc);
            self.toc = rebuilt;
            self.rebuilds += 1;
            report.rebuilt = true;
            log::debug!("Outline rebuilt with {} entries", self.toc.len());
            self.spy.request();
        }

        if self.spy.take() {
            let previous = self.toc.active();
            if let Some(id) = entry_at(&self.toc, layout, self.scroll_offset, self.threshold) {
                if previous != Some(id) {
                    self.toc.activate(id);
                    report.active_changed = true;
                }
            }
        }

        report
    }

    /// Serialize the page with the current outline
    pub fn to_html(&self) -> String {
        self.page.to_html(&self.toc)
    }

    /// Consume the viewer, returning the page and outline
    pub fn into_parts(self) -> (Page, TocTree) {
        (self.page, self.toc)
    }
}
