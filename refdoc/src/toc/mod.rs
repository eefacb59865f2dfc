//! Table of contents built from rendered headings

mod spy;
mod tree;

pub use spy::{entry_at, Layout, NoLayout, SCROLL_SPY_THRESHOLD};
pub use tree::{collect_headings, EntryId, Heading, TocEntry, TocTree, TOC_CLASS};
