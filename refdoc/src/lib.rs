//! refdoc - collapsible, sortable reference pages
//!
//! Declarative JSON documents describe sections, token formatting rules and
//! table definitions. They are rendered into a page of collapsible sections
//! with sortable tables and a table of contents that tracks the reader.

#![deny(unsafe_code)]
// Allow some pedantic lints that are too strict for this project
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::enum_variant_names)]

pub mod config;
pub mod dom;
pub mod ids;
pub mod loader;
pub mod page;
pub mod section;
pub mod signal;
pub mod table;
pub mod text_format;
pub mod toc;
pub mod viewer;

pub use config::{ConfigError, RootConfig, SiteConfig};
pub use dom::{Element, Node};
pub use loader::{load_root, load_roots, LoadError, LoadedRoot, RootSource};
pub use page::{Page, PageError};
pub use table::TableDefinitions;
pub use text_format::{escape_html, TextFormatter};
pub use toc::TocTree;
pub use viewer::{NavOutcome, Viewer};
