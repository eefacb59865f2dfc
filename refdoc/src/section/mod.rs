//! Collapsible sections: parsing the declarative section list and rendering it

mod render;
mod spec;

pub use render::{
    content_region_id, enclosing_sections, error_message, is_section_expanded, set_section_expanded,
    toggle_section, SectionRenderer, CONTENT_SUFFIX, SECTION_CLASS,
};
pub use spec::{
    check_document, parse_document, parse_sections, Content, SectionSpec, SpecError, TableSpec,
};
