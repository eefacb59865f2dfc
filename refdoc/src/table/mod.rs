//! Data tables: definition inheritance, column normalization, rendering and
//! client-side sorting

mod column;
mod definition;
mod render;
mod sort;

pub use column::{
    column_configs, ColumnConfig, ColumnError, ColumnSort, HeaderLabel, HeaderStyle,
    SortDirection, SortSpec, SortType, Sorter, Strategy,
};
pub use definition::{
    DefinitionError, TableDefinition, TableDefinitions, DEFAULT_TYPE, FALLBACK_COLUMNS,
};
pub use render::{
    apply_sort, render_cell_value, render_table, row_order, TableModel, TableRegion,
    ROW_INDEX_ATTR,
};
pub use sort::{
    cell_text, compare_keys, natural_cmp, numbers_in, numbers_in_text, reduce, sort_key,
    sort_override, sorted_order, SortKey, SortState,
};
