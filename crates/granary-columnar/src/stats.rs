#![forbid(unsafe_code)]

use crate::types::ElementType;

/// Read-only snapshot of a store's accounting counters.
///
/// Intended for monitoring surfaces; computing a snapshot never mutates the
/// store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreStats {
    pub rows: usize,
    pub allocated_rows: usize,
    pub mem_bytes: usize,
    pub columns: Vec<ColumnStats>,
}

/// Per-column accounting within a [`StoreStats`] snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnStats {
    pub name: String,
    pub element_type: ElementType,
    pub rows: usize,
    pub allocated_rows: usize,
    pub mem_bytes: usize,
}
