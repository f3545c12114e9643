//! Column-oriented in-memory record store.
//!
//! Records of a fixed shape are decomposed into per-field typed arrays, so
//! repeated filter/aggregate passes touch one contiguous array per predicate
//! instead of materializing rows. This crate covers:
//! - Typed growable columns sharing a block-based growth plan (never doubling
//!   independently per column).
//! - A one-time field accessor table for reflection-free ingestion and
//!   record reconstruction.
//! - A predicate ([`Request`]) + position-callback ([`PositionSink`]) scan
//!   pipeline with logical-AND semantics.
//! - Group-counting and generic aggregation callbacks built on that pipeline.
//! - Compact binary persistence with an optional multi-threaded load path.

#![forbid(unsafe_code)]

mod column;
mod error;
mod fields;
mod persist;
mod request;
mod sink;
mod stats;
mod store;
mod types;

pub use crate::column::{BlockPlan, Column};
pub use crate::error::{Result, StoreError};
pub use crate::fields::{AccessorTable, FieldGet, FieldSet, FieldSpec, Record};
pub use crate::request::{Pattern, Request};
pub use crate::sink::{
    Aggregate, BytePairCounter, GroupAggregator, GroupCounter, GroupNode, NestedGroupCounter,
    PositionSink, RowCollector, RowCounter,
};
pub use crate::stats::{ColumnStats, StoreStats};
pub use crate::store::ColumnStore;
pub use crate::types::{ElementType, Value};
