#![forbid(unsafe_code)]

use crate::column::{BlockPlan, Column};
use crate::error::{Result, StoreError};
use crate::fields::{AccessorTable, Record};
use crate::request::{BoundRequest, Request};
use crate::sink::{PositionSink, RowCollector};
use crate::stats::{ColumnStats, StoreStats};
use crate::types::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// An in-memory column store over records of shape `R`.
///
/// One column per record field, created at construction and grown in
/// lock-step under a shared [`BlockPlan`]. The store is mutated only by batch
/// append ([`ingest`](Self::ingest)) or full-structure load; rows are never
/// updated or deleted.
///
/// Ingestion takes `&mut self` and selection takes `&self`, so within one
/// thread the borrow checker enforces the required read/write discipline;
/// callers sharing a store across threads wrap it in an `RwLock` (many
/// concurrent selects are safe with each other, ingestion excludes
/// everything).
pub struct ColumnStore<R: Record> {
    accessors: AccessorTable<R>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl<R: Record> std::fmt::Debug for ColumnStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnStore")
            .field("columns", &self.columns)
            .field("index", &self.index)
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl<R: Record> ColumnStore<R> {
    /// Derive column names and types from the record shape and create one
    /// empty column per field.
    pub fn new(plan: BlockPlan) -> Result<Self> {
        let accessors = AccessorTable::for_record()?;
        let plan = Arc::new(plan);

        let mut columns = Vec::with_capacity(accessors.fields().len());
        let mut index = HashMap::with_capacity(accessors.fields().len());
        for (i, field) in accessors.fields().iter().enumerate() {
            columns.push(Column::new(field.name(), field.element_type(), plan.clone()));
            index.insert(field.name().to_owned(), i);
        }

        Ok(Self {
            accessors,
            columns,
            index,
            rows: 0,
        })
    }

    /// Append a batch of records. Every record contributes one position to
    /// every column; field reads happen before any column is touched, so a
    /// record lands fully or not at all.
    pub fn ingest(&mut self, records: &[R]) -> Result<usize> {
        let mut row: Vec<Value> = Vec::with_capacity(self.columns.len());
        for record in records {
            row.clear();
            for field in self.accessors.fields() {
                row.push(field.read(record));
            }
            // Pushes are type-aligned with the columns by construction.
            for (column, value) in self.columns.iter_mut().zip(row.drain(..)) {
                column.push(&value)?;
            }
            self.rows += 1;
        }
        log::debug!(
            "ingested {} records ({} rows total)",
            records.len(),
            self.rows
        );
        Ok(records.len())
    }

    /// The shared logical size: all columns hold exactly this many rows.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Largest allocated capacity across columns. Columns share the growth
    /// plan, so in steady state all capacities match.
    pub fn allocated_rows(&self) -> usize {
        self.columns.iter().map(Column::allocated).max().unwrap_or(0)
    }

    /// Total memory footprint across columns, slack included.
    pub fn mem_bytes(&self) -> usize {
        self.columns.iter().map(Column::mem_bytes).sum()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.index
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| StoreError::UnknownColumn(name.to_owned()))
    }

    /// Columns in field declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn accessors(&self) -> &AccessorTable<R> {
        &self.accessors
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub(crate) fn set_rows(&mut self, rows: usize) {
        self.rows = rows;
    }

    /// Evaluate a predicate conjunction over all live positions and feed each
    /// qualifying position to `sink`, in increasing order.
    ///
    /// Binding resolves every request's column name first; an unknown name or
    /// type mismatch surfaces before any scanning. The scan never mutates the
    /// store, so re-running the same query yields an independent pass, and a
    /// stateful sink accumulates across runs.
    pub fn select(&self, requests: &[Request], sink: &mut dyn PositionSink) -> Result<()> {
        let bound = requests
            .iter()
            .map(|request| request.bind(self.column(request.column())?))
            .collect::<Result<Vec<BoundRequest<'_>>>>()?;
        log::debug!(
            "select: {} predicates bound, scanning {} rows",
            bound.len(),
            self.rows
        );

        'rows: for position in 0..self.rows {
            for request in &bound {
                if !request.accepts(position) {
                    continue 'rows;
                }
            }
            sink.data(position)?;
        }
        Ok(())
    }

    /// A sink that reconstructs full records, with columns and setters
    /// resolved once up front.
    pub fn row_collector(&self) -> RowCollector<'_, R> {
        RowCollector::new(&self.accessors, &self.columns)
    }

    /// Read-only accounting snapshot for monitoring surfaces. Pure query, no
    /// side effects.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            rows: self.rows,
            allocated_rows: self.allocated_rows(),
            mem_bytes: self.mem_bytes(),
            columns: self
                .columns
                .iter()
                .map(|column| ColumnStats {
                    name: column.name().to_owned(),
                    element_type: column.element_type(),
                    rows: column.len(),
                    allocated_rows: column.allocated(),
                    mem_bytes: column.mem_bytes(),
                })
                .collect(),
        }
    }
}
