#![forbid(unsafe_code)]

use crate::column::Column;
use crate::error::{Result, StoreError};
use crate::fields::{AccessorTable, FieldSpec, Record};
use crate::types::{ElementType, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Consumer of accepted row positions.
///
/// The executor calls `data` synchronously, once per qualifying position, in
/// increasing position order. Sinks carry their own state: re-running a query
/// with the same sink accumulates across both passes.
pub trait PositionSink {
    fn data(&mut self, position: usize) -> Result<()>;
}

/// Running total of accepted positions.
#[derive(Debug, Default)]
pub struct RowCounter {
    count: u64,
}

impl RowCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl PositionSink for RowCounter {
    fn data(&mut self, _position: usize) -> Result<()> {
        self.count += 1;
        Ok(())
    }
}

/// Reconstructs a full record per accepted position through the accessor
/// table's setters.
///
/// Columns and setters are resolved once at construction (fields and columns
/// share declaration order), not looked up per row.
pub struct RowCollector<'a, R: Record> {
    fields: &'a [FieldSpec<R>],
    columns: &'a [Column],
    rows: Vec<R>,
}

impl<'a, R: Record> RowCollector<'a, R> {
    pub(crate) fn new(accessors: &'a AccessorTable<R>, columns: &'a [Column]) -> Self {
        debug_assert_eq!(accessors.fields().len(), columns.len());
        Self {
            fields: accessors.fields(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }
}

impl<R: Record> PositionSink for RowCollector<'_, R> {
    fn data(&mut self, position: usize) -> Result<()> {
        let mut record = R::default();
        for (field, column) in self.fields.iter().zip(self.columns) {
            field.write(&mut record, column.value(position)?)?;
        }
        self.rows.push(record);
        Ok(())
    }
}

/// Group-count over a single integer-typed column: raw widened value →
/// occurrence count.
pub struct GroupCounter<'a> {
    column: &'a Column,
    counts: HashMap<i64, u64>,
}

impl<'a> GroupCounter<'a> {
    pub fn new(column: &'a Column) -> Result<Self> {
        if !column.element_type().is_integer() {
            return Err(StoreError::ColumnTypeMismatch {
                name: column.name().to_owned(),
                expected: "an integer type".to_owned(),
                actual: column.element_type().to_string(),
            });
        }
        Ok(Self {
            column,
            counts: HashMap::new(),
        })
    }

    pub fn counts(&self) -> &HashMap<i64, u64> {
        &self.counts
    }

    pub fn count_of(&self, value: i64) -> u64 {
        self.counts.get(&value).copied().unwrap_or(0)
    }
}

impl PositionSink for GroupCounter<'_> {
    fn data(&mut self, position: usize) -> Result<()> {
        let value = self.column.get_widened(position)?;
        *self.counts.entry(value).or_insert(0) += 1;
        Ok(())
    }
}

/// One level of a nested group-count tree: branches per grouping column,
/// occurrence counts at the leaf level.
#[derive(Clone, Debug, PartialEq)]
pub enum GroupNode {
    Branch(HashMap<Value, GroupNode>),
    Leaf(HashMap<Value, u64>),
}

impl GroupNode {
    /// Child subtree under `key`; `None` on leaves or unseen keys.
    pub fn child(&self, key: &Value) -> Option<&GroupNode> {
        match self {
            GroupNode::Branch(children) => children.get(key),
            GroupNode::Leaf(_) => None,
        }
    }

    /// Occurrence count of `key` at a leaf; zero on branches or unseen keys.
    pub fn leaf_count(&self, key: &Value) -> u64 {
        match self {
            GroupNode::Leaf(counts) => counts.get(key).copied().unwrap_or(0),
            GroupNode::Branch(_) => 0,
        }
    }

    /// Number of distinct keys at this level.
    pub fn len(&self) -> usize {
        match self {
            GroupNode::Branch(children) => children.len(),
            GroupNode::Leaf(counts) => counts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Group-count over two or more columns: nested maps, outer key the first
/// grouping column's value, leaf level the last column's value → count.
pub struct NestedGroupCounter<'a> {
    columns: Vec<&'a Column>,
    root: GroupNode,
}

impl<'a> NestedGroupCounter<'a> {
    /// Fails with a configuration error below two grouping columns; use
    /// [`GroupCounter`] for the single-column case.
    pub fn new(columns: Vec<&'a Column>) -> Result<Self> {
        if columns.len() < 2 {
            return Err(StoreError::InvalidGrouping(columns.len()));
        }
        Ok(Self {
            columns,
            root: GroupNode::Branch(HashMap::new()),
        })
    }

    pub fn root(&self) -> &GroupNode {
        &self.root
    }

    /// Count for one full key path (`path.len()` must equal the grouping
    /// column count); zero for unseen paths.
    pub fn count(&self, path: &[Value]) -> u64 {
        if path.len() != self.columns.len() {
            return 0;
        }
        let mut node = &self.root;
        for key in &path[..path.len() - 1] {
            match node.child(key) {
                Some(child) => node = child,
                None => return 0,
            }
        }
        node.leaf_count(&path[path.len() - 1])
    }
}

impl PositionSink for NestedGroupCounter<'_> {
    fn data(&mut self, position: usize) -> Result<()> {
        let n = self.columns.len();
        let mut node = &mut self.root;
        for (i, column) in self.columns[..n - 1].iter().enumerate() {
            let key = column.value(position)?;
            let GroupNode::Branch(children) = node else {
                unreachable!("tree depth is fixed by the grouping column count")
            };
            let next_is_leaf = i + 2 == n;
            node = children.entry(key).or_insert_with(|| {
                if next_is_leaf {
                    GroupNode::Leaf(HashMap::new())
                } else {
                    GroupNode::Branch(HashMap::new())
                }
            });
        }

        let key = self.columns[n - 1].value(position)?;
        let GroupNode::Leaf(counts) = node else {
            unreachable!("tree depth is fixed by the grouping column count")
        };
        *counts.entry(key).or_insert(0) += 1;
        Ok(())
    }
}

/// Group-count over exactly two byte columns with a dense 256x256 counter
/// table: the raw `u8` pair indexes the table directly, no hashing at all.
pub struct BytePairCounter<'a> {
    first: &'a Column,
    second: &'a Column,
    counts: Vec<u64>,
}

impl<'a> BytePairCounter<'a> {
    pub fn new(first: &'a Column, second: &'a Column) -> Result<Self> {
        for column in [first, second] {
            if column.element_type() != ElementType::Byte {
                return Err(StoreError::ColumnTypeMismatch {
                    name: column.name().to_owned(),
                    expected: ElementType::Byte.to_string(),
                    actual: column.element_type().to_string(),
                });
            }
        }
        Ok(Self {
            first,
            second,
            counts: vec![0; 256 * 256],
        })
    }

    pub fn count(&self, first: u8, second: u8) -> u64 {
        self.counts[(first as usize) << 8 | second as usize]
    }
}

impl PositionSink for BytePairCounter<'_> {
    fn data(&mut self, position: usize) -> Result<()> {
        let i = self.first.get_u8(position)? as usize;
        let j = self.second.get_u8(position)? as usize;
        self.counts[i << 8 | j] += 1;
        Ok(())
    }
}

/// User-supplied accumulator factory for [`GroupAggregator`].
pub trait Aggregate {
    type Acc;

    /// Seed an accumulator from the first accepted position of a new group
    /// (that position is included; `update` is not called for it).
    fn create(&mut self, position: usize) -> Result<Self::Acc>;

    /// Fold one more accepted position into an existing group.
    fn update(&mut self, acc: &mut Self::Acc, position: usize) -> Result<()>;
}

/// Borrowed-view composite key: the designated columns plus a row position.
///
/// Equality and hash are defined over the values at that position across the
/// columns, never over identity; two keys from different positions (or
/// different column instances) are equal iff every designated column pair
/// holds an equal value. The hash is cached at construction since the map
/// guarantees at least one hash per key. Keys only live for the scan that
/// produced them.
struct GroupKey<'a> {
    columns: Rc<[&'a Column]>,
    position: usize,
    hash: u64,
}

impl<'a> GroupKey<'a> {
    fn new(columns: Rc<[&'a Column]>, position: usize) -> Result<Self> {
        let mut hash = 17u64;
        for column in columns.iter() {
            // Order-dependent fold: column order in the key matters.
            hash = hash.wrapping_mul(31).wrapping_add(column.hash_at(position)?);
        }
        Ok(Self {
            columns,
            position,
            hash,
        })
    }
}

impl PartialEq for GroupKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.eq_at(self.position, b, other.position).unwrap_or(false))
    }
}

impl Eq for GroupKey<'_> {}

impl Hash for GroupKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Generic aggregation keyed by a composite of zero or more grouping columns.
///
/// Zero grouping columns is valid and means "aggregate everything into one
/// bucket": every position maps to an equal key.
pub struct GroupAggregator<'a, A: Aggregate> {
    key_columns: Rc<[&'a Column]>,
    aggregate: A,
    groups: HashMap<GroupKey<'a>, A::Acc>,
}

impl<'a, A: Aggregate> GroupAggregator<'a, A> {
    pub fn new(key_columns: Vec<&'a Column>, aggregate: A) -> Self {
        Self {
            key_columns: key_columns.into(),
            aggregate,
            groups: HashMap::new(),
        }
    }

    /// Number of groups seen so far.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Materialize owned key values plus accumulators; the borrowed keys
    /// never escape the scan any other way.
    pub fn into_groups(self) -> Result<Vec<(Vec<Value>, A::Acc)>> {
        self.groups
            .into_iter()
            .map(|(key, acc)| {
                let values = key
                    .columns
                    .iter()
                    .map(|column| column.value(key.position))
                    .collect::<Result<Vec<_>>>()?;
                Ok((values, acc))
            })
            .collect()
    }
}

impl<A: Aggregate> PositionSink for GroupAggregator<'_, A> {
    fn data(&mut self, position: usize) -> Result<()> {
        let key = GroupKey::new(self.key_columns.clone(), position)?;
        match self.groups.entry(key) {
            Entry::Occupied(mut entry) => self.aggregate.update(entry.get_mut(), position)?,
            Entry::Vacant(entry) => {
                entry.insert(self.aggregate.create(position)?);
            }
        }
        Ok(())
    }
}
