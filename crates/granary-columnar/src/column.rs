#![forbid(unsafe_code)]

use crate::error::{Result, StoreError};
use crate::persist::{read_i16, read_i32, read_i64};
use crate::types::{ElementType, Value};
use std::cmp::Ordering;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// Ordered sequence of capacity increments shared by every column of a store.
///
/// Columns grow in lock-step: the store hands the same plan to each column, so
/// capacity changes happen together and no column is copied ahead of the
/// others. Once the plan is exhausted the last increment repeats.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockPlan {
    increments: Vec<usize>,
}

impl BlockPlan {
    pub fn new(increments: Vec<usize>) -> Result<Self> {
        if increments.is_empty() || increments.iter().any(|&inc| inc == 0) {
            return Err(StoreError::InvalidPlan);
        }
        Ok(Self { increments })
    }

    /// Constant-step plan.
    pub fn fixed(step: usize) -> Result<Self> {
        Self::new(vec![step])
    }

    /// Increment to apply at growth step `step`.
    fn increment(&self, step: usize) -> usize {
        match self.increments.get(step) {
            Some(&inc) => inc,
            None => {
                if step == self.increments.len() {
                    log::warn!(
                        "block plan exhausted after {step} steps; repeating last increment"
                    );
                }
                self.increments[self.increments.len() - 1]
            }
        }
    }
}

/// Typed backing storage. One vector per element kind keeps values unboxed
/// and scans contiguous.
#[derive(Clone, Debug)]
enum Cells {
    Byte(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Str(Vec<Option<Arc<str>>>),
}

impl Cells {
    fn new(element_type: ElementType) -> Self {
        match element_type {
            ElementType::Byte => Cells::Byte(Vec::new()),
            ElementType::Short => Cells::Short(Vec::new()),
            ElementType::Int => Cells::Int(Vec::new()),
            ElementType::Long => Cells::Long(Vec::new()),
            ElementType::Str => Cells::Str(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Cells::Byte(v) => v.len(),
            Cells::Short(v) => v.len(),
            Cells::Int(v) => v.len(),
            Cells::Long(v) => v.len(),
            Cells::Str(v) => v.len(),
        }
    }

    fn reserve_exact(&mut self, additional: usize) {
        match self {
            Cells::Byte(v) => v.reserve_exact(additional),
            Cells::Short(v) => v.reserve_exact(additional),
            Cells::Int(v) => v.reserve_exact(additional),
            Cells::Long(v) => v.reserve_exact(additional),
            Cells::Str(v) => v.reserve_exact(additional),
        }
    }
}

/// A named, typed, append-only growable array holding one value per row
/// position.
///
/// Positions are dense and never reordered; capacity follows the shared
/// [`BlockPlan`] rather than `Vec` doubling, so allocation stays predictable
/// across all columns of a store.
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    cells: Cells,
    plan: Arc<BlockPlan>,
    growth_step: usize,
    capacity: usize,
    /// Live heap bytes held by string cells; keeps `mem_bytes` O(1).
    string_bytes: usize,
}

impl Column {
    pub(crate) fn new(
        name: impl Into<String>,
        element_type: ElementType,
        plan: Arc<BlockPlan>,
    ) -> Self {
        Self {
            name: name.into(),
            cells: Cells::new(element_type),
            plan,
            growth_step: 0,
            capacity: 0,
            string_bytes: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element_type(&self) -> ElementType {
        match self.cells {
            Cells::Byte(_) => ElementType::Byte,
            Cells::Short(_) => ElementType::Short,
            Cells::Int(_) => ElementType::Int,
            Cells::Long(_) => ElementType::Long,
            Cells::Str(_) => ElementType::Str,
        }
    }

    /// Count of populated positions.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.len() == 0
    }

    /// Allocated slots (>= `len`); follows the block plan, never shrinks.
    pub fn allocated(&self) -> usize {
        self.capacity
    }

    /// Memory footprint in bytes, including allocated-but-unused slack.
    pub fn mem_bytes(&self) -> usize {
        let slot = self
            .element_type()
            .fixed_width()
            .unwrap_or(std::mem::size_of::<Option<Arc<str>>>());
        self.capacity * slot + self.string_bytes
    }

    fn ensure_capacity(&mut self) {
        if self.cells.len() < self.capacity {
            return;
        }
        let inc = self.plan.increment(self.growth_step);
        self.growth_step += 1;
        self.capacity += inc;
        self.cells.reserve_exact(self.capacity - self.cells.len());
    }

    /// Pre-size for a known row count (bulk load path); bypasses the plan.
    pub(crate) fn reserve_rows(&mut self, rows: usize) {
        if rows > self.capacity {
            self.capacity = rows;
            self.cells.reserve_exact(self.capacity - self.cells.len());
        }
    }

    /// Append one value. The value's kind must match the column's.
    pub(crate) fn push(&mut self, value: &Value) -> Result<()> {
        self.ensure_capacity();
        match (&mut self.cells, value) {
            (Cells::Byte(v), Value::Byte(x)) => v.push(*x),
            (Cells::Short(v), Value::Short(x)) => v.push(*x),
            (Cells::Int(v), Value::Int(x)) => v.push(*x),
            (Cells::Long(v), Value::Long(x)) => v.push(*x),
            (Cells::Str(v), Value::Str(s)) => {
                self.string_bytes += s.len();
                v.push(Some(s.clone()));
            }
            (Cells::Str(v), Value::Null) => v.push(None),
            _ => {
                return Err(StoreError::ColumnTypeMismatch {
                    name: self.name.clone(),
                    expected: self.element_type().to_string(),
                    actual: match value.element_type() {
                        Some(t) => t.to_string(),
                        None => "null".to_owned(),
                    },
                })
            }
        }
        Ok(())
    }

    fn check(&self, position: usize) -> Result<()> {
        if position >= self.len() {
            return Err(StoreError::OutOfRange {
                column: self.name.clone(),
                position,
                len: self.len(),
            });
        }
        Ok(())
    }

    fn mismatch(&self, expected: &str) -> StoreError {
        StoreError::ColumnTypeMismatch {
            name: self.name.clone(),
            expected: expected.to_owned(),
            actual: self.element_type().to_string(),
        }
    }

    /// Generic value at `position`; fails outside `[0, len)`.
    pub fn value(&self, position: usize) -> Result<Value> {
        self.check(position)?;
        Ok(match &self.cells {
            Cells::Byte(v) => Value::Byte(v[position]),
            Cells::Short(v) => Value::Short(v[position]),
            Cells::Int(v) => Value::Int(v[position]),
            Cells::Long(v) => Value::Long(v[position]),
            Cells::Str(v) => match &v[position] {
                Some(s) => Value::Str(s.clone()),
                None => Value::Null,
            },
        })
    }

    /// Raw fast path for byte columns; avoids the generic `Value` on hot
    /// loops (e.g. dense pair counting).
    pub fn get_u8(&self, position: usize) -> Result<u8> {
        self.check(position)?;
        match &self.cells {
            Cells::Byte(v) => Ok(v[position]),
            _ => Err(self.mismatch("byte")),
        }
    }

    pub fn get_i16(&self, position: usize) -> Result<i16> {
        self.check(position)?;
        match &self.cells {
            Cells::Short(v) => Ok(v[position]),
            _ => Err(self.mismatch("short")),
        }
    }

    pub fn get_i32(&self, position: usize) -> Result<i32> {
        self.check(position)?;
        match &self.cells {
            Cells::Int(v) => Ok(v[position]),
            _ => Err(self.mismatch("int")),
        }
    }

    pub fn get_i64(&self, position: usize) -> Result<i64> {
        self.check(position)?;
        match &self.cells {
            Cells::Long(v) => Ok(v[position]),
            _ => Err(self.mismatch("long")),
        }
    }

    pub fn get_str(&self, position: usize) -> Result<Option<&str>> {
        self.check(position)?;
        match &self.cells {
            Cells::Str(v) => Ok(v[position].as_deref()),
            _ => Err(self.mismatch("str")),
        }
    }

    /// Value of any integer-typed column widened to `i64`; predicates
    /// evaluate over this so one variant covers all four integer kinds.
    pub fn get_widened(&self, position: usize) -> Result<i64> {
        self.check(position)?;
        match &self.cells {
            Cells::Byte(v) => Ok(v[position] as i64),
            Cells::Short(v) => Ok(v[position] as i64),
            Cells::Int(v) => Ok(v[position] as i64),
            Cells::Long(v) => Ok(v[position]),
            Cells::Str(_) => Err(self.mismatch("an integer type")),
        }
    }

    /// Natural ordering of the values at two positions of this column.
    pub fn compare(&self, a: usize, b: usize) -> Result<Ordering> {
        self.check(a)?;
        self.check(b)?;
        Ok(match &self.cells {
            Cells::Byte(v) => v[a].cmp(&v[b]),
            Cells::Short(v) => v[a].cmp(&v[b]),
            Cells::Int(v) => v[a].cmp(&v[b]),
            Cells::Long(v) => v[a].cmp(&v[b]),
            Cells::Str(v) => v[a].as_deref().cmp(&v[b].as_deref()),
        })
    }

    /// Value equality across possibly distinct column instances. Columns of
    /// different kinds never compare equal.
    pub fn eq_at(&self, position: usize, other: &Column, other_position: usize) -> Result<bool> {
        self.check(position)?;
        other.check(other_position)?;
        Ok(match (&self.cells, &other.cells) {
            (Cells::Byte(a), Cells::Byte(b)) => a[position] == b[other_position],
            (Cells::Short(a), Cells::Short(b)) => a[position] == b[other_position],
            (Cells::Int(a), Cells::Int(b)) => a[position] == b[other_position],
            (Cells::Long(a), Cells::Long(b)) => a[position] == b[other_position],
            (Cells::Str(a), Cells::Str(b)) => {
                a[position].as_deref() == b[other_position].as_deref()
            }
            _ => false,
        })
    }

    /// Deterministic hash of the value at `position`. Composite keys fold
    /// per-column hashes with a fixed multiplier, so this only has to be
    /// stable per value.
    pub fn hash_at(&self, position: usize) -> Result<u64> {
        self.check(position)?;
        Ok(match &self.cells {
            Cells::Byte(v) => splitmix64(v[position] as u64),
            Cells::Short(v) => splitmix64(v[position] as u64),
            Cells::Int(v) => splitmix64(v[position] as u64),
            Cells::Long(v) => splitmix64(v[position] as u64),
            Cells::Str(v) => match &v[position] {
                Some(s) => splitmix64(fnv1a(s.as_bytes())),
                None => splitmix64(NULL_STR_SEED),
            },
        })
    }

    /// Byte length of the encoded live range (the payload `write_payload`
    /// produces).
    pub(crate) fn payload_bytes(&self) -> u64 {
        match self.element_type().fixed_width() {
            Some(width) => (self.len() * width) as u64,
            // Strings: a 4-byte length prefix per value plus the live bytes.
            None => (self.len() * 4 + self.string_bytes) as u64,
        }
    }

    /// Write the live range: fixed-width values raw big-endian, strings
    /// individually length-prefixed (`-1` for null).
    pub(crate) fn write_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match &self.cells {
            Cells::Byte(v) => w.write_all(v)?,
            Cells::Short(v) => {
                for x in v {
                    w.write_all(&x.to_be_bytes())?;
                }
            }
            Cells::Int(v) => {
                for x in v {
                    w.write_all(&x.to_be_bytes())?;
                }
            }
            Cells::Long(v) => {
                for x in v {
                    w.write_all(&x.to_be_bytes())?;
                }
            }
            Cells::Str(v) => {
                for s in v {
                    match s {
                        Some(s) => {
                            let len = i32::try_from(s.len()).map_err(|_| {
                                io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    "string value exceeds i32 length prefix",
                                )
                            })?;
                            w.write_all(&len.to_be_bytes())?;
                            w.write_all(s.as_bytes())?;
                        }
                        None => w.write_all(&(-1i32).to_be_bytes())?,
                    }
                }
            }
        }
        Ok(())
    }

    /// Read `rows` values into an empty column.
    pub(crate) fn read_payload<Rd: Read>(&mut self, rows: usize, r: &mut Rd) -> Result<()> {
        debug_assert_eq!(self.len(), 0, "read_payload expects an empty column");
        self.reserve_rows(rows);
        match &mut self.cells {
            Cells::Byte(v) => {
                let mut buf = vec![0u8; rows];
                r.read_exact(&mut buf)?;
                v.extend_from_slice(&buf);
            }
            Cells::Short(v) => {
                for _ in 0..rows {
                    v.push(read_i16(r)?);
                }
            }
            Cells::Int(v) => {
                for _ in 0..rows {
                    v.push(read_i32(r)?);
                }
            }
            Cells::Long(v) => {
                for _ in 0..rows {
                    v.push(read_i64(r)?);
                }
            }
            Cells::Str(v) => {
                for _ in 0..rows {
                    let len = read_i32(r)?;
                    if len == -1 {
                        v.push(None);
                        continue;
                    }
                    if len < 0 || len as usize > MAX_STRING_LEN {
                        return Err(StoreError::Corrupt(format!(
                            "string length {len} out of range in column `{}`",
                            self.name
                        )));
                    }
                    let mut buf = vec![0u8; len as usize];
                    r.read_exact(&mut buf)?;
                    let s = String::from_utf8(buf).map_err(|_| {
                        StoreError::Corrupt(format!(
                            "invalid UTF-8 string in column `{}`",
                            self.name
                        ))
                    })?;
                    self.string_bytes += s.len();
                    v.push(Some(Arc::from(s)));
                }
            }
        }
        Ok(())
    }
}

/// Bound on a single decoded string; corrupt length prefixes must not drive
/// allocation.
const MAX_STRING_LEN: usize = 1 << 30;

const NULL_STR_SEED: u64 = 0x6e75_6c6c;

fn splitmix64(mut x: u64) -> u64 {
    // A fast 64-bit mixer; not cryptographic.
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    // FNV-1a for stable string hashing across runs.
    let mut h: u64 = 0xcbf29ce484222325;
    for b in bytes {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(element_type: ElementType, plan: &[usize]) -> Column {
        let plan = Arc::new(BlockPlan::new(plan.to_vec()).unwrap());
        Column::new("c", element_type, plan)
    }

    #[test]
    fn capacity_follows_the_plan_and_repeats_last_increment() {
        let mut col = column(ElementType::Int, &[4, 4, 8]);
        assert_eq!(col.allocated(), 0);

        for i in 0..17 {
            col.push(&Value::Int(i)).unwrap();
        }

        // 4 + 4 + 8 = 16 covers row 16's append only after one more step of 8.
        assert_eq!(col.len(), 17);
        assert_eq!(col.allocated(), 24);
    }

    #[test]
    fn plan_rejects_empty_and_zero_increments() {
        assert!(matches!(
            BlockPlan::new(vec![]),
            Err(StoreError::InvalidPlan)
        ));
        assert!(matches!(
            BlockPlan::new(vec![8, 0]),
            Err(StoreError::InvalidPlan)
        ));
    }

    #[test]
    fn out_of_range_access_fails() {
        let mut col = column(ElementType::Long, &[2]);
        col.push(&Value::Long(9)).unwrap();

        assert!(matches!(
            col.value(1),
            Err(StoreError::OutOfRange { position: 1, .. })
        ));
        assert!(matches!(col.get_i64(5), Err(StoreError::OutOfRange { .. })));
    }

    #[test]
    fn push_rejects_mismatched_kind() {
        let mut col = column(ElementType::Short, &[2]);
        assert!(matches!(
            col.push(&Value::Int(1)),
            Err(StoreError::ColumnTypeMismatch { .. })
        ));
        assert_eq!(col.len(), 0);
    }

    #[test]
    fn compare_uses_natural_ordering() {
        let mut col = column(ElementType::Int, &[4]);
        for v in [3, -1, 3] {
            col.push(&Value::Int(v)).unwrap();
        }
        assert_eq!(col.compare(0, 1).unwrap(), Ordering::Greater);
        assert_eq!(col.compare(1, 0).unwrap(), Ordering::Less);
        assert_eq!(col.compare(0, 2).unwrap(), Ordering::Equal);
    }

    #[test]
    fn equal_values_hash_equal_across_columns() {
        let mut a = column(ElementType::Int, &[4]);
        let mut b = column(ElementType::Int, &[4]);
        a.push(&Value::Int(42)).unwrap();
        b.push(&Value::Int(7)).unwrap();
        b.push(&Value::Int(42)).unwrap();

        assert!(a.eq_at(0, &b, 1).unwrap());
        assert!(!a.eq_at(0, &b, 0).unwrap());
        assert_eq!(a.hash_at(0).unwrap(), b.hash_at(1).unwrap());
    }

    #[test]
    fn string_nulls_order_before_values_and_hash_distinctly() {
        let mut col = column(ElementType::Str, &[4]);
        col.push(&Value::Null).unwrap();
        col.push(&Value::Str(Arc::from("a"))).unwrap();
        col.push(&Value::Null).unwrap();

        assert_eq!(col.compare(0, 1).unwrap(), Ordering::Less);
        assert_eq!(col.compare(0, 2).unwrap(), Ordering::Equal);
        assert_eq!(col.hash_at(0).unwrap(), col.hash_at(2).unwrap());
        assert_ne!(col.hash_at(0).unwrap(), col.hash_at(1).unwrap());
    }

    #[test]
    fn mem_bytes_counts_slack_and_string_heap() {
        let mut col = column(ElementType::Str, &[8]);
        assert_eq!(col.mem_bytes(), 0);

        col.push(&Value::Str(Arc::from("abcd"))).unwrap();
        let slot = std::mem::size_of::<Option<Arc<str>>>();
        assert_eq!(col.mem_bytes(), 8 * slot + 4);
    }
}
