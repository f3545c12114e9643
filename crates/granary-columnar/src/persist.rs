#![forbid(unsafe_code)]

use crate::column::BlockPlan;
use crate::error::{Result, StoreError};
use crate::fields::Record;
use crate::store::ColumnStore;
use crate::types::ElementType;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::Path;

// Binary layout, big-endian throughout:
//
//   [i32 rowCount]
//   per column, in declaration order:
//     [i32 nameLen][utf8 name]
//     [i32 typeTag]
//     [i64 payloadLen]          byte length of the payload that follows
//     [payload: rowCount values]
//
// Fixed-width numerics are written raw with no per-value framing; strings are
// individually length-prefixed with `-1` as the null sentinel. `payloadLen`
// is what lets a loader seek over variable-width columns without decoding
// them, which the parallel path relies on.

pub(crate) fn read_i16<R: Read>(r: &mut R) -> io::Result<i16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(i16::from_be_bytes(buf))
}

pub(crate) fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

pub(crate) fn read_i64<R: Read>(r: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

fn write_i32<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

fn write_i64<W: Write>(w: &mut W, v: i64) -> io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

const MAX_NAME_LEN: i32 = 4096;

struct ColumnHeader {
    name: String,
    element_type: ElementType,
    payload_len: i64,
}

fn read_column_header<R: Read>(r: &mut R) -> Result<ColumnHeader> {
    let name_len = read_i32(r)?;
    if !(0..=MAX_NAME_LEN).contains(&name_len) {
        return Err(StoreError::Corrupt(format!(
            "column name length {name_len} out of range"
        )));
    }
    let mut buf = vec![0u8; name_len as usize];
    r.read_exact(&mut buf)?;
    let name = String::from_utf8(buf)
        .map_err(|_| StoreError::Corrupt("column name is not valid UTF-8".to_owned()))?;

    let tag = read_i32(r)?;
    let element_type = ElementType::from_tag(tag)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown type tag {tag}")))?;

    let payload_len = read_i64(r)?;
    if payload_len < 0 {
        return Err(StoreError::Corrupt(format!(
            "negative payload length {payload_len} for column `{name}`"
        )));
    }

    Ok(ColumnHeader {
        name,
        element_type,
        payload_len,
    })
}

fn read_row_count<R: Read>(r: &mut R) -> Result<usize> {
    let rows = read_i32(r)?;
    if rows < 0 {
        return Err(StoreError::Corrupt(format!(
            "negative record count {rows}"
        )));
    }
    Ok(rows as usize)
}

impl<R: Record> ColumnStore<R> {
    /// Write the full column set: record count, then each column's metadata
    /// and serialized live range, in declaration order.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        let rows = i32::try_from(self.row_count()).map_err(|_| {
            StoreError::Corrupt(format!(
                "record count {} exceeds the i32 header field",
                self.row_count()
            ))
        })?;

        let mut w = BufWriter::new(writer);
        write_i32(&mut w, rows)?;
        for column in self.columns() {
            let name = column.name().as_bytes();
            write_i32(&mut w, name.len() as i32)?;
            w.write_all(name)?;
            write_i32(&mut w, column.element_type().tag())?;
            write_i64(&mut w, column.payload_bytes() as i64)?;
            column.write_payload(&mut w)?;
        }
        w.flush()?;
        log::debug!(
            "saved {} rows across {} columns",
            self.row_count(),
            self.columns().len()
        );
        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        self.save(File::create(path)?)
    }

    /// Sequential load. The file's column names and types must match the
    /// record shape in declaration order; columns are pre-sized to exactly
    /// the stored row count (the growth plan only applies to later appends).
    pub fn load<Rd: Read>(plan: BlockPlan, reader: Rd) -> Result<Self> {
        let mut store = Self::new(plan)?;
        let mut r = BufReader::new(reader);
        let rows = read_row_count(&mut r)?;

        for column in store.columns_mut() {
            let header = read_column_header(&mut r)?;
            check_schema(&header, column.name(), column.element_type())?;
            column.read_payload(rows, &mut r)?;
        }
        store.set_rows(rows);
        log::debug!(
            "loaded {rows} rows across {} columns",
            store.columns().len()
        );
        Ok(store)
    }

    pub fn load_from_path(plan: BlockPlan, path: &Path) -> Result<Self> {
        Self::load(plan, File::open(path)?)
    }

    /// Parallel load: one sequential metadata pass records each column's
    /// payload extent (seeking over the data), then the columns are split
    /// into contiguous chunks across `workers` scoped threads. Each worker
    /// opens its own file handle and fills only its own columns, so no byte
    /// range or column is touched twice. All workers must finish cleanly; the
    /// first failure fails the whole load and no partial store is returned.
    pub fn load_parallel(plan: BlockPlan, path: &Path, workers: NonZeroUsize) -> Result<Self> {
        let mut store = Self::new(plan)?;
        let rows;
        let mut extents: Vec<(u64, u64)> = Vec::with_capacity(store.columns().len());
        {
            let mut r = BufReader::new(File::open(path)?);
            rows = read_row_count(&mut r)?;
            for column in store.columns() {
                let header = read_column_header(&mut r)?;
                check_schema(&header, column.name(), column.element_type())?;
                let offset = r.stream_position()?;
                extents.push((offset, header.payload_len as u64));
                r.seek_relative(header.payload_len)?;
            }
            // The metadata pass must be able to reach the end of the last
            // payload; a short file fails here rather than mid-read.
            let end = r.seek(SeekFrom::End(0))?;
            if let Some(&(offset, len)) = extents.last() {
                match offset.checked_add(len) {
                    Some(tail) if tail <= end => {}
                    _ => {
                        return Err(StoreError::Corrupt(
                            "file truncated inside the last column payload".to_owned(),
                        ))
                    }
                }
            }
        }

        let ncols = extents.len();
        if ncols > 0 {
            let workers = workers.get().min(ncols);
            let chunk = ncols.div_ceil(workers);
            let columns = store.columns_mut();
            log::debug!("parallel load: {rows} rows, {ncols} columns, {workers} workers");

            std::thread::scope(|scope| -> Result<()> {
                let mut handles = Vec::with_capacity(workers);
                for (cols, exts) in columns.chunks_mut(chunk).zip(extents.chunks(chunk)) {
                    handles.push(scope.spawn(move || -> Result<()> {
                        let file = File::open(path)?;
                        for (column, &(offset, len)) in cols.iter_mut().zip(exts) {
                            let mut section = &file;
                            section.seek(SeekFrom::Start(offset))?;
                            let mut reader = BufReader::new(section.take(len));
                            column.read_payload(rows, &mut reader)?;
                        }
                        Ok(())
                    }));
                }
                for handle in handles {
                    match handle.join() {
                        Ok(result) => result?,
                        Err(panic) => std::panic::resume_unwind(panic),
                    }
                }
                Ok(())
            })?;
        }

        store.set_rows(rows);
        Ok(store)
    }
}

fn check_schema(header: &ColumnHeader, name: &str, element_type: ElementType) -> Result<()> {
    if header.name != name {
        return Err(StoreError::Corrupt(format!(
            "file column `{}` does not match record shape column `{name}`",
            header.name
        )));
    }
    if header.element_type != element_type {
        return Err(StoreError::Corrupt(format!(
            "column `{name}`: file holds {}, record shape declares {element_type}",
            header.element_type
        )));
    }
    Ok(())
}
