#![forbid(unsafe_code)]

use crate::error::{Result, StoreError};
use crate::types::{ElementType, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Typed getter half of a field accessor.
pub enum FieldGet<R> {
    Byte(Box<dyn Fn(&R) -> u8>),
    Short(Box<dyn Fn(&R) -> i16>),
    Int(Box<dyn Fn(&R) -> i32>),
    Long(Box<dyn Fn(&R) -> i64>),
    Str(Box<dyn Fn(&R) -> Option<Arc<str>>>),
}

/// Typed setter half of a field accessor.
pub enum FieldSet<R> {
    Byte(Box<dyn Fn(&mut R, u8)>),
    Short(Box<dyn Fn(&mut R, i16)>),
    Int(Box<dyn Fn(&mut R, i32)>),
    Long(Box<dyn Fn(&mut R, i64)>),
    Str(Box<dyn Fn(&mut R, Option<Arc<str>>)>),
}

/// One named field of a record shape: a typed get/set capability pair.
///
/// The typed constructors are the only way to build a spec, so the getter and
/// setter kinds always agree; mismatches are unrepresentable rather than
/// checked at runtime.
pub struct FieldSpec<R> {
    name: String,
    get: FieldGet<R>,
    set: FieldSet<R>,
}

impl<R> FieldSpec<R> {
    pub fn byte(
        name: impl Into<String>,
        get: impl Fn(&R) -> u8 + 'static,
        set: impl Fn(&mut R, u8) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            get: FieldGet::Byte(Box::new(get)),
            set: FieldSet::Byte(Box::new(set)),
        }
    }

    pub fn short(
        name: impl Into<String>,
        get: impl Fn(&R) -> i16 + 'static,
        set: impl Fn(&mut R, i16) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            get: FieldGet::Short(Box::new(get)),
            set: FieldSet::Short(Box::new(set)),
        }
    }

    pub fn int(
        name: impl Into<String>,
        get: impl Fn(&R) -> i32 + 'static,
        set: impl Fn(&mut R, i32) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            get: FieldGet::Int(Box::new(get)),
            set: FieldSet::Int(Box::new(set)),
        }
    }

    pub fn long(
        name: impl Into<String>,
        get: impl Fn(&R) -> i64 + 'static,
        set: impl Fn(&mut R, i64) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            get: FieldGet::Long(Box::new(get)),
            set: FieldSet::Long(Box::new(set)),
        }
    }

    pub fn str(
        name: impl Into<String>,
        get: impl Fn(&R) -> Option<Arc<str>> + 'static,
        set: impl Fn(&mut R, Option<Arc<str>>) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            get: FieldGet::Str(Box::new(get)),
            set: FieldSet::Str(Box::new(set)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element_type(&self) -> ElementType {
        match &self.get {
            FieldGet::Byte(_) => ElementType::Byte,
            FieldGet::Short(_) => ElementType::Short,
            FieldGet::Int(_) => ElementType::Int,
            FieldGet::Long(_) => ElementType::Long,
            FieldGet::Str(_) => ElementType::Str,
        }
    }

    /// Read the field from a record instance.
    pub(crate) fn read(&self, record: &R) -> Value {
        match &self.get {
            FieldGet::Byte(f) => Value::Byte(f(record)),
            FieldGet::Short(f) => Value::Short(f(record)),
            FieldGet::Int(f) => Value::Int(f(record)),
            FieldGet::Long(f) => Value::Long(f(record)),
            FieldGet::Str(f) => match f(record) {
                Some(s) => Value::Str(s),
                None => Value::Null,
            },
        }
    }

    /// Write a value into a record instance; the value's kind must match.
    pub(crate) fn write(&self, record: &mut R, value: Value) -> Result<()> {
        match (&self.set, value) {
            (FieldSet::Byte(f), Value::Byte(x)) => f(record, x),
            (FieldSet::Short(f), Value::Short(x)) => f(record, x),
            (FieldSet::Int(f), Value::Int(x)) => f(record, x),
            (FieldSet::Long(f), Value::Long(x)) => f(record, x),
            (FieldSet::Str(f), Value::Str(s)) => f(record, Some(s)),
            (FieldSet::Str(f), Value::Null) => f(record, None),
            (_, value) => {
                return Err(StoreError::FieldTypeMismatch {
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
}

/// A record shape: the fixed set of named, typed fields a record exposes.
///
/// Implementations list their fields once; the store derives its columns from
/// them and never inspects a record any other way.
pub trait Record: Default + 'static {
    fn fields() -> Vec<FieldSpec<Self>>
    where
        Self: Sized;
}

/// One-time-built table mapping field names to typed get/set capability.
///
/// Resolved at store construction, then invoked many times through direct
/// closure calls; ingestion and reconstruction pay no per-record lookup.
pub struct AccessorTable<R> {
    fields: Vec<FieldSpec<R>>,
    index: HashMap<String, usize>,
}

impl<R: Record> AccessorTable<R> {
    pub fn for_record() -> Result<Self> {
        let fields = R::fields();
        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if index.insert(field.name().to_owned(), i).is_some() {
                return Err(StoreError::DuplicateField(field.name().to_owned()));
            }
        }
        Ok(Self { fields, index })
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec<R>] {
        &self.fields
    }

    /// Lookup by name; unknown names are a configuration error, never a
    /// silent default.
    pub fn field(&self, name: &str) -> Result<&FieldSpec<R>> {
        self.index
            .get(name)
            .map(|&i| &self.fields[i])
            .ok_or_else(|| StoreError::UnknownField(name.to_owned()))
    }
}
