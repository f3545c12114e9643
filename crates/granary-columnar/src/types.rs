#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

/// Closed set of element kinds a column can hold.
///
/// Every site that needs type-specific behavior (serialization, comparison,
/// hashing) matches exhaustively on this tag, so adding a kind is a
/// compile-guided change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Byte,
    Short,
    Int,
    Long,
    Str,
}

impl ElementType {
    /// Stable on-disk type tag.
    pub(crate) fn tag(self) -> i32 {
        match self {
            ElementType::Byte => 0,
            ElementType::Short => 1,
            ElementType::Int => 2,
            ElementType::Long => 3,
            ElementType::Str => 4,
        }
    }

    pub(crate) fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(ElementType::Byte),
            1 => Some(ElementType::Short),
            2 => Some(ElementType::Int),
            3 => Some(ElementType::Long),
            4 => Some(ElementType::Str),
            _ => None,
        }
    }

    /// Encoded byte width of one value, `None` for variable-width strings.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ElementType::Byte => Some(1),
            ElementType::Short => Some(2),
            ElementType::Int => Some(4),
            ElementType::Long => Some(8),
            ElementType::Str => None,
        }
    }

    /// Whether values of this kind widen losslessly to `i64`.
    pub fn is_integer(self) -> bool {
        !matches!(self, ElementType::Str)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Byte => "byte",
            ElementType::Short => "short",
            ElementType::Int => "int",
            ElementType::Long => "long",
            ElementType::Str => "str",
        };
        f.write_str(name)
    }
}

/// A single cell value.
///
/// Strings are the only nullable kind; `Null` read from or written to a
/// numeric column is a type mismatch. The tag set contains no floats, so
/// `Value` derives `Hash`/`Eq` and can key grouping maps directly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Str(Arc<str>),
    Null,
}

impl Value {
    /// Element kind of this value, `None` for `Null`.
    pub fn element_type(&self) -> Option<ElementType> {
        match self {
            Value::Byte(_) => Some(ElementType::Byte),
            Value::Short(_) => Some(ElementType::Short),
            Value::Int(_) => Some(ElementType::Int),
            Value::Long(_) => Some(ElementType::Long),
            Value::Str(_) => Some(ElementType::Str),
            Value::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Null => f.write_str("null"),
        }
    }
}
