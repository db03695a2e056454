//! Column schemas and wire types

use serde::{Deserialize, Serialize};

/// Primitive wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
    /// Arbitrary bytes
    String,
    /// UTF-8 text
    Utf8,
    Json,
    /// Days since the Unix epoch
    Date,
    /// Seconds since the Unix epoch
    Datetime,
    /// Microseconds since the Unix epoch
    Timestamp,
}

impl PrimitiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::Int8 => "int8",
            PrimitiveType::Uint8 => "uint8",
            PrimitiveType::Int16 => "int16",
            PrimitiveType::Uint16 => "uint16",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Uint32 => "uint32",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::Uint64 => "uint64",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::String => "string",
            PrimitiveType::Utf8 => "utf8",
            PrimitiveType::Json => "json",
            PrimitiveType::Date => "date",
            PrimitiveType::Datetime => "datetime",
            PrimitiveType::Timestamp => "timestamp",
        }
    }
}

/// A column type as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    Primitive(PrimitiveType),
    Optional(Box<WireType>),
    Tagged { tag: String, inner: Box<WireType> },
    Struct(Vec<Column>),
    Decimal { precision: u8, scale: u8 },
}

impl WireType {
    pub fn primitive(p: PrimitiveType) -> Self {
        WireType::Primitive(p)
    }

    pub fn optional(inner: WireType) -> Self {
        WireType::Optional(Box::new(inner))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, WireType::Optional(_))
    }

    /// Strips `Optional` and `Tagged` wrappers.
    pub fn base(&self) -> &WireType {
        match self {
            WireType::Optional(inner) => inner.base(),
            WireType::Tagged { inner, .. } => inner.base(),
            other => other,
        }
    }

    /// Primitive kind after unwrapping, if the base type is a primitive
    pub fn base_primitive(&self) -> Option<PrimitiveType> {
        match self.base() {
            WireType::Primitive(p) => Some(*p),
            _ => None,
        }
    }
}

impl std::fmt::Display for WireType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireType::Primitive(p) => write!(f, "{}", p.as_str()),
            WireType::Optional(inner) => write!(f, "optional<{}>", inner),
            WireType::Tagged { tag, inner } => write!(f, "tagged<{}, {}>", tag, inner),
            WireType::Struct(fields) => {
                write!(f, "struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.wire_type)?;
                }
                write!(f, ">")
            }
            WireType::Decimal { precision, scale } => {
                write!(f, "decimal({}, {})", precision, scale)
            }
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub wire_type: WireType,
}

impl Column {
    pub fn new(name: impl Into<String>, wire_type: WireType) -> Self {
        Self {
            name: name.into(),
            wire_type,
        }
    }
}

/// Ordered column layout of a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
