//! Buffer Factory
//!
//! Resolves the requested columns and response format once per split read
//! and hands out buffers of the matching kind.

use arrow::datatypes::SchemaRef;

use super::columnar_buffer::{
    arrow_schema, ArrowBuffer, ColumnSetBuffer, ColumnarBuffer, EmptyColumnsBuffer, PhysicalType,
};
use crate::api::{Column, ConnectorError, ConnectorResult, Format};

pub struct ColumnarBufferFactory {
    format: Format,
    names: Vec<String>,
    physical: Vec<PhysicalType>,
    schema: SchemaRef,
}

impl ColumnarBufferFactory {
    /// Fails for unknown formats and for column types without a wire layout
    pub fn new(format: Format, columns: &[Column]) -> ConnectorResult<Self> {
        if format == Format::Unspecified {
            return Err(ConnectorError::invalid_request("response format is not specified"));
        }
        let physical = columns
            .iter()
            .map(|c| PhysicalType::of(&c.wire_type))
            .collect::<ConnectorResult<Vec<_>>>()?;

        Ok(Self {
            format,
            names: columns.iter().map(|c| c.name.clone()).collect(),
            physical,
            schema: arrow_schema(columns)?,
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn make_buffer(&self) -> Box<dyn ColumnarBuffer> {
        match self.format {
            Format::ColumnSet => Box::new(ColumnSetBuffer::new(
                self.names.clone(),
                self.physical.clone(),
            )),
            _ if self.physical.is_empty() => Box::new(EmptyColumnsBuffer::new()),
            _ => Box::new(ArrowBuffer::new(self.schema.clone(), self.physical.clone())),
        }
    }
}
