//! Paging
//!
//! Turns rows scanned from a backend into size-bounded columnar pages:
//! - Acceptors and row transformers bind backend values to wire values
//! - Columnar buffers accumulate one page in Arrow IPC or column-set form
//! - The traffic tracker decides page boundaries
//! - The read limiter caps rows per request
//! - The sink hands sealed pages to the response writer

mod acceptor;
mod buffer_factory;
mod columnar_buffer;
mod read_limiter;
mod row_transformer;
mod sink;
mod size;
mod traffic_tracker;
mod wire_value;

pub use acceptor::{Acceptor, NativeValue, ValueSize};
pub use buffer_factory::ColumnarBufferFactory;
pub use columnar_buffer::{
    arrow_schema, read_ipc_stream, write_ipc_stream, ArrowBuffer, ColumnSetBuffer, ColumnarBuffer,
    EmptyColumnsBuffer, PhysicalType,
};
pub use read_limiter::{ReadLimiter, ReadLimiterFactory};
pub use row_transformer::{appender, Appender, RowTransformer};
pub use sink::{sink_channel, Page, Sink, SinkEvent, SinkFactory, SinkReceiver, SinkState};
pub use size::RowSizeEstimator;
pub use traffic_tracker::TrafficTracker;
pub use wire_value::WireValue;
