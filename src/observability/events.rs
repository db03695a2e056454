//! Observable connector events
//!
//! Events are explicit and typed; request-level begin/complete pairs are
//! emitted by `ObservationScope` under the RPC name instead.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    BootStart,
    BootComplete,
    BootFailed,
    Serving,
    ShutdownStart,
    ShutdownComplete,

    // Configuration
    ConfigLoaded,
    CatalogLoaded,
    DataSourceRegistered,

    // Reading
    SplitReadBegin,
    SplitReadComplete,
    SplitReadFailed,
    PageSent,
    StreamCancelled,
    ReadLimitEnabled,
    ReadLimitExceeded,

    // Planning
    SplitListed,
    SplitListFailed,
    PushdownDropped,
    PushdownRejected,

    // Transport
    FrameRejected,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "FQ_CONNECTOR_STARTUP_BEGIN",
            Event::BootComplete => "FQ_CONNECTOR_STARTUP_COMPLETE",
            Event::BootFailed => "FQ_CONNECTOR_STARTUP_FAILED",
            Event::Serving => "FQ_CONNECTOR_SERVING",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",

            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CatalogLoaded => "CATALOG_LOADED",
            Event::DataSourceRegistered => "DATA_SOURCE_REGISTERED",

            Event::SplitReadBegin => "SPLIT_READ_BEGIN",
            Event::SplitReadComplete => "SPLIT_READ_COMPLETE",
            Event::SplitReadFailed => "SPLIT_READ_FAILED",
            Event::PageSent => "PAGE_SENT",
            Event::StreamCancelled => "STREAM_CANCELLED",
            Event::ReadLimitEnabled => "READ_LIMIT_ENABLED",
            Event::ReadLimitExceeded => "READ_LIMIT_EXCEEDED",

            Event::SplitListed => "SPLIT_LISTED",
            Event::SplitListFailed => "SPLIT_LIST_FAILED",
            Event::PushdownDropped => "PUSHDOWN_DROPPED",
            Event::PushdownRejected => "PUSHDOWN_REJECTED",

            Event::FrameRejected => "FRAME_REJECTED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::BootFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
