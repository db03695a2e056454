//! Connector Server
//!
//! - `service`: the three RPCs over the data source collection
//! - `validate`: request validation
//! - `frame`: length-prefixed checksummed frames for streamed responses
//! - `http`: axum transport
//! - `errors`: server lifecycle errors

mod errors;
pub mod frame;
mod http;
mod service;
pub mod validate;

pub use errors::{ServerError, ServerResult};
pub use frame::{decode_frame, decode_frames, encode_frame, FrameError, FrameResult};
pub use http::{build_router, HealthResponse, HttpServer, FRAMED_CONTENT_TYPE};
pub use service::ConnectorService;
