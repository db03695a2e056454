//! Streamers
//!
//! Bridge a data source producing into a sink and the outbound response
//! stream of an RPC.
//!
//! - `read_splits`: one split read, page by page
//! - `list_splits`: split candidates of one select
//!
//! Logical failures travel in-band as the error envelope of a final
//! response. A streamer returns `Err` only when the outbound stream itself
//! is gone; such transport failures are reported out of band.

mod list_splits;
mod read_splits;

pub use list_splits::{ListSplitsStreamer, ListingOutcome};
pub use read_splits::{ReadSplitStreamer, SplitOutcome};
