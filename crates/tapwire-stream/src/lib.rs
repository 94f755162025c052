//! Stream unwrapping: resolve a possibly-decorated input stream to the
//! innermost transport-level stream that identifies a physical connection.

pub mod resolve;
pub mod stream;

pub use resolve::{StreamResolver, UnwrapError, DEFAULT_MAX_UNWRAP_DEPTH};
pub use stream::{ConnStream, StreamId};
