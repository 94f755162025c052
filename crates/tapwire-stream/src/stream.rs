//! Stream objects and their identity.
//!
//! The interception layer never constructs or owns the streams the host's
//! I/O stack reads from; it only needs to tell them apart. [`ConnStream`] is
//! the minimal capability a stream object must expose, and [`StreamId`] is
//! the reference identity the registry keys on.

use std::any::Any;
use std::sync::Arc;

/// An input stream object belonging to the host transport layer.
///
/// Streams are identity-compared, never value-compared: two streams are the
/// same connection if and only if they are the same object. Implementors
/// only have to surface themselves as [`Any`] so the resolver can recognize
/// concrete decorator types.
pub trait ConnStream: Any + Send + Sync {
    /// The concrete object, for decorator-type recognition.
    fn as_any(&self) -> &dyn Any;
}

/// Reference identity of a stream object.
///
/// Derived from the `Arc` allocation's address, so it is stable for the
/// stream's lifetime and distinct across live streams. It must not be held
/// after the stream is dropped (a later allocation could reuse the address);
/// the registry removes stream ids together with their binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(usize);

impl StreamId {
    /// The identity of the given stream object.
    pub fn of(stream: &Arc<dyn ConnStream>) -> Self {
        Self(Arc::as_ptr(stream) as *const () as usize)
    }
}
