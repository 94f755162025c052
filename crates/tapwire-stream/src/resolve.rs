//! Base-stream resolution through chains of decorating streams.
//!
//! Hosts wrap an accepted connection's input stream in filtering decorators
//! (buffering, decompression, counting). The [`StreamResolver`] walks such a
//! chain down to the innermost stream, which is the one identity that all
//! lookups agree on. The accessor for each decorator type is registered once
//! at construction and reused for every resolution.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::stream::ConnStream;

/// Unwrap depth past which a chain is treated as cyclic.
pub const DEFAULT_MAX_UNWRAP_DEPTH: usize = 64;

/// Errors from base-stream resolution.
///
/// Both variants are structural failures: the resolver can no longer
/// correlate connections, and retrying without re-initialization cannot
/// succeed. A missing registry entry is NOT an error and never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum UnwrapError {
    /// A registered accessor no longer matches the object it was registered
    /// for. The environment changed shape underneath us.
    #[error("cannot access the stream wrapped by `{wrapper}`")]
    AccessFailure {
        /// Type name of the decorator whose accessor failed.
        wrapper: &'static str,
    },

    /// The chain did not bottom out within the depth guard.
    #[error("stream still wrapped after {max_depth} unwrap steps (cyclic wrapping?)")]
    DepthExceeded {
        /// The configured guard that was exceeded.
        max_depth: usize,
    },
}

type AccessFn = Box<dyn Fn(&dyn Any) -> Result<Arc<dyn ConnStream>, UnwrapError> + Send + Sync>;

/// Resolves a possibly-decorated stream to its innermost base stream.
///
/// One resolver is built per process, its accessor table populated once with
/// every decorator type the host's I/O stack uses, then shared behind an
/// `Arc`. Resolution itself is pure: no locking, no state beyond the
/// immutable table.
pub struct StreamResolver {
    accessors: HashMap<TypeId, AccessFn>,
    max_depth: usize,
}

impl StreamResolver {
    /// Create a resolver with the default depth guard and no known decorators.
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_UNWRAP_DEPTH)
    }

    /// Create a resolver with an explicit depth guard.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            accessors: HashMap::new(),
            max_depth,
        }
    }

    /// Register the accessor for one decorator type.
    ///
    /// `access` returns the stream that a `W` wraps. Streams whose concrete
    /// type has no registered accessor are treated as base streams.
    pub fn register<W: ConnStream>(&mut self, access: fn(&W) -> Arc<dyn ConnStream>) {
        self.accessors.insert(
            TypeId::of::<W>(),
            Box::new(move |any| {
                let wrapper = any.downcast_ref::<W>().ok_or(UnwrapError::AccessFailure {
                    wrapper: std::any::type_name::<W>(),
                })?;
                Ok(access(wrapper))
            }),
        );
    }

    /// Number of decorator types this resolver knows how to unwrap.
    pub fn known_wrappers(&self) -> usize {
        self.accessors.len()
    }

    /// Resolve `stream` to the innermost stream in its decorator chain.
    ///
    /// Performs exactly one unwrap step per decorator layer; a stream that is
    /// already a base stream is returned as-is. Fails with
    /// [`UnwrapError::DepthExceeded`] if the chain does not bottom out within
    /// the depth guard.
    pub fn resolve_base_stream(
        &self,
        stream: &Arc<dyn ConnStream>,
    ) -> Result<Arc<dyn ConnStream>, UnwrapError> {
        let mut current = Arc::clone(stream);

        for depth in 0..=self.max_depth {
            match self.accessors.get(&current.as_any().type_id()) {
                None => {
                    tracing::trace!(depth, "resolved base stream");
                    return Ok(current);
                }
                Some(access) => current = access(current.as_any())?,
            }
        }

        Err(UnwrapError::DepthExceeded {
            max_depth: self.max_depth,
        })
    }
}

impl Default for StreamResolver {
    fn default() -> Self {
        Self::new()
    }
}
