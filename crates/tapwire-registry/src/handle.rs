//! Transport identities: sockets and the three-facet handle the registry
//! keys on.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tapwire_stream::{ConnStream, StreamId, StreamResolver, UnwrapError};

/// Stable identity of one accepted socket.
///
/// Assigned by the host when the connection is accepted; never reused within
/// a server run. The registry holds ids only, never the socket itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(pub u64);

/// Atomic generator for monotonically increasing [`SocketId`]s.
pub struct SocketIdGenerator {
    next: AtomicU64,
}

impl SocketIdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique [`SocketId`].
    pub fn next_id(&self) -> SocketId {
        SocketId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SocketIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// The three equivalent facets denoting one physical connection.
///
/// All three must resolve to the same injector. The `stream` facet is always
/// the base-stream identity; callers holding a decorated stream canonicalize
/// it through [`TransportHandle::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHandle {
    /// Socket identity, the canonical key.
    pub socket: SocketId,
    /// Base-stream identity.
    pub stream: StreamId,
    /// Remote address. Shared across reconnects from the same peer, so it is
    /// a best-effort key, not a strict one.
    pub address: SocketAddr,
}

impl TransportHandle {
    /// Build a handle from a possibly-decorated stream, canonicalizing the
    /// stream facet through `resolver`.
    pub fn resolve(
        socket: SocketId,
        address: SocketAddr,
        stream: &Arc<dyn ConnStream>,
        resolver: &StreamResolver,
    ) -> Result<Self, UnwrapError> {
        let base = resolver.resolve_base_stream(stream)?;
        Ok(Self {
            socket,
            stream: StreamId::of(&base),
            address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    struct BaseStream;

    impl ConnStream for BaseStream {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_socket_id_uniqueness() {
        let id_gen = SocketIdGenerator::new();
        let id1 = id_gen.next_id();
        let id2 = id_gen.next_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.0 + 1, id2.0);
    }

    #[test]
    fn test_resolve_canonicalizes_stream_facet() {
        let resolver = StreamResolver::new();
        let stream: Arc<dyn ConnStream> = Arc::new(BaseStream);
        let addr: SocketAddr = "127.0.0.1:54321".parse().unwrap();

        let handle = TransportHandle::resolve(SocketId(7), addr, &stream, &resolver).unwrap();
        assert_eq!(handle.socket, SocketId(7));
        assert_eq!(handle.stream, StreamId::of(&stream));
        assert_eq!(handle.address, addr);
    }
}
