//! Injector resolution registry: the authoritative map from transport
//! identities (stream, socket, remote address) to the per-connection
//! injector that intercepts traffic on that connection.
//!
//! The registry does not construct sockets, streams, or injectors, and it
//! never performs I/O. It answers one question — "which injector owns this
//! transport handle?" — and keeps the answer consistent while connections
//! are created, re-wrapped, superseded, and torn down concurrently.

pub mod handle;
pub mod injector;
pub mod lifecycle;
pub mod registry;
pub mod report;

pub use handle::{SocketId, SocketIdGenerator, TransportHandle};
pub use injector::{Injector, InjectorSlot, SessionHandle};
pub use lifecycle::InjectionPoint;
pub use registry::{InjectorRegistry, ReplaceListener, SessionSlotListener};
pub use report::{ErrorReporter, TracingReporter};
