//! Per-connection transport objects and injector construction.

use std::any::Any;
use std::sync::{Arc, Mutex};

use tokio::net::tcp::OwnedReadHalf;

use tapwire_registry::{Injector, SessionHandle, TransportHandle};
use tapwire_stream::ConnStream;

/// The base input stream of one accepted TCP connection.
///
/// The `Arc` around this object is the connection's stream identity; the
/// reader task takes the read half out once and keeps the `Arc` alive until
/// the connection is unbound.
pub struct TcpReadStream {
    reader: Mutex<Option<OwnedReadHalf>>,
}

impl TcpReadStream {
    /// Wrap the read half of an accepted connection.
    pub fn new(reader: OwnedReadHalf) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
        }
    }

    /// Take the read half out. Returns `None` after the first call.
    pub fn take_reader(&self) -> Option<OwnedReadHalf> {
        self.reader.lock().unwrap().take()
    }
}

impl ConnStream for TcpReadStream {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Creates the injector bound to each freshly accepted connection.
pub trait InjectorFactory: Send + Sync {
    /// Build the injector for the connection described by `handle`.
    fn create(&self, handle: TransportHandle) -> Arc<dyn Injector>;
}

/// Injector for a connection that has not completed login yet.
///
/// No logical session owns it; the host rebinds a session-backed injector
/// once the connection advances past login, and the registry's overwrite
/// notification keeps any later owner consistent.
pub struct PendingInjector;

impl Injector for PendingInjector {
    fn owner_session(&self) -> Option<Arc<dyn SessionHandle>> {
        None
    }
}

/// Factory handing out a fresh [`PendingInjector`] per connection.
pub struct PendingInjectorFactory;

impl InjectorFactory for PendingInjectorFactory {
    fn create(&self, _handle: TransportHandle) -> Arc<dyn Injector> {
        Arc::new(PendingInjector)
    }
}
