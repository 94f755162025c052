//! The process-wide injector table.
//!
//! One primary store keyed by socket identity, plus two derived indexes
//! (base-stream identity, remote address). All three are updated together
//! inside one critical section, and the overwrite notification fires inside
//! that same critical section, so no thread can observe a table entry whose
//! previous owner has not been told about its replacement.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tapwire_stream::{ConnStream, StreamId, StreamResolver, UnwrapError};

use crate::handle::{SocketId, TransportHandle};
use crate::injector::Injector;
use crate::report::{ErrorReporter, TracingReporter};

/// Notified when a socket's bound injector is replaced by a different one.
///
/// Called synchronously inside the registry's critical section, so the
/// table entry and the owner's notification are observed together.
/// Implementations must not call back into the registry.
pub trait ReplaceListener: Send + Sync {
    /// `previous` has been superseded by `current` on the same socket.
    fn injector_replaced(&self, previous: &Arc<dyn Injector>, current: &Arc<dyn Injector>);
}

/// Default listener: repoints the previous owner's session at the new
/// injector, so no session is left holding a stale reference.
pub struct SessionSlotListener;

impl ReplaceListener for SessionSlotListener {
    fn injector_replaced(&self, previous: &Arc<dyn Injector>, current: &Arc<dyn Injector>) {
        if let Some(session) = previous.owner_session()
            && let Some(slot) = session.injector_slot()
        {
            slot.set_injector(Arc::clone(current));
        }
    }
}

struct Entry {
    handle: TransportHandle,
    injector: Arc<dyn Injector>,
}

#[derive(Default)]
struct RegistryState {
    by_socket: HashMap<SocketId, Entry>,
    by_stream: HashMap<StreamId, SocketId>,
    by_address: HashMap<SocketAddr, SocketId>,
}

/// Authoritative map from transport identities to injectors.
///
/// Lives for the server run; shared across connection-handling threads.
/// Lookups that find nothing return `None` — that is a normal outcome, not
/// an error. Only structural stream-unwrap failures surface as errors.
pub struct InjectorRegistry {
    resolver: Arc<StreamResolver>,
    reporter: Arc<dyn ErrorReporter>,
    listener: Arc<dyn ReplaceListener>,
    state: Mutex<RegistryState>,
}

impl InjectorRegistry {
    /// Create a registry with the default reporter and replace listener.
    pub fn new(resolver: Arc<StreamResolver>) -> Self {
        Self {
            resolver,
            reporter: Arc::new(TracingReporter),
            listener: Arc::new(SessionSlotListener),
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Replace the failure reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replace the overwrite-notification listener.
    pub fn with_listener(mut self, listener: Arc<dyn ReplaceListener>) -> Self {
        self.listener = listener;
        self
    }

    /// The resolver this registry canonicalizes streams with.
    pub fn resolver(&self) -> &Arc<StreamResolver> {
        &self.resolver
    }

    /// Look up the injector owning a possibly-decorated stream.
    ///
    /// Unwraps the stream first; unwrap failures are reported once and
    /// returned, never swallowed. `Ok(None)` means no binding exists.
    pub fn lookup_by_stream(
        &self,
        stream: &Arc<dyn ConnStream>,
    ) -> Result<Option<Arc<dyn Injector>>, UnwrapError> {
        let base = match self.resolver.resolve_base_stream(stream) {
            Ok(base) => base,
            Err(err) => {
                self.reporter.report("lookup_by_stream", &err);
                return Err(err);
            }
        };
        Ok(self.lookup_by_stream_id(StreamId::of(&base)))
    }

    /// Look up by an already-canonical base-stream identity.
    pub fn lookup_by_stream_id(&self, stream: StreamId) -> Option<Arc<dyn Injector>> {
        let state = self.state.lock().unwrap();
        let socket = state.by_stream.get(&stream)?;
        state
            .by_socket
            .get(socket)
            .map(|entry| Arc::clone(&entry.injector))
    }

    /// Look up by socket identity.
    pub fn lookup_by_socket(&self, socket: SocketId) -> Option<Arc<dyn Injector>> {
        let state = self.state.lock().unwrap();
        state
            .by_socket
            .get(&socket)
            .map(|entry| Arc::clone(&entry.injector))
    }

    /// Look up by remote address. Best-effort: when several sockets have
    /// carried the same address (reconnects), the most recently bound wins.
    pub fn lookup_by_address(&self, address: SocketAddr) -> Option<Arc<dyn Injector>> {
        let state = self.state.lock().unwrap();
        let socket = state.by_address.get(&address)?;
        state
            .by_socket
            .get(socket)
            .map(|entry| Arc::clone(&entry.injector))
    }

    /// Associate `injector` with the connection described by `handle`.
    ///
    /// Rebinding the identical injector is a no-op. Binding a different
    /// injector over an existing one notifies the replace listener with
    /// `(previous, new)` before the rebind completes, inside the same
    /// critical section that swaps the table entry.
    pub fn bind(&self, handle: TransportHandle, injector: Arc<dyn Injector>) {
        let mut state = self.state.lock().unwrap();

        if let Some(previous) = state.by_socket.remove(&handle.socket) {
            if Arc::ptr_eq(&previous.injector, &injector) {
                // Idempotent rebind: restore untouched, no notification.
                state.by_socket.insert(handle.socket, previous);
                return;
            }

            tracing::debug!(socket = handle.socket.0, "injector superseded");
            self.listener
                .injector_replaced(&previous.injector, &injector);

            // Drop index entries from the superseded handle so the derived
            // indexes never diverge from the primary store.
            if previous.handle.stream != handle.stream {
                state.by_stream.remove(&previous.handle.stream);
            }
            if previous.handle.address != handle.address
                && state.by_address.get(&previous.handle.address) == Some(&handle.socket)
            {
                state.by_address.remove(&previous.handle.address);
            }
        }

        state.by_stream.insert(handle.stream, handle.socket);
        state.by_address.insert(handle.address, handle.socket);
        state.by_socket.insert(handle.socket, Entry { handle, injector });
    }

    /// Remove the binding for `socket`, if any. Idempotent.
    pub fn unbind(&self, socket: SocketId) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.by_socket.remove(&socket) {
            state.by_stream.remove(&entry.handle.stream);
            // A newer socket may have taken over this address.
            if state.by_address.get(&entry.handle.address) == Some(&socket) {
                state.by_address.remove(&entry.handle.address);
            }
        }
    }

    /// Atomically drop every binding.
    ///
    /// Safe mid-flight: injectors are shared, so references fetched before
    /// the teardown stay valid; subsequent lookups simply find nothing.
    pub fn teardown_all(&self) {
        let mut state = self.state.lock().unwrap();
        let dropped = state.by_socket.len();
        state.by_socket.clear();
        state.by_stream.clear();
        state.by_address.clear();
        drop(state);
        tracing::info!(dropped, "injector registry torn down");
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().by_socket.len()
    }

    /// Whether the registry holds no bindings.
    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().by_socket.is_empty()
    }
}
