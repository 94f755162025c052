//! Cross-module behavior of the injector registry: the session slot update
//! on overwrite, the full connection lifecycle, and concurrent access.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;

use tapwire_registry::{
    ErrorReporter, Injector, InjectorRegistry, InjectorSlot, SessionHandle, SocketId,
    TransportHandle,
};
use tapwire_stream::{ConnStream, StreamResolver};

struct BaseStream;

impl ConnStream for BaseStream {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct FilterStream {
    inner: Arc<dyn ConnStream>,
}

impl ConnStream for FilterStream {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Session that keeps an outward injector reference, like a live player.
struct SlottedSession {
    slot: RecordingSlot,
}

struct RecordingSlot {
    current: Mutex<Option<Arc<dyn Injector>>>,
    set_count: Mutex<usize>,
}

impl SessionHandle for SlottedSession {
    fn injector_slot(&self) -> Option<&dyn InjectorSlot> {
        Some(&self.slot)
    }
}

impl InjectorSlot for RecordingSlot {
    fn set_injector(&self, current: Arc<dyn Injector>) {
        *self.current.lock().unwrap() = Some(current);
        *self.set_count.lock().unwrap() += 1;
    }
}

struct SessionInjector {
    session: Arc<SlottedSession>,
}

impl Injector for SessionInjector {
    fn owner_session(&self) -> Option<Arc<dyn SessionHandle>> {
        Some(Arc::clone(&self.session) as Arc<dyn SessionHandle>)
    }
}

/// Injector with no session attached yet (pre-login connection).
struct DetachedInjector;

impl Injector for DetachedInjector {
    fn owner_session(&self) -> Option<Arc<dyn SessionHandle>> {
        None
    }
}

fn registry() -> InjectorRegistry {
    let mut resolver = StreamResolver::new();
    resolver.register::<FilterStream>(|f| Arc::clone(&f.inner));
    InjectorRegistry::new(Arc::new(resolver))
}

fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

/// Build a handle for a fresh base stream, returning the stream too: a
/// pointer-derived `StreamId` is only valid while its stream is alive, so
/// the caller must hold the `Arc` for the binding's lifetime.
fn handle(
    registry: &InjectorRegistry,
    socket: u64,
    port: u16,
) -> (TransportHandle, Arc<dyn ConnStream>) {
    let stream: Arc<dyn ConnStream> = Arc::new(BaseStream);
    let handle =
        TransportHandle::resolve(SocketId(socket), addr(port), &stream, registry.resolver())
            .unwrap();
    (handle, stream)
}

#[test]
fn test_overwrite_repoints_previous_owner_session() {
    let registry = registry();
    let session = Arc::new(SlottedSession {
        slot: RecordingSlot {
            current: Mutex::new(None),
            set_count: Mutex::new(0),
        },
    });
    let i1: Arc<dyn Injector> = Arc::new(SessionInjector {
        session: Arc::clone(&session),
    });
    let i2: Arc<dyn Injector> = Arc::new(DetachedInjector);

    let (h, _stream) = handle(&registry, 1, 54321);
    registry.bind(h, i1);
    registry.bind(h, Arc::clone(&i2));

    // The session that owned i1 now points at i2, set exactly once.
    let held = session.slot.current.lock().unwrap();
    assert!(Arc::ptr_eq(held.as_ref().unwrap(), &i2));
    assert_eq!(*session.slot.set_count.lock().unwrap(), 1);
}

#[test]
fn test_overwrite_with_sessionless_previous_owner_is_harmless() {
    let registry = registry();
    let (h, _stream) = handle(&registry, 1, 54321);
    registry.bind(h, Arc::new(DetachedInjector));
    registry.bind(h, Arc::new(DetachedInjector));

    assert!(registry.lookup_by_socket(SocketId(1)).is_some());
}

#[test]
fn test_full_connection_lifecycle() {
    // The end-to-end scenario: bind, look up by every facet, supersede,
    // observe the owner update, tear down, observe the miss.
    let registry = registry();
    let base: Arc<dyn ConnStream> = Arc::new(BaseStream);
    let wrapped: Arc<dyn ConnStream> = Arc::new(FilterStream {
        inner: Arc::new(FilterStream {
            inner: Arc::clone(&base),
        }),
    });
    let peer = addr(54321);
    let h =
        TransportHandle::resolve(SocketId(1), peer, &wrapped, registry.resolver()).unwrap();

    let session = Arc::new(SlottedSession {
        slot: RecordingSlot {
            current: Mutex::new(None),
            set_count: Mutex::new(0),
        },
    });
    let i1: Arc<dyn Injector> = Arc::new(SessionInjector {
        session: Arc::clone(&session),
    });
    registry.bind(h, Arc::clone(&i1));

    let by_addr = registry.lookup_by_address(peer).unwrap();
    assert!(Arc::ptr_eq(&by_addr, &i1));
    let by_wrapped = registry.lookup_by_stream(&wrapped).unwrap().unwrap();
    assert!(Arc::ptr_eq(&by_wrapped, &i1));

    // Connection stage change: the host swaps in a new injector.
    let i2: Arc<dyn Injector> = Arc::new(DetachedInjector);
    registry.bind(h, Arc::clone(&i2));

    assert_eq!(*session.slot.set_count.lock().unwrap(), 1);
    let by_socket = registry.lookup_by_socket(SocketId(1)).unwrap();
    assert!(Arc::ptr_eq(&by_socket, &i2));

    registry.teardown_all();
    assert!(registry.lookup_by_socket(SocketId(1)).is_none());
    assert!(registry.lookup_by_address(peer).is_none());
    assert!(registry.lookup_by_stream(&wrapped).unwrap().is_none());
}

#[test]
fn test_concurrent_binds_to_distinct_sockets_never_interfere() {
    let registry = Arc::new(registry());
    let threads: u64 = 8;
    let binds_per_thread: u64 = 50;

    let mut joins = Vec::new();
    for t in 0..threads {
        let registry = Arc::clone(&registry);
        joins.push(thread::spawn(move || {
            // Streams must outlive their bindings, which live past this
            // thread; hand them back for the main thread to hold.
            let mut streams = Vec::new();
            for n in 0..binds_per_thread {
                let socket = t * binds_per_thread + n + 1;
                let (h, stream) = handle(&registry, socket, socket as u16);
                registry.bind(h, Arc::new(DetachedInjector));
                assert!(registry.lookup_by_socket(SocketId(socket)).is_some());
                streams.push(stream);
            }
            streams
        }));
    }
    let mut streams = Vec::new();
    for join in joins {
        streams.extend(join.join().unwrap());
    }

    assert_eq!(registry.len(), (threads * binds_per_thread) as usize);
    for socket in 1..=threads * binds_per_thread {
        assert!(
            registry.lookup_by_socket(SocketId(socket)).is_some(),
            "socket {socket} lost its binding"
        );
    }
}

#[test]
fn test_concurrent_lookups_during_teardown() {
    let registry = Arc::new(registry());
    let mut streams = Vec::new();
    for socket in 1..=64u64 {
        let (h, stream) = handle(&registry, socket, socket as u16);
        registry.bind(h, Arc::new(DetachedInjector));
        streams.push(stream);
    }

    let reader = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            // Lookups racing a teardown either hit or miss; they never panic
            // and never return a torn result.
            for socket in 1..=64u64 {
                let _ = registry.lookup_by_socket(SocketId(socket));
            }
        })
    };
    registry.teardown_all();
    reader.join().unwrap();

    assert!(registry.is_empty());
}

/// Reporter that captures failures for assertions.
struct CapturingReporter {
    reports: Mutex<Vec<String>>,
}

impl ErrorReporter for CapturingReporter {
    fn report(&self, context: &str, error: &(dyn std::error::Error + 'static)) {
        self.reports
            .lock()
            .unwrap()
            .push(format!("{context}: {error}"));
    }
}

#[test]
fn test_unwrap_failure_is_reported_once_and_returned() {
    let mut resolver = StreamResolver::with_max_depth(2);
    resolver.register::<FilterStream>(|f| Arc::clone(&f.inner));
    let reporter = Arc::new(CapturingReporter {
        reports: Mutex::new(Vec::new()),
    });
    let registry =
        InjectorRegistry::new(Arc::new(resolver)).with_reporter(reporter.clone());

    // A chain deeper than the guard trips the structural failure path.
    let mut stream: Arc<dyn ConnStream> = Arc::new(BaseStream);
    for _ in 0..5 {
        stream = Arc::new(FilterStream { inner: stream });
    }

    let result = registry.lookup_by_stream(&stream);
    assert!(result.is_err());

    // Reported exactly once, with the operation named.
    let reports = reporter.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("lookup_by_stream"));
}
