//! The injector capability and its session back-references.
//!
//! Injector construction and the actual traffic rewriting live elsewhere;
//! the registry only stores injectors and asks them which logical session
//! owns them. Injectors are identity-compared (`Arc::ptr_eq`), never
//! value-compared.

use std::sync::Arc;

/// A per-connection traffic interceptor, as seen by the registry.
pub trait Injector: Send + Sync {
    /// The logical session this injector serves, if one is attached yet.
    fn owner_session(&self) -> Option<Arc<dyn SessionHandle>>;
}

/// A logical session as seen by the registry.
///
/// Whether a session kind keeps an outward injector reference is decided at
/// session construction time, expressed as an optional capability rather
/// than a runtime type test.
pub trait SessionHandle: Send + Sync {
    /// The session's injector slot, if this session kind holds one.
    fn injector_slot(&self) -> Option<&dyn InjectorSlot>;
}

/// The writable injector reference a session exposes.
pub trait InjectorSlot: Send + Sync {
    /// Repoint the session at `current`.
    fn set_injector(&self, current: Arc<dyn Injector>);
}
