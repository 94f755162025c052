//! Host-side integration: a TCP accept loop that registers every accepted
//! connection with the injector registry and unregisters it on close.

pub mod conn;
pub mod tap;

pub use conn::{InjectorFactory, PendingInjector, PendingInjectorFactory, TcpReadStream};
pub use tap::{ServerConfig, ServerTap};
