//! The accept loop that attaches the interception layer to a TCP listener.

use std::any::Any;
use std::net::{AddrParseError, SocketAddr};
use std::sync::{Arc, Mutex};

use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::watch;

use tapwire_config::Config;
use tapwire_registry::{
    InjectionPoint, InjectorRegistry, SocketIdGenerator, TransportHandle,
};
use tapwire_stream::ConnStream;

use crate::conn::{InjectorFactory, TcpReadStream};

/// Configuration for [`ServerTap`].
pub struct ServerConfig {
    /// Address to bind to. Default: `0.0.0.0:7777`.
    pub bind_addr: SocketAddr,
    /// Maximum concurrently intercepted connections. Default: 256.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7777".parse().unwrap(),
            max_connections: 256,
        }
    }
}

impl ServerConfig {
    /// Build from the loaded configuration file.
    pub fn from_config(config: &Config) -> Result<Self, AddrParseError> {
        let bind_addr = format!(
            "{}:{}",
            config.network.bind_address, config.network.bind_port
        )
        .parse()?;
        Ok(Self {
            bind_addr,
            max_connections: config.network.max_connections as usize,
        })
    }
}

/// TCP interception tap: accepts connections, binds an injector for each,
/// and unbinds it when the connection closes.
pub struct ServerTap {
    config: ServerConfig,
    registry: Arc<InjectorRegistry>,
    factory: Arc<dyn InjectorFactory>,
    id_gen: Arc<SocketIdGenerator>,
    injected: Mutex<Option<Arc<TcpListener>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ServerTap {
    /// Create a tap over the given registry.
    pub fn new(
        config: ServerConfig,
        registry: Arc<InjectorRegistry>,
        factory: Arc<dyn InjectorFactory>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            registry,
            factory,
            id_gen: Arc::new(SocketIdGenerator::new()),
            injected: Mutex::new(None),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// The registry this tap feeds.
    pub fn registry(&self) -> &Arc<InjectorRegistry> {
        &self.registry
    }

    /// Run the accept loop on the injected listener, or bind one from the
    /// configuration.
    pub async fn run(&self) -> std::io::Result<()> {
        let injected = self.injected.lock().unwrap().take();
        let listener = match injected {
            Some(listener) => listener,
            None => Arc::new(TcpListener::bind(self.config.bind_addr).await?),
        };
        tracing::info!("Interception tap listening on {}", listener.local_addr()?);
        self.run_with_listener(listener).await
    }

    /// Run the accept loop with a pre-bound listener (useful for tests).
    pub async fn run_with_listener(&self, listener: Arc<TcpListener>) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer_addr) = result?;
                    stream.set_nodelay(true)?;

                    if self.registry.len() >= self.config.max_connections {
                        tracing::warn!("Connection limit reached, rejecting {peer_addr}");
                        continue;
                    }

                    let socket = self.id_gen.next_id();
                    let (reader, writer) = stream.into_split();
                    let read_stream = Arc::new(TcpReadStream::new(reader));
                    let conn_stream: Arc<dyn ConnStream> = read_stream.clone();

                    let handle = match TransportHandle::resolve(
                        socket,
                        peer_addr,
                        &conn_stream,
                        self.registry.resolver(),
                    ) {
                        Ok(handle) => handle,
                        Err(err) => {
                            // Denied interception for this one connection;
                            // the connection itself is simply dropped.
                            tracing::warn!(%peer_addr, error = %err, "cannot resolve transport handle");
                            continue;
                        }
                    };

                    let injector = self.factory.create(handle);
                    self.registry.bind(handle, injector);
                    tracing::info!("Bound injector for {socket:?} from {peer_addr}");

                    let registry = Arc::clone(&self.registry);
                    let mut task_shutdown = self.shutdown_rx.clone();

                    tokio::spawn(async move {
                        Self::drive_connection(handle, &read_stream, writer, &registry, &mut task_shutdown)
                            .await;
                        // Unbind before the stream object is dropped so its
                        // identity cannot be reused while still indexed.
                        registry.unbind(handle.socket);
                        tracing::info!("Connection {:?} closed", handle.socket);
                        drop(read_stream);
                    });
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Interception tap shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Signal the tap to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Per-connection reader loop. Exits on EOF, read error, or shutdown.
    async fn drive_connection(
        handle: TransportHandle,
        stream: &Arc<TcpReadStream>,
        _writer: OwnedWriteHalf,
        registry: &InjectorRegistry,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        let Some(mut reader) = stream.take_reader() else {
            return;
        };
        let mut buf = [0u8; 4096];
        loop {
            tokio::select! {
                result = reader.read(&mut buf) => {
                    match result {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            // Re-fetch per read: the bound injector may have
                            // been swapped since the last one.
                            if registry.lookup_by_stream_id(handle.stream).is_some() {
                                tracing::trace!("Connection {:?} received {n} bytes", handle.socket);
                            }
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

impl InjectionPoint for ServerTap {
    fn inject(&self, container: &dyn Any) {
        match container.downcast_ref::<Arc<TcpListener>>() {
            Some(listener) => {
                *self.injected.lock().unwrap() = Some(Arc::clone(listener));
                tracing::debug!("listener injected");
            }
            None => tracing::warn!("inject: container is not a TCP listener"),
        }
    }

    fn post_world_loaded(&self) {
        tracing::debug!("world loaded, interception active");
    }

    fn cleanup_all(&self) {
        self.registry.teardown_all();
        self.shutdown();
    }
}
