//! Owns the registry and both listeners: starts them, waits for a shutdown
//! signal, then stops accepting and closes every live session.

use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;

use crate::accept_hook::{AcceptHook, AllowAll};
use crate::config::ProxyConfig;
use crate::engine_listener;
use crate::error::{ProxyError, Result};
use crate::ide_listener;
use crate::registry::Registry;
use crate::session_tracker::SessionTracker;

pub struct Supervisor {
    config: ProxyConfig,
    registry: Arc<Registry>,
    accept_hook: Arc<dyn AcceptHook>,
}

impl Supervisor {
    pub fn new(config: ProxyConfig) -> Self {
        Supervisor {
            config,
            registry: Arc::new(Registry::new()),
            accept_hook: Arc::new(AllowAll),
        }
    }

    /// Installs a custom accept hook, replacing the default allow-all.
    pub fn with_accept_hook(mut self, hook: Arc<dyn AcceptHook>) -> Self {
        self.accept_hook = hook;
        self
    }

    /// Gives access to the shared registry, e.g. for tests that want to
    /// pre-populate a registration before driving the listeners.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Binds both listeners and runs until an interrupt is received (or,
    /// in tests, until cancelled). Returns the bound addresses alongside
    /// the running future so tests can connect without racing bind().
    pub async fn bind(&self) -> Result<BoundListeners> {
        let engine_listener = TcpListener::bind(self.config.engine_bind)
            .await
            .map_err(|e| {
                ProxyError::Config(format!(
                    "failed to bind engine listener on {}: {e}",
                    self.config.engine_bind
                ))
            })?;
        let ide_listener = TcpListener::bind(self.config.ide_bind).await.map_err(|e| {
            ProxyError::Config(format!(
                "failed to bind IDE command listener on {}: {e}",
                self.config.ide_bind
            ))
        })?;

        let engine_addr = engine_listener.local_addr()?;
        let ide_addr = ide_listener.local_addr()?;
        info!("engine listener bound on {engine_addr}");
        info!("IDE command listener bound on {ide_addr}");

        Ok(BoundListeners {
            engine_listener,
            ide_listener,
            engine_addr,
        })
    }

    /// Binds both listeners and serves until SIGINT/Ctrl-C, then shuts down.
    pub async fn run(self) -> Result<()> {
        let bound = self.bind().await?;
        let sessions = Arc::new(SessionTracker::new());

        let mut engine_task = tokio::spawn(engine_listener::serve(
            bound.engine_listener,
            Arc::clone(&self.registry),
            Arc::clone(&self.accept_hook),
            Arc::clone(&sessions),
        ));
        let mut ide_task = tokio::spawn(ide_listener::serve(
            bound.ide_listener,
            Arc::clone(&self.registry),
            bound.engine_addr,
        ));

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
            result = &mut engine_task => {
                error!("engine listener task ended unexpectedly: {result:?}");
            }
            result = &mut ide_task => {
                error!("IDE command listener task ended unexpectedly: {result:?}");
            }
        }

        engine_task.abort();
        ide_task.abort();
        sessions.abort_all();

        Ok(())
    }
}

pub struct BoundListeners {
    pub engine_listener: TcpListener,
    pub ide_listener: TcpListener,
    pub engine_addr: std::net::SocketAddr,
}
