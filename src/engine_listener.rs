//! Accepts long-lived engine connections and spawns one [`crate::session`]
//! driver per connection. The listener never blocks on a session.

use std::sync::Arc;

use log::{debug, error, info};
use tokio::net::TcpListener;

use crate::accept_hook::AcceptHook;
use crate::error::Result;
use crate::registry::Registry;
use crate::session;
use crate::session_tracker::SessionTracker;

/// Runs the engine-side accept loop until the listener itself errors or the
/// task is aborted by the supervisor during shutdown.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<Registry>,
    accept_hook: Arc<dyn AcceptHook>,
    sessions: Arc<SessionTracker>,
) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;

        if !accept_hook.accept(peer) {
            debug!("accept hook rejected connection from {peer}");
            continue;
        }

        let registry = Arc::clone(&registry);
        info!("accepted engine connection from {peer}");
        let join_handle = tokio::spawn(async move {
            if let Err(e) = session::run(stream, peer, registry).await {
                error!("session for {peer} ended with error: {e}");
            }
        });
        sessions.track(join_handle.abort_handle());
    }
}
