use std::net::SocketAddr;

use thiserror::Error;

/// Every way a proxy transaction can fail, matching the error taxonomy of the
/// wire protocol: a bad frame, a routing miss, a dead splice, a bad command,
/// or a startup-time configuration problem.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("no server with key '{0}'")]
    UnknownIdeKey(String),

    #[error("unable to connect to IDE at {addr}: {source}")]
    DialFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("command error: {0}")]
    Command(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
