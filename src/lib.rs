//! A rendezvous proxy for the DBGP debugger protocol.
//!
//! DBGP engines initiate their own TCP connection to an IDE, which breaks
//! down once more than one IDE wants to share the well-known engine port.
//! This crate terminates engine connections on one stable port, looks up
//! the engine's declared IDE key in a shared [`registry::Registry`], and
//! splices the connection through to whichever IDE registered that key.

pub mod accept_hook;
pub mod codec;
pub mod config;
pub mod engine_listener;
pub mod error;
pub mod ide_listener;
pub mod registry;
pub mod session;
pub mod session_tracker;
pub mod supervisor;
pub mod xml;

pub use accept_hook::AcceptHook;
pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use registry::{IdeRegistration, Registry};
pub use supervisor::Supervisor;
