//! IDE-side command listener: one short-lived transaction per connection,
//! `proxyinit` to register an IDE, `proxystop` to deregister it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::error::Result;
use crate::registry::Registry;
use crate::xml::escape_attr;

const MAX_COMMAND_BYTES: usize = 1024;

/// Runs the IDE command accept loop. Each connection is handled on its own
/// task; transactions are short enough that this costs nothing.
pub async fn serve(listener: TcpListener, registry: Arc<Registry>, engine_bind: SocketAddr) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(e) = handle(stream, peer, registry, engine_bind).await {
                warn!("IDE command from {peer} failed: {e}");
            }
        });
    }
}

async fn handle(
    mut stream: tokio::net::TcpStream,
    peer: SocketAddr,
    registry: Arc<Registry>,
    engine_bind: SocketAddr,
) -> Result<()> {
    let mut buf = vec![0u8; MAX_COMMAND_BYTES];
    let n = stream.read(&mut buf).await?;
    buf.truncate(n);

    let text = match String::from_utf8(buf.clone()) {
        Ok(t) => t,
        Err(_) => {
            debug!("IDE command from {peer} was not valid UTF-8, falling back to lossy decode");
            String::from_utf8_lossy(&buf).into_owned()
        }
    };

    let first_line = text.lines().next().unwrap_or("");
    let response = dispatch(first_line, peer, &registry, engine_bind);
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

fn dispatch(line: &str, peer: SocketAddr, registry: &Registry, engine_bind: SocketAddr) -> String {
    let (command, args) = tokenize(line);
    match command {
        "proxyinit" => handle_proxyinit(&args, peer, registry, engine_bind),
        "proxystop" => handle_proxystop(&args, registry),
        other => error_xml(other, &format!("unrecognized command '{other}'")),
    }
}

/// Splits the leading identifier (the command) from the whitespace-split
/// argument list that follows it on the same line.
fn tokenize(line: &str) -> (&str, Vec<&str>) {
    let trimmed = line.trim_start();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(trimmed.len());
    let command = &trimmed[..end];
    let args = trimmed[end..].split_whitespace().collect();
    (command, args)
}

/// Parses short-option flags (`-k value`) into a map keyed by option letter.
fn parse_flags(args: &[&str]) -> HashMap<char, String> {
    let mut flags = HashMap::new();
    let mut iter = args.iter();
    while let Some(token) = iter.next() {
        if let Some(rest) = token.strip_prefix('-') {
            if let (Some(opt), Some(value)) = (rest.chars().next(), iter.next()) {
                flags.insert(opt, value.to_string());
            }
        }
    }
    flags
}

fn handle_proxyinit(args: &[&str], peer: SocketAddr, registry: &Registry, engine_bind: SocketAddr) -> String {
    let flags = parse_flags(args);

    let key = match flags.get(&'k').filter(|k| !k.is_empty()) {
        Some(k) => k.clone(),
        None => return error_xml("proxyinit", "No IDE key"),
    };
    let port: u16 = match flags.get(&'p').and_then(|p| p.parse().ok()) {
        Some(p) => p,
        None => return error_xml("proxyinit", "No port defined for proxy"),
    };
    let multi = flags.get(&'m').cloned();
    let endpoint = SocketAddr::new(peer.ip(), port);

    match registry.add(&key, endpoint, multi) {
        Some(_) => format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<proxyinit success=\"1\" idekey=\"{}\" address=\"{}\" port=\"{}\"/>",
            escape_attr(&key),
            engine_bind.ip(),
            engine_bind.port()
        ),
        None => error_xml("proxyinit", "IDE Key already exists"),
    }
}

fn handle_proxystop(args: &[&str], registry: &Registry) -> String {
    let flags = parse_flags(args);

    let key = match flags.get(&'k').filter(|k| !k.is_empty()) {
        Some(k) => k.clone(),
        None => return error_xml("proxystop", "No IDE key"),
    };

    registry.remove(&key);
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<proxystop success=\"1\" idekey=\"{}\"/>",
        escape_attr(&key)
    )
}

fn error_xml(command: &str, message: &str) -> String {
    let tag = if command.is_empty() { "CMD" } else { command };
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<{tag} success=\"0\"><error id=\"0\"><message>{}</message></error></{tag}>",
        escape_attr(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "192.168.1.7:54321".parse().unwrap()
    }

    fn engine_bind() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn proxyinit_registers_and_responds_success() {
        let registry = Registry::new();
        let response = dispatch("proxyinit -p 9010 -k alice", peer(), &registry, engine_bind());
        assert!(response.contains(r#"<proxyinit success="1" idekey="alice" address="127.0.0.1" port="9000"/>"#));
        let reg = registry.lookup("alice").unwrap();
        assert_eq!(reg.endpoint, SocketAddr::new(peer().ip(), 9010));
    }

    #[test]
    fn proxyinit_missing_key_is_rejected() {
        let registry = Registry::new();
        let response = dispatch("proxyinit -p 9010", peer(), &registry, engine_bind());
        assert!(response.contains("No IDE key"));
        assert!(response.contains(r#"<proxyinit success="0">"#));
    }

    #[test]
    fn proxyinit_missing_port_is_rejected() {
        let registry = Registry::new();
        let response = dispatch("proxyinit -k alice", peer(), &registry, engine_bind());
        assert!(response.contains("No port defined for proxy"));
    }

    #[test]
    fn proxyinit_collision_is_rejected() {
        let registry = Registry::new();
        dispatch("proxyinit -p 9010 -k dave", peer(), &registry, engine_bind());
        let second = dispatch("proxyinit -p 9011 -k dave", peer(), &registry, engine_bind());
        assert!(second.contains(r#"<proxyinit success="0">"#));
        assert!(second.contains("IDE Key already exists"));
    }

    #[test]
    fn proxystop_deregisters_and_responds_success() {
        let registry = Registry::new();
        dispatch("proxyinit -p 9010 -k dave", peer(), &registry, engine_bind());
        let response = dispatch("proxystop -k dave", peer(), &registry, engine_bind());
        assert!(response.contains(r#"<proxystop success="1" idekey="dave"/>"#));
        assert!(registry.lookup("dave").is_none());
    }

    #[test]
    fn proxystop_missing_key_is_rejected() {
        let registry = Registry::new();
        let response = dispatch("proxystop", peer(), &registry, engine_bind());
        assert!(response.contains("No IDE key"));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let registry = Registry::new();
        let response = dispatch("proxywat -k x", peer(), &registry, engine_bind());
        assert!(response.contains(r#"<proxywat success="0">"#));
    }
}
