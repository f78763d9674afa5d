//! The per-connection state machine: parse the init packet, route it to a
//! registered IDE, rewrite and forward it, then splice bytes until either
//! side closes.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::codec::{decode_framed, encode_framed};
use crate::error::{ProxyError, Result};
use crate::registry::Registry;
use crate::xml::{proxy_error_xml, Element};

const SPLICE_BUFFER_BYTES: usize = 8 * 1024;

/// Drives one accepted engine connection from init packet to splice
/// shutdown. Consumes the stream; nothing outlives this call.
pub async fn run(engine: TcpStream, engine_addr: SocketAddr, registry: Arc<Registry>) -> Result<()> {
    let (engine_read, mut engine_write) = engine.into_split();
    let mut engine_read = BufReader::new(engine_read);

    let routed = route(&mut engine_read, &mut engine_write, engine_addr, &registry).await?;

    splice(engine_read, engine_write, routed.ide_stream, &routed.key).await
}

struct Routed {
    ide_stream: TcpStream,
    key: String,
}

/// AwaitInit phase: read, validate, route, dial, rewrite, forward. Any
/// failure here sends a `proxyerror` packet to the engine before returning.
async fn route(
    engine_read: &mut BufReader<OwnedReadHalf>,
    engine_write: &mut OwnedWriteHalf,
    engine_addr: SocketAddr,
    registry: &Arc<Registry>,
) -> Result<Routed> {
    let payload = match decode_framed(engine_read).await {
        Ok(p) => p,
        Err(e) => {
            report_error(engine_write, &e).await;
            return Err(e);
        }
    };

    let text = match String::from_utf8(payload) {
        Ok(t) => t,
        Err(e) => {
            let err = ProxyError::Protocol(format!("init payload is not valid UTF-8: {e}"));
            report_error(engine_write, &err).await;
            return Err(err);
        }
    };

    let mut elem = match Element::parse(&text) {
        Ok(e) => e,
        Err(e) => {
            report_error(engine_write, &e).await;
            return Err(e);
        }
    };

    let idekey = elem.attr("idekey").unwrap_or("").to_string();
    if idekey.is_empty() {
        let err = ProxyError::Protocol("init packet has no idekey attribute".into());
        report_error(engine_write, &err).await;
        return Err(err);
    }

    let registration = match registry.lookup(&idekey) {
        Some(r) => r,
        None => {
            let err = ProxyError::UnknownIdeKey(idekey.clone());
            report_error(engine_write, &err).await;
            return Err(err);
        }
    };

    let ide_stream = match TcpStream::connect(registration.endpoint).await {
        Ok(s) => s,
        Err(source) => {
            registry.remove(&idekey);
            warn!(
                "evicting stale registration for '{idekey}' after dial failure to {}",
                registration.endpoint
            );
            let err = ProxyError::DialFailed {
                addr: registration.endpoint,
                source,
            };
            report_error(engine_write, &err).await;
            return Err(err);
        }
    };

    if elem.attr("hostname").unwrap_or("").is_empty() {
        elem.set_attr("hostname", &engine_addr.ip().to_string());
    }
    elem.set_attr("proxied", "true");

    let rewritten = elem.to_xml();
    let wire = encode_framed(rewritten.as_bytes());
    let mut ide_stream = ide_stream;
    ide_stream.write_all(&wire).await?;

    info!("routed '{idekey}' from {engine_addr} to {}", registration.endpoint);
    Ok(Routed {
        ide_stream,
        key: idekey,
    })
}

async fn report_error(engine_write: &mut OwnedWriteHalf, err: &ProxyError) {
    let payload = proxy_error_xml(&err.to_string());
    let wire = encode_framed(payload.as_bytes());
    if let Err(write_err) = engine_write.write_all(&wire).await {
        debug!("failed to deliver proxyerror to engine: {write_err}");
    }
}

/// Splicing phase: byte-transparent bidirectional forwarding until either
/// side reports EOF or an error. Whichever direction finishes first ends the
/// session; dropping the other direction's sockets closes them.
async fn splice(
    mut engine_read: BufReader<OwnedReadHalf>,
    mut engine_write: OwnedWriteHalf,
    ide_stream: TcpStream,
    idekey: &str,
) -> Result<()> {
    let (mut ide_read, mut ide_write) = ide_stream.into_split();

    tokio::select! {
        result = copy_loop(&mut engine_read, &mut ide_write) => {
            debug!("engine->ide splice for '{idekey}' ended: {result:?}");
        }
        result = copy_loop(&mut ide_read, &mut engine_write) => {
            debug!("ide->engine splice for '{idekey}' ended: {result:?}");
        }
    }
    info!("session for '{idekey}' stopped");
    Ok(())
}

async fn copy_loop<R, W>(reader: &mut R, writer: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut buf = [0u8; SPLICE_BUFFER_BYTES];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
    }
}
