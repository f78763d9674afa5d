//! DBGP's length-prefixed wire framing: `<decimal-length>\0<payload>\0`.

use std::future::poll_fn;
use std::pin::Pin;
use std::task::Poll;

use tokio::io::{AsyncBufRead, AsyncReadExt};

use crate::error::{ProxyError, Result};

/// Payload length above which a frame is rejected outright, to bound memory
/// use against a misbehaving or malicious peer.
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Reads one framed packet: ASCII decimal length, a NUL, then exactly that
/// many payload bytes. The trailing NUL is consumed if present in the
/// reader's buffer, but its absence is not an error -- some engines omit it.
pub async fn decode_framed<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut digits = Vec::new();
    loop {
        let byte = read_one_byte(reader).await?;
        if byte == 0 {
            break;
        }
        if !byte.is_ascii_digit() {
            return Err(ProxyError::Protocol(format!(
                "non-digit byte {:#04x} in frame length",
                byte
            )));
        }
        digits.push(byte);
        if digits.len() > 7 {
            return Err(ProxyError::Protocol("frame length too long".into()));
        }
    }
    if digits.is_empty() {
        return Err(ProxyError::Protocol("empty frame length".into()));
    }
    let length_str = std::str::from_utf8(&digits).expect("ascii digits are valid utf8");
    let length: usize = length_str
        .parse()
        .map_err(|_| ProxyError::Protocol(format!("invalid frame length '{length_str}'")))?;
    if length > MAX_PAYLOAD_BYTES {
        return Err(ProxyError::Protocol(format!(
            "frame length {length} exceeds {MAX_PAYLOAD_BYTES} byte cap"
        )));
    }

    let mut payload = vec![0u8; length];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| ProxyError::Protocol(format!("short read of {length}-byte payload: {e}")))?;

    // Consume the trailing NUL only if it is already sitting in the
    // reader's buffer; a peer that omits it (or just hasn't sent it yet)
    // must not stall routing waiting for a byte that may never come.
    let mut reader = Pin::new(&mut *reader);
    let peeked = poll_fn(|cx| match reader.as_mut().poll_fill_buf(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result.map(|buf| buf.first().copied()))),
        Poll::Pending => Poll::Ready(None),
    })
    .await;
    match peeked {
        Some(Ok(Some(0))) => reader.consume(1),
        Some(Ok(_)) => {}
        Some(Err(e)) => return Err(e.into()),
        None => {}
    }

    Ok(payload)
}

async fn read_one_byte<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte).await.map_err(|e| {
        ProxyError::Protocol(format!("short read while scanning frame length: {e}"))
    })?;
    Ok(byte[0])
}

/// Serializes `payload` into the wire frame: decimal length, NUL, payload, NUL.
pub fn encode_framed(payload: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(payload.len() + 16);
    wire.extend_from_slice(payload.len().to_string().as_bytes());
    wire.push(0);
    wire.extend_from_slice(payload);
    wire.push(0);
    wire
}
