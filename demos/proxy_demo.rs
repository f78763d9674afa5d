//! DBGP rendezvous proxy, standalone example.
//!
//! Binds the two listeners on addresses taken from argv (falling back to
//! the protocol's well-known defaults), then idles until Ctrl-C.
//!
//! ```text
//! cargo run --example proxy_demo -- 127.0.0.1:9000 127.0.0.1:9001
//! ```

use std::env;
use std::net::SocketAddr;

use dbgp_proxy::config::ProxyConfig;
use dbgp_proxy::Supervisor;

#[tokio::main]
async fn main() {
    env_logger::init();

    let engine_bind = env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9000".to_string())
        .parse::<SocketAddr>()
        .expect("invalid engine bind address");

    let ide_bind = env::args()
        .nth(2)
        .unwrap_or_else(|| "127.0.0.1:9001".to_string())
        .parse::<SocketAddr>()
        .expect("invalid IDE bind address");

    println!("Engine listener: {engine_bind}");
    println!("IDE command listener: {ide_bind}");

    let supervisor = Supervisor::new(ProxyConfig { engine_bind, ide_bind });

    if let Err(e) = supervisor.run().await {
        eprintln!("proxy exited with error: {e}");
    }
}
