use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use clap::Parser;

/// Command-line surface of the proxy supervisor.
///
/// Defaults match the well-known DBGP proxy ports: 9000 for engines, 9001
/// for IDE registration commands.
#[derive(Debug, Parser)]
#[command(name = "dbgpproxy", version, about = "Rendezvous proxy for the DBGP debugger protocol")]
pub struct Cli {
    /// Address the engine-side listener binds to, as `[HOST:]PORT`.
    #[arg(short = 'd', long = "engine-bind", default_value = "127.0.0.1:9000")]
    pub engine_bind: BindAddr,

    /// Address the IDE command listener binds to, as `[HOST:]PORT`.
    #[arg(short = 'i', long = "ide-bind", default_value = "127.0.0.1:9001")]
    pub ide_bind: BindAddr,

    /// Log level: critical, error, warn, info, or debug.
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    pub log_level: LogLevel,
}

/// A bind address given as `[HOST:]PORT`: a bare port fills in `127.0.0.1`
/// as the host, matching the way DBGP proxy ports are usually specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindAddr(pub SocketAddr);

impl FromStr for BindAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(BindAddr(addr));
        }
        let port: u16 = s
            .parse()
            .map_err(|_| format!("'{s}' is not a valid [HOST:]PORT address"))?;
        Ok(BindAddr(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)))
    }
}

impl fmt::Display for BindAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Critical,
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            // log::Level has no Critical; proxy treats it as Error severity.
            LogLevel::Critical => log::LevelFilter::Error,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
        }
    }
}

/// Resolved configuration the supervisor runs with.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub engine_bind: SocketAddr,
    pub ide_bind: SocketAddr,
}

impl From<&Cli> for ProxyConfig {
    fn from(cli: &Cli) -> Self {
        ProxyConfig {
            engine_bind: cli.engine_bind.0,
            ide_bind: cli.ide_bind.0,
        }
    }
}
