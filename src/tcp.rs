use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::types::{ProbeResult, ProbeStatus, Protocol};

/// Why a remote TCP port was classified `Not Reachable`.
#[derive(Debug)]
pub enum TcpFailure {
    Resolve(String),
    NoAddresses,
    Refused,
    TimedOut,
    Io(io::Error),
}

impl fmt::Display for TcpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcpFailure::Resolve(e) => write!(f, "name resolution failed: {e}"),
            TcpFailure::NoAddresses => f.write_str("name resolved to no addresses"),
            TcpFailure::Refused => f.write_str("connection refused"),
            TcpFailure::TimedOut => f.write_str("connection timed out"),
            TcpFailure::Io(e) => write!(f, "connect failed: {e}"),
        }
    }
}

impl From<io::Error> for TcpFailure {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => TcpFailure::Refused,
            io::ErrorKind::TimedOut => TcpFailure::TimedOut,
            _ => TcpFailure::Io(e),
        }
    }
}

/// Resolve `host` and attempt a handshake with each address until one completes.
///
/// Both resolution and each connect attempt are bounded by `timeout`. No data is sent;
/// the stream is dropped as soon as the handshake completes.
pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<SocketAddr, TcpFailure> {
    let addrs: Vec<SocketAddr> = match time::timeout(timeout, lookup_host((host, port))).await {
        Ok(Ok(addrs)) => addrs.collect(),
        Ok(Err(e)) => return Err(TcpFailure::Resolve(e.to_string())),
        Err(_) => return Err(TcpFailure::Resolve("timed out".to_string())),
    };
    if addrs.is_empty() {
        return Err(TcpFailure::NoAddresses);
    }

    let mut last = TcpFailure::NoAddresses;
    for addr in addrs {
        let start = Instant::now();
        match time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => {
                debug!(%addr, latency_ms = start.elapsed().as_millis() as u64, "tcp handshake completed");
                return Ok(addr);
            }
            Ok(Err(e)) => last = e.into(),
            Err(_) => last = TcpFailure::TimedOut,
        }
        debug!(%addr, reason = %last, "tcp connect attempt failed");
    }
    Err(last)
}

/// Probe one remote TCP port and classify it `Reachable` or `Not Reachable`.
pub async fn probe_tcp(host: &str, port: u16, timeout: Duration) -> ProbeResult {
    match connect(host, port, timeout).await {
        Ok(addr) => {
            info!(host, port, %addr, "remote TCP port reachable");
            ProbeResult::remote(Protocol::Tcp, port, ProbeStatus::Reachable)
        }
        Err(reason) => {
            info!(host, port, %reason, "remote TCP port not reachable");
            ProbeResult::remote(Protocol::Tcp, port, ProbeStatus::NotReachable)
                .with_detail(reason.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_millis(1500);

    #[tokio::test]
    async fn open_loopback_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let r = probe_tcp("127.0.0.1", port, TIMEOUT).await;
        assert_eq!(r.status, ProbeStatus::Reachable);
        assert!(r.detail.is_none());
        assert!(r.process.is_none());
    }

    #[tokio::test]
    async fn closed_loopback_port_is_not_reachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let r = probe_tcp("127.0.0.1", port, TIMEOUT).await;
        assert_eq!(r.status, ProbeStatus::NotReachable);
        assert!(r.detail.is_some());
    }

    #[tokio::test]
    async fn unresolvable_host_is_not_reachable() {
        let r = probe_tcp("no-such-host.invalid", 443, TIMEOUT).await;
        assert_eq!(r.status, ProbeStatus::NotReachable);
        assert_eq!(r.protocol, Protocol::Tcp);
    }

    #[test]
    fn io_errors_map_to_reasons() {
        let refused: TcpFailure = io::Error::from(io::ErrorKind::ConnectionRefused).into();
        assert_eq!(refused.to_string(), "connection refused");
        let timed: TcpFailure = io::Error::from(io::ErrorKind::TimedOut).into();
        assert!(matches!(timed, TcpFailure::TimedOut));
    }
}
