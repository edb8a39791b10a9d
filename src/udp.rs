//! Remote UDP reachability.
//!
//! UDP has no handshake, so a successful send proves nothing about the far end. Two
//! strategies exist with different confidence, and their statuses are kept apart:
//!
//! - [`UdpProber::Netcat`] hands the datagram to `nc` and waits for an echo. Any reply is a
//!   confirmed round trip (`Reachable`); silence is the normal case (`Unconfirmed`).
//! - [`UdpProber::Socket`] sends the datagram itself on a connected socket and only knows
//!   whether the send succeeded (`Sent (Unconfirmed)` or `Send Failed`).

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, UdpSocket};
use tokio::process::Command;
use tokio::time;
use tracing::{debug, info};

use crate::config::UdpStrategyChoice;
use crate::types::{ProbeResult, ProbeStatus, Protocol};

/// Fixed probe payload.
pub const PROBE_PAYLOAD: &[u8] = b"test";

const NETCAT: &str = "nc";

/// UDP probe strategy, chosen once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UdpProber {
    Netcat(PathBuf),
    Socket,
}

impl UdpProber {
    /// Resolve the operator's choice into a concrete strategy.
    pub fn select(choice: UdpStrategyChoice) -> Self {
        match choice {
            UdpStrategyChoice::Socket => UdpProber::Socket,
            UdpStrategyChoice::Netcat => {
                UdpProber::Netcat(which::which(NETCAT).unwrap_or_else(|_| PathBuf::from(NETCAT)))
            }
            UdpStrategyChoice::Auto => match which::which(NETCAT) {
                Ok(path) => UdpProber::Netcat(path),
                Err(_) => UdpProber::Socket,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UdpProber::Netcat(_) => "netcat",
            UdpProber::Socket => "socket",
        }
    }

    pub async fn probe(&self, host: &str, port: u16, timeout: Duration) -> ProbeResult {
        let result = match self {
            UdpProber::Netcat(path) => probe_netcat(path, host, port, timeout).await,
            UdpProber::Socket => probe_socket(host, port, timeout).await,
        };
        info!(
            host,
            port,
            strategy = self.name(),
            status = %result.status,
            detail = result.detail.as_deref().unwrap_or(""),
            "remote UDP probe"
        );
        result
    }
}

/// Bind an ephemeral socket, connect it to the target, send the payload, close.
pub async fn send_probe(host: &str, port: u16, timeout: Duration) -> io::Result<SocketAddr> {
    let remote = match time::timeout(timeout, lookup_host((host, port))).await {
        Ok(addrs) => addrs?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "name resolved to no addresses")
        })?,
        Err(_) => {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "name resolution timed out",
            ))
        }
    };

    let bind_addr = match remote.ip() {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(remote).await?;
    let sent = socket.send(PROBE_PAYLOAD).await?;
    debug!(%remote, bytes = sent, "udp probe datagram sent");
    Ok(remote)
}

async fn probe_socket(host: &str, port: u16, timeout: Duration) -> ProbeResult {
    match send_probe(host, port, timeout).await {
        Ok(_) => ProbeResult::remote(Protocol::Udp, port, ProbeStatus::SentUnconfirmed),
        Err(e) => ProbeResult::remote(Protocol::Udp, port, ProbeStatus::SendFailed)
            .with_detail(format!("send failed: {e}")),
    }
}

async fn probe_netcat(nc: &Path, host: &str, port: u16, timeout: Duration) -> ProbeResult {
    let unconfirmed = |detail: String| {
        ProbeResult::remote(Protocol::Udp, port, ProbeStatus::Unconfirmed).with_detail(detail)
    };

    let wait_secs = timeout.as_secs().max(1);
    let mut child = match Command::new(nc)
        .arg("-u")
        .arg("-w")
        .arg(wait_secs.to_string())
        .arg(host)
        .arg(port.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return unconfirmed(format!("could not run {}: {e}", nc.display())),
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(PROBE_PAYLOAD).await {
            debug!(error = %e, "writing probe payload to netcat failed");
        }
    }

    // nc idles out after `-w` seconds; the outer bound is a backstop that also kills it.
    let bound = Duration::from_secs(wait_secs) + Duration::from_secs(1);
    match time::timeout(bound, child.wait_with_output()).await {
        Ok(Ok(output)) if classify_reply(&output.stdout) == ProbeStatus::Reachable => {
            ProbeResult::remote(Protocol::Udp, port, ProbeStatus::Reachable)
        }
        Ok(Ok(_)) => unconfirmed("no reply received".to_string()),
        Ok(Err(e)) => unconfirmed(format!("netcat failed: {e}")),
        Err(_) => unconfirmed("no reply before timeout".to_string()),
    }
}

/// Bytes echoed back by the remote confirm the round trip; silence does not.
pub fn classify_reply(reply: &[u8]) -> ProbeStatus {
    if reply.is_empty() {
        ProbeStatus::Unconfirmed
    } else {
        ProbeStatus::Reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(1500);

    #[test]
    fn reply_bytes_confirm_round_trip() {
        assert_eq!(classify_reply(b""), ProbeStatus::Unconfirmed);
        assert_eq!(classify_reply(b"pong"), ProbeStatus::Reachable);
    }

    #[test]
    fn forced_socket_strategy() {
        assert_eq!(UdpProber::select(UdpStrategyChoice::Socket), UdpProber::Socket);
    }

    #[test]
    fn forced_netcat_strategy_is_netcat_even_when_missing() {
        assert!(matches!(
            UdpProber::select(UdpStrategyChoice::Netcat),
            UdpProber::Netcat(_)
        ));
    }

    #[tokio::test]
    async fn socket_send_to_silent_target_is_sent_unconfirmed() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let r = UdpProber::Socket.probe("127.0.0.1", port, TIMEOUT).await;
        assert_eq!(r.status, ProbeStatus::SentUnconfirmed);
        assert_eq!(r.protocol, Protocol::Udp);

        let mut buf = [0u8; 16];
        let n = time::timeout(TIMEOUT, silent.recv(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf[..n], PROBE_PAYLOAD);
    }

    #[tokio::test]
    async fn socket_send_to_unresolvable_host_fails() {
        let r = UdpProber::Socket.probe("no-such-host.invalid", 3022, TIMEOUT).await;
        assert_eq!(r.status, ProbeStatus::SendFailed);
        assert!(r.detail.is_some());
    }

    #[tokio::test]
    async fn missing_netcat_binary_is_unconfirmed() {
        let prober = UdpProber::Netcat(PathBuf::from("/nonexistent/portcheck-nc"));
        let r = prober.probe("127.0.0.1", 3022, TIMEOUT).await;
        assert_eq!(r.status, ProbeStatus::Unconfirmed);
    }

    /// Write an executable stand-in for `nc` that runs `body` as a shell script.
    #[cfg(unix)]
    fn fake_netcat(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("nc");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn netcat_echo_is_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let prober = UdpProber::Netcat(fake_netcat(dir.path(), "cat"));
        let r = prober.probe("127.0.0.1", 9, Duration::from_secs(1)).await;
        assert_eq!(r.status, ProbeStatus::Reachable);
        assert!(r.detail.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn netcat_silence_is_unconfirmed() {
        let dir = tempfile::tempdir().unwrap();
        let prober = UdpProber::Netcat(fake_netcat(dir.path(), "cat >/dev/null"));
        let r = prober.probe("127.0.0.1", 9, Duration::from_secs(1)).await;
        assert_eq!(r.status, ProbeStatus::Unconfirmed);
        assert_eq!(r.detail.as_deref(), Some("no reply received"));
    }
}
