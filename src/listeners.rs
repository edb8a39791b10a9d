//! Local listener check: is anything on this machine listening on the expected TCP ports?

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use netstat2::{get_sockets_info, AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, TcpState};
use sysinfo::{Pid, System};
use tracing::{debug, warn};

use crate::types::{ProbeResult, ProbeStatus, UNKNOWN_PROCESS};

/// A TCP port in LISTEN state together with the processes holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub port: u16,
    pub pids: Vec<u32>,
}

/// Read-only view of the host's listening sockets.
pub trait ListenerSource {
    /// All TCP listeners, IPv4 and IPv6 merged per port.
    fn listeners(&mut self) -> Result<Vec<Listener>>;

    /// Human-readable name for a PID, if it still exists and is visible to us.
    fn process_name(&mut self, pid: u32) -> Option<String>;
}

/// Listener source backed by the OS socket table (`netstat2`) and process table (`sysinfo`).
pub struct SystemListeners {
    sys: System,
}

impl SystemListeners {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SystemListeners {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerSource for SystemListeners {
    fn listeners(&mut self) -> Result<Vec<Listener>> {
        let af_flags = AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6;
        let sockets = get_sockets_info(af_flags, ProtocolFlags::TCP)?;

        let mut by_port: BTreeMap<u16, BTreeSet<u32>> = BTreeMap::new();
        for socket in sockets {
            let ProtocolSocketInfo::Tcp(tcp) = socket.protocol_socket_info else {
                continue;
            };
            if tcp.state != TcpState::Listen {
                continue;
            }
            by_port
                .entry(tcp.local_port)
                .or_default()
                .extend(socket.associated_pids);
        }

        Ok(by_port
            .into_iter()
            .map(|(port, pids)| Listener {
                port,
                pids: pids.into_iter().collect(),
            })
            .collect())
    }

    fn process_name(&mut self, pid: u32) -> Option<String> {
        let pid = Pid::from_u32(pid);
        if !self.sys.refresh_process(pid) {
            return None;
        }
        self.sys
            .process(pid)
            .map(|p| p.name().to_string())
            .filter(|name| !name.is_empty())
    }
}

/// Check each port in order and return exactly one `Local` result per port.
///
/// The socket table is read once. If that fails (no privilege, unsupported platform)
/// every port is reported `Not Listening` with the error kept as detail.
pub fn check_local_ports(ports: &[u16], source: &mut dyn ListenerSource) -> Vec<ProbeResult> {
    let listeners = match source.listeners() {
        Ok(l) => l,
        Err(e) => {
            warn!(error = %e, "failed to enumerate local listeners; treating all as not listening");
            return ports
                .iter()
                .map(|&port| {
                    ProbeResult::local(port, ProbeStatus::NotListening, None)
                        .with_detail(format!("listener enumeration failed: {e}"))
                })
                .collect();
        }
    };
    debug!(count = listeners.len(), "enumerated local TCP listeners");

    ports
        .iter()
        .map(|&port| match listeners.iter().find(|l| l.port == port) {
            Some(listener) => {
                let label = process_label(listener, source);
                ProbeResult::local(port, ProbeStatus::Listening, Some(label))
            }
            None => ProbeResult::local(port, ProbeStatus::NotListening, None),
        })
        .collect()
}

/// `"<name> (PID <pid>)"` for the first owner whose name resolves, else `Unknown`.
fn process_label(listener: &Listener, source: &mut dyn ListenerSource) -> String {
    for &pid in &listener.pids {
        if let Some(name) = source.process_name(pid) {
            return format!("{name} (PID {pid})");
        }
        debug!(pid, port = listener.port, "could not resolve process name");
    }
    UNKNOWN_PROCESS.to_string()
}
