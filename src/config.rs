use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

use crate::ports::{DEFAULT_LOCAL_TCP, DEFAULT_REMOTE_TCP, DEFAULT_REMOTE_UDP};
use crate::types::ProbeTarget;

/// Problems that must stop a run before any probe executes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("remote host must not be empty")]
    EmptyRemoteHost,
    #[error("port 0 is not a valid {0} port")]
    ZeroPort(&'static str),
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Which UDP probing strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UdpStrategyChoice {
    /// Use netcat when it is installed, otherwise the raw socket fallback.
    Auto,
    /// Always use netcat (probes report `Unconfirmed` if it is missing).
    Netcat,
    /// Always use a plain UDP socket send.
    Socket,
}

/// Named configuration for one diagnostic run.
#[derive(Debug, Clone)]
pub struct Config {
    pub remote_host: String,
    pub local_tcp_ports: Vec<u16>,
    pub remote_tcp_ports: Vec<u16>,
    pub remote_udp_ports: Vec<u16>,
    pub timeout: Duration,
    pub udp_strategy: UdpStrategyChoice,
    pub output_dir: PathBuf,
    pub report_prefix: String,
    pub report_ext: String,
}

impl Config {
    /// Default port sets for the given remote host.
    pub fn with_remote_host(remote_host: impl Into<String>) -> Self {
        Self {
            remote_host: remote_host.into(),
            local_tcp_ports: DEFAULT_LOCAL_TCP.to_vec(),
            remote_tcp_ports: DEFAULT_REMOTE_TCP.to_vec(),
            remote_udp_ports: DEFAULT_REMOTE_UDP.to_vec(),
            timeout: Duration::from_millis(2000),
            udp_strategy: UdpStrategyChoice::Auto,
            output_dir: PathBuf::from("."),
            report_prefix: "portcheck".to_string(),
            report_ext: "txt".to_string(),
        }
    }

    /// Trim the remote host and reject configurations that cannot be probed.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.remote_host = self.remote_host.trim().to_string();
        if self.remote_host.is_empty() {
            return Err(ConfigError::EmptyRemoteHost);
        }
        if self.local_tcp_ports.contains(&0) {
            return Err(ConfigError::ZeroPort("local TCP"));
        }
        if self.remote_tcp_ports.contains(&0) {
            return Err(ConfigError::ZeroPort("remote TCP"));
        }
        if self.remote_udp_ports.contains(&0) {
            return Err(ConfigError::ZeroPort("remote UDP"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(self)
    }

    /// All probe targets in execution order: local, remote TCP, remote UDP.
    pub fn targets(&self) -> Vec<ProbeTarget> {
        let local = self.local_tcp_ports.iter().map(|&p| ProbeTarget::local(p));
        let tcp = self
            .remote_tcp_ports
            .iter()
            .map(|&p| ProbeTarget::remote_tcp(self.remote_host.as_str(), p));
        let udp = self
            .remote_udp_ports
            .iter()
            .map(|&p| ProbeTarget::remote_udp(self.remote_host.as_str(), p));
        local.chain(tcp).chain(udp).collect()
    }

    pub fn expected_results(&self) -> usize {
        self.local_tcp_ports.len() + self.remote_tcp_ports.len() + self.remote_udp_ports.len()
    }
}
