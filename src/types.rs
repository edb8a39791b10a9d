use serde::Serialize;
use std::fmt;

/// Placeholder rendered in the `Process` column for rows without a label.
pub const NO_PROCESS: &str = "—";

/// Label used when a listening socket's owner cannot be resolved.
pub const UNKNOWN_PROCESS: &str = "Unknown";

/// Which check a target belongs to.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Local,
    RemoteTcp,
    RemoteUdp,
}

/// Immutable description of one check, built from configuration at startup.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub kind: ProbeKind,
    pub port: u16,
    pub host: Option<String>,
}

impl ProbeTarget {
    pub fn local(port: u16) -> Self {
        Self {
            kind: ProbeKind::Local,
            port,
            host: None,
        }
    }

    pub fn remote_tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: ProbeKind::RemoteTcp,
            port,
            host: Some(host.into()),
        }
    }

    pub fn remote_udp(host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: ProbeKind::RemoteUdp,
            port,
            host: Some(host.into()),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeType {
    Local,
    Remote,
}

impl fmt::Display for ProbeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeType::Local => f.write_str("Local"),
            ProbeType::Remote => f.write_str("Remote"),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Udp => f.write_str("UDP"),
        }
    }
}

/// Classification of one probe. Which values are possible depends on the check:
///
/// - local: `Listening`, `NotListening`
/// - remote TCP: `Reachable`, `NotReachable`
/// - remote UDP: `Reachable`, `Unconfirmed`, `SentUnconfirmed`, `SendFailed`
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    #[serde(rename = "Listening")]
    Listening,
    #[serde(rename = "Not Listening")]
    NotListening,
    #[serde(rename = "Reachable")]
    Reachable,
    #[serde(rename = "Not Reachable")]
    NotReachable,
    #[serde(rename = "Unconfirmed")]
    Unconfirmed,
    #[serde(rename = "Sent (Unconfirmed)")]
    SentUnconfirmed,
    #[serde(rename = "Send Failed")]
    SendFailed,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Listening => "Listening",
            ProbeStatus::NotListening => "Not Listening",
            ProbeStatus::Reachable => "Reachable",
            ProbeStatus::NotReachable => "Not Reachable",
            ProbeStatus::Unconfirmed => "Unconfirmed",
            ProbeStatus::SentUnconfirmed => "Sent (Unconfirmed)",
            ProbeStatus::SendFailed => "Send Failed",
        }
    }

    /// Whether the status is a positive outcome for its check.
    ///
    /// Both unconfirmed UDP outcomes count: silence is the normal UDP case, not a failure.
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            ProbeStatus::Listening
                | ProbeStatus::Reachable
                | ProbeStatus::Unconfirmed
                | ProbeStatus::SentUnconfirmed
        )
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of executing one `ProbeTarget`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    #[serde(rename = "type")]
    pub probe_type: ProbeType,
    pub protocol: Protocol,
    pub port: u16,
    pub status: ProbeStatus,
    pub process: Option<String>,
    /// Why a probe failed (refused, timed out, DNS, ...). Never shown in the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeResult {
    pub fn local(port: u16, status: ProbeStatus, process: Option<String>) -> Self {
        Self {
            probe_type: ProbeType::Local,
            protocol: Protocol::Tcp,
            port,
            status,
            process,
            detail: None,
        }
    }

    pub fn remote(protocol: Protocol, port: u16, status: ProbeStatus) -> Self {
        Self {
            probe_type: ProbeType::Remote,
            protocol,
            port,
            status,
            process: None,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn process_label(&self) -> &str {
        self.process.as_deref().unwrap_or(NO_PROCESS)
    }
}

/// Ordered, append-only collection of probe results for one run.
#[derive(Serialize, Debug, Clone, Default)]
pub struct Report {
    pub remote_host: String,
    pub generated_at: String,
    pub entries: Vec<ProbeResult>,
}

impl Report {
    pub fn new(remote_host: impl Into<String>, generated_at: impl Into<String>) -> Self {
        Self {
            remote_host: remote_host.into(),
            generated_at: generated_at.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, result: ProbeResult) {
        self.entries.push(result);
    }

    pub fn extend(&mut self, stage: Vec<ProbeResult>) {
        self.entries.extend(stage);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.status.is_ok()).count()
    }
}
