//! Runs the three probe stages in order and gathers their results into a `Report`.

use std::fmt;

use tracing::info;

use crate::config::{Config, ConfigError};
use crate::listeners::{check_local_ports, ListenerSource};
use crate::tcp::probe_tcp;
use crate::types::{ProbeKind, ProbeResult, Report};
use crate::udp::UdpProber;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LocalListeners,
    RemoteTcp,
    RemoteUdp,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::LocalListeners => f.write_str("Local TCP listeners"),
            Stage::RemoteTcp => f.write_str("Remote TCP reachability"),
            Stage::RemoteUdp => f.write_str("Remote UDP reachability"),
        }
    }
}

/// Execute every configured probe exactly once, sequentially, in target order.
///
/// `observe` is called with each result as soon as its probe returns (local results once the
/// socket table has been read), so callers can print progress while remote probes block.
/// The returned report holds the same results in the same order.
pub async fn run(
    config: &Config,
    listeners: &mut dyn ListenerSource,
    udp: &UdpProber,
    generated_at: &str,
    mut observe: impl FnMut(Stage, &ProbeResult),
) -> Report {
    let targets = config.targets();
    let mut report = Report::new(config.remote_host.as_str(), generated_at);

    let local_ports: Vec<u16> = targets
        .iter()
        .filter(|t| t.kind == ProbeKind::Local)
        .map(|t| t.port)
        .collect();
    for result in check_local_ports(&local_ports, listeners) {
        observe(Stage::LocalListeners, &result);
        report.push(result);
    }

    for target in &targets {
        // A remote target without a host fails resolution and is still reported.
        let host = target.host.as_deref().unwrap_or_default();
        let (stage, result) = match target.kind {
            ProbeKind::Local => continue,
            ProbeKind::RemoteTcp => (
                Stage::RemoteTcp,
                probe_tcp(host, target.port, config.timeout).await,
            ),
            ProbeKind::RemoteUdp => (
                Stage::RemoteUdp,
                udp.probe(host, target.port, config.timeout).await,
            ),
        };
        observe(stage, &result);
        report.push(result);
    }

    debug_assert_eq!(report.len(), targets.len());
    info!(
        total = report.len(),
        failed = report.failed_count(),
        "probe pipeline finished"
    );
    report
}

/// Validate `config` and run the pipeline. A configuration error means no probe ran.
pub async fn run_validated(
    config: Config,
    listeners: &mut dyn ListenerSource,
    udp: &UdpProber,
    generated_at: &str,
    observe: impl FnMut(Stage, &ProbeResult),
) -> Result<Report, ConfigError> {
    let config = config.validate()?;
    Ok(run(&config, listeners, udp, generated_at, observe).await)
}
