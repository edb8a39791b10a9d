use std::time::Duration;

use anyhow::Result;
use portcheck::config::{Config, ConfigError};
use portcheck::listeners::{Listener, ListenerSource};
use portcheck::pipeline::{self, Stage};
use portcheck::types::{ProbeStatus, ProbeType, Protocol};
use portcheck::udp::UdpProber;
use tokio::net::{TcpListener, UdpSocket};

struct FakeListeners {
    listeners: Vec<Listener>,
}

impl ListenerSource for FakeListeners {
    fn listeners(&mut self) -> Result<Vec<Listener>> {
        Ok(self.listeners.clone())
    }

    fn process_name(&mut self, pid: u32) -> Option<String> {
        (pid == 1234).then(|| "LinkAgent".to_string())
    }
}

fn link_agent() -> FakeListeners {
    FakeListeners {
        listeners: vec![Listener { port: 21587, pids: vec![1234] }],
    }
}

fn config(host: &str) -> Config {
    let mut cfg = Config::with_remote_host(host);
    cfg.timeout = Duration::from_millis(1000);
    cfg
}

#[tokio::test]
async fn unreachable_host_yields_one_result_per_port() {
    let cfg = config("no-such-host.invalid");
    let mut seen = Vec::new();
    let report = pipeline::run(&cfg, &mut link_agent(), &UdpProber::Socket, "20261018_000000", |s, r| {
        seen.push((s, r.port))
    })
    .await;

    assert_eq!(report.len(), cfg.expected_results());
    assert_eq!(seen.len(), report.len());
    assert_eq!(seen[0], (Stage::LocalListeners, 21587));

    let local: Vec<_> = report.entries.iter().filter(|e| e.probe_type == ProbeType::Local).collect();
    assert_eq!(local.len(), 2);
    assert_eq!(local[0].status, ProbeStatus::Listening);
    assert_eq!(local[0].process.as_deref(), Some("LinkAgent (PID 1234)"));
    assert_eq!(local[1].status, ProbeStatus::NotListening);

    for e in report.entries.iter().filter(|e| e.probe_type == ProbeType::Remote) {
        assert_ne!(e.status, ProbeStatus::Reachable);
        match e.protocol {
            Protocol::Tcp => assert_eq!(e.status, ProbeStatus::NotReachable),
            Protocol::Udp => assert!(matches!(
                e.status,
                ProbeStatus::SendFailed | ProbeStatus::Unconfirmed
            )),
        }
        assert!(e.process.is_none());
    }
}

#[tokio::test]
async fn loopback_peer_is_classified_and_order_is_kept() {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let tcp_port = tcp.local_addr().unwrap().port();
    let udp_port = udp.local_addr().unwrap().port();

    let mut cfg = config("127.0.0.1");
    cfg.local_tcp_ports = vec![21587];
    cfg.remote_tcp_ports = vec![tcp_port];
    cfg.remote_udp_ports = vec![udp_port];

    let report = pipeline::run(&cfg, &mut link_agent(), &UdpProber::Socket, "20261018_000000", |_, _| {})
        .await;

    let statuses: Vec<ProbeStatus> = report.entries.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            ProbeStatus::Listening,
            ProbeStatus::Reachable,
            ProbeStatus::SentUnconfirmed
        ]
    );

    // Same environment, same classification.
    let again = pipeline::run(&cfg, &mut link_agent(), &UdpProber::Socket, "20261018_000001", |_, _| {})
        .await;
    let again: Vec<ProbeStatus> = again.entries.iter().map(|e| e.status).collect();
    assert_eq!(again, statuses);
}

#[tokio::test]
async fn empty_host_runs_no_probes() {
    let mut observed = 0usize;
    let res = pipeline::run_validated(
        config(""),
        &mut link_agent(),
        &UdpProber::Socket,
        "20261018_000000",
        |_, _| observed += 1,
    )
    .await;
    assert_eq!(res.unwrap_err(), ConfigError::EmptyRemoteHost);
    assert_eq!(observed, 0);
}

#[tokio::test]
async fn empty_port_lists_give_empty_report() {
    let mut cfg = config("127.0.0.1");
    cfg.local_tcp_ports.clear();
    cfg.remote_tcp_ports.clear();
    cfg.remote_udp_ports.clear();
    let report = pipeline::run(&cfg, &mut link_agent(), &UdpProber::Socket, "20261018_000000", |_, _| {})
        .await;
    assert!(report.is_empty());
}

#[tokio::test]
async fn each_result_is_observed_before_the_next_probe_runs() {
    let (first, second) = {
        let a = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let b = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        (a.local_addr().unwrap().port(), b.local_addr().unwrap().port())
    };

    let mut cfg = config("127.0.0.1");
    cfg.local_tcp_ports.clear();
    cfg.remote_tcp_ports = vec![first, second];
    cfg.remote_udp_ports.clear();

    // The second port only starts listening once the first result has been observed.
    let mut opened: Option<std::net::TcpListener> = None;
    let report = pipeline::run(&cfg, &mut link_agent(), &UdpProber::Socket, "20261018_000000", |_, r| {
        if r.port == first {
            opened = Some(std::net::TcpListener::bind(("127.0.0.1", second)).unwrap());
        }
    })
    .await;

    let statuses: Vec<ProbeStatus> = report.entries.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![ProbeStatus::NotReachable, ProbeStatus::Reachable]);
    drop(opened);
}
