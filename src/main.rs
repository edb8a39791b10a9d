use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use portcheck::config::{Config, UdpStrategyChoice};
use portcheck::firewall::{self, FirewallPosture};
use portcheck::listeners::SystemListeners;
use portcheck::netdetect;
use portcheck::pipeline::{self, Stage};
use portcheck::ports::{PortList, DEFAULT_LOCAL_TCP, DEFAULT_REMOTE_TCP, DEFAULT_REMOTE_UDP};
use portcheck::report;
use portcheck::types::Report;
use portcheck::udp::UdpProber;
use portcheck::logging;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};

/// portcheck: verify local listeners and remote TCP/UDP reachability, then write a report.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portcheck",
    version,
    about = "Verify local listening ports and remote TCP/UDP reachability, then write a timestamped report.",
    long_about = None
)]
struct Cli {
    /// Remote host (name or IP). Prompted for on stdin when omitted.
    #[arg(value_name = "REMOTE_HOST")]
    host: Option<String>,

    /// Remote host, as an alternative to the positional argument.
    #[arg(long = "remote-host", conflicts_with = "host")]
    remote_host: Option<String>,

    /// Local TCP ports expected to be listening (comma list and ranges).
    #[arg(long = "local-tcp", default_value_t = PortList::from(DEFAULT_LOCAL_TCP))]
    local_tcp: PortList,

    /// Remote TCP ports expected to accept connections.
    #[arg(long = "remote-tcp", default_value_t = PortList::from(DEFAULT_REMOTE_TCP))]
    remote_tcp: PortList,

    /// Remote UDP ports to send a probe datagram to.
    #[arg(long = "remote-udp", default_value_t = PortList::from(DEFAULT_REMOTE_UDP))]
    remote_udp: PortList,

    /// Per-probe timeout in milliseconds (name resolution and connect are each bounded by it).
    #[arg(long = "timeout-ms", default_value_t = 2000)]
    timeout_ms: u64,

    /// UDP probe strategy.
    #[arg(long = "udp-strategy", value_enum, default_value_t = UdpStrategyChoice::Auto)]
    udp_strategy: UdpStrategyChoice,

    /// Directory the timestamped report is written to.
    #[arg(long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// Report file name prefix.
    #[arg(long = "report-prefix", default_value = "portcheck")]
    report_prefix: String,

    /// Report file extension.
    #[arg(long = "report-ext", default_value = "txt")]
    report_ext: String,

    /// Also write results as pretty JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Skip the firewall posture summary.
    #[arg(long = "skip-firewall", default_value_t = false)]
    skip_firewall: bool,

    /// More log output on stderr (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a Report,
    udp_strategy: &'a str,
    firewall: Option<&'a FirewallPosture>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(logging::level_from_flags(cli.verbose, cli.quiet))?;

    // Taken before any probe so the file name reflects when the run started.
    let generated_at = report::timestamp(report::now());

    let host = match cli.host.clone().or_else(|| cli.remote_host.clone()) {
        Some(h) => h,
        None => prompt_remote_host()?,
    };

    let config = Config {
        remote_host: host,
        local_tcp_ports: cli.local_tcp.0.clone(),
        remote_tcp_ports: cli.remote_tcp.0.clone(),
        remote_udp_ports: cli.remote_udp.0.clone(),
        timeout: Duration::from_millis(cli.timeout_ms),
        udp_strategy: cli.udp_strategy,
        output_dir: cli.output_dir.clone(),
        report_prefix: cli.report_prefix.clone(),
        report_ext: cli.report_ext.clone(),
    };
    let udp = UdpProber::select(config.udp_strategy);

    println!("portcheck configuration:");
    println!("  remote host  : {}", config.remote_host.trim());
    println!("  local tcp    : {}", cli.local_tcp);
    println!("  remote tcp   : {}", cli.remote_tcp);
    println!("  remote udp   : {}", cli.remote_udp);
    println!("  timeout_ms   : {}", config.timeout.as_millis());
    println!("  udp strategy : {}", udp.name());

    print_network_context(config.remote_host.trim());

    let mut listeners = SystemListeners::new();
    let mut current: Option<Stage> = None;
    let report = pipeline::run_validated(
        config.clone(),
        &mut listeners,
        &udp,
        &generated_at,
        |stage, r| {
            if current != Some(stage) {
                println!("\n[{stage}]");
                current = Some(stage);
            }
            match &r.process {
                Some(p) => println!("  {} {:>5}: {} ({})", r.protocol, r.port, r.status, p),
                None => println!("  {} {:>5}: {}", r.protocol, r.port, r.status),
            }
        },
    )
    .await
    .context("invalid configuration")?;

    let posture = if cli.skip_firewall {
        None
    } else {
        let all_ports: Vec<u16> = config
            .local_tcp_ports
            .iter()
            .chain(&config.remote_tcp_ports)
            .chain(&config.remote_udp_ports)
            .copied()
            .collect();
        let p = firewall::detect_posture(&all_ports).await;
        print_firewall(&p);
        Some(p)
    };

    println!(
        "\nResults: {} probes, {} not OK",
        report.len(),
        report.failed_count()
    );
    print!("{}", report::render_table(&report));

    let path = report::write_report(
        &config.output_dir,
        &config.report_prefix,
        &config.report_ext,
        &report,
    )
    .inspect_err(|e| error!(error = %e, "report write failed"))?;
    println!("\nWrote report to {}", path.display());
    info!(path = %path.display(), "report written");

    if let Some(json_path) = cli.json.as_deref() {
        let doc = JsonReport {
            report: &report,
            udp_strategy: udp.name(),
            firewall: posture.as_ref(),
        };
        report::write_results_json(json_path, &doc)?;
        println!("Wrote JSON results to {}", json_path.display());
    }

    Ok(())
}

fn prompt_remote_host() -> Result<String> {
    print!("Remote host (name or IP): ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read remote host from stdin")?;
    Ok(line.trim().to_string())
}

fn print_network_context(remote_host: &str) {
    match netdetect::detect_local_networks() {
        Ok(nets) => {
            println!("Local IPv4 networks:");
            for n in &nets {
                println!("  - {} {} ({})", n.interface, n.net, n.addr);
            }
            if let Some(n) = netdetect::local_network_for(remote_host, &nets) {
                println!("Remote host is on local network {} via {}", n.net, n.interface);
            }
        }
        Err(e) => {
            eprintln!("Warning: failed to list local networks: {e}");
        }
    }
}

fn print_firewall(p: &FirewallPosture) {
    println!("\n[Firewall]");
    match &p.tool {
        Some(tool) => println!("  {tool}: {}", p.status),
        None => println!("  {}", p.status),
    }
    if let Some(note) = &p.note {
        println!("  note: {note}");
    }
    if p.rules.is_empty() {
        if p.tool.is_some() {
            println!("  no rules mention the checked ports");
        }
    } else {
        println!("  rules mentioning checked ports:");
        for rule in &p.rules {
            println!("    {rule}");
        }
    }
}
