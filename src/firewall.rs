//! Best-effort summary of the host firewall: which front-end is present, whether it is
//! enforcing, and which of its rules mention the ports under test.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tokio::time;
use tracing::{debug, warn};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallStatus {
    Active,
    Inactive,
    Unknown,
    NotDetected,
}

impl fmt::Display for FirewallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirewallStatus::Active => f.write_str("active"),
            FirewallStatus::Inactive => f.write_str("inactive"),
            FirewallStatus::Unknown => f.write_str("unknown"),
            FirewallStatus::NotDetected => f.write_str("not detected"),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FirewallPosture {
    pub tool: Option<String>,
    pub status: FirewallStatus,
    /// Rule lines mentioning one of the configured ports.
    pub rules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl FirewallPosture {
    fn not_detected() -> Self {
        Self {
            tool: None,
            status: FirewallStatus::NotDetected,
            rules: Vec::new(),
            note: None,
        }
    }
}

struct Frontend {
    name: &'static str,
    binary: &'static str,
    status_args: &'static [&'static str],
    rules_args: Option<&'static [&'static str]>,
    parse_status: fn(&str) -> FirewallStatus,
}

#[cfg(target_os = "linux")]
const FRONTENDS: &[Frontend] = &[
    Frontend {
        name: "ufw",
        binary: "ufw",
        status_args: &["status"],
        rules_args: None,
        parse_status: parse_ufw_status,
    },
    Frontend {
        name: "firewalld",
        binary: "firewall-cmd",
        status_args: &["--state"],
        rules_args: Some(&["--list-all"]),
        parse_status: parse_firewalld_state,
    },
    Frontend {
        name: "nftables",
        binary: "nft",
        status_args: &["list", "ruleset"],
        rules_args: None,
        parse_status: parse_nft_ruleset,
    },
    Frontend {
        name: "iptables",
        binary: "iptables",
        status_args: &["-S"],
        rules_args: None,
        parse_status: parse_iptables_rules,
    },
];

#[cfg(target_os = "macos")]
const FRONTENDS: &[Frontend] = &[Frontend {
    name: "application firewall",
    binary: "/usr/libexec/ApplicationFirewall/socketfilterfw",
    status_args: &["--getglobalstate"],
    rules_args: None,
    parse_status: parse_socketfilterfw_state,
}];

#[cfg(windows)]
const FRONTENDS: &[Frontend] = &[Frontend {
    name: "windows firewall",
    binary: "netsh",
    status_args: &["advfirewall", "show", "allprofiles", "state"],
    rules_args: Some(&["advfirewall", "firewall", "show", "rule", "name=all"]),
    parse_status: parse_netsh_state,
}];

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
const FRONTENDS: &[Frontend] = &[];

/// Inspect the first firewall front-end found on this host.
///
/// Never fails: missing tools give `NotDetected`, failing commands give `Unknown`.
pub async fn detect_posture(ports: &[u16]) -> FirewallPosture {
    for fe in FRONTENDS {
        let Some(path) = locate(fe.binary) else {
            debug!(tool = fe.name, "firewall front-end not installed");
            continue;
        };
        return inspect(fe, &path, ports).await;
    }
    FirewallPosture::not_detected()
}

async fn inspect(fe: &Frontend, path: &Path, ports: &[u16]) -> FirewallPosture {
    let mut posture = FirewallPosture {
        tool: Some(fe.name.to_string()),
        status: FirewallStatus::Unknown,
        rules: Vec::new(),
        note: None,
    };

    let status_out = match run(path, fe.status_args).await {
        Ok(out) => out,
        Err(e) => {
            warn!(tool = fe.name, error = %e, "firewall status query failed");
            posture.note = Some(e);
            return posture;
        }
    };
    posture.status = (fe.parse_status)(&status_out);

    let rules_out = match fe.rules_args {
        Some(args) => match run(path, args).await {
            Ok(out) => out,
            Err(e) => {
                warn!(tool = fe.name, error = %e, "firewall rule listing failed");
                posture.note = Some(e);
                return posture;
            }
        },
        None => status_out,
    };
    posture.rules = rule_lines_for_ports(&rules_out, ports);
    posture
}

fn locate(binary: &str) -> Option<PathBuf> {
    let p = Path::new(binary);
    if p.is_absolute() {
        return p.exists().then(|| p.to_path_buf());
    }
    which::which(binary).ok()
}

/// Run a query command and return its stdout, or a one-line reason it failed.
async fn run(path: &Path, args: &[&str]) -> Result<String, String> {
    let child = Command::new(path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("could not run {}: {e}", path.display()))?;

    let output = time::timeout(COMMAND_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| format!("{} timed out", path.display()))?
        .map_err(|e| format!("{} failed: {e}", path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let first = stderr.lines().next().unwrap_or("").trim();
        return Err(format!("{} exited with {}: {first}", path.display(), output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Lines that mention any of `ports` as a standalone number.
pub fn rule_lines_for_ports(output: &str, ports: &[u16]) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            line.split(|c: char| !c.is_ascii_digit())
                .filter_map(|tok| tok.parse::<u32>().ok())
                .any(|n| ports.iter().any(|&p| u32::from(p) == n))
        })
        .map(str::to_string)
        .collect()
}

pub fn parse_ufw_status(out: &str) -> FirewallStatus {
    for line in out.lines() {
        if let Some(rest) = line.trim().strip_prefix("Status:") {
            return match rest.trim() {
                "active" => FirewallStatus::Active,
                "inactive" => FirewallStatus::Inactive,
                _ => FirewallStatus::Unknown,
            };
        }
    }
    FirewallStatus::Unknown
}

pub fn parse_firewalld_state(out: &str) -> FirewallStatus {
    match out.trim() {
        "running" => FirewallStatus::Active,
        "not running" => FirewallStatus::Inactive,
        _ => FirewallStatus::Unknown,
    }
}

/// A ruleset with at least one chain is enforcing something; an empty one is not.
pub fn parse_nft_ruleset(out: &str) -> FirewallStatus {
    if out.lines().any(|l| l.trim_start().starts_with("chain ")) {
        FirewallStatus::Active
    } else {
        FirewallStatus::Inactive
    }
}

/// Active when any rule is appended or a built-in chain's policy is not ACCEPT.
pub fn parse_iptables_rules(out: &str) -> FirewallStatus {
    let active = out.lines().map(str::trim).any(|l| {
        l.starts_with("-A ") || (l.starts_with("-P ") && !l.ends_with("ACCEPT"))
    });
    if active {
        FirewallStatus::Active
    } else {
        FirewallStatus::Inactive
    }
}

pub fn parse_socketfilterfw_state(out: &str) -> FirewallStatus {
    let lower = out.to_ascii_lowercase();
    if lower.contains("disabled") {
        FirewallStatus::Inactive
    } else if lower.contains("enabled") {
        FirewallStatus::Active
    } else {
        FirewallStatus::Unknown
    }
}

/// Active if any profile reports `State ON`.
pub fn parse_netsh_state(out: &str) -> FirewallStatus {
    let states: Vec<&str> = out
        .lines()
        .filter_map(|l| l.trim().strip_prefix("State"))
        .map(str::trim)
        .collect();
    if states.iter().any(|s| s.eq_ignore_ascii_case("on")) {
        FirewallStatus::Active
    } else if !states.is_empty() {
        FirewallStatus::Inactive
    } else {
        FirewallStatus::Unknown
    }
}
