use anyhow::{bail, Context, Result};
use std::fmt;
use std::str::FromStr;

/// Local TCP ports the application side is expected to listen on.
pub const DEFAULT_LOCAL_TCP: &[u16] = &[21587, 21588];

/// Remote TCP ports the peer side is expected to accept connections on.
pub const DEFAULT_REMOTE_TCP: &[u16] = &[443, 3023, 3025];

/// Remote UDP ports the peer side is expected to receive datagrams on.
pub const DEFAULT_REMOTE_UDP: &[u16] = &[3022, 3024];

/// Parse a port list into an ordered, deduplicated list of ports (1..=65535).
///
/// Supported formats, separated by commas or whitespace:
/// - single port number: `443`
/// - inclusive range: `3022-3024`
///
/// The first appearance of a port decides its position. An empty input yields an empty list.
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for item in s.split(|c: char| c == ',' || c.is_whitespace()) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        if let Some((a, b)) = item.split_once('-') {
            let start = parse_port_str(a.trim())
                .with_context(|| format!("invalid start in range: {item}"))?;
            let end = parse_port_str(b.trim())
                .with_context(|| format!("invalid end in range: {item}"))?;
            if start > end {
                bail!("invalid range {start}-{end} (start > end)");
            }
            for p in start..=end {
                if seen.insert(p) {
                    out.push(p);
                }
            }
            continue;
        }

        let p = parse_port_str(item).with_context(|| format!("invalid port value: {item}"))?;
        if seen.insert(p) {
            out.push(p);
        }
    }

    Ok(out)
}

/// Ordered port list as accepted on the command line, e.g. `443,3023-3025`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortList(pub Vec<u16>);

impl FromStr for PortList {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_ports_str(s).map(PortList)
    }
}

impl fmt::Display for PortList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(u16::to_string).collect();
        f.write_str(&joined.join(","))
    }
}

impl From<&[u16]> for PortList {
    fn from(ports: &[u16]) -> Self {
        PortList(ports.to_vec())
    }
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_comma_list() {
        let ports = parse_ports_str("443, 3023,3025").unwrap();
        assert_eq!(ports, vec![443, 3023, 3025]);
    }

    #[test]
    fn parse_ranges_and_dedup() {
        let ports = parse_ports_str("3022-3024,443,3023").unwrap();
        assert_eq!(ports, vec![3022, 3023, 3024, 443]);
    }

    #[test]
    fn empty_input_is_empty_list() {
        assert!(parse_ports_str("").unwrap().is_empty());
        assert!(parse_ports_str(" , ").unwrap().is_empty());
    }

    #[test]
    fn invalid_values_error() {
        assert!(parse_ports_str("70000").is_err());
        assert!(parse_ports_str("0").is_err());
        assert!(parse_ports_str("9-3").is_err());
        assert!(parse_ports_str("http").is_err());
    }

    #[test]
    fn port_list_display_is_reparseable() {
        let list: PortList = "3022-3024, 443".parse().unwrap();
        assert_eq!(list.to_string(), "3022,3023,3024,443");
        assert_eq!(list.to_string().parse::<PortList>().unwrap(), list);
        assert_eq!(PortList::from(DEFAULT_REMOTE_UDP).to_string(), "3022,3024");
    }
}
