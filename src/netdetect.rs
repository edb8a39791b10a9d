use anyhow::Result;
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::net::{IpAddr, Ipv4Addr};

/// A local non-loopback IPv4 network and the interface it is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNetwork {
    pub interface: String,
    pub addr: Ipv4Addr,
    pub net: Ipv4Net,
}

/// Detect local non-loopback IPv4 interfaces and the network each belongs to.
///
/// For example, interface `eth0` with `192.168.1.42/255.255.255.0` becomes `192.168.1.0/24`.
/// Sorted by interface name, then network, for stable output.
pub fn detect_local_networks() -> Result<Vec<LocalNetwork>> {
    let mut out = Vec::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = &iface.addr {
            if v4.ip.is_loopback() {
                continue;
            }
            let Some(net) = network_of(v4.ip, v4.netmask) else {
                continue;
            };
            out.push(LocalNetwork {
                interface: iface.name.clone(),
                addr: v4.ip,
                net,
            });
        }
    }
    out.sort_by(|a, b| {
        a.interface
            .cmp(&b.interface)
            .then(u32::from(a.net.network()).cmp(&u32::from(b.net.network())))
    });
    out.dedup();
    Ok(out)
}

/// Network (address truncated to prefix) of an IPv4 address with its netmask.
pub fn network_of(ip: Ipv4Addr, netmask: Ipv4Addr) -> Option<Ipv4Net> {
    Ipv4Net::with_netmask(ip, netmask).ok().map(|n| n.trunc())
}

/// The first local network containing `host`, if `host` is an IPv4 literal.
///
/// Hostnames are not resolved here; callers get `None` for them.
pub fn local_network_for<'a>(host: &str, networks: &'a [LocalNetwork]) -> Option<&'a LocalNetwork> {
    match host.trim().parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => networks.iter().find(|n| n.net.contains(&v4)),
        IpAddr::V6(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lan() -> LocalNetwork {
        LocalNetwork {
            interface: "eth0".into(),
            addr: Ipv4Addr::new(192, 168, 1, 42),
            net: network_of(Ipv4Addr::new(192, 168, 1, 42), Ipv4Addr::new(255, 255, 255, 0))
                .unwrap(),
        }
    }

    #[test]
    fn network_from_netmask() {
        let net = network_of(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(255, 255, 0, 0)).unwrap();
        assert_eq!(net.to_string(), "10.1.0.0/16");
    }

    #[test]
    fn non_contiguous_netmask_is_rejected() {
        assert!(network_of(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(255, 0, 255, 0)).is_none());
    }

    #[test]
    fn host_inside_local_network() {
        let nets = vec![lan()];
        let found = local_network_for("192.168.1.200", &nets).unwrap();
        assert_eq!(found.interface, "eth0");
        assert!(local_network_for("10.0.0.1", &nets).is_none());
    }

    #[test]
    fn hostnames_are_not_matched() {
        let nets = vec![lan()];
        assert!(local_network_for("peer.example.org", &nets).is_none());
        assert!(local_network_for("::1", &nets).is_none());
    }
}
