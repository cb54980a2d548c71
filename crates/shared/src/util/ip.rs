use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpClass {
    Lan,
    Wan,
}

/// Resolves the address `classify_ip` should see from a request's immediate
/// peer address and its `X-Forwarded-For` header, if any. nosd sits behind a
/// local reverse proxy, so every real request's peer is that proxy's own
/// loopback socket; classifying the peer directly would make every request
/// look like LAN regardless of where it actually originated. Only a
/// loopback peer is trusted to forward a client address at all, and only
/// the leftmost (client) entry of the header is taken, so a non-loopback
/// peer can't spoof its origin by setting the header itself.
pub fn resolve_client_ip(peer: IpAddr, forwarded_for: Option<&str>) -> IpAddr {
    if !peer.is_loopback() {
        return peer;
    }
    let Some(header) = forwarded_for else {
        return peer;
    };
    header
        .split(',')
        .next()
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .unwrap_or(peer)
}

/// Classifies a source address as LAN/VPN or WAN: RFC1918 + IPv6 ULA + the
/// configured WireGuard subnet count as LAN/VPN, everything else is WAN.
/// Pure and deterministic given `wg_subnet`. Callers behind a reverse proxy
/// must resolve the real client address with `resolve_client_ip` first.
pub fn classify_ip(addr: IpAddr, wg_subnet: Option<&IpNet>) -> IpClass {
    if is_loopback_or_private(addr) {
        return IpClass::Lan;
    }
    if let Some(subnet) = wg_subnet
        && subnet.contains(&addr)
    {
        return IpClass::Lan;
    }
    IpClass::Wan
}

fn is_loopback_or_private(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_loopback() || is_rfc1918(v4),
        IpAddr::V6(v6) => v6.is_loopback() || is_unique_local(v6),
    }
}

fn is_rfc1918(addr: Ipv4Addr) -> bool {
    let [a, b, ..] = addr.octets();
    match a {
        10 => true,
        172 => (16..=31).contains(&b),
        192 => b == 168,
        _ => false,
    }
}

/// `fc00::/7`.
fn is_unique_local(addr: Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xfe00) == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ip(s: &str) -> IpAddr {
        IpAddr::from_str(s).unwrap()
    }

    #[test]
    fn classifies_rfc1918_ranges_as_lan() {
        assert_eq!(classify_ip(ip("10.1.2.3"), None), IpClass::Lan);
        assert_eq!(classify_ip(ip("172.16.0.1"), None), IpClass::Lan);
        assert_eq!(classify_ip(ip("172.31.255.254"), None), IpClass::Lan);
        assert_eq!(classify_ip(ip("192.168.1.1"), None), IpClass::Lan);
    }

    #[test]
    fn classifies_172_outside_range_as_wan() {
        assert_eq!(classify_ip(ip("172.32.0.1"), None), IpClass::Wan);
        assert_eq!(classify_ip(ip("172.15.255.255"), None), IpClass::Wan);
    }

    #[test]
    fn classifies_public_v4_as_wan() {
        assert_eq!(classify_ip(ip("8.8.8.8"), None), IpClass::Wan);
    }

    #[test]
    fn classifies_ipv6_ula_as_lan() {
        assert_eq!(classify_ip(ip("fd00::1"), None), IpClass::Lan);
        assert_eq!(classify_ip(ip("fc00::1"), None), IpClass::Lan);
    }

    #[test]
    fn classifies_public_v6_as_wan() {
        assert_eq!(classify_ip(ip("2001:4860:4860::8888"), None), IpClass::Wan);
    }

    #[test]
    fn classifies_configured_wg_subnet_as_lan() {
        let wg = IpNet::from_str("10.66.0.0/24").unwrap();
        // 10.66.0.5 already matches RFC1918 10/8, so use a subnet outside it
        // to prove the wg_subnet argument itself is consulted.
        let wg2 = IpNet::from_str("100.64.0.0/24").unwrap();
        assert_eq!(classify_ip(ip("10.66.0.5"), Some(&wg)), IpClass::Lan);
        assert_eq!(classify_ip(ip("100.64.0.5"), Some(&wg2)), IpClass::Lan);
        assert_eq!(classify_ip(ip("100.64.1.5"), Some(&wg2)), IpClass::Wan);
    }

    #[test]
    fn loopback_is_lan() {
        assert_eq!(classify_ip(ip("127.0.0.1"), None), IpClass::Lan);
        assert_eq!(classify_ip(ip("::1"), None), IpClass::Lan);
    }

    #[test]
    fn resolve_client_ip_trusts_forwarded_header_only_from_loopback_peer() {
        assert_eq!(
            resolve_client_ip(ip("127.0.0.1"), Some("8.8.8.8")),
            ip("8.8.8.8")
        );
        assert_eq!(
            resolve_client_ip(ip("192.168.1.50"), Some("8.8.8.8")),
            ip("192.168.1.50")
        );
    }

    #[test]
    fn resolve_client_ip_takes_leftmost_entry_of_forwarded_chain() {
        assert_eq!(
            resolve_client_ip(ip("::1"), Some(" 8.8.8.8 , 10.0.0.1")),
            ip("8.8.8.8")
        );
    }

    #[test]
    fn resolve_client_ip_falls_back_to_peer_without_header() {
        assert_eq!(resolve_client_ip(ip("127.0.0.1"), None), ip("127.0.0.1"));
    }

    #[test]
    fn classifying_proxy_loopback_directly_would_be_wrong_lan_result() {
        // Demonstrates why resolve_client_ip must run first: classifying
        // the raw peer address of a reverse-proxied request always yields
        // Lan, even for a WAN client, unless the real address is resolved.
        let wan_client = resolve_client_ip(ip("127.0.0.1"), Some("203.0.113.9"));
        assert_eq!(classify_ip(wan_client, None), IpClass::Wan);
    }
}
