use std::net::IpAddr;

use ipnet::IpNet;
use shared::util::IpClass;

/// Wraps `shared::util::classify_ip` with the daemon's configured WireGuard
/// subnet, so callers don't have to thread `Option<&IpNet>` around.
#[derive(Debug, Clone, Copy)]
pub struct IpClassifier {
    wireguard_subnet: Option<IpNet>,
}

impl IpClassifier {
    pub fn new(wireguard_subnet: Option<IpNet>) -> Self {
        Self { wireguard_subnet }
    }

    pub fn classify(&self, addr: IpAddr) -> IpClass {
        shared::util::classify_ip(addr, self.wireguard_subnet.as_ref())
    }

    pub fn is_lan(&self, addr: IpAddr) -> bool {
        matches!(self.classify(addr), IpClass::Lan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn lan_without_wireguard_subnet() {
        let classifier = IpClassifier::new(None);
        assert!(classifier.is_lan(IpAddr::from_str("192.168.1.5").unwrap()));
        assert!(!classifier.is_lan(IpAddr::from_str("8.8.8.8").unwrap()));
    }

    #[test]
    fn wireguard_subnet_counts_as_lan() {
        let subnet = IpNet::from_str("100.64.0.0/24").unwrap();
        let classifier = IpClassifier::new(Some(subnet));
        assert!(classifier.is_lan(IpAddr::from_str("100.64.0.9").unwrap()));
        assert!(!classifier.is_lan(IpAddr::from_str("100.64.1.9").unwrap()));
    }
}
