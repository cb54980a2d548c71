use askama::Template;

use shared::model::FirewallMode;

use crate::sanitize::assert_safe_field;

#[derive(Template)]
#[template(path = "nftables/ruleset.jinja", ext = "txt")]
pub struct NftablesTemplate {
    pub mode: FirewallMode,
    pub enable_wg: bool,
    pub enable_https: bool,
    pub wg_port: u16,
    pub custom_rules: Vec<String>,
}

impl NftablesTemplate {
    pub fn new(
        mode: FirewallMode,
        enable_wg: bool,
        enable_https: bool,
        wg_port: u16,
        custom_rules: Vec<String>,
    ) -> anyhow::Result<Self> {
        for rule in &custom_rules {
            assert_safe_field("firewall.custom_rule", rule)?;
        }
        Ok(Self { mode, enable_wg, enable_https, wg_port, custom_rules })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lan_only_drops_input_by_default() {
        let tpl = NftablesTemplate::new(FirewallMode::LanOnly, false, false, 51820, vec![]).unwrap();
        let out = tpl.render().unwrap();
        assert!(out.contains("policy drop"));
        assert!(out.contains("ct state established,related accept"));
        assert!(out.contains("iif \"lo\" accept"));
    }

    #[test]
    fn wireguard_mode_opens_wg_port() {
        let tpl = NftablesTemplate::new(FirewallMode::Wireguard, true, false, 51820, vec![]).unwrap();
        let out = tpl.render().unwrap();
        assert!(out.contains("udp dport 51820 accept"));
    }

    #[test]
    fn public_https_mode_opens_443() {
        let tpl = NftablesTemplate::new(FirewallMode::PublicHttps, false, true, 51820, vec![]).unwrap();
        let out = tpl.render().unwrap();
        assert!(out.contains("tcp dport 443 accept"));
    }
}
