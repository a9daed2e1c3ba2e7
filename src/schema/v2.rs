//! Network config v2 (netplan-native format) parsing
//!
//! v2 maps interface keys to per-interface config under `ethernets`,
//! `bonds`, `bridges` and `vlans`. Matching rules are kept verbatim on
//! the built interface so backends that support deferred matching can
//! emit them as-is; when the host supplied a MAC table, a concrete
//! kernel name is recorded alongside the rule.

use crate::NetCfgError;
use crate::state::{
    BondParams, BridgeParams, DnsConfig, Interface, InterfaceKind, MatchRule, NetworkState, Route,
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// v2 document body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfigV2 {
    pub renderer: Option<String>,
    #[serde(default)]
    pub ethernets: IndexMap<String, EthernetV2>,
    #[serde(default)]
    pub bonds: IndexMap<String, BondV2>,
    #[serde(default)]
    pub bridges: IndexMap<String, BridgeV2>,
    #[serde(default)]
    pub vlans: IndexMap<String, VlanV2>,
}

/// Settings shared by every v2 interface section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonV2 {
    pub dhcp4: Option<bool>,
    pub dhcp6: Option<bool>,
    #[serde(default)]
    pub addresses: Vec<String>,
    pub gateway4: Option<String>,
    pub gateway6: Option<String>,
    pub nameservers: Option<NameserversV2>,
    pub mtu: Option<u32>,
    pub macaddress: Option<String>,
    #[serde(rename = "accept-ra")]
    pub accept_ra: Option<bool>,
    pub wakeonlan: Option<bool>,
    #[serde(default)]
    pub routes: Vec<RouteV2>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NameserversV2 {
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub search: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteV2 {
    pub to: String,
    pub via: Option<String>,
    pub metric: Option<u32>,
    pub table: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchV2 {
    pub name: Option<String>,
    pub macaddress: Option<String>,
    pub driver: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EthernetV2 {
    #[serde(flatten)]
    pub common: CommonV2,
    #[serde(rename = "match")]
    pub match_rule: Option<MatchV2>,
    #[serde(rename = "set-name")]
    pub set_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BondV2 {
    #[serde(flatten)]
    pub common: CommonV2,
    #[serde(default)]
    pub interfaces: Vec<String>,
    pub parameters: Option<BondParametersV2>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BondParametersV2 {
    pub mode: Option<String>,
    #[serde(rename = "mii-monitor-interval")]
    pub mii_monitor_interval: Option<u32>,
    pub primary: Option<String>,
    #[serde(rename = "transmit-hash-policy")]
    pub transmit_hash_policy: Option<String>,
    #[serde(rename = "lacp-rate")]
    pub lacp_rate: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeV2 {
    #[serde(flatten)]
    pub common: CommonV2,
    #[serde(default)]
    pub interfaces: Vec<String>,
    pub parameters: Option<BridgeParametersV2>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeParametersV2 {
    pub stp: Option<bool>,
    #[serde(rename = "forward-delay")]
    pub forward_delay: Option<u32>,
    #[serde(rename = "hello-time")]
    pub hello_time: Option<u32>,
    #[serde(rename = "max-age")]
    pub max_age: Option<u32>,
    pub priority: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VlanV2 {
    #[serde(flatten)]
    pub common: CommonV2,
    pub id: u16,
    pub link: String,
}

/// Build a `NetworkState` from a v2 document.
///
/// `mac_table` is the host-supplied MAC → kernel-name mapping; absence
/// defers matching to render time, it is never an error.
pub(crate) fn build_state(
    config: NetworkConfigV2,
    mac_table: Option<&HashMap<String, String>>,
) -> Result<NetworkState, NetCfgError> {
    debug!(
        ethernets = config.ethernets.len(),
        bonds = config.bonds.len(),
        bridges = config.bridges.len(),
        vlans = config.vlans.len(),
        "Building network state from v2 config"
    );

    let mut state = NetworkState::new(2);
    state.set_renderer_hint(config.renderer);

    for (key, eth) in config.ethernets {
        let mut iface = Interface::new(&key, InterfaceKind::Physical);
        apply_common(&mut iface, &eth.common);

        if let Some(rule) = &eth.match_rule {
            let preserved = MatchRule {
                name: rule.name.clone(),
                macaddress: rule.macaddress.clone(),
                driver: rule.driver.clone(),
            };
            if preserved.is_empty() {
                return Err(NetCfgError::schema(format!(
                    "ethernet '{key}' has an empty match rule; \
                     at least one of name, macaddress or driver is required"
                )));
            }
            iface.resolved_name = resolve_concrete_name(rule, eth.set_name.as_deref(), mac_table);
            iface.match_rule = Some(preserved);
        }

        state.insert_interface(iface)?;
    }

    for (key, bond) in config.bonds {
        let params = bond.parameters.unwrap_or_default();
        let mut iface = Interface::new(
            &key,
            InterfaceKind::Bond {
                members: bond.interfaces,
                params: BondParams {
                    mode: params.mode,
                    mii_monitor_interval: params.mii_monitor_interval,
                    primary: params.primary,
                    transmit_hash_policy: params.transmit_hash_policy,
                    lacp_rate: params.lacp_rate,
                },
            },
        );
        apply_common(&mut iface, &bond.common);
        state.insert_interface(iface)?;
    }

    for (key, bridge) in config.bridges {
        let params = bridge.parameters.unwrap_or_default();
        let mut iface = Interface::new(
            &key,
            InterfaceKind::Bridge {
                members: bridge.interfaces,
                params: BridgeParams {
                    stp: params.stp,
                    forward_delay: params.forward_delay,
                    hello_time: params.hello_time,
                    max_age: params.max_age,
                    priority: params.priority,
                },
            },
        );
        apply_common(&mut iface, &bridge.common);
        state.insert_interface(iface)?;
    }

    for (key, vlan) in config.vlans {
        let mut iface = Interface::new(
            &key,
            InterfaceKind::Vlan {
                link: vlan.link,
                id: vlan.id,
            },
        );
        apply_common(&mut iface, &vlan.common);
        state.insert_interface(iface)?;
    }

    state.validate_references()?;
    Ok(state)
}

fn apply_common(iface: &mut Interface, common: &CommonV2) {
    iface.dhcp4 = common.dhcp4.unwrap_or(false);
    iface.dhcp6 = common.dhcp6.unwrap_or(false);
    iface.addresses = common.addresses.clone();
    iface.gateway4 = common.gateway4.clone();
    iface.gateway6 = common.gateway6.clone();
    iface.mtu = common.mtu;
    iface.mac_address = common.macaddress.clone();
    iface.accept_ra = common.accept_ra;
    iface.wakeonlan = common.wakeonlan;
    iface.routes = common
        .routes
        .iter()
        .map(|r| Route {
            to: r.to.clone(),
            via: r.via.clone(),
            metric: r.metric,
            table: r.table,
        })
        .collect();

    if let Some(ns) = &common.nameservers {
        let dns = DnsConfig {
            addresses: ns.addresses.clone(),
            search: ns.search.clone(),
        };
        if !dns.is_empty() {
            iface.dns = Some(dns);
        }
    }
}

fn resolve_concrete_name(
    rule: &MatchV2,
    set_name: Option<&str>,
    mac_table: Option<&HashMap<String, String>>,
) -> Option<String> {
    // set-name renames the matched device, so it wins outright
    if let Some(name) = set_name {
        return Some(name.to_string());
    }
    let table = mac_table?;
    let mac = rule.macaddress.as_ref()?.to_lowercase();
    table
        .iter()
        .find(|(k, _)| k.to_lowercase() == mac)
        .map(|(_, name)| name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> NetworkConfigV2 {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_ethernet_static() {
        let config = parse(
            r#"
ethernets:
  eth0:
    addresses: [192.168.1.10/24]
    gateway4: 192.168.1.1
    mtu: 9000
    nameservers:
      addresses: [8.8.8.8]
      search: [example.com]
"#,
        );
        let state = build_state(config, None).unwrap();
        let eth0 = state.get("eth0").unwrap();
        assert_eq!(eth0.addresses, vec!["192.168.1.10/24"]);
        assert_eq!(eth0.mtu, Some(9000));
        assert_eq!(eth0.dns.as_ref().unwrap().addresses, vec!["8.8.8.8"]);
        assert_eq!(eth0.concrete_name(), Some("eth0"));
    }

    #[test]
    fn test_match_rule_preserved_and_deferred() {
        let config = parse(
            r#"
ethernets:
  id0:
    match:
      macaddress: "00:11:22:33:44:55"
    dhcp4: true
"#,
        );
        let state = build_state(config, None).unwrap();
        let id0 = state.get("id0").unwrap();
        let rule = id0.match_rule.as_ref().unwrap();
        assert_eq!(rule.macaddress.as_deref(), Some("00:11:22:33:44:55"));
        // No MAC table supplied: matching deferred, not an error
        assert_eq!(id0.concrete_name(), None);
    }

    #[test]
    fn test_match_resolved_against_mac_table() {
        let config = parse(
            r#"
ethernets:
  id0:
    match:
      macaddress: "00:11:22:33:44:55"
    dhcp4: true
"#,
        );
        let mut table = HashMap::new();
        table.insert("00:11:22:33:44:55".to_string(), "enp3s0".to_string());
        let state = build_state(config, Some(&table)).unwrap();
        assert_eq!(state.get("id0").unwrap().concrete_name(), Some("enp3s0"));
    }

    #[test]
    fn test_set_name_wins_over_mac_table() {
        let config = parse(
            r#"
ethernets:
  id0:
    match:
      macaddress: "00:11:22:33:44:55"
    set-name: lan0
"#,
        );
        let mut table = HashMap::new();
        table.insert("00:11:22:33:44:55".to_string(), "enp3s0".to_string());
        let state = build_state(config, Some(&table)).unwrap();
        assert_eq!(state.get("id0").unwrap().concrete_name(), Some("lan0"));
    }

    #[test]
    fn test_empty_match_rule_rejected() {
        let config = parse(
            r#"
ethernets:
  id0:
    match: {}
    dhcp4: true
"#,
        );
        assert!(matches!(
            build_state(config, None).unwrap_err(),
            NetCfgError::Schema(_)
        ));
    }

    #[test]
    fn test_bond_bridge_vlan_links() {
        let config = parse(
            r#"
ethernets:
  eth0: {}
  eth1: {}
bonds:
  bond0:
    interfaces: [eth0, eth1]
    parameters:
      mode: active-backup
      mii-monitor-interval: 100
vlans:
  bond0.10:
    id: 10
    link: bond0
    addresses: [10.0.10.2/24]
"#,
        );
        let state = build_state(config, None).unwrap();
        let bond0 = state.get("bond0").unwrap();
        assert_eq!(state.members_of(bond0).len(), 2);
        let vlan = state.get("bond0.10").unwrap();
        assert_eq!(state.vlan_parent(vlan).unwrap().name, "bond0");
    }

    #[test]
    fn test_dangling_vlan_link_rejected() {
        let config = parse(
            r#"
vlans:
  eth0.100:
    id: 100
    link: eth0
"#,
        );
        assert!(matches!(
            build_state(config, None).unwrap_err(),
            NetCfgError::Reference { .. }
        ));
    }

    #[test]
    fn test_declaration_order_across_sections() {
        let config = parse(
            r#"
ethernets:
  eth1: {}
  eth0: {}
bridges:
  br0:
    interfaces: [eth0, eth1]
"#,
        );
        let state = build_state(config, None).unwrap();
        let names: Vec<_> = state.interfaces().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["eth1", "eth0", "br0"]);
    }
}
