//! Netplan renderer
//!
//! Netplan is the v2 schema's native format, so this renderer is a
//! near-identity projection of the state back into an ordered YAML
//! document under `etc/netplan/`.

use super::{RenderedFile, Renderer, RendererType};
use crate::NetCfgError;
use crate::state::{Interface, InterfaceKind, NetworkState};
use indexmap::IndexMap;
use serde::Serialize;

const NETPLAN_PATH: &str = "etc/netplan/50-netcfg.yaml";

/// Netplan renderer
pub struct NetplanRenderer;

/// Top-level document wrapper
#[derive(Serialize)]
struct NetplanDoc {
    network: NetplanNetwork,
}

/// Field order here fixes the emitted key order, which keeps output
/// stable across renders.
#[derive(Serialize, Default)]
struct NetplanNetwork {
    version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    renderer: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    ethernets: IndexMap<String, NetplanIface>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    bonds: IndexMap<String, NetplanIface>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    bridges: IndexMap<String, NetplanIface>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    vlans: IndexMap<String, NetplanIface>,
}

#[derive(Serialize, Default)]
struct NetplanMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    macaddress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    driver: Option<String>,
}

#[derive(Serialize, Default)]
struct NetplanNameservers {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    search: Vec<String>,
}

#[derive(Serialize, Default)]
struct NetplanRoute {
    to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    via: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metric: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    table: Option<u32>,
}

#[derive(Serialize, Default)]
struct NetplanParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(
        rename = "mii-monitor-interval",
        skip_serializing_if = "Option::is_none"
    )]
    mii_monitor_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary: Option<String>,
    #[serde(
        rename = "transmit-hash-policy",
        skip_serializing_if = "Option::is_none"
    )]
    transmit_hash_policy: Option<String>,
    #[serde(rename = "lacp-rate", skip_serializing_if = "Option::is_none")]
    lacp_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stp: Option<bool>,
    #[serde(rename = "forward-delay", skip_serializing_if = "Option::is_none")]
    forward_delay: Option<u32>,
    #[serde(rename = "hello-time", skip_serializing_if = "Option::is_none")]
    hello_time: Option<u32>,
    #[serde(rename = "max-age", skip_serializing_if = "Option::is_none")]
    max_age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u32>,
}

#[derive(Serialize, Default)]
struct NetplanIface {
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    match_rule: Option<NetplanMatch>,
    #[serde(rename = "set-name", skip_serializing_if = "Option::is_none")]
    set_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dhcp4: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dhcp6: Option<bool>,
    #[serde(rename = "accept-ra", skip_serializing_if = "Option::is_none")]
    accept_ra: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway6: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    macaddress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wakeonlan: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nameservers: Option<NetplanNameservers>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    routes: Vec<NetplanRoute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    interfaces: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<NetplanParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
}

impl NetplanRenderer {
    pub fn new() -> Self {
        Self
    }

    fn convert_iface(&self, state: &NetworkState, iface: &Interface) -> NetplanIface {
        let mut out = NetplanIface {
            dhcp4: iface.dhcp4.then_some(true),
            dhcp6: iface.dhcp6.then_some(true),
            accept_ra: iface.accept_ra,
            addresses: iface.addresses.clone(),
            gateway4: iface.gateway4.clone(),
            gateway6: iface.gateway6.clone(),
            macaddress: iface.mac_address.clone(),
            mtu: iface.mtu,
            wakeonlan: iface.wakeonlan,
            routes: iface
                .routes
                .iter()
                .map(|r| NetplanRoute {
                    to: r.to.clone(),
                    via: r.via.clone(),
                    metric: r.metric,
                    table: r.table,
                })
                .collect(),
            ..Default::default()
        };

        // Effective DNS: the per-interface override already replaced
        // the global lists, so precedence is visible in the output.
        let dns = state.effective_dns(iface);
        if !dns.is_empty() {
            out.nameservers = Some(NetplanNameservers {
                addresses: dns.addresses.clone(),
                search: dns.search.clone(),
            });
        }

        if let Some(rule) = &iface.match_rule {
            out.match_rule = Some(NetplanMatch {
                name: rule.name.clone(),
                macaddress: rule.macaddress.clone(),
                driver: rule.driver.clone(),
            });
            out.set_name = iface.resolved_name.clone();
        }

        match &iface.kind {
            InterfaceKind::Physical | InterfaceKind::Loopback => {}
            InterfaceKind::Bond { members, params } => {
                out.interfaces = members.clone();
                let parameters = NetplanParameters {
                    mode: params.mode.clone(),
                    mii_monitor_interval: params.mii_monitor_interval,
                    primary: params.primary.clone(),
                    transmit_hash_policy: params.transmit_hash_policy.clone(),
                    lacp_rate: params.lacp_rate.clone(),
                    ..Default::default()
                };
                out.parameters = Some(parameters);
            }
            InterfaceKind::Bridge { members, params } => {
                out.interfaces = members.clone();
                out.parameters = Some(NetplanParameters {
                    stp: params.stp,
                    forward_delay: params.forward_delay,
                    hello_time: params.hello_time,
                    max_age: params.max_age,
                    priority: params.priority,
                    ..Default::default()
                });
            }
            InterfaceKind::Vlan { link, id } => {
                out.id = Some(*id);
                out.link = Some(link.clone());
            }
        }

        out
    }
}

impl Default for NetplanRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for NetplanRenderer {
    fn render(&self, state: &NetworkState) -> Result<Vec<RenderedFile>, NetCfgError> {
        let mut network = NetplanNetwork {
            version: 2,
            // Default backend passthrough; an explicit hint wins
            renderer: Some(
                state
                    .renderer_hint()
                    .unwrap_or("networkd")
                    .to_string(),
            ),
            ..Default::default()
        };

        for iface in state.interfaces() {
            let converted = self.convert_iface(state, iface);
            match &iface.kind {
                InterfaceKind::Physical => {
                    network.ethernets.insert(iface.name.clone(), converted);
                }
                InterfaceKind::Bond { .. } => {
                    network.bonds.insert(iface.name.clone(), converted);
                }
                InterfaceKind::Bridge { .. } => {
                    network.bridges.insert(iface.name.clone(), converted);
                }
                InterfaceKind::Vlan { .. } => {
                    network.vlans.insert(iface.name.clone(), converted);
                }
                InterfaceKind::Loopback => {
                    // lo is implicit in netplan; configured loopbacks
                    // cannot be expressed and must not be dropped
                    if !iface.addresses.is_empty() {
                        return Err(NetCfgError::render(
                            "netplan",
                            format!(
                                "loopback interface '{}' with addresses is not expressible",
                                iface.name
                            ),
                        ));
                    }
                }
            }
        }

        let content = serde_yaml::to_string(&NetplanDoc { network })?;
        Ok(vec![RenderedFile::new(NETPLAN_PATH, content, 0o644)])
    }

    fn renderer_type(&self) -> RendererType {
        RendererType::Netplan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_network_config;

    fn render(yaml: &str) -> String {
        let state = parse_network_config(yaml).unwrap();
        let files = NetplanRenderer::new().render(&state).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path.to_str().unwrap(), NETPLAN_PATH);
        files[0].content.clone()
    }

    #[test]
    fn test_v2_round_trip_fields_preserved() {
        let content = render(
            r#"
network:
  version: 2
  ethernets:
    eth0:
      addresses: [192.168.1.10/24, "fd00::2/64"]
      gateway4: 192.168.1.1
      mtu: 9000
      nameservers:
        addresses: [8.8.8.8]
        search: [example.com]
"#,
        );
        assert!(content.contains("version: 2"));
        assert!(content.contains("eth0:"));
        assert!(content.contains("192.168.1.10/24"));
        assert!(content.contains("fd00::2/64"));
        assert!(content.contains("gateway4: 192.168.1.1"));
        assert!(content.contains("mtu: 9000"));
        assert!(content.contains("8.8.8.8"));
        assert!(content.contains("example.com"));
    }

    #[test]
    fn test_default_renderer_passthrough() {
        let content = render("ethernets:\n  eth0:\n    dhcp4: true\n");
        assert!(content.contains("renderer: networkd"));

        let content = render(
            "network:\n  version: 2\n  renderer: NetworkManager\n  ethernets:\n    eth0:\n      dhcp4: true\n",
        );
        assert!(content.contains("renderer: NetworkManager"));
    }

    #[test]
    fn test_match_rule_and_set_name_emitted() {
        let state = crate::schema::parse_network_config_with_macs(
            r#"
ethernets:
  id0:
    match:
      macaddress: "00:11:22:33:44:55"
    dhcp4: true
"#,
            Some(&std::collections::HashMap::from([(
                "00:11:22:33:44:55".to_string(),
                "enp3s0".to_string(),
            )])),
        )
        .unwrap();
        let files = NetplanRenderer::new().render(&state).unwrap();
        let content = &files[0].content;
        assert!(content.contains("match:"));
        assert!(content.contains("macaddress:"));
        assert!(content.contains("00:11:22:33:44:55"));
        assert!(content.contains("set-name: enp3s0"));
    }

    #[test]
    fn test_bond_sections_grouped() {
        let content = render(
            r#"
version: 1
config:
  - type: physical
    name: eth0
  - type: physical
    name: eth1
  - type: bond
    name: bond0
    bond_interfaces: [eth0, eth1]
    bond_mode: active-backup
    subnets:
      - type: dhcp4
"#,
        );
        assert!(content.contains("bonds:"));
        assert!(content.contains("bond0:"));
        assert!(content.contains("mode: active-backup"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let yaml = r#"
ethernets:
  eth1:
    dhcp4: true
  eth0:
    addresses: [10.0.0.2/24]
"#;
        assert_eq!(render(yaml), render(yaml));
    }
}
