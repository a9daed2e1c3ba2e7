//! Network config v1 (legacy format) parsing
//!
//! The v1 schema is a flat list of typed entries. Building state from
//! it is a two-phase walk: phase 1 registers every interface identity
//! (a bond may list members declared later in the file), phase 2
//! resolves membership and parent edges and rejects anything dangling.

use crate::NetCfgError;
use crate::state::{
    BondParams, BridgeParams, DnsConfig, Interface, InterfaceKind, NetworkState, Route,
};
use serde::Deserialize;
use tracing::debug;

/// Individual configuration entry in v1 format
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConfigItem {
    Physical(PhysicalItem),
    Bond(BondItem),
    Bridge(BridgeItem),
    Vlan(VlanItem),
    Loopback(LoopbackItem),
    Nameserver(NameserverItem),
    Route(RouteItem),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhysicalItem {
    pub name: String,
    pub mac_address: Option<String>,
    pub mtu: Option<u32>,
    #[serde(default)]
    pub subnets: Vec<SubnetItem>,
    pub wakeonlan: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BondItem {
    pub name: String,
    #[serde(default)]
    pub bond_interfaces: Vec<String>,
    pub bond_mode: Option<String>,
    pub bond_miimon: Option<u32>,
    pub bond_xmit_hash_policy: Option<String>,
    pub bond_lacp_rate: Option<String>,
    pub mac_address: Option<String>,
    pub mtu: Option<u32>,
    #[serde(default)]
    pub subnets: Vec<SubnetItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeItem {
    pub name: String,
    #[serde(default)]
    pub bridge_interfaces: Vec<String>,
    pub bridge_stp: Option<bool>,
    pub bridge_fd: Option<u32>,
    pub bridge_hello: Option<u32>,
    pub bridge_maxage: Option<u32>,
    pub bridge_priority: Option<u32>,
    pub mtu: Option<u32>,
    #[serde(default)]
    pub subnets: Vec<SubnetItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VlanItem {
    /// Interface name (e.g. "eth0.100")
    pub name: String,
    pub vlan_id: u16,
    pub vlan_link: String,
    pub mtu: Option<u32>,
    #[serde(default)]
    pub subnets: Vec<SubnetItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoopbackItem {
    pub name: String,
    #[serde(default)]
    pub subnets: Vec<SubnetItem>,
}

/// Global nameserver entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NameserverItem {
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default)]
    pub search: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteItem {
    pub destination: Option<String>,
    pub gateway: Option<String>,
    pub metric: Option<u32>,
    /// Alternative to destination, paired with netmask
    pub network: Option<String>,
    pub netmask: Option<String>,
}

/// Subnet/IP configuration attached to a v1 interface entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubnetItem {
    #[serde(rename = "type")]
    pub subnet_type: String,
    pub address: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
    #[serde(default)]
    pub dns_nameservers: Vec<String>,
    #[serde(default)]
    pub dns_search: Vec<String>,
    #[serde(default)]
    pub routes: Vec<RouteItem>,
}

/// Build a `NetworkState` from the v1 entry list.
pub(crate) fn build_state(items: Vec<ConfigItem>) -> Result<NetworkState, NetCfgError> {
    debug!("Building network state from {} v1 entries", items.len());
    let mut state = NetworkState::new(1);

    // Phase 1: register every interface identity, in declaration order.
    for item in &items {
        match item {
            ConfigItem::Physical(phys) => {
                let mut iface = Interface::new(&phys.name, InterfaceKind::Physical);
                iface.mac_address = phys.mac_address.clone();
                iface.mtu = phys.mtu;
                iface.wakeonlan = phys.wakeonlan;
                apply_subnets(&mut iface, &phys.subnets)?;
                state.insert_interface(iface)?;
            }
            ConfigItem::Bond(bond) => {
                let mut iface = Interface::new(
                    &bond.name,
                    InterfaceKind::Bond {
                        members: bond.bond_interfaces.clone(),
                        params: BondParams {
                            mode: bond.bond_mode.clone(),
                            mii_monitor_interval: bond.bond_miimon,
                            transmit_hash_policy: bond.bond_xmit_hash_policy.clone(),
                            lacp_rate: bond.bond_lacp_rate.clone(),
                            primary: None,
                        },
                    },
                );
                iface.mac_address = bond.mac_address.clone();
                iface.mtu = bond.mtu;
                apply_subnets(&mut iface, &bond.subnets)?;
                state.insert_interface(iface)?;
            }
            ConfigItem::Bridge(bridge) => {
                let mut iface = Interface::new(
                    &bridge.name,
                    InterfaceKind::Bridge {
                        members: bridge.bridge_interfaces.clone(),
                        params: BridgeParams {
                            stp: bridge.bridge_stp,
                            forward_delay: bridge.bridge_fd,
                            hello_time: bridge.bridge_hello,
                            max_age: bridge.bridge_maxage,
                            priority: bridge.bridge_priority,
                        },
                    },
                );
                iface.mtu = bridge.mtu;
                apply_subnets(&mut iface, &bridge.subnets)?;
                state.insert_interface(iface)?;
            }
            ConfigItem::Vlan(vlan) => {
                let mut iface = Interface::new(
                    &vlan.name,
                    InterfaceKind::Vlan {
                        link: vlan.vlan_link.clone(),
                        id: vlan.vlan_id,
                    },
                );
                iface.mtu = vlan.mtu;
                apply_subnets(&mut iface, &vlan.subnets)?;
                state.insert_interface(iface)?;
            }
            ConfigItem::Loopback(lo) => {
                let mut iface = Interface::new(&lo.name, InterfaceKind::Loopback);
                apply_subnets(&mut iface, &lo.subnets)?;
                state.insert_interface(iface)?;
            }
            ConfigItem::Nameserver(ns) => {
                state.add_nameservers(ns.address.clone(), ns.search.clone());
            }
            ConfigItem::Route(route) => {
                state.add_route(convert_route(route)?);
            }
        }
    }

    // Phase 2: resolve membership/parent edges.
    state.validate_references()?;
    Ok(state)
}

fn apply_subnets(iface: &mut Interface, subnets: &[SubnetItem]) -> Result<(), NetCfgError> {
    let mut dns = DnsConfig::default();

    for subnet in subnets {
        match subnet.subnet_type.as_str() {
            "dhcp" | "dhcp4" => iface.dhcp4 = true,
            "dhcp6" | "ipv6_dhcpv6-stateful" => iface.dhcp6 = true,
            "static" | "static4" | "static6" => {
                let address = subnet.address.as_ref().ok_or_else(|| {
                    NetCfgError::schema(format!(
                        "static subnet on '{}' is missing an address",
                        iface.name
                    ))
                })?;
                let cidr = match &subnet.netmask {
                    Some(mask) if !address.contains('/') => {
                        format!("{}/{}", address, netmask_to_prefix(mask)?)
                    }
                    _ => address.clone(),
                };
                iface.addresses.push(cidr);

                if let Some(gw) = &subnet.gateway {
                    if gw.contains(':') {
                        iface.gateway6 = Some(gw.clone());
                    } else {
                        iface.gateway4 = Some(gw.clone());
                    }
                }
            }
            "ipv6_slaac" | "ipv6_dhcpv6-stateless" => iface.accept_ra = Some(true),
            "manual" | "loopback" => {}
            other => {
                return Err(NetCfgError::schema(format!(
                    "unknown subnet type '{}' on interface '{}'",
                    other, iface.name
                )));
            }
        }

        dns.addresses.extend(subnet.dns_nameservers.clone());
        dns.search.extend(subnet.dns_search.clone());

        for route in &subnet.routes {
            iface.routes.push(convert_route(route)?);
        }
    }

    if !dns.is_empty() {
        iface.dns = Some(dns);
    }
    Ok(())
}

fn convert_route(route: &RouteItem) -> Result<Route, NetCfgError> {
    let to = match (&route.destination, &route.network) {
        (Some(dest), _) => dest.clone(),
        (None, Some(net)) => match &route.netmask {
            Some(mask) if !net.contains('/') => {
                format!("{}/{}", net, netmask_to_prefix(mask)?)
            }
            _ => net.clone(),
        },
        (None, None) => "default".to_string(),
    };

    Ok(Route {
        to,
        via: route.gateway.clone(),
        metric: route.metric,
        table: None,
    })
}

/// Convert a dotted-decimal netmask (or bare prefix) to a prefix length
fn netmask_to_prefix(netmask: &str) -> Result<u8, NetCfgError> {
    if let Ok(prefix) = netmask.parse::<u8>() {
        if prefix <= 128 {
            return Ok(prefix);
        }
        return Err(NetCfgError::schema(format!("invalid netmask '{netmask}'")));
    }

    let octets: Vec<u8> = netmask
        .split('.')
        .map(|s| s.parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| NetCfgError::schema(format!("invalid netmask '{netmask}'")))?;

    if octets.len() != 4 {
        return Err(NetCfgError::schema(format!("invalid netmask '{netmask}'")));
    }

    // Contiguous masks have all their set bits leading
    let mask = u32::from_be_bytes([octets[0], octets[1], octets[2], octets[3]]);
    if mask.count_ones() != mask.leading_ones() {
        return Err(NetCfgError::schema(format!(
            "non-contiguous netmask '{netmask}'"
        )));
    }

    Ok(mask.leading_ones() as u8)
}
