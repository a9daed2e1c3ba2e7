//! Debian ENI (Ethernet Network Interfaces) renderer
//!
//! Generates the /etc/network/interfaces format. ENI has no deferred
//! matching, so this is the backend that declares
//! `needs_concrete_names` and refuses interfaces whose kernel name is
//! still unknown at render time.

use super::{RenderedFile, Renderer, RendererType};
use crate::NetCfgError;
use crate::state::{DnsConfig, Interface, InterfaceKind, NetworkState, Route};
use std::collections::HashMap;
use std::fmt::Write;

const ENI_PATH: &str = "etc/network/interfaces";

/// Debian ENI renderer
pub struct EniRenderer;

impl EniRenderer {
    pub fn new() -> Self {
        Self
    }

    fn concrete_name<'a>(&self, iface: &'a Interface) -> Result<&'a str, NetCfgError> {
        iface.concrete_name().ok_or_else(|| {
            NetCfgError::render(
                "eni",
                format!(
                    "interface '{}' has no concrete name; \
                     ENI cannot defer MAC/driver matching",
                    iface.name
                ),
            )
        })
    }

    fn render_interface(
        &self,
        state: &NetworkState,
        iface: &Interface,
        masters: &HashMap<&str, &str>,
    ) -> Result<String, NetCfgError> {
        let name = self.concrete_name(iface)?;
        let mut content = String::new();
        let dns = state.effective_dns(iface);

        if iface.dhcp4 {
            writeln!(content, "auto {}", name).unwrap();
            writeln!(content, "iface {} inet dhcp", name).unwrap();
        } else {
            let ipv4_addrs: Vec<_> = iface.ipv4_addresses().collect();
            if !ipv4_addrs.is_empty() {
                writeln!(content, "auto {}", name).unwrap();
                writeln!(content, "iface {} inet static", name).unwrap();

                if let Some(addr) = ipv4_addrs.first() {
                    let (ip, mask) = parse_cidr(addr);
                    writeln!(content, "    address {}", ip).unwrap();
                    writeln!(content, "    netmask {}", mask).unwrap();
                }
                if let Some(gw) = &iface.gateway4 {
                    writeln!(content, "    gateway {}", gw).unwrap();
                }
                self.write_dns(&mut content, dns);

                for addr in ipv4_addrs.iter().skip(1) {
                    writeln!(content, "    up ip addr add {} dev {}", addr, name).unwrap();
                }
            } else {
                writeln!(content, "auto {}", name).unwrap();
                writeln!(content, "iface {} inet manual", name).unwrap();
            }
        }

        if let Some(mtu) = iface.mtu {
            writeln!(content, "    mtu {}", mtu).unwrap();
        }
        if iface.wakeonlan == Some(true) {
            writeln!(content, "    ethernet-wol g").unwrap();
        }

        match &iface.kind {
            InterfaceKind::Bond { members, params } => {
                let slaves = self.member_names(state, members)?;
                writeln!(content, "    bond-slaves {}", slaves.join(" ")).unwrap();
                if let Some(mode) = &params.mode {
                    writeln!(content, "    bond-mode {}", mode).unwrap();
                }
                if let Some(miimon) = params.mii_monitor_interval {
                    writeln!(content, "    bond-miimon {}", miimon).unwrap();
                }
                if let Some(policy) = &params.transmit_hash_policy {
                    writeln!(content, "    bond-xmit-hash-policy {}", policy).unwrap();
                }
            }
            InterfaceKind::Bridge { members, params } => {
                let ports = self.member_names(state, members)?;
                writeln!(content, "    bridge_ports {}", ports.join(" ")).unwrap();
                if let Some(stp) = params.stp {
                    writeln!(content, "    bridge_stp {}", if stp { "on" } else { "off" })
                        .unwrap();
                }
                if let Some(fd) = params.forward_delay {
                    writeln!(content, "    bridge_fd {}", fd).unwrap();
                }
            }
            InterfaceKind::Vlan { link, .. } => {
                let parent = state
                    .get(link)
                    .map(|p| self.concrete_name(p))
                    .transpose()?
                    .unwrap_or(link);
                writeln!(content, "    vlan-raw-device {}", parent).unwrap();
            }
            InterfaceKind::Physical => {
                if let Some(master) = masters.get(iface.name.as_str()) {
                    writeln!(content, "    bond-master {}", master).unwrap();
                }
            }
            InterfaceKind::Loopback => {}
        }

        for route in &iface.routes {
            if !route.to.contains(':') {
                write_route(&mut content, route, false);
            }
        }

        // IPv6 configuration
        let ipv6_addrs: Vec<_> = iface.ipv6_addresses().collect();
        if iface.dhcp6 {
            writeln!(content).unwrap();
            writeln!(content, "iface {} inet6 dhcp", name).unwrap();
        } else if iface.accept_ra == Some(true) {
            writeln!(content).unwrap();
            writeln!(content, "iface {} inet6 auto", name).unwrap();
        } else if !ipv6_addrs.is_empty() {
            writeln!(content).unwrap();
            writeln!(content, "iface {} inet6 static", name).unwrap();
            if let Some(addr) = ipv6_addrs.first() {
                writeln!(content, "    address {}", addr).unwrap();
            }
            if let Some(gw) = &iface.gateway6 {
                writeln!(content, "    gateway {}", gw).unwrap();
            }
            for addr in ipv6_addrs.iter().skip(1) {
                writeln!(content, "    up ip addr add {} dev {}", addr, name).unwrap();
            }
        }

        for route in &iface.routes {
            if route.to.contains(':') {
                write_route(&mut content, route, true);
            }
        }

        Ok(content)
    }

    fn member_names<'a>(
        &self,
        state: &'a NetworkState,
        members: &'a [String],
    ) -> Result<Vec<&'a str>, NetCfgError> {
        members
            .iter()
            .map(|m| match state.get(m) {
                Some(iface) => self.concrete_name(iface),
                None => Ok(m.as_str()),
            })
            .collect()
    }

    fn write_dns(&self, content: &mut String, dns: &DnsConfig) {
        if !dns.addresses.is_empty() {
            writeln!(content, "    dns-nameservers {}", dns.addresses.join(" ")).unwrap();
        }
        if !dns.search.is_empty() {
            writeln!(content, "    dns-search {}", dns.search.join(" ")).unwrap();
        }
    }
}

fn write_route(content: &mut String, route: &Route, ipv6: bool) {
    let family = if ipv6 { " -6" } else { "" };
    let mut route_cmd = format!("    up ip{} route add {}", family, route.to);
    if let Some(via) = &route.via {
        route_cmd = format!("{} via {}", route_cmd, via);
    }
    if let Some(metric) = route.metric {
        route_cmd = format!("{} metric {}", route_cmd, metric);
    }
    writeln!(content, "{}", route_cmd).unwrap();
}

fn parse_cidr(cidr: &str) -> (String, String) {
    let mut parts = cidr.splitn(2, '/');
    let ip = parts.next().unwrap_or_default().to_string();
    let prefix = parts.next().and_then(|p| p.parse::<u8>().ok()).unwrap_or(24);
    (ip, prefix_to_netmask(prefix))
}

fn prefix_to_netmask(prefix: u8) -> String {
    let mask: u32 = match prefix {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - p),
    };
    format!(
        "{}.{}.{}.{}",
        (mask >> 24) & 0xff,
        (mask >> 16) & 0xff,
        (mask >> 8) & 0xff,
        mask & 0xff
    )
}

impl Default for EniRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for EniRenderer {
    fn render(&self, state: &NetworkState) -> Result<Vec<RenderedFile>, NetCfgError> {
        let mut masters: HashMap<&str, &str> = HashMap::new();
        for iface in state.interfaces() {
            if let InterfaceKind::Bond { members, .. } = &iface.kind {
                for member in members {
                    masters.insert(member.as_str(), iface.name.as_str());
                }
            }
        }

        let mut content = String::new();
        writeln!(content, "# This file is generated by netcfg-rs").unwrap();
        writeln!(content, "# See interfaces(5) for file format").unwrap();
        writeln!(content).unwrap();

        writeln!(content, "auto lo").unwrap();
        writeln!(content, "iface lo inet loopback").unwrap();
        // Addresses configured on a loopback interface join the lo
        // stanza rather than getting a second stanza for the device
        for iface in state.interfaces() {
            if matches!(iface.kind, InterfaceKind::Loopback) {
                for addr in &iface.addresses {
                    writeln!(content, "    up ip addr add {} dev lo", addr).unwrap();
                }
            }
        }
        // Global (non-interface) routes ride on the loopback stanza
        for route in state.routes() {
            write_route(&mut content, route, route.to.contains(':'));
        }
        writeln!(content).unwrap();

        for iface in state.interfaces() {
            if matches!(iface.kind, InterfaceKind::Loopback) {
                continue;
            }
            content.push_str(&self.render_interface(state, iface, &masters)?);
            writeln!(content).unwrap();
        }

        Ok(vec![RenderedFile::new(ENI_PATH, content, 0o644)])
    }

    fn renderer_type(&self) -> RendererType {
        RendererType::Eni
    }

    fn needs_concrete_names(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{parse_network_config, parse_network_config_with_macs};

    fn render(yaml: &str) -> String {
        let state = parse_network_config(yaml).unwrap();
        let files = EniRenderer::new().render(&state).unwrap();
        assert_eq!(files.len(), 1);
        files[0].content.clone()
    }

    #[test]
    fn test_render_dhcp() {
        let content = render("ethernets:\n  eth0:\n    dhcp4: true\n");
        assert!(content.contains("auto lo"));
        assert!(content.contains("auto eth0"));
        assert!(content.contains("iface eth0 inet dhcp"));
    }

    #[test]
    fn test_render_static() {
        let content = render(
            r#"
ethernets:
  eth0:
    addresses: [192.168.1.10/24]
    gateway4: 192.168.1.1
    nameservers:
      addresses: [8.8.8.8]
"#,
        );
        assert!(content.contains("iface eth0 inet static"));
        assert!(content.contains("    address 192.168.1.10"));
        assert!(content.contains("    netmask 255.255.255.0"));
        assert!(content.contains("    gateway 192.168.1.1"));
        assert!(content.contains("    dns-nameservers 8.8.8.8"));
    }

    #[test]
    fn test_deferred_match_is_render_error() {
        let state = parse_network_config(
            r#"
ethernets:
  id0:
    match:
      macaddress: "00:11:22:33:44:55"
    dhcp4: true
"#,
        )
        .unwrap();
        let err = EniRenderer::new().render(&state).unwrap_err();
        assert!(matches!(err, NetCfgError::Render { .. }));
    }

    #[test]
    fn test_mac_table_resolution_unblocks_render() {
        let table = std::collections::HashMap::from([(
            "00:11:22:33:44:55".to_string(),
            "enp3s0".to_string(),
        )]);
        let state = parse_network_config_with_macs(
            r#"
ethernets:
  id0:
    match:
      macaddress: "00:11:22:33:44:55"
    dhcp4: true
"#,
            Some(&table),
        )
        .unwrap();
        let files = EniRenderer::new().render(&state).unwrap();
        assert!(files[0].content.contains("iface enp3s0 inet dhcp"));
    }

    #[test]
    fn test_bond_stanzas() {
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
        assert!(content.contains("iface bond0 inet dhcp"));
        assert!(content.contains("    bond-slaves eth0 eth1"));
        assert!(content.contains("    bond-mode active-backup"));
        assert!(content.contains("    bond-master bond0"));
    }

    #[test]
    fn test_global_routes_on_loopback_stanza() {
        let content = render(
            r#"
version: 1
config:
  - type: physical
    name: eth0
    subnets:
      - type: dhcp4
  - type: route
    destination: 10.0.0.0/8
    gateway: 192.168.1.254
"#,
        );
        let lo_block: Vec<_> = content
            .lines()
            .skip_while(|l| *l != "auto lo")
            .take_while(|l| !l.is_empty())
            .collect();
        assert!(lo_block.contains(&"    up ip route add 10.0.0.0/8 via 192.168.1.254"));
    }

    #[test]
    fn test_prefix_to_netmask() {
        assert_eq!(prefix_to_netmask(24), "255.255.255.0");
        assert_eq!(prefix_to_netmask(16), "255.255.0.0");
        assert_eq!(prefix_to_netmask(25), "255.255.255.128");
        assert_eq!(prefix_to_netmask(32), "255.255.255.255");
        assert_eq!(prefix_to_netmask(0), "0.0.0.0");
    }

    #[test]
    fn test_zero_prefix_address_renders() {
        let content = render("ethernets:\n  eth0:\n    addresses: [10.0.0.2/0]\n");
        assert!(content.contains("    address 10.0.0.2"));
        assert!(content.contains("    netmask 0.0.0.0"));
    }

    #[test]
    fn test_ipv6_routes_emitted() {
        let content = render(
            r#"
ethernets:
  eth0:
    addresses: ["fd00::2/64"]
    routes:
      - to: "fd00:1::/64"
        via: "fd00::1"
"#,
        );
        assert!(content.contains("iface eth0 inet6 static"));
        assert!(content.contains("    up ip -6 route add fd00:1::/64 via fd00::1"));
    }

    #[test]
    fn test_extra_ipv6_addresses_added() {
        let content = render(
            r#"
ethernets:
  eth0:
    addresses: ["fd00::2/64", "fd00::3/64"]
"#,
        );
        assert!(content.contains("    address fd00::2/64"));
        assert!(content.contains("    up ip addr add fd00::3/64 dev eth0"));
    }

    #[test]
    fn test_loopback_addresses_on_lo_stanza() {
        let content = render(
            r#"
version: 1
config:
  - type: loopback
    name: lo
    subnets:
      - type: static
        address: 127.0.1.1/8
"#,
        );
        let lo_block: Vec<_> = content
            .lines()
            .skip_while(|l| *l != "auto lo")
            .take_while(|l| !l.is_empty())
            .collect();
        assert!(lo_block.contains(&"    up ip addr add 127.0.1.1/8 dev lo"));
    }
}
