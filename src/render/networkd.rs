//! systemd-networkd renderer
//!
//! Generates paired .network/.netdev files for systemd-networkd.
//! Virtual devices (bonds, bridges, VLANs) get a .netdev for device
//! creation plus a .network for addressing; member interfaces bind to
//! their master from their own .network file.

use super::{RenderedFile, Renderer, RendererType};
use crate::NetCfgError;
use crate::state::{BondParams, BridgeParams, Interface, InterfaceKind, NetworkState};
use std::collections::HashMap;
use std::fmt::Write;

const NETWORK_DIR: &str = "etc/systemd/network";

/// systemd-networkd renderer
pub struct NetworkdRenderer;

impl NetworkdRenderer {
    pub fn new() -> Self {
        Self
    }

    fn unit_path(name: &str, extension: &str) -> String {
        format!("{}/10-netcfg-{}.{}", NETWORK_DIR, name, extension)
    }

    fn render_netdev(&self, iface: &Interface) -> Option<String> {
        let kind = match &iface.kind {
            InterfaceKind::Bond { .. } => "bond",
            InterfaceKind::Bridge { .. } => "bridge",
            InterfaceKind::Vlan { .. } => "vlan",
            InterfaceKind::Physical | InterfaceKind::Loopback => return None,
        };

        let mut netdev = String::new();
        writeln!(netdev, "[NetDev]").unwrap();
        writeln!(netdev, "Name={}", iface.name).unwrap();
        writeln!(netdev, "Kind={}", kind).unwrap();
        if let Some(mac) = &iface.mac_address {
            writeln!(netdev, "MACAddress={}", mac).unwrap();
        }

        match &iface.kind {
            InterfaceKind::Bond { params, .. } => self.write_bond_section(&mut netdev, params),
            InterfaceKind::Bridge { params, .. } => self.write_bridge_section(&mut netdev, params),
            InterfaceKind::Vlan { id, .. } => {
                writeln!(netdev).unwrap();
                writeln!(netdev, "[VLAN]").unwrap();
                writeln!(netdev, "Id={}", id).unwrap();
            }
            _ => {}
        }

        Some(netdev)
    }

    fn write_bond_section(&self, netdev: &mut String, params: &BondParams) {
        let has_params = params.mode.is_some()
            || params.mii_monitor_interval.is_some()
            || params.transmit_hash_policy.is_some()
            || params.lacp_rate.is_some();
        if !has_params {
            return;
        }
        writeln!(netdev).unwrap();
        writeln!(netdev, "[Bond]").unwrap();
        if let Some(mode) = &params.mode {
            writeln!(netdev, "Mode={}", bond_mode_to_networkd(mode)).unwrap();
        }
        if let Some(interval) = params.mii_monitor_interval {
            writeln!(netdev, "MIIMonitorSec={}ms", interval).unwrap();
        }
        if let Some(policy) = &params.transmit_hash_policy {
            writeln!(netdev, "TransmitHashPolicy={}", policy).unwrap();
        }
        if let Some(rate) = &params.lacp_rate {
            writeln!(netdev, "LACPTransmitRate={}", rate).unwrap();
        }
    }

    fn write_bridge_section(&self, netdev: &mut String, params: &BridgeParams) {
        let has_params = params.stp.is_some()
            || params.forward_delay.is_some()
            || params.hello_time.is_some()
            || params.max_age.is_some()
            || params.priority.is_some();
        if !has_params {
            return;
        }
        writeln!(netdev).unwrap();
        writeln!(netdev, "[Bridge]").unwrap();
        if let Some(stp) = params.stp {
            writeln!(netdev, "STP={}", if stp { "yes" } else { "no" }).unwrap();
        }
        if let Some(fd) = params.forward_delay {
            writeln!(netdev, "ForwardDelaySec={}", fd).unwrap();
        }
        if let Some(hello) = params.hello_time {
            writeln!(netdev, "HelloTimeSec={}", hello).unwrap();
        }
        if let Some(age) = params.max_age {
            writeln!(netdev, "MaxAgeSec={}", age).unwrap();
        }
        if let Some(prio) = params.priority {
            writeln!(netdev, "Priority={}", prio).unwrap();
        }
    }

    fn render_network(
        &self,
        state: &NetworkState,
        iface: &Interface,
        masters: &HashMap<&str, (&str, &str)>,
        vlans_by_parent: &HashMap<&str, Vec<&str>>,
    ) -> String {
        let mut content = String::new();

        // [Match] section: defer to the verbatim rule when present
        writeln!(content, "[Match]").unwrap();
        if let Some(rule) = &iface.match_rule {
            // networkd ANDs all [Match] keys, so every present field
            // of the rule is carried over
            if let Some(mac) = &rule.macaddress {
                writeln!(content, "MACAddress={}", mac).unwrap();
            }
            if let Some(driver) = &rule.driver {
                writeln!(content, "Driver={}", driver).unwrap();
            }
            if let Some(name) = &rule.name {
                writeln!(content, "Name={}", name).unwrap();
            }
        } else {
            let name = iface.concrete_name().unwrap_or(&iface.name);
            writeln!(content, "Name={}", name).unwrap();
        }
        writeln!(content).unwrap();

        // [Network] section
        writeln!(content, "[Network]").unwrap();
        if iface.dhcp4 && iface.dhcp6 {
            writeln!(content, "DHCP=yes").unwrap();
        } else if iface.dhcp4 {
            writeln!(content, "DHCP=ipv4").unwrap();
        } else if iface.dhcp6 {
            writeln!(content, "DHCP=ipv6").unwrap();
        }

        for addr in &iface.addresses {
            writeln!(content, "Address={}", addr).unwrap();
        }
        if let Some(gw) = &iface.gateway4 {
            writeln!(content, "Gateway={}", gw).unwrap();
        }
        if let Some(gw) = &iface.gateway6 {
            writeln!(content, "Gateway={}", gw).unwrap();
        }

        let dns = state.effective_dns(iface);
        for server in &dns.addresses {
            writeln!(content, "DNS={}", server).unwrap();
        }
        for domain in &dns.search {
            writeln!(content, "Domains={}", domain).unwrap();
        }

        if let Some(accept_ra) = iface.accept_ra {
            writeln!(
                content,
                "IPv6AcceptRA={}",
                if accept_ra { "yes" } else { "no" }
            )
            .unwrap();
        }

        // Master binding for enslaved interfaces
        if let Some((master, kind)) = masters.get(iface.name.as_str()) {
            match *kind {
                "bond" => writeln!(content, "Bond={}", master).unwrap(),
                _ => writeln!(content, "Bridge={}", master).unwrap(),
            }
        }

        // VLANs stacked on this interface
        if let Some(vlans) = vlans_by_parent.get(iface.name.as_str()) {
            for vlan in vlans {
                writeln!(content, "VLAN={}", vlan).unwrap();
            }
        }

        // [Link] section
        if iface.mtu.is_some() || iface.wakeonlan.is_some() {
            writeln!(content).unwrap();
            writeln!(content, "[Link]").unwrap();
            if let Some(mtu) = iface.mtu {
                writeln!(content, "MTUBytes={}", mtu).unwrap();
            }
            if let Some(wol) = iface.wakeonlan {
                writeln!(content, "WakeOnLan={}", if wol { "magic" } else { "off" }).unwrap();
            }
        }

        // [Route] sections
        for route in &iface.routes {
            writeln!(content).unwrap();
            writeln!(content, "[Route]").unwrap();
            writeln!(content, "Destination={}", route.to).unwrap();
            if let Some(via) = &route.via {
                writeln!(content, "Gateway={}", via).unwrap();
            }
            if let Some(metric) = route.metric {
                writeln!(content, "Metric={}", metric).unwrap();
            }
            if let Some(table) = route.table {
                writeln!(content, "Table={}", table).unwrap();
            }
        }

        content
    }
}

fn bond_mode_to_networkd(mode: &str) -> &str {
    match mode {
        "balance-rr" | "0" => "balance-rr",
        "active-backup" | "1" => "active-backup",
        "balance-xor" | "2" => "balance-xor",
        "broadcast" | "3" => "broadcast",
        "802.3ad" | "4" => "802.3ad",
        "balance-tlb" | "5" => "balance-tlb",
        "balance-alb" | "6" => "balance-alb",
        other => other,
    }
}

impl Default for NetworkdRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for NetworkdRenderer {
    fn render(&self, state: &NetworkState) -> Result<Vec<RenderedFile>, NetCfgError> {
        let mut masters: HashMap<&str, (&str, &str)> = HashMap::new();
        let mut vlans_by_parent: HashMap<&str, Vec<&str>> = HashMap::new();
        for iface in state.interfaces() {
            match &iface.kind {
                InterfaceKind::Bond { members, .. } => {
                    for member in members {
                        masters.insert(member.as_str(), (iface.name.as_str(), "bond"));
                    }
                }
                InterfaceKind::Bridge { members, .. } => {
                    for member in members {
                        masters.insert(member.as_str(), (iface.name.as_str(), "bridge"));
                    }
                }
                InterfaceKind::Vlan { link, .. } => {
                    vlans_by_parent
                        .entry(link.as_str())
                        .or_default()
                        .push(iface.name.as_str());
                }
                _ => {}
            }
        }

        let mut files = Vec::new();
        for iface in state.interfaces() {
            if let Some(netdev) = self.render_netdev(iface) {
                files.push(RenderedFile::new(
                    Self::unit_path(&iface.name, "netdev"),
                    netdev,
                    0o644,
                ));
            }
            let network = self.render_network(state, iface, &masters, &vlans_by_parent);
            files.push(RenderedFile::new(
                Self::unit_path(&iface.name, "network"),
                network,
                0o644,
            ));
        }

        Ok(files)
    }

    fn renderer_type(&self) -> RendererType {
        RendererType::Networkd
    }
}
