//! NetworkManager renderer
//!
//! Generates one .nmconnection keyfile per interface. Connection UUIDs
//! are derived (UUIDv5) from the interface key so re-rendering the
//! same state produces byte-identical files.

use super::{RenderedFile, Renderer, RendererType};
use crate::NetCfgError;
use crate::state::{DnsConfig, Interface, InterfaceKind, NetworkState};
use std::collections::HashMap;
use std::fmt::Write;
use uuid::Uuid;

const CONNECTIONS_DIR: &str = "etc/NetworkManager/system-connections";

/// NetworkManager renderer
pub struct NetworkManagerRenderer;

/// (master key, slave-type) for interfaces enslaved to a bond/bridge
type MasterMap<'a> = HashMap<&'a str, (&'a str, &'a str)>;

impl NetworkManagerRenderer {
    pub fn new() -> Self {
        Self
    }

    /// UUID for a connection, a pure function of the interface key
    fn connection_uuid(key: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("netcfg-rs/{key}").as_bytes())
    }

    fn masters<'a>(state: &'a NetworkState) -> MasterMap<'a> {
        let mut map = MasterMap::new();
        for iface in state.interfaces() {
            let slave_type = match &iface.kind {
                InterfaceKind::Bond { .. } => "bond",
                InterfaceKind::Bridge { .. } => "bridge",
                _ => continue,
            };
            for member in iface.kind.members() {
                map.insert(member.as_str(), (iface.name.as_str(), slave_type));
            }
        }
        map
    }

    fn connection_type(iface: &Interface) -> &'static str {
        match iface.kind {
            InterfaceKind::Physical => "ethernet",
            InterfaceKind::Bond { .. } => "bond",
            InterfaceKind::Bridge { .. } => "bridge",
            InterfaceKind::Vlan { .. } => "vlan",
            InterfaceKind::Loopback => "loopback",
        }
    }

    fn render_interface(
        &self,
        state: &NetworkState,
        iface: &Interface,
        masters: &MasterMap<'_>,
    ) -> RenderedFile {
        let mut content = String::new();

        // [connection] section
        writeln!(content, "[connection]").unwrap();
        writeln!(content, "id=netcfg-{}", iface.name).unwrap();
        writeln!(content, "uuid={}", Self::connection_uuid(&iface.name)).unwrap();
        writeln!(content, "type={}", Self::connection_type(iface)).unwrap();
        if let Some(name) = iface.concrete_name() {
            writeln!(content, "interface-name={}", name).unwrap();
        }
        if let Some((master, slave_type)) = masters.get(iface.name.as_str()) {
            writeln!(content, "master={}", Self::connection_uuid(master)).unwrap();
            writeln!(content, "slave-type={}", slave_type).unwrap();
        }
        writeln!(content).unwrap();

        // Deferred matching: emit the rule instead of a name binding
        if iface.concrete_name().is_none()
            && let Some(rule) = &iface.match_rule
            && (rule.name.is_some() || rule.driver.is_some())
        {
            writeln!(content, "[match]").unwrap();
            if let Some(name) = &rule.name {
                writeln!(content, "interface-name={}", name).unwrap();
            }
            if let Some(driver) = &rule.driver {
                writeln!(content, "driver={}", driver).unwrap();
            }
            writeln!(content).unwrap();
        }

        match &iface.kind {
            InterfaceKind::Physical => {
                writeln!(content, "[ethernet]").unwrap();
                let match_mac = iface.match_rule.as_ref().and_then(|r| r.macaddress.as_ref());
                if let Some(mac) = match_mac.or(iface.mac_address.as_ref()) {
                    writeln!(content, "mac-address={}", mac).unwrap();
                }
                if let Some(mtu) = iface.mtu {
                    writeln!(content, "mtu={}", mtu).unwrap();
                }
                if let Some(wol) = iface.wakeonlan {
                    writeln!(content, "wake-on-lan={}", if wol { 64 } else { 0 }).unwrap();
                }
                writeln!(content).unwrap();
            }
            InterfaceKind::Bond { params, .. } => {
                writeln!(content, "[bond]").unwrap();
                if let Some(mode) = &params.mode {
                    writeln!(content, "mode={}", mode).unwrap();
                }
                if let Some(interval) = params.mii_monitor_interval {
                    writeln!(content, "miimon={}", interval).unwrap();
                }
                if let Some(primary) = &params.primary {
                    writeln!(content, "primary={}", primary).unwrap();
                }
                if let Some(policy) = &params.transmit_hash_policy {
                    writeln!(content, "xmit_hash_policy={}", policy).unwrap();
                }
                if let Some(rate) = &params.lacp_rate {
                    writeln!(content, "lacp_rate={}", rate).unwrap();
                }
                writeln!(content).unwrap();
            }
            InterfaceKind::Bridge { params, .. } => {
                writeln!(content, "[bridge]").unwrap();
                if let Some(stp) = params.stp {
                    writeln!(content, "stp={}", stp).unwrap();
                }
                if let Some(fd) = params.forward_delay {
                    writeln!(content, "forward-delay={}", fd).unwrap();
                }
                if let Some(hello) = params.hello_time {
                    writeln!(content, "hello-time={}", hello).unwrap();
                }
                if let Some(age) = params.max_age {
                    writeln!(content, "max-age={}", age).unwrap();
                }
                if let Some(prio) = params.priority {
                    writeln!(content, "priority={}", prio).unwrap();
                }
                writeln!(content).unwrap();
            }
            InterfaceKind::Vlan { link, id } => {
                writeln!(content, "[vlan]").unwrap();
                writeln!(content, "id={}", id).unwrap();
                let parent = state
                    .get(link)
                    .and_then(|p| p.concrete_name())
                    .unwrap_or(link);
                writeln!(content, "parent={}", parent).unwrap();
                writeln!(content).unwrap();
            }
            InterfaceKind::Loopback => {}
        }

        // Slave profiles carry no addressing of their own
        if masters.contains_key(iface.name.as_str()) {
            return self.finish(iface, content);
        }

        let dns = state.effective_dns(iface);
        self.write_ipv4_section(&mut content, iface, dns);
        self.write_ipv6_section(&mut content, iface, dns);

        self.finish(iface, content)
    }

    fn finish(&self, iface: &Interface, content: String) -> RenderedFile {
        RenderedFile::new(
            format!("{}/netcfg-{}.nmconnection", CONNECTIONS_DIR, iface.name),
            content,
            0o600, // NetworkManager requires 0600
        )
    }

    fn write_ipv4_section(&self, content: &mut String, iface: &Interface, dns: &DnsConfig) {
        writeln!(content, "[ipv4]").unwrap();

        let ipv4_addrs: Vec<_> = iface.ipv4_addresses().collect();
        if iface.dhcp4 {
            writeln!(content, "method=auto").unwrap();
        } else if !ipv4_addrs.is_empty() {
            writeln!(content, "method=manual").unwrap();
            for (i, addr) in ipv4_addrs.iter().enumerate() {
                writeln!(content, "address{}={}", i + 1, addr).unwrap();
            }
        } else {
            writeln!(content, "method=disabled").unwrap();
        }

        if let Some(gw) = &iface.gateway4 {
            writeln!(content, "gateway={}", gw).unwrap();
        }

        let ipv4_dns: Vec<_> = dns
            .addresses
            .iter()
            .filter(|d| !d.contains(':'))
            .map(|s| s.as_str())
            .collect();
        if !ipv4_dns.is_empty() {
            writeln!(content, "dns={}", ipv4_dns.join(";")).unwrap();
        }
        if !dns.search.is_empty() {
            writeln!(content, "dns-search={}", dns.search.join(";")).unwrap();
        }

        let mut index = 0;
        for route in &iface.routes {
            if route.to.contains(':') {
                continue;
            }
            index += 1;
            let mut route_str = route.to.clone();
            if let Some(via) = &route.via {
                route_str = format!("{},{}", route_str, via);
            }
            if let Some(metric) = route.metric {
                route_str = format!("{},{}", route_str, metric);
            }
            writeln!(content, "route{}={}", index, route_str).unwrap();
        }

        writeln!(content).unwrap();
    }

    fn write_ipv6_section(&self, content: &mut String, iface: &Interface, dns: &DnsConfig) {
        writeln!(content, "[ipv6]").unwrap();

        let ipv6_addrs: Vec<_> = iface.ipv6_addresses().collect();
        if iface.dhcp6 {
            writeln!(content, "method=auto").unwrap();
        } else if iface.accept_ra == Some(true) {
            writeln!(content, "method=auto").unwrap();
            writeln!(content, "addr-gen-mode=eui64").unwrap();
        } else if !ipv6_addrs.is_empty() {
            writeln!(content, "method=manual").unwrap();
            for (i, addr) in ipv6_addrs.iter().enumerate() {
                writeln!(content, "address{}={}", i + 1, addr).unwrap();
            }
        } else {
            writeln!(content, "method=ignore").unwrap();
        }

        if let Some(gw) = &iface.gateway6 {
            writeln!(content, "gateway={}", gw).unwrap();
        }

        let ipv6_dns: Vec<_> = dns
            .addresses
            .iter()
            .filter(|d| d.contains(':'))
            .map(|s| s.as_str())
            .collect();
        if !ipv6_dns.is_empty() {
            writeln!(content, "dns={}", ipv6_dns.join(";")).unwrap();
        }

        let mut index = 0;
        for route in &iface.routes {
            if !route.to.contains(':') {
                continue;
            }
            index += 1;
            let mut route_str = route.to.clone();
            if let Some(via) = &route.via {
                route_str = format!("{},{}", route_str, via);
            }
            if let Some(metric) = route.metric {
                route_str = format!("{},{}", route_str, metric);
            }
            writeln!(content, "route{}={}", index, route_str).unwrap();
        }

        writeln!(content).unwrap();
    }
}

impl Default for NetworkManagerRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for NetworkManagerRenderer {
    fn render(&self, state: &NetworkState) -> Result<Vec<RenderedFile>, NetCfgError> {
        let masters = Self::masters(state);
        let mut files = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for iface in state.interfaces() {
            let file = self.render_interface(state, iface, &masters);
            if !seen.insert(file.path.clone()) {
                return Err(NetCfgError::render(
                    "network-manager",
                    format!("connection profile collision for '{}'", file.path.display()),
                ));
            }
            files.push(file);
        }

        Ok(files)
    }

    fn renderer_type(&self) -> RendererType {
        RendererType::NetworkManager
    }
}
