//! Normalized network state
//!
//! The version-agnostic, in-memory representation of a parsed network
//! config. Built once by the schema parser, then consumed read-only by
//! every renderer.

use crate::NetCfgError;
use indexmap::IndexMap;

/// A single route entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    /// Destination network in CIDR form, or "default"
    pub to: String,
    pub via: Option<String>,
    pub metric: Option<u32>,
    pub table: Option<u32>,
}

/// Nameserver addresses and search domains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsConfig {
    pub addresses: Vec<String>,
    pub search: Vec<String>,
}

impl DnsConfig {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.search.is_empty()
    }
}

/// v2 interface matching rule, preserved verbatim from the input so
/// renderers that support deferred matching can emit it as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchRule {
    pub name: Option<String>,
    pub macaddress: Option<String>,
    pub driver: Option<String>,
}

impl MatchRule {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.macaddress.is_none() && self.driver.is_none()
    }
}

/// Bond parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BondParams {
    pub mode: Option<String>,
    pub mii_monitor_interval: Option<u32>,
    pub primary: Option<String>,
    pub transmit_hash_policy: Option<String>,
    pub lacp_rate: Option<String>,
}

/// Bridge parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeParams {
    pub stp: Option<bool>,
    pub forward_delay: Option<u32>,
    pub hello_time: Option<u32>,
    pub max_age: Option<u32>,
    pub priority: Option<u32>,
}

/// Interface variant and its variant-specific attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceKind {
    Physical,
    Bond {
        members: Vec<String>,
        params: BondParams,
    },
    Bridge {
        members: Vec<String>,
        params: BridgeParams,
    },
    Vlan {
        link: String,
        id: u16,
    },
    Loopback,
}

impl InterfaceKind {
    /// Member interface keys for bonds and bridges
    pub fn members(&self) -> &[String] {
        match self {
            InterfaceKind::Bond { members, .. } | InterfaceKind::Bridge { members, .. } => members,
            _ => &[],
        }
    }
}

/// One network interface in the normalized state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Stable config key (interface name for v1, map key for v2)
    pub name: String,
    pub kind: InterfaceKind,
    /// MAC to assign to the device (not a matching rule)
    pub mac_address: Option<String>,
    pub mtu: Option<u32>,
    /// Addresses in CIDR form
    pub addresses: Vec<String>,
    pub dhcp4: bool,
    pub dhcp6: bool,
    pub accept_ra: Option<bool>,
    pub gateway4: Option<String>,
    pub gateway6: Option<String>,
    pub routes: Vec<Route>,
    /// Per-interface DNS override; replaces the global lists entirely
    pub dns: Option<DnsConfig>,
    pub wakeonlan: Option<bool>,
    /// v2 matching rule (physical interfaces only)
    pub match_rule: Option<MatchRule>,
    /// Concrete kernel name resolved from the host MAC table, when the
    /// parser was given one
    pub resolved_name: Option<String>,
}

impl Interface {
    pub(crate) fn new(name: impl Into<String>, kind: InterfaceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            mac_address: None,
            mtu: None,
            addresses: Vec::new(),
            dhcp4: false,
            dhcp6: false,
            accept_ra: None,
            gateway4: None,
            gateway6: None,
            routes: Vec::new(),
            dns: None,
            wakeonlan: None,
            match_rule: None,
            resolved_name: None,
        }
    }

    /// The concrete kernel interface name, if one is known.
    ///
    /// `None` means matching was deferred (MAC/driver rule with no host
    /// MAC table at parse time); renderers that cannot defer must treat
    /// that as unrepresentable.
    pub fn concrete_name(&self) -> Option<&str> {
        if let Some(resolved) = &self.resolved_name {
            return Some(resolved);
        }
        match &self.match_rule {
            None => Some(&self.name),
            Some(rule) => match &rule.name {
                // A name pattern with a glob is still a deferred match
                Some(name) if !name.contains('*') => Some(name),
                _ => None,
            },
        }
    }

    /// IPv4 addresses from the CIDR list
    pub fn ipv4_addresses(&self) -> impl Iterator<Item = &String> {
        self.addresses.iter().filter(|a| !a.contains(':'))
    }

    /// IPv6 addresses from the CIDR list
    pub fn ipv6_addresses(&self) -> impl Iterator<Item = &String> {
        self.addresses.iter().filter(|a| a.contains(':'))
    }
}

/// Root aggregate: every interface plus the global route/DNS config.
///
/// Immutable after construction; iteration order of `interfaces`
/// follows input declaration order.
#[derive(Debug, Clone, Default)]
pub struct NetworkState {
    version: u8,
    interfaces: IndexMap<String, Interface>,
    routes: Vec<Route>,
    dns: DnsConfig,
    renderer_hint: Option<String>,
}

impl NetworkState {
    pub(crate) fn new(version: u8) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    pub(crate) fn insert_interface(&mut self, iface: Interface) -> Result<(), NetCfgError> {
        if self.interfaces.contains_key(&iface.name) {
            return Err(NetCfgError::schema(format!(
                "duplicate interface '{}'",
                iface.name
            )));
        }
        self.interfaces.insert(iface.name.clone(), iface);
        Ok(())
    }

    pub(crate) fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub(crate) fn add_nameservers(&mut self, addresses: Vec<String>, search: Vec<String>) {
        self.dns.addresses.extend(addresses);
        self.dns.search.extend(search);
    }

    pub(crate) fn set_renderer_hint(&mut self, hint: Option<String>) {
        self.renderer_hint = hint;
    }

    /// Schema version (1 or 2) this state was built from
    pub fn version(&self) -> u8 {
        self.version
    }

    /// All interfaces in declaration order
    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.values()
    }

    pub fn get(&self, key: &str) -> Option<&Interface> {
        self.interfaces.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn physical_interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces()
            .filter(|i| matches!(i.kind, InterfaceKind::Physical))
    }

    pub fn bonds(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces()
            .filter(|i| matches!(i.kind, InterfaceKind::Bond { .. }))
    }

    pub fn bridges(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces()
            .filter(|i| matches!(i.kind, InterfaceKind::Bridge { .. }))
    }

    pub fn vlans(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces()
            .filter(|i| matches!(i.kind, InterfaceKind::Vlan { .. }))
    }

    /// Global routes (v1 top-level route entries)
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Global nameserver config
    pub fn dns(&self) -> &DnsConfig {
        &self.dns
    }

    /// v2 `renderer:` passthrough, if the input declared one
    pub fn renderer_hint(&self) -> Option<&str> {
        self.renderer_hint.as_deref()
    }

    /// Member interfaces of a bond or bridge, resolved to entities.
    /// Validation guarantees every member exists.
    pub fn members_of<'a>(&'a self, iface: &'a Interface) -> Vec<&'a Interface> {
        iface
            .kind
            .members()
            .iter()
            .filter_map(|m| self.interfaces.get(m))
            .collect()
    }

    /// Parent interface of a VLAN
    pub fn vlan_parent(&self, iface: &Interface) -> Option<&Interface> {
        match &iface.kind {
            InterfaceKind::Vlan { link, .. } => self.interfaces.get(link),
            _ => None,
        }
    }

    /// Effective DNS for one interface: the per-interface override if
    /// present, otherwise the global config. Never a merge of both.
    pub fn effective_dns<'a>(&'a self, iface: &'a Interface) -> &'a DnsConfig {
        iface.dns.as_ref().unwrap_or(&self.dns)
    }

    /// Reject any bond/bridge member or VLAN parent that does not
    /// resolve to a declared interface.
    pub(crate) fn validate_references(&self) -> Result<(), NetCfgError> {
        for iface in self.interfaces.values() {
            match &iface.kind {
                InterfaceKind::Bond { members, .. } => {
                    for member in members {
                        if !self.interfaces.contains_key(member) {
                            return Err(NetCfgError::reference("bond", &iface.name, member));
                        }
                    }
                }
                InterfaceKind::Bridge { members, .. } => {
                    for member in members {
                        if !self.interfaces.contains_key(member) {
                            return Err(NetCfgError::reference("bridge", &iface.name, member));
                        }
                    }
                }
                InterfaceKind::Vlan { link, .. } => {
                    if !self.interfaces.contains_key(link) {
                        return Err(NetCfgError::reference("vlan", &iface.name, link));
                    }
                }
                InterfaceKind::Physical | InterfaceKind::Loopback => {}
            }
        }
        Ok(())
    }
}
