//! End-to-end rendering tests
//!
//! Parse a v1 or v2 YAML config, render it through a backend, write
//! the artifacts under a temp root and compare the resulting file tree
//! byte-for-byte against the expected contents.

use netcfg_rs::render::{RendererType, render_to};
use netcfg_rs::schema::parse_network_config;
use netcfg_rs::NetCfgError;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;
use uuid::Uuid;

/// Collect (relative path → content) for every file under a root
fn dir_to_path_map(root: &Path) -> BTreeMap<String, String> {
    fn walk(root: &Path, dir: &Path, result: &mut BTreeMap<String, String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, result);
            } else {
                let relative = path.strip_prefix(root).unwrap();
                result.insert(
                    relative.to_str().unwrap().to_string(),
                    std::fs::read_to_string(&path).unwrap(),
                );
            }
        }
    }
    let mut result = BTreeMap::new();
    walk(root, root, &mut result);
    result
}

async fn render_to_map(yaml: &str, renderer: RendererType) -> BTreeMap<String, String> {
    let state = parse_network_config(yaml).unwrap();
    let target = TempDir::new().unwrap();
    render_to(&state, renderer, target.path()).await.unwrap();
    dir_to_path_map(target.path())
}

fn connection_uuid(key: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("netcfg-rs/{key}").as_bytes())
}

#[tokio::test]
async fn networkd_dhcp_artifacts() {
    let files = render_to_map(
        "network:\n  version: 2\n  ethernets:\n    eth0:\n      dhcp4: true\n",
        RendererType::Networkd,
    )
    .await;

    let expected = BTreeMap::from([(
        "etc/systemd/network/10-netcfg-eth0.network".to_string(),
        "[Match]\nName=eth0\n\n[Network]\nDHCP=ipv4\n".to_string(),
    )]);
    assert_eq!(files, expected);
}

#[tokio::test]
async fn network_manager_static_artifacts() {
    let yaml = r#"
network:
  version: 1
  config:
    - type: physical
      name: eth0
      subnets:
        - type: static
          address: 192.168.1.10
          netmask: 255.255.255.0
          gateway: 192.168.1.1
          dns_nameservers: [192.168.1.1]
    - type: nameserver
      address: [8.8.8.8]
      search: [global.example]
"#;
    let files = render_to_map(yaml, RendererType::NetworkManager).await;

    // The per-interface DNS override replaces the global nameserver
    // config entirely: no 8.8.8.8, no global.example search domain.
    let expected_content = format!(
        "[connection]\n\
         id=netcfg-eth0\n\
         uuid={}\n\
         type=ethernet\n\
         interface-name=eth0\n\
         \n\
         [ethernet]\n\
         \n\
         [ipv4]\n\
         method=manual\n\
         address1=192.168.1.10/24\n\
         gateway=192.168.1.1\n\
         dns=192.168.1.1\n\
         \n\
         [ipv6]\n\
         method=ignore\n\
         \n",
        connection_uuid("eth0")
    );
    let expected = BTreeMap::from([(
        "etc/NetworkManager/system-connections/netcfg-eth0.nmconnection".to_string(),
        expected_content,
    )]);
    assert_eq!(files, expected);
}

#[tokio::test]
async fn eni_static_artifacts() {
    let yaml = r#"
network:
  version: 2
  ethernets:
    eth0:
      addresses: [10.0.0.2/24]
      gateway4: 10.0.0.1
"#;
    let files = render_to_map(yaml, RendererType::Eni).await;

    let expected = BTreeMap::from([(
        "etc/network/interfaces".to_string(),
        "# This file is generated by netcfg-rs\n\
         # See interfaces(5) for file format\n\
         \n\
         auto lo\n\
         iface lo inet loopback\n\
         \n\
         auto eth0\n\
         iface eth0 inet static\n\
         \x20   address 10.0.0.2\n\
         \x20   netmask 255.255.255.0\n\
         \x20   gateway 10.0.0.1\n\
         \n"
            .to_string(),
    )]);
    assert_eq!(files, expected);
}

#[tokio::test]
async fn rendering_is_idempotent_across_backends() {
    let yaml = r#"
network:
  version: 2
  ethernets:
    eth0:
      dhcp4: true
    eth1:
      addresses: [192.168.0.5/24, "fd00::5/64"]
      nameservers:
        addresses: [192.168.0.1]
  bonds:
    bond0:
      interfaces: [eth0, eth1]
      parameters:
        mode: active-backup
        mii-monitor-interval: 100
      dhcp4: true
  vlans:
    bond0.42:
      id: 42
      link: bond0
      addresses: [10.42.0.2/24]
"#;
    for renderer in [
        RendererType::Netplan,
        RendererType::Networkd,
        RendererType::NetworkManager,
        RendererType::Eni,
    ] {
        let first = render_to_map(yaml, renderer).await;
        let second = render_to_map(yaml, renderer).await;
        assert!(!first.is_empty());
        assert_eq!(first, second, "{renderer:?} output must be byte-identical");
    }
}

#[tokio::test]
async fn dns_override_precedence_visible_in_every_backend() {
    let yaml = r#"
network:
  version: 1
  config:
    - type: physical
      name: eth0
      subnets:
        - type: static
          address: 192.0.2.10/24
          dns_nameservers: [192.0.2.53]
    - type: nameserver
      address: [198.51.100.53]
"#;
    let networkd = render_to_map(yaml, RendererType::Networkd).await;
    let network = &networkd["etc/systemd/network/10-netcfg-eth0.network"];
    assert!(network.contains("DNS=192.0.2.53"));
    assert!(!network.contains("198.51.100.53"));

    let eni = render_to_map(yaml, RendererType::Eni).await;
    let interfaces = &eni["etc/network/interfaces"];
    assert!(interfaces.contains("dns-nameservers 192.0.2.53"));
    assert!(!interfaces.contains("198.51.100.53"));

    let netplan = render_to_map(yaml, RendererType::Netplan).await;
    let doc = &netplan["etc/netplan/50-netcfg.yaml"];
    assert!(doc.contains("192.0.2.53"));
    assert!(!doc.contains("198.51.100.53"));
}

#[tokio::test]
async fn netplan_round_trip_preserves_fields() {
    let yaml = r#"
network:
  version: 2
  ethernets:
    eth0:
      addresses: [192.168.1.10/24]
      gateway4: 192.168.1.1
      mtu: 9000
      routes:
        - to: 10.0.0.0/8
          via: 192.168.1.254
"#;
    let files = render_to_map(yaml, RendererType::Netplan).await;
    let doc = &files["etc/netplan/50-netcfg.yaml"];

    // Re-parse the rendered document: everything must survive
    let state = parse_network_config(doc).unwrap();
    let eth0 = state.get("eth0").unwrap();
    assert_eq!(eth0.addresses, vec!["192.168.1.10/24"]);
    assert_eq!(eth0.gateway4.as_deref(), Some("192.168.1.1"));
    assert_eq!(eth0.mtu, Some(9000));
    assert_eq!(eth0.routes.len(), 1);
    assert_eq!(eth0.routes[0].to, "10.0.0.0/8");
    assert_eq!(eth0.routes[0].via.as_deref(), Some("192.168.1.254"));
}

#[test]
fn dangling_bridge_member_rejected_at_parse_time() {
    let err = parse_network_config(
        "network:\n  version: 2\n  bridges:\n    br0:\n      interfaces: [nope0]\n",
    )
    .unwrap_err();
    assert!(matches!(err, NetCfgError::Reference { .. }));
}
