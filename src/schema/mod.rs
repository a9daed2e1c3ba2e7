//! Network-config schema parsing
//!
//! Converts raw declarative network config (v1 entry list or v2
//! netplan-style mapping) into a normalized [`NetworkState`]. Parse
//! errors are fatal: no partial state is ever returned.

pub mod v1;
pub mod v2;

use crate::NetCfgError;
use crate::state::NetworkState;
use serde_yaml::Value;
use std::collections::HashMap;
use tracing::debug;

/// Parse a network-config YAML document into a `NetworkState`,
/// deferring any MAC-based interface matching to render time.
pub fn parse_network_config(yaml: &str) -> Result<NetworkState, NetCfgError> {
    parse_network_config_with_macs(yaml, None)
}

/// Parse a network-config YAML document, resolving MAC-based matching
/// rules against a host-supplied MAC → kernel-name table.
pub fn parse_network_config_with_macs(
    yaml: &str,
    mac_table: Option<&HashMap<String, String>>,
) -> Result<NetworkState, NetCfgError> {
    let value: Value = serde_yaml::from_str(yaml)?;
    parse_value(value, mac_table)
}

/// Parse an already-deserialized config mapping.
pub fn parse_value(
    value: Value,
    mac_table: Option<&HashMap<String, String>>,
) -> Result<NetworkState, NetCfgError> {
    // Accept an optional top-level `network:` wrapper
    let body = match &value {
        Value::Mapping(map) => match map.get("network") {
            Some(inner @ Value::Mapping(_)) => inner.clone(),
            Some(other) => {
                return Err(NetCfgError::schema(format!(
                    "'network' must be a mapping, got {}",
                    type_name(other)
                )));
            }
            None => value,
        },
        other => {
            return Err(NetCfgError::schema(format!(
                "network config must be a mapping, got {}",
                type_name(other)
            )));
        }
    };

    let map = match &body {
        Value::Mapping(map) => map,
        _ => unreachable!(),
    };

    let version = detect_version(map)?;
    debug!(version, "Parsing network config");

    match version {
        1 => {
            let items: Vec<v1::ConfigItem> = match map.get("config") {
                Some(config) => serde_yaml::from_value(config.clone())
                    .map_err(|e| NetCfgError::schema(format!("invalid v1 config: {e}")))?,
                None => {
                    return Err(NetCfgError::schema(
                        "v1 network config requires a 'config' list",
                    ));
                }
            };
            v1::build_state(items)
        }
        2 => {
            let config: v2::NetworkConfigV2 = serde_yaml::from_value(body.clone())
                .map_err(|e| NetCfgError::schema(format!("invalid v2 config: {e}")))?;
            v2::build_state(config, mac_table)
        }
        other => Err(NetCfgError::schema(format!(
            "unsupported network config version {other}"
        ))),
    }
}

/// Explicit `version` wins; a legacy `config:` list implies v1,
/// anything else is treated as v2.
fn detect_version(map: &serde_yaml::Mapping) -> Result<u64, NetCfgError> {
    match map.get("version") {
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| NetCfgError::schema(format!("invalid version '{n}'"))),
        Some(other) => Err(NetCfgError::schema(format!(
            "version must be a number, got {}",
            type_name(other)
        ))),
        None if map.contains_key("config") => Ok(1),
        None => Ok(2),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_v1_from_explicit_version() {
        let state = parse_network_config(
            r#"
version: 1
config:
  - type: physical
    name: eth0
    subnets:
      - type: dhcp4
"#,
        )
        .unwrap();
        assert_eq!(state.version(), 1);
        assert!(state.get("eth0").unwrap().dhcp4);
    }

    #[test]
    fn test_detect_v1_from_legacy_shape() {
        // No version field, but the legacy `config:` list shape
        let state = parse_network_config(
            r#"
config:
  - type: physical
    name: eth0
"#,
        )
        .unwrap();
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn test_detect_v2_default() {
        let state = parse_network_config(
            r#"
ethernets:
  eth0:
    dhcp4: true
"#,
        )
        .unwrap();
        assert_eq!(state.version(), 2);
    }

    #[test]
    fn test_network_wrapper_unwrapped() {
        let state = parse_network_config(
            r#"
network:
  version: 2
  ethernets:
    eth0:
      dhcp4: true
"#,
        )
        .unwrap();
        assert!(state.get("eth0").unwrap().dhcp4);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let err = parse_network_config("version: 3\nethernets: {}\n").unwrap_err();
        assert!(matches!(err, NetCfgError::Schema(_)));
    }

    #[test]
    fn test_non_mapping_input_rejected() {
        assert!(matches!(
            parse_network_config("- just\n- a\n- list\n").unwrap_err(),
            NetCfgError::Schema(_)
        ));
    }

    #[test]
    fn test_renderer_hint_passthrough() {
        let state = parse_network_config(
            r#"
network:
  version: 2
  renderer: NetworkManager
  ethernets:
    eth0:
      dhcp4: true
"#,
        )
        .unwrap();
        assert_eq!(state.renderer_hint(), Some("NetworkManager"));
    }
}
