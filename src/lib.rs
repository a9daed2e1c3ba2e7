//! netcfg-rs library
//!
//! Parses declarative network configuration (v1 and v2 schema) into a
//! normalized [`state::NetworkState`] and renders it to backend
//! formats: netplan, NetworkManager keyfiles, systemd-networkd units
//! and Debian ENI. Also ships the package-mirror URL resolution helper
//! used when building per-region package sources.
//!
//! # Design Principles
//!
//! - **Safety First**: No unsafe code (`#![forbid(unsafe_code)]`)
//! - **Deterministic output**: rendering is a pure function of the
//!   parsed state; re-rendering produces byte-identical artifacts
//! - **Fail loudly**: configuration a backend cannot express is an
//!   error, never a silent drop

pub mod mirror;
pub mod render;
pub mod schema;
pub mod state;

mod error;

pub use error::NetCfgError;
pub use schema::{parse_network_config, parse_network_config_with_macs};
