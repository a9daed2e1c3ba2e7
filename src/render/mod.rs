//! Network configuration renderers
//!
//! Each backend consumes an immutable [`NetworkState`] and produces a
//! self-consistent set of (relative path → file content) pairs under a
//! target root.
//!
//! Supported renderers:
//! - `netplan` - netplan YAML (etc/netplan)
//! - `network_manager` - NetworkManager keyfiles (etc/NetworkManager)
//! - `networkd` - systemd-networkd units (etc/systemd/network)
//! - `eni` - Debian ENI (etc/network/interfaces)

pub mod eni;
pub mod netplan;
pub mod network_manager;
pub mod networkd;

use crate::NetCfgError;
use crate::state::NetworkState;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Closed set of render backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererType {
    Netplan,
    Networkd,
    NetworkManager,
    Eni,
}

impl RendererType {
    /// Detect the appropriate renderer for this system
    pub fn detect() -> Option<Self> {
        if Path::new("/etc/netplan").exists() {
            return Some(Self::Netplan);
        }
        if Path::new("/run/systemd/system").exists()
            && Path::new("/lib/systemd/systemd-networkd").exists()
        {
            return Some(Self::Networkd);
        }
        if Path::new("/usr/sbin/NetworkManager").exists() || Path::new("/usr/bin/nmcli").exists() {
            return Some(Self::NetworkManager);
        }
        if Path::new("/etc/network/interfaces").exists() {
            return Some(Self::Eni);
        }
        None
    }

    /// Get renderer from string hint
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.to_lowercase().as_str() {
            "netplan" => Some(Self::Netplan),
            "networkd" | "systemd-networkd" => Some(Self::Networkd),
            "networkmanager" | "network-manager" | "nm" => Some(Self::NetworkManager),
            "eni" | "interfaces" | "ifupdown" => Some(Self::Eni),
            _ => None,
        }
    }

    /// Construct the backend for this variant
    pub fn create(&self) -> Box<dyn Renderer> {
        match self {
            Self::Netplan => Box::new(netplan::NetplanRenderer::new()),
            Self::Networkd => Box::new(networkd::NetworkdRenderer::new()),
            Self::NetworkManager => Box::new(network_manager::NetworkManagerRenderer::new()),
            Self::Eni => Box::new(eni::EniRenderer::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Netplan => "netplan",
            Self::Networkd => "networkd",
            Self::NetworkManager => "network-manager",
            Self::Eni => "eni",
        }
    }
}

/// Trait for network configuration renderers.
///
/// Rendering is a pure function of the state: the same input must
/// produce byte-identical output.
pub trait Renderer {
    /// Render network state to files, paths relative to a target root
    fn render(&self, state: &NetworkState) -> Result<Vec<RenderedFile>, NetCfgError>;

    /// Get the renderer type
    fn renderer_type(&self) -> RendererType;

    /// Whether this backend requires concrete interface names.
    ///
    /// Backends that return `true` cannot express deferred MAC/driver
    /// matching and must fail rendering when an interface has no
    /// concrete name, rather than guess.
    fn needs_concrete_names(&self) -> bool {
        false
    }
}

/// A rendered configuration file
#[derive(Debug, Clone)]
pub struct RenderedFile {
    /// Path relative to the target root (e.g. `etc/netplan/50-netcfg.yaml`)
    pub path: PathBuf,
    /// File contents
    pub content: String,
    /// File permissions (octal)
    pub mode: u32,
}

impl RenderedFile {
    pub fn new(path: impl Into<PathBuf>, content: String, mode: u32) -> Self {
        Self {
            path: path.into(),
            content,
            mode,
        }
    }
}

/// Render the state with the given backend and write the artifacts
/// under `target_root`.
pub async fn render_to(
    state: &NetworkState,
    renderer_type: RendererType,
    target_root: &Path,
) -> Result<Vec<PathBuf>, NetCfgError> {
    info!(renderer = renderer_type.name(), "Rendering network config");
    let renderer = renderer_type.create();
    let files = renderer.render(state)?;
    write_rendered_files(&files, target_root).await?;
    info!(
        count = files.len(),
        "Wrote network configuration artifacts"
    );
    Ok(files.iter().map(|f| f.path.clone()).collect())
}

/// Write rendered files under a target root.
///
/// Each file is written to a temp sibling and renamed into place, so a
/// crash mid-render never leaves a half-written config behind.
pub async fn write_rendered_files(
    files: &[RenderedFile],
    target_root: &Path,
) -> Result<(), NetCfgError> {
    for file in files {
        let full_path = target_root.join(&file.path);
        debug!("Writing network config: {}", full_path.display());

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = tmp_sibling(&full_path);
        tokio::fs::write(&tmp_path, &file.content).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(file.mode))
                .await?;
        }

        tokio::fs::rename(&tmp_path, &full_path).await?;
    }
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_from_hint() {
        assert_eq!(
            RendererType::from_hint("netplan"),
            Some(RendererType::Netplan)
        );
        assert_eq!(
            RendererType::from_hint("networkd"),
            Some(RendererType::Networkd)
        );
        assert_eq!(
            RendererType::from_hint("NetworkManager"),
            Some(RendererType::NetworkManager)
        );
        assert_eq!(RendererType::from_hint("eni"), Some(RendererType::Eni));
        assert_eq!(RendererType::from_hint("unknown"), None);
    }

    #[test]
    fn test_tmp_sibling_stays_in_dir() {
        let tmp = tmp_sibling(Path::new("etc/netplan/50-netcfg.yaml"));
        assert_eq!(tmp, Path::new("etc/netplan/50-netcfg.yaml.tmp"));
    }

    #[tokio::test]
    async fn test_write_rendered_files_atomic_result() {
        let dir = tempfile::TempDir::new().unwrap();
        let files = vec![RenderedFile::new(
            "etc/test/demo.conf",
            "hello\n".to_string(),
            0o600,
        )];
        write_rendered_files(&files, dir.path()).await.unwrap();

        let written = dir.path().join("etc/test/demo.conf");
        assert_eq!(std::fs::read_to_string(&written).unwrap(), "hello\n");
        // No stray temp file left behind
        assert!(!dir.path().join("etc/test/demo.conf.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&written).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
