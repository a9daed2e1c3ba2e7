//! Error types for netcfg-rs

use thiserror::Error;

/// Main error type for netcfg-rs operations
#[derive(Error, Debug)]
pub enum NetCfgError {
    /// Malformed or missing input in a network-config document
    #[error("Schema error: {0}")]
    Schema(String),

    /// A bond/bridge member or VLAN parent that refers to an
    /// interface not present in the config
    #[error("Dangling reference: {kind} '{name}' refers to unknown interface '{target}'")]
    Reference {
        kind: String,
        name: String,
        target: String,
    },

    /// State that the selected backend cannot express, or a failed
    /// write of a rendered artifact
    #[error("Render error ({renderer}): {message}")]
    Render { renderer: String, message: String },

    /// A mirror URL template that substituted into an unparseable URL.
    /// Recovered per-URL by the mirror resolver, never fatal there.
    #[error("URL substitution error: {0}")]
    Substitution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl NetCfgError {
    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Create a dangling-reference error
    pub fn reference(
        kind: impl Into<String>,
        name: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::Reference {
            kind: kind.into(),
            name: name.into(),
            target: target.into(),
        }
    }

    /// Create a render error
    pub fn render(renderer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            renderer: renderer.into(),
            message: message.into(),
        }
    }
}
