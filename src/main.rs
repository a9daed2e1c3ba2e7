//! netcfg-rs - declarative network config parsing and rendering
//!
//! Reads a v1 or v2 network-config YAML document and renders it to a
//! backend format under a target root, or resolves package-mirror URL
//! templates against datasource facts.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use netcfg_rs::mirror::{DataSourceContext, MirrorInfo, resolve_mirrors};
use netcfg_rs::render::{RendererType, render_to};
use netcfg_rs::schema::parse_network_config_with_macs;

#[derive(Parser)]
#[command(name = "netcfg-rs")]
#[command(author, version, about = "Network config parsing and rendering", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a network config to a backend format
    Render {
        /// Network-config YAML file
        input: PathBuf,
        /// Backend: netplan, networkd, network-manager or eni
        /// (defaults to the config's renderer hint, then autodetect)
        #[arg(short, long)]
        format: Option<String>,
        /// Directory to write artifacts under
        #[arg(short, long, default_value = "/")]
        root: PathBuf,
        /// YAML file mapping MAC addresses to kernel interface names;
        /// without it, MAC-based matching is deferred to the backend
        #[arg(long)]
        mac_table: Option<PathBuf>,
    },
    /// Parse and validate a network config without rendering
    Validate {
        /// Network-config YAML file
        input: PathBuf,
    },
    /// Resolve package-mirror URL templates
    Mirrors {
        /// Mirror-info YAML file (search/failsafe maps)
        input: PathBuf,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        availability_zone: Option<String>,
        #[arg(long)]
        platform: Option<String>,
        /// Allow EC2-style mirrors on non-EC2 platforms
        #[arg(long)]
        allow_ec2_mirrors: bool,
    },
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Render {
            input,
            format,
            root,
            mac_table,
        } => {
            let yaml = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let macs = mac_table
                .map(|path| -> anyhow::Result<HashMap<String, String>> {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    Ok(serde_yaml::from_str(&text)?)
                })
                .transpose()?;

            let state = parse_network_config_with_macs(&yaml, macs.as_ref())?;

            let renderer_type = format
                .as_deref()
                .or(state.renderer_hint())
                .map(|hint| {
                    RendererType::from_hint(hint)
                        .with_context(|| format!("unknown renderer '{hint}'"))
                })
                .transpose()?
                .or_else(RendererType::detect);
            let Some(renderer_type) = renderer_type else {
                bail!("no suitable network renderer found; pass --format");
            };

            let written = render_to(&state, renderer_type, &root).await?;
            for path in written {
                println!("{}", root.join(path).display());
            }
        }
        Commands::Validate { input } => {
            let yaml = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let state = parse_network_config_with_macs(&yaml, None)?;
            info!(
                version = state.version(),
                interfaces = state.interfaces().count(),
                "Network config is valid"
            );
        }
        Commands::Mirrors {
            input,
            region,
            availability_zone,
            platform,
            allow_ec2_mirrors,
        } => {
            let yaml = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let info: MirrorInfo = serde_yaml::from_str(&yaml)?;
            let context = DataSourceContext {
                region,
                availability_zone,
                platform_type: platform,
                allow_ec2_mirror_on_other_platforms: allow_ec2_mirrors,
            };
            let resolved = resolve_mirrors(&info, &context, |url| Some(url.to_string()));
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
    }

    Ok(())
}
