use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::GatewayProtocol;
use bridge_agent::LoggingAssetModel;
use bridge_agent::model::primary_attribute;
use infrastructure::TransportFactory;
use infrastructure::config::{AgentConfig, GatewayConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory, relative to the agent's base directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Override the first gateway's host (adds a gateway when none is configured)
    #[arg(long)]
    gateway_host: Option<String>,

    /// Override the first gateway's security code
    #[arg(long)]
    security_code: Option<String>,
}

fn apply_overrides(config: &mut AgentConfig, args: &Args) {
    if args.gateway_host.is_none() && args.security_code.is_none() {
        return;
    }
    if config.gateways.is_empty() {
        config.gateways.push(GatewayConfig {
            id: "cli".to_string(),
            host: None,
            security_code: None,
            enabled: None,
        });
    }

    let gateway = &mut config.gateways[0];
    if let Some(host) = &args.gateway_host {
        gateway.host = Some(host.clone());
    }
    if let Some(code) = &args.security_code {
        gateway.security_code = Some(code.clone());
    }
}

async fn run() -> Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,bridge_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🤖 Gateway Bridge Agent Starting...");
    info!("🆔 Process ID: {}", std::process::id());

    let args = Args::parse();

    // Run from the workspace root during development
    let dev_base = "crates/bridge-agent";
    let base_dir = if std::path::Path::new(dev_base).exists() {
        dev_base
    } else {
        "."
    };
    let config_dir_path = format!("{}/{}", base_dir, args.config_dir);
    info!("📂 Config directory: {}", config_dir_path);

    // 1. Load Configuration
    let mut config = AgentConfig::load(&config_dir_path)
        .with_context(|| format!("Failed to load configuration from {}", config_dir_path))?;
    apply_overrides(&mut config, &args);
    info!(
        "✅ Loaded configuration for Agent: {} ({} gateway(s))",
        config.agent_id,
        config.gateways.len()
    );

    // 2. Transport
    let transport = TransportFactory::create(&config.transport)
        .context("Failed to create gateway transport")?;
    info!(kind = config.transport.kind.as_str(), "🔐 Transport ready");

    // 3. Attach gateways
    let model = Arc::new(LoggingAssetModel::new());
    let protocol = GatewayProtocol::new(transport, model.clone());

    for configuration in config.protocol_configurations() {
        let status = protocol.attach(&configuration).await;
        info!(configuration = %configuration.id, status = %status, "Gateway attached");
    }

    // 4. Link the primary attribute of every controllable device
    for (configuration, device) in model.take_discovered() {
        let Some(attribute) = primary_attribute(&device) else {
            continue;
        };
        if protocol.link_asset_attribute(attribute.clone(), &configuration).await {
            info!(attribute = %attribute, "🔗 Attribute linked");
        }
    }
    info!(
        bindings = protocol.bindings().len(),
        gateways = protocol.registry().len().await,
        "✅ Agent Initialized"
    );

    // 5. Shutdown Signal
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutting down..."),
        Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
    }

    protocol.shutdown().await;

    info!("👋 Good bye!");
    Ok(())
}

fn main() {
    let result = tokio::runtime::Runtime::new()
        .context("Failed to start the async runtime")
        .and_then(|rt| rt.block_on(run()));

    if let Err(e) = result {
        eprintln!("\n❌ CRITICAL ERROR: {:?}", e);
        eprintln!("--------------------------------------------------");
        eprintln!("The bridge agent stopped because of a fatal error.");
        std::process::exit(1);
    }
}
