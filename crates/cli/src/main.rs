use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "inference-gateway", about = "Multi-tenant LLM inference gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is given).
    Serve {
        /// Path to the config file (overrides discovery).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Address to listen on, e.g. 0.0.0.0:8080.
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: SocketAddr,
    },
    /// Load and validate a config file without starting the server.
    CheckConfig {
        /// Path to the config file (overrides discovery).
        config: Option<PathBuf>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

fn load_config(path: &Option<PathBuf>) -> anyhow::Result<ig_config::GatewayConfig> {
    let config_file = match path {
        Some(p) => ig_config::load_config(p)?,
        None => ig_config::discover_and_load(),
    };
    let result = ig_config::validate(&config_file.inference_gateway);
    for diagnostic in &result.diagnostics {
        match diagnostic.severity {
            ig_config::Severity::Error => tracing::error!("{}", diagnostic.message),
            ig_config::Severity::Warning => tracing::warn!("{}", diagnostic.message),
        }
    }
    if result.has_errors() {
        anyhow::bail!("config validation failed");
    }
    Ok(config_file.inference_gateway)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);
    info!(version = env!("CARGO_PKG_VERSION"), "inference gateway starting");

    let default_listen = SocketAddr::from(([127, 0, 0, 1], 8080));
    let exit_code = match cli.command {
        None => run_serve(None, default_listen).await,
        Some(Commands::Serve { config, listen }) => run_serve(config, listen).await,
        Some(Commands::CheckConfig { config }) => match load_config(&config) {
            Ok(_) => {
                println!("config OK");
                0
            },
            Err(e) => {
                eprintln!("config invalid: {e}");
                1
            },
        },
    };

    std::process::exit(exit_code);
}

async fn run_serve(config_path: Option<PathBuf>, listen: SocketAddr) -> i32 {
    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{e}");
            return 1;
        },
    };

    // At least one enabled provider must resolve a secret, or the gateway
    // would come up with nothing to route to.
    let has_enabled_provider = config.providers.values().any(|p| p.enabled);
    let state = std::sync::Arc::new(ig_gateway::AppState::new(config));
    if has_enabled_provider && state.adapters.load().is_empty() {
        tracing::error!("no secret resolved for any enabled provider");
        return 2;
    }

    match ig_gateway::run(listen, state).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("{e}");
            1
        },
    }
}
