use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use wifi_switcher::{
    config::{self, Config},
    scan, server,
    workflow::{ConnectRequest, Workflow},
    SessionId, SystemRunner,
};

#[derive(Parser)]
#[command(name = "wifi-switcher")]
#[command(about = "Scan for WiFi networks and switch between internet uplink and hotspot mode")]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config dir>/wifi-switcher/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available wireless interfaces
    ListInterfaces,

    /// Scan for WiFi networks
    Scan {
        /// Interface to scan with (defaults to the first wireless interface)
        #[arg(short, long)]
        interface: Option<String>,
    },

    /// Scan, then connect the uplink to a network found by the scan
    Connect {
        /// SSID of the network to connect to
        ssid: String,

        /// Password for the network
        #[arg(short, long)]
        password: String,

        /// Interface providing the internet uplink
        #[arg(short, long)]
        uplink: String,

        /// Interface serving the hotspot
        #[arg(short = 'H', long)]
        hotspot: String,

        /// Interface to scan with (defaults to the first wireless interface)
        #[arg(short, long)]
        interface: Option<String>,
    },

    /// Start the web form
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the effective configuration and saved role assignment
    ShowConfig,

    /// Write the effective configuration to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_path()?,
    };
    let cfg = Config::load_from(&config_path)?;
    init_logging(&cfg)?;

    match cli.command {
        Commands::ListInterfaces => cmd_list_interfaces(&cfg),
        Commands::Scan { interface } => cmd_scan(&cfg, interface.as_deref()).await,
        Commands::Connect {
            ssid,
            password,
            uplink,
            hotspot,
            interface,
        } => cmd_connect(&cfg, ssid, password, uplink, hotspot, interface.as_deref()).await,
        Commands::Serve { port } => cmd_serve(&cfg, port).await,
        Commands::ShowConfig => cmd_show_config(&cfg, &config_path),
        Commands::InitConfig => cmd_init_config(&cfg, &config_path),
    }
}

fn init_logging(cfg: &Config) -> Result<()> {
    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    match &cfg.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            builder.target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(Target::Stdout);
        }
    }

    builder.init();
    Ok(())
}

fn workflow(cfg: &Config) -> Workflow<SystemRunner> {
    Workflow::new(cfg, Arc::new(SystemRunner))
}

/// Use the given interface, or the first wireless one.
fn resolve_interface(workflow: &Workflow<SystemRunner>, interface: Option<&str>) -> Result<String> {
    match interface {
        Some(name) => Ok(name.to_string()),
        None => match workflow.interfaces().into_iter().next() {
            Some(iface) => Ok(iface.name),
            None => bail!("No wireless interface found"),
        },
    }
}

fn cmd_list_interfaces(cfg: &Config) -> Result<()> {
    let interfaces = workflow(cfg).interfaces();

    if interfaces.is_empty() {
        println!("No wireless interfaces found.");
        return Ok(());
    }

    println!("{:<16} {}", "INTERFACE", "TYPE");
    println!("{}", "-".repeat(28));

    for iface in interfaces {
        let iface_type = if iface.is_usb { "USB" } else { "Built-in" };
        println!("{:<16} {}", iface.name, iface_type);
    }

    Ok(())
}

async fn cmd_scan(cfg: &Config, interface: Option<&str>) -> Result<()> {
    let workflow = workflow(cfg);
    let interface = resolve_interface(&workflow, interface)?;
    println!("Scanning on interface: {}", interface);
    println!();

    let result = workflow.scan(&SessionId::generate(), &interface).await?;
    scan::display_scan(&result);

    Ok(())
}

async fn cmd_connect(
    cfg: &Config,
    ssid: String,
    password: String,
    uplink: String,
    hotspot: String,
    interface: Option<&str>,
) -> Result<()> {
    let workflow = workflow(cfg);
    let interface = resolve_interface(&workflow, interface)?;
    let session = SessionId::generate();

    println!("Scanning on interface: {}", interface);
    let result = workflow.scan(&session, &interface).await?;
    println!("Found {} network(s).", result.networks.len());

    println!("Connecting to '{}' (uplink {}, hotspot {})...", ssid, uplink, hotspot);
    let request = ConnectRequest {
        interface,
        ssid,
        secret: password,
        uplink,
        hotspot,
    };
    let attempt = workflow.connect(&session, &request).await?;

    println!("Connected successfully!");
    if let Some(path) = attempt.credential_path {
        println!("Credentials saved to {}", path.display());
    }

    Ok(())
}

async fn cmd_serve(cfg: &Config, port: Option<u16>) -> Result<()> {
    let config = server::ServerConfig {
        port: port.unwrap_or(cfg.listen_port),
        session_ttl: cfg.session_ttl(),
    };
    server::run_server(Arc::new(workflow(cfg)), config).await
}

fn cmd_show_config(cfg: &Config, path: &Path) -> Result<()> {
    println!("Config file: {}", path.display());
    println!();
    println!("{}", toml::to_string_pretty(cfg).context("Failed to serialize config")?);

    match workflow(cfg).saved_roles() {
        Some(roles) => {
            println!("{:<12} {}", "ROLE", "INTERFACE");
            println!("{}", "-".repeat(28));
            println!("{:<12} {}", "uplink", roles.uplink_interface);
            println!("{:<12} {}", "hotspot", roles.hotspot_interface);
        }
        None => println!("No saved role configuration."),
    }

    Ok(())
}

fn cmd_init_config(cfg: &Config, path: &Path) -> Result<()> {
    cfg.save_to(path)?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}
