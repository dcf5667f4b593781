//! shell-relay CLI
//!
//! - `connect`: open one interactive shell on a peer through the local proxy
//! - `watch`: render backend notifications from a JSON-lines stream
//! - `config`: inspect or create the configuration file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shell_relay::commands;
use shell_relay::output::print_error;

#[derive(Parser)]
#[command(name = "shell-relay")]
#[command(author, version, about = "Interactive remote shell through a local proxy")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an interactive shell on a peer
    Connect {
        /// Peer address or name
        host: String,
        /// Login name (overrides config)
        #[arg(short, long)]
        user: Option<String>,
        /// Remote port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Private key for publickey authentication
        #[arg(short, long)]
        identity: Option<PathBuf>,
        /// SOCKS5 proxy address (overrides config)
        #[arg(long, conflicts_with = "direct")]
        proxy: Option<String>,
        /// Dial the peer directly instead of through the proxy
        #[arg(long)]
        direct: bool,
        /// Expected host key fingerprint
        #[arg(long)]
        fingerprint: Option<String>,
        /// Accept any host key
        #[arg(long)]
        accept_host_key: bool,
        /// JSON-lines backend notifications to show alongside the session (`-` for stdin)
        #[arg(short, long)]
        events: Option<PathBuf>,
    },

    /// Render backend notifications
    Watch {
        /// JSON-lines event source (`-` for stdin)
        #[arg(default_value = "-")]
        source: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    // Logs go to stderr; stdout belongs to the remote shell
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Connect {
            host,
            user,
            port,
            identity,
            proxy,
            direct,
            fingerprint,
            accept_host_key,
            events,
        } => {
            let mut config = commands::load_relay_config(config_path)?;
            if let Some(user) = user {
                config.username = user;
            }
            if let Some(port) = port {
                config.remote_port = port;
            }
            if identity.is_some() {
                config.private_key_path = identity;
            }
            if direct {
                config.proxy.address = None;
            } else if proxy.is_some() {
                config.proxy.address = proxy;
            }
            if fingerprint.is_some() {
                config.host_key_fingerprint = fingerprint;
            }
            config.accept_unknown_host_keys |= accept_host_key;

            if let Err(e) = commands::connect_command(config, &host, events).await {
                print_error(&format!("{:#}", e));
                return Err(e);
            }
        }

        Commands::Watch { source } => {
            let config = commands::load_relay_config(config_path)?;
            commands::watch_command(&source, config.remote_port).await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path)?,
            ConfigAction::Init { force } => commands::config_init(config_path, force)?,
            ConfigAction::Path => commands::config_path(config_path),
        },
    }

    Ok(())
}
