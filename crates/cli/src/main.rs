mod auth_commands;
mod server;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "authcode", about = "OAuth 2.0 authorization-code flow client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config.toml (defaults to the platform config directory).
    #[arg(long, global = true, env = "AUTHCODE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the provider login URL.
    Url,
    /// Open the login page, wait for the redirect and exchange the code.
    Login {
        /// Seconds to wait for the provider to redirect back.
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
    /// Serve `/` (redirect to login) and the callback route over HTTP.
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Exchange an authorization code obtained elsewhere.
    Exchange {
        #[arg(long)]
        code: String,
    },
    /// Obtain a new access token from a refresh token.
    Refresh {
        #[arg(long, env = "AUTHCODE_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "authcode starting");

    let config = authcode_config::discover_and_load(cli.config.as_deref())?;

    match cli.command {
        Commands::Url => auth_commands::print_url(&config),
        Commands::Login { timeout_secs } => auth_commands::login(&config, timeout_secs).await,
        Commands::Serve { bind, port } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let port = port.unwrap_or(config.server.port);
            server::start_server(&config, &bind, port).await
        },
        Commands::Exchange { code } => auth_commands::exchange(&config, code).await,
        Commands::Refresh { refresh_token } => {
            auth_commands::refresh(&config, &refresh_token).await
        },
    }
}
