use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use treasury::config::AppConfig;
use treasury::logging::init_tracing;
use treasury::password::PasswordManager;
use treasury::{initialize_from_config, resource, Treasury};

#[derive(Parser, Debug)]
#[command(name = "treasury")]
#[command(about = "Multi-tenant identity and access data service")]
struct Args {
    /// Configuration file path (default: config.yaml)
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config file)
    #[arg(long)]
    host: Option<String>,

    /// Initialize the database schema and exit
    #[arg(long)]
    init_only: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (mut app_config, using_defaults) =
        if args.config == "config.yaml" && !std::path::Path::new("config.yaml").exists() {
            (AppConfig::default_config(), true)
        } else {
            (AppConfig::load_from_file(&args.config)?, false)
        };

    if let Some(port) = args.port {
        app_config.server.port = port;
    }
    if let Some(host) = args.host {
        app_config.server.host = host;
    }

    init_tracing(&app_config.logging)?;

    if using_defaults {
        tracing::warn!("no config.yaml found, using in-memory SQLite with anonymous access");
    }

    let database = app_config.database()?;
    tracing::info!(
        database = %database.db_type,
        max_connections = database.max_connections,
        "setting up backend"
    );

    let backend = initialize_from_config(&app_config).await?;

    if args.init_only {
        tracing::info!("schema initialized, exiting");
        backend.cleanup().await?;
        return Ok(());
    }

    let passwords = PasswordManager::from_config(&app_config.password)?;
    let treasury = Treasury::new(backend, passwords);

    let host: std::net::IpAddr = app_config.server.host.parse().unwrap_or_else(|_| {
        tracing::warn!(host = %app_config.server.host, "invalid host address, using 127.0.0.1");
        [127, 0, 0, 1].into()
    });
    let addr = SocketAddr::from((host, app_config.server.port));

    tracing::info!(
        %addr,
        base_path = %app_config.server.base_path,
        auth = %app_config.auth.auth_type,
        "treasury listening"
    );

    let app = resource::router(treasury, Arc::new(app_config));
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
