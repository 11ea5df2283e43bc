mod aggregate;
mod config;
mod http;
mod metrics;
mod normalize;
mod probes;
mod snapshot;

use aggregate::Aggregator;
use clap::Parser;
use config::Config;
use http::HealthProxy;
use metrics::Metrics;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostsnapd")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./config.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialize metrics");
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = match cfg.listen.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "invalid listen address");
            std::process::exit(1);
        }
    };

    let client = Client::builder()
        .user_agent(concat!("hostsnapd/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new());

    let aggregator = Arc::new(Aggregator::new(Duration::from_millis(cfg.probe_timeout_ms)));
    let proxy = Arc::new(HealthProxy::new(client, &cfg.health_check));
    let app = http::build_router(aggregator, proxy, metrics);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "failed to start HTTP server");
            std::process::exit(1);
        }
    };

    info!(
        listen = %cfg.listen,
        probe_timeout_ms = cfg.probe_timeout_ms,
        upstream = %cfg.health_check.upstream_url,
        "starting hostsnapd"
    );

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to wait for Ctrl+C");
        }
    });

    if let Err(err) = server.await {
        error!(error = %err, "HTTP server error");
    }

    info!("shutdown complete");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
