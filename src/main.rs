use std::process::ExitCode;

use lnd_rest::{LndClient, LndConfig};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    for directive in ["lnd_rest=debug", "hyper=warn", "tungstenite=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{}", commands::USAGE);
        return ExitCode::FAILURE;
    }

    info!("⚡ lnd-rest v{}", env!("CARGO_PKG_VERSION"));

    let config = match LndConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!("node at {}", config.rest_base_url());

    let client = match LndClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match commands::dispatch(&client, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
