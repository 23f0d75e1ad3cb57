use clap::Parser;
use kwatch_core::http::StaticToken;
use kwatch_core::{ClientConfig, Resource, WatchClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kwatch")]
#[command(about = "Mirror a collection (or one item) from a watch API and print every update")]
struct Cli {
    /// Collection path, e.g. /api/v1/namespaces/default/pods
    path: String,

    /// Watch a single item of the collection instead
    #[arg(short, long)]
    name: Option<String>,

    /// HTTP base URL (defaults to KWATCH_HTTP_BASE_URL)
    #[arg(short, long)]
    server: Option<String>,

    /// Bearer token
    #[arg(short, long, env = "KWATCH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Delay before reconnecting, in milliseconds
    #[arg(long)]
    reconnect_delay_ms: Option<u64>,

    /// Print full JSON instead of a summary line
    #[arg(long)]
    json: bool,
}

fn summary(r: &Resource) -> String {
    format!(
        "{:<10} {:<40} rv={:<10} {}",
        r.action_type.as_deref().unwrap_or("-"),
        r.name().unwrap_or(r.uid()),
        r.resource_version().unwrap_or("?"),
        r.kind.as_deref().unwrap_or("")
    )
}

fn print(r: &Resource, json: bool) {
    if json {
        match serde_json::to_string(r) {
            Ok(s) => println!("{}", s),
            Err(e) => warn!(uid = %r.uid(), error = %e, "Cannot encode resource"),
        }
    } else {
        println!("{}", summary(r));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(server) = &cli.server {
        let derived = ClientConfig::new(server.clone());
        config.http_base_url = derived.http_base_url;
        config.ws_base_url = derived.ws_base_url;
    }
    if let Some(ms) = cli.reconnect_delay_ms {
        config = config.with_reconnect_delay(Duration::from_millis(ms));
    }
    config.validate()?;

    let token = cli.token.clone().map(StaticToken::new).unwrap_or_default();
    let client = WatchClient::native(config, Arc::new(token))?;

    info!(server = %client.config().http_base_url, "kwatch started");

    let json = cli.json;
    match &cli.name {
        Some(name) => {
            info!(url = %cli.path, name = %name, "Watching item");
            let (handle, mut updates) = client.watch_item(&cli.path, name);
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    update = updates.recv() => match update {
                        Some(Ok(item)) => print(&item, json),
                        Some(Err(e)) => return Err(e.into()),
                        None => break,
                    }
                }
            }
            handle.cancel();
        }
        None => {
            info!(url = %cli.path, "Watching collection");
            let (handle, mut updates) = client.watch_collection(&cli.path);
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    update = updates.recv() => match update {
                        Some(Ok(items)) => {
                            println!("--- {} items", items.len());
                            for item in &items {
                                print(item, json);
                            }
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => break,
                    }
                }
            }
            handle.cancel();
        }
    }

    info!("Stopped");
    Ok(())
}
