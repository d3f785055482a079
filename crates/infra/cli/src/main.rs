//! Outpost command line tool.
//!
//! ```text
//! outpost <config.toml> catalog
//! outpost <config.toml> endpoints
//! outpost <config.toml> dispatch <event-key> [json-data]
//! outpost <config.toml> test <url>
//! ```

use serde_json::{Map, Value};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use outpost_webhooks::{EndpointInput, WebhookSystem, WebhooksConfig};

const USAGE: &str = "usage: outpost <config.toml> <catalog | endpoints | dispatch <event-key> [json-data] | test <url>>";

#[derive(Debug, PartialEq)]
enum Command {
    Catalog,
    Endpoints,
    Dispatch {
        event_key: String,
        data: Option<Map<String, Value>>,
    },
    Test {
        url: String,
    },
}

#[derive(Debug, PartialEq)]
struct Args {
    config: String,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let (config, rest) = match args {
        [config, rest @ ..] => (config.clone(), rest),
        [] => return Err(USAGE.to_string()),
    };

    let command = match rest {
        [cmd] if cmd == "catalog" => Command::Catalog,
        [cmd] if cmd == "endpoints" => Command::Endpoints,
        [cmd, key] if cmd == "dispatch" => Command::Dispatch {
            event_key: key.clone(),
            data: None,
        },
        [cmd, key, json] if cmd == "dispatch" => {
            let data = match serde_json::from_str(json) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err("dispatch data must be a JSON object".to_string()),
                Err(e) => return Err(format!("invalid dispatch data: {}", e)),
            };
            Command::Dispatch {
                event_key: key.clone(),
                data: Some(data),
            }
        }
        [cmd, url] if cmd == "test" => Command::Test { url: url.clone() },
        _ => return Err(USAGE.to_string()),
    };

    Ok(Args { config, command })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let config = WebhooksConfig::load(&args.config)?;
    let system = WebhookSystem::builder(config).build()?;

    match args.command {
        Command::Catalog => {
            for (group, entries) in system.catalog().grouped() {
                println!("{}", group);
                for (key, metadata) in entries {
                    match metadata.description {
                        Some(description) => {
                            println!("  {:<32} {} - {}", key, metadata.label, description)
                        }
                        None => println!("  {:<32} {}", key, metadata.label),
                    }
                }
            }
        }
        Command::Endpoints => {
            system.seed_endpoints().await?;
            for endpoint in system.endpoints().list().await? {
                let keys = system.endpoints().subscribed_event_keys(endpoint.id).await?;
                println!(
                    "{} {} [{}] {}",
                    endpoint.id,
                    endpoint.url,
                    if endpoint.enabled { "enabled" } else { "disabled" },
                    keys.join(", ")
                );
            }
        }
        Command::Dispatch { event_key, data } => {
            system.seed_endpoints().await?;
            let outcome = system.dispatch(&event_key, data, Map::new()).await?;
            let attempts = system.drain().await?;

            let delivered = system
                .engine()
                .recent_deliveries()
                .await
                .iter()
                .filter(|d| d.is_success())
                .count();
            println!(
                "{}: {} submitted, {} skipped, {} attempts, {} delivered",
                event_key, outcome.submitted, outcome.skipped, attempts, delivered
            );
        }
        Command::Test { url } => {
            let endpoint = system.endpoints().create(EndpointInput::new(url)).await?;
            let outcome = system.endpoints().test(endpoint.id).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
