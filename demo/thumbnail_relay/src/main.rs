mod config;
use btd_core::providers::OEmbedProvider;
use btd_core::telemetry::init_logging;
use btd_core::{ContentRealm, InjectRealm, ProviderRegistry, Transport};
use config::RelayConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    init_logging("info,btd_core=info,thumbnail_relay=info")?;

    info!(
        target: "thumbnail_relay",
        "Starting thumbnail relay: InjectRealm → Transport → ContentRealm → Provider → reply"
    );

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = RelayConfig::load();

    // Providers are fixed once the content realm starts
    let mut builder = ProviderRegistry::builder();
    for provider_cfg in cfg.providers.iter().cloned() {
        let name = provider_cfg.name.clone();
        match OEmbedProvider::new(provider_cfg) {
            Ok(provider) => builder = builder.register(Arc::new(provider)),
            Err(e) => warn!(target: "thumbnail_relay", provider = %name, error = %e, "Skipping provider"),
        }
    }
    let registry = Arc::new(builder.build());

    let transport = Transport::with_capacity(cfg.transport_capacity);
    let content = ContentRealm::start(&transport, registry, cfg.settings.clone());
    let dataset = content.inject_dataset()?;
    let inject = Arc::new(InjectRealm::start(&transport, &dataset, cfg.requester.clone())?);

    info!(target: "thumbnail_relay", "Reading chirp URL lists (one JSON array per line) from stdin");

    // Each stdin line is one chirp; requests run concurrently and print as they complete
    let reader = tokio::spawn(relay_lines(
        BufReader::new(tokio::io::stdin()),
        Arc::clone(&inject),
    ));

    tokio::select! {
        requests = reader => {
            match requests {
                Ok(count) => info!(target: "thumbnail_relay", requests = count, "Input exhausted"),
                Err(e) => warn!(target: "thumbnail_relay", error = %e, "Input reader failed"),
            }
        }
        _ = signal::ctrl_c() => {
            info!(target: "thumbnail_relay", "Ctrl-C received; shutting down");
        }
    }

    inject.shutdown();
    content.shutdown();
    info!(target: "thumbnail_relay", "Thumbnail relay stopped");
    Ok(())
}

/// Issue one thumbnail request per JSON-array line of `input` and print each
/// reply. Returns how many requests were issued once input ends.
async fn relay_lines<R>(input: R, inject: Arc<InjectRealm>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut tasks = Vec::new();
    let mut line_no = 0usize;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(target: "thumbnail_relay", line = line_no + 1, error = %e, "Failed to read input; no further requests");
                break;
            }
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let entities: Vec<Value> = match serde_json::from_str::<Value>(&line) {
            Ok(Value::Array(items)) => items,
            _ => {
                warn!(target: "thumbnail_relay", line = line_no, "Expected a JSON array of URL entities");
                continue;
            }
        };
        let inject = Arc::clone(&inject);
        tasks.push(tokio::spawn(async move {
            let out = match inject.requester().request(&entities).await {
                Ok(data) => json!({ "line": line_no, "thumbnail": data }),
                Err(e) => json!({ "line": line_no, "error": e.to_string() }),
            };
            println!("{}", out);
        }));
    }

    let issued = tasks.len();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(target: "thumbnail_relay", error = %e, "Request task failed");
        }
    }
    issued
}
