//! Headless clusterscope: follows a master and prints a summary on every
//! state change. Type `retry` to acknowledge a retry notice, `quit` to exit.

use clusterscope_client::config::ClientConfig;
use clusterscope_client::error::ClientError;
use clusterscope_client::telemetry::init_tracing;
use clusterscope_client::{Engine, MasterApi, MasterClient};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    init_tracing(config.log_format)?;

    let api: Arc<dyn MasterApi> = Arc::new(MasterClient::new(&config)?);
    let (engine, handle, mut reader) = Engine::new(api, &config.backoff);
    let engine_task = engine.spawn();

    info!(master = config.base_url(), "Following master");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut notifications_seen = 0;

    loop {
        tokio::select! {
            changed = reader.changed() => {
                if changed.is_err() {
                    break;
                }
                let (summary, notices, raised) = reader.read_latest(|state| {
                    let notices: Vec<String> = state
                        .notifications_since(notifications_seen)
                        .map(ToString::to_string)
                        .collect();
                    (state.summary(), notices, state.notifications_raised)
                });
                notifications_seen = raised;
                for notice in notices {
                    println!("{}", notice);
                }
                println!("{}", summary);
            }
            line = lines.next_line(), if stdin_open => {
                match line?.as_deref().map(str::trim) {
                    Some("retry") => {
                        if handle.acknowledge_retry().await.is_err() {
                            break;
                        }
                    }
                    Some("quit") => break,
                    Some("") => {}
                    Some(other) => warn!(command = other, "Unknown command"),
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let _ = handle.shutdown().await;
    if let Err(err) = engine_task.await {
        warn!(error = %err, "Engine task ended abnormally");
    }
    Ok(())
}
