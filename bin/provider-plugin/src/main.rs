use anyhow::{Context, Result};
use provider_client::{ClientConfig, ScwClient};
use provider_core::{EngineConfig, ResourceRegistry};
use provider_resources::Apis;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod protocol;

use protocol::{Request, Response};

const DEFAULT_LOG_FILTER: &str = "provider_plugin=info,provider_core=info,provider_resources=info";

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the host protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with_writer(std::io::stderr)
        .init();

    info!("Starting provider-plugin...");

    let engine = Arc::new(EngineConfig::from_env().context("reading engine configuration")?);
    info!(
        region = %engine.default_region,
        zone = %engine.default_zone,
        retry_interval = ?engine.retry_interval,
        "Engine configuration loaded"
    );

    let client_config = ClientConfig::from_env().context("reading client configuration")?;
    let client = ScwClient::new(&client_config).context("building vendor client")?;
    info!(api_url = client.api_url(), "Vendor client initialized");

    let apis = Apis::from_client(client);
    let registry = Arc::new(provider_resources::registry(engine, &apis).context("registering resources")?);
    info!(
        resources = registry.resource_types().count(),
        data_sources = registry.data_source_types().count(),
        "Registry initialized"
    );

    serve(registry).await
}

/// Serve requests from stdin until it closes or the process is interrupted.
async fn serve(registry: Arc<ResourceRegistry>) -> Result<()> {
    let shutdown = CancellationToken::new();
    let (responses, mut outbox) = mpsc::unbounded_channel::<Response>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = outbox.recv().await {
            let mut line = match serde_json::to_vec(&response) {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to encode response: {}", e);
                    continue;
                }
            };
            line.push(b'\n');
            if let Err(e) = stdout.write_all(&line).await {
                error!("Failed to write response: {}", e);
                break;
            }
            if let Err(e) = stdout.flush().await {
                error!("Failed to flush stdout: {}", e);
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    debug!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Request>(&line) {
                    Ok(request) => {
                        let registry = registry.clone();
                        let responses = responses.clone();
                        let cancel = shutdown.child_token();
                        tasks.spawn(async move {
                            let response = protocol::handle(&registry, request, cancel).await;
                            let _ = responses.send(response);
                        });
                    }
                    Err(e) => {
                        warn!("Malformed request: {}", e);
                        let _ = responses.send(Response::malformed(&e));
                    }
                }
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!("Request task failed: {}", e);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for shutdown signal")?;
                info!("Shutdown signal received, cancelling {} in-flight requests", tasks.len());
                shutdown.cancel();
                break;
            }
        }
    }

    // Cancelled hooks still answer with whatever state they reached.
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Request task failed: {}", e);
        }
    }
    drop(responses);
    if let Err(e) = writer.await {
        error!("Response writer failed: {}", e);
    }

    info!("provider-plugin stopped");
    Ok(())
}
