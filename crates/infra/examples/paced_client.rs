//! Example: Paced calls against a public JSON API
//!
//! Loads client settings (environment first, then `apiq.toml`/`apiq.json`),
//! falling back to a throttled client for `https://httpbin.org` when
//! neither is present, and issues a handful of concurrent calls through one
//! session.
//!
//! ```bash
//! APIQ_BASE_URL=https://httpbin.org APIQ_RPS=2 APIQ_RETRIES=3 \
//!     cargo run -p apiq-infra --example paced_client
//! ```

use std::time::Instant;

use apiq_core::ClientSession;
use apiq_domain::{CallDescriptor, ClientConfig};
use apiq_infra::{config, init_tracing, HttpTransport, ObservabilityConfig};
use futures::future::join_all;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&ObservabilityConfig::from_env())?;

    let config = config::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "no configuration found, using httpbin defaults");
        ClientConfig::new("https://httpbin.org").with_rps(2).with_retries(3)
    });

    let transport = HttpTransport::from_config(&config)?;
    let session = ClientSession::from_config(transport, &config)?;
    let started = Instant::now();

    let results = session
        .scoped(|session| async move {
            let calls: Vec<_> = (0..5)
                .map(|n| CallDescriptor::get("/get").with_query("n", n))
                .collect();
            join_all(calls.iter().map(|call| session.dispatch(call))).await
        })
        .await?;

    for (n, result) in results.into_iter().enumerate() {
        match result {
            Ok(payload) => tracing::info!(n, args = %payload["args"], "call succeeded"),
            Err(err) => tracing::error!(n, error = %err, "call failed"),
        }
    }
    tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "all calls finished");
    Ok(())
}
