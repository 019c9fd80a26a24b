use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::settings::Settings;

pub fn build_client(settings: &Settings) -> Result<Client, EngineError> {
    let client = Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch one document. Single attempt: no retry, no backoff.
pub async fn fetch_document(client: &Client, url: &str) -> Result<String, EngineError> {
    let start = Instant::now();
    info!(url, "fetching case page");

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response.text().await?;

    debug!(
        url,
        bytes = body.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "fetched"
    );
    Ok(body)
}
