// =============================================================================
// Bithumb REST API Client — ALL_KRW bulk ticker
// =============================================================================
//
// One public endpoint covers the whole exchange:
//   GET /public/ticker/ALL_KRW
//
// The response is an envelope `{status, message?, data}` where a status other
// than "0000" signals an API-level failure.  `data` maps coin symbol →
// ticker object, plus one `date` metadata key that is not an asset and is
// skipped here.
// =============================================================================

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::RuntimeConfig;

/// Status code Bithumb uses for a successful response.
const STATUS_OK: &str = "0000";

#[derive(Debug, Deserialize)]
struct TickerEnvelope {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Bithumb public API client. Raw per-coin tickers are returned as
/// `serde_json::Value` so typed decoding can happen per asset in the
/// normalizer.
#[derive(Debug, Clone)]
pub struct BithumbClient {
    base_url: String,
    client: reqwest::Client,
}

impl BithumbClient {
    /// Create a client that re-uses an existing HTTP client.
    pub fn with_client(config: &RuntimeConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.bithumb_base_url.clone(),
            client,
        }
    }

    /// GET /public/ticker/ALL_KRW — every KRW-quoted ticker in one call.
    ///
    /// Returns `(coin symbol, raw ticker)` pairs in response order.
    pub async fn all_tickers(&self) -> Result<Vec<(String, Value)>> {
        let url = format!("{}/public/ticker/ALL_KRW", self.base_url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /public/ticker/ALL_KRW request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Bithumb GET /public/ticker/ALL_KRW returned {status}: {body}");
        }

        let envelope: TickerEnvelope = resp
            .json()
            .await
            .context("failed to parse ALL_KRW response")?;

        if envelope.status != STATUS_OK {
            anyhow::bail!(
                "Bithumb API error {}: {}",
                envelope.status,
                envelope.message.unwrap_or_else(|| "no message".to_string())
            );
        }

        let data = envelope
            .data
            .as_object()
            .context("ALL_KRW `data` is not an object")?;

        let tickers: Vec<(String, Value)> = data
            .iter()
            .filter(|(coin, _)| coin.as_str() != "date")
            .map(|(coin, ticker)| (coin.clone(), ticker.clone()))
            .collect();

        debug!(count = tickers.len(), "Bithumb tickers fetched");
        Ok(tickers)
    }
}
