// =============================================================================
// Upbit REST API Client — public market data endpoints
// =============================================================================
//
// Three endpoints, all public:
//   GET /v1/market/all       — the market universe plus korean display names
//   GET /v1/ticker?markets=  — bulk tickers, at most 100 market ids per call
//   GET /v1/candles/days     — per-market daily candles (baseline fallback)
//
// The bulk ticker endpoint caps the id list per call, so the full universe is
// partitioned into fixed-size chunks issued sequentially with a short pause
// between calls to stay under Upbit's rate limit.
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::types::{Exchange, FetchWarning};

/// Only KRW-quoted markets are tracked, matching the dashboard's scope.
const QUOTE_PREFIX: &str = "KRW-";

#[derive(Debug, Deserialize)]
struct UpbitMarket {
    market: String,
    korean_name: String,
}

/// Upbit public API client. Raw tickers are returned as `serde_json::Value`
/// so that typed decoding can happen per asset in the normalizer.
#[derive(Debug, Clone)]
pub struct UpbitClient {
    base_url: String,
    chunk_size: usize,
    chunk_pause: Duration,
    candle_pause: Duration,
    client: reqwest::Client,
}

impl UpbitClient {
    /// Create a client that re-uses an existing HTTP client.
    pub fn with_client(config: &RuntimeConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.upbit_base_url.clone(),
            chunk_size: config.ticker_chunk_size,
            chunk_pause: Duration::from_millis(config.chunk_pause_ms),
            candle_pause: Duration::from_millis(config.candle_pause_ms),
            client,
        }
    }

    // -------------------------------------------------------------------------
    // Market universe
    // -------------------------------------------------------------------------

    /// GET /v1/market/all — the KRW market universe.
    ///
    /// Returns the ordered market-id list plus a market-id → korean-name
    /// lookup used for display names.
    pub async fn market_universe(&self) -> Result<(Vec<String>, HashMap<String, String>)> {
        let url = format!("{}/v1/market/all", self.base_url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /v1/market/all request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Upbit GET /v1/market/all returned {status}: {body}");
        }

        let markets: Vec<UpbitMarket> = resp
            .json()
            .await
            .context("failed to parse market list response")?;

        let mut ids = Vec::new();
        let mut names = HashMap::new();
        for m in markets {
            if m.market.starts_with(QUOTE_PREFIX) {
                ids.push(m.market.clone());
                names.insert(m.market, m.korean_name);
            }
        }

        debug!(count = ids.len(), "Upbit KRW market universe fetched");
        Ok((ids, names))
    }

    // -------------------------------------------------------------------------
    // Bulk tickers
    // -------------------------------------------------------------------------

    /// GET /v1/ticker for the full market list, partitioned into chunks of at
    /// most `chunk_size` ids with a fixed pause between sequential calls.
    pub async fn tickers(&self, markets: &[String]) -> Result<Vec<Value>> {
        let mut all = Vec::with_capacity(markets.len());

        let chunks: Vec<&[String]> = markets.chunks(self.chunk_size).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let url = format!("{}/v1/ticker?markets={}", self.base_url, chunk.join(","));

            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("GET /v1/ticker chunk {} request failed", i + 1))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Upbit GET /v1/ticker returned {status}: {body}");
            }

            let tickers: Vec<Value> = resp
                .json()
                .await
                .with_context(|| format!("failed to parse ticker chunk {}", i + 1))?;

            debug!(chunk = i + 1, count = tickers.len(), "ticker chunk fetched");
            all.extend(tickers);

            if i + 1 < chunks.len() {
                tokio::time::sleep(self.chunk_pause).await;
            }
        }

        Ok(all)
    }

    // -------------------------------------------------------------------------
    // Daily candles (previous-calendar-day baseline)
    // -------------------------------------------------------------------------

    /// GET /v1/candles/days — the previous calendar day's cumulative traded
    /// volume for one market. Index 0 is the running day, index 1 the last
    /// completed one.
    pub async fn prev_day_volume(&self, market: &str) -> Result<f64> {
        let url = format!(
            "{}/v1/candles/days?market={}&count=2",
            self.base_url, market
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET /v1/candles/days for {market} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Upbit GET /v1/candles/days for {market} returned {status}: {body}");
        }

        let candles: Vec<Value> = resp
            .json()
            .await
            .with_context(|| format!("failed to parse daily candles for {market}"))?;

        candles
            .get(1)
            .and_then(|c| c.get("candle_acc_trade_volume"))
            .and_then(Value::as_f64)
            .with_context(|| format!("no previous-day candle volume for {market}"))
    }

    /// Fetch previous-day baselines for every market, one call per asset.
    ///
    /// A failed call degrades that market's baseline to 0 and records a
    /// warning; the batch itself never aborts.
    pub async fn prev_day_baselines(
        &self,
        markets: &[String],
    ) -> (HashMap<String, f64>, Vec<FetchWarning>) {
        let mut baselines = HashMap::with_capacity(markets.len());
        let mut warnings = Vec::new();

        for (i, market) in markets.iter().enumerate() {
            match self.prev_day_volume(market).await {
                Ok(volume) => {
                    baselines.insert(market.clone(), volume);
                }
                Err(e) => {
                    warn!(market = %market, error = %e, "candle baseline degraded to 0");
                    baselines.insert(market.clone(), 0.0);
                    warnings.push(FetchWarning::asset(
                        Exchange::Upbit,
                        market.clone(),
                        format!("previous-day candle unavailable, baseline set to 0: {e:#}"),
                    ));
                }
            }

            if i + 1 < markets.len() {
                tokio::time::sleep(self.candle_pause).await;
            }
        }

        (baselines, warnings)
    }
}
