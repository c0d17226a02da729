// =============================================================================
// Runtime Configuration — exchange endpoints and fetch pacing
// =============================================================================
//
// Everything tunable lives here: exchange base URLs, the bulk-ticker chunk
// ceiling, the pauses that keep us under the exchanges' rate limits, and the
// Upbit baseline policy.  Values come from `VOLPULSE_*` environment variables
// (via dotenv) on top of built-in defaults; nothing is persisted to disk.
//
// All fields carry `#[serde(default)]` so a partial JSON document (e.g. in
// tests or a future config endpoint) always deserialises.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_upbit_base_url() -> String {
    "https://api.upbit.com".to_string()
}

fn default_bithumb_base_url() -> String {
    "https://api.bithumb.com".to_string()
}

fn default_ticker_chunk_size() -> usize {
    100
}

fn default_chunk_pause_ms() -> u64 {
    100
}

fn default_candle_pause_ms() -> u64 {
    120
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// BaselinePolicy
// =============================================================================

/// How the Upbit baseline volume (the change-rate denominator) is obtained.
///
/// Bithumb is not configurable: its bulk endpoint only exposes a 7-day
/// total, so the baseline there is always `volume_7day / 7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselinePolicy {
    /// Prior cumulative-volume field (`acc_trade_volume`) from the same
    /// ticker payload. No extra requests.
    PrevAccumulated,

    /// Previous-calendar-day volume fetched per asset from the daily-candle
    /// endpoint. One request per market; failures degrade that asset's
    /// baseline to 0.
    PrevDayCandle,
}

impl Default for BaselinePolicy {
    fn default() -> Self {
        Self::PrevAccumulated
    }
}

impl std::fmt::Display for BaselinePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrevAccumulated => write!(f, "prev-accumulated"),
            Self::PrevDayCandle => write!(f, "prev-day-candle"),
        }
    }
}

impl std::str::FromStr for BaselinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prev-accumulated" => Ok(Self::PrevAccumulated),
            "prev-day-candle" => Ok(Self::PrevDayCandle),
            other => Err(format!("unknown baseline policy `{other}`")),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Exchange endpoints --------------------------------------------------

    /// Upbit public API base URL.
    #[serde(default = "default_upbit_base_url")]
    pub upbit_base_url: String,

    /// Bithumb public API base URL.
    #[serde(default = "default_bithumb_base_url")]
    pub bithumb_base_url: String,

    // --- Fetch pacing --------------------------------------------------------

    /// Maximum market ids per bulk-ticker call (Upbit's API ceiling).
    #[serde(default = "default_ticker_chunk_size")]
    pub ticker_chunk_size: usize,

    /// Pause between bulk-ticker chunk calls, in milliseconds.
    #[serde(default = "default_chunk_pause_ms")]
    pub chunk_pause_ms: u64,

    /// Pause between per-asset daily-candle calls, in milliseconds.
    #[serde(default = "default_candle_pause_ms")]
    pub candle_pause_ms: u64,

    /// HTTP request timeout, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    // --- Baseline policy -----------------------------------------------------

    /// How the Upbit change-rate baseline is obtained.
    #[serde(default)]
    pub upbit_baseline: BaselinePolicy,

    // --- API server ----------------------------------------------------------

    /// Bind address for the dashboard API server.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            upbit_base_url: default_upbit_base_url(),
            bithumb_base_url: default_bithumb_base_url(),
            ticker_chunk_size: default_ticker_chunk_size(),
            chunk_pause_ms: default_chunk_pause_ms(),
            candle_pause_ms: default_candle_pause_ms(),
            http_timeout_secs: default_http_timeout_secs(),
            upbit_baseline: BaselinePolicy::default(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Build a configuration from defaults overridden by `VOLPULSE_*`
    /// environment variables. Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        override_from_env("VOLPULSE_UPBIT_BASE_URL", &mut config.upbit_base_url);
        override_from_env("VOLPULSE_BITHUMB_BASE_URL", &mut config.bithumb_base_url);
        override_from_env("VOLPULSE_TICKER_CHUNK_SIZE", &mut config.ticker_chunk_size);
        override_from_env("VOLPULSE_CHUNK_PAUSE_MS", &mut config.chunk_pause_ms);
        override_from_env("VOLPULSE_CANDLE_PAUSE_MS", &mut config.candle_pause_ms);
        override_from_env("VOLPULSE_HTTP_TIMEOUT_SECS", &mut config.http_timeout_secs);
        override_from_env("VOLPULSE_UPBIT_BASELINE", &mut config.upbit_baseline);
        override_from_env("VOLPULSE_BIND_ADDR", &mut config.bind_addr);

        // A chunk size of 0 would loop forever on `chunks()`.
        if config.ticker_chunk_size == 0 {
            warn!("VOLPULSE_TICKER_CHUNK_SIZE must be positive, using default");
            config.ticker_chunk_size = default_ticker_chunk_size();
        }

        config
    }
}

/// Overwrite `slot` from the environment variable `key` if it is set and
/// parses; otherwise leave the current value and log a warning on bad input.
fn override_from_env<T>(key: &'static str, slot: &mut T)
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(e) => warn!(key, value = %raw, error = %e, "ignoring unparsable env override"),
        }
    }
}
