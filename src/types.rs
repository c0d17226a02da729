// =============================================================================
// Shared types used across the Volume Pulse tracker
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source exchange of a [`VolumeRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Upbit,
    Bithumb,
}

impl Exchange {
    /// All exchanges the tracker polls, in fetch order.
    pub const ALL: [Exchange; 2] = [Exchange::Upbit, Exchange::Bithumb];
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upbit => write!(f, "Upbit"),
            Self::Bithumb => write!(f, "Bithumb"),
        }
    }
}

impl std::str::FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upbit" => Ok(Self::Upbit),
            "bithumb" => Ok(Self::Bithumb),
            other => Err(format!("unknown exchange `{other}`")),
        }
    }
}

/// One normalized per-asset observation. Immutable once created; a refresh
/// produces a wholly new batch of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub exchange: Exchange,

    /// Exchange-unique market identifier in `<QUOTE>-<BASE>` form,
    /// e.g. `KRW-BTC`. Bithumb coins are normalized into the same shape.
    pub market_id: String,

    /// Human-readable asset name (korean name where the exchange provides
    /// one, otherwise the base-currency code).
    pub display_name: String,

    /// Cumulative traded volume over the current measurement window.
    pub current_volume: f64,

    /// Traded volume over the comparison window. Which window that is
    /// depends on the exchange's baseline policy (see `normalize`).
    pub baseline_volume: f64,

    /// Latest trade price.
    pub price: f64,

    /// Signed 24 h price change, in percent.
    pub price_change_rate: f64,

    /// Signed volume change vs. baseline, in percent. Always defined:
    /// a zero or missing baseline yields 0 rather than a division by zero.
    pub volume_change_rate: f64,

    pub observed_at: DateTime<Utc>,
}

/// A degradation event surfaced to the dashboard: either a whole-exchange
/// batch failure or a single dropped asset.
#[derive(Debug, Clone, Serialize)]
pub struct FetchWarning {
    pub exchange: Exchange,

    /// Market the warning pertains to; `None` for batch-level failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,

    pub message: String,

    pub at: DateTime<Utc>,
}

impl FetchWarning {
    /// Batch-level warning (the exchange's whole contribution was lost).
    pub fn batch(exchange: Exchange, message: impl Into<String>) -> Self {
        Self {
            exchange,
            market: None,
            message: message.into(),
            at: Utc::now(),
        }
    }

    /// Per-asset warning (one market was dropped or degraded).
    pub fn asset(exchange: Exchange, market: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exchange,
            market: Some(market.into()),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_parses_case_insensitively() {
        assert_eq!("upbit".parse::<Exchange>().unwrap(), Exchange::Upbit);
        assert_eq!(" Bithumb ".parse::<Exchange>().unwrap(), Exchange::Bithumb);
        assert!("binance".parse::<Exchange>().is_err());
    }

    #[test]
    fn exchange_serializes_like_display() {
        assert_eq!(serde_json::to_string(&Exchange::Upbit).unwrap(), "\"Upbit\"");
        assert_eq!(
            serde_json::to_string(&Exchange::Bithumb).unwrap(),
            "\"Bithumb\""
        );
        assert_eq!(Exchange::Upbit.to_string(), "Upbit");
        assert_eq!(Exchange::Bithumb.to_string(), "Bithumb");
    }

    #[test]
    fn batch_warning_has_no_market() {
        let w = FetchWarning::batch(Exchange::Upbit, "fetch failed");
        assert!(w.market.is_none());
        let w = FetchWarning::asset(Exchange::Bithumb, "KRW-BTC", "bad field");
        assert_eq!(w.market.as_deref(), Some("KRW-BTC"));
    }
}
