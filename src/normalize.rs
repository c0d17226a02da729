// =============================================================================
// Volume Normalizer — raw exchange tickers → VolumeRecord
// =============================================================================
//
// Each exchange speaks its own dialect: Upbit returns JSON numbers and a
// fractional 24 h change rate, Bithumb returns every number as a string and a
// rate that is already a percentage.  This module maps both into the common
// `VolumeRecord` shape, one raw ticker in → exactly one `Result` out.
//
// Decoding is fail-closed and per asset: a malformed ticker yields a
// `NormalizeError` carrying its market id, never a silent zero and never an
// aborted batch.  The aggregator turns those errors into dashboard warnings.
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::{Exchange, VolumeRecord};

/// Bithumb's bulk endpoint exposes only a 7-day volume total; the daily
/// baseline is its arithmetic mean.
const SEVEN_DAY_WINDOW: f64 = 7.0;

// =============================================================================
// Error type
// =============================================================================

/// Why a single raw ticker could not be normalized.
///
/// `Decode` covers structurally-absent or wrongly-typed fields; `BadNumber`
/// covers fields that are present but hold an unparsable string. Keeping the
/// two apart makes "field missing" vs "field present, value garbage" visible
/// in diagnostics.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("ticker object carries no market identifier")]
    MissingMarketId,

    #[error("{market}: malformed ticker: {source}")]
    Decode {
        market: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{market}: field `{field}` is not a number: `{value}`")]
    BadNumber {
        market: String,
        field: &'static str,
        value: String,
    },
}

impl NormalizeError {
    /// Market id the error pertains to, when one could be identified.
    pub fn market(&self) -> Option<&str> {
        match self {
            Self::MissingMarketId => None,
            Self::Decode { market, .. } | Self::BadNumber { market, .. } => Some(market),
        }
    }
}

// =============================================================================
// Change-rate arithmetic
// =============================================================================

/// Percentage change of `current` vs. `baseline`.
///
/// Falls back to 0 when the baseline is zero or missing so the metric is
/// always defined (a sort/filter key must never be NaN).
pub fn volume_change_rate(current: f64, baseline: f64) -> f64 {
    if baseline > 0.0 {
        ((current - baseline) / baseline) * 100.0
    } else {
        0.0
    }
}

// =============================================================================
// Upbit
// =============================================================================

#[derive(Debug, Deserialize)]
struct UpbitTicker {
    market: String,
    trade_price: f64,
    /// Fractional 24 h change, e.g. 0.015 for +1.5 %.
    signed_change_rate: f64,
    /// Cumulative volume since 00:00 KST — the prior-window figure under the
    /// `prev-accumulated` baseline policy.
    acc_trade_volume: f64,
    /// Rolling 24 h cumulative volume — the current measurement window.
    acc_trade_volume_24h: f64,
}

/// Normalize one raw Upbit ticker.
///
/// `names` maps market id → korean display name (from the market-list
/// endpoint). `baselines`, when present, holds per-asset previous-calendar-day
/// volumes and takes precedence over the ticker's own prior-volume field;
/// markets absent from it degrade to a baseline of 0.
pub fn normalize_upbit(
    raw: &Value,
    names: &HashMap<String, String>,
    baselines: Option<&HashMap<String, f64>>,
    observed_at: DateTime<Utc>,
) -> Result<VolumeRecord, NormalizeError> {
    let market = raw
        .get("market")
        .and_then(Value::as_str)
        .ok_or(NormalizeError::MissingMarketId)?
        .to_string();

    let ticker: UpbitTicker =
        serde_json::from_value(raw.clone()).map_err(|source| NormalizeError::Decode {
            market: market.clone(),
            source,
        })?;

    let baseline_volume = match baselines {
        Some(map) => map.get(&ticker.market).copied().unwrap_or(0.0),
        None => ticker.acc_trade_volume,
    };

    let display_name = names
        .get(&ticker.market)
        .cloned()
        .unwrap_or_else(|| base_currency(&ticker.market).to_string());

    let rate = volume_change_rate(ticker.acc_trade_volume_24h, baseline_volume);

    Ok(VolumeRecord {
        exchange: Exchange::Upbit,
        market_id: ticker.market,
        display_name,
        current_volume: ticker.acc_trade_volume_24h,
        baseline_volume,
        price: ticker.trade_price,
        price_change_rate: ticker.signed_change_rate * 100.0,
        volume_change_rate: rate,
        observed_at,
    })
}

/// Normalize a whole raw Upbit batch lazily, one `Result` per ticker.
pub fn upbit_records<'a>(
    raw: &'a [Value],
    names: &'a HashMap<String, String>,
    baselines: Option<&'a HashMap<String, f64>>,
    observed_at: DateTime<Utc>,
) -> impl Iterator<Item = Result<VolumeRecord, NormalizeError>> + 'a {
    raw.iter()
        .map(move |ticker| normalize_upbit(ticker, names, baselines, observed_at))
}

// =============================================================================
// Bithumb
// =============================================================================

#[derive(Debug, Deserialize)]
struct BithumbTicker {
    closing_price: String,
    volume_1day: String,
    volume_7day: String,
    #[serde(rename = "fluctate_rate_24H")]
    fluctate_rate_24h: String,
}

/// Normalize one raw Bithumb ticker. `coin` is the bare base-currency code
/// from the `ALL_KRW` response map; the market id is normalized to the
/// `KRW-<COIN>` shape so both exchanges line up in the table.
pub fn normalize_bithumb(
    coin: &str,
    raw: &Value,
    observed_at: DateTime<Utc>,
) -> Result<VolumeRecord, NormalizeError> {
    let market = format!("KRW-{coin}");

    let ticker: BithumbTicker =
        serde_json::from_value(raw.clone()).map_err(|source| NormalizeError::Decode {
            market: market.clone(),
            source,
        })?;

    let price = parse_field(&market, "closing_price", &ticker.closing_price)?;
    let current_volume = parse_field(&market, "volume_1day", &ticker.volume_1day)?;
    let volume_7day = parse_field(&market, "volume_7day", &ticker.volume_7day)?;
    let price_change_rate = parse_field(&market, "fluctate_rate_24H", &ticker.fluctate_rate_24h)?;

    // 7-day average stands in for a true prior-day volume.
    let baseline_volume = volume_7day / SEVEN_DAY_WINDOW;

    Ok(VolumeRecord {
        exchange: Exchange::Bithumb,
        market_id: market,
        display_name: coin.to_string(),
        current_volume,
        baseline_volume,
        price,
        price_change_rate,
        volume_change_rate: volume_change_rate(current_volume, baseline_volume),
        observed_at,
    })
}

/// Normalize a whole raw Bithumb batch lazily, one `Result` per coin.
pub fn bithumb_records<'a>(
    raw: &'a [(String, Value)],
    observed_at: DateTime<Utc>,
) -> impl Iterator<Item = Result<VolumeRecord, NormalizeError>> + 'a {
    raw.iter()
        .map(move |(coin, ticker)| normalize_bithumb(coin, ticker, observed_at))
}

// =============================================================================
// Helpers
// =============================================================================

/// Parse a stringly-typed numeric field, fail-closed.
fn parse_field(market: &str, field: &'static str, value: &str) -> Result<f64, NormalizeError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| NormalizeError::BadNumber {
            market: market.to_string(),
            field,
            value: value.to_string(),
        })
}

/// Base-currency code of a `<QUOTE>-<BASE>` market id.
fn base_currency(market_id: &str) -> &str {
    market_id
        .split_once('-')
        .map(|(_, base)| base)
        .unwrap_or(market_id)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names() -> HashMap<String, String> {
        HashMap::from([("KRW-BTC".to_string(), "비트코인".to_string())])
    }

    #[test]
    fn change_rate_matches_percentage_formula() {
        assert_eq!(volume_change_rate(150.0, 100.0), 50.0);
        assert_eq!(volume_change_rate(80.0, 100.0), -20.0);
        assert!((volume_change_rate(1.0, 3.0) - (-200.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn change_rate_is_zero_on_zero_or_negative_baseline() {
        assert_eq!(volume_change_rate(150.0, 0.0), 0.0);
        assert_eq!(volume_change_rate(0.0, 0.0), 0.0);
        assert_eq!(volume_change_rate(10.0, -1.0), 0.0);
    }

    #[test]
    fn upbit_ticker_normalizes() {
        let raw = json!({
            "market": "KRW-BTC",
            "trade_price": 95_000_000.0,
            "signed_change_rate": 0.015,
            "acc_trade_volume": 100.0,
            "acc_trade_volume_24h": 150.0,
            "timestamp": 1_700_000_000_000_i64
        });

        let rec = normalize_upbit(&raw, &names(), None, Utc::now()).unwrap();
        assert_eq!(rec.exchange, Exchange::Upbit);
        assert_eq!(rec.market_id, "KRW-BTC");
        assert_eq!(rec.display_name, "비트코인");
        assert_eq!(rec.current_volume, 150.0);
        assert_eq!(rec.baseline_volume, 100.0);
        assert_eq!(rec.volume_change_rate, 50.0);
        // Fractional rate is scaled to percent.
        assert!((rec.price_change_rate - 1.5).abs() < 1e-9);
    }

    #[test]
    fn upbit_candle_baseline_takes_precedence() {
        let raw = json!({
            "market": "KRW-BTC",
            "trade_price": 1.0,
            "signed_change_rate": 0.0,
            "acc_trade_volume": 100.0,
            "acc_trade_volume_24h": 80.0
        });

        let baselines = HashMap::from([("KRW-BTC".to_string(), 100.0)]);
        let rec = normalize_upbit(&raw, &names(), Some(&baselines), Utc::now()).unwrap();
        assert_eq!(rec.baseline_volume, 100.0);
        assert_eq!(rec.volume_change_rate, -20.0);

        // Market missing from the candle lookup degrades to baseline 0.
        let rec = normalize_upbit(&raw, &names(), Some(&HashMap::new()), Utc::now()).unwrap();
        assert_eq!(rec.baseline_volume, 0.0);
        assert_eq!(rec.volume_change_rate, 0.0);
    }

    #[test]
    fn upbit_unknown_market_falls_back_to_base_currency_name() {
        let raw = json!({
            "market": "KRW-XYZ",
            "trade_price": 1.0,
            "signed_change_rate": 0.0,
            "acc_trade_volume": 1.0,
            "acc_trade_volume_24h": 1.0
        });
        let rec = normalize_upbit(&raw, &names(), None, Utc::now()).unwrap();
        assert_eq!(rec.display_name, "XYZ");
    }

    #[test]
    fn upbit_missing_field_fails_closed() {
        let raw = json!({ "market": "KRW-BTC", "trade_price": 1.0 });
        let err = normalize_upbit(&raw, &names(), None, Utc::now()).unwrap_err();
        assert_eq!(err.market(), Some("KRW-BTC"));
        assert!(matches!(err, NormalizeError::Decode { .. }));

        let err = normalize_upbit(&json!({"trade_price": 1.0}), &names(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, NormalizeError::MissingMarketId));
    }

    #[test]
    fn bithumb_ticker_normalizes() {
        let raw = json!({
            "closing_price": "131600000",
            "volume_1day": "140.0",
            "volume_7day": "700.0",
            "fluctate_rate_24H": "-1.24"
        });

        let rec = normalize_bithumb("BTC", &raw, Utc::now()).unwrap();
        assert_eq!(rec.exchange, Exchange::Bithumb);
        assert_eq!(rec.market_id, "KRW-BTC");
        assert_eq!(rec.display_name, "BTC");
        assert_eq!(rec.baseline_volume, 100.0);
        assert_eq!(rec.volume_change_rate, 40.0);
        // Bithumb's rate is already a percentage; no rescaling.
        assert_eq!(rec.price_change_rate, -1.24);
    }

    #[test]
    fn bithumb_unparsable_number_fails_closed() {
        let raw = json!({
            "closing_price": "n/a",
            "volume_1day": "1.0",
            "volume_7day": "7.0",
            "fluctate_rate_24H": "0.0"
        });
        let err = normalize_bithumb("BTC", &raw, Utc::now()).unwrap_err();
        assert_eq!(err.market(), Some("KRW-BTC"));
        assert!(matches!(
            err,
            NormalizeError::BadNumber { field: "closing_price", .. }
        ));
    }

    #[test]
    fn bithumb_missing_field_is_a_decode_error() {
        let raw = json!({ "closing_price": "1.0" });
        let err = normalize_bithumb("ETH", &raw, Utc::now()).unwrap_err();
        assert!(matches!(err, NormalizeError::Decode { .. }));
        assert_eq!(err.market(), Some("KRW-ETH"));
    }
}
