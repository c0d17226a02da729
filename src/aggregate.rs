// =============================================================================
// Aggregator — per-exchange batches → one record sequence + diagnostics
// =============================================================================
//
// `collect` unwraps the normalizer's per-asset results, keeping successes and
// converting failures into `FetchWarning`s.  `merge` concatenates the
// per-exchange batches in fetch order without deduplication: both exchanges
// may legitimately list the same underlying asset.
//
// Both operations are pure and total — empty input produces empty output.
// =============================================================================

use tracing::warn;

use crate::normalize::NormalizeError;
use crate::types::{Exchange, FetchWarning, VolumeRecord};

/// One exchange's contribution to a refresh cycle.
#[derive(Debug, Clone, Default)]
pub struct ExchangeBatch {
    pub records: Vec<VolumeRecord>,
    pub warnings: Vec<FetchWarning>,
}

impl ExchangeBatch {
    /// Batch for an exchange whose whole fetch failed: no records, one
    /// batch-level warning.
    pub fn failed(exchange: Exchange, message: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            warnings: vec![FetchWarning::batch(exchange, message)],
        }
    }
}

/// Split per-asset normalization results into records and warnings.
///
/// Failed assets are dropped from the record sequence; each one is logged
/// and surfaced as a warning carrying its market id where known.
pub fn collect(
    exchange: Exchange,
    results: impl IntoIterator<Item = Result<VolumeRecord, NormalizeError>>,
) -> ExchangeBatch {
    let mut batch = ExchangeBatch::default();

    for result in results {
        match result {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                warn!(exchange = %exchange, error = %e, "dropping asset from batch");
                let market = e.market().map(str::to_string);
                batch.warnings.push(FetchWarning {
                    exchange,
                    market,
                    message: e.to_string(),
                    at: chrono::Utc::now(),
                });
            }
        }
    }

    batch
}

/// Concatenate per-exchange batches into one sequence, preserving batch
/// order. Records from distinct exchanges are never deduplicated.
pub fn merge(batches: Vec<ExchangeBatch>) -> (Vec<VolumeRecord>, Vec<FetchWarning>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for batch in batches {
        records.extend(batch.records);
        warnings.extend(batch.warnings);
    }

    (records, warnings)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;

    fn record(exchange: Exchange, market_id: &str) -> VolumeRecord {
        VolumeRecord {
            exchange,
            market_id: market_id.to_string(),
            display_name: market_id.to_string(),
            current_volume: 1.0,
            baseline_volume: 1.0,
            price: 1.0,
            price_change_rate: 0.0,
            volume_change_rate: 0.0,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn collect_splits_successes_and_failures() {
        let results = vec![
            Ok(record(Exchange::Upbit, "KRW-BTC")),
            Err(NormalizeError::MissingMarketId),
            Ok(record(Exchange::Upbit, "KRW-ETH")),
        ];

        let batch = collect(Exchange::Upbit, results);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.warnings.len(), 1);
        assert!(batch.warnings[0].market.is_none());
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        let (records, warnings) = merge(Vec::new());
        assert!(records.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn merge_preserves_all_records_without_dedup() {
        let a = ExchangeBatch {
            records: vec![record(Exchange::Upbit, "KRW-BTC")],
            warnings: Vec::new(),
        };
        let b = ExchangeBatch {
            // Same underlying asset listed on the other exchange.
            records: vec![
                record(Exchange::Bithumb, "KRW-BTC"),
                record(Exchange::Bithumb, "KRW-ETH"),
            ],
            warnings: Vec::new(),
        };

        let (records, _) = merge(vec![a, b]);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn merge_is_order_insensitive_as_a_multiset() {
        let a = || ExchangeBatch {
            records: vec![
                record(Exchange::Upbit, "KRW-BTC"),
                record(Exchange::Upbit, "KRW-ETH"),
            ],
            warnings: Vec::new(),
        };
        let b = || ExchangeBatch {
            records: vec![record(Exchange::Bithumb, "KRW-BTC")],
            warnings: Vec::new(),
        };

        let key = |r: &VolumeRecord| (r.exchange, r.market_id.clone());
        let (ab, _) = merge(vec![a(), b()]);
        let (ba, _) = merge(vec![b(), a()]);

        let ab: HashSet<_> = ab.iter().map(key).collect();
        let ba: HashSet<_> = ba.iter().map(key).collect();
        assert_eq!(ab, ba);
    }

    #[test]
    fn failed_exchange_contributes_only_a_warning() {
        let upbit = ExchangeBatch::failed(Exchange::Upbit, "connection refused");
        let bithumb = ExchangeBatch {
            records: vec![record(Exchange::Bithumb, "KRW-BTC")],
            warnings: Vec::new(),
        };

        let (records, warnings) = merge(vec![upbit, bithumb]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].exchange, Exchange::Bithumb);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].exchange, Exchange::Upbit);
    }
}
