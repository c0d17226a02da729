// =============================================================================
// Filter/Sort Engine — user-selected view over the aggregated batch
// =============================================================================
//
// Filtering is a conjunction of three predicates: exchange membership,
// minimum current volume, minimum absolute change rate.  Sorting is stable,
// so records with equal keys keep their aggregation order.  The chart feed
// always ranks by absolute change rate regardless of the table's active sort
// key — the chart shows the highest-volatility assets even when the table is
// ordered by something else.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{Exchange, VolumeRecord};

/// Number of records the chart feed displays.
pub const CHART_TOP_N: usize = 10;

// =============================================================================
// FilterSpec
// =============================================================================

/// User-specified filter predicates, combined as a conjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Exchanges whose records pass the filter.
    pub exchanges: Vec<Exchange>,

    /// Minimum current-window volume.
    pub min_volume: f64,

    /// Minimum absolute volume-change rate, in percent.
    pub min_change_rate: f64,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            exchanges: Exchange::ALL.to_vec(),
            min_volume: 0.0,
            min_change_rate: 0.0,
        }
    }
}

impl FilterSpec {
    /// A record passes only if it matches all three predicates.
    pub fn matches(&self, record: &VolumeRecord) -> bool {
        self.exchanges.contains(&record.exchange)
            && record.current_volume >= self.min_volume
            && record.volume_change_rate.abs() >= self.min_change_rate
    }
}

// =============================================================================
// SortKey
// =============================================================================

/// Table ordering selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Absolute volume-change rate, descending. The default view.
    AbsChange,
    /// Positive rates first, each sign group by absolute magnitude
    /// descending.
    SignedChange,
    /// Current volume, descending.
    Volume,
}

impl Default for SortKey {
    fn default() -> Self {
        Self::AbsChange
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AbsChange => write!(f, "abs_change"),
            Self::SignedChange => write!(f, "signed_change"),
            Self::Volume => write!(f, "volume"),
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abs_change" => Ok(Self::AbsChange),
            "signed_change" => Ok(Self::SignedChange),
            "volume" => Ok(Self::Volume),
            other => Err(format!("unknown sort key `{other}`")),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Filter the aggregated sequence and return it in the requested order.
/// Pure function of its inputs.
pub fn apply(records: &[VolumeRecord], spec: &FilterSpec, sort: SortKey) -> Vec<VolumeRecord> {
    let mut out: Vec<VolumeRecord> = records.iter().filter(|r| spec.matches(r)).cloned().collect();
    sort_records(&mut out, sort);
    out
}

/// The chart feed: the `n` records with the largest absolute change rate in
/// the (already filtered) set, ranked by absolute change rate descending —
/// independent of whatever sort the table is using.
pub fn top_by_volatility(filtered: &[VolumeRecord], n: usize) -> Vec<VolumeRecord> {
    let mut chart = filtered.to_vec();
    sort_records(&mut chart, SortKey::AbsChange);
    chart.truncate(n);
    chart
}

fn sort_records(records: &mut [VolumeRecord], sort: SortKey) {
    // `sort_by` is stable: equal keys keep aggregation order.
    match sort {
        SortKey::AbsChange => records.sort_by(|a, b| {
            b.volume_change_rate
                .abs()
                .total_cmp(&a.volume_change_rate.abs())
        }),
        SortKey::SignedChange => records.sort_by(|a, b| {
            let a_positive = a.volume_change_rate > 0.0;
            let b_positive = b.volume_change_rate > 0.0;
            b_positive.cmp(&a_positive).then_with(|| {
                b.volume_change_rate
                    .abs()
                    .total_cmp(&a.volume_change_rate.abs())
            })
        }),
        SortKey::Volume => {
            records.sort_by(|a, b| b.current_volume.total_cmp(&a.current_volume))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(
        exchange: Exchange,
        market_id: &str,
        current_volume: f64,
        baseline_volume: f64,
    ) -> VolumeRecord {
        VolumeRecord {
            exchange,
            market_id: market_id.to_string(),
            display_name: market_id.to_string(),
            current_volume,
            baseline_volume,
            price: 1.0,
            price_change_rate: 0.0,
            volume_change_rate: crate::normalize::volume_change_rate(
                current_volume,
                baseline_volume,
            ),
            observed_at: Utc::now(),
        }
    }

    fn sample() -> Vec<VolumeRecord> {
        vec![
            record(Exchange::Upbit, "KRW-X", 150.0, 100.0), // +50 %
            record(Exchange::Upbit, "KRW-Y", 80.0, 100.0),  // -20 %
            record(Exchange::Bithumb, "KRW-Z", 130.0, 100.0), // +30 %
            record(Exchange::Bithumb, "KRW-W", 10.0, 0.0),  // baseline 0 → 0 %
        ]
    }

    #[test]
    fn filter_is_a_pure_conjunction() {
        let records = sample();
        let spec = FilterSpec {
            exchanges: vec![Exchange::Upbit],
            min_volume: 100.0,
            min_change_rate: 10.0,
        };

        let out = apply(&records, &spec, SortKey::AbsChange);
        // Soundness: every survivor satisfies all three predicates.
        for r in &out {
            assert!(spec.exchanges.contains(&r.exchange));
            assert!(r.current_volume >= spec.min_volume);
            assert!(r.volume_change_rate.abs() >= spec.min_change_rate);
        }
        // Completeness: only KRW-X qualifies (KRW-Y fails min_volume,
        // KRW-Z/KRW-W fail the exchange predicate).
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].market_id, "KRW-X");
    }

    #[test]
    fn zero_baseline_record_is_excluded_by_min_change_rate() {
        let records = sample();
        let spec = FilterSpec {
            min_change_rate: 10.0,
            ..FilterSpec::default()
        };

        let out = apply(&records, &spec, SortKey::AbsChange);
        assert!(out.iter().all(|r| r.market_id != "KRW-W"));
    }

    #[test]
    fn abs_change_sort_orders_by_magnitude() {
        let out = apply(&sample(), &FilterSpec::default(), SortKey::AbsChange);
        let ids: Vec<&str> = out.iter().map(|r| r.market_id.as_str()).collect();
        // 50 > 30 > 20 > 0; X before Y per the synthetic scenario.
        assert_eq!(ids, ["KRW-X", "KRW-Z", "KRW-Y", "KRW-W"]);
    }

    #[test]
    fn abs_change_sort_is_idempotent() {
        let once = apply(&sample(), &FilterSpec::default(), SortKey::AbsChange);
        let twice = apply(&once, &FilterSpec::default(), SortKey::AbsChange);
        let ids = |v: &[VolumeRecord]| -> Vec<String> {
            v.iter().map(|r| r.market_id.clone()).collect()
        };
        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn signed_sort_puts_positives_first_then_by_magnitude() {
        let out = apply(&sample(), &FilterSpec::default(), SortKey::SignedChange);
        let ids: Vec<&str> = out.iter().map(|r| r.market_id.as_str()).collect();
        // Positives by |rate| desc (X +50, Z +30), then non-positives by
        // |rate| desc (Y -20, W 0).
        assert_eq!(ids, ["KRW-X", "KRW-Z", "KRW-Y", "KRW-W"]);
    }

    #[test]
    fn volume_sort_orders_by_current_volume() {
        let out = apply(&sample(), &FilterSpec::default(), SortKey::Volume);
        let ids: Vec<&str> = out.iter().map(|r| r.market_id.as_str()).collect();
        assert_eq!(ids, ["KRW-X", "KRW-Z", "KRW-Y", "KRW-W"]);
    }

    #[test]
    fn equal_keys_keep_aggregation_order() {
        let records = vec![
            record(Exchange::Upbit, "KRW-A", 120.0, 100.0),
            record(Exchange::Bithumb, "KRW-B", 120.0, 100.0),
            record(Exchange::Upbit, "KRW-C", 120.0, 100.0),
        ];
        let out = apply(&records, &FilterSpec::default(), SortKey::AbsChange);
        let ids: Vec<&str> = out.iter().map(|r| r.market_id.as_str()).collect();
        assert_eq!(ids, ["KRW-A", "KRW-B", "KRW-C"]);
    }

    #[test]
    fn chart_top_n_ignores_active_sort_key() {
        // 15 records with distinct magnitudes.
        let records: Vec<VolumeRecord> = (0..15)
            .map(|i| {
                record(
                    Exchange::Upbit,
                    &format!("KRW-A{i}"),
                    100.0 + (i as f64 + 1.0) * 10.0, // +10 %, +20 %, … +150 %
                    100.0,
                )
            })
            .collect();

        let expected: Vec<String> = (5..15)
            .rev()
            .map(|i| format!("KRW-A{i}"))
            .collect();

        for sort in [SortKey::AbsChange, SortKey::SignedChange, SortKey::Volume] {
            let table = apply(&records, &FilterSpec::default(), sort);
            let chart = top_by_volatility(&table, CHART_TOP_N);
            let ids: Vec<String> = chart.iter().map(|r| r.market_id.clone()).collect();
            assert_eq!(ids, expected, "sort key {sort} changed the chart feed");
        }
    }

    #[test]
    fn chart_handles_fewer_records_than_n() {
        let records = sample();
        let chart = top_by_volatility(&records, CHART_TOP_N);
        assert_eq!(chart.len(), records.len());
    }
}
