// =============================================================================
// CSV export of the table feed
// =============================================================================

use anyhow::{Context, Result};

use crate::types::VolumeRecord;

/// Download filename served with the CSV response.
pub const CSV_FILENAME: &str = "coin_volume_data.csv";

/// Render the filtered, sorted table to CSV.
///
/// Numeric columns are formatted to two decimals to match the dashboard
/// table; the records themselves keep full precision.
pub fn to_csv(records: &[VolumeRecord]) -> Result<String> {
    let mut buf = Vec::new();

    {
        let mut writer = csv::Writer::from_writer(&mut buf);

        writer
            .write_record([
                "exchange",
                "market_id",
                "display_name",
                "price",
                "price_change_rate_pct",
                "current_volume",
                "baseline_volume",
                "volume_change_rate_pct",
            ])
            .context("failed to write CSV header")?;

        for r in records {
            writer
                .write_record([
                    r.exchange.to_string(),
                    r.market_id.clone(),
                    r.display_name.clone(),
                    format!("{:.2}", r.price),
                    format!("{:.2}", r.price_change_rate),
                    format!("{:.2}", r.current_volume),
                    format!("{:.2}", r.baseline_volume),
                    format!("{:.2}", r.volume_change_rate),
                ])
                .with_context(|| format!("failed to write CSV row for {}", r.market_id))?;
        }

        writer.flush().context("failed to flush CSV writer")?;
    }

    String::from_utf8(buf).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Exchange;
    use chrono::Utc;

    fn record(market_id: &str, rate: f64) -> VolumeRecord {
        VolumeRecord {
            exchange: Exchange::Upbit,
            market_id: market_id.to_string(),
            display_name: "비트코인".to_string(),
            current_volume: 150.0,
            baseline_volume: 100.0,
            price: 95_000_000.128,
            price_change_rate: 1.5,
            volume_change_rate: rate,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn csv_has_header_and_one_row_per_record() {
        let csv = to_csv(&[record("KRW-BTC", 50.0), record("KRW-ETH", -20.0)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("exchange,market_id,display_name,price"));
        assert!(lines[1].starts_with("Upbit,KRW-BTC,비트코인,95000000.13,1.50,150.00,100.00,50.00"));
        assert!(lines[2].contains("-20.00"));
    }

    #[test]
    fn empty_batch_yields_header_only() {
        let csv = to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
