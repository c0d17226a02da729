// =============================================================================
// Refresh orchestration — one fetch/transform pass
// =============================================================================
//
// A refresh runs on cold start and on every manual trigger.  The gate keeps
// exactly one pass in flight; exchanges are fetched sequentially and each
// failure stays contained to its exchange — a dead exchange contributes an
// empty batch plus a warning, never an aborted refresh.  No retries: the
// next pass happens when the user asks for one.
// =============================================================================

use chrono::Utc;
use tracing::{info, warn};

use crate::aggregate::{self, ExchangeBatch};
use crate::app_state::{AppState, BatchSnapshot};
use crate::config::BaselinePolicy;
use crate::normalize;
use crate::types::Exchange;

/// Run one full refresh pass and install the resulting batch.
pub async fn run_refresh(state: &AppState) -> BatchSnapshot {
    let _gate = state.refresh_gate.lock().await;

    let observed_at = Utc::now();
    info!("refresh pass started");

    let upbit = fetch_upbit(state).await;
    let bithumb = fetch_bithumb(state).await;

    let (records, warnings) = aggregate::merge(vec![upbit, bithumb]);
    let snapshot = BatchSnapshot {
        records,
        warnings,
        fetched_at: observed_at,
    };

    info!(
        records = snapshot.records.len(),
        warnings = snapshot.warnings.len(),
        "refresh pass complete"
    );

    state.install_batch(snapshot.clone());
    snapshot
}

// -----------------------------------------------------------------------------
// Per-exchange fetches — batch-level failures become warnings here
// -----------------------------------------------------------------------------

async fn fetch_upbit(state: &AppState) -> ExchangeBatch {
    match fetch_upbit_inner(state).await {
        Ok(batch) => batch,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Upbit batch fetch failed");
            ExchangeBatch::failed(Exchange::Upbit, format!("Upbit fetch failed: {e:#}"))
        }
    }
}

async fn fetch_upbit_inner(state: &AppState) -> anyhow::Result<ExchangeBatch> {
    let observed_at = Utc::now();

    let (markets, names) = state.upbit.market_universe().await?;
    let raw = state.upbit.tickers(&markets).await?;

    let (baselines, mut baseline_warnings) = match state.config.upbit_baseline {
        BaselinePolicy::PrevAccumulated => (None, Vec::new()),
        BaselinePolicy::PrevDayCandle => {
            let (map, warnings) = state.upbit.prev_day_baselines(&markets).await;
            (Some(map), warnings)
        }
    };

    let mut batch = aggregate::collect(
        Exchange::Upbit,
        normalize::upbit_records(&raw, &names, baselines.as_ref(), observed_at),
    );
    batch.warnings.append(&mut baseline_warnings);

    Ok(batch)
}

async fn fetch_bithumb(state: &AppState) -> ExchangeBatch {
    match fetch_bithumb_inner(state).await {
        Ok(batch) => batch,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Bithumb batch fetch failed");
            ExchangeBatch::failed(Exchange::Bithumb, format!("Bithumb fetch failed: {e:#}"))
        }
    }
}

async fn fetch_bithumb_inner(state: &AppState) -> anyhow::Result<ExchangeBatch> {
    let observed_at = Utc::now();
    let raw = state.bithumb.all_tickers().await?;

    Ok(aggregate::collect(
        Exchange::Bithumb,
        normalize::bithumb_records(&raw, observed_at),
    ))
}
