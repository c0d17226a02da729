// =============================================================================
// Central Application State — Volume Pulse tracker
// =============================================================================
//
// The single source of truth for the dashboard API: the last fully-aggregated
// batch and its timestamp.  A refresh replaces the batch wholesale — there is
// no partial mutation, and readers between refreshes always see one coherent
// fetch cycle.
//
// Thread safety:
//   - AtomicU64 for lock-free version tracking.
//   - parking_lot::RwLock around the batch slot.
//   - tokio::sync::Mutex as the refresh gate, so concurrent refresh
//     triggers serialize into one pass at a time.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::RuntimeConfig;
use crate::exchange::{BithumbClient, UpbitClient};
use crate::types::{FetchWarning, VolumeRecord};

/// One complete fetch cycle: the aggregated records, the warnings gathered
/// along the way, and when the cycle ran.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSnapshot {
    pub records: Vec<VolumeRecord>,
    pub warnings: Vec<FetchWarning>,
    pub fetched_at: DateTime<Utc>,
}

/// Central application state shared across handlers via `Arc<AppState>`.
pub struct AppState {
    pub config: RuntimeConfig,

    // ── Exchange clients ────────────────────────────────────────────────
    pub upbit: UpbitClient,
    pub bithumb: BithumbClient,

    // ── Session cache ───────────────────────────────────────────────────
    /// The last-fetched batch. `None` until the cold-start refresh lands.
    batch: RwLock<Option<BatchSnapshot>>,

    /// Incremented once per installed batch.
    pub state_version: AtomicU64,

    /// Serializes refresh passes; held for the whole fetch/transform cycle.
    pub refresh_gate: tokio::sync::Mutex<()>,
}

impl AppState {
    /// Construct the state from configuration. One HTTP client is shared by
    /// both exchange clients.
    pub fn new(config: RuntimeConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .expect("failed to build reqwest client");

        let upbit = UpbitClient::with_client(&config, http.clone());
        let bithumb = BithumbClient::with_client(&config, http);

        Self {
            config,
            upbit,
            bithumb,
            batch: RwLock::new(None),
            state_version: AtomicU64::new(0),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Replace the session cache wholesale and bump the version.
    pub fn install_batch(&self, snapshot: BatchSnapshot) {
        *self.batch.write() = Some(snapshot);
        self.state_version.fetch_add(1, Ordering::SeqCst);
    }

    /// Clone of the current batch, if a refresh has completed yet.
    pub fn batch_snapshot(&self) -> Option<BatchSnapshot> {
        self.batch.read().clone()
    }

    /// Read the current state version without modifying it.
    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }
}
