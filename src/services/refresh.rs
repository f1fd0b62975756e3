// src/services/refresh.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::models::RefreshState;
use super::gaps::{GapsClient, GapsPayload, PipelineError};
use super::normalize::normalize_record;

/// Refresh cadence matching the upstream scanner's cache TTL.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Owns the shared pipeline state and is its only writer. The HTTP handlers
/// hold the state behind a read reference obtained from [`state`].
///
/// Two guards keep refreshes ordered: an async gate makes a tick that finds
/// a refresh already in flight skip instead of queue, and every request
/// carries an epoch so a late response can never overwrite state written by
/// a newer one.
///
/// [`state`]: RefreshController::state
pub struct RefreshController {
    client: GapsClient,
    state: Arc<RwLock<RefreshState>>,
    epoch: AtomicU64,
    gate: Mutex<()>,
}

impl RefreshController {
    pub fn new(client: GapsClient) -> Arc<Self> {
        Arc::new(RefreshController {
            client,
            state: Arc::new(RwLock::new(RefreshState::default())),
            epoch: AtomicU64::new(0),
            gate: Mutex::new(()),
        })
    }

    pub fn state(&self) -> Arc<RwLock<RefreshState>> {
        self.state.clone()
    }

    /// One refresh pass: mark loading, fetch, normalize, commit. Errors are
    /// surfaced through `last_error` and never clear previously committed
    /// records; stale-but-valid data beats a blanked view.
    pub async fn refresh(&self) {
        let _pass = match self.gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("Refresh already in flight, skipping this tick");
                return;
            }
        };

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            state.is_loading = true;
            state.last_error = None;
        }

        match self.client.fetch_gaps().await {
            Ok(payload) => self.apply_success(epoch, payload).await,
            Err(err) => self.apply_error(epoch, &err).await,
        }
    }

    async fn apply_success(&self, epoch: u64, payload: GapsPayload) {
        let (raw_records, scan_log, last_scan_time) = payload.into_parts();

        let mut records = Vec::with_capacity(raw_records.len());
        let mut skipped = 0usize;
        for raw in &raw_records {
            match normalize_record(raw) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!("Skipping malformed gap record: {}", err);
                    skipped += 1;
                }
            }
        }

        let mut state = self.state.write().await;
        if epoch <= state.last_applied_epoch {
            info!("Discarding stale refresh response (epoch {})", epoch);
            return;
        }
        state.last_applied_epoch = epoch;
        state.records = records;
        state.scan_log = scan_log;
        if last_scan_time.is_some() {
            state.last_scan_time = last_scan_time;
        }
        state.last_successful_fetch_at = Some(Utc::now());
        state.last_error = None;
        state.is_loading = false;
        info!(
            "Refresh applied: {} records, {} scan log entries, {} skipped",
            state.records.len(),
            state.scan_log.len(),
            skipped
        );
    }

    async fn apply_error(&self, epoch: u64, err: &PipelineError) {
        let mut state = self.state.write().await;
        if epoch <= state.last_applied_epoch {
            info!("Discarding stale refresh error (epoch {})", epoch);
            return;
        }
        state.last_applied_epoch = epoch;
        state.last_error = Some(err.to_string());
        state.is_loading = false;
        error!("Refresh failed: {}", err);
    }
}

/// Handle to the background polling task. Dropping it without calling
/// [`shutdown`] leaves the task running; callers tearing down the pipeline
/// must shut it down so nothing writes into the state afterwards.
///
/// [`shutdown`]: RefreshHandle::shutdown
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop the polling loop. Aborting also cancels a refresh the loop is
    /// currently awaiting; state mutation happens without await points while
    /// the write lock is held, so an aborted pass cannot leave the state
    /// half-written.
    pub fn shutdown(self) {
        let _ = self.shutdown.send(true);
        self.task.abort();
        info!("Refresh polling shut down");
    }
}

/// Spawn the polling loop: one immediate refresh, then one per `period`.
pub fn spawn_polling(controller: Arc<RefreshController>, period: Duration) -> RefreshHandle {
    let (tx, mut rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    controller.refresh().await;
                }
                _ = rx.changed() => {
                    info!("Refresh polling stopped");
                    return;
                }
            }
        }
    });
    RefreshHandle { shutdown: tx, task }
}
