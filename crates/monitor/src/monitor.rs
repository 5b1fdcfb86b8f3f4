//! AlarmMonitor - background worker that evaluates registered alarms
//!
//! Each cycle:
//! 1. Ask the info distributor for a refresh (failures are logged)
//! 2. Snapshot the alarm ids
//! 3. Count the rows each condition matches; a non-zero count triggers
//! 4. Sleep until the next cycle or a stop signal
//!
//! The worker is a plain thread. Stop is a channel message, so it is
//! observed at the latest after the check that is in flight.

use crate::registry::AlarmRegistry;
use chrono::Utc;
use shared::{
    AgentHandle, AlarmNotifier, CoreConfig, Datastore, Message, Outbox, Peer, StoreError,
};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Timing of the monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOptions {
    pub interval: Duration,
    pub stop_timeout: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            stop_timeout: Duration::from_millis(1000),
        }
    }
}

impl MonitorOptions {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            interval: config.monitoring_interval(),
            stop_timeout: config.monitor_stop_timeout(),
        }
    }
}

/// Why a single alarm check failed
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("count query returned no count column")]
    MissingCount,
}

/// What one cycle did, per alarm id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub refreshed: bool,
    /// Checked without triggering
    pub quiet: Vec<String>,
    pub triggered: Vec<String>,
    /// Removed before their check finished
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Result of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Stopped,
    /// The worker did not exit within the stop timeout and was detached
    TimedOut,
}

/// State shared between the monitor handle and its worker thread
struct MonitorCore {
    registry: Arc<AlarmRegistry>,
    datastore: Arc<dyn Datastore>,
    outbox: Outbox,
    distributor: Peer,
    notifiers: Vec<Arc<dyn AlarmNotifier>>,
}

impl MonitorCore {
    fn refresh(&self) -> bool {
        let Some(distributor) = self.distributor.get() else {
            debug!("No info distributor wired, skipping refresh");
            return false;
        };
        let result = self.outbox.send(&distributor, Message::RequestInfoUpdate {});
        if result.is_error() {
            warn!(error = result.message_text(), "Info refresh before alarm checks failed");
            return false;
        }
        true
    }

    fn count_matches(&self, condition: &str) -> Result<i64, CheckError> {
        let condition = condition.trim().trim_end_matches(';');
        let sql = format!("SELECT COUNT(*) AS count FROM ({}) AS subquery", condition);
        self.datastore
            .execute(&sql, &[])?
            .first_i64("count")
            .ok_or(CheckError::MissingCount)
    }

    fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport {
            refreshed: self.refresh(),
            ..Default::default()
        };

        for id in self.registry.snapshot_ids() {
            // Removed since the snapshot
            let Some(alarm) = self.registry.get(&id) else {
                report.skipped.push(id);
                continue;
            };

            let matched = match self.count_matches(&alarm.condition) {
                Ok(matched) => matched,
                Err(e) => {
                    warn!(alarm_id = %id, error = %e, "Alarm check failed");
                    report.failed.push(id);
                    continue;
                }
            };
            if matched <= 0 {
                report.quiet.push(id);
                continue;
            }

            match self.registry.record_trigger(&alarm, Utc::now()) {
                Some(record) => {
                    for notifier in &self.notifiers {
                        notifier.notify(&record, matched);
                    }
                    report.triggered.push(id);
                }
                None => report.skipped.push(id),
            }
        }

        debug!(
            triggered = report.triggered.len(),
            failed = report.failed.len(),
            "Alarm cycle finished"
        );
        report
    }
}

struct Worker {
    stop: Sender<()>,
    /// Disconnects when the worker thread exits
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Alarm registry plus a single background worker
pub struct AlarmMonitor {
    core: Arc<MonitorCore>,
    options: MonitorOptions,
    worker: Mutex<Option<Worker>>,
}

impl AlarmMonitor {
    pub fn new(
        registry: Arc<AlarmRegistry>,
        datastore: Arc<dyn Datastore>,
        notifiers: Vec<Arc<dyn AlarmNotifier>>,
        outbox: Outbox,
        options: MonitorOptions,
    ) -> Self {
        Self {
            core: Arc::new(MonitorCore {
                registry,
                datastore,
                outbox,
                distributor: Peer::new(),
                notifiers,
            }),
            options,
            worker: Mutex::new(None),
        }
    }

    /// Wire the agent asked for a refresh at the start of each cycle
    pub fn wire_distributor(&self, distributor: &AgentHandle) -> shared::Result<()> {
        self.core.distributor.wire(distributor)
    }

    pub fn registry(&self) -> &AlarmRegistry {
        &self.core.registry
    }

    pub fn options(&self) -> MonitorOptions {
        self.options
    }

    pub(crate) fn sender(&self) -> &str {
        self.core.outbox.sender()
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one cycle on the calling thread
    pub fn run_cycle(&self) -> CycleReport {
        self.core.run_cycle()
    }

    pub fn is_running(&self) -> bool {
        self.worker()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Start the worker; `Ok(false)` if it is already running
    pub fn start(&self) -> shared::Result<bool> {
        let mut slot = self.worker();
        if slot.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return Ok(false);
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let core = Arc::clone(&self.core);
        let interval = self.options.interval;

        let handle = thread::Builder::new()
            .name("alarm-monitor".to_string())
            .spawn(move || {
                let _done = done_tx;
                info!(interval_secs = interval.as_secs_f64(), "Alarm monitor started");
                loop {
                    core.run_cycle();
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("Alarm monitor stopped");
            })?;

        *slot = Some(Worker {
            stop: stop_tx,
            done: done_rx,
            handle,
        });
        Ok(true)
    }

    /// Signal the worker and wait up to the stop timeout for it to exit
    ///
    /// A worker that outlives the timeout stays in its slot, so `start`
    /// refuses to spawn a second one until it has exited.
    pub fn stop(&self) -> StopOutcome {
        let mut slot = self.worker();
        let Some(worker) = slot.as_ref() else {
            return StopOutcome::NotRunning;
        };
        if worker.handle.is_finished() {
            if let Some(worker) = slot.take() {
                let _ = worker.handle.join();
            }
            return StopOutcome::NotRunning;
        }

        let _ = worker.stop.send(());
        match worker.done.recv_timeout(self.options.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(worker) = slot.take() {
                    let _ = worker.handle.join();
                }
                StopOutcome::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = self.options.stop_timeout.as_millis() as u64,
                    "Alarm monitor did not stop in time; it exits after the check in flight"
                );
                StopOutcome::TimedOut
            }
        }
    }
}

impl Drop for AlarmMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AlarmMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmMonitor")
            .field("alarms", &self.core.registry.len())
            .field("options", &self.options)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use shared::{AlarmNotifier, AlarmRecord, Datastore, QueryOutcome, StoreError};
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;

    /// Datastore answering count queries from a rule table
    #[derive(Default)]
    pub struct FakeStore {
        /// (needle in SQL, count); first match wins, default 0
        pub counts: Mutex<Vec<(String, i64)>>,
        pub queries: Mutex<Vec<String>>,
        pub on_query: Mutex<Option<Box<dyn Fn(&str) + Send>>>,
    }

    impl FakeStore {
        pub fn with_count(self, needle: &str, count: i64) -> Self {
            self.counts.lock().unwrap().push((needle.to_string(), count));
            self
        }

        pub fn query_count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    impl Datastore for FakeStore {
        fn execute(&self, sql: &str, _params: &[Value]) -> Result<QueryOutcome, StoreError> {
            self.queries.lock().unwrap().push(sql.to_string());
            if let Some(hook) = self.on_query.lock().unwrap().as_ref() {
                hook(sql);
            }
            if sql.contains("broken") {
                return Err(StoreError::Query("no such table: broken".to_string()));
            }

            let count = self
                .counts
                .lock()
                .unwrap()
                .iter()
                .find(|(needle, _)| sql.contains(needle.as_str()))
                .map(|(_, count)| *count)
                .unwrap_or(0);
            let mut row = Map::new();
            row.insert("count".to_string(), json!(count));
            Ok(QueryOutcome::Rows(vec![row]))
        }
    }

    /// Notifier that keeps every notification
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub seen: Mutex<Vec<(AlarmRecord, i64)>>,
    }

    impl AlarmNotifier for RecordingNotifier {
        fn notify(&self, alarm: &AlarmRecord, matched_rows: i64) {
            self.seen.lock().unwrap().push((alarm.clone(), matched_rows));
        }
    }
}
