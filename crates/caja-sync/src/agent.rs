//! # Sync Agent
//!
//! Background task that keeps a till in sync: full passes on an interval and
//! on demand, one at a time.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │   SyncAgentHandle                                                       │
//! │     trigger() ──────┐                                                   │
//! │     shutdown() ───┐ │        ┌──────────────────────────────────────┐   │
//! │                   │ │        │            agent loop                │   │
//! │                   │ └──────► │  select! {                           │   │
//! │                   │          │    interval tick  ─┐                 │   │
//! │                   │          │    trigger        ─┼─► run_pass()    │   │
//! │                   └────────► │    shutdown       ─► exit            │   │
//! │                              │  }                                   │   │
//! │                              └───────────────┬──────────────────────┘   │
//! │                                              │                          │
//! │     status() / subscribe() ◄── watch ────────┤                          │
//! │                                              ▼                          │
//! │                                     SyncEventEmitter                    │
//! │                                                                         │
//! │  EVENTS:                                                                │
//! │  ───────                                                                │
//! │  status   - running flag, passes completed, last report                 │
//! │  progress - { pending: 5, failed: 1 } summed over doc types             │
//! │  error    - { message: "Sales Invoice: HTTP 417 ...", retryable }       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Triggers arriving while a pass runs coalesce into at most one follow-up
//! pass.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::{SyncOrchestrator, SyncReport};

// =============================================================================
// Agent Status
// =============================================================================

/// Current agent status for external queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AgentStatus {
    /// A pass is running right now.
    pub running: bool,

    pub completed_passes: u64,

    pub last_report: Option<SyncReport>,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives agent events (a desktop shell forwards them to its UI).
pub trait SyncEventEmitter: Send + Sync {
    fn emit_status(&self, status: &AgentStatus);

    /// Outbox totals across doc types after a pass.
    fn emit_progress(&self, pending: i64, failed: i64);

    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &AgentStatus) {}
    fn emit_progress(&self, _pending: i64, _failed: i64) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Sync Agent
// =============================================================================

pub struct SyncAgent {
    orchestrator: Arc<SyncOrchestrator>,
    emitter: Arc<dyn SyncEventEmitter>,
    interval: Duration,
    status: watch::Sender<AgentStatus>,
    trigger_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl SyncAgent {
    /// Spawns the agent; the first pass starts immediately.
    pub fn spawn(orchestrator: Arc<SyncOrchestrator>, interval: Duration) -> SyncAgentHandle {
        Self::spawn_with_emitter(orchestrator, interval, Arc::new(NoOpEmitter))
    }

    pub fn spawn_with_emitter(
        orchestrator: Arc<SyncOrchestrator>,
        interval: Duration,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> SyncAgentHandle {
        let (status_tx, status_rx) = watch::channel(AgentStatus::default());
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let agent = SyncAgent {
            orchestrator,
            emitter,
            interval: interval.max(Duration::from_millis(1)),
            status: status_tx,
            trigger_rx,
            shutdown_rx,
        };

        info!(interval = ?interval, "Starting sync agent");
        let task = tokio::spawn(agent.run());

        SyncAgentHandle {
            trigger_tx,
            shutdown_tx,
            status: status_rx,
            task,
        }
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Sync agent received shutdown");
                    break;
                }
                _ = ticker.tick() => {
                    debug!("Scheduled sync pass");
                    self.pass().await;
                }
                Some(()) = self.trigger_rx.recv() => {
                    debug!("Triggered sync pass");
                    self.pass().await;
                    ticker.reset();
                }
            }
        }

        info!("Sync agent stopped");
    }

    async fn pass(&self) {
        self.status.send_modify(|s| s.running = true);
        self.emitter.emit_status(&self.status.borrow());

        let report = self.orchestrator.run_pass().await;

        for unit in report.units.iter().filter(|u| !u.success) {
            let message = format!(
                "{}: {}",
                unit.doc_type,
                unit.error.as_deref().unwrap_or("sync failed")
            );
            // Per-item push failures are retried next pass; the unit itself
            // is always worth re-running.
            self.emitter.emit_error(&message, true);
        }

        match self.orchestrator.states().await {
            Ok(states) => {
                let pending = states.iter().map(|s| s.pending_count).sum();
                let failed = states.iter().map(|s| s.failed_count).sum();
                self.emitter.emit_progress(pending, failed);
            }
            Err(e) => warn!(error = %e, "Failed to read sync state"),
        }

        self.status.send_modify(|s| {
            s.running = false;
            s.completed_passes += 1;
            s.last_report = Some(report);
        });
        self.emitter.emit_status(&self.status.borrow());
    }
}

// =============================================================================
// Agent Handle (for external control)
// =============================================================================

/// Handle for controlling a running [`SyncAgent`].
pub struct SyncAgentHandle {
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
    status: watch::Receiver<AgentStatus>,
    task: JoinHandle<()>,
}

impl SyncAgentHandle {
    /// Requests a pass as soon as the current one (if any) ends.
    ///
    /// Returns false when a request is already queued.
    pub fn trigger(&self) -> bool {
        match self.trigger_tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => false,
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!("Sync agent is not running");
                false
            }
        }
    }

    pub fn status(&self) -> AgentStatus {
        self.status.borrow().clone()
    }

    /// A receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<AgentStatus> {
        self.status.clone()
    }

    /// Stops the agent after the running pass, if any, and waits for it.
    pub async fn shutdown(self) -> SyncResult<()> {
        info!("Shutting down sync agent");
        // A closed channel means the loop already exited.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| SyncError::Internal(format!("sync agent task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use caja_core::{CatalogCache, DocType};
    use rust_decimal_macros::dec;

    use crate::unit::fixtures::*;

    #[derive(Default)]
    struct RecordingEmitter {
        progress: Mutex<Vec<(i64, i64)>>,
        errors: Mutex<Vec<String>>,
    }

    impl SyncEventEmitter for RecordingEmitter {
        fn emit_status(&self, _status: &AgentStatus) {}

        fn emit_progress(&self, pending: i64, failed: i64) {
            self.progress.lock().unwrap().push((pending, failed));
        }

        fn emit_error(&self, message: &str, _retryable: bool) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    #[tokio::test]
    async fn test_agent_runs_first_pass_and_stops() {
        let (ctx, _) = context(Arc::new(erp())).await;
        let orchestrator = Arc::new(SyncOrchestrator::with_units(
            ctx,
            Arc::new(CatalogCache::new()),
            vec![DocType::Item, DocType::Customer],
        ));

        let handle = SyncAgent::spawn(orchestrator, Duration::from_secs(3600));
        let mut status = handle.subscribe();
        let done = status
            .wait_for(|s| s.completed_passes >= 1)
            .await
            .unwrap()
            .clone();

        assert!(!done.running);
        let report = done.last_report.unwrap();
        assert!(report.is_success());
        assert_eq!(report.synced, vec![DocType::Item, DocType::Customer]);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_trigger_runs_another_pass() {
        let remote = Arc::new(erp());
        let (ctx, _) = context(remote.clone()).await;
        pull_masters(&ctx).await;

        let orchestrator = Arc::new(SyncOrchestrator::with_units(
            ctx.clone(),
            Arc::new(CatalogCache::new()),
            vec![DocType::SalesInvoice],
        ));
        let emitter = Arc::new(RecordingEmitter::default());
        let handle =
            SyncAgent::spawn_with_emitter(orchestrator, Duration::from_secs(3600), emitter.clone());
        let mut status = handle.subscribe();
        status.wait_for(|s| s.completed_passes >= 1).await.unwrap();

        factory(&ctx).create_invoice_offline(&sale("COKE", dec!(1))).await.unwrap();
        remote.fail_next_create(crate::error::RemoteError::Status {
            status: 417,
            message: "Customer is frozen".into(),
        });
        assert!(handle.trigger());

        let second = status
            .wait_for(|s| s.completed_passes >= 2)
            .await
            .unwrap()
            .clone();
        assert_eq!(second.last_report.unwrap().failed, vec![DocType::SalesInvoice]);

        assert_eq!(emitter.progress.lock().unwrap().last(), Some(&(0, 1)));
        assert!(emitter.errors.lock().unwrap()[0].contains("Customer is frozen"));

        handle.shutdown().await.unwrap();
    }
}
