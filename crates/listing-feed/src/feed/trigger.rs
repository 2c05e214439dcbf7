//! Single-flight scheduling of generation passes.
//!
//! The controller is a two-state machine (`Idle`, `Generating`) plus one
//! `rerun_pending` flag. A trigger that arrives while a pass is running only
//! sets the flag, so any burst of triggers costs at most one extra pass after
//! the in-flight one. Pass results are broadcast on a `watch` channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::catalog::CatalogSource;
use super::exporter::{ExportError, FeedExporter, PassReport};
use super::publisher::FeedSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Operator asked for a feed; always honored.
    Manual,
    /// A listing changed; honored only with `xmlAutomaticUpdate`.
    CatalogMutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    Idle,
    Generating,
}

/// How the controller reacted to a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAdmission {
    /// A new pass starts for this trigger.
    Started,
    /// A pass is running; this trigger folds into the pending rerun.
    Coalesced,
    /// Automatic updates are off (or unreadable); nothing runs.
    Ignored,
}

/// Result of [`FeedTrigger::trigger_blocking`].
#[derive(Debug)]
pub enum TriggerResult {
    /// Result of the pass this trigger started. Coalesced reruns that
    /// followed it are reported on the status channel.
    Completed(Result<PassReport, ExportError>),
    Coalesced,
    Ignored,
}

/// Last settled pass, as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed { report: PassReport },
    Failed { reason: String },
}

impl From<&Result<PassReport, ExportError>> for PassOutcome {
    fn from(result: &Result<PassReport, ExportError>) -> Self {
        match result {
            Ok(report) => Self::Completed {
                report: report.clone(),
            },
            Err(err) => Self::Failed {
                reason: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    pub phase: GenerationPhase,
    pub rerun_pending: bool,
    pub completed_passes: u64,
    pub last_outcome: Option<PassOutcome>,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self {
            phase: GenerationPhase::Idle,
            rerun_pending: false,
            completed_passes: 0,
            last_outcome: None,
        }
    }
}

#[derive(Debug)]
struct TriggerState {
    phase: GenerationPhase,
    rerun_pending: bool,
}

/// Returns the controller to `Idle` if a pass unwinds, recording the panic as
/// a failed pass so waiters on the status channel are released.
struct SettleOnPanic<'a> {
    state: &'a Mutex<TriggerState>,
    status: &'a watch::Sender<FeedStatus>,
}

impl Drop for SettleOnPanic<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.phase = GenerationPhase::Idle;
        state.rerun_pending = false;
        self.status.send_modify(|status| {
            status.phase = GenerationPhase::Idle;
            status.rerun_pending = false;
            status.completed_passes += 1;
            status.last_outcome = Some(PassOutcome::Failed {
                reason: "feed generation panicked".to_string(),
            });
        });
    }
}

/// Decides when the exporter runs and keeps at most one pass in flight.
#[derive(Debug)]
pub struct FeedTrigger<C, S> {
    exporter: FeedExporter<C, S>,
    state: Mutex<TriggerState>,
    status: watch::Sender<FeedStatus>,
}

impl<C, S> FeedTrigger<C, S>
where
    C: CatalogSource + 'static,
    S: FeedSink + 'static,
{
    pub fn new(exporter: FeedExporter<C, S>) -> Self {
        let (status, _) = watch::channel(FeedStatus::default());
        Self {
            exporter,
            state: Mutex::new(TriggerState {
                phase: GenerationPhase::Idle,
                rerun_pending: false,
            }),
            status,
        }
    }

    pub fn status(&self) -> FeedStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedStatus> {
        self.status.subscribe()
    }

    /// Fire-and-forget manual request. The pass runs on the blocking pool.
    pub fn request_manual_generation(self: &Arc<Self>) -> TriggerAdmission {
        self.spawn(TriggerKind::Manual)
    }

    /// Fire-and-forget catalog change notification.
    pub fn notify_catalog_mutated(self: &Arc<Self>) -> TriggerAdmission {
        self.spawn(TriggerKind::CatalogMutation)
    }

    /// Admits the trigger and, when it starts a pass, runs that pass and any
    /// coalesced rerun on the calling thread.
    pub fn trigger_blocking(&self, kind: TriggerKind) -> TriggerResult {
        match self.admit(kind) {
            TriggerAdmission::Started => TriggerResult::Completed(self.drain(kind)),
            TriggerAdmission::Coalesced => TriggerResult::Coalesced,
            TriggerAdmission::Ignored => TriggerResult::Ignored,
        }
    }

    fn spawn(self: &Arc<Self>, kind: TriggerKind) -> TriggerAdmission {
        let admission = self.admit(kind);
        if admission == TriggerAdmission::Started {
            let trigger = Arc::clone(self);
            tokio::task::spawn_blocking(move || {
                if let Err(err) = trigger.drain(kind) {
                    error!(error = %err, trigger = ?kind, "feed generation failed");
                }
            });
        }
        admission
    }

    fn admit(&self, kind: TriggerKind) -> TriggerAdmission {
        if kind == TriggerKind::CatalogMutation && !self.automatic_updates_enabled() {
            debug!("catalog changed but automatic feed updates are off");
            return TriggerAdmission::Ignored;
        }

        let mut state = self.lock_state();
        let admission = match state.phase {
            GenerationPhase::Idle => {
                state.phase = GenerationPhase::Generating;
                TriggerAdmission::Started
            }
            GenerationPhase::Generating => {
                state.rerun_pending = true;
                debug!(trigger = ?kind, "feed pass in flight, rerun scheduled");
                TriggerAdmission::Coalesced
            }
        };
        self.publish_state(&state);
        admission
    }

    fn automatic_updates_enabled(&self) -> bool {
        match self.exporter.catalog().feed_config() {
            Ok(config) => config.is_some_and(|config| config.xml_automatic_update),
            Err(err) => {
                warn!(error = %err, "unable to read feed configuration for automatic update");
                false
            }
        }
    }

    /// Runs passes until no rerun is pending, then returns to `Idle`.
    fn drain(&self, kind: TriggerKind) -> Result<PassReport, ExportError> {
        let _settle = SettleOnPanic {
            state: &self.state,
            status: &self.status,
        };
        debug!(trigger = ?kind, "feed generation pass starting");
        let first = self.run_one();
        loop {
            {
                let mut state = self.lock_state();
                if !state.rerun_pending {
                    state.phase = GenerationPhase::Idle;
                    self.publish_state(&state);
                    return first;
                }
                state.rerun_pending = false;
                self.publish_state(&state);
            }

            debug!("coalesced feed rerun starting");
            if let Err(err) = self.run_one() {
                error!(error = %err, "coalesced feed rerun failed");
            }
        }
    }

    fn run_one(&self) -> Result<PassReport, ExportError> {
        let result = self.exporter.run_pass();
        let outcome = PassOutcome::from(&result);
        self.status.send_modify(|status| {
            status.completed_passes += 1;
            status.last_outcome = Some(outcome);
        });
        result
    }

    fn publish_state(&self, state: &TriggerState) {
        self.status.send_modify(|status| {
            status.phase = state.phase;
            status.rerun_pending = state.rerun_pending;
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, TriggerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
