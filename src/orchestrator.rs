//! Smart Connect pipeline: snapshot, layout, auto-connect, re-layout, report.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::affinity::{AffinitySource, NoAffinity};
use crate::cancel::{CancelHandle, CancelToken, cancel_pair};
use crate::collision::CollisionDetector;
use crate::config::Config;
use crate::connect::AutoConnector;
use crate::error::{ComposerError, Result};
use crate::events::{ComposerEvent, NotificationLevel, RunReport, RunStatus};
use crate::history::{History, Snapshot, compare_with_current};
use crate::layout::{apply_layout, optimize_layout};
use crate::store::{CanvasGeometry, NoCanvas, WorkspaceStore};

const EVENT_CAPACITY: usize = 64;

pub const BEFORE_LABEL: &str = "Before Smart Connect";
pub const AFTER_LABEL: &str = "After Smart Connect";
pub const FAILED_LABEL: &str = "Smart Connect (failed)";

struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SmartConnect<S, C = NoCanvas, A = NoAffinity> {
    store: Mutex<S>,
    history: Mutex<History>,
    canvas: C,
    affinity: A,
    detector: CollisionDetector,
    config: Config,
    running: AtomicBool,
    events: broadcast::Sender<ComposerEvent>,
    cancel: CancelHandle,
}

impl<S: WorkspaceStore> SmartConnect<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self::with_collaborators(store, NoCanvas, NoAffinity, config)
    }
}

impl<S, C, A> SmartConnect<S, C, A>
where
    S: WorkspaceStore,
    C: CanvasGeometry,
    A: AffinitySource,
{
    pub fn with_collaborators(store: S, canvas: C, affinity: A, config: Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (cancel, _) = cancel_pair();
        Self {
            store: Mutex::new(store),
            history: Mutex::new(History::new(&config.history)),
            canvas,
            affinity,
            detector: CollisionDetector::new(config.collision.clone()),
            config,
            running: AtomicBool::new(false),
            events,
            cancel,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ComposerEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn detector(&self) -> &CollisionDetector {
        &self.detector
    }

    pub fn store(&self) -> &Mutex<S> {
        &self.store
    }

    pub fn history(&self) -> &Mutex<History> {
        &self.history
    }

    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Interrupts any in-flight animation or phase delay.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn emit(&self, event: ComposerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.emit(ComposerEvent::Notification {
            level,
            message: message.into(),
        });
    }

    fn fresh_token(&self) -> CancelToken {
        self.cancel.reset();
        self.cancel.token()
    }

    /// Runs one Smart Connect pass. A call made while another pass is in
    /// flight returns immediately with [`RunStatus::Busy`].
    ///
    /// History only changes when the workspace does: a pass that changes
    /// something records the pre-run state and the result, so one undo
    /// reverts it. A failed pass records its partial state instead.
    pub async fn optimize(&self) -> RunReport {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            debug!("smart connect already running");
            return RunReport::with_status(RunStatus::Busy);
        };

        self.emit(ComposerEvent::RunStarted);
        let mut token = self.fresh_token();
        let before = Snapshot::capture(&*self.store.lock().await, BEFORE_LABEL);
        let report = match self.run_pipeline(&before, &mut token).await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "smart connect failed");
                self.record_outcome(before, FAILED_LABEL).await;
                RunReport {
                    error: Some(err.to_string()),
                    ..RunReport::with_status(RunStatus::Failed)
                }
            }
        };

        let level = match report.status {
            RunStatus::Completed => NotificationLevel::Success,
            RunStatus::NoChanges => NotificationLevel::Info,
            RunStatus::Failed => NotificationLevel::Error,
            RunStatus::Busy => NotificationLevel::Warning,
        };
        self.notify(level, report.summary());
        self.emit(ComposerEvent::RunFinished {
            report: report.clone(),
        });
        report
    }

    async fn layout_pass(&self, pass: usize, token: &mut CancelToken) -> Result<usize> {
        let mut store = self.store.lock().await;
        let nodes = store.nodes();
        let edges = store.edges();
        let canvas = self
            .canvas
            .size()
            .unwrap_or_else(|| self.config.canvas.fallback());
        let placements = optimize_layout(&nodes, &edges, Some(canvas), &self.config.layout);
        let moved = apply_layout(&mut *store, &placements, self.config.pipeline.animation(), token)
            .await
            .map_err(|err| stage_error("layout", err))?;
        debug!(pass, nodes = moved, "layout pass finished");
        self.emit(ComposerEvent::LayoutApplied { nodes: moved, pass });
        Ok(moved)
    }

    async fn run_pipeline(&self, before: &Snapshot, token: &mut CancelToken) -> Result<RunReport> {
        let mut report = RunReport::with_status(RunStatus::Completed);
        report.crossings_before = self.detector.count_crossings(&before.edges, &before.nodes);
        info!(
            nodes = before.nodes.len(),
            edges = before.edges.len(),
            crossings = report.crossings_before,
            "smart connect started"
        );

        self.layout_pass(1, token).await?;
        token.pause(self.config.pipeline.phase_delay()).await?;

        let outcome = {
            let mut store = self.store.lock().await;
            AutoConnector::new(&self.affinity, &self.detector, &self.config.connect)
                .connect_isolated_modules(&mut *store)
        };
        report.edges_added = outcome.edges_added();
        for edge in outcome.created {
            self.emit(ComposerEvent::EdgeCreated { edge });
        }
        if !outcome.unresolved.is_empty() {
            warn!(unresolved = ?outcome.unresolved, "modules left without a connection");
        }

        if report.edges_added > 0 {
            token.pause(self.config.pipeline.phase_delay()).await?;
            self.layout_pass(2, token).await?;
            report.relayout = true;
        }

        let mut history = self.history.lock().await;
        let store = self.store.lock().await;
        report.crossings_after = self.detector.count_crossings(&store.edges(), &store.nodes());
        report.crossings_removed = report.crossings_before.saturating_sub(report.crossings_after);
        let diff = compare_with_current(before, &*store, self.config.history.move_tolerance);
        report.moved_nodes = diff.moved_nodes;

        if diff.is_empty() {
            report.status = RunStatus::NoChanges;
        } else {
            history.record(before.clone());
            history.take_snapshot(&*store, AFTER_LABEL);
        }
        info!(
            status = ?report.status,
            edges_added = report.edges_added,
            crossings_removed = report.crossings_removed,
            moved = report.moved_nodes,
            "smart connect finished"
        );
        Ok(report)
    }

    /// Records `before` and the live state under `label` when the store no
    /// longer matches `before`.
    async fn record_outcome(&self, before: Snapshot, label: &str) {
        let mut history = self.history.lock().await;
        let store = self.store.lock().await;
        if compare_with_current(&before, &*store, self.config.history.move_tolerance).is_empty() {
            return;
        }
        history.record(before);
        history.take_snapshot(&*store, label);
    }

    pub async fn take_snapshot(&self, label: &str) -> usize {
        let mut history = self.history.lock().await;
        let store = self.store.lock().await;
        history.take_snapshot(&*store, label)
    }

    pub async fn restore_snapshot(&self, index: usize) -> bool {
        self.navigate(Navigation::Restore(index)).await
    }

    pub async fn undo(&self) -> bool {
        self.navigate(Navigation::Undo).await
    }

    pub async fn redo(&self) -> bool {
        self.navigate(Navigation::Redo).await
    }

    async fn navigate(&self, step: Navigation) -> bool {
        let action = step.name();
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            self.notify(
                NotificationLevel::Warning,
                format!("Cannot {action} while Smart Connect is running"),
            );
            return false;
        };

        let mut token = self.fresh_token();
        let animation = self.config.pipeline.animation();
        let mut history = self.history.lock().await;
        let mut store = self.store.lock().await;
        let result = match step {
            Navigation::Restore(index) => {
                history
                    .restore_snapshot(&mut *store, index, animation, &mut token)
                    .await
            }
            Navigation::Undo => history.undo(&mut *store, animation, &mut token).await,
            Navigation::Redo => history.redo(&mut *store, animation, &mut token).await,
        };

        match result {
            Ok(true) => {
                if let Some(index) = history.current_index() {
                    let label = history
                        .get(index)
                        .map(|snapshot| snapshot.label.clone())
                        .unwrap_or_default();
                    self.emit(ComposerEvent::HistoryRestored { index, label });
                }
                true
            }
            Ok(false) => {
                debug!(action, "history boundary reached");
                self.notify(NotificationLevel::Info, format!("Nothing to {action}"));
                false
            }
            Err(err) => {
                warn!(action, error = %err, "history navigation failed");
                self.notify(NotificationLevel::Error, format!("{action} failed: {err}"));
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Navigation {
    Restore(usize),
    Undo,
    Redo,
}

impl Navigation {
    fn name(self) -> &'static str {
        match self {
            Navigation::Restore(_) => "restore",
            Navigation::Undo => "undo",
            Navigation::Redo => "redo",
        }
    }
}

fn stage_error(stage: &'static str, err: ComposerError) -> ComposerError {
    match err {
        ComposerError::Cancelled => ComposerError::Cancelled,
        other => ComposerError::pipeline(stage, other.to_string()),
    }
}
