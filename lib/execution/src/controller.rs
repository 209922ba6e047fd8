//! Execution controller.
//!
//! Ties the execution store to the telemetry transport. Whether a sync task
//! should exist is derived from the store after every change: there is one
//! task per live, non-historical execution while telemetry is enabled.
//! Events tagged with an execution other than the current one are dropped.

use crate::error::RunError;
use crate::reconnect::{ReconnectPolicy, should_connect};
use crate::run::RunClient;
use crate::state::{ExecutionAction, ExecutionState, ExecutionStore};
use crate::sync::{SyncEvent, SyncUpdate, run_sync};
use crate::transport::TelemetryConnector;
use flowcanvas_core::{ExecutionId, WorkflowId};
use rootcause::prelude::Report;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct ActiveSync {
    execution_id: ExecutionId,
    cancel: CancellationToken,
}

/// Drives one execution overlay.
pub struct ExecutionController<C: ?Sized, R> {
    store: ExecutionStore,
    connector: Arc<C>,
    run_client: R,
    policy: ReconnectPolicy,
    enabled: bool,
    active: Option<ActiveSync>,
    updates_tx: mpsc::UnboundedSender<SyncUpdate>,
    updates_rx: mpsc::UnboundedReceiver<SyncUpdate>,
}

impl<C, R> ExecutionController<C, R>
where
    C: TelemetryConnector + ?Sized + 'static,
    R: RunClient,
{
    pub fn new(connector: Arc<C>, run_client: R, policy: ReconnectPolicy) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            store: ExecutionStore::new(),
            connector,
            run_client,
            policy,
            enabled: true,
            active: None,
            updates_tx,
            updates_rx,
        }
    }

    /// Returns the live execution state.
    pub fn state(&self) -> &ExecutionState {
        self.store.current()
    }

    /// Returns the store, including finished-run history.
    pub fn store(&self) -> &ExecutionStore {
        &self.store
    }

    /// Returns true while a sync task is observing an execution.
    pub fn is_observing(&self) -> bool {
        self.active.is_some()
    }

    /// Starts a run of `workflow_id` and begins observing it.
    ///
    /// On failure the state is left as it was.
    pub async fn run_workflow(&mut self, workflow_id: WorkflowId) -> Result<ExecutionId, Report<RunError>> {
        let execution_id = self.run_client.start_run(workflow_id).await?;
        self.observe(execution_id.clone(), workflow_id);
        Ok(execution_id)
    }

    /// Observes an execution that was started elsewhere.
    pub fn observe(&mut self, execution_id: ExecutionId, workflow_id: WorkflowId) {
        self.dispatch(ExecutionAction::StartExecution {
            execution_id,
            workflow_id,
        });
    }

    /// Shows a finished run's snapshot. Never connects.
    pub fn load_historical(&mut self, snapshot: ExecutionState) {
        self.dispatch(ExecutionAction::LoadState(Box::new(snapshot)));
    }

    /// Turns live telemetry on or off.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.reconcile();
    }

    /// Stops observing; the execution is marked halted.
    pub fn stop(&mut self) {
        self.cancel_active();
        self.dispatch(ExecutionAction::Halt);
    }

    /// Clears the overlay.
    pub fn reset(&mut self) {
        self.dispatch(ExecutionAction::Reset);
    }

    /// Resumes observation after the transport gave up.
    ///
    /// Returns false if there was nothing to resume.
    pub fn retry(&mut self) -> bool {
        if !self.store.current().connection_lost {
            return false;
        }
        info!("Retrying telemetry connection");
        self.cancel_active();
        self.dispatch(ExecutionAction::ResumeObservation);
        true
    }

    /// Waits for the next event of the current execution and applies it.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        loop {
            let update = self.updates_rx.recv().await?;
            if self.store.current().execution_id.as_ref() != Some(&update.execution_id) {
                debug!(execution_id = %update.execution_id, "Dropping stale sync event");
                continue;
            }

            match &update.event {
                SyncEvent::Action(action) => self.dispatch(action.clone()),
                SyncEvent::GaveUp { attempts } => {
                    warn!(attempts, "Telemetry connection lost");
                    self.dispatch(ExecutionAction::SetError(format!(
                        "Lost connection to execution telemetry after {attempts} attempts"
                    )));
                }
                SyncEvent::Connected | SyncEvent::Reconnecting { .. } | SyncEvent::Finished => {}
            }
            return Some(update.event);
        }
    }

    fn dispatch(&mut self, action: ExecutionAction) {
        self.store.dispatch(action);
        self.reconcile();
    }

    /// Starts or stops the sync task to match the current state.
    fn reconcile(&mut self) {
        let state = self.store.current();
        let wanted = state
            .execution_id
            .as_ref()
            .filter(|id| should_connect(self.enabled, Some(id), state.is_historical))
            .filter(|_| !state.status.is_terminal())
            .cloned();

        let unchanged = match (&self.active, &wanted) {
            (Some(active), Some(id)) => &active.execution_id == id,
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        self.cancel_active();
        if let Some(execution_id) = wanted {
            self.spawn_sync(execution_id);
        }
    }

    fn spawn_sync(&mut self, execution_id: ExecutionId) {
        debug!(execution_id = %execution_id, "Starting telemetry sync");
        let cancel = CancellationToken::new();
        tokio::spawn(run_sync(
            Arc::clone(&self.connector),
            execution_id.clone(),
            self.policy.clone(),
            self.updates_tx.clone(),
            cancel.clone(),
        ));
        self.active = Some(ActiveSync {
            execution_id,
            cancel,
        });
    }

    fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(execution_id = %active.execution_id, "Stopping telemetry sync");
            active.cancel.cancel();
        }
    }
}

impl<C: ?Sized, R> Drop for ExecutionController<C, R> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::{ScriptedConnector, text};
    use crate::telemetry::WorkflowStatus;
    use crate::transport::TelemetryFrame;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeRunClient {
        next: Mutex<Vec<Result<ExecutionId, RunError>>>,
    }

    impl FakeRunClient {
        fn new(results: Vec<Result<ExecutionId, RunError>>) -> Self {
            Self {
                next: Mutex::new(results),
            }
        }
    }

    #[async_trait]
    impl RunClient for FakeRunClient {
        async fn start_run(&self, _workflow_id: WorkflowId) -> Result<ExecutionId, Report<RunError>> {
            self.next.lock().unwrap().remove(0).map_err(Report::from)
        }
    }

    fn controller(
        scripts: Vec<Option<Vec<TelemetryFrame>>>,
        runs: Vec<Result<ExecutionId, RunError>>,
    ) -> (
        ExecutionController<ScriptedConnector, FakeRunClient>,
        Arc<ScriptedConnector>,
    ) {
        let connector = Arc::new(ScriptedConnector::new(scripts));
        let controller = ExecutionController::new(
            connector.clone(),
            FakeRunClient::new(runs),
            ReconnectPolicy::default(),
        );
        (controller, connector)
    }

    async fn drain_until_finished(
        controller: &mut ExecutionController<ScriptedConnector, FakeRunClient>,
    ) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Some(event) = controller.next_event().await {
            let done = matches!(event, SyncEvent::Finished | SyncEvent::GaveUp { .. });
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn run_observes_execution_to_completion() {
        let (mut controller, connector) = controller(
            vec![Some(vec![
                text(r#"{"node_id":"a","status":"running"}"#),
                text(r#"{"node_id":"a","status":"success"}"#),
                text(r#"{"status":"completed"}"#),
            ])],
            vec![Ok(ExecutionId::new("exec_1"))],
        );

        let id = controller.run_workflow(WorkflowId::new(3)).await.unwrap();
        assert_eq!(id, ExecutionId::new("exec_1"));
        assert_eq!(controller.state().status, WorkflowStatus::Running);
        assert!(controller.is_observing());

        drain_until_finished(&mut controller).await;
        assert_eq!(controller.state().status, WorkflowStatus::Completed);
        assert_eq!(controller.store().history().len(), 1);
        assert!(!controller.is_observing());
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_leaves_state_unchanged() {
        let (mut controller, connector) = controller(
            Vec::new(),
            vec![Err(RunError::Rejected {
                status: 409,
                body: "busy".to_string(),
            })],
        );

        assert!(controller.run_workflow(WorkflowId::new(3)).await.is_err());
        assert_eq!(controller.state(), &ExecutionState::default());
        assert!(!controller.is_observing());
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn give_up_marks_connection_lost_and_retry_resumes() {
        let mut scripts = vec![None; 6];
        scripts.push(Some(vec![text(r#"{"status":"completed"}"#)]));
        let (mut controller, connector) = controller(scripts, Vec::new());
        controller.observe(ExecutionId::new("exec_1"), WorkflowId::new(3));

        let events = drain_until_finished(&mut controller).await;
        assert_eq!(events.last(), Some(&SyncEvent::GaveUp { attempts: 5 }));
        assert_eq!(controller.state().status, WorkflowStatus::Failed);
        assert!(controller.state().connection_lost);
        assert!(!controller.is_observing());

        assert!(controller.retry());
        assert_eq!(controller.state().status, WorkflowStatus::Running);
        assert!(controller.is_observing());
        drain_until_finished(&mut controller).await;
        assert_eq!(controller.state().status, WorkflowStatus::Completed);
        assert_eq!(connector.connect_count(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn historical_state_never_connects() {
        let (mut controller, connector) = controller(Vec::new(), Vec::new());
        let snapshot = ExecutionState {
            execution_id: Some(ExecutionId::new("exec_old")),
            status: WorkflowStatus::Running,
            ..ExecutionState::default()
        };
        controller.load_historical(snapshot);

        assert!(controller.state().is_historical);
        assert!(!controller.is_observing());
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_cancels_and_enabling_reconnects() {
        let (mut controller, connector) = controller(
            vec![Some(vec![text(r#"{"status":"completed"}"#)])],
            Vec::new(),
        );
        controller.set_enabled(false);
        controller.observe(ExecutionId::new("exec_1"), WorkflowId::new(3));
        assert!(!controller.is_observing());

        controller.set_enabled(true);
        assert!(controller.is_observing());
        drain_until_finished(&mut controller).await;
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_execution_drops_events_from_the_previous_one() {
        let (mut controller, connector) = controller(
            vec![
                Some(vec![text(r#"{"node_id":"old","status":"running"}"#)]),
                Some(vec![text(r#"{"status":"completed"}"#)]),
            ],
            Vec::new(),
        );
        controller.observe(ExecutionId::new("exec_1"), WorkflowId::new(3));
        assert_eq!(controller.next_event().await, Some(SyncEvent::Connected));

        controller.observe(ExecutionId::new("exec_2"), WorkflowId::new(3));
        let events = drain_until_finished(&mut controller).await;
        assert!(events.contains(&SyncEvent::Finished));
        assert!(controller.state().nodes.is_empty());
        assert_eq!(controller.state().execution_id, Some(ExecutionId::new("exec_2")));
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_without_reconnecting() {
        let (mut controller, connector) = controller(
            vec![Some(vec![text(r#"{"node_id":"a","status":"running"}"#)])],
            Vec::new(),
        );
        controller.observe(ExecutionId::new("exec_1"), WorkflowId::new(3));
        assert_eq!(controller.next_event().await, Some(SyncEvent::Connected));

        controller.stop();
        assert_eq!(controller.state().status, WorkflowStatus::Halted);
        assert!(!controller.is_observing());
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        assert_eq!(connector.connect_count(), 1);
    }
}
