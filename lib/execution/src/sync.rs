//! Telemetry sync loop.
//!
//! [`run_sync`] observes one execution: it waits out the initial delay,
//! connects, forwards telemetry as [`ExecutionAction`]s and reconnects with
//! exponential backoff after unclean closes. A terminal workflow status or
//! a clean close ends it. Cancelling the token ends it at the next await.

use crate::reconnect::ReconnectPolicy;
use crate::state::ExecutionAction;
use crate::telemetry::TelemetryMessage;
use crate::transport::{TelemetryConnector, TelemetryFrame, TelemetryStream};
use flowcanvas_core::ExecutionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Progress reported by the sync loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A stream opened.
    Connected,
    /// Telemetry to apply to the execution state.
    Action(ExecutionAction),
    /// The stream dropped; attempt `attempt` follows after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnecting failed `attempts` times in a row.
    GaveUp { attempts: u32 },
    /// The execution finished or the server closed the stream cleanly.
    Finished,
}

/// A [`SyncEvent`] tagged with the execution it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUpdate {
    pub execution_id: ExecutionId,
    pub event: SyncEvent,
}

struct Outbox<'a> {
    execution_id: &'a ExecutionId,
    updates: &'a mpsc::UnboundedSender<SyncUpdate>,
}

impl Outbox<'_> {
    /// Returns false once the receiver is gone.
    fn send(&self, event: SyncEvent) -> bool {
        self.updates
            .send(SyncUpdate {
                execution_id: self.execution_id.clone(),
                event,
            })
            .is_ok()
    }
}

enum StreamEnd {
    Cancelled,
    ReceiverGone,
    Finished,
    Dropped,
}

/// Observes `execution_id` until it finishes, the policy is exhausted or
/// `cancel` fires.
#[instrument(skip(connector, policy, updates, cancel), fields(execution_id = %execution_id))]
pub async fn run_sync<C>(
    connector: Arc<C>,
    execution_id: ExecutionId,
    policy: ReconnectPolicy,
    updates: mpsc::UnboundedSender<SyncUpdate>,
    cancel: CancellationToken,
) where
    C: TelemetryConnector + ?Sized,
{
    let outbox = Outbox {
        execution_id: &execution_id,
        updates: &updates,
    };

    if !sleep_unless_cancelled(policy.initial_delay, &cancel).await {
        debug!("Sync cancelled before connecting");
        return;
    }

    let mut failures = 0u32;
    loop {
        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            result = connector.connect(&execution_id) => result,
        };

        match connected {
            Ok(mut stream) => {
                failures = 0;
                info!("Telemetry stream connected");
                if !outbox.send(SyncEvent::Connected) {
                    return;
                }
                match pump(stream.as_mut(), &outbox, &cancel).await {
                    StreamEnd::Cancelled | StreamEnd::ReceiverGone => return,
                    StreamEnd::Finished => {
                        info!("Telemetry stream finished");
                        outbox.send(SyncEvent::Finished);
                        return;
                    }
                    StreamEnd::Dropped => warn!("Telemetry stream dropped"),
                }
            }
            Err(e) => warn!(error = %e, "Telemetry connect failed"),
        }

        if policy.exhausted(failures) {
            error!(attempts = failures, "Giving up on telemetry stream");
            outbox.send(SyncEvent::GaveUp { attempts: failures });
            return;
        }

        let delay = policy.delay_for(failures);
        failures += 1;
        debug!(attempt = failures, delay_ms = delay.as_millis() as u64, "Reconnecting");
        if !outbox.send(SyncEvent::Reconnecting {
            attempt: failures,
            delay,
        }) {
            return;
        }
        if !sleep_unless_cancelled(delay, &cancel).await {
            return;
        }
    }
}

async fn pump(
    stream: &mut dyn TelemetryStream,
    outbox: &Outbox<'_>,
    cancel: &CancellationToken,
) -> StreamEnd {
    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamEnd::Cancelled,
            frame = stream.next_frame() => frame,
        };

        match frame {
            TelemetryFrame::Text(text) => match TelemetryMessage::parse(&text) {
                Ok(message) => {
                    let terminal = message.is_terminal();
                    if !outbox.send(SyncEvent::Action(ExecutionAction::NodeUpdate(message))) {
                        return StreamEnd::ReceiverGone;
                    }
                    if terminal {
                        return StreamEnd::Finished;
                    }
                }
                Err(e) => warn!(error = %e, "Ignoring malformed telemetry frame"),
            },
            TelemetryFrame::Closed { clean: true } => return StreamEnd::Finished,
            TelemetryFrame::Closed { clean: false } => return StreamEnd::Dropped,
        }
    }
}

/// Returns false if `cancel` fired first.
async fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use rootcause::prelude::Report;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Frames served by one successful connect. `None` fails the connect.
    pub(crate) type Script = Option<Vec<TelemetryFrame>>;

    pub(crate) struct ScriptedStream {
        frames: VecDeque<TelemetryFrame>,
    }

    #[async_trait]
    impl TelemetryStream for ScriptedStream {
        async fn next_frame(&mut self) -> TelemetryFrame {
            match self.frames.pop_front() {
                Some(frame) => frame,
                None => std::future::pending().await,
            }
        }
    }

    /// Connector that replays scripts in order and fails once they run out.
    #[derive(Default)]
    pub(crate) struct ScriptedConnector {
        scripts: Mutex<VecDeque<Script>>,
        pub(crate) connects: Mutex<Vec<(ExecutionId, Instant)>>,
    }

    impl ScriptedConnector {
        pub(crate) fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                connects: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn connect_count(&self) -> usize {
            self.connects.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TelemetryConnector for ScriptedConnector {
        async fn connect(
            &self,
            execution_id: &ExecutionId,
        ) -> Result<Box<dyn TelemetryStream>, Report<TransportError>> {
            self.connects
                .lock()
                .unwrap()
                .push((execution_id.clone(), Instant::now()));
            match self.scripts.lock().unwrap().pop_front().flatten() {
                Some(frames) => Ok(Box::new(ScriptedStream {
                    frames: frames.into(),
                })),
                None => Err(TransportError::ConnectFailed {
                    url: format!("fake://{execution_id}"),
                    details: "refused".to_string(),
                }
                .into()),
            }
        }
    }

    pub(crate) fn text(value: &str) -> TelemetryFrame {
        TelemetryFrame::Text(value.to_string())
    }

    async fn collect(connector: Arc<ScriptedConnector>) -> Vec<SyncEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_sync(
            connector,
            ExecutionId::new("exec_1"),
            ReconnectPolicy::default(),
            tx,
            CancellationToken::new(),
        )
        .await;

        let mut events = Vec::new();
        while let Ok(update) = rx.try_recv() {
            assert_eq!(update.execution_id, ExecutionId::new("exec_1"));
            events.push(update.event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn waits_initial_delay_before_connecting() {
        let connector = Arc::new(ScriptedConnector::new(vec![Some(vec![text(
            r#"{"status":"completed"}"#,
        )])]));
        let started = Instant::now();
        collect(connector.clone()).await;

        let connects = connector.connects.lock().unwrap();
        assert_eq!(connects.len(), 1);
        assert!(connects[0].1 - started >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_telemetry_until_terminal_status() {
        let connector = Arc::new(ScriptedConnector::new(vec![Some(vec![
            text(r#"{"node_id":"a","status":"running"}"#),
            text("not json"),
            text(r#"{"node_id":"a","status":"success"}"#),
            text(r#"{"status":"completed"}"#),
            text(r#"{"node_id":"b","status":"running"}"#),
        ])]));
        let events = collect(connector).await;

        assert_eq!(events.first(), Some(&SyncEvent::Connected));
        let actions = events
            .iter()
            .filter(|e| matches!(e, SyncEvent::Action(_)))
            .count();
        assert_eq!(actions, 3);
        assert_eq!(events.last(), Some(&SyncEvent::Finished));
    }

    #[tokio::test(start_paused = true)]
    async fn clean_close_finishes_without_reconnect() {
        let connector = Arc::new(ScriptedConnector::new(vec![Some(vec![
            TelemetryFrame::Closed { clean: true },
        ])]));
        let events = collect(connector.clone()).await;
        assert_eq!(events, vec![SyncEvent::Connected, SyncEvent::Finished]);
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backs_off_exponentially_then_gives_up() {
        let connector = Arc::new(ScriptedConnector::default());
        let events = collect(connector.clone()).await;

        let expected = vec![
            SyncEvent::Reconnecting { attempt: 1, delay: Duration::from_secs(1) },
            SyncEvent::Reconnecting { attempt: 2, delay: Duration::from_secs(2) },
            SyncEvent::Reconnecting { attempt: 3, delay: Duration::from_secs(4) },
            SyncEvent::Reconnecting { attempt: 4, delay: Duration::from_secs(8) },
            SyncEvent::Reconnecting { attempt: 5, delay: Duration::from_secs(16) },
            SyncEvent::GaveUp { attempts: 5 },
        ];
        assert_eq!(events, expected);
        assert_eq!(connector.connect_count(), 6);

        let connects = connector.connects.lock().unwrap();
        let gaps: Vec<u64> = connects
            .windows(2)
            .map(|w| (w[1].1 - w[0].1).as_secs())
            .collect();
        assert_eq!(gaps, vec![1, 2, 4, 8, 16]);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_open_resets_attempts() {
        let connector = Arc::new(ScriptedConnector::new(vec![
            None,
            Some(vec![TelemetryFrame::Closed { clean: false }]),
            None,
            Some(vec![text(r#"{"status":"failed"}"#)]),
        ]));
        let events = collect(connector).await;

        let attempts: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::Reconnecting { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 1, 2]);
        assert_eq!(events.last(), Some(&SyncEvent::Finished));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_initial_delay_never_connects() {
        let connector = Arc::new(ScriptedConnector::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_sync(
            connector.clone(),
            ExecutionId::new("exec_1"),
            ReconnectPolicy::default(),
            tx,
            cancel.clone(),
        ));

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(connector.connect_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_streaming_stops_the_loop() {
        let connector = Arc::new(ScriptedConnector::new(vec![Some(vec![text(
            r#"{"node_id":"a","status":"running"}"#,
        )])]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_sync(
            connector.clone(),
            ExecutionId::new("exec_1"),
            ReconnectPolicy::default(),
            tx,
            cancel.clone(),
        ));

        assert_eq!(rx.recv().await.map(|u| u.event), Some(SyncEvent::Connected));
        assert!(matches!(
            rx.recv().await.map(|u| u.event),
            Some(SyncEvent::Action(_))
        ));
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(connector.connect_count(), 1);
        assert!(rx.recv().await.is_none());
    }
}
