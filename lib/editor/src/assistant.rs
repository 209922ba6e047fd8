//! Assistant-driven graph rewrites.
//!
//! The assistant streams a response: text tokens, then one or more graph
//! proposals, then an end marker. [`AssistantSession`] turns that stream
//! into discrete transitions:
//!
//! ```text
//! idle ──start──▶ streaming ──finished──▶ applying ──▶ done
//!                     │                       │
//!                     └──────failed───────────┴──▶ errored
//! ```
//!
//! Proposals are held until the stream finishes and then applied in one
//! history-preserving step, so the live graph never sees a half-received
//! rewrite.

use crate::error::EditorError;
use crate::session::EditorSession;
use flowcanvas_graph::codec::normalize_format;
use flowcanvas_graph::{GraphDocument, sanitize_graph};
use rootcause::prelude::Report;
use serde_json::Value as JsonValue;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where an assistant exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssistantState {
    #[default]
    Idle,
    Streaming,
    Applying,
    Done,
    Errored,
}

impl AssistantState {
    fn accepts_start(self) -> bool {
        matches!(self, Self::Idle | Self::Done | Self::Errored)
    }
}

impl fmt::Display for AssistantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Applying => "applying",
            Self::Done => "done",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// One item of the assistant's response stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantEvent {
    /// A chunk of explanatory text.
    Token(String),
    /// A proposed graph, in canonical or foreign format. Later proposals
    /// replace earlier ones.
    Graph(JsonValue),
    /// The stream ended normally.
    Finished,
    /// The stream failed.
    Failed(String),
}

impl AssistantEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::Graph(_) => "graph",
            Self::Finished => "finished",
            Self::Failed(_) => "failed",
        }
    }
}

/// One assistant exchange at a time.
#[derive(Debug, Default)]
pub struct AssistantSession {
    state: AssistantState,
    prompt: Option<String>,
    transcript: String,
    proposal: Option<GraphDocument>,
    error: Option<String>,
    cancel: CancellationToken,
}

impl AssistantSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> AssistantState {
        self.state
    }

    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Text streamed so far.
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Begins an exchange.
    ///
    /// Returns the token the stream reader should watch; it fires when the
    /// exchange is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if an exchange is already in flight.
    pub fn start(&mut self, prompt: impl Into<String>) -> Result<CancellationToken, Report<EditorError>> {
        if !self.state.accepts_start() {
            return Err(EditorError::InvalidTransition {
                state: self.state,
                event: "start",
            }
            .into());
        }
        let prompt = prompt.into();
        debug!(prompt_len = prompt.len(), "Assistant exchange started");
        *self = Self {
            state: AssistantState::Streaming,
            prompt: Some(prompt),
            ..Self::default()
        };
        Ok(self.cancel.clone())
    }

    /// Abandons the exchange in flight. Nothing is applied.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if self.state == AssistantState::Streaming {
            debug!("Assistant exchange cancelled");
            self.state = AssistantState::Idle;
            self.proposal = None;
        }
    }

    /// Applies one stream event.
    ///
    /// Events arriving after a cancel are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the current state does not accept the event.
    pub fn handle(
        &mut self,
        event: AssistantEvent,
        editor: &mut EditorSession,
    ) -> Result<AssistantState, Report<EditorError>> {
        if self.cancel.is_cancelled() {
            debug!(event = event.name(), "Dropping assistant event after cancel");
            return Ok(self.state);
        }

        match (self.state, event) {
            (AssistantState::Streaming, AssistantEvent::Token(token)) => {
                self.transcript.push_str(&token);
            }
            (AssistantState::Streaming, AssistantEvent::Graph(raw)) => {
                let graph = sanitize_graph(&normalize_format(raw));
                debug!(nodes = graph.nodes.len(), "Assistant proposed a graph");
                self.proposal = Some(graph);
            }
            (AssistantState::Streaming, AssistantEvent::Finished) => {
                self.state = AssistantState::Applying;
                self.apply(editor);
            }
            (AssistantState::Streaming | AssistantState::Applying, AssistantEvent::Failed(error)) => {
                warn!(error = %error, "Assistant stream failed");
                self.fail(error);
            }
            (state, event) => {
                return Err(EditorError::InvalidTransition {
                    state,
                    event: event.name(),
                }
                .into());
            }
        }
        Ok(self.state)
    }

    fn apply(&mut self, editor: &mut EditorSession) {
        match self.proposal.take() {
            Some(graph) if !graph.is_empty() => {
                editor.apply_assistant_graph(graph);
                info!("Assistant changes applied");
                self.state = AssistantState::Done;
            }
            _ => self.fail("The assistant did not propose a usable workflow".to_string()),
        }
    }

    fn fail(&mut self, error: String) {
        self.state = AssistantState::Errored;
        self.error = Some(error);
        self.proposal = None;
    }
}
