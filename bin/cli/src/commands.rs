//! Subcommand implementations.
//!
//! Graph commands read a file and return the text to print, so they can be
//! tested without a terminal. Run commands talk to the workflow service.

use crate::config::CliConfig;
use crate::error::CliError;
use flowcanvas_core::{ExecutionId, WorkflowId};
use flowcanvas_editor::{EditorSession, FilePreferenceStore, Preferences};
use flowcanvas_execution::{
    ExecutionAction, ExecutionController, ExecutionState, HttpRunClient, ReconnectPolicy, RunClient, SyncEvent,
    TelemetryConnector, TelemetryMessage, WebSocketConnector, WorkflowStatus,
};
use flowcanvas_graph::{NodeKind, Template, parse_graph, stringify_graph};
use rootcause::prelude::Report;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

fn codec_error(e: impl std::fmt::Display) -> CliError {
    CliError::Codec { details: e.to_string() }
}

fn preference_error(e: impl std::fmt::Display) -> CliError {
    CliError::Preferences { details: e.to_string() }
}

/// Reads a UTF-8 file.
pub fn read_file(path: &Path) -> Result<String, Report<CliError>> {
    let text = fs::read_to_string(path).map_err(|e| CliError::Io {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    Ok(text)
}

/// Writes `text` to `output`, or prints it when no path is given.
pub fn write_output(text: &str, output: Option<&Path>) -> Result<(), Report<CliError>> {
    match output {
        Some(path) => {
            fs::write(path, text).map_err(|e| CliError::Io {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
            info!(path = %path.display(), "Wrote output");
        }
        None => println!("{text}"),
    }
    Ok(())
}

/// Auto-lays out a graph file.
pub fn layout(input: &Path, respect_pinned: bool) -> Result<String, Report<CliError>> {
    let text = read_file(input)?;
    let mut session = EditorSession::new();
    session.import_file(&text).map_err(codec_error)?;
    session.auto_layout(respect_pinned);
    let laid_out = session.export_file().map_err(codec_error)?;
    Ok(laid_out)
}

/// Rewrites a graph file into canonical form, dropping what is unusable.
pub fn sanitize(input: &Path) -> Result<String, Report<CliError>> {
    let graph = parse_graph(&read_file(input)?).map_err(codec_error)?;
    info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "Sanitized graph");
    let text = stringify_graph(&graph).map_err(codec_error)?;
    Ok(text)
}

/// Wraps a graph file in a template.
pub fn template_export(
    input: &Path,
    name: &str,
    category: &str,
    description: Option<&str>,
    public: bool,
) -> Result<String, Report<CliError>> {
    let graph = parse_graph(&read_file(input)?).map_err(codec_error)?;
    let mut template = Template::export(name, category, &graph).public(public);
    if let Some(description) = description {
        template = template.with_description(description);
    }
    let text = template.to_json().map_err(codec_error)?;
    Ok(text)
}

/// Extracts the graph from a template file.
pub fn template_import(input: &Path) -> Result<String, Report<CliError>> {
    let template = Template::from_json(&read_file(input)?).map_err(codec_error)?;
    info!(template = %template.name, category = %template.category, "Loaded template");
    let text = stringify_graph(&template.graph).map_err(codec_error)?;
    Ok(text)
}

/// Maps a shortcut key to a node kind.
pub fn set_shortcut(config: &CliConfig, key: &str, kind: &str) -> Result<Preferences, Report<CliError>> {
    let kind: NodeKind = kind.parse().map_err(|e| CliError::InvalidArgument {
        details: format!("{e}"),
    })?;
    let preferences = FilePreferenceStore::in_dir(&config.preferences_dir)
        .set_shortcut(key, kind)
        .map_err(preference_error)?;
    Ok(preferences)
}

/// Loads the saved preferences.
pub fn load_preferences(config: &CliConfig) -> Result<Preferences, Report<CliError>> {
    let preferences = FilePreferenceStore::in_dir(&config.preferences_dir)
        .load()
        .map_err(preference_error)?;
    Ok(preferences)
}

/// Renders shortcut mappings, one per line.
#[must_use]
pub fn format_shortcuts(preferences: &Preferences) -> String {
    preferences
        .shortcuts
        .iter()
        .map(|(key, kind)| format!("{key}  {}", kind.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

type Controller = ExecutionController<WebSocketConnector, HttpRunClient>;

fn controller(config: &CliConfig) -> Result<Controller, Report<CliError>> {
    let mut connector = WebSocketConnector::new(config.telemetry_url.as_str());
    if let Some(token) = config.api_token.as_deref().filter(|t| !t.is_empty()) {
        connector = connector.with_token(token);
    }
    let run_client = HttpRunClient::new(config.api_base_url.as_str(), config.api_token.clone())
        .map_err(|e| CliError::Run { details: e.to_string() })?;
    Ok(ExecutionController::new(
        Arc::new(connector),
        run_client,
        ReconnectPolicy::from(&config.reconnect),
    ))
}

/// Starts a run and, if `watch` is set, follows it to the end.
pub async fn run(config: &CliConfig, workflow_id: WorkflowId, watch: bool) -> Result<(), Report<CliError>> {
    let mut controller = controller(config)?;
    let execution_id = controller
        .run_workflow(workflow_id)
        .await
        .map_err(|e| CliError::Run { details: e.to_string() })?;
    println!("{execution_id}");
    if !watch {
        return Ok(());
    }
    follow(&mut controller).await
}

/// Follows an execution started elsewhere.
pub async fn watch(
    config: &CliConfig,
    workflow_id: WorkflowId,
    execution_id: ExecutionId,
) -> Result<(), Report<CliError>> {
    let mut controller = controller(config)?;
    controller.observe(execution_id, workflow_id);
    follow(&mut controller).await
}

async fn follow<C, R>(controller: &mut ExecutionController<C, R>) -> Result<(), Report<CliError>>
where
    C: TelemetryConnector + ?Sized + 'static,
    R: RunClient,
{
    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                controller.stop();
                info!("Stopped watching");
                return Ok(());
            }
            event = controller.next_event() => event,
        };
        let Some(event) = event else {
            return Ok(());
        };

        match event {
            SyncEvent::Connected => info!("Watching execution"),
            SyncEvent::Action(ExecutionAction::NodeUpdate(message)) => println!("{}", format_update(&message)),
            SyncEvent::Action(_) => {}
            SyncEvent::Reconnecting { attempt, delay } => {
                warn!(attempt, delay_ms = delay.as_millis() as u64, "Telemetry dropped, reconnecting");
            }
            SyncEvent::GaveUp { .. } => {
                let details = controller
                    .state()
                    .error
                    .clone()
                    .unwrap_or_else(|| "lost connection to execution telemetry".to_string());
                return Err(CliError::Run { details }.into());
            }
            SyncEvent::Finished => {
                println!("{}", format_summary(controller.state()));
                if controller.state().status == WorkflowStatus::Failed {
                    let details = controller
                        .state()
                        .error
                        .clone()
                        .unwrap_or_else(|| "workflow failed".to_string());
                    return Err(CliError::Run { details }.into());
                }
                return Ok(());
            }
        }
    }
}

/// Renders one telemetry message as a progress line.
#[must_use]
pub fn format_update(message: &TelemetryMessage) -> String {
    match (&message.node_id, message.node_status()) {
        (Some(node_id), Some(status)) => format!("{node_id}  {status}"),
        (Some(node_id), None) => format!("{node_id}  updated"),
        (None, _) => match message.workflow_status() {
            Some(status) => format!("workflow  {status}"),
            None => "workflow  updated".to_string(),
        },
    }
}

/// Renders the final state: workflow status, then each node sorted by ID.
#[must_use]
pub fn format_summary(state: &ExecutionState) -> String {
    let mut lines = vec![format!("status  {}", state.status)];
    let mut nodes: Vec<_> = state.nodes.iter().collect();
    nodes.sort_by(|a, b| a.0.cmp(b.0));
    for (node_id, data) in nodes {
        match data.duration_ms {
            Some(ms) => lines.push(format!("{node_id}  {}  {ms}ms", data.status)),
            None => lines.push(format!("{node_id}  {}", data.status)),
        }
    }
    lines.join("\n")
}
