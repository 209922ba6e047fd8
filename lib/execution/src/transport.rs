//! Telemetry transport.
//!
//! The sync loop only sees [`TelemetryConnector`] and [`TelemetryStream`].
//! This allows testing reconnect behavior without a socket; in production
//! [`WebSocketConnector`] opens one with `tokio-tungstenite`.

use crate::error::TransportError;
use async_trait::async_trait;
use flowcanvas_core::ExecutionId;
use futures::{Stream, StreamExt};
use rootcause::prelude::Report;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

/// One read from a telemetry stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryFrame {
    /// A text frame, expected to hold one telemetry message.
    Text(String),
    /// The stream ended. `clean` is false for errors and abnormal closes.
    Closed { clean: bool },
}

/// An open telemetry stream.
#[async_trait]
pub trait TelemetryStream: Send {
    /// Waits for the next frame.
    ///
    /// After a `Closed` frame the stream must not be read again.
    async fn next_frame(&mut self) -> TelemetryFrame;
}

/// Opens telemetry streams for executions.
#[async_trait]
pub trait TelemetryConnector: Send + Sync {
    /// Opens the stream of `execution_id`.
    async fn connect(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Box<dyn TelemetryStream>, Report<TransportError>>;
}

/// WebSocket telemetry endpoint.
///
/// Streams are opened at `{base_url}/executions/{execution_id}/stream`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    base_url: String,
    token: Option<String>,
}

impl WebSocketConnector {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Sends `token` as a bearer credential on every connect.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the stream URL for an execution.
    #[must_use]
    pub fn url_for(&self, execution_id: &ExecutionId) -> String {
        format!(
            "{}/executions/{}/stream",
            self.base_url.trim_end_matches('/'),
            execution_id
        )
    }
}

#[async_trait]
impl TelemetryConnector for WebSocketConnector {
    async fn connect(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Box<dyn TelemetryStream>, Report<TransportError>> {
        let url = self.url_for(execution_id);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl {
                url: url.clone(),
                details: e.to_string(),
            })?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                TransportError::InvalidUrl {
                    url: url.clone(),
                    details: e.to_string(),
                }
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (socket, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectFailed {
                url: url.clone(),
                details: e.to_string(),
            })?;
        info!(url = %url, "Telemetry socket open");
        Ok(Box::new(WebSocketTelemetry::new(socket)))
    }
}

/// Adapts a WebSocket message stream to [`TelemetryStream`].
pub struct WebSocketTelemetry<S> {
    socket: S,
}

impl<S> WebSocketTelemetry<S> {
    pub fn new(socket: S) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl<S> TelemetryStream for WebSocketTelemetry<S>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin + Send,
{
    async fn next_frame(&mut self) -> TelemetryFrame {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return TelemetryFrame::Text(text.as_str().to_string()),
                Some(Ok(Message::Close(frame))) => {
                    let clean = frame.as_ref().is_none_or(|f| f.code == CloseCode::Normal);
                    debug!(clean, "Telemetry socket closed by peer");
                    return TelemetryFrame::Closed { clean };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Telemetry socket read failed");
                    return TelemetryFrame::Closed { clean: false };
                }
                None => return TelemetryFrame::Closed { clean: false },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    fn telemetry(
        messages: Vec<Result<Message, WsError>>,
    ) -> WebSocketTelemetry<impl Stream<Item = Result<Message, WsError>> + Unpin + Send> {
        WebSocketTelemetry::new(stream::iter(messages))
    }

    #[test]
    fn url_joins_base_and_execution() {
        let connector = WebSocketConnector::new("wss://api.example.com/ws/");
        assert_eq!(
            connector.url_for(&ExecutionId::new("exec_1")),
            "wss://api.example.com/ws/executions/exec_1/stream"
        );
    }

    #[tokio::test]
    async fn text_frames_pass_through_and_control_frames_are_skipped() {
        let mut stream = telemetry(vec![
            Ok(Message::Ping(Vec::new().into())),
            Ok(Message::Text(r#"{"status":"running"}"#.into())),
        ]);
        assert_eq!(
            stream.next_frame().await,
            TelemetryFrame::Text(r#"{"status":"running"}"#.to_string())
        );
        assert_eq!(stream.next_frame().await, TelemetryFrame::Closed { clean: false });
    }

    #[tokio::test]
    async fn close_codes_decide_cleanliness() {
        let normal = Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "done".into(),
        }));
        assert_eq!(
            telemetry(vec![Ok(normal)]).next_frame().await,
            TelemetryFrame::Closed { clean: true }
        );

        let away = Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "".into(),
        }));
        assert_eq!(
            telemetry(vec![Ok(away)]).next_frame().await,
            TelemetryFrame::Closed { clean: false }
        );

        assert_eq!(
            telemetry(vec![Ok(Message::Close(None))]).next_frame().await,
            TelemetryFrame::Closed { clean: true }
        );
    }

    #[tokio::test]
    async fn read_errors_are_unclean_closes() {
        let mut stream = telemetry(vec![Err(WsError::ConnectionClosed)]);
        assert_eq!(stream.next_frame().await, TelemetryFrame::Closed { clean: false });
    }
}
