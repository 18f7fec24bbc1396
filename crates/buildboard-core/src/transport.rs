//! Server-sent events transport.
//!
//! Mirrors the behaviour of a browser `EventSource`:
//! - a connection that cannot be established, or that drops mid-stream, is
//!   retried natively after the retry delay (`Transient` errors);
//! - a response that is not `200 text/event-stream` fails the source for good
//!   (`Terminal` error) and the task ends;
//! - the server's `retry:` field replaces the retry delay, and the last seen
//!   event id is sent back as `Last-Event-ID` on retry.
//!
//! Every event is tagged with the generation of the connection that produced
//! it, so the controller can discard events from superseded connections.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Native retry delay used until the server sends `retry:`.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether the transport will retry on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection failed or dropped; the transport retries natively.
    Transient,
    /// The source failed permanently; only a new connection can recover.
    Terminal,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Transient => write!(f, "transient"),
            TransportErrorKind::Terminal => write!(f, "terminal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Transient, message)
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Terminal, message)
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == TransportErrorKind::Terminal
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} connection error: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportError {}

/// Connection-level events delivered to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Opened,
    /// Data of one `message` event.
    Message(String),
    Error(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub generation: u64,
    pub event: StreamEvent,
}

pub type StreamSender = mpsc::UnboundedSender<StreamMessage>;
pub type StreamReceiver = mpsc::UnboundedReceiver<StreamMessage>;

/// Push endpoint plus the HTTP client used to reach it.
#[derive(Debug, Clone)]
pub struct EventSource {
    client: reqwest::Client,
    url: Url,
    retry_delay: Duration,
}

impl EventSource {
    /// Creates an event source for `url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, retry_delay: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url,
            retry_delay,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Spawns the connection task and returns the token that cancels it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, generation: u64, tx: StreamSender) -> CancellationToken {
        let cancel = CancellationToken::new();
        let source = self.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            source.run(generation, tx, task_cancel).await;
        });
        cancel
    }

    /// Runs the connection until it fails terminally, is cancelled, or the
    /// receiver goes away.
    pub async fn run(self, generation: u64, tx: StreamSender, cancel: CancellationToken) {
        let mut session = Session {
            generation,
            tx,
            last_event_id: None,
            retry_delay: self.retry_delay,
        };

        loop {
            let outcome = tokio::select! {
                () = cancel.cancelled() => return,
                outcome = self.stream_once(&mut session) => outcome,
            };

            let error = match outcome {
                Ok(()) => TransportError::transient("stream ended by server"),
                Err(error) => error,
            };
            let terminal = error.is_terminal();
            tracing::debug!(generation, %error, "event source error");
            if !session.emit(StreamEvent::Error(error)) || terminal {
                return;
            }

            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(session.retry_delay) => {}
            }
        }
    }

    async fn stream_once(&self, session: &mut Session) -> Result<(), TransportError> {
        let mut request = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = &session.last_event_id {
            request = request.header("Last-Event-ID", id.as_str());
        }

        let response = request.send().await.map_err(|err| {
            if err.is_builder() {
                TransportError::terminal(format!("invalid request: {err}"))
            } else {
                TransportError::transient(format!("connection failed: {err}"))
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::terminal(format!(
                "unexpected HTTP status {status}"
            )));
        }
        if !is_event_stream(&response) {
            return Err(TransportError::terminal(
                "response is not text/event-stream",
            ));
        }

        tracing::info!(generation = session.generation, url = %self.url, "event source open");
        if !session.emit(StreamEvent::Opened) {
            return Ok(());
        }

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event =
                event.map_err(|e| TransportError::transient(format!("SSE stream error: {e}")))?;
            if let Some(retry) = event.retry {
                session.retry_delay = retry;
            }
            if !event.id.is_empty() {
                session.last_event_id = Some(event.id.clone());
            }
            if event.event != "message" {
                continue;
            }
            if !session.emit(StreamEvent::Message(event.data)) {
                return Ok(());
            }
        }

        Ok(())
    }
}

struct Session {
    generation: u64,
    tx: StreamSender,
    last_event_id: Option<String>,
    retry_delay: Duration,
}

impl Session {
    /// Returns false once the receiving side is gone.
    fn emit(&self, event: StreamEvent) -> bool {
        self.tx
            .send(StreamMessage {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("text/event-stream")
        })
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn sse_body(frames: &[&str]) -> String {
        frames
            .iter()
            .map(|frame| {
                let data: String = frame.lines().map(|line| format!("data: {line}\n")).collect();
                format!("{data}\n")
            })
            .collect()
    }

    async fn recv(rx: &mut StreamReceiver) -> StreamMessage {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for stream event")
            .expect("stream channel closed")
    }

    #[tokio::test]
    async fn test_open_then_messages_then_transient_end() {
        let server = MockServer::start().await;
        let body = sse_body(&["execution_create\n1\nNightly", "execution_destroy\n1"]);
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(header("accept", "text/event-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/events", server.uri())).unwrap();
        let source = EventSource::new(url, Duration::from_secs(60)).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = source.spawn(7, tx);

        assert_eq!(recv(&mut rx).await.event, StreamEvent::Opened);
        let first = recv(&mut rx).await;
        assert_eq!(first.generation, 7);
        assert_eq!(
            first.event,
            StreamEvent::Message("execution_create\n1\nNightly".to_string())
        );
        assert_eq!(
            recv(&mut rx).await.event,
            StreamEvent::Message("execution_destroy\n1".to_string())
        );
        match recv(&mut rx).await.event {
            StreamEvent::Error(err) => assert_eq!(err.kind, TransportErrorKind::Transient),
            other => panic!("expected transient error, got {other:?}"),
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_http_error_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let source = EventSource::new(url, DEFAULT_RETRY_DELAY).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _cancel = source.spawn(1, tx);

        match recv(&mut rx).await.event {
            StreamEvent::Error(err) => {
                assert!(err.is_terminal());
                assert!(err.message.contains("503"));
            }
            other => panic!("expected terminal error, got {other:?}"),
        }
        // Terminal errors end the task, which drops the sender.
        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("hello", "text/plain"))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let source = EventSource::new(url, DEFAULT_RETRY_DELAY).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _cancel = source.spawn(1, tx);

        match recv(&mut rx).await.event {
            StreamEvent::Error(err) => assert!(err.is_terminal()),
            other => panic!("expected terminal error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_stops_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let source = EventSource::new(url, Duration::from_secs(60)).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = source.spawn(3, tx);

        assert_eq!(recv(&mut rx).await.event, StreamEvent::Opened);
        assert!(matches!(recv(&mut rx).await.event, StreamEvent::Error(_)));
        cancel.cancel();
        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::terminal("unexpected HTTP status 404 Not Found");
        assert_eq!(
            err.to_string(),
            "terminal connection error: unexpected HTTP status 404 Not Found"
        );
    }
}
