//! A watch connection that survives disconnects.
//!
//! One task per stream runs the state machine
//! `Connecting → Open → ClosedExpected | ClosedUnexpected → Connecting ...`
//! until it is cancelled. After an unexpected close it sleeps a fixed delay
//! and opens a fresh connection; there is no retry limit.

use kwatch_http::client::{DecodeMode, Payload, SocketEvent};
use kwatch_http::{ApiClient, ConnectionId};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Hook = Arc<dyn Fn() + Send + Sync + 'static>;

/// Lifecycle of a [`ReconnectingStream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Open,
    /// Closed by us, on the way to `Cancelled`.
    ClosedExpected,
    /// Closed by the peer or the transport; a reconnect follows unless
    /// reconnection is disabled.
    ClosedUnexpected,
    Cancelled,
}

/// Per-stream options.
#[derive(Clone)]
pub struct StreamOptions {
    pub decode: DecodeMode,
    pub extra_protocols: Vec<String>,
    pub reconnect_on_failure: bool,
    /// Overrides `ClientConfig::reconnect_delay_ms`.
    pub reconnect_delay: Option<Duration>,
    on_connect: Option<Hook>,
    on_failure: Option<Hook>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            decode: DecodeMode::Json,
            extra_protocols: Vec::new(),
            reconnect_on_failure: true,
            reconnect_delay: None,
            on_connect: None,
            on_failure: None,
        }
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("decode", &self.decode)
            .field("extra_protocols", &self.extra_protocols)
            .field("reconnect_on_failure", &self.reconnect_on_failure)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("on_connect", &self.on_connect.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

impl StreamOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_decode(mut self, decode: DecodeMode) -> Self {
        self.decode = decode;
        self
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.extra_protocols.push(protocol.into());
        self
    }

    #[must_use]
    pub fn with_reconnect_on_failure(mut self, reconnect: bool) -> Self {
        self.reconnect_on_failure = reconnect;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Runs before every connection attempt.
    #[must_use]
    pub fn on_connect(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(hook));
        self
    }

    /// Runs after every unexpected close, before the reconnect is scheduled.
    #[must_use]
    pub fn on_failure(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(hook));
        self
    }
}

struct Shared {
    cancelled: AtomicBool,
    /// Held around each `on_message` call and while `cancelled` is set.
    gate: ReentrantMutex<()>,
    token: CancellationToken,
    state: Mutex<StreamState>,
    handle: Mutex<Option<ConnectionId>>,
    attempts: AtomicU64,
}

impl Shared {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: StreamState) {
        *self.state.lock() = state;
    }
}

/// Handle to a running stream. Dropping it does not stop the stream.
pub struct ReconnectingStream {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl ReconnectingStream {
    /// Spawn the stream task and start connecting to `path` right away.
    ///
    /// `on_message` runs on the stream task, once per decoded frame, in
    /// arrival order, and never after [`ReconnectingStream::cancel`] returns.
    pub fn start<F>(
        api: ApiClient,
        path: impl Into<String>,
        on_message: F,
        options: StreamOptions,
    ) -> Self
    where
        F: FnMut(Payload) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            cancelled: AtomicBool::new(false),
            gate: ReentrantMutex::new(()),
            token: CancellationToken::new(),
            state: Mutex::new(StreamState::Connecting),
            handle: Mutex::new(None),
            attempts: AtomicU64::new(0),
        });
        let task = tokio::spawn(run(api, path.into(), on_message, options, shared.clone()));
        ReconnectingStream { shared, task }
    }

    /// Stop the stream. Idempotent. Waits for an `on_message` call running
    /// on another thread; may be called from inside `on_message`.
    pub fn cancel(&self) {
        {
            let _gate = self.shared.gate.lock();
            if self.shared.cancelled.swap(true, Ordering::SeqCst) {
                return;
            }
        }
        self.shared.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Id of the live connection; `None` while connecting or closed.
    pub fn current_handle(&self) -> Option<ConnectionId> {
        *self.shared.handle.lock()
    }

    pub fn state(&self) -> StreamState {
        *self.shared.state.lock()
    }

    /// Number of connection attempts so far, including the first one.
    pub fn connection_attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// True once the stream task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl std::fmt::Debug for ReconnectingStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingStream")
            .field("state", &self.state())
            .field("handle", &self.current_handle())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

fn deliver<F: FnMut(Payload)>(shared: &Shared, on_message: &mut F, payload: Payload) {
    let _gate = shared.gate.lock();
    if !shared.is_cancelled() {
        on_message(payload);
    }
}

async fn run<F>(
    api: ApiClient,
    path: String,
    mut on_message: F,
    options: StreamOptions,
    shared: Arc<Shared>,
) where
    F: FnMut(Payload) + Send + 'static,
{
    let delay = options
        .reconnect_delay
        .unwrap_or_else(|| api.config().reconnect_delay());

    'connect: loop {
        if shared.is_cancelled() {
            break;
        }
        shared.set_state(StreamState::Connecting);
        shared.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &options.on_connect {
            hook();
        }

        let opened = tokio::select! {
            biased;
            _ = shared.token.cancelled() => break 'connect,
            res = api.open_socket(&path, options.decode, &options.extra_protocols) => res,
        };

        match opened {
            Ok(mut socket) => {
                *shared.handle.lock() = Some(socket.handle());
                shared.set_state(StreamState::Open);
                tracing::debug!(path = %path, connection = %socket.handle(), "Watch stream open");

                loop {
                    tokio::select! {
                        biased;
                        _ = shared.token.cancelled() => {
                            socket.close();
                            *shared.handle.lock() = None;
                            shared.set_state(StreamState::ClosedExpected);
                            break 'connect;
                        }
                        event = socket.next() => match event {
                            Some(SocketEvent::Message(payload)) => {
                                deliver(&shared, &mut on_message, payload);
                            }
                            Some(SocketEvent::Failed) | None => break,
                        }
                    }
                }
                *shared.handle.lock() = None;
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to open watch stream");
            }
        }

        shared.set_state(StreamState::ClosedUnexpected);
        if shared.is_cancelled() {
            break;
        }
        if let Some(hook) = &options.on_failure {
            hook();
        }
        if !options.reconnect_on_failure {
            tracing::debug!(path = %path, "Reconnect disabled, stream ends");
            return;
        }

        tokio::select! {
            biased;
            _ = shared.token.cancelled() => break 'connect,
            _ = tokio::time::sleep(delay) => {}
        }
        if shared.is_cancelled() {
            break;
        }
        tracing::info!(path = %path, delay_ms = delay.as_millis() as u64, "Reconnecting");
    }

    shared.set_state(StreamState::Cancelled);
    tracing::debug!(path = %path, "Watch stream cancelled");
}
