//! # Task Status Channel
//!
//! Live status of one server-side task over a WebSocket, with automatic
//! reconnection.
//!
//! ## Lifecycle
//!
//! `connect(task_id)` spawns a driver task that owns the transport. The
//! driver walks the [`ChannelState`] table: it reconnects after a fixed delay
//! when the transport drops before a terminal status, and stops for good
//! once the task completes or fails. `disconnect()` stops the driver, which
//! cancels any pending retry and closes the live transport.
//!
//! At most one driver (and so one transport) exists per channel; connecting
//! again tears the previous one down first.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procurement_offline::client::config::Config;
//! use procurement_offline::client::task_status::{ChannelHandlers, TaskStatusChannel, WsConnector};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let handlers = ChannelHandlers::new()
//!     .on_status_change(|frame| println!("{}: {}%", frame.status.label(), frame.progress))
//!     .on_complete(|frame| println!("done: {:?}", frame.data));
//! let mut channel = TaskStatusChannel::new(&Config::new(), Arc::new(WsConnector), handlers);
//! channel.connect("task-42").await;
//! // ...
//! channel.disconnect().await;
//! # }
//! ```

pub mod state;
pub mod transport;

pub use state::{ChannelEvent, ChannelState};
pub use transport::{Connector, FrameStream, WsConnector};

use crate::client::config::Config;
use crate::shared::config::AppConfig;
use crate::shared::error::TransportError;
use crate::shared::frame::{ClientCommand, TaskStatusFrame};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use url::Url;

pub type FrameHandler = Arc<dyn Fn(&TaskStatusFrame) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Callbacks invoked from the driver task
#[derive(Clone, Default)]
pub struct ChannelHandlers {
    on_status_change: Option<FrameHandler>,
    on_complete: Option<FrameHandler>,
    on_error: Option<ErrorHandler>,
}

impl ChannelHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every parsed frame, terminal ones included
    pub fn on_status_change(mut self, f: impl Fn(&TaskStatusFrame) + Send + Sync + 'static) -> Self {
        self.on_status_change = Some(Arc::new(f));
        self
    }

    /// The `completed` frame only
    pub fn on_complete(mut self, f: impl Fn(&TaskStatusFrame) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    /// Transport errors
    pub fn on_error(mut self, f: impl Fn(&TransportError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for ChannelHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandlers")
            .field("on_status_change", &self.on_status_change.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Reconnect behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    pub auto_reconnect: bool,
    pub reconnect_interval: Duration,
    pub handshake_timeout: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ChannelOptions {
    fn from(app: &AppConfig) -> Self {
        Self {
            auto_reconnect: app.auto_reconnect,
            reconnect_interval: app.reconnect_interval,
            handshake_timeout: app.handshake_timeout,
        }
    }
}

/// State shared between the channel handle and its driver
struct Shared {
    state: watch::Sender<ChannelState>,
    last_frame: Mutex<Option<TaskStatusFrame>>,
    last_error: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Driver {
    shutdown: oneshot::Sender<()>,
    outbound: mpsc::UnboundedSender<String>,
    handle: JoinHandle<()>,
}

/// Per-task status channel
pub struct TaskStatusChannel {
    config: Config,
    options: ChannelOptions,
    connector: Arc<dyn Connector>,
    handlers: ChannelHandlers,
    shared: Arc<Shared>,
    driver: Option<Driver>,
}

impl std::fmt::Debug for TaskStatusChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStatusChannel")
            .field("state", &self.state())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TaskStatusChannel {
    pub fn new(config: &Config, connector: Arc<dyn Connector>, handlers: ChannelHandlers) -> Self {
        let (state, _) = watch::channel(ChannelState::Idle);
        Self {
            options: ChannelOptions::from(config.app()),
            config: config.clone(),
            connector,
            handlers,
            shared: Arc::new(Shared {
                state,
                last_frame: Mutex::new(None),
                last_error: Mutex::new(None),
            }),
            driver: None,
        }
    }

    pub fn with_options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ChannelOptions {
        self.options
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    /// Receiver observing every state change
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Open
    }

    pub fn last_frame(&self) -> Option<TaskStatusFrame> {
        lock(&self.shared.last_frame).clone()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    /// Open a channel for `task_id`, replacing any existing one
    pub async fn connect(&mut self, task_id: &str) {
        self.stop_driver().await;
        *lock(&self.shared.last_frame) = None;
        *lock(&self.shared.last_error) = None;

        let context = DriverContext {
            options: self.options,
            connector: Arc::clone(&self.connector),
            handlers: self.handlers.clone(),
            shared: Arc::clone(&self.shared),
        };
        context.transition(ChannelEvent::Connect);

        let url = match self.config.task_ws_url(task_id) {
            Ok(url) => url,
            Err(e) => {
                context.fail(&e);
                return;
            }
        };

        tracing::info!(task_id, url = %url, "connecting task status channel");
        let (shutdown, shutdown_rx) = oneshot::channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(context.run(url, shutdown_rx, outbound_rx));
        self.driver = Some(Driver {
            shutdown,
            outbound,
            handle,
        });
    }

    /// Close the channel from any state
    pub async fn disconnect(&mut self) {
        self.stop_driver().await;
        self.shared
            .state
            .send_modify(|state| *state = state.next(ChannelEvent::Disconnect, false));
    }

    async fn stop_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            let _ = driver.shutdown.send(());
            if let Err(e) = driver.handle.await {
                if e.is_panic() {
                    tracing::error!("task status driver panicked: {}", e);
                }
            }
        }
    }

    /// Send a JSON message while the channel is open
    ///
    /// Returns false, and drops the message, in any other state.
    pub fn send(&self, message: &Value) -> bool {
        if !self.is_connected() {
            tracing::debug!(state = %self.state(), "dropping outbound message");
            return false;
        }
        let Some(driver) = &self.driver else {
            return false;
        };
        driver.outbound.send(message.to_string()).is_ok()
    }

    fn send_command(&self, command: ClientCommand) -> bool {
        match serde_json::to_value(command) {
            Ok(value) => self.send(&value),
            Err(e) => {
                tracing::error!("cannot encode client command: {}", e);
                false
            }
        }
    }

    pub fn ping(&self) -> bool {
        self.send_command(ClientCommand::Ping)
    }

    pub fn start_demo(&self) -> bool {
        self.send_command(ClientCommand::StartDemo)
    }
}

impl Drop for TaskStatusChannel {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.handle.abort();
        }
    }
}

/// How the open phase of one transport ended
enum OpenOutcome {
    Terminal,
    Dropped,
    Shutdown,
}

struct DriverContext {
    options: ChannelOptions,
    connector: Arc<dyn Connector>,
    handlers: ChannelHandlers,
    shared: Arc<Shared>,
}

impl DriverContext {
    fn transition(&self, event: ChannelEvent) -> ChannelState {
        let auto_reconnect = self.options.auto_reconnect;
        let mut next = ChannelState::Idle;
        self.shared.state.send_if_modified(|state| {
            next = state.next(event, auto_reconnect);
            if next == *state {
                return false;
            }
            tracing::debug!(from = %state, to = %next, "channel state change");
            *state = next;
            true
        });
        next
    }

    fn report(&self, error: &TransportError) {
        tracing::warn!("task status transport: {}", error);
        *lock(&self.shared.last_error) = Some(error.to_string());
        if let Some(on_error) = &self.handlers.on_error {
            on_error(error);
        }
    }

    fn fail(&self, error: &TransportError) {
        self.report(error);
        self.transition(ChannelEvent::HandshakeFailed {
            recoverable: error.is_recoverable(),
        });
    }

    fn deliver(&self, frame: &TaskStatusFrame) {
        *lock(&self.shared.last_frame) = Some(frame.clone());
        if let Some(on_status_change) = &self.handlers.on_status_change {
            on_status_change(frame);
        }
        if frame.is_completed() {
            if let Some(on_complete) = &self.handlers.on_complete {
                on_complete(frame);
            }
        }
    }

    async fn run(
        self,
        url: Url,
        mut shutdown: oneshot::Receiver<()>,
        mut outbound: mpsc::UnboundedReceiver<String>,
    ) {
        loop {
            let attempt = tokio::select! {
                _ = &mut shutdown => return,
                result = tokio::time::timeout(self.options.handshake_timeout, self.connector.connect(&url)) => {
                    result.unwrap_or(Err(TransportError::HandshakeTimeout(self.options.handshake_timeout)))
                }
            };

            let next = match attempt {
                Ok(mut stream) => {
                    self.transition(ChannelEvent::HandshakeSucceeded);
                    tracing::info!(url = %url, "task status channel open");
                    let outcome = self.pump(&mut *stream, &mut shutdown, &mut outbound).await;
                    stream.close().await;
                    match outcome {
                        OpenOutcome::Shutdown => return,
                        OpenOutcome::Terminal => self.transition(ChannelEvent::TerminalFrame),
                        OpenOutcome::Dropped => {
                            let terminal_seen = lock(&self.shared.last_frame)
                                .as_ref()
                                .is_some_and(|frame| frame.status.is_terminal());
                            self.transition(ChannelEvent::TransportClosed { terminal_seen })
                        }
                    }
                }
                Err(e) => {
                    self.fail(&e);
                    self.state()
                }
            };

            if next != ChannelState::Reconnecting {
                tracing::info!(state = %next, "task status channel stopped");
                return;
            }

            tracing::info!(
                delay_ms = self.options.reconnect_interval.as_millis() as u64,
                "scheduling reconnect"
            );
            tokio::select! {
                _ = &mut shutdown => return,
                _ = tokio::time::sleep(self.options.reconnect_interval) => {
                    self.transition(ChannelEvent::RetryDue);
                }
            }
        }
    }

    fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    /// Read frames and forward outbound messages until the transport ends
    async fn pump(
        &self,
        stream: &mut dyn FrameStream,
        shutdown: &mut oneshot::Receiver<()>,
        outbound: &mut mpsc::UnboundedReceiver<String>,
    ) -> OpenOutcome {
        loop {
            tokio::select! {
                _ = &mut *shutdown => return OpenOutcome::Shutdown,
                Some(text) = outbound.recv() => {
                    if let Err(e) = stream.send_text(text).await {
                        tracing::warn!("cannot send on task status channel: {}", e);
                    }
                }
                incoming = stream.next_text() => match incoming {
                    Some(Ok(text)) => match TaskStatusFrame::parse(&text) {
                        Ok(frame) => {
                            tracing::debug!(task_id = %frame.task_id, status = %frame.status, progress = frame.progress, "status frame");
                            self.deliver(&frame);
                            if frame.status.is_terminal() {
                                return OpenOutcome::Terminal;
                            }
                        }
                        Err(e) => tracing::warn!(raw = %e.raw, "dropping frame: {}", e),
                    },
                    Some(Err(e)) => {
                        self.report(&e);
                        return OpenOutcome::Dropped;
                    }
                    None => return OpenOutcome::Dropped,
                },
            }
        }
    }
}
