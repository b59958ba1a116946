use std::sync::Arc;

use futures::{stream::SplitStream, StreamExt};
use shared::{
    error::ProtocolError,
    protocol::{Command, Envelope, ServerEvent},
};
use tokio::{
    net::TcpStream,
    sync::{broadcast, Mutex},
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

pub mod error;
pub mod log;
pub mod state;
pub mod transport;

pub use error::SessionError;
pub use log::{Autoscroll, LogBuffer, ScrollMetrics};
pub use state::{format_elapsed, PanelState};
pub use transport::Transport;

use transport::WsTransport;

/// Websocket route the controller serves the panel on, relative to its
/// HTTP origin.
pub const BOT_PANEL_WS_PATH: &str = "/api/bot_panel/bot_panel_ws";

/// Channel lifecycle. `Closed` is terminal: there is no retry and no path
/// back to `Connecting` within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closed,
}

/// Notification to the presentation layer. Lossy by design: a slow
/// subscriber misses notifications, not state — snapshots are re-read.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    /// A log entry was appended; carries the formatted entry text.
    LogAppended(String),
    /// One or more display fields or the task list changed.
    StateChanged,
    /// The channel reached its terminal state.
    ChannelClosed,
}

struct SessionInner {
    channel: ChannelState,
    transport: Option<Box<dyn Transport>>,
    state: PanelState,
    log: LogBuffer,
}

/// One panel session: owns the channel, the display state and the log.
/// Construct on view mount, drop on unmount. All inbound frames are
/// applied in arrival order under the session lock; commands are
/// fire-and-forget and never mutate the store locally — the controller
/// echoes every effect back as a `get_*` event.
pub struct PanelSession {
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<PanelEvent>,
}

type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

impl PanelSession {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            inner: Mutex::new(SessionInner {
                channel: ChannelState::Disconnected,
                transport: None,
                state: PanelState::default(),
                log: LogBuffer::default(),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    pub async fn channel_state(&self) -> ChannelState {
        self.inner.lock().await.channel
    }

    pub async fn state(&self) -> PanelState {
        self.inner.lock().await.state.clone()
    }

    pub async fn log_text(&self) -> String {
        self.inner.lock().await.log.text().to_string()
    }

    /// Open the panel channel against the controller's HTTP origin and
    /// start the read loop. The scheme follows the origin's transport
    /// security (`https` origins get `wss`).
    pub async fn connect(self: &Arc<Self>, server_url: &str) -> Result<(), SessionError> {
        let ws_url = panel_ws_url(server_url)?;
        {
            let mut guard = self.inner.lock().await;
            if guard.channel != ChannelState::Disconnected {
                return Err(SessionError::AlreadyConnected);
            }
            guard.channel = ChannelState::Connecting;
        }

        info!(url = %ws_url, "connecting panel channel");
        let (ws_stream, _) = match connect_async(&ws_url).await {
            Ok(ok) => ok,
            Err(err) => {
                {
                    let mut guard = self.inner.lock().await;
                    guard.channel = ChannelState::Closed;
                    self.append_log(&mut guard, &format!("Connection Error: {err}"));
                }
                let _ = self.events.send(PanelEvent::ChannelClosed);
                return Err(SessionError::Connect(err));
            }
        };

        let (sink, reader) = ws_stream.split();
        {
            let mut guard = self.inner.lock().await;
            self.install_transport(&mut guard, Box::new(WsTransport::new(sink)));
        }

        let session = Arc::clone(self);
        tokio::spawn(async move { session.read_loop(reader).await });
        Ok(())
    }

    /// Attach an already-established transport and mark the channel open.
    /// `connect` does this with the tungstenite sink; alternate transports
    /// use it directly.
    pub async fn attach_transport(&self, transport: Box<dyn Transport>) -> Result<(), SessionError> {
        let mut guard = self.inner.lock().await;
        if guard.channel != ChannelState::Disconnected {
            return Err(SessionError::AlreadyConnected);
        }
        self.install_transport(&mut guard, transport);
        Ok(())
    }

    /// Drop the transport and mark the channel closed. Part of session
    /// teardown; inbound processing stops when the read task sees the
    /// stream end.
    pub async fn close(&self) {
        self.close_channel("Disconnected from Server").await;
    }

    fn install_transport(&self, inner: &mut SessionInner, transport: Box<dyn Transport>) {
        inner.transport = Some(transport);
        inner.channel = ChannelState::Open;
        self.append_log(inner, "Connected to Server");
    }

    fn append_log(&self, inner: &mut SessionInner, message: &str) {
        let entry = inner.log.push(message);
        let _ = self.events.send(PanelEvent::LogAppended(entry));
    }

    async fn close_channel(&self, message: &str) {
        {
            let mut guard = self.inner.lock().await;
            if guard.channel == ChannelState::Closed {
                return;
            }
            guard.channel = ChannelState::Closed;
            guard.transport = None;
            self.append_log(&mut guard, message);
        }
        let _ = self.events.send(PanelEvent::ChannelClosed);
    }

    async fn read_loop(self: Arc<Self>, mut reader: WsReader) {
        while let Some(message) = reader.next().await {
            match message {
                Ok(Message::Text(text)) => self.handle_frame(&text).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(%err, "panel channel receive failed");
                    self.close_channel(&format!("Connection Error: {err}")).await;
                    return;
                }
            }
        }
        self.close_channel("Disconnected from Server").await;
    }

    /// One inbound frame, one handler. Malformed frames and unknown
    /// actions are logged and dropped without touching the store.
    async fn handle_frame(&self, text: &str) {
        let envelope = match Envelope::from_text(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.log_frame_error(&err, text).await;
                return;
            }
        };

        match ServerEvent::from_envelope(envelope) {
            Ok(event) => self.dispatch(event).await,
            Err(ProtocolError::UnknownAction { action }) => {
                let mut guard = self.inner.lock().await;
                self.append_log(&mut guard, &format!("Unknown action: {action}"));
            }
            Err(err) => self.log_frame_error(&err, text).await,
        }
    }

    async fn log_frame_error(&self, err: &ProtocolError, raw: &str) {
        let reason = match err {
            ProtocolError::Malformed { source } => source.to_string(),
            other => other.to_string(),
        };
        let mut guard = self.inner.lock().await;
        self.append_log(
            &mut guard,
            &format!("Error parsing JSON: {reason} | Raw data: {raw}"),
        );
    }

    async fn dispatch(&self, event: ServerEvent) {
        let mut guard = self.inner.lock().await;
        match event {
            // Log lines go to the buffer, not the field store.
            ServerEvent::Log(message) => {
                self.append_log(&mut guard, &message);
                return;
            }
            ServerEvent::Timer(seconds) => guard.state.timer_seconds = Some(seconds),
            ServerEvent::NumWorkers(count) => guard.state.num_workers = Some(count),
            ServerEvent::Process(flag) => guard.state.in_process = Some(flag),
            // Wire value is zero-based; the panel displays one-based.
            ServerEvent::SchedulerInterval(interval) => {
                guard.state.scheduler_interval = Some(interval + 1)
            }
            ServerEvent::PauseTimer(flag) => guard.state.pause_timer = Some(flag),
            ServerEvent::VerboseLog(flag) => guard.state.verbose_log = Some(flag),
            ServerEvent::SaveJsonDb(flag) => guard.state.save_json_db = Some(flag),
            ServerEvent::SaveJsonFile(flag) => guard.state.save_json_file = Some(flag),
            ServerEvent::NumTask(Some(task)) => guard.state.upsert_task(task),
            // A null task record carries nothing to reconcile.
            ServerEvent::NumTask(None) => return,
        }
        drop(guard);
        let _ = self.events.send(PanelEvent::StateChanged);
    }

    /// Send a command if the channel is open; otherwise silently no-op.
    /// A sink-level failure is terminal for the channel.
    pub async fn send_command(&self, command: Command) {
        let mut guard = self.inner.lock().await;
        if guard.channel != ChannelState::Open {
            return;
        }
        let frame = match command.to_text() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "failed to encode command");
                return;
            }
        };
        let Some(transport) = guard.transport.as_mut() else {
            return;
        };
        if let Err(err) = transport.send_text(frame).await {
            warn!(%err, "panel channel send failed");
            guard.channel = ChannelState::Closed;
            guard.transport = None;
            self.append_log(&mut guard, &format!("Connection Error: {err}"));
            drop(guard);
            let _ = self.events.send(PanelEvent::ChannelClosed);
        }
    }

    pub async fn add_worker(&self) {
        self.send_command(Command::AddWorker).await;
    }

    pub async fn remove_worker(&self) {
        self.send_command(Command::RemoveWorker).await;
    }

    pub async fn set_process(&self, reset_session: bool) {
        self.send_command(Command::SetProcess { reset_session }).await;
    }

    /// Validate the operator's displayed interval before converting it to
    /// the zero-based wire value. Invalid input is rejected locally with a
    /// log entry and nothing is sent.
    pub async fn set_scheduler_interval(&self, displayed: f64) {
        if !displayed.is_finite() || displayed < 1.0 {
            let mut guard = self.inner.lock().await;
            self.append_log(
                &mut guard,
                "Please enter a valid number greater than or equal to 1!",
            );
            return;
        }
        let interval = displayed as u64 - 1;
        self.send_command(Command::SetSchedulerInterval { interval }).await;
    }

    pub async fn set_pause_timer(&self) {
        self.send_command(Command::SetPauseTimer).await;
    }

    pub async fn set_verbose_log(&self) {
        self.send_command(Command::SetVerboseLog).await;
    }

    pub async fn set_tasks(&self) {
        self.send_command(Command::SetTasks).await;
    }

    pub async fn set_save_json_db(&self) {
        self.send_command(Command::SetSaveJsonDb).await;
    }

    pub async fn set_save_json_file(&self) {
        self.send_command(Command::SetSaveJsonFile).await;
    }

    pub async fn import_geos_from_csv(&self) {
        self.send_command(Command::ImportGeosFromCsv).await;
    }
}

fn panel_ws_url(server_url: &str) -> Result<String, SessionError> {
    let base = if let Some(rest) = server_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = server_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(SessionError::InvalidServerUrl);
    };
    Ok(format!("{}{BOT_PANEL_WS_PATH}", base.trim_end_matches('/')))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
