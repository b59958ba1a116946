use super::*;

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use shared::domain::TaskProgress;
use tokio::{net::TcpListener, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingTransport {
    frames: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&mut self, frame: String) -> anyhow::Result<()> {
        if self.fail {
            return Err(anyhow!("sink closed"));
        }
        self.frames.lock().await.push(frame);
        Ok(())
    }
}

async fn open_session() -> (Arc<PanelSession>, Arc<Mutex<Vec<String>>>) {
    let session = PanelSession::new();
    let transport = RecordingTransport::default();
    let frames = Arc::clone(&transport.frames);
    session
        .attach_transport(Box::new(transport))
        .await
        .expect("fresh session must accept a transport");
    (session, frames)
}

async fn feed(session: &PanelSession, event: ServerEvent) {
    let frame = event.into_envelope().to_text().unwrap();
    session.handle_frame(&frame).await;
}

async fn log_entries(session: &PanelSession) -> u64 {
    session.inner.lock().await.log.entries()
}

#[tokio::test]
async fn snapshot_populates_every_field() {
    let (session, _) = open_session().await;
    assert_eq!(session.state().await, PanelState::default());

    feed(&session, ServerEvent::Timer(65)).await;
    feed(&session, ServerEvent::NumWorkers(2)).await;
    feed(&session, ServerEvent::Process(false)).await;
    feed(&session, ServerEvent::SchedulerInterval(0)).await;
    feed(&session, ServerEvent::PauseTimer(false)).await;
    feed(&session, ServerEvent::VerboseLog(true)).await;
    feed(&session, ServerEvent::SaveJsonDb(false)).await;
    feed(&session, ServerEvent::SaveJsonFile(true)).await;
    feed(&session, ServerEvent::NumTask(Some(TaskProgress::new("IT", "0/10")))).await;

    let state = session.state().await;
    assert_eq!(state.timer_seconds, Some(65));
    assert_eq!(state.formatted_timer().as_deref(), Some("00:01:05"));
    assert_eq!(state.num_workers, Some(2));
    assert_eq!(state.in_process, Some(false));
    // Wire value 0 displays as 1.
    assert_eq!(state.scheduler_interval, Some(1));
    assert_eq!(state.pause_timer, Some(false));
    assert_eq!(state.verbose_log, Some(true));
    assert_eq!(state.save_json_db, Some(false));
    assert_eq!(state.save_json_file, Some(true));
    assert_eq!(state.tasks, [TaskProgress::new("IT", "0/10")]);
}

#[tokio::test]
async fn settings_apply_only_via_controller_echo() {
    let (session, frames) = open_session().await;

    session.set_verbose_log().await;
    assert_eq!(
        frames.lock().await.as_slice(),
        [r#"{"action":"set_verbose_log","data":null}"#]
    );
    assert_eq!(session.state().await.verbose_log, None);

    feed(&session, ServerEvent::VerboseLog(true)).await;
    assert_eq!(session.state().await.verbose_log, Some(true));
}

#[tokio::test]
async fn scheduler_interval_is_sent_zero_based() {
    let (session, frames) = open_session().await;
    session.set_scheduler_interval(5.0).await;
    assert_eq!(
        frames.lock().await.as_slice(),
        [r#"{"action":"set_scheduler_interval","data":4}"#]
    );
}

#[tokio::test]
async fn invalid_scheduler_interval_is_rejected_locally() {
    let (session, frames) = open_session().await;
    let before = log_entries(&session).await;

    for input in [0.0, -3.0, f64::NAN, f64::INFINITY] {
        session.set_scheduler_interval(input).await;
    }

    assert!(frames.lock().await.is_empty());
    assert_eq!(log_entries(&session).await, before + 4);
    assert!(session
        .log_text()
        .await
        .contains("Please enter a valid number greater than or equal to 1!"));
}

#[tokio::test]
async fn task_records_upsert_by_id() {
    let (session, _) = open_session().await;

    feed(&session, ServerEvent::NumTask(Some(TaskProgress::new("DE", "0/55")))).await;
    feed(&session, ServerEvent::NumTask(Some(TaskProgress::new("IT", "0/10")))).await;
    feed(&session, ServerEvent::NumTask(Some(TaskProgress::new("IT", "7/10")))).await;

    let entries_before_null = log_entries(&session).await;
    feed(&session, ServerEvent::NumTask(None)).await;

    let state = session.state().await;
    let ids: Vec<&str> = state.tasks.iter().map(|t| t.id.0.as_str()).collect();
    assert_eq!(ids, ["DE", "IT"]);
    assert_eq!(state.tasks[1].progress.as_deref(), Some("7/10"));
    // The null record is a no-op, not an error.
    assert_eq!(log_entries(&session).await, entries_before_null);
}

#[tokio::test]
async fn unknown_action_logs_once_and_mutates_nothing() {
    let (session, _) = open_session().await;
    let before = log_entries(&session).await;

    session
        .handle_frame(r#"{"action":"get_unicorn","data":1}"#)
        .await;

    assert_eq!(log_entries(&session).await, before + 1);
    assert!(session.log_text().await.contains("Unknown action: get_unicorn"));
    assert_eq!(session.state().await, PanelState::default());
}

#[tokio::test]
async fn malformed_frame_logs_the_raw_text() {
    let (session, _) = open_session().await;
    let before = log_entries(&session).await;

    session.handle_frame("{not json").await;

    assert_eq!(log_entries(&session).await, before + 1);
    let log = session.log_text().await;
    assert!(log.contains("Error parsing JSON:"));
    assert!(log.contains("Raw data: {not json"));
    assert_eq!(session.state().await, PanelState::default());
}

#[tokio::test]
async fn mismatched_payload_is_dropped() {
    let (session, _) = open_session().await;
    let before = log_entries(&session).await;

    session
        .handle_frame(r#"{"action":"get_timer","data":"soon"}"#)
        .await;

    assert_eq!(log_entries(&session).await, before + 1);
    assert_eq!(session.state().await, PanelState::default());
}

#[tokio::test]
async fn log_events_are_timestamped() {
    let (session, _) = open_session().await;
    feed(&session, ServerEvent::Log("worker started".into())).await;

    let log = session.log_text().await;
    let last = log.lines().last().expect("log must not be empty");
    assert!(last.starts_with('['));
    assert!(last.ends_with("] worker started"));
}

#[tokio::test]
async fn emission_is_a_noop_after_close() {
    let (session, frames) = open_session().await;
    session.close().await;
    assert_eq!(session.channel_state().await, ChannelState::Closed);

    session.add_worker().await;
    session.set_scheduler_interval(5.0).await;

    assert!(frames.lock().await.is_empty());
    assert!(session.log_text().await.contains("Disconnected from Server"));
}

#[tokio::test]
async fn emission_is_a_noop_before_connect() {
    let session = PanelSession::new();
    session.add_worker().await;
    assert_eq!(session.channel_state().await, ChannelState::Disconnected);
    assert_eq!(session.log_text().await, "");
}

#[tokio::test]
async fn send_failure_is_terminal() {
    let session = PanelSession::new();
    let transport = RecordingTransport {
        frames: Arc::new(Mutex::new(Vec::new())),
        fail: true,
    };
    session.attach_transport(Box::new(transport)).await.unwrap();

    session.add_worker().await;

    assert_eq!(session.channel_state().await, ChannelState::Closed);
    assert!(session.log_text().await.contains("Connection Error"));
}

#[tokio::test]
async fn second_transport_is_rejected() {
    let (session, _) = open_session().await;
    let err = session
        .attach_transport(Box::new(RecordingTransport::default()))
        .await;
    assert!(matches!(err, Err(SessionError::AlreadyConnected)));
}

#[test]
fn ws_url_follows_origin_scheme() {
    assert_eq!(
        panel_ws_url("http://host:8000").unwrap(),
        "ws://host:8000/api/bot_panel/bot_panel_ws"
    );
    assert_eq!(
        panel_ws_url("https://host/").unwrap(),
        "wss://host/api/bot_panel/bot_panel_ws"
    );
    assert!(matches!(
        panel_ws_url("ftp://host"),
        Err(SessionError::InvalidServerUrl)
    ));
}

async fn spawn_mock_controller() -> std::net::SocketAddr {
    async fn handler(ws: WebSocketUpgrade) -> impl IntoResponse {
        ws.on_upgrade(run_controller)
    }

    // Mirrors the controller's accept path: push a full settings snapshot,
    // then echo command effects back as get_* events.
    async fn run_controller(mut socket: WebSocket) {
        let snapshot = vec![
            ServerEvent::Process(false),
            ServerEvent::NumWorkers(0),
            ServerEvent::SchedulerInterval(4),
            ServerEvent::PauseTimer(false),
            ServerEvent::VerboseLog(false),
            ServerEvent::SaveJsonDb(false),
            ServerEvent::SaveJsonFile(true),
            ServerEvent::NumTask(Some(TaskProgress::new("IT", "0/10"))),
        ];
        for event in snapshot {
            let frame = event.into_envelope().to_text().unwrap();
            if socket.send(WsMessage::Text(frame)).await.is_err() {
                return;
            }
        }

        while let Some(Ok(message)) = socket.recv().await {
            let WsMessage::Text(text) = message else { continue };
            let envelope = Envelope::from_text(&text).unwrap();
            let reply = match envelope.action.as_str() {
                "add_worker" => ServerEvent::NumWorkers(1),
                "set_verbose_log" => ServerEvent::VerboseLog(true),
                // Hang up to exercise the terminal close path.
                "remove_worker" => break,
                _ => continue,
            };
            let frame = reply.into_envelope().to_text().unwrap();
            if socket.send(WsMessage::Text(frame)).await.is_err() {
                return;
            }
        }
    }

    let app = Router::new().route(BOT_PANEL_WS_PATH, get(handler));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn wait_for(
    events: &mut broadcast::Receiver<PanelEvent>,
    session: &PanelSession,
    mut done: impl FnMut(&PanelState) -> bool,
) {
    timeout(WAIT, async {
        loop {
            if done(&session.state().await) {
                return;
            }
            let _ = events.recv().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn end_to_end_against_mock_controller() {
    let addr = spawn_mock_controller().await;
    let session = PanelSession::new();
    let mut events = session.subscribe_events();
    session.connect(&format!("http://{addr}")).await.unwrap();

    wait_for(&mut events, &session, |state| {
        state.save_json_file == Some(true) && !state.tasks.is_empty()
    })
    .await;
    let state = session.state().await;
    assert_eq!(state.num_workers, Some(0));
    // Wire value 4 displays as 5.
    assert_eq!(state.scheduler_interval, Some(5));

    session.add_worker().await;
    wait_for(&mut events, &session, |state| state.num_workers == Some(1)).await;

    session.set_verbose_log().await;
    wait_for(&mut events, &session, |state| state.verbose_log == Some(true)).await;

    session.remove_worker().await;
    timeout(WAIT, async {
        while session.channel_state().await != ChannelState::Closed {
            let _ = events.recv().await;
        }
    })
    .await
    .expect("channel did not close");

    // Terminal: later emissions are no-ops and must not panic.
    session.add_worker().await;
    assert_eq!(session.channel_state().await, ChannelState::Closed);

    let log = session.log_text().await;
    assert!(log.contains("Connected to Server"));
    assert!(log.contains("Disconnected from Server"));
}
