use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_core::{ConnectionState, ReconnectPolicy, TaskStatus};
use agent_engine::{
    ChannelError, Connector, EngineEvent, EventSink, FrameStream, StatusChannel,
    TungsteniteConnector, UpdateSource,
};
use futures_util::{stream, SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl TestSink {
    fn connections(&self) -> Vec<ConnectionState> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Connection(state) => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    fn last_connection(&self) -> ConnectionState {
        self.connections().pop().expect("connection snapshot")
    }

    fn pushed_statuses(&self) -> Vec<Option<TaskStatus>> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Status {
                    source: UpdateSource::Push,
                    update,
                } => Some(update.status),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// What a scripted connection attempt does.
enum Script {
    Refuse,
    /// Deliver the frames, then close.
    Frames(Vec<&'static str>),
    /// Deliver the frames and stay open.
    Hold(Vec<&'static str>),
}

/// Connector that replays a script and refuses once the script runs out.
struct ScriptedConnector {
    script: Mutex<VecDeque<Script>>,
    attempts: AtomicUsize,
    open_streams: Arc<AtomicUsize>,
}

/// Counts a held stream as open until the channel drops it.
struct OpenStream(Arc<AtomicUsize>);

impl OpenStream {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedConnector {
    fn new(script: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            attempts: AtomicUsize::new(0),
            open_streams: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &Url) -> Result<FrameStream, ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let frames = |frames: Vec<&'static str>| {
            stream::iter(frames.into_iter().map(|frame| Ok::<_, ChannelError>(frame.to_string())))
        };
        match next {
            None | Some(Script::Refuse) => Err(ChannelError::Connect("refused".to_string())),
            Some(Script::Frames(list)) => Ok(Box::pin(frames(list))),
            Some(Script::Hold(list)) => {
                let open = OpenStream::new(&self.open_streams);
                Ok(Box::pin(frames(list).chain(stream::pending()).map(move |item| {
                    let _held = &open;
                    item
                })))
            }
        }
    }
}

fn url() -> Url {
    Url::parse("ws://localhost:3334").unwrap()
}

fn spawn(connector: Arc<ScriptedConnector>, sink: Arc<TestSink>) -> StatusChannel {
    agent_logging::initialize_for_tests();
    StatusChannel::spawn(url(), ReconnectPolicy::default(), connector, sink)
}

const AGENT_FRAME: &str = r#"{"type":"agentStatus","taskId":"t1","status":"RUNNING"}"#;
const SHUTDOWN_FRAME: &str =
    r#"{"type":"serverStatus","status":"SHUTDOWN","message":"maintenance"}"#;

#[tokio::test(start_paused = true)]
async fn stops_after_five_failed_attempts() {
    let connector = ScriptedConnector::new(Vec::new());
    let sink = Arc::new(TestSink::default());
    let channel = spawn(connector.clone(), sink.clone());

    channel.connect();
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(connector.attempts(), 5);
    let state = sink.last_connection();
    assert!(state.retries_exhausted);
    assert!(!state.is_connected);
    assert_eq!(state.attempt_count, 5);
    assert_eq!(
        state.last_error.as_deref(),
        Some("Gave up after 5 failed connection attempts")
    );

    // Automatic connects stay suppressed.
    channel.connect();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempts(), 5);

    channel.reconnect();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempts(), 10);
}

#[tokio::test(start_paused = true)]
async fn backoff_delays_grow_between_attempts() {
    let connector = ScriptedConnector::new(Vec::new());
    let sink = Arc::new(TestSink::default());
    let channel = spawn(connector.clone(), sink.clone());

    channel.connect();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(connector.attempts(), 1);
    // Second attempt after 1 s, third 2 s later.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(connector.attempts(), 2);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(connector.attempts(), 2);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(connector.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_attempts() {
    let connector = ScriptedConnector::new(vec![
        Script::Refuse,
        Script::Refuse,
        Script::Hold(vec![AGENT_FRAME]),
    ]);
    let sink = Arc::new(TestSink::default());
    let channel = spawn(connector.clone(), sink.clone());

    channel.connect();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(connector.attempts(), 3);
    let state = sink.last_connection();
    assert!(state.is_connected);
    assert_eq!(state.attempt_count, 0);
    assert_eq!(state.last_error, None);
    assert_eq!(sink.pushed_statuses(), vec![Some(TaskStatus::Running)]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_suppresses_reconnect_until_manual() {
    let connector = ScriptedConnector::new(vec![
        Script::Frames(vec![SHUTDOWN_FRAME]),
        Script::Hold(Vec::new()),
    ]);
    let sink = Arc::new(TestSink::default());
    let channel = spawn(connector.clone(), sink.clone());

    channel.connect();
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(connector.attempts(), 1);
    let state = sink.last_connection();
    assert!(state.is_server_shutting_down);
    assert!(!state.is_connected);
    assert_eq!(
        state.last_error.as_deref(),
        Some("Server is shutting down: maintenance")
    );

    channel.connect();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts(), 1);

    channel.reconnect();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(connector.attempts(), 2);
    let state = sink.last_connection();
    assert!(state.is_connected);
    assert!(!state.is_server_shutting_down);
}

#[tokio::test(start_paused = true)]
async fn second_connect_replaces_the_live_connection() {
    let connector = ScriptedConnector::new(vec![
        Script::Hold(vec![AGENT_FRAME]),
        Script::Hold(Vec::new()),
    ]);
    let sink = Arc::new(TestSink::default());
    let channel = spawn(connector.clone(), sink.clone());

    channel.connect();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(connector.open_streams(), 1);
    assert!(sink.last_connection().is_connected);

    channel.connect();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(connector.attempts(), 2);
    assert_eq!(connector.open_streams(), 1);

    let connected: Vec<bool> = sink
        .connections()
        .iter()
        .map(|state| state.is_connected)
        .collect();
    assert_eq!(connected, vec![true, false, true]);
    let state = sink.last_connection();
    assert_eq!(state.attempt_count, 0);
    assert_eq!(state.last_error, None);
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_do_not_drop_the_connection() {
    let connector = ScriptedConnector::new(vec![Script::Hold(vec![
        "not json",
        r#"{"type":"heartbeat"}"#,
        r#"{"type":"serverStatus","status":"OK","message":"fine"}"#,
        AGENT_FRAME,
    ])]);
    let sink = Arc::new(TestSink::default());
    let channel = spawn(connector.clone(), sink.clone());

    channel.connect();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(connector.attempts(), 1);
    assert_eq!(sink.connections().len(), 1);
    assert!(sink.last_connection().is_connected);
    assert_eq!(sink.pushed_statuses(), vec![Some(TaskStatus::Running)]);
}

#[tokio::test(start_paused = true)]
async fn close_ends_the_worker() {
    let connector = ScriptedConnector::new(vec![Script::Hold(Vec::new())]);
    let sink = Arc::new(TestSink::default());
    let channel = spawn(connector.clone(), sink.clone());

    channel.connect();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(sink.last_connection().is_connected);

    channel.close();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!sink.last_connection().is_connected);

    channel.reconnect();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn receives_frames_from_a_websocket_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(tcp).await.unwrap();
        socket
            .send(Message::Text(AGENT_FRAME.to_string()))
            .await
            .unwrap();
        // Keep the connection open until the client goes away.
        while socket.next().await.is_some() {}
    });

    let sink = Arc::new(TestSink::default());
    let channel = StatusChannel::spawn(
        Url::parse(&format!("ws://{addr}")).unwrap(),
        ReconnectPolicy::default(),
        Arc::new(TungsteniteConnector::default()),
        sink.clone(),
    );
    channel.connect();

    for _ in 0..100 {
        if !sink.pushed_statuses().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(sink.pushed_statuses(), vec![Some(TaskStatus::Running)]);
    assert!(sink.last_connection().is_connected);
}
