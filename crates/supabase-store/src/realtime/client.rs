//! Realtime websocket client.

use super::messages::{topic_for, Inbound, PhoenixMessage};
use crate::error::{RealtimeError, RealtimeResult};
use crate::token::AccessTokenSource;
use collection_sync::{ChangeHandler, ChangeKind, ChangePayload};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use live_subscription::{ListenerRegistry, Subscription};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Realtime client configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Websocket URL including `apikey` and `vsn` query parameters.
    pub url: String,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Base reconnect delay in seconds.
    pub reconnect_base_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub reconnect_max_delay_secs: u64,
    /// Consecutive failed attempts before the client gives up.
    pub max_reconnect_attempts: u32,
}

impl RealtimeConfig {
    /// Configuration for the project at `supabase_url`.
    pub fn for_project(supabase_url: &str, anon_key: &str) -> RealtimeResult<Self> {
        let mut url = Url::parse(supabase_url)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(RealtimeError::Protocol(format!(
                    "unsupported scheme {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| RealtimeError::Protocol(format!("cannot switch to {}", scheme)))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", anon_key)
            .append_pair("vsn", "1.0.0");

        Ok(Self {
            url: url.to_string(),
            heartbeat_interval_secs: 30,
            reconnect_base_delay_secs: 1,
            reconnect_max_delay_secs: 30,
            max_reconnect_attempts: 10,
        })
    }

    /// Exponential backoff for the given 1-based attempt.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_secs(std::cmp::min(
            self.reconnect_base_delay_secs.saturating_mul(factor),
            self.reconnect_max_delay_secs,
        ))
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// `connect` has not been called.
    Idle,
    Connecting,
    Connected,
    /// Waiting to reconnect.
    Disconnected,
    /// Shut down or out of reconnect attempts.
    Closed,
}

enum Command {
    Join(String),
    Leave(String),
    Shutdown,
}

enum SessionEnd {
    Shutdown,
    Dropped(String),
}

/// Listeners for one channel topic.
struct TopicEntry {
    listeners: usize,
    registries: HashMap<ChangeKind, ListenerRegistry<ChangePayload>>,
}

struct Inner {
    config: RealtimeConfig,
    anon_key: String,
    tokens: Arc<dyn AccessTokenSource>,
    topics: Mutex<HashMap<String, TopicEntry>>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Sender<ConnectionState>,
    next_ref: AtomicU64,
}

/// Realtime client with one channel per table and automatic reconnection.
///
/// A channel is joined when its first listener registers and left when the
/// last one is released. After a reconnect every channel with listeners is
/// joined again.
pub struct RealtimeClient {
    inner: Arc<Inner>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeClient {
    pub fn new(
        config: RealtimeConfig,
        anon_key: impl Into<String>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Idle);

        Self {
            inner: Arc::new(Inner {
                config,
                anon_key: anon_key.into(),
                tokens,
                topics: Mutex::new(HashMap::new()),
                commands,
                state,
                next_ref: AtomicU64::new(1),
            }),
            receiver: Mutex::new(Some(receiver)),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Start the connection task on the current runtime.
    pub fn connect(&self) {
        let Some(receiver) = self.receiver.lock().take() else {
            debug!("Realtime client already started");
            return;
        };
        let inner = self.inner.clone();
        *self.task.lock() = Some(tokio::spawn(run(inner, receiver)));
    }

    /// Register `handler` for `kind` changes on `table`.
    pub fn subscribe(
        &self,
        table: &str,
        kind: ChangeKind,
        handler: ChangeHandler,
    ) -> RealtimeResult<Subscription> {
        if self.inner.commands.is_closed() {
            return Err(RealtimeError::Closed);
        }

        let topic = topic_for(table);
        let (registry, first) = {
            let mut topics = self.inner.topics.lock();
            let entry = topics.entry(topic.clone()).or_insert_with(|| TopicEntry {
                listeners: 0,
                registries: HashMap::new(),
            });
            entry.listeners += 1;
            let registry = entry
                .registries
                .entry(kind)
                .or_insert_with(|| ListenerRegistry::new(&format!("{}:{}", topic, kind)))
                .clone();
            (registry, entry.listeners == 1)
        };

        let registration = registry.register(handler);
        if first {
            debug!(topic = %topic, "First listener, joining channel");
            // Failure means the task has exited; the entry is still counted
            // so the release below stays balanced.
            let _ = self.inner.commands.send(Command::Join(topic.clone()));
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let label = registration.label().to_string();
        Ok(Subscription::new(label, move || {
            registration.unsubscribe();
            if let Some(inner) = weak.upgrade() {
                inner.release_listener(&topic);
            }
        }))
    }

    /// Topics that currently have listeners.
    pub fn live_topics(&self) -> Vec<String> {
        self.inner.live_topics()
    }

    pub fn listener_count(&self, table: &str) -> usize {
        self.inner
            .topics
            .lock()
            .get(&topic_for(table))
            .map(|entry| entry.listeners)
            .unwrap_or(0)
    }

    /// Leave every channel, close the socket and stop reconnecting.
    pub async fn shutdown(&self) {
        let _ = self.inner.commands.send(Command::Shutdown);
        // Never started: dropping the receiver closes the command channel.
        self.receiver.lock().take();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Realtime task ended abnormally");
            }
        }
        self.inner.set_state(ConnectionState::Closed);
        info!("Realtime client shut down");
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        let _ = self.inner.commands.send(Command::Shutdown);
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn next_ref(&self) -> u64 {
        self.next_ref.fetch_add(1, Ordering::Relaxed)
    }

    fn live_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    fn is_live(&self, topic: &str) -> bool {
        self.topics.lock().contains_key(topic)
    }

    fn release_listener(&self, topic: &str) {
        let last = {
            let mut topics = self.topics.lock();
            match topics.get_mut(topic) {
                Some(entry) => {
                    entry.listeners = entry.listeners.saturating_sub(1);
                    if entry.listeners == 0 {
                        topics.remove(topic);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        if last {
            debug!(topic = %topic, "Last listener released, leaving channel");
            let _ = self.commands.send(Command::Leave(topic.to_string()));
        }
    }

    fn join_token(&self) -> String {
        self.tokens
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    /// Deliver a change to the listeners registered for its topic and kind.
    fn dispatch(&self, topic: &str, payload: &ChangePayload) -> usize {
        let registry = self
            .topics
            .lock()
            .get(topic)
            .and_then(|entry| entry.registries.get(&payload.kind).cloned());

        match registry {
            Some(registry) => registry.emit(payload),
            None => {
                debug!(topic = %topic, kind = %payload.kind, "No listeners for change");
                0
            }
        }
    }

    fn handle_text(&self, text: &str) {
        let message = match PhoenixMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to parse realtime frame");
                return;
            }
        };

        match message.classify() {
            Ok(Inbound::Change { topic, payload }) => {
                self.dispatch(&topic, &payload);
            }
            Ok(Inbound::Reply {
                topic,
                ok: false,
                response,
            }) => {
                warn!(topic = %topic, response = %response, "Realtime request rejected");
            }
            Ok(Inbound::Reply { .. }) => {}
            Ok(Inbound::ChannelDown { topic, event }) => {
                warn!(topic = %topic, event = %event, "Realtime channel went down");
            }
            Ok(Inbound::Ignored(event)) => {
                debug!(event = %event, "Ignoring realtime frame");
            }
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "Malformed change event");
            }
        }
    }

    async fn send(&self, write: &mut WsSink, message: &PhoenixMessage) -> RealtimeResult<()> {
        let json = message.to_json()?;
        write.send(Message::Text(json.into())).await?;
        Ok(())
    }

    async fn join(&self, write: &mut WsSink, topic: &str) -> RealtimeResult<()> {
        let message = PhoenixMessage::join(topic, &self.join_token(), self.next_ref());
        self.send(write, &message).await?;
        info!(topic = %topic, "Joined realtime channel");
        Ok(())
    }

    async fn leave(&self, write: &mut WsSink, topic: &str) -> RealtimeResult<()> {
        let message = PhoenixMessage::leave(topic, self.next_ref());
        self.send(write, &message).await?;
        info!(topic = %topic, "Left realtime channel");
        Ok(())
    }

    /// Drive one connected socket until it drops or shutdown is requested.
    async fn serve(
        &self,
        ws_stream: WsStream,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> SessionEnd {
        let (mut write, mut read) = ws_stream.split();
        let mut joined: HashSet<String> = HashSet::new();

        for topic in self.live_topics() {
            if let Err(e) = self.join(&mut write, &topic).await {
                return SessionEnd::Dropped(e.to_string());
            }
            joined.insert(topic);
        }

        let mut heartbeat = interval(Duration::from_secs(self.config.heartbeat_interval_secs));
        // First tick completes immediately.
        heartbeat.tick().await;

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text),
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            return SessionEnd::Dropped(e.to_string());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Realtime connection closed");
                        return SessionEnd::Dropped("closed by server".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        return SessionEnd::Dropped(e.to_string());
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Join(topic)) => {
                        if self.is_live(&topic) && joined.insert(topic.clone()) {
                            if let Err(e) = self.join(&mut write, &topic).await {
                                return SessionEnd::Dropped(e.to_string());
                            }
                        }
                    }
                    Some(Command::Leave(topic)) => {
                        if !self.is_live(&topic) && joined.remove(&topic) {
                            if let Err(e) = self.leave(&mut write, &topic).await {
                                return SessionEnd::Dropped(e.to_string());
                            }
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        for topic in joined.drain() {
                            let _ = self.leave(&mut write, &topic).await;
                        }
                        let _ = write.close().await;
                        return SessionEnd::Shutdown;
                    }
                },
                _ = heartbeat.tick() => {
                    let message = PhoenixMessage::heartbeat(self.next_ref());
                    if let Err(e) = self.send(&mut write, &message).await {
                        return SessionEnd::Dropped(e.to_string());
                    }
                    debug!("Sent realtime heartbeat");
                }
            }
        }
    }
}

/// Connection task: connect, serve, back off, repeat.
async fn run(inner: Arc<Inner>, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut attempts: u32 = 0;

    loop {
        inner.set_state(ConnectionState::Connecting);
        info!("Connecting to realtime");

        match connect_async(inner.config.url.as_str()).await {
            Ok((ws_stream, _)) => {
                attempts = 0;
                inner.set_state(ConnectionState::Connected);
                info!("Connected to realtime");

                match inner.serve(ws_stream, &mut commands).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Dropped(reason) => {
                        warn!(reason = %reason, "Realtime connection dropped");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Realtime connect failed");
            }
        }

        inner.set_state(ConnectionState::Disconnected);
        attempts += 1;
        if attempts > inner.config.max_reconnect_attempts {
            warn!("Max reconnect attempts reached");
            break;
        }

        let delay = inner.config.reconnect_delay(attempts);
        info!(attempt = attempts, delay_secs = delay.as_secs(), "Scheduling reconnect");

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => {
                        inner.set_state(ConnectionState::Closed);
                        return;
                    }
                    // Channels are joined from the topic table on reconnect.
                    Some(_) => {}
                },
            }
        }
    }

    inner.set_state(ConnectionState::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use serde_json::json;

    struct NoToken;

    impl AccessTokenSource for NoToken {
        fn access_token(&self) -> Option<String> {
            None
        }
    }

    fn client() -> RealtimeClient {
        let config = RealtimeConfig::for_project("https://xyz.supabase.co", "anon").unwrap();
        RealtimeClient::new(config, "anon", Arc::new(NoToken))
    }

    fn queued(client: &RealtimeClient) -> Vec<String> {
        let mut receiver = client.receiver.lock();
        let receiver = receiver.as_mut().unwrap();
        let mut out = Vec::new();
        while let Ok(command) = receiver.try_recv() {
            out.push(match command {
                Command::Join(topic) => format!("join {}", topic),
                Command::Leave(topic) => format!("leave {}", topic),
                Command::Shutdown => "shutdown".to_string(),
            });
        }
        out
    }

    fn recorder() -> (ChangeHandler, Arc<PlMutex<Vec<ChangePayload>>>) {
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: ChangeHandler = Arc::new(move |payload: &ChangePayload| {
            sink.lock().push(payload.clone());
        });
        (handler, seen)
    }

    #[test]
    fn test_config_for_project() {
        let config = RealtimeConfig::for_project("https://xyz.supabase.co/", "anon-key").unwrap();
        assert_eq!(
            config.url,
            "wss://xyz.supabase.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
        assert_eq!(config.heartbeat_interval_secs, 30);

        let local = RealtimeConfig::for_project("http://localhost:54321", "k").unwrap();
        assert!(local.url.starts_with("ws://localhost:54321/realtime/v1/websocket"));

        assert!(RealtimeConfig::for_project("ftp://example.com", "k").is_err());
    }

    #[test]
    fn test_reconnect_delay_backoff() {
        let config = RealtimeConfig::for_project("https://xyz.supabase.co", "k").unwrap();
        assert_eq!(config.reconnect_delay(1), Duration::from_secs(1));
        assert_eq!(config.reconnect_delay(2), Duration::from_secs(2));
        assert_eq!(config.reconnect_delay(4), Duration::from_secs(8));
        assert_eq!(config.reconnect_delay(10), Duration::from_secs(30));
        assert_eq!(config.reconnect_delay(64), Duration::from_secs(30));
    }

    #[test]
    fn test_channel_joined_once_and_left_with_last_listener() {
        let client = client();
        let (handler, _) = recorder();

        let insert = client
            .subscribe("todos", ChangeKind::Insert, handler.clone())
            .unwrap();
        let delete = client
            .subscribe("todos", ChangeKind::Delete, handler)
            .unwrap();

        assert_eq!(client.live_topics(), vec!["realtime:public:todos"]);
        assert_eq!(client.listener_count("todos"), 2);
        assert_eq!(queued(&client), vec!["join realtime:public:todos"]);

        insert.unsubscribe();
        assert_eq!(client.listener_count("todos"), 1);
        assert!(queued(&client).is_empty());

        drop(delete);
        assert!(client.live_topics().is_empty());
        assert_eq!(queued(&client), vec!["leave realtime:public:todos"]);
    }

    #[test]
    fn test_changes_routed_by_topic_and_kind() {
        let client = client();
        let (inserts, seen_inserts) = recorder();
        let (updates, seen_updates) = recorder();
        let _a = client.subscribe("posts", ChangeKind::Insert, inserts).unwrap();
        let _b = client.subscribe("todos", ChangeKind::Update, updates).unwrap();

        let frame = json!({
            "topic": "realtime:public:posts",
            "event": "INSERT",
            "payload": {
                "type": "INSERT",
                "table": "posts",
                "record": { "id": 1, "content": "hi" }
            },
            "ref": null
        });
        client.inner.handle_text(&frame.to_string());

        let frame = json!({
            "topic": "realtime:public:todos",
            "event": "DELETE",
            "payload": { "type": "DELETE", "table": "todos", "old_record": { "id": 3 } },
            "ref": null
        });
        client.inner.handle_text(&frame.to_string());

        assert_eq!(seen_inserts.lock().len(), 1);
        assert_eq!(seen_inserts.lock()[0].record.as_ref().unwrap()["content"], "hi");
        assert!(seen_updates.lock().is_empty());
    }

    #[test]
    fn test_garbage_frames_are_ignored() {
        let client = client();
        let (handler, seen) = recorder();
        let _sub = client.subscribe("todos", ChangeKind::Delete, handler).unwrap();

        client.inner.handle_text("not json");
        client.inner.handle_text(
            r#"{"topic":"realtime:public:todos","event":"DELETE","payload":{"table":"todos"}}"#,
        );
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_release_after_client_dropped() {
        let client = client();
        let (handler, _) = recorder();
        let sub = client.subscribe("todos", ChangeKind::Insert, handler).unwrap();

        drop(client);
        sub.unsubscribe();
    }

    #[tokio::test]
    async fn test_subscribe_after_shutdown_fails() {
        let client = client();
        client.shutdown().await;

        assert_eq!(client.state(), ConnectionState::Closed);
        let (handler, _) = recorder();
        assert!(matches!(
            client.subscribe("todos", ChangeKind::Insert, handler),
            Err(RealtimeError::Closed)
        ));
    }
}
