use std::{
    future::Future,
    sync::{Arc, PoisonError, RwLock},
};

use tokio::runtime::{Handle, Runtime};

use ltg_core::{
    config::HandlerConfig,
    diagnostics::TracingSink,
    errors::Error,
    formatting::{local_timestamp, MarkdownLog},
    identity::ChatTarget,
    level::{self, Level},
    messaging::{
        port::{DeliveryPort, DiagnosticSink},
        types::SendMessage,
    },
    metadata::{self, Metadata, MetadataValue},
    record::LogRecord,
    DeliveryError, Result,
};

use crate::TelegramClient;

/// Sends log records at or above a threshold to one Telegram chat.
///
/// [`log`](Self::log) renders and serializes on the caller's thread, spawns the
/// HTTP exchange and returns. Failures are reported to the diagnostic sink and
/// never reach the caller. Deliveries are neither queued, retried nor ordered.
pub struct TelegramLogHandler {
    label: String,
    target: ChatTarget,
    mute: bool,
    level: RwLock<Option<Level>>,
    metadata: RwLock<Metadata>,
    port: Arc<dyn DeliveryPort>,
    sink: Arc<dyn DiagnosticSink>,
    executor: Executor,
    ignored_targets: Vec<String>,
}

impl TelegramLogHandler {
    /// Handler delivering through the Bot API, reporting failures via `tracing`.
    pub fn new(cfg: HandlerConfig) -> Result<Self> {
        HandlerBuilder::new(cfg).build()
    }

    pub fn builder(cfg: HandlerConfig) -> HandlerBuilder {
        HandlerBuilder::new(cfg)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn target(&self) -> &ChatTarget {
        &self.target
    }

    // ============== Severity Gate ==============

    /// Effective threshold: the explicit one, else the process-wide default.
    pub fn log_level(&self) -> Level {
        level::effective_threshold(*read(&self.level))
    }

    pub fn set_log_level(&self, level: Level) {
        *write(&self.level) = Some(level);
    }

    /// Go back to following the process-wide default.
    pub fn clear_log_level(&self) {
        *write(&self.level) = None;
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        level::passes(level, self.log_level())
    }

    /// Whether any record from the `log` facade can pass the gate.
    ///
    /// `log` has no level above error, so a handler left at the default
    /// critical threshold only receives records passed to [`Self::log`].
    pub fn accepts_log_records(&self) -> bool {
        self.is_enabled(Level::Error)
    }

    /// Whether `log` records from `target` are refused regardless of level.
    ///
    /// Matches whole path segments: `hyper` covers `hyper::proto` but not
    /// `hyperlocal`.
    pub fn is_ignored_target(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|prefix| {
            target
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
    }

    // ============== Persistent Metadata ==============

    pub fn metadata(&self) -> Metadata {
        read(&self.metadata).clone()
    }

    pub fn metadata_value(&self, key: &str) -> Option<MetadataValue> {
        read(&self.metadata).get(key).cloned()
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        write(&self.metadata).insert(key.into(), value.into());
    }

    pub fn remove_metadata(&self, key: &str) -> Option<MetadataValue> {
        write(&self.metadata).remove(key)
    }

    // ============== Pipeline ==============

    /// Forward `record` if it passes the threshold. Never blocks on the network.
    pub fn log(&self, record: &LogRecord) {
        if !self.is_enabled(record.level) {
            return;
        }

        let text = self.render_at(record, &local_timestamp());
        match SendMessage::new(&self.target.chat_id, &text, self.mute).encode() {
            Ok(body) => self.dispatch(body),
            Err(e) => self.sink.report(&e),
        }
    }

    /// Render `record` with merged metadata and this handler's mentions.
    pub fn render_at(&self, record: &LogRecord, timestamp: &str) -> String {
        let merged = metadata::merged(&read(&self.metadata), record.metadata.as_ref());
        MarkdownLog {
            timestamp,
            label: &self.label,
            level: record.level,
            message: &record.message,
            metadata: &merged,
            location: &record.location,
            mentions: &self.target.mentions,
        }
        .to_string()
    }

    fn dispatch(&self, body: Vec<u8>) {
        let port = Arc::clone(&self.port);
        let sink = Arc::clone(&self.sink);
        tracing::trace!(target: "ltg", bytes = body.len(), "dispatching telegram message");
        self.executor.spawn(async move {
            if let Err(e) = deliver(port.as_ref(), body).await {
                sink.report(&e);
            }
        });
    }
}

async fn deliver(port: &dyn DeliveryPort, body: Vec<u8>) -> std::result::Result<(), DeliveryError> {
    port.send_message(body).await?.into_result()
}

impl std::fmt::Debug for TelegramLogHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramLogHandler")
            .field("label", &self.label)
            .field("target", &self.target)
            .field("mute", &self.mute)
            .field("level", &self.log_level())
            .finish_non_exhaustive()
    }
}

// A poisoned lock still holds consistent data here: every critical section is
// a single read or insert.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ============== Executor ==============

/// Where delivery tasks run.
enum Executor {
    /// The runtime the handler was built in (or was handed).
    Ambient(Handle),
    /// A private runtime, for handlers built outside any runtime.
    Owned(Option<Runtime>),
}

impl Executor {
    fn current_or_owned() -> Result<Self> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Executor::Ambient(handle));
        }
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("ltg-delivery")
            .enable_all()
            .build()
            .map_err(|e| Error::External(format!("failed to start delivery runtime: {e}")))?;
        Ok(Executor::Owned(Some(rt)))
    }

    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            Executor::Ambient(handle) => {
                handle.spawn(fut);
            }
            Executor::Owned(Some(rt)) => {
                rt.spawn(fut);
            }
            Executor::Owned(None) => {}
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which panics inside async code.
        if let Executor::Owned(rt) = self {
            if let Some(rt) = rt.take() {
                rt.shutdown_background();
            }
        }
    }
}

// ============== Builder ==============

/// Assembles a [`TelegramLogHandler`], optionally swapping its ports.
pub struct HandlerBuilder {
    cfg: HandlerConfig,
    port: Option<Arc<dyn DeliveryPort>>,
    sink: Option<Arc<dyn DiagnosticSink>>,
    runtime: Option<Handle>,
    metadata: Metadata,
    ignored_targets: Vec<String>,
}

impl HandlerBuilder {
    pub fn new(cfg: HandlerConfig) -> Self {
        Self {
            cfg,
            port: None,
            sink: None,
            runtime: None,
            metadata: Metadata::new(),
            ignored_targets: crate::facade::DELIVERY_TARGETS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    /// Deliver through `port` instead of the Bot API client.
    pub fn port(mut self, port: Arc<dyn DeliveryPort>) -> Self {
        self.port = Some(port);
        self
    }

    /// Report failures to `sink` instead of `tracing`.
    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Spawn deliveries on this runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Refuse `log` records whose target is `prefix` or below it, in addition
    /// to the delivery stack's own crates.
    pub fn ignore_target(mut self, prefix: impl Into<String>) -> Self {
        self.ignored_targets.push(prefix.into());
        self
    }

    /// Initial persistent metadata.
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn build(self) -> Result<TelegramLogHandler> {
        let port: Arc<dyn DeliveryPort> = match self.port {
            Some(port) => port,
            None => Arc::new(TelegramClient::new(&self.cfg)?),
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let executor = match self.runtime {
            Some(handle) => Executor::Ambient(handle),
            None => Executor::current_or_owned()?,
        };

        let HandlerConfig {
            label,
            target,
            level,
            mute,
            ..
        } = self.cfg;

        Ok(TelegramLogHandler {
            label,
            target,
            mute,
            level: RwLock::new(level),
            metadata: RwLock::new(self.metadata),
            ignored_targets: self.ignored_targets,
            port,
            sink,
            executor,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use ltg_core::{
        identity::{GroupChat, User},
        location,
        messaging::types::ApiResult,
        record::SourceLocation,
    };
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// Delivery port answering every call with a canned outcome.
    pub(crate) struct FakePort {
        pub(crate) bodies: Mutex<Vec<Vec<u8>>>,
        outcome: fn() -> std::result::Result<ApiResult, DeliveryError>,
    }

    impl FakePort {
        pub(crate) fn new(outcome: fn() -> std::result::Result<ApiResult, DeliveryError>) -> Self {
            Self {
                bodies: Mutex::new(Vec::new()),
                outcome,
            }
        }

        pub(crate) fn ok() -> Self {
            Self::new(|| Ok(ApiResult::Ok))
        }

        pub(crate) fn sent(&self) -> Vec<serde_json::Value> {
            self.bodies
                .lock()
                .unwrap()
                .iter()
                .map(|b| serde_json::from_slice(b).unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl DeliveryPort for FakePort {
        async fn send_message(
            &self,
            body: Vec<u8>,
        ) -> std::result::Result<ApiResult, DeliveryError> {
            self.bodies.lock().unwrap().push(body);
            (self.outcome)()
        }
    }

    pub(crate) struct ChannelSink(pub(crate) UnboundedSender<String>);

    impl DiagnosticSink for ChannelSink {
        fn report(&self, error: &DeliveryError) {
            let _ = self.0.send(format!("{}: {error}", error.kind()));
        }
    }

    pub(crate) fn sink() -> (Arc<ChannelSink>, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (Arc::new(ChannelSink(tx)), rx)
    }

    fn handler_with(
        cfg: HandlerConfig,
        port: Arc<FakePort>,
    ) -> (TelegramLogHandler, UnboundedReceiver<String>) {
        let (sink, rx) = sink();
        let handler = TelegramLogHandler::builder(cfg)
            .port(port)
            .sink(sink)
            .build()
            .unwrap();
        (handler, rx)
    }

    fn record(level: Level, message: &str) -> LogRecord {
        LogRecord::new(level, message, SourceLocation::new("src/disk.rs", "check", 7))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn forwards_at_threshold_and_drops_below() {
        let port = Arc::new(FakePort::ok());
        let cfg = HandlerConfig::new("app", "t", 1).level(Level::Error);
        let (handler, mut rx) = handler_with(cfg, port.clone());

        handler.log(&record(Level::Warning, "below"));
        handler.log(&record(Level::Error, "at"));
        handler.log(&record(Level::Critical, "above"));
        settle().await;

        let texts: Vec<String> = port
            .sent()
            .iter()
            .map(|v| v["text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts.len(), 2);
        assert!(texts.iter().all(|t| !t.contains("*below*")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn threshold_override_can_change_and_be_cleared() {
        let port = Arc::new(FakePort::ok());
        let (handler, _rx) = handler_with(HandlerConfig::new("app", "t", 1), port);

        // This crate's tests never change the process default.
        assert_eq!(handler.log_level(), Level::Critical);
        assert!(!handler.is_enabled(Level::Error));

        handler.set_log_level(Level::Debug);
        assert!(handler.is_enabled(Level::Debug));
        assert!(!handler.is_enabled(Level::Trace));

        handler.clear_log_level();
        assert_eq!(handler.log_level(), Level::Critical);
    }

    #[tokio::test]
    async fn default_threshold_refuses_facade_records() {
        let port = Arc::new(FakePort::ok());
        let (handler, _rx) = handler_with(HandlerConfig::new("app", "t", 1), port);
        assert!(!handler.accepts_log_records());

        handler.set_log_level(Level::Error);
        assert!(handler.accepts_log_records());
    }

    #[tokio::test]
    async fn ignored_targets_match_whole_segments() {
        let (sink, _rx) = sink();
        let handler = TelegramLogHandler::builder(HandlerConfig::new("app", "t", 1))
            .port(Arc::new(FakePort::ok()))
            .sink(sink)
            .ignore_target("wiremock")
            .build()
            .unwrap();

        assert!(handler.is_ignored_target("reqwest"));
        assert!(handler.is_ignored_target("reqwest::connect"));
        assert!(handler.is_ignored_target("hyper::proto::h1::conn"));
        assert!(handler.is_ignored_target("ltg_telegram::handler"));
        assert!(handler.is_ignored_target("wiremock::mock_server"));
        assert!(!handler.is_ignored_target("hyperlocal"));
        assert!(!handler.is_ignored_target("billing"));
        assert!(!handler.is_ignored_target("ltg"));
    }

    #[tokio::test]
    async fn sends_wire_payload_with_mute_flag() {
        let port = Arc::new(FakePort::ok());
        let cfg = HandlerConfig::new("app", "t", "ops")
            .level(Level::Info)
            .mute(true);
        let (handler, _rx) = handler_with(cfg, port.clone());

        handler.log(&record(Level::Info, "hello"));
        settle().await;

        let sent = port.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["chat_id"], "@ops");
        assert_eq!(sent[0]["parse_mode"], "MarkdownV2");
        assert_eq!(sent[0]["disable_notification"], true);
    }

    #[tokio::test]
    async fn renders_error_with_metadata_and_mention() {
        let port = Arc::new(FakePort::ok());
        let target = GroupChat::group(-100).mentioning(99);
        let cfg = HandlerConfig::new("app", "t", target).level(Level::Error);
        let (handler, _rx) = handler_with(cfg, port);

        let rec = record(Level::Error, "disk full!")
            .with_metadata(ltg_core::metadata! { "host" => "srv1" });
        let text = handler.render_at(&rec, "2024-01-02T03:04:05+0000");

        assert!(text.contains(r"\[app\] \[error\]"));
        assert!(text.contains(r"disk full\!"));
        assert!(text.contains("\nhost: srv1"));
        assert!(text.contains("tg://user?id=99"));
    }

    #[tokio::test]
    async fn merges_persistent_and_per_call_metadata() {
        let port = Arc::new(FakePort::ok());
        let (sink, _rx) = sink();
        let handler = TelegramLogHandler::builder(HandlerConfig::new("app", "t", 1))
            .port(port)
            .sink(sink)
            .metadata(ltg_core::metadata! { "a" => 1 })
            .build()
            .unwrap();
        handler.set_metadata("b", 2);
        assert_eq!(handler.metadata_value("b"), Some(MetadataValue::from(2)));

        let rec = record(Level::Critical, "m")
            .with_metadata(ltg_core::metadata! { "b" => 3, "c" => 4 });
        let text = handler.render_at(&rec, "t");
        assert!(text.ends_with("*Metadata*\na: 1\nb: 3\nc: 4"));

        // Per-call metadata does not leak into the handler.
        assert_eq!(handler.metadata(), ltg_core::metadata! { "a" => 1, "b" => 2 });

        assert_eq!(handler.remove_metadata("a"), Some(MetadataValue::from(1)));
        let text = handler.render_at(&record(Level::Critical, "m"), "t");
        assert!(text.ends_with("*Metadata*\nb: 2"));
    }

    #[tokio::test]
    async fn transport_failure_is_reported_once_and_swallowed() {
        let port = Arc::new(FakePort::new(|| {
            Err(DeliveryError::Transport("connection refused".to_string()))
        }));
        let cfg = HandlerConfig::new("app", "t", 1).level(Level::Error);
        let (handler, mut rx) = handler_with(cfg, port);

        handler.log(&record(Level::Error, "boom"));

        let entry = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(entry.starts_with("transport:"));
        assert!(entry.contains("connection refused"));

        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn api_rejection_reports_code_and_description() {
        let port = Arc::new(FakePort::new(|| {
            Ok(ApiResult::Error {
                code: 400,
                message: "Bad Request".to_string(),
            })
        }));
        let cfg = HandlerConfig::new("app", "t", 1).level(Level::Error);
        let (handler, mut rx) = handler_with(cfg, port);

        handler.log(&record(Level::Error, "boom"));

        let entry = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(entry.starts_with("api:"));
        assert!(entry.contains("400"));
        assert!(entry.contains("Bad Request"));
    }

    #[tokio::test]
    async fn concurrent_calls_each_dispatch() {
        let port = Arc::new(FakePort::ok());
        let cfg = HandlerConfig::new("app", "t", 1).level(Level::Info);
        let (handler, _rx) = handler_with(cfg, port.clone());
        let handler = Arc::new(handler);

        let threads: Vec<_> = (0..4)
            .map(|i| {
                let handler = Arc::clone(&handler);
                std::thread::spawn(move || {
                    handler.set_metadata(format!("worker{i}"), i);
                    handler.log(&record(Level::Error, "burst"));
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        settle().await;

        assert_eq!(port.sent().len(), 4);
        assert_eq!(handler.metadata().len(), 4);
    }

    #[test]
    fn builds_own_runtime_outside_async_context() {
        let port = Arc::new(FakePort::new(|| {
            Err(DeliveryError::Transport("unreachable".to_string()))
        }));
        let (sink, mut rx) = sink();
        let handler = TelegramLogHandler::builder(HandlerConfig::new("app", "t", 1).level(Level::Info))
            .port(port)
            .sink(sink)
            .build()
            .unwrap();

        handler.log(&LogRecord::new(Level::Critical, "boom", location!()));

        let entry = rx.blocking_recv().unwrap();
        assert!(entry.starts_with("transport:"));
        drop(handler);
    }

    #[tokio::test]
    async fn end_to_end_through_bot_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT0KEN/sendMessage"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
            )
            .mount(&server)
            .await;

        let target = GroupChat::channel("alerts").mentioning_all([User::from(99), User::from("bob")]);
        let cfg = HandlerConfig::new("app", "T0KEN", target)
            .level(Level::Error)
            .api_base(server.uri());
        let (sink, mut rx) = sink();
        let handler = TelegramLogHandler::builder(cfg).sink(sink).build().unwrap();

        handler.log(
            &record(Level::Error, "disk full!").with_metadata(ltg_core::metadata! { "host" => "srv1" }),
        );

        let mut requests = Vec::new();
        for _ in 0..100 {
            requests = server.received_requests().await.unwrap_or_default();
            if !requests.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(requests.len(), 1);

        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["chat_id"], "@alerts");
        let text = body["text"].as_str().unwrap();
        assert!(text.contains(r"*\[app\] \[error\]*"));
        assert!(text.contains(r"*disk full\!*"));
        assert!(text.contains("host: srv1"));
        assert!(text.ends_with("[mentioning 99](tg://user?id=99) @bob"));

        // A successful acknowledgment produces no diagnostics.
        settle().await;
        assert!(rx.try_recv().is_err());
    }
}
