//! Live topology stream.
//!
//! A background tailer feeds new log lines through the parser into the shared
//! graph and fans resulting events out to subscribers. Each subscriber owns a
//! bounded channel; a full or closed channel disconnects that subscriber only,
//! so a stalled client can never hold up the tailer or its peers.

use crate::config::{AnalysisConfig, Config, ServiceCatalog};
use crate::dependency_graph::{DependencyGraph, DependencyType, GraphSnapshot};
use crate::graph_analyzer::{CriticalPath, GraphAnalyzer, SinglePointOfFailure};
use crate::impact::{ChangeAssessment, ChangeProposal, ImpactResult, ImpactSimulator};
use crate::log_parser::{split_lines, DependencyObservation, LogEntryParser};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SharedGraph = Arc<RwLock<DependencyGraph>>;

/// Invoked with every broadcast message, before fan-out.
pub type BroadcastHook = Arc<dyn Fn(&ServerMessage) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Init { data: GraphSnapshot },
    Update { dependency: DependencyUpdate },
    Alert(Alert),
    ImpactResult { impact: ImpactResult },
    CriticalPaths { paths: Vec<CriticalPath> },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alert_type", rename_all = "snake_case")]
pub enum Alert {
    Cycle { cycles: Vec<Vec<String>> },
    Spof { spofs: Vec<SinglePointOfFailure> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyUpdate {
    pub caller: String,
    pub callee: String,
    /// Latency of the observation that triggered the update.
    pub latency: u64,
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    pub weight: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    GetImpact { service: String },
    GetCriticalPaths,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Connected,
    Active,
    Disconnected,
}

struct Subscriber {
    sender: mpsc::Sender<ServerMessage>,
    state: SubscriberState,
}

/// Receiving end handed to a transport for one connected client.
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<ServerMessage>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    pub applied: usize,
    pub skipped: usize,
    /// Byte offset the tailer should resume from.
    pub offset: u64,
}

pub struct StreamingServer {
    graph: SharedGraph,
    parser: LogEntryParser,
    catalog: ServiceCatalog,
    analysis: AnalysisConfig,
    poll_interval: Duration,
    subscriber_buffer: usize,
    subscribers: Mutex<HashMap<Uuid, Subscriber>>,
    hook: Option<BroadcastHook>,
}

impl StreamingServer {
    pub fn new(graph: SharedGraph, config: &Config) -> crate::Result<Self> {
        Ok(Self {
            graph,
            parser: LogEntryParser::new()?,
            catalog: config.services.clone(),
            analysis: config.analysis.clone(),
            poll_interval: Duration::from_millis(config.server.poll_interval_ms.max(1)),
            subscriber_buffer: config.server.subscriber_buffer.max(1),
            subscribers: Mutex::new(HashMap::new()),
            hook: None,
        })
    }

    pub fn with_broadcast_hook(mut self, hook: BroadcastHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn graph(&self) -> SharedGraph {
        Arc::clone(&self.graph)
    }

    /// Copy of the live graph; analysis runs on the copy without holding the lock.
    fn current_graph(&self) -> DependencyGraph {
        self.graph.read().clone()
    }

    // --- subscribers -------------------------------------------------------

    /// Register a subscriber and queue the full graph snapshot as its first message.
    pub fn connect(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.subscriber_buffer);
        let mut subscriber = Subscriber {
            sender,
            state: SubscriberState::Connected,
        };

        // The graph stays read-locked until the subscriber is registered, so
        // every mutation is either in the snapshot or broadcast to it.
        // Lock order: graph, then subscribers.
        let graph = self.graph.read();
        let init = ServerMessage::Init {
            data: graph.to_snapshot(),
        };
        if subscriber.sender.try_send(init).is_ok() {
            subscriber.state = SubscriberState::Active;
            self.subscribers.lock().insert(id, subscriber);
            drop(graph);
            info!(subscriber = %id, "Subscriber connected");
        } else {
            drop(graph);
            warn!(subscriber = %id, "Could not deliver initial snapshot, subscriber dropped");
        }

        Subscription { id, receiver }
    }

    pub fn disconnect(&self, id: Uuid) {
        if self.subscribers.lock().remove(&id).is_some() {
            info!(subscriber = %id, "Subscriber disconnected");
        }
    }

    pub fn subscriber_state(&self, id: Uuid) -> SubscriberState {
        self.subscribers
            .lock()
            .get(&id)
            .map(|s| s.state)
            .unwrap_or(SubscriberState::Disconnected)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver `message` to every active subscriber without waiting. Returns
    /// the number of subscribers that accepted it.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        if let Some(hook) = &self.hook {
            hook(message);
        }

        let mut subscribers = self.subscribers.lock();
        let mut dropped = Vec::new();
        let mut delivered = 0;

        for (id, subscriber) in subscribers.iter_mut() {
            if subscriber.state != SubscriberState::Active {
                continue;
            }
            match subscriber.sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    subscriber.state = SubscriberState::Disconnected;
                    dropped.push((*id, matches!(err, mpsc::error::TrySendError::Full(_))));
                }
            }
        }

        for (id, stalled) in dropped {
            subscribers.remove(&id);
            if stalled {
                warn!(subscriber = %id, "Subscriber queue full, disconnecting");
            } else {
                info!(subscriber = %id, "Subscriber channel closed, removing");
            }
        }

        delivered
    }

    // --- ingestion ---------------------------------------------------------

    /// Parse and apply one raw line. Returns whether the line was recognized.
    pub fn ingest_line(&self, line: &str) -> bool {
        match self.parser.parse(line) {
            Some(observation) => {
                self.apply_observation(&observation);
                true
            }
            None => {
                if !line.trim().is_empty() {
                    debug!(line, "Skipping unrecognized log line");
                }
                false
            }
        }
    }

    pub fn apply_observation(&self, observation: &DependencyObservation) {
        let record = self.graph.write().record(observation);
        debug!(
            caller = %record.caller,
            callee = %record.callee,
            weight = record.weight,
            "Dependency updated"
        );

        self.broadcast(&ServerMessage::Update {
            dependency: DependencyUpdate {
                caller: record.caller,
                callee: record.callee,
                latency: observation.latency_ms,
                dependency_type: record.dependency_type,
                weight: record.weight,
                avg_latency_ms: record.avg_latency_ms,
            },
        });

        self.check_alerts();
    }

    /// Re-run cycle and SPOF detection and broadcast whatever is found.
    pub fn check_alerts(&self) -> Vec<Alert> {
        let graph = self.current_graph();
        let analyzer = GraphAnalyzer::new(&graph);
        let mut alerts = Vec::new();

        let cycles = analyzer.find_cycles();
        if !cycles.is_empty() {
            alerts.push(Alert::Cycle { cycles });
        }

        let mut spofs = analyzer.find_single_points_of_failure(self.analysis.spof_threshold);
        if !spofs.is_empty() {
            spofs.truncate(self.analysis.spof_alert_limit);
            alerts.push(Alert::Spof { spofs });
        }

        for alert in &alerts {
            self.broadcast(&ServerMessage::Alert(alert.clone()));
        }
        alerts
    }

    /// Rebuild the graph from the full log history without broadcasting.
    /// A missing log is treated as empty.
    pub async fn replay(&self, path: &Path) -> crate::Result<ReplaySummary> {
        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No log history to replay");
                return Ok(ReplaySummary::default());
            }
            Err(err) => return Err(err.into()),
        };

        // Only complete lines are replayed; a trailing partial line is left for the tailer.
        let complete = content
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);
        let batch = self.parser.parse_bytes(&content[..complete]);

        {
            let mut graph = self.graph.write();
            for observation in &batch.observations {
                graph.record(observation);
            }
        }

        let summary = ReplaySummary {
            applied: batch.observations.len(),
            skipped: batch.skipped,
            offset: complete as u64,
        };
        info!(
            applied = summary.applied,
            skipped = summary.skipped,
            "Replayed log history from {}",
            path.display()
        );
        Ok(summary)
    }

    /// Poll `path` for appended lines until `shutdown` flips to `true`.
    pub async fn run_tailer(&self, path: PathBuf, start_offset: u64, mut shutdown: watch::Receiver<bool>) {
        let mut tailer = LogTailer::new(path, start_offset);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(path = %tailer.path().display(), "Tailing log every {:?}", self.poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for line in tailer.poll().await {
                        self.ingest_line(&line);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Log tailer stopping");
                        break;
                    }
                }
            }
        }
    }

    // --- queries -----------------------------------------------------------

    pub fn simulate_failure(&self, service: &str) -> ImpactResult {
        let graph = self.current_graph();
        ImpactSimulator::with_critical_path_count(&graph, &self.catalog, self.analysis.critical_path_top_n)
            .simulate_failure(service)
    }

    pub fn critical_paths(&self) -> Vec<CriticalPath> {
        let graph = self.current_graph();
        GraphAnalyzer::new(&graph).critical_paths(self.analysis.critical_path_top_n)
    }

    pub fn analyze_change(&self, proposal: &ChangeProposal) -> ChangeAssessment {
        let graph = self.current_graph();
        ImpactSimulator::with_critical_path_count(&graph, &self.catalog, self.analysis.critical_path_top_n)
            .analyze_change(proposal)
    }

    pub fn handle_client_message(&self, message: ClientMessage) -> ServerMessage {
        match message {
            ClientMessage::GetImpact { service } => ServerMessage::ImpactResult {
                impact: self.simulate_failure(&service),
            },
            ClientMessage::GetCriticalPaths => ServerMessage::CriticalPaths {
                paths: self.critical_paths(),
            },
        }
    }

    /// Decode and answer a raw client frame.
    pub fn handle_client_text(&self, text: &str) -> ServerMessage {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle_client_message(message),
            Err(err) => {
                debug!(%err, "Rejected client message");
                ServerMessage::Error {
                    message: format!("unrecognized request: {}", err),
                }
            }
        }
    }
}

/// Reads whatever has been appended to a log since the last poll.
///
/// A trailing line without a newline is held back until it is completed. If
/// the file shrinks it is assumed to have been truncated and is re-read from
/// the start.
pub struct LogTailer {
    path: PathBuf,
    offset: u64,
    pending: Vec<u8>,
}

impl LogTailer {
    pub fn new(path: PathBuf, offset: u64) -> Self {
        Self {
            path,
            offset,
            pending: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Complete lines appended since the previous poll. Missing or unreadable
    /// files yield nothing and are retried next time.
    pub async fn poll(&mut self) -> Vec<String> {
        match self.read_appended().await {
            Ok(lines) => lines,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "Could not read log");
                Vec::new()
            }
        }
    }

    async fn read_appended(&mut self) -> std::io::Result<Vec<String>> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();

        if len < self.offset {
            info!(path = %self.path.display(), "Log truncated, restarting from the beginning");
            self.offset = 0;
            self.pending.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut buffer = Vec::with_capacity((len - self.offset) as usize);
        let read = file.read_to_end(&mut buffer).await?;
        self.offset += read as u64;
        self.pending.extend_from_slice(&buffer);

        // Bytes are held until their line is complete, so a multi-byte
        // character split across polls is decoded whole.
        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Ok(Vec::new());
        };
        let remainder = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, remainder);

        let mut lines = Vec::new();
        for line in split_lines(&complete) {
            match line {
                Some(line) => lines.push(line.to_string()),
                None => debug!(path = %self.path.display(), "Skipping log line that is not valid UTF-8"),
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn server_with_buffer(buffer: usize) -> StreamingServer {
        let mut config = Config::default();
        config.server.subscriber_buffer = buffer;
        StreamingServer::new(SharedGraph::default(), &config).unwrap()
    }

    #[tokio::test]
    async fn connect_sends_snapshot_and_activates() {
        let server = server_with_buffer(8);
        server.ingest_line("A -> B 5ms");

        let mut sub = server.connect();
        assert_eq!(server.subscriber_state(sub.id), SubscriberState::Active);

        match sub.receiver.recv().await.unwrap() {
            ServerMessage::Init { data } => {
                assert_eq!(data.nodes, vec!["A", "B"]);
                assert_eq!(data.edges.len(), 1);
            }
            other => panic!("expected init, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn ingested_line_is_broadcast_as_update() {
        let server = server_with_buffer(8);
        let mut sub = server.connect();
        let _init = sub.receiver.recv().await.unwrap();

        assert!(server.ingest_line("[2025-01-30 10:00:01] WebApp called AuthService GET /api/validate 45ms"));
        assert!(!server.ingest_line("not a log line"));

        match sub.receiver.recv().await.unwrap() {
            ServerMessage::Update { dependency } => {
                assert_eq!(dependency.caller, "WebApp");
                assert_eq!(dependency.callee, "AuthService");
                assert_eq!(dependency.latency, 45);
                assert_eq!(dependency.dependency_type, DependencyType::Http);
            }
            other => panic!("expected update, got {:?}", other),
        }
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn cycle_and_spof_alerts_follow_mutation() {
        let server = server_with_buffer(64);
        for line in ["A -> B 1ms", "B -> C 1ms", "X -> C 1ms", "Y -> C 1ms"] {
            server.ingest_line(line);
        }
        let mut sub = server.connect();
        let _init = sub.receiver.recv().await.unwrap();

        server.ingest_line("C -> A 1ms");

        let mut received = Vec::new();
        while let Ok(message) = sub.receiver.try_recv() {
            received.push(message);
        }
        assert!(matches!(received[0], ServerMessage::Update { .. }));
        assert!(received.iter().any(|m| matches!(
            m,
            ServerMessage::Alert(Alert::Cycle { cycles }) if cycles[0] == vec!["A", "B", "C", "A"]
        )));
        assert!(received.iter().any(|m| matches!(
            m,
            ServerMessage::Alert(Alert::Spof { spofs }) if spofs[0].service == "C" && spofs[0].in_degree == 3
        )));
    }

    #[tokio::test]
    async fn stalled_subscriber_is_pruned_without_affecting_others() {
        let server = server_with_buffer(1);
        let mut healthy = server.connect();
        let stalled = server.connect();
        let _init = healthy.receiver.recv().await.unwrap();

        server.ingest_line("A -> B 5ms");

        assert_eq!(server.subscriber_state(healthy.id), SubscriberState::Active);
        assert_eq!(server.subscriber_state(stalled.id), SubscriberState::Disconnected);
        assert!(matches!(
            healthy.receiver.recv().await.unwrap(),
            ServerMessage::Update { .. }
        ));
    }

    #[tokio::test]
    async fn closed_subscriber_is_pruned() {
        let server = server_with_buffer(8);
        let sub = server.connect();
        drop(sub.receiver);

        assert_eq!(server.broadcast(&ServerMessage::Error { message: "x".into() }), 0);
        assert_eq!(server.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn disconnect_removes_immediately() {
        let server = server_with_buffer(8);
        let sub = server.connect();
        server.disconnect(sub.id);
        assert_eq!(server.subscriber_state(sub.id), SubscriberState::Disconnected);
        assert_eq!(server.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_joining_mid_stream_sees_every_edge() {
        let server = Arc::new(server_with_buffer(4096));
        let writer = {
            let server = Arc::clone(&server);
            std::thread::spawn(move || {
                for i in 0..500 {
                    server.ingest_line(&format!("S{} -> T{} 1ms", i, i));
                }
            })
        };
        let mut sub = server.connect();
        writer.join().unwrap();

        let mut seen = std::collections::HashSet::new();
        while let Ok(message) = sub.receiver.try_recv() {
            match message {
                ServerMessage::Init { data } => {
                    seen.extend(data.edges.into_iter().map(|edge| (edge.caller, edge.callee)));
                }
                ServerMessage::Update { dependency } => {
                    seen.insert((dependency.caller, dependency.callee));
                }
                _ => {}
            }
        }
        assert_eq!(seen.len(), 500);
        assert_eq!(server.graph().read().edge_count(), 500);
    }

    #[test]
    fn hook_sees_every_broadcast() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let server = server_with_buffer(8).with_broadcast_hook(Arc::new(move |message: &ServerMessage| {
            sink.lock().push(message.clone());
        }));

        server.ingest_line("A -> B 5ms");
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn client_queries_are_answered() {
        let server = server_with_buffer(8);
        for line in ["A -> C 1ms", "B -> C 1ms", "D -> C 1ms"] {
            server.ingest_line(line);
        }

        match server.handle_client_text(r#"{"type":"get_impact","service":"C"}"#) {
            ServerMessage::ImpactResult { impact } => {
                assert_eq!(impact.affected_services, vec!["A", "B", "D"]);
                assert_eq!(impact.blast_radius, 3);
            }
            other => panic!("expected impact result, got {:?}", other),
        }

        match server.handle_client_text(r#"{"type":"get_critical_paths"}"#) {
            ServerMessage::CriticalPaths { paths } => assert_eq!(paths[0].path, vec!["A", "C"]),
            other => panic!("expected critical paths, got {:?}", other),
        }

        assert!(matches!(
            server.handle_client_text("{\"type\":\"explode\"}"),
            ServerMessage::Error { .. }
        ));
    }

    #[test]
    fn messages_use_wire_format() {
        let alert = ServerMessage::Alert(Alert::Cycle {
            cycles: vec![vec!["A".into(), "A".into()]],
        });
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "alert");
        assert_eq!(json["alert_type"], "cycle");
        assert_eq!(json["cycles"][0][1], "A");

        let paths = ServerMessage::CriticalPaths {
            paths: vec![CriticalPath {
                path: vec!["A".into(), "B".into()],
                latency: 12.0,
            }],
        };
        let json = serde_json::to_value(&paths).unwrap();
        assert_eq!(json["type"], "critical_paths");
        assert_eq!(json["paths"][0]["latency"], 12.0);
    }

    #[tokio::test]
    async fn tailer_reads_only_appended_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        let mut tailer = LogTailer::new(path.clone(), 0);

        assert!(tailer.poll().await.is_empty(), "missing file is not an error");

        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "A -> B 1ms\nB -> C 2").unwrap();
        file.flush().unwrap();
        assert_eq!(tailer.poll().await, vec!["A -> B 1ms"]);

        writeln!(file, "ms").unwrap();
        file.flush().unwrap();
        assert_eq!(tailer.poll().await, vec!["B -> C 2ms"]);
        assert!(tailer.poll().await.is_empty());
    }

    #[tokio::test]
    async fn tailer_keeps_multibyte_characters_split_across_polls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        let mut tailer = LogTailer::new(path.clone(), 0);

        let line = "Zahlungsdienst-ü -> B 1ms\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&line[..split]).unwrap();
        file.flush().unwrap();
        assert!(tailer.poll().await.is_empty());

        file.write_all(&line[split..]).unwrap();
        file.flush().unwrap();
        assert_eq!(tailer.poll().await, vec!["Zahlungsdienst-ü -> B 1ms"]);
    }

    #[tokio::test]
    async fn tailer_skips_invalid_utf8_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        std::fs::write(&path, b"A -> B 1ms\n\xff\xfe\nB -> C 1ms\n").unwrap();

        let mut tailer = LogTailer::new(path, 0);
        assert_eq!(tailer.poll().await, vec!["A -> B 1ms", "B -> C 1ms"]);
    }

    #[tokio::test]
    async fn tailer_restarts_after_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        std::fs::write(&path, "A -> B 1ms\nA -> C 1ms\n").unwrap();
        let mut tailer = LogTailer::new(path.clone(), 0);
        assert_eq!(tailer.poll().await.len(), 2);

        std::fs::write(&path, "X -> Y 1ms\n").unwrap();
        assert_eq!(tailer.poll().await, vec!["X -> Y 1ms"]);
    }

    #[tokio::test]
    async fn replay_rebuilds_graph_and_reports_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        std::fs::write(&path, "A -> B 1ms\ngarbage\nB -> C 3ms\nC -> D").unwrap();

        let server = server_with_buffer(8);
        let summary = server.replay(&path).await.unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.offset, "A -> B 1ms\ngarbage\nB -> C 3ms\n".len() as u64);
        assert_eq!(server.graph().read().edge_count(), 2);

        let missing = server.replay(&dir.path().join("nope.log")).await.unwrap();
        assert_eq!(missing.applied, 0);
    }
}
