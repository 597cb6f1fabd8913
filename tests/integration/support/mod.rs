#![allow(dead_code)]

use async_trait::async_trait;
use cypherkit::query::ParamMap;
use cypherkit::{
    ConnectionConfig, ConnectionRegistry, Connector, ExecutionError, GraphAdapter, GraphExecutor,
    RawEntity, RawRow,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

pub const CONN: &str = "neo4j";

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("cypherkit=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

/// Executor that records every statement and replays queued responses.
/// An empty queue answers with no rows.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<Vec<RawRow>, ExecutionError>>>,
    sent: Mutex<Vec<(String, ParamMap)>>,
}

impl ScriptedExecutor {
    pub fn push_rows(&self, rows: Vec<RawRow>) {
        self.responses.lock().push_back(Ok(rows));
    }

    pub fn push_error(&self, err: ExecutionError) {
        self.responses.lock().push_back(Err(err));
    }

    pub fn sent(&self) -> Vec<(String, ParamMap)> {
        self.sent.lock().clone()
    }

    pub fn last(&self) -> (String, ParamMap) {
        self.sent
            .lock()
            .last()
            .cloned()
            .expect("no statement was sent")
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl GraphExecutor for ScriptedExecutor {
    async fn execute(&self, query: &str, params: &ParamMap) -> Result<Vec<RawRow>, ExecutionError> {
        self.sent.lock().push((query.to_string(), params.clone()));
        self.responses.lock().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

/// Connector handing out one shared [`ScriptedExecutor`].
pub struct ScriptedConnector {
    pub executor: Arc<ScriptedExecutor>,
    pub opened: AtomicUsize,
    pub fail_first: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            executor: Arc::new(ScriptedExecutor::default()),
            opened: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(0),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        _identity: &str,
        _config: &ConnectionConfig,
    ) -> Result<Arc<dyn GraphExecutor>, ExecutionError> {
        tokio::task::yield_now().await;
        let failures_left = self.fail_first.load(Ordering::SeqCst);
        if failures_left > 0 {
            self.fail_first.store(failures_left - 1, Ordering::SeqCst);
            return Err(ExecutionError::transport("connection refused"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let executor: Arc<dyn GraphExecutor> = self.executor.clone();
        Ok(executor)
    }
}

/// Adapter with `CONN` registered against a scripted executor.
pub fn adapter_with(config: ConnectionConfig) -> (GraphAdapter, Arc<ScriptedConnector>) {
    init_tracing();
    let connector = Arc::new(ScriptedConnector::new());
    let registry = Arc::new(ConnectionRegistry::new(connector.clone()));
    let adapter = GraphAdapter::new(registry);
    adapter
        .register_connection(CONN, config)
        .expect("register connection");
    (adapter, connector)
}

pub fn adapter() -> (GraphAdapter, Arc<ScriptedConnector>) {
    adapter_with(ConnectionConfig::default())
}

pub fn props(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn row(alias: &str, entity: RawEntity) -> RawRow {
    let mut row = RawRow::new();
    row.insert(alias.to_string(), entity);
    row
}
