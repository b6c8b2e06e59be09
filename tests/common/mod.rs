#![allow(dead_code)]

//! Scripted mock backend shared by the integration tests.
//!
//! Each `execute` call consumes the next scripted response. Counters
//! expose how often the underlying pool was opened, how many execute
//! calls ran, and how many connections are still live (acquired and not
//! yet returned), so tests can pin retry counts and leak-freedom.

use pgtempl::{Backend, DbError, DbResult, Execution, PoolStats, SqlValue};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once, PoisonError};

/// Install a tracing subscriber for test runs, once per process.
/// Controlled via `RUST_LOG`, quiet by default.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// One scripted response for an execute call.
pub enum Script {
    Rows {
        columns: Vec<&'static str>,
        rows: Vec<Vec<JsonValue>>,
    },
    Affected(u64),
    Fail(DbError),
    /// Never resolves; used to test cancellation.
    Hang,
}

/// A single-row SELECT script over (id, name) columns.
pub fn one_user_row(id: i64, name: &str) -> Script {
    Script::Rows {
        columns: vec!["id", "name"],
        rows: vec![vec![serde_json::json!(id), serde_json::json!(name)]],
    }
}

pub struct MockBackend {
    opened: tokio::sync::Mutex<bool>,
    script: Mutex<VecDeque<Script>>,
    pub underlying_opens: AtomicU32,
    pub open_calls: AtomicU32,
    pub execute_calls: AtomicU32,
    live: Arc<AtomicI64>,
    /// Every executed statement with its bound parameters, in order.
    statements: Mutex<Vec<(String, Vec<SqlValue>)>>,
}

impl MockBackend {
    pub fn new(script: Vec<Script>) -> Self {
        Self {
            opened: tokio::sync::Mutex::new(false),
            script: Mutex::new(script.into()),
            underlying_opens: AtomicU32::new(0),
            open_calls: AtomicU32::new(0),
            execute_calls: AtomicU32::new(0),
            live: Arc::new(AtomicI64::new(0)),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn live_connections(&self) -> i64 {
        self.live.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub struct MockConn {
    live: Arc<AtomicI64>,
}

impl Drop for MockConn {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Backend for MockBackend {
    type Conn = MockConn;

    async fn open_pool(&self) -> DbResult<()> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let mut opened = self.opened.lock().await;
        if !*opened {
            // Widen the race window for concurrent first callers.
            tokio::task::yield_now().await;
            self.underlying_opens.fetch_add(1, Ordering::SeqCst);
            *opened = true;
        }
        Ok(())
    }

    async fn close_pool(&self) {
        *self.opened.lock().await = false;
    }

    async fn acquire(&self) -> DbResult<MockConn> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(MockConn {
            live: Arc::clone(&self.live),
        })
    }

    async fn execute(
        &self,
        _conn: &mut MockConn,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<Execution> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut statements = self
                .statements
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            statements.push((sql.to_string(), params.to_vec()));
        }

        let next = {
            let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
            script.pop_front()
        };
        match next {
            Some(Script::Rows { columns, rows }) => Ok(Execution::Rows {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            }),
            Some(Script::Affected(count)) => Ok(Execution::Affected(count)),
            Some(Script::Fail(err)) => Err(err),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(DbError::internal("mock script exhausted")),
        }
    }

    async fn stats(&self) -> PoolStats {
        PoolStats {
            open: *self.opened.lock().await,
            size: self.live.load(Ordering::SeqCst).max(0) as u32,
            idle: 0,
        }
    }
}
