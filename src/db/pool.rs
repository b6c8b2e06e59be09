//! PostgreSQL backend: pool lifecycle and statement execution.
//!
//! The pool opens lazily on first use behind a mutex-guarded state
//! transition, so concurrent first callers produce exactly one underlying
//! open. Acquired connections are scoped to a single execution attempt
//! and return to the pool on drop, on every exit path.

use crate::db::backend::{Backend, Execution, PoolStats};
use crate::db::decode;
use crate::error::{DbError, DbResult};
use crate::params::SqlValue;
use crate::settings::ConnectSettings;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions};
use sqlx::{Column, Executor, PgPool, Postgres, Statement};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Timeout for acquiring a connection from the pool.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Pool lifecycle: `Closed -> Open -> Closed`.
enum PoolState {
    Closed,
    Open(PgPool),
}

/// Production [`Backend`] over a lazily opened sqlx Postgres pool.
pub struct PgBackend {
    options: PgConnectOptions,
    min_size: u32,
    max_size: u32,
    state: Mutex<PoolState>,
    /// `host:port/dbname`, for log lines. No credentials.
    display: String,
}

impl PgBackend {
    /// Build a backend from validated settings. Does not connect; the
    /// pool opens on first query.
    pub fn new(settings: &ConnectSettings) -> DbResult<Self> {
        let options = settings.connect_options()?;
        Ok(Self {
            options,
            min_size: settings.min_size,
            max_size: settings.max_size_or_default(),
            state: Mutex::new(PoolState::Closed),
            display: settings.to_string(),
        })
    }

    /// Clone the pool handle out of the state without holding the lock
    /// across driver calls.
    async fn pool(&self) -> DbResult<PgPool> {
        match &*self.state.lock().await {
            PoolState::Open(pool) => Ok(pool.clone()),
            PoolState::Closed => Err(DbError::connection("connection pool is not open")),
        }
    }
}

impl std::fmt::Debug for PgBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgBackend")
            .field("db", &self.display)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl Backend for PgBackend {
    type Conn = PoolConnection<Postgres>;

    async fn open_pool(&self) -> DbResult<()> {
        // Check-and-set under the lock: concurrent first callers
        // serialize here, so the pool is built at most once.
        let mut state = self.state.lock().await;
        if matches!(*state, PoolState::Open(_)) {
            return Ok(());
        }

        debug!(
            db = %self.display,
            min_size = self.min_size,
            max_size = self.max_size,
            "Opening connection pool"
        );
        let pool = PgPoolOptions::new()
            .min_connections(self.min_size)
            .max_connections(self.max_size)
            .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
            .connect_with(self.options.clone())
            .await?;
        *state = PoolState::Open(pool);
        info!(db = %self.display, "Connection pool opened");
        Ok(())
    }

    async fn close_pool(&self) {
        let mut state = self.state.lock().await;
        if let PoolState::Open(pool) = std::mem::replace(&mut *state, PoolState::Closed) {
            pool.close().await;
            info!(db = %self.display, "Connection pool closed");
        }
    }

    async fn acquire(&self) -> DbResult<PoolConnection<Postgres>> {
        let pool = self.pool().await?;
        Ok(pool.acquire().await?)
    }

    async fn execute(
        &self,
        conn: &mut PoolConnection<Postgres>,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<Execution> {
        // The prepared statement's metadata tells SELECT-shaped from
        // write-shaped before anything runs.
        let statement = (&mut **conn).prepare(sql).await?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut query = sqlx::query(sql);
        for value in params {
            query = bind_value(query, value);
        }

        if columns.is_empty() {
            let done = query.execute(&mut **conn).await?;
            Ok(Execution::Affected(done.rows_affected()))
        } else {
            let rows = query.fetch_all(&mut **conn).await?;
            let rows = rows.iter().map(decode::row_values).collect();
            Ok(Execution::Rows { columns, rows })
        }
    }

    async fn stats(&self) -> PoolStats {
        match &*self.state.lock().await {
            PoolState::Open(pool) => PoolStats {
                open: true,
                size: pool.size(),
                idle: pool.num_idle() as u32,
            },
            PoolState::Closed => PoolStats::closed(),
        }
    }
}

/// Bind a parameter to a Postgres query.
fn bind_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &'q SqlValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
    }
}
