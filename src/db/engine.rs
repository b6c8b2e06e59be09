//! The execution loop.
//!
//! [`Engine::run`] drives one rendered statement through the backend:
//! ensure the pool is open, then acquire, execute and classify, retrying
//! transient failures immediately (no backoff) up to the attempt bound.
//! Every attempt outcome is tagged explicitly as success, retryable or
//! fatal; the loop is driven by that tag rather than by catching a broad
//! error type. Cancellation (dropping the future) aborts mid-await and is
//! never reinterpreted as a retryable failure; the in-flight connection
//! returns to the pool when its guard drops.

use crate::db::backend::{Backend, Execution};
use crate::error::{DbError, DbResult};
use crate::params::SqlValue;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Default attempt bound: one try plus one retry.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Default per-attempt statement timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Outcome of a single execution attempt.
enum Attempt {
    Success(Execution),
    Retry(DbError),
    Fatal(DbError),
}

fn classify(err: DbError) -> Attempt {
    if err.is_retryable() {
        Attempt::Retry(err)
    } else {
        Attempt::Fatal(err)
    }
}

/// Bounded retry loop around statement execution.
pub struct Engine<B: Backend> {
    backend: B,
    max_attempts: u32,
    query_timeout: Duration,
}

impl<B: Backend> Engine<B> {
    /// Create an engine with default attempt bound and timeout.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    /// Override the attempt bound. Values below 1 are clamped to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Override the per-attempt statement timeout.
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Execute a rendered statement, retrying transient failures.
    ///
    /// `model` names the target output type for diagnostics; `None` for
    /// raw queries. The final failure after exhausting attempts is
    /// returned unchanged.
    pub async fn run(
        &self,
        sql: &str,
        params: &[SqlValue],
        model: Option<&str>,
    ) -> DbResult<Execution> {
        self.backend.open_pool().await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_once(sql, params).await {
                Attempt::Success(outcome) => {
                    debug!(attempt, "Query succeeded");
                    return Ok(outcome);
                }
                Attempt::Fatal(err) => {
                    self.log_failure(&err, sql, params, model, attempt).await;
                    return Err(err);
                }
                Attempt::Retry(err) => {
                    self.log_failure(&err, sql, params, model, attempt).await;
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    // Immediate retry; no backoff between attempts.
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "Retrying query"
                    );
                }
            }
        }
    }

    async fn try_once(&self, sql: &str, params: &[SqlValue]) -> Attempt {
        let mut conn = match self.backend.acquire().await {
            Ok(conn) => conn,
            Err(err) => return classify(err),
        };

        // `conn` drops at the end of the attempt on every path, returning
        // the connection to the pool.
        match timeout(
            self.query_timeout,
            self.backend.execute(&mut conn, sql, params),
        )
        .await
        {
            Ok(Ok(outcome)) => Attempt::Success(outcome),
            Ok(Err(err)) => classify(err),
            Err(_) => classify(DbError::timeout(
                "query execution",
                self.query_timeout.as_secs(),
            )),
        }
    }

    async fn log_failure(
        &self,
        err: &DbError,
        sql: &str,
        params: &[SqlValue],
        model: Option<&str>,
        attempt: u32,
    ) {
        let stats = self.backend.stats().await;
        error!(
            error = %err,
            sql = %sql,
            params = ?params,
            model = model.unwrap_or("(raw)"),
            attempt,
            pool_stats = ?stats,
            "Query attempt failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::backend::PoolStats;

    struct NoopBackend;

    impl Backend for NoopBackend {
        type Conn = ();

        async fn open_pool(&self) -> DbResult<()> {
            Ok(())
        }

        async fn close_pool(&self) {}

        async fn acquire(&self) -> DbResult<()> {
            Ok(())
        }

        async fn execute(
            &self,
            _conn: &mut (),
            _sql: &str,
            _params: &[SqlValue],
        ) -> DbResult<Execution> {
            Ok(Execution::Affected(0))
        }

        async fn stats(&self) -> PoolStats {
            PoolStats::closed()
        }
    }

    #[test]
    fn test_engine_defaults() {
        let engine = Engine::new(NoopBackend);
        assert_eq!(engine.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(
            engine.query_timeout,
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_max_attempts_clamped_to_one() {
        let engine = Engine::new(NoopBackend).with_max_attempts(0);
        assert_eq!(engine.max_attempts, 1);
    }

    #[test]
    fn test_classify_tags() {
        assert!(matches!(
            classify(DbError::connection("lost")),
            Attempt::Retry(_)
        ));
        assert!(matches!(
            classify(DbError::database("syntax", None)),
            Attempt::Fatal(_)
        ));
    }

    #[tokio::test]
    async fn test_run_write_shaped() {
        let engine = Engine::new(NoopBackend);
        let got = engine.run("DELETE FROM t", &[], None).await.unwrap();
        assert_eq!(got, Execution::Affected(0));
    }
}
