//! The backend capability seam.

use crate::error::DbResult;
use crate::params::SqlValue;
use serde_json::Value as JsonValue;

/// Outcome of executing one statement.
///
/// Which variant applies is determined by whether the database response
/// carries column metadata: a SELECT-shaped statement (including
/// `INSERT .. RETURNING`) produces [`Execution::Rows`], a write-shaped
/// statement produces [`Execution::Affected`].
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// Column names plus row tuples, both in response order.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<JsonValue>>,
    },
    /// Count of affected rows.
    Affected(u64),
}

/// Snapshot of pool state for failure diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    /// Whether the pool has been opened.
    pub open: bool,
    /// Live connections (in use plus idle).
    pub size: u32,
    /// Idle connections.
    pub idle: u32,
}

impl PoolStats {
    /// Stats for a pool that has not been opened.
    pub fn closed() -> Self {
        Self {
            open: false,
            size: 0,
            idle: 0,
        }
    }
}

/// Capability interface over the database driver.
///
/// The execution loop and both client variants are generic over this
/// trait, so the blocking and async entry points share one implementation
/// and cannot diverge in retry counts, error classification or result
/// shape. `execute` returns the classified [`Execution`] directly, which
/// covers the column-metadata inspection, row fetch and affected-count
/// calls of the driver in one scoped operation.
#[allow(async_fn_in_trait)]
pub trait Backend: Send + Sync {
    /// A connection borrowed for a single execution attempt. Dropping it
    /// must return it to the pool.
    type Conn: Send;

    /// Open the pool if it is not already open. Idempotent: concurrent
    /// first callers must result in exactly one underlying open.
    async fn open_pool(&self) -> DbResult<()>;

    /// Close the pool. Safe to call when the pool was never opened; a
    /// later [`Backend::open_pool`] re-opens it.
    async fn close_pool(&self);

    /// Borrow one connection, suspending until one is free.
    async fn acquire(&self) -> DbResult<Self::Conn>;

    /// Execute one statement with bound parameters on the given
    /// connection and classify the outcome.
    async fn execute(
        &self,
        conn: &mut Self::Conn,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<Execution>;

    /// Snapshot pool statistics for diagnostics.
    async fn stats(&self) -> PoolStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_stats_closed() {
        let stats = PoolStats::closed();
        assert!(!stats.open);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_execution_variants() {
        let rows = Execution::Rows {
            columns: vec!["id".to_string()],
            rows: vec![vec![serde_json::json!(1)]],
        };
        assert_ne!(rows, Execution::Affected(1));
    }
}
