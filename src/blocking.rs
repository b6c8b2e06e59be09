//! Blocking client variant.
//!
//! [`BlockingClient`] exposes the same operations as [`Client`] with
//! identical contracts; the only difference is that pool open, connection
//! acquisition, execution and row fetch block the calling thread instead
//! of suspending a task. Every call delegates to the shared generic
//! pipeline through a private current-thread runtime, so retry counts,
//! error classification and mapping cannot diverge between the two
//! variants.

use crate::client::{Client, QueryOutput, RawRow};
use crate::db::backend::Backend;
use crate::db::pool::PgBackend;
use crate::error::{DbError, DbResult};
use crate::model::OutputModel;
use crate::params::Params;
use crate::settings::ConnectSettings;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Blocking templated-query client.
pub struct BlockingClient<B: Backend = PgBackend> {
    inner: Client<B>,
    runtime: tokio::runtime::Runtime,
}

impl BlockingClient<PgBackend> {
    /// Create a blocking client from connection settings.
    pub fn new(settings: ConnectSettings) -> DbResult<Self> {
        Self::from_client(Client::new(settings)?)
    }
}

impl<B: Backend> BlockingClient<B> {
    /// Create a blocking client over a custom backend.
    pub fn with_backend(backend: B, template_dir: impl Into<PathBuf>) -> DbResult<Self> {
        Self::from_client(Client::with_backend(backend, template_dir))
    }

    fn from_client(inner: Client<B>) -> DbResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| DbError::internal(format!("failed to start runtime: {}", err)))?;
        Ok(Self { inner, runtime })
    }

    /// Override the retry attempt bound (default 2).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.inner = self.inner.with_max_attempts(max_attempts);
        self
    }

    /// Override the per-attempt statement timeout (default 30s).
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.inner = self.inner.with_query_timeout(query_timeout);
        self
    }

    /// Blocking form of [`Client::query`].
    pub fn query<T: OutputModel>(
        &self,
        template: impl AsRef<Path>,
        params: Params,
    ) -> DbResult<QueryOutput<T>> {
        self.runtime.block_on(self.inner.query(template, params))
    }

    /// Blocking form of [`Client::query_raw`].
    pub fn query_raw(
        &self,
        template: impl AsRef<Path>,
        params: Params,
    ) -> DbResult<QueryOutput<RawRow>> {
        self.runtime
            .block_on(self.inner.query_raw(template, params))
    }

    /// Blocking form of [`Client::close`].
    pub fn close(&self) {
        self.runtime.block_on(self.inner.close());
    }

    /// The backend, mainly for tests and diagnostics.
    pub fn backend(&self) -> &B {
        self.inner.backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_settings() {
        assert!(BlockingClient::new(ConnectSettings::new("", "")).is_err());
        assert!(BlockingClient::new(ConnectSettings::new("alice", "secret")).is_ok());
    }
}
