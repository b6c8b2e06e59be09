//! The async client façade.
//!
//! [`Client`] is the one object an application touches: it owns the
//! template cache, the field-list cache and the execution engine, and
//! composes them behind `query` / `query_raw`. It is generic over the
//! backend seam so the blocking variant and tests share the exact same
//! pipeline.

use crate::db::backend::{Backend, Execution};
use crate::db::engine::Engine;
use crate::db::mapper;
use crate::db::pool::PgBackend;
use crate::error::DbResult;
use crate::model::{FieldListCache, OutputModel};
use crate::params::{MODEL_FIELDS_PARAM, Params};
use crate::settings::ConnectSettings;
use crate::template::{self, RenderedQuery, TemplateCache};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One untyped result row, in response column order.
pub type RawRow = Vec<JsonValue>;

/// Result of a query: either rows or an affected-row count.
///
/// Which variant applies depends on the statement, not on the caller:
/// a write-shaped statement produces [`QueryOutput::Affected`] even when
/// an output type was supplied.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput<T> {
    /// Result rows of a SELECT-shaped statement.
    Rows(Vec<T>),
    /// Affected-row count of a write-shaped statement.
    Affected(u64),
}

impl<T> QueryOutput<T> {
    /// The rows, if this was a SELECT-shaped result.
    pub fn rows(self) -> Option<Vec<T>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Affected(_) => None,
        }
    }

    /// The affected-row count, if this was a write-shaped result.
    pub fn affected(self) -> Option<u64> {
        match self {
            Self::Rows(_) => None,
            Self::Affected(count) => Some(count),
        }
    }
}

/// Asynchronous templated-query client.
///
/// Construction validates the settings but does not connect; the pool
/// opens lazily on the first query. Cheap to share behind an `Arc`.
pub struct Client<B: Backend = PgBackend> {
    engine: Engine<B>,
    templates: TemplateCache,
    fields: FieldListCache,
}

impl Client<PgBackend> {
    /// Create a client from connection settings.
    pub fn new(settings: ConnectSettings) -> DbResult<Self> {
        let backend = PgBackend::new(&settings)?;
        Ok(Self::with_backend(backend, settings.template_dir))
    }
}

impl<B: Backend> Client<B> {
    /// Create a client over a custom backend, e.g. a mock in tests.
    pub fn with_backend(backend: B, template_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine: Engine::new(backend),
            templates: TemplateCache::new(template_dir),
            fields: FieldListCache::new(),
        }
    }

    /// Override the retry attempt bound (default 2).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.engine = self.engine.with_max_attempts(max_attempts);
        self
    }

    /// Override the per-attempt statement timeout (default 30s).
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.engine = self.engine.with_query_timeout(query_timeout);
        self
    }

    /// Execute a template and map result rows into `T`.
    ///
    /// The reserved `_model_fields_` variable is bound to `T`'s
    /// comma-separated column list before rendering, so a template can
    /// write `SELECT {{ _model_fields_ }} FROM ...` and receive exactly
    /// the caller's expected columns. A write-shaped statement returns
    /// [`QueryOutput::Affected`] and performs no mapping.
    pub async fn query<T: OutputModel>(
        &self,
        template: impl AsRef<Path>,
        params: Params,
    ) -> DbResult<QueryOutput<T>> {
        let mut params = params;
        params.insert(
            MODEL_FIELDS_PARAM,
            JsonValue::String(self.fields.columns::<T>().to_string()),
        );
        let rendered = self.render(template.as_ref(), &params)?;
        let outcome = self
            .engine
            .run(&rendered.sql, &rendered.params, Some(T::model_name()))
            .await?;
        match outcome {
            Execution::Rows { columns, rows } => {
                Ok(QueryOutput::Rows(mapper::map_rows::<T>(&columns, rows)?))
            }
            Execution::Affected(count) => Ok(QueryOutput::Affected(count)),
        }
    }

    /// Execute a template without an output type; SELECT-shaped results
    /// come back as raw tuples.
    pub async fn query_raw(
        &self,
        template: impl AsRef<Path>,
        params: Params,
    ) -> DbResult<QueryOutput<RawRow>> {
        let rendered = self.render(template.as_ref(), &params)?;
        let outcome = self.engine.run(&rendered.sql, &rendered.params, None).await?;
        match outcome {
            Execution::Rows { rows, .. } => Ok(QueryOutput::Rows(rows)),
            Execution::Affected(count) => Ok(QueryOutput::Affected(count)),
        }
    }

    /// Close the connection pool. Safe when the pool was never opened;
    /// a later query re-opens it.
    pub async fn close(&self) {
        self.engine.backend().close_pool().await;
    }

    /// The backend, mainly for tests and diagnostics.
    pub fn backend(&self) -> &B {
        self.engine.backend()
    }

    fn render(&self, template: &Path, params: &Params) -> DbResult<RenderedQuery> {
        let text = self.templates.read(template)?;
        template::render(&template.to_string_lossy(), &text, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_output_accessors() {
        let rows: QueryOutput<i32> = QueryOutput::Rows(vec![1, 2]);
        assert_eq!(rows.clone().rows(), Some(vec![1, 2]));
        assert_eq!(rows.affected(), None);

        let affected: QueryOutput<i32> = QueryOutput::Affected(3);
        assert_eq!(affected.clone().rows(), None);
        assert_eq!(affected.affected(), Some(3));
    }

    #[test]
    fn test_new_validates_settings() {
        assert!(Client::new(ConnectSettings::new("", "")).is_err());
        assert!(Client::new(ConnectSettings::new("alice", "secret")).is_ok());
    }
}
