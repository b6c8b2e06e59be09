//! pgtempl - PostgreSQL queries from SQL template files.
//!
//! SQL lives in template files instead of string concatenation; parameter
//! values are rendered as placeholder bindings, never as SQL text; result
//! rows map into declared output types.
//!
//! Features:
//! - SQL queries as Jinja-style templates, read once and cached
//! - Safe parameter binding for every interpolated value
//! - Lazily opened, bounded connection pooling
//! - Immediate retry of transient failures with a small attempt bound
//! - Typed result mapping via [`output_model!`], or raw tuples
//! - Async and blocking clients with identical contracts
//!
//! ```no_run
//! use pgtempl::{Client, ConnectSettings, QueryOutput, output_model, params};
//!
//! output_model! {
//!     #[derive(Debug)]
//!     pub struct Merchant {
//!         id: i64,
//!         name: String,
//!     }
//! }
//!
//! # async fn demo() -> pgtempl::DbResult<()> {
//! let settings = ConnectSettings::new("shop", "secret")
//!     .host("db.internal")
//!     .dbname("shop")
//!     .template_dir("templates");
//! let client = Client::new(settings)?;
//!
//! // templates/select_merchant.sql:
//! //   SELECT {{ _model_fields_ }} FROM merchant LIMIT {{ limit }}
//! let result = client
//!     .query::<Merchant>("select_merchant.sql", params! { "limit" => 3 })
//!     .await?;
//! if let QueryOutput::Rows(merchants) = result {
//!     println!("{merchants:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod client;
pub mod db;
pub mod error;
pub mod model;
pub mod params;
pub mod settings;
pub mod template;

pub use blocking::BlockingClient;
pub use client::{Client, QueryOutput, RawRow};
pub use db::backend::{Backend, Execution, PoolStats};
pub use db::engine::{DEFAULT_MAX_ATTEMPTS, DEFAULT_QUERY_TIMEOUT_SECS, Engine};
pub use db::pool::PgBackend;
pub use error::{DbError, DbResult};
pub use model::{FieldListCache, OutputModel};
pub use params::{MODEL_FIELDS_PARAM, Params, SqlValue};
pub use settings::ConnectSettings;
pub use template::{RenderedQuery, TemplateCache};
