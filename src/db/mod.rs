//! Database execution layer.
//!
//! The [`backend::Backend`] trait is the seam between the execution loop
//! and the driver: the engine, the result mapper and both client variants
//! are written once against it. [`pool::PgBackend`] is the production
//! implementation over sqlx; tests substitute scripted mocks.

pub mod backend;
mod decode;
pub mod engine;
pub mod mapper;
pub mod pool;

pub use backend::{Backend, Execution, PoolStats};
pub use engine::{DEFAULT_MAX_ATTEMPTS, DEFAULT_QUERY_TIMEOUT_SECS, Engine};
pub use pool::PgBackend;
