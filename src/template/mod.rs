//! SQL template loading and rendering.
//!
//! Templates are UTF-8 files under a configured root, written in Jinja
//! style markup. [`cache::TemplateCache`] reads each file once per process
//! lifetime; [`render::render`] turns template text plus a parameter map
//! into a final statement with every interpolated value bound as a
//! placeholder.

pub mod cache;
pub mod render;

pub use cache::TemplateCache;
pub use render::{RenderedQuery, render};
