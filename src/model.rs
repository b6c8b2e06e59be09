//! Output types for typed query results.
//!
//! An output type declares its expected columns through [`OutputModel`]
//! and is constructed from a row via serde. The [`output_model!`] macro
//! generates both halves from one declaration so the column list and the
//! deserializer cannot drift apart: an alias contributes the alias to the
//! column list and becomes the serde rename; a plain field contributes
//! its declared name. Order follows declaration order.

use serde::de::DeserializeOwned;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A structured result type whose field metadata drives both the
/// `_model_fields_` column list and row-to-instance mapping.
///
/// Usually implemented via [`output_model!`]. Manual implementations must
/// keep `COLUMNS` consistent with the type's serde field names.
pub trait OutputModel: DeserializeOwned + Send + 'static {
    /// Column names in declaration order, alias-resolved.
    const COLUMNS: &'static [&'static str];

    /// Type name used in diagnostics.
    fn model_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Declare an output type.
///
/// Fields may carry an `#[alias = "column"]` attribute; the alias is used
/// as the column name in `_model_fields_` and as the key the field is read
/// from when mapping rows. The struct derives `serde::Deserialize`; add
/// further derives through regular attributes before the struct.
///
/// ```
/// use pgtempl::{output_model, OutputModel};
///
/// output_model! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub struct Merchant {
///         id: i64,
///         #[alias = "name"]
///         merchant_name: String,
///         email: String,
///     }
/// }
///
/// assert_eq!(Merchant::COLUMNS, &["id", "name", "email"]);
/// ```
#[macro_export]
macro_rules! output_model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[alias = $alias:literal])?
                $fvis:vis $field:ident : $fty:ty
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(::serde::Deserialize)]
        $vis struct $name {
            $(
                $(#[serde(rename = $alias)])?
                $fvis $field: $fty,
            )+
        }

        impl $crate::OutputModel for $name {
            const COLUMNS: &'static [&'static str] = &[
                $( $crate::output_model!(@column $field $(, $alias)?) ),+
            ];
        }
    };
    (@column $field:ident) => { stringify!($field) };
    (@column $field:ident, $alias:literal) => { $alias };
}

/// Per-type cache of the comma-joined column list.
///
/// Owned by the client rather than held in global state, so each test can
/// start from a fresh cache. Entries live for the lifetime of the cache.
#[derive(Debug, Default)]
pub struct FieldListCache {
    entries: Mutex<HashMap<TypeId, Arc<str>>>,
}

impl FieldListCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The comma-separated, alias-resolved, declaration-ordered column
    /// list for `T`, computed once per type.
    pub fn columns<T: OutputModel>(&self) -> Arc<str> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::from(T::COLUMNS.join(", ")))
            .clone()
    }
}
