//! Row-to-instance mapping.
//!
//! Each row is zipped with the response's column names into a field
//! name→value object and deserialized into the output type. Construction
//! failures (wrong types, missing required fields) surface as
//! [`DbError::Mapping`] and are never retried: they indicate a
//! caller/schema mismatch, not a transient backend issue.

use crate::error::{DbError, DbResult};
use crate::model::OutputModel;
use serde_json::Value as JsonValue;

/// Map raw rows into instances of `T`, preserving row order.
pub fn map_rows<T: OutputModel>(
    columns: &[String],
    rows: Vec<Vec<JsonValue>>,
) -> DbResult<Vec<T>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(map_row(columns, row)?);
    }
    Ok(out)
}

fn map_row<T: OutputModel>(columns: &[String], row: Vec<JsonValue>) -> DbResult<T> {
    if row.len() != columns.len() {
        return Err(DbError::mapping(
            T::model_name(),
            format!(
                "row has {} values but response has {} columns",
                row.len(),
                columns.len()
            ),
        ));
    }

    let mut object = serde_json::Map::with_capacity(columns.len());
    for (name, value) in columns.iter().zip(row) {
        object.insert(name.clone(), value);
    }
    serde_json::from_value(JsonValue::Object(object))
        .map_err(|err| DbError::mapping(T::model_name(), err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output_model;
    use serde_json::json;

    output_model! {
        #[derive(Debug, PartialEq)]
        struct User {
            id: i64,
            name: String,
        }
    }

    fn columns() -> Vec<String> {
        vec!["id".to_string(), "name".to_string()]
    }

    #[test]
    fn test_map_rows_in_order() {
        let rows = vec![
            vec![json!(1), json!("Ann")],
            vec![json!(2), json!("Bob")],
        ];
        let got: Vec<User> = map_rows(&columns(), rows).unwrap();
        assert_eq!(
            got,
            vec![
                User { id: 1, name: "Ann".to_string() },
                User { id: 2, name: "Bob".to_string() },
            ]
        );
    }

    #[test]
    fn test_map_empty() {
        let got: Vec<User> = map_rows(&columns(), Vec::new()).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn test_wrong_type_fails() {
        let rows = vec![vec![json!("not-a-number"), json!("Ann")]];
        let err = map_rows::<User>(&columns(), rows).unwrap_err();
        assert!(matches!(err, DbError::Mapping { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_column_fails() {
        let rows = vec![vec![json!(1)]];
        let err = map_rows::<User>(&columns(), rows).unwrap_err();
        assert!(matches!(err, DbError::Mapping { .. }));
    }

    #[test]
    fn test_extra_columns_ignored_by_model() {
        let columns = vec![
            "id".to_string(),
            "name".to_string(),
            "unused".to_string(),
        ];
        let rows = vec![vec![json!(1), json!("Ann"), json!(true)]];
        let got: Vec<User> = map_rows(&columns, rows).unwrap();
        assert_eq!(got[0].id, 1);
    }
}
