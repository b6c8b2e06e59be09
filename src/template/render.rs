//! Template rendering with safe parameter binding.
//!
//! Rendering rewrites every `{{ expr }}` interpolation to route through a
//! `bind()` collector before handing the template to minijinja. The
//! collector appends the evaluated value to the bound-parameter list and
//! emits the next `$n` placeholder, so parameter values reach the driver
//! only as placeholder arguments, never as SQL text.
//!
//! Two forms render literally instead of binding:
//! - the reserved `_model_fields_` variable (the output type's column
//!   list, injected by the client),
//! - expressions whose last filter is `sqlsafe`, e.g.
//!   `{{ order_col | sqlsafe }}` (developer-controlled escape hatch).
//!
//! The names `bind` and `sqlsafe` are reserved inside templates.

use crate::error::{DbError, DbResult};
use crate::params::{MODEL_FIELDS_PARAM, Params, SqlValue};
use minijinja::value::{Value, ValueKind};
use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex, PoisonError};

/// A rendered statement: final SQL text plus bound parameters in
/// placeholder order. Produced fresh on every call, never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    /// Final SQL with `$1..$n` placeholders.
    pub sql: String,
    /// Values for the placeholders, in order.
    pub params: Vec<SqlValue>,
}

/// Render template text with the given parameters.
///
/// `name` identifies the template in error messages. Fails with
/// [`DbError::TemplateRender`] on malformed markup or unresolved
/// variables.
pub fn render(name: &str, source: &str, params: &Params) -> DbResult<RenderedQuery> {
    let rewritten = autobind(source)?;
    let collected: Arc<Mutex<Vec<SqlValue>>> = Arc::new(Mutex::new(Vec::new()));

    let sql = {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        let sink = Arc::clone(&collected);
        env.add_function(
            "bind",
            move |value: Value| -> Result<String, minijinja::Error> {
                if value.is_undefined() {
                    return Err(minijinja::Error::new(
                        minijinja::ErrorKind::UndefinedError,
                        "undefined value in bound parameter",
                    ));
                }
                let param = to_sql_value(&value)?;
                let mut bound = sink.lock().unwrap_or_else(PoisonError::into_inner);
                bound.push(param);
                Ok(format!("${}", bound.len()))
            },
        );
        env.add_filter("sqlsafe", |value: Value| value);

        let template = env
            .template_from_named_str(name, &rewritten)
            .map_err(|err| render_error(name, err))?;
        template
            .render(Value::from_serialize(params))
            .map_err(|err| render_error(name, err))?
    };

    let params = {
        let mut bound = collected.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *bound)
    };
    Ok(RenderedQuery { sql, params })
}

fn render_error(name: &str, err: minijinja::Error) -> DbError {
    DbError::template_render(format!("{}: {}", name, err))
}

/// Convert an evaluated template value into a bindable parameter.
fn to_sql_value(value: &Value) -> Result<SqlValue, minijinja::Error> {
    // Strings and booleans are cheap to pull out directly; everything else
    // goes through serde so sequences and maps bind as jsonb.
    match value.kind() {
        ValueKind::None => return Ok(SqlValue::Null),
        ValueKind::Bool => return Ok(SqlValue::Bool(value.is_true())),
        ValueKind::String => {
            if let Some(s) = value.as_str() {
                return Ok(SqlValue::Text(s.to_string()));
            }
        }
        _ => {}
    }

    let json = serde_json::to_value(value).map_err(|err| {
        minijinja::Error::new(
            minijinja::ErrorKind::InvalidOperation,
            format!("value is not bindable: {}", err),
        )
    })?;
    Ok(match json {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Int(i),
            None => SqlValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => SqlValue::Text(s),
        other => SqlValue::Json(other),
    })
}

// ---------------------------------------------------------------------------
// Interpolation rewriting
// ---------------------------------------------------------------------------

enum Open {
    Expr,
    Stmt,
    Comment,
}

/// Rewrite `{{ expr }}` into `{{ bind((expr)) }}`, leaving statement and
/// comment blocks, `_model_fields_`, and `sqlsafe`-terminated expressions
/// untouched.
fn autobind(source: &str) -> DbResult<String> {
    let mut out = String::with_capacity(source.len() + 64);
    let mut rest = source;

    while let Some((pos, open)) = find_open(rest) {
        match open {
            Open::Expr => {
                out.push_str(&rest[..pos]);
                let body_start = pos + 2;
                let close = find_close(&rest[body_start..], b"}}")?;
                out.push_str(&wrap_expr(&rest[body_start..body_start + close]));
                rest = &rest[body_start + close + 2..];
            }
            Open::Stmt => {
                let body_start = pos + 2;
                let close = find_close(&rest[body_start..], b"%}")?;
                let end = body_start + close + 2;
                out.push_str(&rest[..end]);
                rest = &rest[end..];
            }
            Open::Comment => {
                let body_start = pos + 2;
                let close = find_close(&rest[body_start..], b"#}")?;
                let end = body_start + close + 2;
                out.push_str(&rest[..end]);
                rest = &rest[end..];
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Earliest opening delimiter in `s`, if any.
fn find_open(s: &str) -> Option<(usize, Open)> {
    let candidates = [
        (s.find("{{"), Open::Expr),
        (s.find("{%"), Open::Stmt),
        (s.find("{#"), Open::Comment),
    ];
    candidates
        .into_iter()
        .filter_map(|(pos, open)| pos.map(|p| (p, open)))
        .min_by_key(|(p, _)| *p)
}

/// Byte offset of the closing delimiter, skipping quoted strings.
fn find_close(s: &str, close: &[u8; 2]) -> DbResult<usize> {
    let bytes = s.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if bytes[i..].starts_with(close) {
                    return Ok(i);
                }
            }
        }
        i += 1;
    }
    Err(DbError::template_render(format!(
        "unbalanced delimiter: missing `{}`",
        std::str::from_utf8(close).unwrap_or("")
    )))
}

fn wrap_expr(raw: &str) -> String {
    // Preserve whitespace-control markers outside the rewritten call.
    let mut inner = raw;
    let mut lead = "";
    let mut trail = "";
    if inner.starts_with('-') || inner.starts_with('+') {
        lead = &inner[..1];
        inner = &inner[1..];
    }
    if inner.ends_with('-') || inner.ends_with('+') {
        trail = &inner[inner.len() - 1..];
        inner = &inner[..inner.len() - 1];
    }

    let expr = inner.trim();
    if expr == MODEL_FIELDS_PARAM || is_sqlsafe(expr) {
        format!("{{{{{lead} {expr} {trail}}}}}")
    } else {
        format!("{{{{{lead} bind(({expr})) {trail}}}}}")
    }
}

/// True when the expression's last filter is `sqlsafe`.
fn is_sqlsafe(expr: &str) -> bool {
    expr.contains('|') && expr.rsplit('|').next().map(str::trim) == Some("sqlsafe")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn test_single_binding() {
        let got = render(
            "t",
            "SELECT * FROM users WHERE id = {{ user_id }}",
            &params! { "user_id" => 1 },
        )
        .unwrap();
        assert_eq!(got.sql, "SELECT * FROM users WHERE id = $1");
        assert_eq!(got.params, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_binding_order() {
        let got = render(
            "t",
            "UPDATE t SET a = {{ a }}, b = {{ b }} WHERE id = {{ id }}",
            &params! { "a" => "x", "b" => true, "id" => 7 },
        )
        .unwrap();
        assert_eq!(got.sql, "UPDATE t SET a = $1, b = $2 WHERE id = $3");
        assert_eq!(
            got.params,
            vec![
                SqlValue::Text("x".to_string()),
                SqlValue::Bool(true),
                SqlValue::Int(7),
            ]
        );
    }

    #[test]
    fn test_value_never_inlined() {
        let hostile = "'; DROP TABLE x; --";
        let got = render(
            "t",
            "SELECT * FROM t WHERE name = {{ name }}",
            &params! { "name" => hostile },
        )
        .unwrap();
        assert!(!got.sql.contains(hostile));
        assert!(got.sql.contains("$1"));
        assert_eq!(got.params, vec![SqlValue::Text(hostile.to_string())]);
    }

    #[test]
    fn test_model_fields_render_literally() {
        let got = render(
            "t",
            "SELECT {{ _model_fields_ }} FROM users WHERE id = {{ user_id }}",
            &params! { "_model_fields_" => "id, name", "user_id" => 1 },
        )
        .unwrap();
        assert_eq!(got.sql, "SELECT id, name FROM users WHERE id = $1");
        assert_eq!(got.params, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_sqlsafe_renders_literally() {
        let got = render(
            "t",
            "SELECT * FROM t ORDER BY {{ order_col | sqlsafe }}",
            &params! { "order_col" => "created_at DESC" },
        )
        .unwrap();
        assert_eq!(got.sql, "SELECT * FROM t ORDER BY created_at DESC");
        assert!(got.params.is_empty());
    }

    #[test]
    fn test_conditional_block() {
        let source = "SELECT * FROM t{% if min %} WHERE v >= {{ min }}{% endif %}";
        let with = render("t", source, &params! { "min" => 5 }).unwrap();
        assert_eq!(with.sql, "SELECT * FROM t WHERE v >= $1");
        assert_eq!(with.params, vec![SqlValue::Int(5)]);

        let without = render("t", source, &params! { "min" => false }).unwrap();
        assert_eq!(without.sql, "SELECT * FROM t");
        assert!(without.params.is_empty());
    }

    #[test]
    fn test_loop_binds_per_iteration() {
        let got = render(
            "t",
            "SELECT * FROM t WHERE tag IN ({% for tag in tags %}{{ tag }}{% if not loop.last %}, {% endif %}{% endfor %})",
            &params! { "tags" => ["a", "b", "c"] },
        )
        .unwrap();
        assert_eq!(got.sql, "SELECT * FROM t WHERE tag IN ($1, $2, $3)");
        assert_eq!(
            got.params,
            vec![
                SqlValue::Text("a".to_string()),
                SqlValue::Text("b".to_string()),
                SqlValue::Text("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_null_float_and_list_values() {
        let got = render(
            "t",
            "VALUES ({{ a }}, {{ b }}, {{ c }})",
            &params! { "a" => JsonValue::Null, "b" => 1.5, "c" => [1, 2] },
        )
        .unwrap();
        assert_eq!(got.sql, "VALUES ($1, $2, $3)");
        assert_eq!(got.params[0], SqlValue::Null);
        assert_eq!(got.params[1], SqlValue::Float(1.5));
        assert_eq!(got.params[2], SqlValue::Json(serde_json::json!([1, 2])));
    }

    #[test]
    fn test_unresolved_variable_fails() {
        let err = render("t", "SELECT {{ missing }}", &params! {}).unwrap_err();
        assert!(matches!(err, DbError::TemplateRender { .. }));
    }

    #[test]
    fn test_unbalanced_expression_fails() {
        let err = render("t", "SELECT {{ a FROM t", &params! { "a" => 1 }).unwrap_err();
        assert!(matches!(err, DbError::TemplateRender { .. }));
        assert!(err.to_string().contains("}}"));
    }

    #[test]
    fn test_malformed_statement_fails() {
        let err = render("t", "{% if x %}a", &params! { "x" => true }).unwrap_err();
        assert!(matches!(err, DbError::TemplateRender { .. }));
    }

    #[test]
    fn test_whitespace_control_preserved() {
        let got = render("t", "A  {{- v -}}  B", &params! { "v" => 1 }).unwrap();
        assert_eq!(got.sql, "A$1B");
    }

    #[test]
    fn test_quoted_braces_inside_expression() {
        let got = render("t", "SELECT {{ a ~ \"}}\" }}", &params! { "a" => "x" }).unwrap();
        assert_eq!(got.sql, "SELECT $1");
        assert_eq!(got.params, vec![SqlValue::Text("x}}".to_string())]);
    }

    #[test]
    fn test_comment_block_untouched() {
        let got = render(
            "t",
            "SELECT 1 {# {{ not_a_param }} #}",
            &params! {},
        )
        .unwrap();
        assert_eq!(got.sql, "SELECT 1 ");
        assert!(got.params.is_empty());
    }

    #[test]
    fn test_filtered_expression_still_binds() {
        let got = render(
            "t",
            "SELECT * FROM t WHERE name = {{ name | upper }}",
            &params! { "name" => "ann" },
        )
        .unwrap();
        assert_eq!(got.sql, "SELECT * FROM t WHERE name = $1");
        assert_eq!(got.params, vec![SqlValue::Text("ANN".to_string())]);
    }

    #[test]
    fn test_autobind_rewrites() {
        assert_eq!(
            autobind("a {{ x }} b").unwrap(),
            "a {{ bind((x)) }} b"
        );
        assert_eq!(
            autobind("{{ cols | sqlsafe }}").unwrap(),
            "{{ cols | sqlsafe }}"
        );
        assert_eq!(
            autobind("{{ _model_fields_ }}").unwrap(),
            "{{ _model_fields_ }}"
        );
        assert_eq!(
            autobind("{% for x in xs %}{{ x }}{% endfor %}").unwrap(),
            "{% for x in xs %}{{ bind((x)) }}{% endfor %}"
        );
    }
}
