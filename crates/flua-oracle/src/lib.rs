#![forbid(unsafe_code)]

use flua_value::{classify, TableKey, TableValue, Value, ValueKind};

/// Recursive structural equality over classified values.
///
/// Cross-shape comparisons are unequal without coercion. Primitives use
/// host value equality. Sequences compare positionally 1..N, depth
/// first, left to right, short-circuiting on the first mismatch.
/// Mappings require exact key-set equality plus recursive value
/// equality, independent of iteration order. Mismatch is an expected
/// outcome, reported as `false`, never as an error.
#[must_use]
pub fn structural_eq(a: &Value, b: &Value) -> bool {
    let kind = classify(a);
    if kind != classify(b) {
        return false;
    }
    match kind {
        ValueKind::Primitive => a.primitive_eq(b),
        ValueKind::Sequence => match (a.as_table(), b.as_table()) {
            (Some(ta), Some(tb)) => sequences_eq(ta, tb),
            _ => false,
        },
        ValueKind::Mapping => match (a.as_table(), b.as_table()) {
            (Some(ta), Some(tb)) => mappings_eq(ta, tb),
            _ => false,
        },
    }
}

fn sequences_eq(a: &TableValue, b: &TableValue) -> bool {
    let len = a.dense_len();
    if len != b.dense_len() {
        return false;
    }
    for index in 1..=len {
        let key = TableKey::Integer(index as i64);
        match (a.get(&key), b.get(&key)) {
            (Some(x), Some(y)) => {
                if !structural_eq(x, y) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

fn mappings_eq(a: &TableValue, b: &TableValue) -> bool {
    if a.total_keys() != b.total_keys() {
        return false;
    }
    a.entries().all(|(key, value)| match b.get(key) {
        Some(other) => structural_eq(value, other),
        None => false,
    })
}

/// Human-readable rendering for diagnostics.
///
/// Strings are quoted but never escaped, so the output is not a
/// faithful or round-trippable encoding; it exists only so a failing
/// comparison can show both sides. Mapping pair order follows the
/// underlying map's iteration order and is not contractual.
#[must_use]
pub fn render(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{s}\""),
        Value::Function(id) => format!("function: {id}"),
        Value::Thread(id) => format!("thread: {id}"),
        Value::Table(table) => match classify(value) {
            ValueKind::Mapping => render_mapping(table),
            _ => render_sequence(table),
        },
    }
}

fn render_sequence(table: &TableValue) -> String {
    let parts: Vec<String> = (1..=table.dense_len())
        .map(|index| {
            table
                .get(&TableKey::Integer(index as i64))
                .map_or_else(|| "nil".to_string(), render)
        })
        .collect();
    format!("{{{}}}", parts.join(", "))
}

fn render_mapping(table: &TableValue) -> String {
    let parts: Vec<String> = table
        .entries()
        .map(|(key, value)| format!("{} = {}", render_key(key), render(value)))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

fn render_key(key: &TableKey) -> String {
    match key {
        TableKey::String(s) => s.to_string(),
        TableKey::Integer(i) => format!("[{i}]"),
        TableKey::Boolean(b) => format!("[{b}]"),
    }
}
