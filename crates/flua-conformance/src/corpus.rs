#![forbid(unsafe_code)]

//! The embedded full-vocabulary fixture corpus.
//!
//! Expected trees are written as plain JSON: arrays decode to dense
//! sequences, objects to mappings with string keys, scalars to the
//! matching primitives. The corpus is compiled in, so the suites stay
//! pure in-memory logic.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use flua_dispatch::{binary, call, index, length, unary};
use flua_value::{MetaOp, TableKey, Value};

use crate::propagating_leaf;

pub const DISPATCH_VOCABULARY_CASES: &str =
    include_str!("../fixtures/dispatch_vocabulary_cases.json");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchCorpus {
    pub schema_version: u8,
    pub cases: Vec<DispatchCase>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchCase {
    pub id: String,
    pub form: CaseForm,
    pub expected: JsonValue,
}

/// How a case applies its operation to the named leaves.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseForm {
    Binary { op: String, lhs: String, rhs: String },
    Unary { op: String, operand: String },
    Length { operand: String },
    Index { container: String, key: JsonValue },
    Call {
        callee: String,
        #[serde(default)]
        args: Vec<JsonValue>,
    },
}

impl CaseForm {
    /// The vocabulary operation this form exercises, if its `op` field
    /// names one.
    #[must_use]
    pub fn operation(&self) -> Option<MetaOp> {
        match self {
            Self::Binary { op, .. } | Self::Unary { op, .. } => MetaOp::parse(op),
            Self::Length { .. } => Some(MetaOp::Len),
            Self::Index { .. } => Some(MetaOp::Index),
            Self::Call { .. } => Some(MetaOp::Call),
        }
    }
}

pub fn load_corpus() -> Result<DispatchCorpus, String> {
    let corpus: DispatchCorpus = serde_json::from_str(DISPATCH_VOCABULARY_CASES)
        .map_err(|err| format!("invalid dispatch corpus json: {err}"))?;
    if corpus.schema_version != 1 {
        return Err(format!(
            "unsupported dispatch corpus schema_version {}",
            corpus.schema_version
        ));
    }
    Ok(corpus)
}

/// Apply the case's operation to fresh propagating leaves, projected to
/// the single value an expression context reads.
pub fn execute_case(form: &CaseForm) -> Result<Value, String> {
    match form {
        CaseForm::Binary { op, lhs, rhs } => {
            let op = parse_op(op)?;
            binary(op, &propagating_leaf(lhs), &propagating_leaf(rhs))
                .map_err(|err| err.to_string())
        }
        CaseForm::Unary { op, operand } => {
            let op = parse_op(op)?;
            unary(op, &propagating_leaf(operand)).map_err(|err| err.to_string())
        }
        CaseForm::Length { operand } => length(&propagating_leaf(operand))
            .map(|results| results.adjusted(1).first())
            .map_err(|err| err.to_string()),
        CaseForm::Index { container, key } => {
            index(&propagating_leaf(container), &value_from_json(key))
                .map_err(|err| err.to_string())
        }
        CaseForm::Call { callee, args } => {
            let args: Vec<Value> = args.iter().map(value_from_json).collect();
            call(&propagating_leaf(callee), &args).map_err(|err| err.to_string())
        }
    }
}

fn parse_op(name: &str) -> Result<MetaOp, String> {
    MetaOp::parse(name).ok_or_else(|| format!("unknown operation tag: {name}"))
}

/// Decode a JSON literal into the value model.
#[must_use]
pub fn value_from_json(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Nil,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => Value::string(s),
        JsonValue::Array(items) => Value::sequence(items.iter().map(value_from_json).collect()),
        JsonValue::Object(pairs) => Value::table(
            pairs
                .iter()
                .map(|(key, value)| (TableKey::string(key), value_from_json(value)))
                .collect(),
        ),
    }
}
