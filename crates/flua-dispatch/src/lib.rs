#![forbid(unsafe_code)]

pub mod expr;

use std::fmt;

use flua_value::{Handler, MetaOp, ReturnValues, TableKey, Value};

/// A dispatch with no applicable handler. Mismatched comparison results
/// are not errors; only the absence of a handler (or an uncallable /
/// unindexable operand) is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// could not {verb} a {type} value
    Unary(MetaOp, &'static str),
    /// could not {verb} values of type {lhs} and {rhs}
    Binary(MetaOp, &'static str, &'static str),
    /// could not call a {type} value
    Call(&'static str),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unary(op, type_name) => {
                write!(f, "could not {} a {} value", op.verb(), type_name)
            }
            Self::Binary(op, lhs, rhs) => {
                write!(f, "could not {} values of type {} and {}", op.verb(), lhs, rhs)
            }
            Self::Call(type_name) => write!(f, "could not call a {} value", type_name),
        }
    }
}

impl std::error::Error for DispatchError {}

fn handler_for(value: &Value, op: MetaOp) -> Option<Handler> {
    value.as_table()?.handlers()?.get(op).cloned()
}

/// Apply a binary operation: the left operand's handler wins, then the
/// right operand's. Operands are passed left first.
pub fn binary(op: MetaOp, lhs: &Value, rhs: &Value) -> Result<Value, DispatchError> {
    let handler = handler_for(lhs, op)
        .or_else(|| handler_for(rhs, op))
        .ok_or(DispatchError::Binary(op, lhs.type_name(), rhs.type_name()))?;
    Ok(handler(&[lhs.clone(), rhs.clone()]).adjusted(1).first())
}

/// Apply a unary operation to its sole operand.
pub fn unary(op: MetaOp, operand: &Value) -> Result<Value, DispatchError> {
    let handler =
        handler_for(operand, op).ok_or(DispatchError::Unary(op, operand.type_name()))?;
    Ok(handler(&[operand.clone()]).adjusted(1).first())
}

/// Apply the length operation, keeping every result the handler
/// produced. Tables without a length handler fall back to their dense
/// length; other values cannot answer it. Callers wanting the
/// single-value expression reading project with
/// [`ReturnValues::adjusted`].
pub fn length(operand: &Value) -> Result<ReturnValues, DispatchError> {
    if let Some(handler) = handler_for(operand, MetaOp::Len) {
        return Ok(handler(&[operand.clone()]));
    }
    match operand.as_table() {
        Some(table) => Ok(ReturnValues::single(Value::Integer(table.dense_len() as i64))),
        None => Err(DispatchError::Unary(MetaOp::Len, operand.type_name())),
    }
}

/// Index a container with a key. A key present in the table itself is
/// returned without consulting the handler; a missing key dispatches to
/// the index handler, and a plain table without one yields nil.
pub fn index(container: &Value, key: &Value) -> Result<Value, DispatchError> {
    let Some(table) = container.as_table() else {
        return Err(DispatchError::Unary(MetaOp::Index, container.type_name()));
    };
    if let Some(table_key) = TableKey::from_value(key) {
        if let Some(value) = table.get(&table_key) {
            return Ok(value.clone());
        }
    }
    match handler_for(container, MetaOp::Index) {
        Some(handler) => Ok(handler(&[container.clone(), key.clone()]).adjusted(1).first()),
        None => Ok(Value::Nil),
    }
}

/// Call a value: the callee is passed first, then the call arguments.
pub fn call(callee: &Value, args: &[Value]) -> Result<Value, DispatchError> {
    let handler =
        handler_for(callee, MetaOp::Call).ok_or(DispatchError::Call(callee.type_name()))?;
    let mut operands = Vec::with_capacity(1 + args.len());
    operands.push(callee.clone());
    operands.extend_from_slice(args);
    Ok(handler(&operands).adjusted(1).first())
}

#[cfg(test)]
mod tests {
    use super::{binary, call, index, length, unary, DispatchError};
    use flua_meta::{counting_len_handlers, operation_handlers, BuilderMode};
    use flua_oracle::{render, structural_eq};
    use flua_value::{MetaOp, TableKey, Value};

    fn leaf(name: &str) -> Value {
        Value::sequence_with_handlers(
            vec![Value::string(name)],
            operation_handlers(BuilderMode::Flat),
        )
    }

    fn expected(items: Vec<Value>) -> Value {
        Value::sequence(items)
    }

    #[test]
    fn binary_dispatch_builds_tagged_node() {
        let a = leaf("a");
        let b = leaf("b");
        let result = binary(MetaOp::Add, &a, &b).expect("dispatch succeeds");
        let want = expected(vec![
            Value::string("add"),
            expected(vec![Value::string("a")]),
            expected(vec![Value::string("b")]),
        ]);
        assert!(
            structural_eq(&result, &want),
            "got {} want {}",
            render(&result),
            render(&want)
        );
    }

    #[test]
    fn right_operand_handler_fires_when_left_has_none() {
        let plain = Value::sequence(vec![Value::string("p")]);
        let b = leaf("b");
        let result = binary(MetaOp::Sub, &plain, &b).expect("right-hand handler fires");
        let tag = result
            .as_table()
            .expect("node")
            .get(&TableKey::Integer(1))
            .expect("tag")
            .clone();
        assert!(tag.primitive_eq(&Value::string("sub")));
    }

    #[test]
    fn missing_binary_handler_names_both_operand_types() {
        let err = binary(MetaOp::Add, &Value::Integer(1), &Value::string("x"))
            .expect_err("no handler anywhere");
        assert_eq!(err, DispatchError::Binary(MetaOp::Add, "number", "string"));
        assert_eq!(
            err.to_string(),
            "could not add values of type number and string"
        );
    }

    #[test]
    fn missing_unary_handler_names_operand_type() {
        let err = unary(MetaOp::Unm, &Value::Boolean(true)).expect_err("no handler");
        assert_eq!(err.to_string(), "could not negate a boolean value");

        let err = unary(MetaOp::BNot, &Value::sequence(Vec::new())).expect_err("plain table");
        assert_eq!(err.to_string(), "could not binary negate a table value");
    }

    #[test]
    fn length_keeps_every_handler_result() {
        let fixture = Value::sequence_with_handlers(
            vec![Value::string("l")],
            counting_len_handlers(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
            ]),
        );
        let results = length(&fixture).expect("len handler fires");
        assert_eq!(results.count(), 3);

        let single = results.adjusted(1);
        assert_eq!(single.count(), 1);
        assert!(single.first().primitive_eq(&Value::Integer(1)));
    }

    #[test]
    fn length_falls_back_to_dense_length() {
        let plain = Value::sequence(vec![Value::Integer(7), Value::Integer(8)]);
        let results = length(&plain).expect("raw length");
        assert_eq!(results.count(), 1);
        assert!(results.first().primitive_eq(&Value::Integer(2)));

        let err = length(&Value::Nil).expect_err("nil has no length");
        assert_eq!(err.to_string(), "could not determine length of a nil value");
    }

    #[test]
    fn present_key_short_circuits_index_dispatch() {
        let a = leaf("a");
        let own = index(&a, &Value::Integer(1)).expect("raw entry");
        assert!(own.primitive_eq(&Value::string("a")));
    }

    #[test]
    fn absent_key_dispatches_to_index_handler() {
        let a = leaf("a");
        let result = index(&a, &Value::string("b")).expect("index handler fires");
        let want = expected(vec![
            Value::string("index"),
            expected(vec![Value::string("a")]),
            Value::string("b"),
        ]);
        assert!(structural_eq(&result, &want));
    }

    #[test]
    fn plain_table_misses_yield_nil_and_primitives_error() {
        let plain = Value::sequence(vec![Value::string("p")]);
        let miss = index(&plain, &Value::string("absent")).expect("plain miss");
        assert!(miss.is_nil());

        let err = index(&Value::Integer(3), &Value::string("k")).expect_err("unindexable");
        assert_eq!(err.to_string(), "could not index into a number value");
    }

    #[test]
    fn call_passes_callee_then_arguments() {
        let a = leaf("a");
        let no_args = call(&a, &[]).expect("zero-arg call");
        assert!(structural_eq(
            &no_args,
            &expected(vec![Value::string("call"), expected(vec![Value::string("a")])]),
        ));

        let with_args = call(
            &a,
            &[Value::Integer(1), Value::Integer(2), Value::Integer(3)],
        )
        .expect("call with arguments");
        let want = expected(vec![
            Value::string("call"),
            expected(vec![Value::string("a")]),
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]);
        assert!(structural_eq(&with_args, &want));

        let err = call(&Value::string("s"), &[]).expect_err("uncallable");
        assert_eq!(err.to_string(), "could not call a string value");
    }
}
