#![forbid(unsafe_code)]

use std::rc::{Rc, Weak};

use flua_value::{Handler, HandlerTable, MetaOp, ReturnValues, Value};

/// Whether builder results themselves carry the handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderMode {
    /// Results are bare operation nodes; composing further operations
    /// on them falls back to the runtime's own rules.
    Flat,
    /// Results carry the same handler table, so chained expressions
    /// keep dispatching through it and build deep trees.
    Propagating,
}

/// Build the operation node `[tag, operand...]` for `op`.
///
/// Total over any operands the runtime supplies; arity is the
/// dispatcher's concern, not the builder's.
#[must_use]
pub fn operation_node(op: MetaOp, operands: &[Value]) -> Value {
    Value::sequence(node_items(op, operands))
}

fn node_items(op: MetaOp, operands: &[Value]) -> Vec<Value> {
    let mut items = Vec::with_capacity(1 + operands.len());
    items.push(Value::string(op.tag()));
    items.extend(operands.iter().cloned());
    items
}

/// The full-vocabulary handler table: one tag-building handler per
/// operation in [`MetaOp::ALL`].
#[must_use]
pub fn operation_handlers(mode: BuilderMode) -> Rc<HandlerTable> {
    match mode {
        BuilderMode::Flat => {
            let mut table = HandlerTable::new();
            for op in MetaOp::ALL {
                let handler: Handler =
                    Rc::new(move |operands| ReturnValues::single(operation_node(op, operands)));
                table.insert(op, handler);
            }
            Rc::new(table)
        }
        BuilderMode::Propagating => Rc::new_cyclic(|self_table: &Weak<HandlerTable>| {
            let mut table = HandlerTable::new();
            for op in MetaOp::ALL {
                let self_table = self_table.clone();
                let handler: Handler = Rc::new(move |operands| {
                    let items = node_items(op, operands);
                    // The weak reference is live for as long as any
                    // value still carries this table.
                    let node = match self_table.upgrade() {
                        Some(handlers) => Value::sequence_with_handlers(items, handlers),
                        None => Value::sequence(items),
                    };
                    ReturnValues::single(node)
                });
                table.insert(op, handler);
            }
            table
        }),
    }
}

/// A handler table whose only handler answers the length operation with
/// the given results, in order. Used to assert the host's adjustment of
/// multiple results to the consuming context.
#[must_use]
pub fn counting_len_handlers(results: Vec<Value>) -> Rc<HandlerTable> {
    let mut table = HandlerTable::new();
    let handler: Handler = Rc::new(move |_operands| ReturnValues::new(results.clone()));
    table.insert(MetaOp::Len, handler);
    Rc::new(table)
}
