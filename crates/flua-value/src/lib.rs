#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Runtime values of the dispatch mechanism under test.
///
/// Everything except `Table` is a primitive: atomic, compared by host
/// value equality, never decomposed. `Table` is the single composite
/// kind; whether it behaves as a sequence or a mapping is a property of
/// its key set, decided by [`classify`].
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(Rc<str>),
    /// Opaque callable reference, identified by name.
    Function(Rc<str>),
    /// Opaque execution-context reference, identified by name.
    Thread(Rc<str>),
    Table(Rc<TableValue>),
}

impl Value {
    #[must_use]
    pub fn string(text: &str) -> Self {
        Self::String(Rc::from(text))
    }

    #[must_use]
    pub fn function(name: &str) -> Self {
        Self::Function(Rc::from(name))
    }

    #[must_use]
    pub fn thread(name: &str) -> Self {
        Self::Thread(Rc::from(name))
    }

    /// A table with dense 1..N integer keys.
    #[must_use]
    pub fn sequence(items: Vec<Value>) -> Self {
        Self::Table(Rc::new(TableValue::from_items(items, None)))
    }

    /// A dense table whose results remain dispatchable through `handlers`.
    #[must_use]
    pub fn sequence_with_handlers(items: Vec<Value>, handlers: Rc<HandlerTable>) -> Self {
        Self::Table(Rc::new(TableValue::from_items(items, Some(handlers))))
    }

    /// A table with explicit keys. Later duplicates win, as in the host.
    #[must_use]
    pub fn table(pairs: Vec<(TableKey, Value)>) -> Self {
        Self::Table(Rc::new(TableValue::from_pairs(pairs, None)))
    }

    #[must_use]
    pub fn table_with_handlers(pairs: Vec<(TableKey, Value)>, handlers: Rc<HandlerTable>) -> Self {
        Self::Table(Rc::new(TableValue::from_pairs(pairs, Some(handlers))))
    }

    #[must_use]
    pub fn as_table(&self) -> Option<&TableValue> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Host-facing type name, as surfaced in dispatch error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) | Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) => "function",
            Self::Thread(_) => "thread",
            Self::Table(_) => "table",
        }
    }

    /// Host value equality for primitives. Mixed integer/float numbers
    /// compare numerically; tables always report `false` here because
    /// composite equality is structural, not primitive.
    #[must_use]
    pub fn primitive_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Integer(a), Self::Number(b)) | (Self::Number(b), Self::Integer(a)) => {
                (*a as f64) == *b
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a == b,
            (Self::Thread(a), Self::Thread(b)) => a == b,
            _ => false,
        }
    }
}

/// Keys a table can hold. Float keys with an exact integer value
/// normalize to integer keys; other floats (and nil, functions,
/// threads, tables) are not usable as keys in this model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TableKey {
    Boolean(bool),
    Integer(i64),
    String(Rc<str>),
}

impl TableKey {
    #[must_use]
    pub fn string(text: &str) -> Self {
        Self::String(Rc::from(text))
    }

    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(Self::Boolean(*b)),
            Value::Integer(i) => Some(Self::Integer(*i)),
            Value::Number(n) if *n == (*n as i64) as f64 => Some(Self::Integer(*n as i64)),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

/// The composite value: unique keys, unordered as far as equality is
/// concerned, with an optional attached handler table enabling operator
/// dispatch. Immutable after construction.
pub struct TableValue {
    entries: BTreeMap<TableKey, Value>,
    handlers: Option<Rc<HandlerTable>>,
}

impl TableValue {
    fn from_items(items: Vec<Value>, handlers: Option<Rc<HandlerTable>>) -> Self {
        let entries = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| (TableKey::Integer(idx as i64 + 1), item))
            .collect();
        Self { entries, handlers }
    }

    fn from_pairs(pairs: Vec<(TableKey, Value)>, handlers: Option<Rc<HandlerTable>>) -> Self {
        Self {
            entries: pairs.into_iter().collect(),
            handlers,
        }
    }

    #[must_use]
    pub fn get(&self, key: &TableKey) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Greatest N such that integer keys 1..=N are all present.
    #[must_use]
    pub fn dense_len(&self) -> usize {
        let mut len = 0usize;
        while self.entries.contains_key(&TableKey::Integer(len as i64 + 1)) {
            len += 1;
        }
        len
    }

    #[must_use]
    pub fn total_keys(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&TableKey, &Value)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn handlers(&self) -> Option<&Rc<HandlerTable>> {
        self.handlers.as_ref()
    }
}

impl fmt::Debug for TableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableValue")
            .field("entries", &self.entries)
            .field("handlers", &self.handlers)
            .finish()
    }
}

/// Classification of a value for structural comparison and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Primitive,
    Sequence,
    Mapping,
}

/// Total classification: primitives stay atomic; a table is a Sequence
/// iff its dense 1..N index count equals its total key count, otherwise
/// it is a Mapping. The comparator and the serializer both go through
/// this single function so they cannot disagree on borderline shapes.
#[must_use]
pub fn classify(value: &Value) -> ValueKind {
    match value.as_table() {
        None => ValueKind::Primitive,
        Some(table) => {
            if table.dense_len() == table.total_keys() {
                ValueKind::Sequence
            } else {
                ValueKind::Mapping
            }
        }
    }
}

/// The dispatchable operation vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetaOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Unm,
    IDiv,
    BAnd,
    BOr,
    BXor,
    BNot,
    Shl,
    Shr,
    Len,
    Index,
    Call,
}

/// Declared operand shape of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpArity {
    Unary,
    Binary,
    /// Callee plus zero or more trailing arguments.
    Variadic,
}

impl OpArity {
    /// Fixed operand count, if the arity has one.
    #[must_use]
    pub const fn operand_count(self) -> Option<usize> {
        match self {
            Self::Unary => Some(1),
            Self::Binary => Some(2),
            Self::Variadic => None,
        }
    }
}

impl MetaOp {
    pub const ALL: [MetaOp; 17] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Mod,
        Self::Pow,
        Self::Unm,
        Self::IDiv,
        Self::BAnd,
        Self::BOr,
        Self::BXor,
        Self::BNot,
        Self::Shl,
        Self::Shr,
        Self::Len,
        Self::Index,
        Self::Call,
    ];

    /// Tag recorded as element 0 of a constructed operation node.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Pow => "pow",
            Self::Unm => "unm",
            Self::IDiv => "idiv",
            Self::BAnd => "band",
            Self::BOr => "bor",
            Self::BXor => "bxor",
            Self::BNot => "bnot",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::Len => "len",
            Self::Index => "index",
            Self::Call => "call",
        }
    }

    /// Key under which the host runtime looks the handler up.
    #[must_use]
    pub const fn metamethod_name(self) -> &'static str {
        match self {
            Self::Add => "__add",
            Self::Sub => "__sub",
            Self::Mul => "__mul",
            Self::Div => "__div",
            Self::Mod => "__mod",
            Self::Pow => "__pow",
            Self::Unm => "__unm",
            Self::IDiv => "__idiv",
            Self::BAnd => "__band",
            Self::BOr => "__bor",
            Self::BXor => "__bxor",
            Self::BNot => "__bnot",
            Self::Shl => "__shl",
            Self::Shr => "__shr",
            Self::Len => "__len",
            Self::Index => "__index",
            Self::Call => "__call",
        }
    }

    /// Sentence-form verb of this operation's action, used in dispatch
    /// error messages:
    ///
    /// - unary: "could not {verb} a {type} value"
    /// - binary: "could not {verb} values of type {lhs} and {rhs}"
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "subtract",
            Self::Mul => "multiply",
            Self::Div => "divide",
            Self::Mod => "take modulus of",
            Self::Pow => "exponentiate",
            Self::Unm => "negate",
            Self::IDiv => "flooring divide",
            Self::BAnd => "binary and",
            Self::BOr => "binary or",
            Self::BXor => "binary xor",
            Self::BNot => "binary negate",
            Self::Shl => "left shift",
            Self::Shr => "right shift",
            Self::Len => "determine length of",
            Self::Index => "index into",
            Self::Call => "call",
        }
    }

    #[must_use]
    pub const fn arity(self) -> OpArity {
        match self {
            Self::Unm | Self::BNot | Self::Len => OpArity::Unary,
            Self::Call => OpArity::Variadic,
            _ => OpArity::Binary,
        }
    }

    /// Parse a tag (or a `__`-prefixed metamethod name) back to its
    /// operation.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let bare = name.strip_prefix("__").unwrap_or(name);
        Self::ALL.into_iter().find(|op| op.tag() == bare)
    }
}

/// A per-operation handler. Handlers are total: they accept whatever
/// operands the runtime passes and may produce any number of results.
pub type Handler = Rc<dyn Fn(&[Value]) -> ReturnValues>;

/// The set of handler functions attached to a value. Built once per
/// fixture and never mutated afterwards.
#[derive(Default)]
pub struct HandlerTable {
    handlers: BTreeMap<MetaOp, Handler>,
}

impl HandlerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, op: MetaOp, handler: Handler) {
        self.handlers.insert(op, handler);
    }

    #[must_use]
    pub fn get(&self, op: MetaOp) -> Option<&Handler> {
        self.handlers.get(&op)
    }

    pub fn registered(&self) -> impl Iterator<Item = MetaOp> + '_ {
        self.handlers.keys().copied()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ops: Vec<&'static str> = self.registered().map(MetaOp::tag).collect();
        f.debug_struct("HandlerTable").field("ops", &ops).finish()
    }
}

/// Ordered results of a handler invocation. The host adjusts these to
/// the count its consuming context expects; single-value expression
/// context is the deliberate projection `adjusted(1)`.
#[derive(Debug, Clone, Default)]
pub struct ReturnValues {
    values: Vec<Value>,
}

impl ReturnValues {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn single(value: Value) -> Self {
        Self {
            values: vec![value],
        }
    }

    /// Exact count of results produced, separately queryable from the
    /// first-value projection.
    #[must_use]
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// First result, or nil if the handler produced none.
    #[must_use]
    pub fn first(&self) -> Value {
        self.values.first().cloned().unwrap_or(Value::Nil)
    }

    /// Resize to exactly `count` results, padding with nil.
    #[must_use]
    pub fn adjusted(mut self, count: usize) -> Self {
        self.values.resize(count, Value::Nil);
        self
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::{
        classify, HandlerTable, MetaOp, OpArity, ReturnValues, TableKey, Value, ValueKind,
    };
    use std::rc::Rc;

    #[test]
    fn primitives_classify_as_primitive() {
        for value in [
            Value::Nil,
            Value::Boolean(true),
            Value::Integer(3),
            Value::Number(0.5),
            Value::string("s"),
            Value::function("f"),
            Value::thread("main"),
        ] {
            assert_eq!(classify(&value), ValueKind::Primitive);
        }
    }

    #[test]
    fn dense_table_classifies_as_sequence() {
        let seq = Value::sequence(vec![Value::Integer(10), Value::Integer(20)]);
        assert_eq!(classify(&seq), ValueKind::Sequence);

        let empty = Value::sequence(Vec::new());
        assert_eq!(classify(&empty), ValueKind::Sequence);
    }

    #[test]
    fn extra_named_key_demotes_sequence_to_mapping() {
        let table = Value::table(vec![
            (TableKey::Integer(1), Value::Integer(10)),
            (TableKey::Integer(2), Value::Integer(20)),
            (TableKey::string("note"), Value::Boolean(true)),
        ]);
        assert_eq!(classify(&table), ValueKind::Mapping);
    }

    #[test]
    fn sparse_integer_keys_classify_as_mapping() {
        let table = Value::table(vec![
            (TableKey::Integer(1), Value::Integer(10)),
            (TableKey::Integer(3), Value::Integer(30)),
        ]);
        assert_eq!(classify(&table), ValueKind::Mapping);
    }

    #[test]
    fn dense_len_stops_at_first_gap() {
        let table = Value::table(vec![
            (TableKey::Integer(1), Value::Integer(10)),
            (TableKey::Integer(2), Value::Integer(20)),
            (TableKey::Integer(4), Value::Integer(40)),
        ]);
        let table = table.as_table().expect("table value");
        assert_eq!(table.dense_len(), 2);
        assert_eq!(table.total_keys(), 3);
    }

    #[test]
    fn integral_float_keys_normalize_to_integer() {
        assert_eq!(
            TableKey::from_value(&Value::Number(2.0)),
            Some(TableKey::Integer(2))
        );
        assert_eq!(TableKey::from_value(&Value::Number(2.5)), None);
        assert_eq!(TableKey::from_value(&Value::Nil), None);
    }

    #[test]
    fn mixed_numeric_primitives_compare_equal() {
        assert!(Value::Integer(1).primitive_eq(&Value::Number(1.0)));
        assert!(Value::Number(1.0).primitive_eq(&Value::Integer(1)));
        assert!(!Value::Integer(1).primitive_eq(&Value::Number(1.5)));
        assert!(!Value::Integer(1).primitive_eq(&Value::string("1")));
    }

    #[test]
    fn meta_op_tags_parse_round_trip() {
        for op in MetaOp::ALL {
            assert_eq!(MetaOp::parse(op.tag()), Some(op));
            assert_eq!(MetaOp::parse(op.metamethod_name()), Some(op));
        }
        assert_eq!(MetaOp::parse("concat"), None);
    }

    #[test]
    fn arity_table_matches_vocabulary() {
        assert_eq!(MetaOp::Unm.arity(), OpArity::Unary);
        assert_eq!(MetaOp::BNot.arity(), OpArity::Unary);
        assert_eq!(MetaOp::Len.arity(), OpArity::Unary);
        assert_eq!(MetaOp::Call.arity(), OpArity::Variadic);
        assert_eq!(MetaOp::Index.arity(), OpArity::Binary);
        assert_eq!(MetaOp::Add.arity().operand_count(), Some(2));
        assert_eq!(MetaOp::Call.arity().operand_count(), None);
    }

    #[test]
    fn return_values_adjust_with_nil_padding() {
        let rv = ReturnValues::new(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(rv.count(), 2);

        let widened = rv.clone().adjusted(4);
        assert_eq!(widened.count(), 4);
        assert!(widened.into_values()[3].is_nil());

        let narrowed = rv.adjusted(1);
        assert_eq!(narrowed.count(), 1);
        assert!(narrowed.first().primitive_eq(&Value::Integer(1)));

        assert!(ReturnValues::default().first().is_nil());
    }

    #[test]
    fn handler_table_stores_and_reports_handlers() {
        let mut table = HandlerTable::new();
        table.insert(
            MetaOp::Add,
            Rc::new(|operands| ReturnValues::single(operands[0].clone())),
        );
        assert!(table.get(MetaOp::Add).is_some());
        assert!(table.get(MetaOp::Sub).is_none());
        assert_eq!(table.registered().collect::<Vec<_>>(), vec![MetaOp::Add]);
    }
}
