#![forbid(unsafe_code)]

//! Expression-grammar surface over the dispatch adapter.
//!
//! Writing `a + b * c - a` against [`Operand`]s reuses the compiler's
//! own precedence and associativity as the "host grammar": `*` binds
//! before `+`/`-` and binary operators associate left, so the tree a
//! dispatched expression builds is decided here, not hand-assembled.
//! Operations with no native operator (`pow`, `idiv`, `len`, `index`,
//! `call`) are methods. The wrapper carries the first dispatch error
//! through the rest of the expression instead of panicking.

use std::ops;

use flua_value::{MetaOp, Value};

use crate::{binary, call, index, length, unary, DispatchError};

/// One operand of a dispatched expression.
#[derive(Debug, Clone)]
pub struct Operand {
    value: Result<Value, DispatchError>,
}

impl Operand {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self { value: Ok(value) }
    }

    /// The expression's value, or the first dispatch error it hit.
    pub fn into_value(self) -> Result<Value, DispatchError> {
        self.value
    }

    fn combine(self, rhs: Self, op: MetaOp) -> Self {
        let value = match (self.value, rhs.value) {
            (Ok(lhs), Ok(rhs)) => binary(op, &lhs, &rhs),
            (Err(err), _) | (_, Err(err)) => Err(err),
        };
        Self { value }
    }

    fn apply_unary(self, op: MetaOp) -> Self {
        let value = self.value.and_then(|operand| unary(op, &operand));
        Self { value }
    }

    #[must_use]
    pub fn pow(self, rhs: Self) -> Self {
        self.combine(rhs, MetaOp::Pow)
    }

    #[must_use]
    pub fn idiv(self, rhs: Self) -> Self {
        self.combine(rhs, MetaOp::IDiv)
    }

    /// The `#` reading: every result the handler produced, adjusted to
    /// the single value an expression context consumes.
    #[must_use]
    pub fn len(self) -> Self {
        let value = self
            .value
            .and_then(|operand| length(&operand).map(|results| results.adjusted(1).first()));
        Self { value }
    }

    #[must_use]
    pub fn index(self, key: Value) -> Self {
        let value = self.value.and_then(|container| index(&container, &key));
        Self { value }
    }

    #[must_use]
    pub fn call(self, args: Vec<Value>) -> Self {
        let value = self.value.and_then(|callee| call(&callee, &args));
        Self { value }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait for Operand {
            type Output = Operand;

            fn $method(self, rhs: Operand) -> Operand {
                self.combine(rhs, $op)
            }
        }
    };
}

binary_operator!(Add, add, MetaOp::Add);
binary_operator!(Sub, sub, MetaOp::Sub);
binary_operator!(Mul, mul, MetaOp::Mul);
binary_operator!(Div, div, MetaOp::Div);
binary_operator!(Rem, rem, MetaOp::Mod);
binary_operator!(BitAnd, bitand, MetaOp::BAnd);
binary_operator!(BitOr, bitor, MetaOp::BOr);
binary_operator!(BitXor, bitxor, MetaOp::BXor);
binary_operator!(Shl, shl, MetaOp::Shl);
binary_operator!(Shr, shr, MetaOp::Shr);

impl ops::Neg for Operand {
    type Output = Operand;

    fn neg(self) -> Operand {
        self.apply_unary(MetaOp::Unm)
    }
}

/// `!` stands in for the host's unary `~`.
impl ops::Not for Operand {
    type Output = Operand;

    fn not(self) -> Operand {
        self.apply_unary(MetaOp::BNot)
    }
}
