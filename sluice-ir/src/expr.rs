//! Expression trees over signals, constants, and pipeline stage values.

use crate::pipeline::StageValue;
use crate::{RRC, Signal};
use sluice_utils::bits_needed_for;
use std::rc::Rc;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Bitwise complement `~`.
    Not,
    /// Arithmetic negation `-`.
    Neg,
    /// Logical complement `!`.
    LNot,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,
    LAnd,
    LOr,
}

impl BinaryOp {
    /// True for operators whose result is a single bit.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Leq
                | BinaryOp::Geq
                | BinaryOp::LAnd
                | BinaryOp::LOr
        )
    }
}

/// An expression over constants, signals, operators, and pipeline stage
/// values. The variant set is closed: the pipeline visitor matches it
/// exhaustively, and forms it cannot lower (`Mux`, `Slice`) are rejected
/// with an error rather than through a reflective fallback.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal with an explicit width.
    Const { val: u64, width: u64 },
    /// A reference to a declared signal.
    Signal(RRC<Signal>),
    /// A unary operator application.
    Unary { op: UnaryOp, arg: Box<Expr> },
    /// A binary operator application.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// A two-way multiplexer, `cond ? on_true : on_false`.
    Mux {
        cond: Box<Expr>,
        on_true: Box<Expr>,
        on_false: Box<Expr>,
    },
    /// A bit slice `arg[msb:lsb]`.
    Slice {
        arg: Box<Expr>,
        msb: u64,
        lsb: u64,
    },
    /// A value produced by a pipeline stage.
    Stage(StageValue),
}

impl Expr {
    pub fn constant(val: u64, width: u64) -> Self {
        Expr::Const { val, width }
    }

    /// The 1-bit constant 1, used as the default valid/ready.
    pub fn one() -> Self {
        Expr::Const { val: 1, width: 1 }
    }

    pub fn signal(sig: &RRC<Signal>) -> Self {
        Expr::Signal(Rc::clone(sig))
    }

    pub fn unary(op: UnaryOp, arg: Expr) -> Self {
        Expr::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn mux(cond: Expr, on_true: Expr, on_false: Expr) -> Self {
        Expr::Mux {
            cond: Box::new(cond),
            on_true: Box::new(on_true),
            on_false: Box::new(on_false),
        }
    }

    pub fn slice(arg: Expr, msb: u64, lsb: u64) -> Self {
        debug_assert!(msb >= lsb, "slice [{msb}:{lsb}] is reversed");
        Expr::Slice {
            arg: Box::new(arg),
            msb,
            lsb,
        }
    }

    /// Declared bit width of this expression. Predicates are one bit
    /// wide; other binary combinations take the wider operand.
    pub fn width(&self) -> u64 {
        match self {
            Expr::Const { width, .. } => *width,
            Expr::Signal(sig) => sig.borrow().width,
            Expr::Unary { op: UnaryOp::LNot, .. } => 1,
            Expr::Unary { arg, .. } => arg.width(),
            Expr::Binary { op, left, right } => {
                if op.is_predicate() {
                    1
                } else {
                    left.width().max(right.width())
                }
            }
            Expr::Mux {
                on_true, on_false, ..
            } => on_true.width().max(on_false.width()),
            Expr::Slice { msb, lsb, .. } => msb - lsb + 1,
            Expr::Stage(v) => v.bit_width(),
        }
    }

    /// Short description of the expression form, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Const { .. } => "constant",
            Expr::Signal(_) => "signal",
            Expr::Unary { .. } => "unary operator",
            Expr::Binary { .. } => "binary operator",
            Expr::Mux { .. } => "mux",
            Expr::Slice { .. } => "slice",
            Expr::Stage(_) => "stage value",
        }
    }

    pub fn eq(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, self, other)
    }

    pub fn neq(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Neq, self, other)
    }

    pub fn lt(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Lt, self, other)
    }

    pub fn gt(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Gt, self, other)
    }

    pub fn le(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Leq, self, other)
    }

    pub fn ge(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Geq, self, other)
    }

    /// Logical AND, used when combining valid signals.
    pub fn land(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::LAnd, self, other)
    }

    /// Logical OR.
    pub fn lor(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::LOr, self, other)
    }
}

/// Structural equality: signals compare by identity or name, stage
/// values by slot identity.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Expr::Const { val: v1, width: w1 },
                Expr::Const { val: v2, width: w2 },
            ) => v1 == v2 && w1 == w2,
            (Expr::Signal(a), Expr::Signal(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().name() == b.borrow().name()
            }
            (
                Expr::Unary { op: o1, arg: a1 },
                Expr::Unary { op: o2, arg: a2 },
            ) => o1 == o2 && a1 == a2,
            (
                Expr::Binary {
                    op: o1,
                    left: l1,
                    right: r1,
                },
                Expr::Binary {
                    op: o2,
                    left: l2,
                    right: r2,
                },
            ) => o1 == o2 && l1 == l2 && r1 == r2,
            (
                Expr::Mux {
                    cond: c1,
                    on_true: t1,
                    on_false: f1,
                },
                Expr::Mux {
                    cond: c2,
                    on_true: t2,
                    on_false: f2,
                },
            ) => c1 == c2 && t1 == t2 && f1 == f2,
            (
                Expr::Slice {
                    arg: a1,
                    msb: m1,
                    lsb: l1,
                },
                Expr::Slice {
                    arg: a2,
                    msb: m2,
                    lsb: l2,
                },
            ) => a1 == a2 && m1 == m2 && l1 == l2,
            (Expr::Stage(a), Expr::Stage(b)) => a.same_slot(b),
            _ => false,
        }
    }
}

impl From<u64> for Expr {
    fn from(val: u64) -> Self {
        Expr::Const {
            val,
            width: bits_needed_for(val),
        }
    }
}

impl From<&RRC<Signal>> for Expr {
    fn from(sig: &RRC<Signal>) -> Self {
        Expr::signal(sig)
    }
}

impl From<&StageValue> for Expr {
    fn from(v: &StageValue) -> Self {
        Expr::Stage(v.clone())
    }
}

impl From<StageValue> for Expr {
    fn from(v: StageValue) -> Self {
        Expr::Stage(v)
    }
}

macro_rules! binop_impl {
    ($trait:ident, $method:ident, $op:ident) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary(BinaryOp::$op, self, rhs)
            }
        }
    };
}

binop_impl!(Add, add, Add);
binop_impl!(Sub, sub, Sub);
binop_impl!(Mul, mul, Mul);
binop_impl!(BitAnd, bitand, And);
binop_impl!(BitOr, bitor, Or);
binop_impl!(BitXor, bitxor, Xor);
binop_impl!(Shl, shl, Shl);
binop_impl!(Shr, shr, Shr);

impl std::ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::unary(UnaryOp::Not, self)
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Module;

    #[test]
    fn widths() {
        let mut m = Module::new("top");
        let a = m.wire("a", 8).unwrap();
        let b = m.wire("b", 16).unwrap();
        let sum = Expr::signal(&a) + Expr::signal(&b);
        assert_eq!(sum.width(), 16);
        let cmp = Expr::signal(&a).lt(Expr::signal(&b));
        assert_eq!(cmp.width(), 1);
        assert_eq!(Expr::slice(Expr::signal(&b), 7, 4).width(), 4);
        assert_eq!((!Expr::signal(&a)).width(), 8);
    }

    #[test]
    fn constant_from_integer() {
        assert_eq!(Expr::from(5u64), Expr::constant(5, 3));
        assert_eq!(Expr::from(1u64), Expr::constant(1, 1));
    }
}
