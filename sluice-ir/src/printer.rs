//! Formats expressions and statements as Verilog text. Shared by the
//! backend and by tests that assert on generated structure. Printing
//! clones nothing and performs no mutation.

use crate::{BinaryOp, Expr, Stmt, UnaryOp};
use std::io;

/// Printer for the IR.
pub struct Printer;

impl Printer {
    fn binop_str(op: &BinaryOp) -> &'static str {
        match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Leq => "<=",
            BinaryOp::Geq => ">=",
            BinaryOp::LAnd => "&&",
            BinaryOp::LOr => "||",
        }
    }

    fn unop_str(op: &UnaryOp) -> &'static str {
        match op {
            UnaryOp::Not => "~",
            UnaryOp::Neg => "-",
            UnaryOp::LNot => "!",
        }
    }

    /// Format an expression, parenthesizing compound operands so the
    /// output never depends on Verilog precedence.
    pub fn expr_str(expr: &Expr) -> String {
        match expr {
            Expr::Const { val, width } => format!("{width}'d{val}"),
            Expr::Signal(sig) => sig.borrow().name().to_string(),
            Expr::Unary { op, arg } => {
                format!("{}{}", Self::unop_str(op), Self::atom_str(arg))
            }
            Expr::Binary { op, left, right } => format!(
                "{} {} {}",
                Self::atom_str(left),
                Self::binop_str(op),
                Self::atom_str(right)
            ),
            Expr::Mux {
                cond,
                on_true,
                on_false,
            } => format!(
                "{} ? {} : {}",
                Self::atom_str(cond),
                Self::atom_str(on_true),
                Self::atom_str(on_false)
            ),
            Expr::Slice { arg, msb, lsb } => {
                format!("{}[{}:{}]", Self::atom_str(arg), msb, lsb)
            }
            Expr::Stage(v) => Self::expr_str(&v.data_expr()),
        }
    }

    /// Like [`Printer::expr_str`] but wraps compound expressions in
    /// parentheses.
    fn atom_str(expr: &Expr) -> String {
        match expr {
            Expr::Const { .. } | Expr::Signal(_) | Expr::Slice { .. } => {
                Self::expr_str(expr)
            }
            Expr::Stage(v) => Self::atom_str(&v.data_expr()),
            _ => format!("({})", Self::expr_str(expr)),
        }
    }

    /// Write a statement at the given indent level.
    pub fn write_stmt<F: io::Write>(
        stmt: &Stmt,
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        match stmt {
            Stmt::NonBlocking { dst, src } => writeln!(
                f,
                "{}{} <= {};",
                " ".repeat(indent_level),
                dst.borrow().name(),
                Self::expr_str(src)
            ),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                writeln!(
                    f,
                    "{}if ({}) begin",
                    " ".repeat(indent_level),
                    Self::expr_str(cond)
                )?;
                for s in then_body {
                    Self::write_stmt(s, indent_level + 2, f)?;
                }
                if !else_body.is_empty() {
                    writeln!(f, "{}end else begin", " ".repeat(indent_level))?;
                    for s in else_body {
                        Self::write_stmt(s, indent_level + 2, f)?;
                    }
                }
                writeln!(f, "{}end", " ".repeat(indent_level))
            }
        }
    }

    /// Format a statement into a string. Used mostly in tests.
    pub fn stmt_str(stmt: &Stmt) -> String {
        let mut buf = Vec::new();
        Self::write_stmt(stmt, 0, &mut buf).expect("write into vec failed");
        String::from_utf8_lossy(&buf).trim_end().to_string()
    }
}
