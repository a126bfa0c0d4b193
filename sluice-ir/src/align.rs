//! Recursive alignment of expressions over mixed-depth stage values.
//!
//! Visiting returns the expression rewritten in terms of raw signals
//! together with the stage depth it is evaluable at, the combined valid
//! expression, and the collected upstream ready wires. Operands
//! declared at different depths are reconciled by staging the shallower
//! one until the depths meet, so a visited binary node always combines
//! same-depth operands.

use crate::pipeline::{PipelineState, ReadyList, stage_on};
use crate::Expr;
use sluice_utils::{Error, SluiceResult};
use std::cell::RefCell;
use std::rc::Rc;

/// Result of visiting an expression. `stage` is `None` for independent
/// expressions (constants and plain signals), which join any depth
/// without alignment.
#[derive(Debug)]
pub(crate) struct Aligned {
    pub stage: Option<u64>,
    pub data: Expr,
    pub valid: Option<Expr>,
    pub ready: ReadyList,
}

impl Aligned {
    fn independent(data: Expr) -> Self {
        Aligned {
            stage: None,
            data,
            valid: None,
            ready: ReadyList::new(),
        }
    }

    fn of_handle(handle: &crate::StageValue) -> Self {
        Aligned {
            stage: Some(handle.stage_index()),
            data: handle.data_expr(),
            valid: handle.valid_expr(),
            ready: handle.ready_signal().into_iter().collect(),
        }
    }
}

/// AND when both sides carry a valid, passthrough when only one does.
fn combine_valid(left: Option<Expr>, right: Option<Expr>) -> Option<Expr> {
    match (left, right) {
        (Some(a), Some(b)) => Some(a.land(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

fn combine_ready(mut left: ReadyList, right: ReadyList) -> ReadyList {
    left.extend(right);
    left
}

/// Visit `node`, inserting alignment registers on `pipe` as needed.
pub(crate) fn visit(
    pipe: &Rc<RefCell<PipelineState>>,
    node: &Expr,
) -> SluiceResult<Aligned> {
    match node {
        Expr::Const { .. } | Expr::Signal(_) => {
            Ok(Aligned::independent(node.clone()))
        }
        Expr::Stage(handle) => Ok(Aligned::of_handle(handle)),
        Expr::Unary { op, arg } => {
            let inner = visit(pipe, arg)?;
            Ok(Aligned {
                stage: inner.stage,
                data: Expr::unary(*op, inner.data),
                valid: inner.valid,
                ready: inner.ready,
            })
        }
        Expr::Binary { op, left, right } => {
            let l = visit(pipe, left)?;
            let r = visit(pipe, right)?;
            match (l.stage, r.stage) {
                (Some(ls), Some(rs)) if ls > rs => {
                    let aligned = realign(pipe, right, ls - rs)?;
                    Ok(Aligned {
                        stage: Some(ls),
                        data: Expr::binary(*op, l.data, aligned.data),
                        valid: combine_valid(l.valid, aligned.valid),
                        ready: combine_ready(l.ready, aligned.ready),
                    })
                }
                (Some(ls), Some(rs)) if rs > ls => {
                    let aligned = realign(pipe, left, rs - ls)?;
                    Ok(Aligned {
                        stage: Some(rs),
                        data: Expr::binary(*op, aligned.data, r.data),
                        valid: combine_valid(aligned.valid, r.valid),
                        ready: combine_ready(aligned.ready, r.ready),
                    })
                }
                _ => {
                    let stage = match (l.stage, r.stage) {
                        (Some(s), _) | (_, Some(s)) => Some(s),
                        (None, None) => None,
                    };
                    Ok(Aligned {
                        stage,
                        data: Expr::binary(*op, l.data, r.data),
                        valid: combine_valid(l.valid, r.valid),
                        ready: combine_ready(l.ready, r.ready),
                    })
                }
            }
        }
        Expr::Mux { .. } | Expr::Slice { .. } => {
            Err(Error::unsupported_node(format!(
                "no staging rule for {} expressions",
                node.kind_name()
            )))
        }
    }
}

/// Push `subexpr` through `steps` additional stages, each register sized
/// by the subexpression's own width. Returns the aligned view of the
/// deepest inserted handle.
fn realign(
    pipe: &Rc<RefCell<PipelineState>>,
    subexpr: &Expr,
    steps: u64,
) -> SluiceResult<Aligned> {
    debug_assert!(steps > 0);
    let mut cur = subexpr.clone();
    let mut deepest = None;
    for _ in 0..steps {
        let width = cur.width();
        let handle = stage_on(pipe, cur, Some(width), 0)?;
        cur = handle.expr();
        deepest = Some(handle);
    }
    let handle = deepest.expect("realign takes at least one step");
    Ok(Aligned::of_handle(&handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Module, Pipeline, RRC, Signal, rrc};
    use std::rc::Rc;

    fn setup() -> (RRC<Module>, Pipeline) {
        let module = rrc(Module::new("top"));
        let pipe = Pipeline::new(&module, "p");
        (module, pipe)
    }

    fn in_sig(module: &RRC<Module>, name: &str, width: u64) -> RRC<Signal> {
        module.borrow_mut().input(name, width).unwrap()
    }

    #[test]
    fn mismatched_depths_insert_alignment_registers() {
        let (module, pipe) = setup();
        let a = in_sig(&module, "a", 8);
        let b = in_sig(&module, "b", 8);
        let ha = pipe.input(Expr::signal(&a), None, None);
        let hb = pipe.input(Expr::signal(&b), None, None);
        let deep = pipe.stage(pipe.stage(ha.expr()).unwrap().expr()).unwrap();
        let shallow = pipe.stage(hb.expr()).unwrap();
        assert_eq!(deep.stage_index(), 2);
        assert_eq!(shallow.stage_index(), 1);

        let before = module.borrow().reg_count();
        let out =
            visit(pipe.state_rc(), &(deep.expr() + shallow.expr())).unwrap();
        assert_eq!(out.stage, Some(2));
        // One register pushes the shallow operand from depth 1 to 2.
        assert_eq!(module.borrow().reg_count(), before + 1);
    }

    #[test]
    fn independent_operands_join_without_alignment() {
        let (module, pipe) = setup();
        let a = in_sig(&module, "a", 8);
        let ha = pipe.input(Expr::signal(&a), None, None);
        let deep = pipe.stage(pipe.stage(ha.expr()).unwrap().expr()).unwrap();

        let before = module.borrow().reg_count();
        let out = visit(
            pipe.state_rc(),
            &(deep.expr() + Expr::constant(5, 8)),
        )
        .unwrap();
        assert_eq!(out.stage, Some(2));
        assert_eq!(module.borrow().reg_count(), before);
    }

    #[test]
    fn constant_only_expression_is_independent() {
        let (_module, pipe) = setup();
        let out = visit(
            pipe.state_rc(),
            &(Expr::constant(1, 8) + Expr::constant(2, 8)),
        )
        .unwrap();
        assert_eq!(out.stage, None);
        assert!(out.valid.is_none());
        assert!(out.ready.is_empty());
    }

    #[test]
    fn three_operand_sum_evaluates_at_the_deepest_stage() {
        let (module, pipe) = setup();
        let a = in_sig(&module, "a", 8);
        let b = in_sig(&module, "b", 8);
        let c = in_sig(&module, "c", 8);
        let ha = pipe.input(Expr::signal(&a), None, None);
        let hb = pipe.input(Expr::signal(&b), None, None);
        let sa = pipe.stage(pipe.stage(ha.expr()).unwrap().expr()).unwrap();
        let sb = pipe.stage(hb.expr()).unwrap();

        let before = module.borrow().reg_count();
        let out = visit(
            pipe.state_rc(),
            &(sa.expr() + sb.expr() + Expr::signal(&c)),
        )
        .unwrap();
        // `sb` gains one delay register; the plain signal joins as-is.
        assert_eq!(out.stage, Some(2));
        assert_eq!(module.borrow().reg_count(), before + 1);
    }

    #[test]
    fn valid_expressions_combine_by_conjunction() {
        let (module, pipe) = setup();
        let a = in_sig(&module, "a", 8);
        let b = in_sig(&module, "b", 8);
        let va = in_sig(&module, "a_valid", 1);
        let vb = in_sig(&module, "b_valid", 1);
        let ha =
            pipe.input(Expr::signal(&a), Some(Expr::signal(&va)), None);
        let hb =
            pipe.input(Expr::signal(&b), Some(Expr::signal(&vb)), None);

        let out = visit(pipe.state_rc(), &(ha.expr() + hb.expr())).unwrap();
        assert_eq!(
            out.valid,
            Some(Expr::signal(&va).land(Expr::signal(&vb)))
        );

        let one_sided =
            visit(pipe.state_rc(), &(ha.expr() + Expr::signal(&b))).unwrap();
        assert_eq!(one_sided.valid, Some(Expr::signal(&va)));

        let none = visit(
            pipe.state_rc(),
            &(Expr::signal(&a) + Expr::signal(&b)),
        )
        .unwrap();
        assert!(none.valid.is_none());
    }

    #[test]
    fn ready_lists_concatenate_left_to_right() {
        let (module, pipe) = setup();
        let a = in_sig(&module, "a", 8);
        let b = in_sig(&module, "b", 8);
        let (ra, rb) = {
            let mut m = module.borrow_mut();
            (
                m.output("a_ready", 1).unwrap(),
                m.output("b_ready", 1).unwrap(),
            )
        };
        let ha = pipe.input(Expr::signal(&a), None, Some(Rc::clone(&ra)));
        let hb = pipe.input(Expr::signal(&b), None, Some(Rc::clone(&rb)));

        let out = visit(pipe.state_rc(), &(ha.expr() + hb.expr())).unwrap();
        assert_eq!(out.ready.len(), 2);
        assert!(Rc::ptr_eq(&out.ready[0], &ra));
        assert!(Rc::ptr_eq(&out.ready[1], &rb));
    }

    #[test]
    fn unary_operators_are_reapplied_over_the_staged_value() {
        let (module, pipe) = setup();
        let a = in_sig(&module, "a", 8);
        let v = pipe.stage(Expr::signal(&a)).unwrap();
        let out = visit(pipe.state_rc(), &!v.expr()).unwrap();
        assert_eq!(out.stage, Some(0));
        match out.data {
            Expr::Unary { op, arg } => {
                assert_eq!(op, crate::UnaryOp::Not);
                assert!(matches!(*arg, Expr::Signal(_)));
            }
            other => panic!("expected a unary node, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_forms_are_rejected() {
        let (module, pipe) = setup();
        let a = in_sig(&module, "a", 8);
        let sel = in_sig(&module, "sel", 1);
        let mux = Expr::mux(
            Expr::signal(&sel),
            Expr::signal(&a),
            Expr::constant(0, 8),
        );
        let err = visit(pipe.state_rc(), &mux).unwrap_err();
        assert!(matches!(err, crate::Error::UnsupportedNode(_)));

        let slice = Expr::slice(Expr::signal(&a), 3, 0);
        let err = visit(pipe.state_rc(), &slice).unwrap_err();
        assert!(matches!(err, crate::Error::UnsupportedNode(_)));
    }
}
