//! The action list: an append-only collection of conditional register
//! writes lowered into one synchronous block.

use crate::{Expr, Module, RRC, Signal};
use sluice_utils::Id;
use std::rc::Rc;

/// A statement in a synchronous process body.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// A non-blocking register write, `dst <= src`.
    NonBlocking { dst: RRC<Signal>, src: Expr },
    /// A conditional block.
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
}

/// One scheduled write: destination, source, optional guard, and the
/// delay (in cycles) it was requested with. Delays are realized at
/// append time by a guard-delay register chain, so lowering treats all
/// entries uniformly.
#[derive(Debug, Clone)]
pub struct SeqEntry {
    pub dst: RRC<Signal>,
    pub src: Expr,
    pub guard: Option<Expr>,
    pub delay: u64,
}

/// A named, append-only action list. Multiple writers to one
/// destination are permitted; mutual exclusivity of their guards is the
/// caller's responsibility.
#[derive(Debug)]
pub struct SeqBlock {
    name: Id,
    entries: Vec<SeqEntry>,
    /// Counts guard-delay chains allocated by this block.
    chain_count: u64,
}

impl SeqBlock {
    pub fn new<S: Into<Id>>(name: S) -> Self {
        SeqBlock {
            name: name.into(),
            entries: Vec::new(),
            chain_count: 0,
        }
    }

    pub fn name(&self) -> Id {
        self.name
    }

    /// Append an unconditional write.
    pub fn add(&mut self, dst: &RRC<Signal>, src: Expr) {
        self.entries.push(SeqEntry {
            dst: Rc::clone(dst),
            src,
            guard: None,
            delay: 0,
        });
    }

    /// Append a write performed only on cycles where `guard` holds.
    pub fn add_cond(&mut self, dst: &RRC<Signal>, src: Expr, guard: Expr) {
        self.entries.push(SeqEntry {
            dst: Rc::clone(dst),
            src,
            guard: Some(guard),
            delay: 0,
        });
    }

    /// Append a write performed `delay` cycles after the cycle where
    /// `guard` holds (or, when unguarded, `delay` cycles after reset
    /// deasserts). The guard is carried through a chain of 1-bit
    /// registers allocated on `module`.
    pub fn add_delayed(
        &mut self,
        module: &mut Module,
        dst: &RRC<Signal>,
        src: Expr,
        guard: Option<Expr>,
        delay: u64,
    ) {
        if delay == 0 {
            self.entries.push(SeqEntry {
                dst: Rc::clone(dst),
                src,
                guard,
                delay: 0,
            });
            return;
        }

        let chain_id = self.chain_count;
        self.chain_count += 1;

        let mut cond = guard.unwrap_or_else(Expr::one);
        for step in 0..delay {
            let reg = module.fresh_reg(
                format!("_{}_dcond{}_{}", self.name, chain_id, step),
                1,
                0,
            );
            self.add(&reg, cond);
            cond = Expr::signal(&reg);
        }
        self.entries.push(SeqEntry {
            dst: Rc::clone(dst),
            src,
            guard: Some(cond),
            delay,
        });
    }

    /// All appended entries, in order.
    pub fn entries(&self) -> &[SeqEntry] {
        &self.entries
    }

    /// Lower the action list to the body of a synchronous block: one
    /// non-blocking write per unconditional entry, guarded entries
    /// wrapped in `if`.
    pub fn make_code(&self) -> Vec<Stmt> {
        self.entries
            .iter()
            .map(|entry| {
                let write = Stmt::NonBlocking {
                    dst: Rc::clone(&entry.dst),
                    src: entry.src.clone(),
                };
                match &entry.guard {
                    Some(g) => Stmt::If {
                        cond: g.clone(),
                        then_body: vec![write],
                        else_body: vec![],
                    },
                    None => write,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_entries_lower_to_ifs() {
        let mut m = Module::new("top");
        let r = m.reg("r", 8, 0).unwrap();
        let en = m.wire("en", 1).unwrap();
        let mut seq = SeqBlock::new("seq");
        seq.add(&r, Expr::constant(1, 8));
        seq.add_cond(&r, Expr::constant(2, 8), Expr::signal(&en));
        let code = seq.make_code();
        assert_eq!(code.len(), 2);
        assert!(matches!(code[0], Stmt::NonBlocking { .. }));
        assert!(matches!(code[1], Stmt::If { .. }));
    }

    #[test]
    fn delayed_write_builds_guard_chain() {
        let mut m = Module::new("top");
        let r = m.reg("r", 8, 0).unwrap();
        let en = m.wire("en", 1).unwrap();
        let mut seq = SeqBlock::new("seq");
        let before = m.reg_count();
        seq.add_delayed(&mut m, &r, Expr::constant(5, 8), Some(Expr::signal(&en)), 2);
        // Two 1-bit delay registers carry the guard.
        assert_eq!(m.reg_count(), before + 2);
        // Chain loads plus the final guarded write.
        assert_eq!(seq.entries().len(), 3);
        let last = &seq.entries()[2];
        assert_eq!(last.delay, 2);
        assert_eq!(
            last.guard,
            Some(Expr::signal(&m.find("_seq_dcond0_1").unwrap()))
        );
    }

    #[test]
    fn zero_delay_is_an_ordinary_guarded_write() {
        let mut m = Module::new("top");
        let r = m.reg("r", 8, 0).unwrap();
        let mut seq = SeqBlock::new("seq");
        seq.add_delayed(&mut m, &r, Expr::constant(5, 8), None, 0);
        assert_eq!(seq.entries().len(), 1);
        assert!(seq.entries()[0].guard.is_none());
    }
}
