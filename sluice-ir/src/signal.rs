//! Signals and the module container they are declared in.

use crate::{Expr, RRC, Stmt, rrc};
use linked_hash_map::LinkedHashMap;
use sluice_utils::{Error, GetName, Id, NameGenerator, SluiceResult};
use std::rc::Rc;

/// Direction of a signal relative to the enclosing module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Driven from outside the module.
    Input,
    /// Driven by the module, visible outside.
    Output,
    /// Internal to the module.
    Local,
}

/// Storage class of a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    /// Stateful: updated on clock edges, reset to `init`.
    Reg { init: u64 },
    /// Combinational: driven by a continuous assignment or from outside.
    Wire,
}

/// A named signal with a bit width. Allocated by a [`Module`] and shared
/// by reference throughout the representation.
#[derive(Debug)]
pub struct Signal {
    /// Name of this signal.
    name: Id,
    /// Width of this signal in bits.
    pub width: u64,
    /// Storage class.
    pub kind: SignalKind,
    /// Port direction.
    pub direction: Direction,
}

impl Signal {
    /// Grants immutable access to the name of this signal.
    pub fn name(&self) -> Id {
        self.name
    }

    /// True iff this signal holds state across clock edges.
    pub fn is_reg(&self) -> bool {
        matches!(self.kind, SignalKind::Reg { .. })
    }

    /// Reset value, present only for registers.
    pub fn init(&self) -> Option<u64> {
        match self.kind {
            SignalKind::Reg { init } => Some(init),
            SignalKind::Wire => None,
        }
    }
}

impl GetName for Signal {
    fn name(&self) -> Id {
        self.name()
    }
}

/// A continuous (combinational) assignment: `dst` permanently driven by
/// `src`.
#[derive(Debug, Clone)]
pub struct Assign {
    pub dst: RRC<Signal>,
    pub src: Expr,
}

/// A synchronous process registered on the module: a statement body
/// evaluated on every rising edge of `clock`, with `reset_body` taking
/// priority while `reset` is asserted.
#[derive(Debug)]
pub struct Process {
    pub clock: RRC<Signal>,
    pub reset: Option<RRC<Signal>>,
    pub reset_body: Vec<Stmt>,
    pub body: Vec<Stmt>,
}

/// In-memory representation of a hardware module: an insertion-ordered
/// signal table, the continuous assignments, and the synchronous
/// processes built by pipelines.
#[derive(Debug)]
pub struct Module {
    /// Name of the module.
    pub name: Id,
    /// All declared signals, in declaration order.
    signals: LinkedHashMap<Id, RRC<Signal>>,
    /// The set of continuous assignments.
    pub continuous_assignments: Vec<Assign>,
    /// Synchronous processes, in registration order.
    processes: Vec<Process>,
    /// Generates fresh names for internally allocated signals.
    namegen: NameGenerator,
}

impl GetName for Module {
    fn name(&self) -> Id {
        self.name
    }
}

impl Module {
    pub fn new<S: Into<Id>>(name: S) -> Self {
        Module {
            name: name.into(),
            signals: LinkedHashMap::new(),
            continuous_assignments: Vec::new(),
            processes: Vec::new(),
            namegen: NameGenerator::default(),
        }
    }

    /// Declare a signal. Fails if the name is already taken in this
    /// module.
    pub fn add_signal(
        &mut self,
        name: Id,
        width: u64,
        kind: SignalKind,
        direction: Direction,
    ) -> SluiceResult<RRC<Signal>> {
        if self.signals.contains_key(&name) || self.namegen.is_taken(name) {
            return Err(Error::malformed_structure(format!(
                "signal `{}' already declared in module `{}'",
                name, self.name
            )));
        }
        self.namegen.add_names([name]);
        let sig = rrc(Signal {
            name,
            width,
            kind,
            direction,
        });
        self.signals.insert(name, Rc::clone(&sig));
        Ok(sig)
    }

    pub fn input<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
    ) -> SluiceResult<RRC<Signal>> {
        self.add_signal(name.into(), width, SignalKind::Wire, Direction::Input)
    }

    pub fn output<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
    ) -> SluiceResult<RRC<Signal>> {
        self.add_signal(name.into(), width, SignalKind::Wire, Direction::Output)
    }

    /// An output port backed by a register.
    pub fn output_reg<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
        init: u64,
    ) -> SluiceResult<RRC<Signal>> {
        self.add_signal(
            name.into(),
            width,
            SignalKind::Reg { init },
            Direction::Output,
        )
    }

    pub fn reg<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
        init: u64,
    ) -> SluiceResult<RRC<Signal>> {
        self.add_signal(
            name.into(),
            width,
            SignalKind::Reg { init },
            Direction::Local,
        )
    }

    pub fn wire<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
    ) -> SluiceResult<RRC<Signal>> {
        self.add_signal(name.into(), width, SignalKind::Wire, Direction::Local)
    }

    /// Allocate a register with a generated name starting with `prefix`.
    pub fn fresh_reg<S: Into<Id>>(
        &mut self,
        prefix: S,
        width: u64,
        init: u64,
    ) -> RRC<Signal> {
        let name = self.namegen.gen_name(prefix);
        let sig = rrc(Signal {
            name,
            width,
            kind: SignalKind::Reg { init },
            direction: Direction::Local,
        });
        self.signals.insert(name, Rc::clone(&sig));
        sig
    }

    /// Add a continuous assignment driving `dst` with `src`. The
    /// destination must be combinational; registers are written through
    /// an action list instead.
    pub fn assign(&mut self, dst: &RRC<Signal>, src: Expr) -> SluiceResult<()> {
        if dst.borrow().is_reg() {
            return Err(Error::malformed_structure(format!(
                "cannot continuously assign register `{}'",
                dst.borrow().name()
            )));
        }
        self.continuous_assignments.push(Assign {
            dst: Rc::clone(dst),
            src,
        });
        Ok(())
    }

    pub fn add_process(&mut self, process: Process) {
        self.processes.push(process);
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Find a declared signal by name.
    pub fn find<S>(&self, name: S) -> Option<RRC<Signal>>
    where
        S: Into<Id>,
    {
        self.signals.get(&name.into()).map(Rc::clone)
    }

    /// Iterate over all declared signals in declaration order.
    pub fn signals(&self) -> impl Iterator<Item = &RRC<Signal>> {
        self.signals.values()
    }

    /// Number of registers declared so far. Used to account for
    /// pipeline allocations.
    pub fn reg_count(&self) -> usize {
        self.signals.values().filter(|s| s.borrow().is_reg()).count()
    }

    /// The module-level reset enumerator: one non-blocking write per
    /// register, restoring its initial value.
    pub fn make_reset(&self) -> Vec<Stmt> {
        self.signals
            .values()
            .filter(|s| s.borrow().is_reg())
            .map(|s| {
                let init = s.borrow().init().unwrap_or(0);
                let width = s.borrow().width;
                Stmt::NonBlocking {
                    dst: Rc::clone(s),
                    src: Expr::constant(init, width),
                }
            })
            .collect()
    }
}
