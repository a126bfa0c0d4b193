//! The pipeline orchestrator and the per-stage value handles it hands
//! out.
//!
//! A [`Pipeline`] owns an action list, a temporary-register counter,
//! and the registry of every [`StageValue`] it has created. Staging an
//! expression runs the alignment visitor over it, allocates the stage
//! registers, and appends the conditional loads that realize the
//! handshake; mixing operands declared at different depths inserts the
//! delay registers needed to evaluate the whole expression at the
//! deepest referenced stage.

use crate::align;
use crate::{Expr, Module, Process, RRC, SeqBlock, SeqEntry, Signal, Stmt, WRC};
use smallvec::SmallVec;
use sluice_utils::{Error, GetName, Id, SluiceResult};
use std::cell::RefCell;
use std::rc::Rc;

/// Ready signals collected while visiting an expression. Fan-in is
/// usually one or two wires.
pub(crate) type ReadyList = SmallVec<[RRC<Signal>; 2]>;

/// State shared between a pipeline and its stage value handles.
pub(crate) struct PipelineState {
    name: Id,
    module: RRC<Module>,
    seq: SeqBlock,
    /// Monotonically increasing counter naming the data/valid/ready
    /// triple of each allocation.
    tmp_count: u64,
    /// Every handle created by this pipeline, in creation order.
    vars: Vec<StageValue>,
}

impl GetName for PipelineState {
    fn name(&self) -> Id {
        self.name
    }
}

impl PipelineState {
    pub(crate) fn module(&self) -> &RRC<Module> {
        &self.module
    }

    /// Deterministic name for an allocated register or wire:
    /// `_{pipeline}_{role}{counter}`.
    fn tmp_name(&self, role: &str, idx: u64) -> Id {
        Id::from(format!("_{}_{}{}", self.name, role, idx))
    }
}

/// The load guard for a stage register given which handshake signals
/// are present: `valid && ready`, `ready`, `valid`, or unconditional.
fn load_guard(valid: &Option<Expr>, ready: &Option<RRC<Signal>>) -> Option<Expr> {
    match (valid, ready) {
        (Some(v), Some(r)) => Some(v.clone().land(Expr::signal(r))),
        (None, Some(r)) => Some(Expr::signal(r)),
        (Some(v), None) => Some(v.clone()),
        (None, None) => None,
    }
}

/// Allocate the register/wire triple for one pipeline stage and append
/// its conditional loads. Every supplied upstream ready signal is
/// driven combinationally from the freshly allocated ready wire.
fn make_tmp(
    state: &Rc<RefCell<PipelineState>>,
    data: Expr,
    valid: Option<Expr>,
    ready: ReadyList,
    width: u64,
    init: u64,
) -> SluiceResult<(RRC<Signal>, Option<RRC<Signal>>, Option<RRC<Signal>>)> {
    let mut st = state.borrow_mut();
    let idx = st.tmp_count;
    st.tmp_count += 1;
    let module = Rc::clone(&st.module);

    let tmp_data =
        module.borrow_mut().reg(st.tmp_name("data", idx), width, init)?;
    let tmp_valid = if valid.is_some() {
        Some(module.borrow_mut().reg(st.tmp_name("valid", idx), 1, 0)?)
    } else {
        None
    };
    let tmp_ready = if ready.is_empty() {
        None
    } else {
        Some(module.borrow_mut().wire(st.tmp_name("ready", idx), 1)?)
    };

    match load_guard(&valid, &tmp_ready) {
        Some(g) => st.seq.add_cond(&tmp_data, data, g),
        None => st.seq.add(&tmp_data, data),
    }
    if let (Some(vreg), Some(vexpr)) = (&tmp_valid, &valid) {
        match &tmp_ready {
            Some(r) => st.seq.add_cond(vreg, vexpr.clone(), Expr::signal(r)),
            None => st.seq.add(vreg, vexpr.clone()),
        }
    }
    if let Some(r) = &tmp_ready {
        let mut m = module.borrow_mut();
        for upstream in &ready {
            m.assign(upstream, Expr::signal(r))?;
        }
    }
    Ok((tmp_data, tmp_valid, tmp_ready))
}

/// One step of a "value N cycles ago" chain. Mirrors [`make_tmp`] but
/// additionally derives the propagated validity: the AND of whichever
/// of {new valid register, root validity, new ready wire} exist.
fn make_prev(
    state: &Rc<RefCell<PipelineState>>,
    data: Expr,
    valid: Option<Expr>,
    ready: Option<RRC<Signal>>,
    root_valid: Option<Expr>,
    width: u64,
    init: u64,
) -> SluiceResult<(RRC<Signal>, Option<Expr>, Option<RRC<Signal>>)> {
    let mut st = state.borrow_mut();
    let idx = st.tmp_count;
    st.tmp_count += 1;
    let module = Rc::clone(&st.module);

    let tmp_data =
        module.borrow_mut().reg(st.tmp_name("data", idx), width, init)?;
    let tmp_valid = if valid.is_some() {
        Some(module.borrow_mut().reg(st.tmp_name("valid", idx), 1, 0)?)
    } else {
        None
    };
    let tmp_ready = if ready.is_some() {
        Some(module.borrow_mut().wire(st.tmp_name("ready", idx), 1)?)
    } else {
        None
    };
    let next_valid = if valid.is_some() || ready.is_some() {
        Some(module.borrow_mut().wire(st.tmp_name("nvalid", idx), 1)?)
    } else {
        None
    };

    match load_guard(&valid, &tmp_ready) {
        Some(g) => st.seq.add_cond(&tmp_data, data, g),
        None => st.seq.add(&tmp_data, data),
    }
    if let (Some(vreg), Some(vexpr)) = (&tmp_valid, &valid) {
        match &tmp_ready {
            Some(r) => st.seq.add_cond(vreg, vexpr.clone(), Expr::signal(r)),
            None => st.seq.add(vreg, vexpr.clone()),
        }
    }

    if let Some(nv) = &next_valid {
        let mut terms: Vec<Expr> = Vec::new();
        if let Some(v) = &tmp_valid {
            terms.push(Expr::signal(v));
        }
        if let Some(rv) = &root_valid {
            terms.push(rv.clone());
        }
        if let Some(r) = &tmp_ready {
            terms.push(Expr::signal(r));
        }
        let validity = terms
            .into_iter()
            .reduce(|a, b| a.land(b))
            .unwrap_or_else(Expr::one);
        module.borrow_mut().assign(nv, validity)?;
    }
    if let (Some(upstream), Some(r)) = (&ready, &tmp_ready) {
        module.borrow_mut().assign(upstream, Expr::signal(r))?;
    }
    Ok((tmp_data, next_valid.as_ref().map(Expr::signal), tmp_ready))
}

/// Stage an expression on the pipeline behind `state`: align it, then
/// allocate and load one stage's registers. Shared by [`Pipeline`] and
/// the alignment visitor, which re-invokes it to push a shallow operand
/// deeper.
pub(crate) fn stage_on(
    state: &Rc<RefCell<PipelineState>>,
    data: Expr,
    width: Option<u64>,
    init: u64,
) -> SluiceResult<StageValue> {
    let visited = align::visit(state, &data)?;
    let width = width.unwrap_or_else(|| visited.data.width());
    let valid = visited.valid;
    let (tmp_data, tmp_valid, tmp_ready) =
        make_tmp(state, visited.data, valid, visited.ready, width, init)?;
    let stage = visited.stage.map_or(0, |s| s + 1);
    log::debug!(
        "pipeline `{}': staged `{}' at depth {stage}",
        state.borrow().name,
        tmp_data.borrow().name()
    );
    let handle = StageValue::create(
        state,
        stage,
        Expr::signal(&tmp_data),
        tmp_valid.as_ref().map(Expr::signal),
        tmp_ready,
    );
    state.borrow_mut().vars.push(handle.clone());
    Ok(handle)
}

/// A pipeline under construction. All methods either complete, mutating
/// only this pipeline's owned state, or fail without partial effects on
/// the stage being requested; earlier successful calls remain valid.
pub struct Pipeline {
    state: Rc<RefCell<PipelineState>>,
}

impl Pipeline {
    pub fn new<S: Into<Id>>(module: &RRC<Module>, name: S) -> Self {
        let name = name.into();
        Pipeline {
            state: Rc::new(RefCell::new(PipelineState {
                name,
                module: Rc::clone(module),
                seq: SeqBlock::new(name),
                tmp_count: 0,
                vars: Vec::new(),
            })),
        }
    }

    pub fn name(&self) -> Id {
        self.state.borrow().name
    }

    pub fn module(&self) -> RRC<Module> {
        Rc::clone(&self.state.borrow().module)
    }

    /// Wrap an externally supplied expression as a stage-0 handle.
    /// Allocates nothing. The `ready` signal, if given, will be driven
    /// by the first stage that consumes this input.
    pub fn input(
        &self,
        data: Expr,
        valid: Option<Expr>,
        ready: Option<RRC<Signal>>,
    ) -> StageValue {
        let handle = StageValue::create(&self.state, 0, data, valid, ready);
        self.state.borrow_mut().vars.push(handle.clone());
        handle
    }

    /// Register `data` for one additional cycle, aligning mixed-depth
    /// operands first. The new register takes the visited expression's
    /// width; widths are never checked against each other, so a caller
    /// combining mismatched widths should pin the result with
    /// [`Pipeline::stage_sized`].
    pub fn stage(&self, data: Expr) -> SluiceResult<StageValue> {
        stage_on(&self.state, data, None, 0)
    }

    /// [`Pipeline::stage`] with an explicit register width and initial
    /// value.
    pub fn stage_sized(
        &self,
        data: Expr,
        width: Option<u64>,
        init: u64,
    ) -> SluiceResult<StageValue> {
        stage_on(&self.state, data, width, init)
    }

    /// Escape hatch: allocate a register with this pipeline's naming
    /// scheme without staging anything.
    pub fn add_reg(
        &self,
        role: &str,
        width: u64,
        init: u64,
    ) -> SluiceResult<RRC<Signal>> {
        let mut st = self.state.borrow_mut();
        let idx = st.tmp_count;
        st.tmp_count += 1;
        let module = Rc::clone(&st.module);
        let name = st.tmp_name(role, idx);
        let result = module.borrow_mut().reg(name, width, init);
        result
    }

    /// Escape hatch: allocate a wire with this pipeline's naming
    /// scheme.
    pub fn add_wire(&self, role: &str, width: u64) -> SluiceResult<RRC<Signal>> {
        let mut st = self.state.borrow_mut();
        let idx = st.tmp_count;
        st.tmp_count += 1;
        let module = Rc::clone(&st.module);
        let name = st.tmp_name(role, idx);
        let result = module.borrow_mut().wire(name, width);
        result
    }

    /// Snapshot of the action-list entries appended so far.
    pub fn entries(&self) -> Vec<SeqEntry> {
        self.state.borrow().seq.entries().to_vec()
    }

    /// Number of stage value handles created by this pipeline.
    pub fn var_count(&self) -> usize {
        self.state.borrow().vars.len()
    }

    /// Lower the action list to the body of a synchronous block.
    pub fn emit(&self) -> Vec<Stmt> {
        self.state.borrow().seq.make_code()
    }

    /// Lower the action list and register it on the module as a process
    /// clocked by `clk`, with the module-wide reset enumeration taken
    /// while `rst` is asserted.
    pub fn emit_clocked(&self, clk: &RRC<Signal>, rst: &RRC<Signal>) {
        let st = self.state.borrow();
        let module = Rc::clone(&st.module);
        let body = st.seq.make_code();
        log::info!(
            "pipeline `{}': {} action entries over {} stage values",
            st.name,
            body.len(),
            st.vars.len()
        );
        drop(st);
        let mut m = module.borrow_mut();
        let reset_body = m.make_reset();
        m.add_process(Process {
            clock: Rc::clone(clk),
            reset: Some(Rc::clone(rst)),
            reset_body,
            body,
        });
    }

    #[cfg(test)]
    pub(crate) fn state_rc(&self) -> &Rc<RefCell<PipelineState>> {
        &self.state
    }
}

/// Immutable payload of a stage value handle. Only the history cache
/// mutates, and it only ever grows.
pub(crate) struct StageSlot {
    stage: u64,
    data: Expr,
    valid: Option<Expr>,
    ready: Option<RRC<Signal>>,
    /// Delay-chain cache: the handle for "this value k+1 cycles ago"
    /// lives at index k. Extended on demand, shared by every overlapping
    /// history request.
    prev: RefCell<Vec<StageValue>>,
}

impl std::fmt::Debug for StageSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSlot")
            .field("stage", &self.stage)
            .field("data", &self.data)
            .field("valid", &self.valid)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

/// A value produced at a particular pipeline depth, with its optional
/// valid and ready handshake. Cheap to clone; clones share one slot.
#[derive(Clone)]
pub struct StageValue {
    pipe: WRC<PipelineState>,
    slot: Rc<StageSlot>,
}

impl std::fmt::Debug for StageValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StageValue").field(&self.slot).finish()
    }
}

impl StageValue {
    pub(crate) fn create(
        state: &Rc<RefCell<PipelineState>>,
        stage: u64,
        data: Expr,
        valid: Option<Expr>,
        ready: Option<RRC<Signal>>,
    ) -> Self {
        StageValue {
            pipe: WRC::from(state),
            slot: Rc::new(StageSlot {
                stage,
                data,
                valid,
                ready,
                prev: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The pipeline depth this value is produced at.
    pub fn stage_index(&self) -> u64 {
        self.slot.stage
    }

    /// Width of the underlying data expression; drives register sizing
    /// in staging and history chains.
    pub fn bit_width(&self) -> u64 {
        self.slot.data.width()
    }

    /// This handle as an expression, usable in further staged
    /// transformations.
    pub fn expr(&self) -> Expr {
        Expr::Stage(self.clone())
    }

    /// The underlying data expression.
    pub fn data_expr(&self) -> Expr {
        self.slot.data.clone()
    }

    /// The valid expression accompanying this value, if any.
    pub fn valid_expr(&self) -> Option<Expr> {
        self.slot.valid.clone()
    }

    /// The ready wire backpressuring this value, if any.
    pub fn ready_signal(&self) -> Option<RRC<Signal>> {
        self.slot.ready.clone()
    }

    /// True iff both handles view the same slot.
    pub fn same_slot(&self, other: &StageValue) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }

    /// The value this handle held `offset` cycles ago. Offset 0 is the
    /// handle itself; negative offsets fail with
    /// [`Error::InvalidIndex`] without allocating. Positive offsets
    /// lazily extend a cached delay chain, so overlapping requests
    /// never duplicate registers.
    pub fn history(&self, offset: i64) -> SluiceResult<StageValue> {
        self.history_init(offset, 0)
    }

    /// [`StageValue::history`] with an explicit initial value for the
    /// chain registers.
    pub fn history_init(
        &self,
        offset: i64,
        init: u64,
    ) -> SluiceResult<StageValue> {
        if offset < 0 {
            return Err(Error::InvalidIndex(offset));
        }
        if offset == 0 {
            return Ok(self.clone());
        }
        let state = self.pipe.upgrade();
        let width = self.bit_width();
        let mut cur = self.clone();
        for step in 0..offset as usize {
            let cached = self.slot.prev.borrow().get(step).cloned();
            if let Some(hit) = cached {
                cur = hit;
                continue;
            }
            let (data, valid, ready) = make_prev(
                &state,
                cur.slot.data.clone(),
                cur.slot.valid.clone(),
                cur.slot.ready.clone(),
                self.slot.valid.clone(),
                width,
                init,
            )?;
            // A delayed copy stays at the base handle's depth.
            let link = StageValue::create(
                &state,
                cur.slot.stage,
                Expr::signal(&data),
                valid,
                ready,
            );
            state.borrow_mut().vars.push(link.clone());
            self.slot.prev.borrow_mut().push(link.clone());
            cur = link;
        }
        Ok(cur)
    }

    /// Drive an external destination from this value. Stateful
    /// destinations are written through the action list; combinational
    /// ones by direct assignment. The driven valid defaults to constant
    /// true, and the supplied `ready` (default constant true) drives
    /// this value's own ready wire.
    pub fn output(
        &self,
        dest: &RRC<Signal>,
        valid: Option<&RRC<Signal>>,
        ready: Option<Expr>,
    ) -> SluiceResult<()> {
        let state = self.pipe.upgrade();
        let module = Rc::clone(state.borrow().module());
        if dest.borrow().is_reg() {
            state.borrow_mut().seq.add(dest, self.slot.data.clone());
        } else {
            module.borrow_mut().assign(dest, self.slot.data.clone())?;
        }
        if let Some(vdst) = valid {
            let my_valid =
                self.slot.valid.clone().unwrap_or_else(Expr::one);
            if vdst.borrow().is_reg() {
                state.borrow_mut().seq.add(vdst, my_valid);
            } else {
                module.borrow_mut().assign(vdst, my_valid)?;
            }
        }
        if let Some(rdy) = &self.slot.ready {
            let drive = ready.unwrap_or_else(Expr::one);
            module.borrow_mut().assign(rdy, drive)?;
        }
        Ok(())
    }

    /// Force this value's data register to `init` (and its valid
    /// register low) whenever `cond` holds. Used to inject flush
    /// behavior without restructuring the dataflow.
    pub fn reset(&self, cond: Expr, init: u64) -> SluiceResult<()> {
        let Expr::Signal(data_reg) = &self.slot.data else {
            return Err(Error::malformed_structure(
                "reset requires a handle backed by a data register",
            ));
        };
        if !data_reg.borrow().is_reg() {
            return Err(Error::malformed_structure(format!(
                "reset target `{}' is not a register",
                data_reg.borrow().name()
            )));
        }
        let state = self.pipe.upgrade();
        let mut st = state.borrow_mut();
        let width = data_reg.borrow().width;
        st.seq
            .add_cond(data_reg, Expr::constant(init, width), cond.clone());
        if let Some(Expr::Signal(vreg)) = &self.slot.valid {
            if vreg.borrow().is_reg() {
                st.seq.add_cond(vreg, Expr::constant(0, 1), cond);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Module, rrc};

    fn setup() -> (RRC<Module>, Pipeline) {
        let module = rrc(Module::new("top"));
        let pipe = Pipeline::new(&module, "p");
        (module, pipe)
    }

    #[test]
    fn staging_increments_stage_and_allocates_one_register() {
        let (module, pipe) = setup();
        let din = module.borrow_mut().input("din", 16).unwrap();
        let a = pipe.input(Expr::signal(&din), None, None);
        assert_eq!(a.stage_index(), 0);

        let before = module.borrow().reg_count();
        let v = pipe.stage(a.expr()).unwrap();
        assert_eq!(v.stage_index(), 1);
        assert_eq!(module.borrow().reg_count(), before + 1);
        assert!(module.borrow().find("_p_data0").is_some());

        let w = pipe.stage(v.expr()).unwrap();
        assert_eq!(w.stage_index(), 2);
        assert!(module.borrow().find("_p_data1").is_some());
        assert_eq!(w.bit_width(), 16);
    }

    #[test]
    fn staging_an_independent_expression_yields_stage_zero() {
        let (module, pipe) = setup();
        let din = module.borrow_mut().input("din", 8).unwrap();
        let v = pipe.stage(Expr::signal(&din)).unwrap();
        assert_eq!(v.stage_index(), 0);
    }

    #[test]
    fn handshake_allocates_valid_register_and_ready_wire() {
        let (module, pipe) = setup();
        let (din, vld, rdy) = {
            let mut m = module.borrow_mut();
            (
                m.input("din", 8).unwrap(),
                m.input("din_valid", 1).unwrap(),
                m.output("din_ready", 1).unwrap(),
            )
        };
        let a = pipe.input(
            Expr::signal(&din),
            Some(Expr::signal(&vld)),
            Some(Rc::clone(&rdy)),
        );
        let v = pipe.stage(a.expr()).unwrap();

        let m = module.borrow();
        let vreg = m.find("_p_valid0").unwrap();
        assert!(vreg.borrow().is_reg());
        let rwire = m.find("_p_ready0").unwrap();
        assert!(!rwire.borrow().is_reg());
        assert!(v.valid_expr().is_some());
        assert!(v.ready_signal().is_some());

        // The supplied ready is driven from the freshly allocated wire.
        assert!(m.continuous_assignments.iter().any(|asgn| {
            asgn.dst.borrow().name() == "din_ready"
                && asgn.src == Expr::signal(&rwire)
        }));

        // Data loads under valid && ready; the valid register under
        // ready alone.
        let entries = pipe.entries();
        assert_eq!(
            entries[0].guard,
            Some(Expr::signal(&vld).land(Expr::signal(&rwire)))
        );
        assert_eq!(entries[1].guard, Some(Expr::signal(&rwire)));
    }

    #[test]
    fn history_reuses_the_shared_chain_prefix() {
        let (module, pipe) = setup();
        let din = module.borrow_mut().input("din", 16).unwrap();
        let a = pipe.input(Expr::signal(&din), None, None);
        let v = pipe.stage(a.expr()).unwrap();

        let before = module.borrow().reg_count();
        let h3 = v.history(3).unwrap();
        assert_eq!(module.borrow().reg_count(), before + 3);
        assert_eq!(h3.bit_width(), 16);
        assert_eq!(h3.stage_index(), v.stage_index());

        // The 2-deep request is served entirely from the cached chain.
        let h2 = v.history(2).unwrap();
        assert_eq!(module.borrow().reg_count(), before + 3);
        assert!(!h2.same_slot(&h3));

        let h3_again = v.history(3).unwrap();
        assert!(h3.same_slot(&h3_again));
    }

    #[test]
    fn history_zero_returns_self_and_negative_fails() {
        let (module, pipe) = setup();
        let din = module.borrow_mut().input("din", 8).unwrap();
        let v = pipe.stage(Expr::signal(&din)).unwrap();

        let h0 = v.history(0).unwrap();
        assert!(h0.same_slot(&v));

        let before = module.borrow().reg_count();
        let err = v.history(-1).unwrap_err();
        assert!(matches!(err, Error::InvalidIndex(-1)));
        assert_eq!(module.borrow().reg_count(), before);
    }

    #[test]
    fn history_propagates_validity_through_nvalid_wires() {
        let (module, pipe) = setup();
        let (din, vld) = {
            let mut m = module.borrow_mut();
            (m.input("din", 8).unwrap(), m.input("din_valid", 1).unwrap())
        };
        let a =
            pipe.input(Expr::signal(&din), Some(Expr::signal(&vld)), None);
        let v = pipe.stage(a.expr()).unwrap();
        let h1 = v.history(1).unwrap();
        assert!(h1.valid_expr().is_some());
        let m = module.borrow();
        let nv = m.find("_p_nvalid1").unwrap();
        assert_eq!(h1.valid_expr().unwrap(), Expr::signal(&nv));
        // nvalid = chain valid register && root validity.
        assert!(m.continuous_assignments.iter().any(|asgn| {
            asgn.dst.borrow().name() == "_p_nvalid1"
        }));
    }

    #[test]
    fn reset_appends_exactly_two_conditioned_writes() {
        let (module, pipe) = setup();
        let (din, vld, flush) = {
            let mut m = module.borrow_mut();
            (
                m.input("din", 8).unwrap(),
                m.input("din_valid", 1).unwrap(),
                m.input("flush", 1).unwrap(),
            )
        };
        let a =
            pipe.input(Expr::signal(&din), Some(Expr::signal(&vld)), None);
        let v = pipe.stage(a.expr()).unwrap();

        let before = pipe.entries().len();
        v.reset(Expr::signal(&flush), 0).unwrap();
        let entries = pipe.entries();
        assert_eq!(entries.len(), before + 2);
        for entry in &entries[before..] {
            assert_eq!(entry.guard, Some(Expr::signal(&flush)));
        }
        assert_eq!(entries[before].dst.borrow().name(), "_p_data0");
        assert_eq!(entries[before + 1].dst.borrow().name(), "_p_valid0");
    }

    #[test]
    fn reset_requires_a_register_backed_handle() {
        let (module, pipe) = setup();
        let din = module.borrow_mut().input("din", 8).unwrap();
        let a = pipe.input(Expr::signal(&din), None, None);
        let err = a.reset(Expr::one(), 0).unwrap_err();
        assert!(matches!(err, Error::MalformedStructure(_)));
        assert!(pipe.entries().is_empty());
    }

    #[test]
    fn output_dispatches_on_destination_kind() {
        let (module, pipe) = setup();
        let (din, dout_reg, dout_wire) = {
            let mut m = module.borrow_mut();
            (
                m.input("din", 8).unwrap(),
                m.output_reg("dout", 8, 0).unwrap(),
                m.output("dout_comb", 8).unwrap(),
            )
        };
        let a = pipe.input(Expr::signal(&din), None, None);
        let v = pipe.stage(a.expr()).unwrap();

        let before = pipe.entries().len();
        v.output(&dout_reg, None, None).unwrap();
        let entries = pipe.entries();
        assert_eq!(entries.len(), before + 1);
        assert!(entries[before].guard.is_none());
        assert_eq!(entries[before].dst.borrow().name(), "dout");

        v.output(&dout_wire, None, None).unwrap();
        let m = module.borrow();
        assert!(m.continuous_assignments.iter().any(|asgn| {
            asgn.dst.borrow().name() == "dout_comb"
        }));
    }

    #[test]
    fn output_defaults_ready_to_constant_true() {
        let (module, pipe) = setup();
        let (din, rdy, dout) = {
            let mut m = module.borrow_mut();
            (
                m.input("din", 8).unwrap(),
                m.output("din_ready", 1).unwrap(),
                m.output("dout", 8).unwrap(),
            )
        };
        let a = pipe.input(Expr::signal(&din), None, Some(Rc::clone(&rdy)));
        let v = pipe.stage(a.expr()).unwrap();
        v.output(&dout, None, None).unwrap();
        let m = module.borrow();
        let stage_ready = m.find("_p_ready0").unwrap();
        // With no valid in sight the data load is guarded by ready alone.
        assert_eq!(
            pipe.entries()[0].guard,
            Some(Expr::signal(&stage_ready))
        );
        assert!(m.continuous_assignments.iter().any(|asgn| {
            Rc::ptr_eq(&asgn.dst, &stage_ready) && asgn.src == Expr::one()
        }));
    }

    #[test]
    fn escape_hatches_share_the_counter() {
        let (module, pipe) = setup();
        let r = pipe.add_reg("acc", 8, 0).unwrap();
        let w = pipe.add_wire("tap", 8).unwrap();
        assert_eq!(r.borrow().name(), "_p_acc0");
        assert_eq!(w.borrow().name(), "_p_tap1");
        let din = module.borrow_mut().input("din", 8).unwrap();
        let v = pipe.stage(Expr::signal(&din)).unwrap();
        assert_eq!(v.bit_width(), 8);
        assert!(module.borrow().find("_p_data2").is_some());
    }
}
