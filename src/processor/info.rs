//! Per-stage identity, active function slot, and timing bookkeeping.
//!
//! Grounded in `loopy/processor.go`'s `ProcessorInfo`. `AddTimeInfo` there
//! stamps `PROC_ENTER_TIME` twice in a row in `ExecStack` (see
//! [`super::stack`]) - a bug we do not reproduce, since spec §8 requires
//! `leave >= enter` as a checkable invariant per stage per message.

use std::time::Instant;

use crate::message::{Header, Message};
use crate::payload::{Params, Payload};

/// What kind of function a stage's active slot holds. Only [`Kind::Reduce`]
/// needs the two-payload, state-updating signature; every other kind is a
/// single-payload mapper. Mirrors `loopy/auxiliary.go`'s `OP_*` family,
/// narrowed to the two shapes [`super::stack::ProcessorStack::exec`] actually
/// dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Map,
    Reduce,
    Filter,
    /// A structural (fan/merge/latch/...) stage with no selectable function
    /// at all - it manipulates whole messages directly in its task loop
    /// rather than through [`ProcessorInfo::apply`]/[`ProcessorInfo::predicate`].
    Structural,
}

/// A mapper function: payload in, payload out, parameterised.
pub type MapperFn<V> = std::sync::Arc<dyn Fn(V, &Params) -> V + Send + Sync>;

/// A reducer function: folds a payload into running state, emitting the
/// updated state and an output payload. Mirrors `Function.Reducer`'s
/// `(state, in, params) -> (state, out)` shape.
pub type ReducerFn<V> = std::sync::Arc<dyn Fn(&mut V, V, &Params) -> V + Send + Sync>;

/// A `Filter`'s predicate: the Go original reuses the `Mapper` slot and
/// type-asserts its `T` return to `bool`; Rust's static typing makes that
/// illegal, so `Filter` gets its own function shape instead.
pub type PredicateFn<V> = std::sync::Arc<dyn Fn(&V, &Params) -> bool + Send + Sync>;

/// One of a stage's selectable functions, addressed by the active
/// `func_idx`. Stages usually carry exactly one; the slot vector exists so
/// an in-band [`crate::message::FuncSwitch`] can hot-swap the active
/// function/parameters without rebuilding the stage.
pub enum Function<V: Payload> {
    Map { params: Params, f: MapperFn<V> },
    Reduce {
        state: V,
        params: Params,
        f: ReducerFn<V>,
    },
    Filter { params: Params, f: PredicateFn<V> },
}

impl<V: Payload> Function<V> {
    pub fn kind(&self) -> Kind {
        match self {
            Function::Map { .. } => Kind::Map,
            Function::Reduce { .. } => Kind::Reduce,
            Function::Filter { .. } => Kind::Filter,
        }
    }

    pub fn params(&self) -> &Params {
        match self {
            Function::Map { params, .. } => params,
            Function::Reduce { params, .. } => params,
            Function::Filter { params, .. } => params,
        }
    }

    pub fn params_mut(&mut self) -> &mut Params {
        match self {
            Function::Map { params, .. } => params,
            Function::Reduce { params, .. } => params,
            Function::Filter { params, .. } => params,
        }
    }

    fn apply(&mut self, input: V) -> V {
        match self {
            Function::Map { params, f } => f(input, params),
            Function::Reduce { state, params, f } => f(state, input, params),
            Function::Filter { .. } => {
                panic!("Function::Filter has no V -> V apply; use ProcessorInfo::predicate")
            }
        }
    }

    fn predicate(&self, input: &V) -> bool {
        match self {
            Function::Filter { params, f } => f(input, params),
            _ => panic!("Function::predicate called on a non-Filter function"),
        }
    }
}

/// Identity, function table, and timing ledger for one stage.
pub struct ProcessorInfo<V: Payload> {
    pub name: String,
    pub id: u64,
    funcs: Vec<Function<V>>,
    func_idx: usize,
}

impl<V: Payload> ProcessorInfo<V> {
    pub fn new(name: impl Into<String>, id: u64, funcs: Vec<Function<V>>) -> Self {
        Self {
            name: name.into(),
            id,
            funcs,
            func_idx: 0,
        }
    }

    /// A stage with no selectable function at all - every structural
    /// (fan/merge/latch/...) operator.
    pub fn structural(name: impl Into<String>, id: u64) -> Self {
        Self::new(name, id, Vec::new())
    }

    pub fn kind(&self) -> Kind {
        self.funcs
            .get(self.func_idx)
            .map(Function::kind)
            .unwrap_or(Kind::Structural)
    }

    /// Applies the currently active function to `input`, stamping enter/leave
    /// timestamps on `header` around the call.
    pub fn apply(&mut self, input: V, header: &mut Header) -> V {
        header.stamp_enter(&self.name, Instant::now());
        let out = self.funcs[self.func_idx].apply(input);
        header.stamp_leave(&self.name, Instant::now());
        out
    }

    /// Applies a message, deep-cloning the header first only when the caller
    /// needs an independent branch copy (e.g. `Copy`/`Split`); callers that
    /// own the message outright should use [`Self::apply`] directly.
    pub fn apply_message(&mut self, msg: Message<V>) -> Message<V> {
        let Message { mut header, value } = msg;
        let value = self.apply(value, &mut header);
        Message { header, value }
    }

    /// Evaluates the active `Filter` predicate against `input`, stamping
    /// enter/leave timestamps on `header` around the call. Panics if the
    /// active function is not a `Filter` - callers only invoke this from the
    /// `Filter` operator's own task loop.
    pub fn predicate(&mut self, input: &V, header: &mut Header) -> bool {
        header.stamp_enter(&self.name, Instant::now());
        let decision = self.funcs[self.func_idx].predicate(input);
        header.stamp_leave(&self.name, Instant::now());
        decision
    }

    /// Applies an in-band reconfiguration request addressed to this stage:
    /// switches the active function slot and/or replaces its parameters.
    /// Mirrors `ProcessorInfo.UpdateSettings`.
    pub fn update_settings(&mut self, func_idx: usize, params: Params) {
        assert!(func_idx < self.funcs.len(), "func_idx out of range");
        self.func_idx = func_idx;
        *self.funcs[self.func_idx].params_mut() = params;
    }

    /// Reads and applies a pending [`crate::message::FuncSwitch`] targeted at
    /// this stage before running the message through the active function.
    /// The combination every `Map`/`Reduce` task loop performs per message.
    pub fn apply_message_with_switch(&mut self, msg: Message<V>) -> Message<V> {
        if let Some((idx, params)) = msg.header.take_func_switch(&self.name) {
            self.update_settings(idx, params);
        }
        self.apply_message(msg)
    }

    /// The `Filter` analogue of [`Self::apply_message_with_switch`].
    pub fn predicate_with_switch(&mut self, value: &V, header: &mut Header) -> bool {
        if let Some((idx, params)) = header.take_func_switch(&self.name) {
            self.update_settings(idx, params);
        }
        self.predicate(value, header)
    }

    /// Disposes a `Reduce` stage's running state on shutdown, mirroring
    /// `defer DeepDispose(u)` in `loopy/algebra.go`'s `Reduce`. A no-op for
    /// every other kind.
    pub fn dispose_state(&mut self) {
        if let Function::Reduce { state, .. } = &mut self.funcs[self.func_idx] {
            state.dispose();
        }
    }
}
