//! The graph builder: [`Graph`], its fluent operator constructors, and
//! [`Graph::execute`].
//!
//! Channels are created eagerly, at link time, rather than lazily during
//! `Execute()` as `loopy/exgraph.go` does - nothing reads or writes a channel
//! before `execute()` spawns any task, so the two orderings are behaviourally
//! identical and the eager version needs no `Option`-filled "pending channel"
//! bookkeeping of its own. `scan()` is likewise called explicitly from
//! `execute()`, ahead of spawning, rather than left uncalled as in the
//! original's commented-out `//g.scan()`.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::graph::branch::{self, Branch, OpKind, TopologyView};
use crate::graph::edge::{ChanInfo, EdgeInfo};
use crate::message::Envelope;
use crate::payload::{Params, Payload, Vectorize};
use crate::processor::info::{Function, MapperFn, PredicateFn, ProcessorInfo, ReducerFn};
use crate::processor::Processor;
use crate::scheduler::SchedulerConfig;
use crate::sequence::Sequence;

type BoxFuture = Pin<Box<dyn std::future::Future<Output = ()> + Send>>;
type SpawnFn<V> = Box<dyn FnOnce(Arc<Processor<V>>, ExecCtx<V>) -> BoxFuture + Send>;

/// Everything a stage's task loop needs from the graph besides its own
/// channels: the shared scheduler tuning, and (for a `Ground`) the branches
/// it should fold its timing stamps into.
#[derive(Clone)]
pub struct ExecCtx<V: Payload> {
    pub config: Arc<SchedulerConfig>,
    pub ground_branches: Arc<Vec<Arc<Mutex<Branch>>>>,
    _marker: PhantomData<V>,
}

/// A named output lane of a stage: the stage's name plus which output slot.
/// Every constructor that consumes an upstream stage accepts `impl Into<Lane<V>>`,
/// and `Stage::lane` / the blanket `From<&Stage<V>>` (slot 0) cover the two
/// ways of producing one.
pub struct Lane<V: Payload> {
    pub(crate) name: String,
    pub(crate) slot: usize,
    _marker: PhantomData<V>,
}

impl<V: Payload> Clone for Lane<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            slot: self.slot,
            _marker: PhantomData,
        }
    }
}

impl<V: Payload> From<&Stage<V>> for Lane<V> {
    fn from(s: &Stage<V>) -> Self {
        s.lane(0)
    }
}

/// A handle to a registered stage, returned by every constructor and usable
/// as the next constructor's input.
pub struct Stage<V: Payload> {
    name: String,
    _marker: PhantomData<V>,
}

impl<V: Payload> Clone for Stage<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V: Payload> Stage<V> {
    fn new(name: String) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A handle to one of this stage's output slots, for stages with more
    /// than one (`Filter`, `Copy`, `Split`, `Latch`, `Cut`, `Scatter`, ...).
    pub fn lane(&self, slot: usize) -> Lane<V> {
        Lane {
            name: self.name.clone(),
            slot,
            _marker: PhantomData,
        }
    }
}

struct NodeBuilder<V: Payload> {
    info: Option<ProcessorInfo<V>>,
    inputs: Vec<Option<flume::Receiver<Envelope<V>>>>,
    outputs: Vec<Option<flume::Sender<Envelope<V>>>>,
    spawn: Option<SpawnFn<V>>,
    composite_in: Vec<String>,
    composite_out: Vec<String>,
}

/// A point-in-time copy of the logical topology, handed to [`branch::scan`].
/// Composite stages appear here under their own name, with their true
/// upstream/downstream edges - branch extraction never sees the inner
/// pipeline a `List`/`Group` is built from, only its boundary.
struct TopoSnapshot {
    kind: HashMap<String, OpKind>,
    order: Vec<String>,
    ground_names: Vec<String>,
    out_target: HashMap<String, Vec<Option<String>>>,
    edges: HashMap<String, EdgeInfo>,
}

impl TopologyView for TopoSnapshot {
    fn kind(&self, name: &str) -> OpKind {
        self.kind[name]
    }

    fn all_names(&self) -> Vec<String> {
        self.order.clone()
    }

    fn ground_names(&self) -> Vec<String> {
        self.ground_names.clone()
    }

    fn neighbors(&self, name: &str) -> Vec<String> {
        self.out_target
            .get(name)
            .map(|v| v.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    fn in_degree(&self, name: &str) -> usize {
        self.edges.get(name).map(|e| e.n_in_chans).unwrap_or(0)
    }

    fn out_degree(&self, name: &str) -> usize {
        self.out_target
            .get(name)
            .map(|v| v.iter().filter(|o| o.is_some()).count())
            .unwrap_or(0)
    }

    fn upstream_edges(&self, name: &str) -> Vec<(String, ChanInfo)> {
        self.edges
            .get(name)
            .map(|e| e.chans.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}

struct Inner<V: Payload> {
    seq: Sequence,
    order: Vec<String>,
    kind: HashMap<String, OpKind>,
    out_target: HashMap<String, Vec<Option<String>>>,
    edges: HashMap<String, EdgeInfo>,
    nodes: HashMap<String, NodeBuilder<V>>,
    frozen: bool,
}

impl<V: Payload> Inner<V> {
    fn new() -> Self {
        Self {
            seq: Sequence::new(0),
            order: Vec::new(),
            kind: HashMap::new(),
            out_target: HashMap::new(),
            edges: HashMap::new(),
            nodes: HashMap::new(),
            frozen: false,
        }
    }

    fn ensure_not_frozen(&self) -> Result<()> {
        if self.frozen {
            Err(Error::GraphFrozen)
        } else {
            Ok(())
        }
    }

    fn resolve_out(&self, name: &str, slot: usize) -> (String, usize) {
        let node = &self.nodes[name];
        if !node.composite_out.is_empty() {
            (node.composite_out[slot].clone(), 0)
        } else {
            (name.to_string(), slot)
        }
    }

    fn resolve_in(&self, name: &str, slot: usize) -> (String, usize) {
        let node = &self.nodes[name];
        if !node.composite_in.is_empty() {
            (node.composite_in[slot].clone(), 0)
        } else {
            (name.to_string(), slot)
        }
    }

    /// Links output slot `up_slot` of `up` to input slot `down_slot` of
    /// `down`, recording the logical edge (for branch extraction, against
    /// the names as the caller sees them) and creating the physical
    /// rendezvous channel (against whichever real processor a composite
    /// endpoint resolves to).
    fn link(&mut self, up: &str, up_slot: usize, down: &str, down_slot: usize) -> Result<()> {
        if !self.nodes.contains_key(up) {
            return Err(Error::UnknownStage(up.to_string()));
        }
        if !self.nodes.contains_key(down) {
            return Err(Error::UnknownStage(down.to_string()));
        }

        {
            let targets = self
                .out_target
                .get_mut(up)
                .expect("registered node has an out_target entry");
            if up_slot >= targets.len() {
                return Err(Error::OutputSlotOccupied {
                    stage: up.into(),
                    slot: up_slot,
                    existing: down.into(),
                });
            }
            if let Some(existing) = &targets[up_slot] {
                return Err(Error::OutputSlotOccupied {
                    stage: up.into(),
                    slot: up_slot,
                    existing: existing.clone(),
                });
            }
            targets[up_slot] = Some(down.to_string());
        }
        self.edges
            .entry(down.to_string())
            .or_default()
            .record_edge(up, up_slot, down_slot);

        let (phys_up, phys_up_slot) = self.resolve_out(up, up_slot);
        let (phys_down, phys_down_slot) = self.resolve_in(down, down_slot);

        let (tx, rx) = flume::bounded(0);
        {
            let upstream = self
                .nodes
                .get_mut(&phys_up)
                .ok_or_else(|| Error::UnknownStage(phys_up.clone()))?;
            if phys_up_slot >= upstream.outputs.len() {
                upstream.outputs.resize_with(phys_up_slot + 1, || None);
            }
            if upstream.outputs[phys_up_slot].is_some() {
                return Err(Error::OutputSlotOccupied {
                    stage: phys_up.clone(),
                    slot: phys_up_slot,
                    existing: phys_down.clone(),
                });
            }
            upstream.outputs[phys_up_slot] = Some(tx);
        }
        {
            let downstream = self
                .nodes
                .get_mut(&phys_down)
                .ok_or_else(|| Error::UnknownStage(phys_down.clone()))?;
            if phys_down_slot >= downstream.inputs.len() {
                downstream.inputs.resize_with(phys_down_slot + 1, || None);
            }
            if downstream.inputs[phys_down_slot].is_some() {
                return Err(Error::InputSlotOccupied {
                    stage: phys_down.clone(),
                    slot: phys_down_slot,
                    existing: phys_up.clone(),
                });
            }
            downstream.inputs[phys_down_slot] = Some(rx);
        }
        Ok(())
    }

    fn register(
        &mut self,
        name: String,
        kind: OpKind,
        num_outputs: usize,
        info: ProcessorInfo<V>,
        spawn: SpawnFn<V>,
        input_lanes: &[Lane<V>],
    ) -> Result<String> {
        self.ensure_not_frozen()?;
        self.order.push(name.clone());
        self.kind.insert(name.clone(), kind);
        self.out_target.insert(name.clone(), vec![None; num_outputs]);
        self.nodes.insert(
            name.clone(),
            NodeBuilder {
                info: Some(info),
                inputs: vec![None; input_lanes.len()],
                outputs: vec![None; num_outputs],
                spawn: Some(spawn),
                composite_in: Vec::new(),
                composite_out: Vec::new(),
            },
        );
        for (slot, lane) in input_lanes.iter().enumerate() {
            self.link(&lane.name, lane.slot, &name, slot)?;
        }
        Ok(name)
    }

    fn register_composite(
        &mut self,
        name: String,
        num_outputs: usize,
        composite_in: Vec<String>,
        composite_out: Vec<String>,
        input_lanes: &[Lane<V>],
    ) -> Result<String> {
        self.ensure_not_frozen()?;
        if !input_lanes.is_empty() && composite_in.len() != input_lanes.len() {
            return Err(Error::CompositeLaneMismatch(
                name.clone(),
                "inputs".into(),
                composite_in.len(),
                input_lanes.len(),
            ));
        }
        self.order.push(name.clone());
        self.kind.insert(name.clone(), OpKind::Composite);
        self.out_target.insert(name.clone(), vec![None; num_outputs]);
        self.nodes.insert(
            name.clone(),
            NodeBuilder {
                info: None,
                inputs: Vec::new(),
                outputs: Vec::new(),
                spawn: None,
                composite_in,
                composite_out,
            },
        );
        for (slot, lane) in input_lanes.iter().enumerate() {
            self.link(&lane.name, lane.slot, &name, slot)?;
        }
        Ok(name)
    }
}

/// A running pipeline's task handles. `join` waits for every stage to drain
/// (e.g. because its sources exhausted) and then stops the scheduler.
pub struct RunningGraph<V: Payload> {
    tasks: Vec<tokio::task::JoinHandle<()>>,
    scheduler: tokio::task::JoinHandle<()>,
    _marker: PhantomData<V>,
}

impl<V: Payload> RunningGraph<V> {
    pub async fn join(self) {
        for t in self.tasks {
            let _ = t.await;
        }
        self.scheduler.abort();
    }
}

/// A streaming dataflow graph under construction.
pub struct Graph<V: Payload> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V: Payload> Clone for Graph<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Payload> Default for Graph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Payload> Graph<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    /// Links an existing lane into a stage's input slot after the fact - the
    /// escape hatch a custom [`Self::list`] factory needs when its inner
    /// pipelines are meant to be fed externally rather than by their own
    /// `Source`.
    pub fn connect(&self, from: impl Into<Lane<V>>, to: &Stage<V>, to_slot: usize) -> Result<()> {
        let from = from.into();
        let mut inner = self.inner.lock().unwrap();
        inner.link(&from.name, from.slot, to.name(), to_slot)
    }

    pub fn source(
        &self,
        name: impl Into<String>,
        spout: impl crate::ops::source::Spout<V> + 'static,
    ) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let boxed: Box<dyn crate::ops::source::Spout<V>> = Box::new(spout);
        let spawn: SpawnFn<V> = Box::new(move |proc, ctx| Box::pin(crate::ops::source::run(proc, boxed, ctx)));
        inner.register(name.clone(), OpKind::Source, 1, info, spawn, &[])?;
        Ok(Stage::new(name))
    }

    pub fn ground(&self, name: impl Into<String>, input: impl Into<Lane<V>>) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let spawn: SpawnFn<V> = Box::new(|proc, ctx| Box::pin(crate::ops::ground::run(proc, ctx)));
        inner.register(name.clone(), OpKind::Ground, 0, info, spawn, &[input.into()])?;
        Ok(Stage::new(name))
    }

    pub fn map(
        &self,
        name: impl Into<String>,
        input: impl Into<Lane<V>>,
        params: Params,
        f: MapperFn<V>,
    ) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::new(name.clone(), id, vec![Function::Map { params, f }]);
        let spawn: SpawnFn<V> = Box::new(|proc, ctx| Box::pin(crate::ops::map::run(proc, ctx)));
        inner.register(name.clone(), OpKind::Map, 1, info, spawn, &[input.into()])?;
        Ok(Stage::new(name))
    }

    pub fn reduce(
        &self,
        name: impl Into<String>,
        input: impl Into<Lane<V>>,
        seed: V,
        params: Params,
        f: ReducerFn<V>,
    ) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::new(
            name.clone(),
            id,
            vec![Function::Reduce {
                state: seed,
                params,
                f,
            }],
        );
        let spawn: SpawnFn<V> = Box::new(|proc, ctx| Box::pin(crate::ops::reduce::run(proc, ctx)));
        inner.register(name.clone(), OpKind::Reduce, 1, info, spawn, &[input.into()])?;
        Ok(Stage::new(name))
    }

    pub fn filter(
        &self,
        name: impl Into<String>,
        input: impl Into<Lane<V>>,
        params: Params,
        f: PredicateFn<V>,
    ) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::new(name.clone(), id, vec![Function::Filter { params, f }]);
        let spawn: SpawnFn<V> = Box::new(|proc, ctx| Box::pin(crate::ops::filter::run(proc, ctx)));
        inner.register(name.clone(), OpKind::Filter, 2, info, spawn, &[input.into()])?;
        Ok(Stage::new(name))
    }

    pub fn copy(&self, name: impl Into<String>, input: impl Into<Lane<V>>, n: usize) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let spawn: SpawnFn<V> = Box::new(|proc, ctx| Box::pin(crate::ops::copy::run(proc, ctx)));
        inner.register(name.clone(), OpKind::Copy, n, info, spawn, &[input.into()])?;
        Ok(Stage::new(name))
    }

    pub fn split(&self, name: impl Into<String>, input: impl Into<Lane<V>>, n: usize) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let spawn: SpawnFn<V> = Box::new(|proc, ctx| Box::pin(crate::ops::split::run(proc, ctx)));
        inner.register(name.clone(), OpKind::Split, n, info, spawn, &[input.into()])?;
        Ok(Stage::new(name))
    }

    pub fn latch(&self, name: impl Into<String>, input: impl Into<Lane<V>>) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let spawn: SpawnFn<V> = Box::new(|proc, ctx| Box::pin(crate::ops::latch::run(proc, ctx)));
        inner.register(name.clone(), OpKind::Latch, 2, info, spawn, &[input.into()])?;
        Ok(Stage::new(name))
    }

    pub fn cut(&self, name: impl Into<String>, input: impl Into<Lane<V>>) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let spawn: SpawnFn<V> = Box::new(|proc, ctx| Box::pin(crate::ops::cut::run(proc, ctx)));
        inner.register(name.clone(), OpKind::Cut, 2, info, spawn, &[input.into()])?;
        Ok(Stage::new(name))
    }

    pub fn add(&self, name: impl Into<String>, inputs: &[Lane<V>]) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let spawn: SpawnFn<V> = Box::new(|proc, ctx| Box::pin(crate::ops::add::run(proc, ctx)));
        inner.register(name.clone(), OpKind::Add, 1, info, spawn, inputs)?;
        Ok(Stage::new(name))
    }

    pub fn scatter(
        &self,
        name: impl Into<String>,
        input: impl Into<Lane<V>>,
        n: usize,
        expand: crate::ops::scatter::Expander<V>,
        route: crate::ops::scatter::Router<V>,
    ) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let spawn: SpawnFn<V> = Box::new(move |proc, ctx| Box::pin(crate::ops::scatter::run(proc, expand, route, ctx)));
        inner.register(name.clone(), OpKind::Scatter, n, info, spawn, &[input.into()])?;
        Ok(Stage::new(name))
    }

    pub fn merge(
        &self,
        name: impl Into<String>,
        inputs: &[Lane<V>],
        select: crate::ops::merge::Selector<V>,
    ) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let spawn: SpawnFn<V> = Box::new(move |proc, ctx| Box::pin(crate::ops::merge::run(proc, select, ctx)));
        inner.register(name.clone(), OpKind::Merge, 1, info, spawn, inputs)?;
        Ok(Stage::new(name))
    }

    /// `List(n, factory)`: a composite of `n` independently-built inner
    /// pipelines. `factory(graph, i)` constructs lane `i` and returns its
    /// entry and exit stages; the composite's boundary is opaque to branch
    /// extraction (spec §4.3 - a composite participates in the graph as one
    /// fan/join node, never decomposed).
    pub fn list(
        &self,
        name: impl Into<String>,
        n: usize,
        mut factory: impl FnMut(&Graph<V>, usize) -> Result<(Stage<V>, Stage<V>)>,
    ) -> Result<Stage<V>> {
        let name = name.into();
        let mut composite_in = Vec::with_capacity(n);
        let mut composite_out = Vec::with_capacity(n);
        for i in 0..n {
            let (in_stage, out_stage) = factory(self, i)?;
            composite_in.push(in_stage.name().to_string());
            composite_out.push(out_stage.name().to_string());
        }
        let mut inner = self.inner.lock().unwrap();
        inner.register_composite(name.clone(), n, composite_in, composite_out, &[])?;
        Ok(Stage::new(name))
    }

    /// `Group(n_in, n_out, f, p)`: `List(n_in, Scatter)` cross-wired into
    /// `List(n_out, Add)`, per `loopy/algebra.go`'s `Group`. Lane `i`'s
    /// scatter feeds output `j` of every `j`-th `Add`, so every input can
    /// reach every output - the crossbar the original achieves via
    /// `LinkOut`. `Add` doesn't distinguish which upstream fed which value,
    /// so which of the `n_in` scattered values lands at a given `Add` first
    /// is effectively unordered (see spec §9's open question on `Group`'s
    /// merge order).
    pub fn group(
        &self,
        name: impl Into<String>,
        n_in: usize,
        n_out: usize,
        inputs: &[Lane<V>],
        expand: crate::ops::scatter::Expander<V>,
        route: crate::ops::scatter::Router<V>,
    ) -> Result<Stage<V>> {
        let name = name.into();

        let mut scatters = Vec::with_capacity(n_in);
        for (i, lane) in inputs.iter().enumerate().take(n_in) {
            let s = self.scatter(
                format!("{name}.scatter.{i}"),
                lane.clone(),
                n_out,
                Arc::clone(&expand),
                Arc::clone(&route),
            )?;
            scatters.push(s);
        }

        let mut adds = Vec::with_capacity(n_out);
        for j in 0..n_out {
            let crossbar: Vec<Lane<V>> = scatters.iter().map(|s| s.lane(j)).collect();
            let a = self.add(format!("{name}.add.{j}"), &crossbar)?;
            adds.push(a);
        }

        let composite_in = scatters.iter().map(|s| s.name().to_string()).collect();
        let composite_out = adds.iter().map(|s| s.name().to_string()).collect();

        let mut inner = self.inner.lock().unwrap();
        inner.register_composite(name.clone(), n_out, composite_in, composite_out, &[])?;
        Ok(Stage::new(name))
    }

    /// Freezes the topology, extracts branches, spawns one task per stage,
    /// and starts the background fusion scheduler.
    pub fn execute(&self, config: SchedulerConfig) -> Result<RunningGraph<V>> {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure_not_frozen()?;
        inner.frozen = true;

        let snapshot = TopoSnapshot {
            kind: inner.kind.clone(),
            order: inner.order.clone(),
            ground_names: inner
                .kind
                .iter()
                .filter(|(_, k)| **k == OpKind::Ground)
                .map(|(n, _)| n.clone())
                .collect(),
            out_target: inner.out_target.clone(),
            edges: inner.edges.clone(),
        };
        let (branches, gnd_branches) = branch::scan(&snapshot);
        let branches: Vec<Arc<Mutex<Branch>>> = branches.into_iter().map(|b| Arc::new(Mutex::new(b))).collect();
        let gnd_branches: HashMap<String, Arc<Vec<Arc<Mutex<Branch>>>>> = gnd_branches
            .into_iter()
            .map(|(g, idxs)| {
                let list = idxs.into_iter().map(|i| Arc::clone(&branches[i])).collect();
                (g, Arc::new(list))
            })
            .collect();
        let empty_branches: Arc<Vec<Arc<Mutex<Branch>>>> = Arc::new(Vec::new());

        let config = Arc::new(config);
        let mut processors: HashMap<String, Arc<Processor<V>>> = HashMap::new();
        let mut tasks = Vec::new();

        let names = inner.order.clone();
        for name in &names {
            if inner.kind[name] == OpKind::Composite {
                continue;
            }
            let node = inner.nodes.get_mut(name).expect("registered node");
            let info = node.info.take().expect("non-composite node carries a ProcessorInfo");
            let spawn = node.spawn.take().expect("non-composite node carries a spawn fn");
            let inputs: Vec<flume::Receiver<Envelope<V>>> = node
                .inputs
                .drain(..)
                .enumerate()
                .map(|(slot, rx)| rx.unwrap_or_else(|| panic!("stage '{name}' input slot {slot} was never linked")))
                .collect();
            let outputs: Vec<Option<flume::Sender<Envelope<V>>>> = node.outputs.drain(..).collect();

            let proc = Arc::new(Processor::new(info, inputs, outputs));
            let ctx = ExecCtx {
                config: Arc::clone(&config),
                ground_branches: gnd_branches.get(name).map(Arc::clone).unwrap_or_else(|| Arc::clone(&empty_branches)),
                _marker: PhantomData,
            };
            let task_proc = Arc::clone(&proc);
            tasks.push(tokio::spawn(spawn(task_proc, ctx)));
            processors.insert(name.clone(), proc);
        }

        let scheduler = crate::scheduler::spawn(processors, branches, Arc::clone(&config));

        Ok(RunningGraph {
            tasks,
            scheduler,
            _marker: PhantomData,
        })
    }
}

impl<V: Vectorize> Graph<V> {
    pub fn multiply(
        &self,
        name: impl Into<String>,
        inputs: &[Lane<V>],
        combiner: Option<crate::ops::multiply::Combiner<V>>,
    ) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let spawn: SpawnFn<V> = Box::new(move |proc, ctx| Box::pin(crate::ops::multiply::run(proc, combiner, ctx)));
        inner.register(name.clone(), OpKind::Multiply, 1, info, spawn, inputs)?;
        Ok(Stage::new(name))
    }

    pub fn left_multiply(
        &self,
        name: impl Into<String>,
        left: impl Into<Lane<V>>,
        right: impl Into<Lane<V>>,
        combiner: Option<crate::ops::left_multiply::Combiner<V>>,
    ) -> Result<Stage<V>> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.seq.next();
        let info = ProcessorInfo::structural(name.clone(), id);
        let spawn: SpawnFn<V> = Box::new(move |proc, ctx| Box::pin(crate::ops::left_multiply::run(proc, combiner, ctx)));
        inner.register(
            name.clone(),
            OpKind::LeftMultiply,
            2,
            info,
            spawn,
            &[left.into(), right.into()],
        )?;
        Ok(Stage::new(name))
    }
}
