//! End-to-end pipeline scenarios, spec §8.
//!
//! Each test builds a small graph through the public [`streamloom::Graph`]
//! API, runs it to completion, and checks what landed at the ground(s).
//! Grounds dispose their payloads, so observation happens through a
//! `dispose()` override that records the value into a shared sink - the
//! same trick the teacher's own integration tests use to assert on terminal
//! state without a bespoke "observing ground" variant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use streamloom::{Graph, Params, Payload, Vectorize};

/// A payload that records itself into a shared sink when disposed.
#[derive(Clone)]
struct Rec<T: Clone + Send + Sync + 'static> {
    val: T,
    sink: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Rec<T> {
    fn new(val: T, sink: &Arc<Mutex<Vec<T>>>) -> Self {
        Self {
            val,
            sink: Arc::clone(sink),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Payload for Rec<T> {
    fn dispose(&mut self) {
        self.sink.lock().unwrap().push(self.val.clone());
    }
}

fn no_params() -> Params {
    HashMap::new()
}

fn sequence_source<T: Clone + Send + Sync + 'static>(
    values: Vec<T>,
    sink: &Arc<Mutex<Vec<T>>>,
) -> impl FnMut() -> Option<Rec<T>> {
    let sink = Arc::clone(sink);
    let mut it = values.into_iter();
    move || it.next().map(|v| Rec::new(v, &sink))
}

/// Scenario 1: Source→Map(double)→Ground with inputs `{1,2,3}` → ground
/// observes `{2,4,6}` in order.
#[tokio::test]
async fn map_doubles_every_value_in_order() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));

    let src = graph
        .source("src", sequence_source(vec![1, 2, 3], &sink))
        .unwrap();
    let doubled = graph
        .map(
            "double",
            &src,
            no_params(),
            Arc::new(|v: Rec<i64>, _: &Params| Rec {
                val: v.val * 2,
                sink: v.sink,
            }),
        )
        .unwrap();
    graph.ground("gnd", &doubled).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    assert_eq!(*sink.lock().unwrap(), vec![2, 4, 6]);
}

/// Scenario 2: Source→Copy(3)→three Grounds with inputs `{"a","b"}` → each
/// ground observes `{"a","b"}`. Also checks Copy(n)'s clone contract: outputs
/// 1..n-1 receive values that compare equal to output 0 but are backed by a
/// distinct allocation.
#[tokio::test]
async fn copy_fans_out_to_every_ground() {
    let graph: Graph<Rec<String>> = Graph::new();
    let src_sink = Arc::new(Mutex::new(Vec::new()));
    let sink0 = Arc::new(Mutex::new(Vec::new()));
    let sink1 = Arc::new(Mutex::new(Vec::new()));
    let sink2 = Arc::new(Mutex::new(Vec::new()));

    let src = graph
        .source(
            "src",
            sequence_source(vec!["a".to_string(), "b".to_string()], &src_sink),
        )
        .unwrap();
    let copy = graph.copy("copy", &src, 3).unwrap();

    // Each lane gets its own relabeling map so its ground disposes into a
    // lane-specific sink - otherwise every ground would dispose into the
    // same `src_sink` the payload was built with.
    for (lane, sink) in [(0, &sink0), (1, &sink1), (2, &sink2)] {
        let s = Arc::clone(sink);
        let relabeled = graph
            .map(
                format!("relabel{lane}"),
                copy.lane(lane),
                no_params(),
                Arc::new(move |v: Rec<String>, _: &Params| Rec::new(v.val, &s)),
            )
            .unwrap();
        graph.ground(format!("gnd{lane}"), &relabeled).unwrap();
    }

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    let expected = vec!["a".to_string(), "b".to_string()];
    assert_eq!(*sink0.lock().unwrap(), expected);
    assert_eq!(*sink1.lock().unwrap(), expected);
    assert_eq!(*sink2.lock().unwrap(), expected);
}

/// Copy(n)'s deep-clone contract in isolation: output 1 receives a value
/// that compares equal to output 0's but is a distinct allocation (distinct
/// `String` buffer pointer), matching spec §8's Copy testable property.
#[tokio::test]
async fn copy_clones_have_distinct_identity() {
    #[derive(Clone)]
    struct Tagged(String);
    impl Payload for Tagged {}

    let graph: Graph<Tagged> = Graph::new();
    let mut once = Some(Tagged("same-ish".to_string()));
    let src = graph.source("src", move || once.take()).unwrap();
    let copy = graph.copy("copy", &src, 2).unwrap();

    let out0 = Arc::new(Mutex::new(None));
    let out1 = Arc::new(Mutex::new(None));
    let (o0, o1) = (Arc::clone(&out0), Arc::clone(&out1));
    let probe0 = graph
        .map(
            "probe0",
            copy.lane(0),
            no_params(),
            Arc::new(move |v: Tagged, _: &Params| {
                *o0.lock().unwrap() = Some(v.0.as_ptr() as usize);
                v
            }),
        )
        .unwrap();
    let probe1 = graph
        .map(
            "probe1",
            copy.lane(1),
            no_params(),
            Arc::new(move |v: Tagged, _: &Params| {
                *o1.lock().unwrap() = Some(v.0.as_ptr() as usize);
                v
            }),
        )
        .unwrap();
    graph.ground("g0", &probe0).unwrap();
    graph.ground("g1", &probe1).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    let p0 = out0.lock().unwrap().take().expect("output 0 ran");
    let p1 = out1.lock().unwrap().take().expect("output 1 ran");
    assert_ne!(p0, p1, "Copy's non-primary outputs must own a distinct allocation");
}

/// Scenario 3: Source→Split(2)→Ground0,Ground1 with inputs `{1,2,3,4}` →
/// Ground0 sees `{1,3}`, Ground1 sees `{2,4}` - the i-th emitted message
/// reaches output `i mod n`. Each lane is relabeled into its own sink so the
/// per-slot assignment is checked directly rather than just the merged
/// multiset.
#[tokio::test]
async fn split_sends_ith_message_to_i_mod_n() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let src_sink = Arc::new(Mutex::new(Vec::new()));
    let slot0_sink = Arc::new(Mutex::new(Vec::new()));
    let slot1_sink = Arc::new(Mutex::new(Vec::new()));

    let src = graph
        .source("src", sequence_source(vec![1, 2, 3, 4], &src_sink))
        .unwrap();
    let split = graph.split("split", &src, 2).unwrap();

    let s0 = Arc::clone(&slot0_sink);
    let relabel0 = graph
        .map(
            "relabel0",
            split.lane(0),
            no_params(),
            Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &s0)),
        )
        .unwrap();
    let s1 = Arc::clone(&slot1_sink);
    let relabel1 = graph
        .map(
            "relabel1",
            split.lane(1),
            no_params(),
            Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &s1)),
        )
        .unwrap();
    graph.ground("g0", &relabel0).unwrap();
    graph.ground("g1", &relabel1).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    assert_eq!(*slot0_sink.lock().unwrap(), vec![1, 3]);
    assert_eq!(*slot1_sink.lock().unwrap(), vec![2, 4]);
}

/// Scenario 4: Source×2→Add→Ground with inputs `{a1,a2}` and `{b1,b2}` →
/// ground sees the multiset `{a1,a2,b1,b2}`. Add gives no cross-input
/// ordering guarantee, so only the multiset is checked.
#[tokio::test]
async fn add_merges_every_input_into_one_output() {
    let graph: Graph<Rec<&'static str>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));

    let src_a = graph
        .source("src_a", sequence_source(vec!["a1", "a2"], &sink))
        .unwrap();
    let src_b = graph
        .source("src_b", sequence_source(vec!["b1", "b2"], &sink))
        .unwrap();
    let merged = graph
        .add("merge", &[src_a.lane(0), src_b.lane(0)])
        .unwrap();
    graph.ground("gnd", &merged).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    let mut seen = sink.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["a1", "a2", "b1", "b2"]);
}

/// Filter routes each message to output 0 when the predicate holds, output 1
/// otherwise (spec §4.1's Filter contract).
#[tokio::test]
async fn filter_routes_by_predicate() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let evens = Arc::new(Mutex::new(Vec::new()));
    let odds = Arc::new(Mutex::new(Vec::new()));

    let src = graph
        .source("src", sequence_source(vec![1, 2, 3, 4, 5, 6], &sink))
        .unwrap();
    let filt = graph
        .filter(
            "is_even",
            &src,
            no_params(),
            Arc::new(|v: &Rec<i64>, _: &Params| v.val % 2 == 0),
        )
        .unwrap();

    let e = Arc::clone(&evens);
    let relabel_even = graph
        .map(
            "relabel_even",
            filt.lane(0),
            no_params(),
            Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &e)),
        )
        .unwrap();
    let o = Arc::clone(&odds);
    let relabel_odd = graph
        .map(
            "relabel_odd",
            filt.lane(1),
            no_params(),
            Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &o)),
        )
        .unwrap();
    graph.ground("g_even", &relabel_even).unwrap();
    graph.ground("g_odd", &relabel_odd).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    assert_eq!(*evens.lock().unwrap(), vec![2, 4, 6]);
    assert_eq!(*odds.lock().unwrap(), vec![1, 3, 5]);
}

/// Reduce folds running state across the stream: a running-sum reducer over
/// `{1,2,3,4}` emits the partial sums `{1,3,6,10}`.
#[tokio::test]
async fn reduce_folds_running_state() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));

    let src = graph
        .source("src", sequence_source(vec![1, 2, 3, 4], &sink))
        .unwrap();
    let running_sum = graph
        .reduce(
            "sum",
            &src,
            Rec::new(0, &sink),
            no_params(),
            Arc::new(|state: &mut Rec<i64>, x: Rec<i64>, _: &Params| {
                state.val += x.val;
                Rec::new(state.val, &state.sink)
            }),
        )
        .unwrap();
    graph.ground("gnd", &running_sum).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    assert_eq!(*sink.lock().unwrap(), vec![1, 3, 6, 10]);
}

/// A payload that represents both "one value" and "a vector of values" as a
/// `Vec<i64>` - the combiner-less forms of `Multiply`/`LeftMultiply` need
/// exactly this capability (spec §4.1).
#[derive(Clone)]
struct VecRec {
    vals: Vec<i64>,
    sink: Arc<Mutex<Vec<Vec<i64>>>>,
}

impl VecRec {
    fn one(v: i64, sink: &Arc<Mutex<Vec<Vec<i64>>>>) -> Self {
        Self {
            vals: vec![v],
            sink: Arc::clone(sink),
        }
    }
}

impl Payload for VecRec {
    fn dispose(&mut self) {
        self.sink.lock().unwrap().push(self.vals.clone());
    }
}

impl Vectorize for VecRec {
    fn from_elements(items: Vec<Self>) -> Self {
        let sink = items
            .first()
            .map(|i| Arc::clone(&i.sink))
            .unwrap_or_else(|| Arc::new(Mutex::new(Vec::new())));
        let vals = items.into_iter().flat_map(|i| i.vals).collect();
        Self { vals, sink }
    }

    fn into_elements(self) -> Vec<Self> {
        self.vals
            .into_iter()
            .map(|v| Self {
                vals: vec![v],
                sink: Arc::clone(&self.sink),
            })
            .collect()
    }
}

fn vec_source(values: Vec<i64>, sink: &Arc<Mutex<Vec<Vec<i64>>>>) -> impl FnMut() -> Option<VecRec> {
    let sink = Arc::clone(sink);
    let mut it = values.into_iter();
    move || it.next().map(|v| VecRec::one(v, &sink))
}

/// Multiply with no combiner packs one value from every input into a single
/// payload via `Vectorize::from_elements`, one cycle per round: inputs
/// `{1,2}` and `{10,20}` produce `{[1,10],[2,20]}` (spec §4.1's Multiply
/// contract, no-combiner form).
#[tokio::test]
async fn multiply_packs_one_value_per_input_per_cycle() {
    let graph: Graph<VecRec> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));

    let src_a = graph.source("a", vec_source(vec![1, 2], &sink)).unwrap();
    let src_b = graph.source("b", vec_source(vec![10, 20], &sink)).unwrap();
    let mul = graph.multiply("mul", &[src_a.lane(0), src_b.lane(0)], None).unwrap();
    graph.ground("gnd", &mul).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    assert_eq!(*sink.lock().unwrap(), vec![vec![1, 10], vec![2, 20]]);
}

/// Multiply with an explicit combiner uses it instead of `Vectorize`, and a
/// cycle where every input is exhausted simply ends the stage (spec §4.1's
/// "empty cycle terminates" edge case) rather than emitting a partial result.
#[tokio::test]
async fn multiply_with_a_combiner_sums_the_cycle() {
    let graph: Graph<VecRec> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));

    let src_a = graph.source("a", vec_source(vec![1, 2], &sink)).unwrap();
    let src_b = graph.source("b", vec_source(vec![10, 20], &sink)).unwrap();
    let combiner: streamloom::ops::multiply::Combiner<VecRec> = Arc::new(|parts: Vec<VecRec>| {
        let sum: i64 = parts.iter().flat_map(|p| p.vals.iter()).sum();
        VecRec {
            vals: vec![sum],
            sink: Arc::clone(&parts[0].sink),
        }
    });
    let mul = graph
        .multiply("mul", &[src_a.lane(0), src_b.lane(0)], Some(combiner))
        .unwrap();
    graph.ground("gnd", &mul).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    assert_eq!(*sink.lock().unwrap(), vec![vec![11], vec![22]]);
}

/// LeftMultiply combines every driving (input 0) message with whatever has
/// most recently latched on input 1, and forwards input 1 unchanged on
/// output 1 (spec §4.1's LeftMultiply contract). The driving source sleeps
/// briefly before emitting its one message so the single latch value is
/// guaranteed to have landed first - LeftMultiply only ever sees "latched so
/// far", never "eventually arriving".
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn left_multiply_combines_the_driver_with_the_latched_value() {
    let graph: Graph<VecRec> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let out1_sink = Arc::new(Mutex::new(Vec::new()));

    let right = graph
        .source("right", vec_source(vec![100], &sink))
        .unwrap();
    let left = graph
        .source("left", {
            let mut once = Some(VecRec::one(7, &sink));
            move || {
                std::thread::sleep(std::time::Duration::from_millis(50));
                once.take()
            }
        })
        .unwrap();

    let combiner: streamloom::ops::left_multiply::Combiner<VecRec> = Arc::new(|l: VecRec, r: VecRec| {
        let mut vals = l.vals;
        vals.extend(r.vals);
        VecRec { vals, sink: l.sink }
    });
    let lm = graph.left_multiply("lm", &left, &right, Some(combiner)).unwrap();
    graph.ground("g0", lm.lane(0)).unwrap();

    let o1 = Arc::clone(&out1_sink);
    let relabel1 = graph
        .map(
            "relabel1",
            lm.lane(1),
            no_params(),
            Arc::new(move |v: VecRec, _: &Params| VecRec {
                vals: v.vals,
                sink: Arc::clone(&o1),
            }),
        )
        .unwrap();
    graph.ground("g1", &relabel1).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    assert_eq!(*sink.lock().unwrap(), vec![vec![7, 100]]);
    assert_eq!(*out1_sink.lock().unwrap(), vec![vec![100]]);
}

/// Cut's output 1 passes every input through unchanged; output 0 takes the
/// most recently latched value *once* and clears it, so every value it
/// emits is unique and drawn from the input set (spec §4.1's Cut contract -
/// exactly how many of the `n` inputs output 0 manages to claim before the
/// stream ends is inherently timing-dependent, so only those two invariants
/// are checked, not an exact count).
#[tokio::test]
async fn cut_takes_each_latched_value_at_most_once() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let cut_sink = Arc::new(Mutex::new(Vec::new()));

    let src = graph
        .source("src", sequence_source((1..=20).collect(), &sink))
        .unwrap();
    let cut = graph.cut("cut", &src).unwrap();

    let c = Arc::clone(&cut_sink);
    let relabel0 = graph
        .map(
            "relabel0",
            cut.lane(0),
            no_params(),
            Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &c)),
        )
        .unwrap();
    graph.ground("g0", &relabel0).unwrap();
    graph.ground("g1", cut.lane(1)).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    assert_eq!(*sink.lock().unwrap(), (1..=20).collect::<Vec<_>>());

    let taken = cut_sink.lock().unwrap().clone();
    let mut dedup = taken.clone();
    dedup.sort();
    dedup.dedup();
    assert_eq!(dedup.len(), taken.len(), "cut must never emit the same latched value twice");
    for v in &taken {
        assert!((1..=20).contains(v), "cut must only emit values drawn from the input stream");
    }
}

/// Latch's output 1 passes every input through unchanged; output 0 (a
/// second task that keeps re-emitting the most recently seen value) must
/// only ever emit values drawn from the input stream (spec §4.1's Latch
/// contract). A long input stream gives the latching task ample scheduling
/// opportunity, so asserting it emitted *something* isn't flaky in
/// practice, even though the exact count it manages is timing-dependent.
#[tokio::test]
async fn latch_keeps_re_emitting_the_most_recent_value() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let latch_sink = Arc::new(Mutex::new(Vec::new()));

    let src = graph
        .source("src", sequence_source((1..=50).collect(), &sink))
        .unwrap();
    let latch = graph.latch("latch", &src).unwrap();

    let l = Arc::clone(&latch_sink);
    let relabel0 = graph
        .map(
            "relabel0",
            latch.lane(0),
            no_params(),
            Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &l)),
        )
        .unwrap();
    graph.ground("g0", &relabel0).unwrap();
    graph.ground("g1", latch.lane(1)).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    assert_eq!(*sink.lock().unwrap(), (1..=50).collect::<Vec<_>>());

    let seen = latch_sink.lock().unwrap().clone();
    assert!(!seen.is_empty(), "the latching task should have emitted at least once over 50 inputs");
    for v in &seen {
        assert!((1..=50).contains(v), "latch must only emit values drawn from the input stream");
    }
}

/// Scatter expands each input into zero or more elements and routes each to
/// an output slot chosen by the router, dropping elements the router marks
/// negative (spec §4.1's Scatter contract): each input number expands into
/// its digits, routed even/odd by parity, with `0` dropped entirely.
#[tokio::test]
async fn scatter_expands_and_routes_each_element() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let even_sink = Arc::new(Mutex::new(Vec::new()));
    let odd_sink = Arc::new(Mutex::new(Vec::new()));

    let src = graph.source("src", sequence_source(vec![12, 34], &sink)).unwrap();
    let expand: streamloom::ops::scatter::Expander<Rec<i64>> = Arc::new(|v: &Rec<i64>| {
        let digits: Vec<i64> = v
            .val
            .to_string()
            .chars()
            .map(|c| c.to_digit(10).unwrap() as i64)
            .collect();
        digits.into_iter().map(|d| Rec::new(d, &v.sink)).collect()
    });
    let route: streamloom::ops::scatter::Router<Rec<i64>> =
        Arc::new(|v: &Rec<i64>, _i: usize, _n: usize| {
            if v.val == 0 {
                -1
            } else if v.val % 2 == 0 {
                0
            } else {
                1
            }
        });
    let scat = graph.scatter("scatter", &src, 2, expand, route).unwrap();

    let e = Arc::clone(&even_sink);
    let relabel_even = graph
        .map(
            "relabel_even",
            scat.lane(0),
            no_params(),
            Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &e)),
        )
        .unwrap();
    let o = Arc::clone(&odd_sink);
    let relabel_odd = graph
        .map(
            "relabel_odd",
            scat.lane(1),
            no_params(),
            Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &o)),
        )
        .unwrap();
    graph.ground("g_even", &relabel_even).unwrap();
    graph.ground("g_odd", &relabel_odd).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    // 12 -> [1,2], 34 -> [3,4]; 0 never appears so nothing is dropped here.
    assert_eq!(*even_sink.lock().unwrap(), vec![2, 4]);
    assert_eq!(*odd_sink.lock().unwrap(), vec![1, 3]);
}

/// Merge buffers one message per input and only emits once every slot is
/// filled, clearing all of them afterward (spec §4.1's Merge contract): two
/// inputs `{1,2}` and `{10,20}` merge into the sums `{11,22}` regardless of
/// which input's message happens to arrive first each round.
#[tokio::test]
async fn merge_emits_once_every_input_slot_is_filled() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));

    let src_a = graph.source("a", sequence_source(vec![1, 2], &sink)).unwrap();
    let src_b = graph.source("b", sequence_source(vec![10, 20], &sink)).unwrap();
    let select: streamloom::ops::merge::Selector<Rec<i64>> =
        Arc::new(|buf: &[Option<Rec<i64>>]| match (&buf[0], &buf[1]) {
            (Some(a), Some(b)) => (-1, Some(Rec::new(a.val + b.val, &a.sink))),
            _ => (-1, None),
        });
    let merged = graph.merge("merge", &[src_a.lane(0), src_b.lane(0)], select).unwrap();
    graph.ground("gnd", &merged).unwrap();

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    assert_eq!(*sink.lock().unwrap(), vec![11, 22]);
}

/// `List(n, factory)` wraps `n` independently-built inner pipelines behind
/// one composite name: each lane doubles its own source's values, and
/// downstream sees every lane's output (spec §4.2's List contract).
#[tokio::test]
async fn list_wraps_n_independent_inner_pipelines() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let sinks: Vec<_> = (0..3).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();

    let lanes = graph
        .list("lanes", 3, |g, i| {
            let src = g.source(format!("src{i}"), sequence_source(vec![(i as i64) + 1], &sink))?;
            let doubled = g.map(
                format!("double{i}"),
                &src,
                no_params(),
                Arc::new(|v: Rec<i64>, _: &Params| Rec {
                    val: v.val * 2,
                    sink: v.sink,
                }),
            )?;
            Ok((src, doubled))
        })
        .unwrap();

    for (i, lane_sink) in sinks.iter().enumerate() {
        let s = Arc::clone(lane_sink);
        let relabel = graph
            .map(
                format!("relabel{i}"),
                lanes.lane(i),
                no_params(),
                Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &s)),
            )
            .unwrap();
        graph.ground(format!("g{i}"), &relabel).unwrap();
    }

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    for (i, lane_sink) in sinks.iter().enumerate() {
        assert_eq!(*lane_sink.lock().unwrap(), vec![((i as i64) + 1) * 2]);
    }
}

/// Forces an actual pause -> CCP-partition -> fuse -> resume cycle on a live
/// branch and confirms it keeps delivering messages afterward (spec §4.4).
/// `src` feeds a `Copy(2)` so the near-zero-cost source sits in its own
/// trivially-singleton branch (`num_cpu` == that branch's length forces an
/// all-singleton CCP partition, per `ccp_solve_k_equals_n_is_trivial`) while
/// the `m1 -> m2 -> gnd` chain forms a separate 3-node branch that `num_cpu:
/// 2` genuinely splits into one singleton and one 2-node group - exercising
/// `merge_forward`'s carrier/channel takeover for real. `tp`/`tl` of zero
/// make every branch a fusion candidate on the very first scheduler tick,
/// and a short `schedule_interval_ms` against a source that paces itself
/// with a small sleep per value guarantees that tick lands while the stream
/// is still flowing, so most of the run happens through the fused carrier.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fusion_cycle_keeps_a_branch_delivering_after_pause_and_resume() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let drop_sink = Arc::new(Mutex::new(Vec::new()));

    let values: Vec<i64> = (1..=24).collect();
    let src = graph
        .source("src", {
            let sink = Arc::clone(&sink);
            let mut it = values.clone().into_iter();
            move || {
                std::thread::sleep(std::time::Duration::from_millis(4));
                it.next().map(|v| Rec::new(v, &sink))
            }
        })
        .unwrap();
    let cp = graph.copy("cp", &src, 2).unwrap();

    let m1 = graph
        .map(
            "m1",
            cp.lane(0),
            no_params(),
            Arc::new(|v: Rec<i64>, _: &Params| Rec {
                val: v.val * 2,
                sink: v.sink,
            }),
        )
        .unwrap();
    let m2 = graph
        .map(
            "m2",
            &m1,
            no_params(),
            Arc::new(|v: Rec<i64>, _: &Params| Rec {
                val: v.val + 1000,
                sink: v.sink,
            }),
        )
        .unwrap();
    graph.ground("gnd", &m2).unwrap();

    let d = Arc::clone(&drop_sink);
    let relabel_drop = graph
        .map(
            "relabel_drop",
            cp.lane(1),
            no_params(),
            Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &d)),
        )
        .unwrap();
    graph.ground("gnd2", &relabel_drop).unwrap();

    let config = streamloom::scheduler::SchedulerConfig {
        tp: 0,
        tl: 0,
        decay_interval_ms: 0.0,
        alpha: 0.2,
        schedule_interval_ms: 3.0,
        num_cpu: 2,
    };
    let running = graph.execute(config).unwrap();
    running.join().await;

    let expected: Vec<i64> = values.iter().map(|v| v * 2 + 1000).collect();
    assert_eq!(*sink.lock().unwrap(), expected, "fusion must not drop or reorder the branch's stream");
    assert_eq!(drop_sink.lock().unwrap().len(), values.len(), "the unfused sibling lane must be unaffected");
}

/// `Group(n_in, n_out, f, p)` is a true crossbar: every input lane can reach
/// every output lane (spec §9's Open Question, resolved as crossbar in
/// DESIGN.md). Routing every element to output slot `element % n_out`
/// deterministically sends each input's values to exactly one output lane,
/// which is enough to confirm the wiring actually reaches across the whole
/// crossbar rather than only input `i` to output `i`.
#[tokio::test]
async fn group_crossbars_every_input_to_every_output() {
    let graph: Graph<Rec<i64>> = Graph::new();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let out_sinks: Vec<_> = (0..2).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();

    let src0 = graph.source("src0", sequence_source(vec![1, 4], &sink)).unwrap();
    let src1 = graph.source("src1", sequence_source(vec![2, 5], &sink)).unwrap();

    let expand: streamloom::ops::scatter::Expander<Rec<i64>> = Arc::new(|v: &Rec<i64>| vec![v.clone()]);
    let route: streamloom::ops::scatter::Router<Rec<i64>> =
        Arc::new(|v: &Rec<i64>, _i: usize, n: usize| (v.val % n as i64).max(0));

    let group = graph
        .group("grp", 2, 2, &[src0.lane(0), src1.lane(0)], expand, route)
        .unwrap();

    for (i, out_sink) in out_sinks.iter().enumerate() {
        let s = Arc::clone(out_sink);
        let relabel = graph
            .map(
                format!("relabel{i}"),
                group.lane(i),
                no_params(),
                Arc::new(move |v: Rec<i64>, _: &Params| Rec::new(v.val, &s)),
            )
            .unwrap();
        graph.ground(format!("g{i}"), &relabel).unwrap();
    }

    let running = graph.execute(Default::default()).unwrap();
    running.join().await;

    let mut out0 = out_sinks[0].lock().unwrap().clone();
    let mut out1 = out_sinks[1].lock().unwrap().clone();
    out0.sort();
    out1.sort();
    // 1,5 -> %2==1 -> output 1; 2,4 -> %2==0 -> output 0; note both sources
    // contribute to both outputs (src0 gave 1 and 4, src1 gave 2 and 5),
    // which is exactly the crossbar property under test.
    assert_eq!(out0, vec![2, 4]);
    assert_eq!(out1, vec![1, 5]);
}

