//! Word count: a random-sentence source feeding a scatter/add word-count
//! crossbar. Grounded in `samples/word-count.go`'s `CreateGraph` - `List(5,
//! h1)` (five independent sentence sources) into `Group(5, 7, f, p)` (a
//! word-level scatter hashed to one of seven counting lanes) into `List(7,
//! h2)` (seven independent `Reduce`+`Ground` counters).
//!
//! `loopy`'s `Tuple` (a `map[string]interface{}`) becomes a `serde_json::Value`
//! object here; the FNV-1a word hash becomes a `DefaultHasher` over the word
//! bytes - only the partitioning needs to be stable, not FNV specifically.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::Rng;
use serde_json::json;

use streamloom::graph::Graph;
use streamloom::processor::ReducerFn;
use streamloom::scheduler::SchedulerConfig;
use streamloom::value::Value;
use streamloom::Params;

const SENTENCES: &[&str] = &[
    "thanks nancy",
    "hello everyone and thank you for joining us",
    "we have a lot of news to share with you today about the details of our march quarter",
    "first i would like to talk about our business and the road ahead",
    "we are now half way through our fiscal year and we have accomplished a tremendous amount",
    "we introduced and ramped production of an unprecedented number of new products",
    "our revenue for the first half was over ninety eight billion dollars",
    "these are very very large numbers unimaginable even to us just a few years ago",
    "we will continue to focus on the long term and we remain very optimistic about our future",
    "the decline in the stock price over the last couple of quarters has been very frustrating",
];

fn random_sentence_source() -> impl FnMut() -> Option<Value> + Send {
    move || {
        let mut rng = rand::rng();
        let sentence = SENTENCES[rng.random_range(0..SENTENCES.len())];
        Some(Value(json!({ "sentence": sentence })))
    }
}

fn word_hash(word: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    word.hash(&mut hasher);
    hasher.finish()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    streamloom::logging::init();

    let g: Graph<Value> = Graph::new();

    let sources = g.list("sources", 5, |g, i| {
        let s = g.source(format!("source.{i}"), random_sentence_source())?;
        Ok((s.clone(), s))
    })?;

    let expand: streamloom::ops::scatter::Expander<Value> = Arc::new(|value: &Value| {
        let sentence = value
            .as_json()
            .get("sentence")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        sentence
            .split_whitespace()
            .map(|w| Value(json!({ "word": w })))
            .collect()
    });

    let route: streamloom::ops::scatter::Router<Value> = Arc::new(|value: &Value, _i: usize, n: usize| {
        let word = value.as_json().get("word").and_then(|v| v.as_str()).unwrap_or_default();
        if n <= 1 {
            0
        } else {
            (word_hash(word) % n as u64) as i64
        }
    });

    let source_lanes: Vec<_> = (0..5).map(|i| sources.lane(i)).collect();
    let partition = g.group("partition", 5, 7, &source_lanes, expand, route)?;

    g.list("counters", 7, |g, i| {
        let f: ReducerFn<Value> = Arc::new(|state: &mut Value, input: Value, _params: &Params| {
            let word = input
                .as_json()
                .get("word")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let mut counts = state.as_json().as_object().cloned().unwrap_or_default();
            let next = counts.get(&word).and_then(|v| v.as_i64()).unwrap_or(0) + 1;
            counts.insert(word.clone(), json!(next));
            *state = Value(serde_json::Value::Object(counts));
            tracing::info!(word = %word, count = next, "word counted");
            Value(json!({ "word": word, "count": next }))
        });
        let reduced = g.reduce(format!("counter.{i}"), partition.lane(i), Value(json!({})), Params::new(), f)?;
        let grounded = g.ground(format!("ground.{i}"), &reduced)?;
        Ok((reduced, grounded))
    })?;

    g.execute(SchedulerConfig::default())?.join().await;
    Ok(())
}
