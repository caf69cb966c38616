//! `Value`: the crate's ready-made payload type.
//!
//! A thin wrapper around [`serde_json::Value`], following the teacher's
//! choice of `serde_json::Value` as the message payload type
//! (`core/message.rs`'s `Message::payload`). Implements [`Payload`] and
//! [`Vectorize`] so it can be dropped straight into `Multiply`/`Scatter`
//! without a combiner.

use crate::payload::{Payload, Vectorize};
use serde_json::Value as Json;

#[derive(Debug, Clone, PartialEq)]
pub struct Value(pub Json);

impl Value {
    pub fn null() -> Self {
        Self(Json::Null)
    }

    pub fn as_json(&self) -> &Json {
        &self.0
    }

    pub fn into_json(self) -> Json {
        self.0
    }
}

impl From<Json> for Value {
    fn from(v: Json) -> Self {
        Self(v)
    }
}

impl From<Value> for Json {
    fn from(v: Value) -> Self {
        v.0
    }
}

impl Payload for Value {
    fn dispose(&mut self) {
        self.0 = Json::Null;
    }
}

impl Vectorize for Value {
    fn from_elements(items: Vec<Self>) -> Self {
        Value(Json::Array(items.into_iter().map(|v| v.0).collect()))
    }

    fn into_elements(self) -> Vec<Self> {
        match self.0 {
            Json::Array(items) => items.into_iter().map(Value).collect(),
            other => vec![Value(other)],
        }
    }
}
