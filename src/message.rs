//! Message envelope: payload plus per-stage timing/reconfiguration maps
//! (spec §3), and the in-band control-message variant used by the scheduler.

use std::collections::HashMap;
use std::time::Instant;

use crate::payload::{Params, Payload};

/// A stage's enter/leave timestamps for one message. Append-only: a stage
/// sets its own entry at most once per message (debug-asserted in
/// [`Header::stamp_enter`]/[`Header::stamp_leave`]) and never touches another
/// stage's entry.
#[derive(Debug, Clone, Copy)]
pub struct TimeInfo {
    pub enter: Option<Instant>,
    pub leave: Option<Instant>,
}

impl Default for TimeInfo {
    fn default() -> Self {
        Self {
            enter: None,
            leave: None,
        }
    }
}

/// A pending function/parameter switch targeted at one named stage, read
/// off a message's header by that stage before it processes the message
/// (spec §4.1, "Function-reconfiguration").
#[derive(Debug, Clone)]
pub struct FuncSwitch {
    pub func_idx: usize,
    pub params: Params,
}

/// Free-form user metadata carried alongside a message.
#[derive(Debug, Clone)]
pub enum AttribValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// The header threaded through a pipeline alongside a message's payload.
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub tm_info: HashMap<String, TimeInfo>,
    pub func_info: HashMap<String, FuncSwitch>,
    pub attribs: HashMap<String, AttribValue>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps `PROC_ENTER_TIME` for `stage`. No-op (besides the debug
    /// assertion) if already set - append-only per spec §3's invariant.
    pub fn stamp_enter(&mut self, stage: &str, at: Instant) {
        let entry = self.tm_info.entry(stage.to_string()).or_default();
        debug_assert!(
            entry.enter.is_none(),
            "stage '{stage}' stamped PROC_ENTER_TIME twice on the same message"
        );
        if entry.enter.is_none() {
            entry.enter = Some(at);
        }
    }

    /// Stamps `PROC_LEAVE_TIME` for `stage`.
    pub fn stamp_leave(&mut self, stage: &str, at: Instant) {
        let entry = self.tm_info.entry(stage.to_string()).or_default();
        debug_assert!(
            entry.leave.is_none(),
            "stage '{stage}' stamped PROC_LEAVE_TIME twice on the same message"
        );
        if entry.leave.is_none() {
            entry.leave = Some(at);
        }
    }

    pub fn time_info(&self, stage: &str) -> Option<&TimeInfo> {
        self.tm_info.get(stage)
    }

    /// Reads and consumes a pending reconfiguration request targeted at
    /// `stage`, returning `(func_idx, params)` if present.
    pub fn take_func_switch(&self, stage: &str) -> Option<(usize, Params)> {
        self.func_info
            .get(stage)
            .map(|f| (f.func_idx, f.params.clone()))
    }
}

/// Payload plus header, the unit that flows along a pipeline's data channels.
#[derive(Debug, Clone)]
pub struct Message<V: Payload> {
    pub header: Header,
    pub value: V,
}

impl<V: Payload> Message<V> {
    pub fn new(value: V) -> Self {
        Self {
            header: Header::new(),
            value,
        }
    }

    /// Deep-clones this message: the header's `tm_info` is copied (each
    /// stage's stamps so far are preserved independently per branch) while
    /// `func_info`/`attribs` are shared verbatim (they're read-only lookup
    /// tables, not stamped incrementally), and the payload is cloned via
    /// [`Payload`]'s `Clone` bound - matching `loopy/messages.go`'s
    /// `M.Clone()`.
    pub fn deep_clone(&self) -> Self {
        Self {
            header: self.header.clone(),
            value: self.value.clone(),
        }
    }
}

/// Wait-request state machine for a processor (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrStatus {
    ReqWait,
    Wait,
    Resume,
}

/// Run/exit state for a processor (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErStatus {
    Run,
    Exit,
}

/// In-band pause/resume/exit control message (spec §3's `cM`). Propagates
/// through the pipeline as a sentinel on the data channel: a stage forwards
/// every control message whose `end` does not name it, then adopts the
/// requested wait/exit state.
#[derive(Debug, Clone)]
pub struct ControlMessage {
    pub start: String,
    pub end: String,
    pub wr_status: WrStatus,
    pub er_status: ErStatus,
}

/// The element actually carried on inter-stage channels: either a data
/// message or an in-band control sentinel.
#[derive(Debug, Clone)]
pub enum Envelope<V: Payload> {
    Data(Message<V>),
    Control(ControlMessage),
}

impl<V: Payload> Envelope<V> {
    pub fn data(value: V) -> Self {
        Envelope::Data(Message::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Spec §8's causal-order invariant: for every stage `s` that stamped
    /// both timestamps, `leave >= enter`. A chain of stages stamping in
    /// pipeline order should also see each downstream `enter` no earlier
    /// than the upstream `leave` it followed.
    #[test]
    fn stamps_respect_causal_order_along_a_chain() {
        let mut header = Header::new();
        let t0 = Instant::now();

        header.stamp_enter("a", t0);
        header.stamp_leave("a", t0 + Duration::from_millis(1));
        header.stamp_enter("b", t0 + Duration::from_millis(2));
        header.stamp_leave("b", t0 + Duration::from_millis(3));

        for stage in ["a", "b"] {
            let t = header.time_info(stage).expect("stamped");
            let (enter, leave) = (t.enter.expect("enter"), t.leave.expect("leave"));
            assert!(leave >= enter, "stage '{stage}': leave must not precede enter");
        }

        let a = header.time_info("a").unwrap();
        let b = header.time_info("b").unwrap();
        assert!(
            b.enter.unwrap() >= a.leave.unwrap(),
            "downstream stage must not enter before its upstream predecessor left"
        );
    }

    /// A stage that only ever stamps `enter` (e.g. a message still in
    /// flight when observed) must not report a spurious `leave`.
    #[test]
    fn an_unfinished_stage_has_no_leave_stamp() {
        let mut header = Header::new();
        header.stamp_enter("a", Instant::now());
        let t = header.time_info("a").unwrap();
        assert!(t.enter.is_some());
        assert!(t.leave.is_none());
    }

    /// `stamp_enter`/`stamp_leave` are append-only: a second call for the
    /// same stage is a no-op rather than overwriting the first stamp.
    #[test]
    fn re_stamping_the_same_stage_does_not_overwrite_the_first_stamp() {
        let mut header = Header::new();
        let first = Instant::now();
        header.stamp_enter("a", first);
        header.stamp_enter("a", first + Duration::from_millis(50));
        assert_eq!(header.time_info("a").unwrap().enter, Some(first));
    }

    /// `deep_clone` copies `tm_info` independently: stamping further on the
    /// clone must not retroactively affect the original's recorded times.
    #[test]
    fn deep_clone_gives_each_branch_an_independent_tm_info() {
        struct NoopPayload;
        impl Payload for NoopPayload {}
        impl Clone for NoopPayload {
            fn clone(&self) -> Self {
                NoopPayload
            }
        }

        let mut msg = Message::new(NoopPayload);
        let t0 = Instant::now();
        msg.header.stamp_enter("a", t0);

        let mut clone = msg.deep_clone();
        clone.header.stamp_leave("a", t0 + Duration::from_millis(1));

        assert!(msg.header.time_info("a").unwrap().leave.is_none());
        assert!(clone.header.time_info("a").unwrap().leave.is_some());
    }
}
