//! The runnable stage: identity/function table, fusion stacks, pause state,
//! and the flume channels that connect it to its neighbours.
//!
//! Grounded in `loopy/processor.go`'s `Processor` struct. Each operator
//! constructor in [`crate::ops`] builds one or more `Processor<V>`s and
//! spawns a tokio task running that operator's read/apply/emit loop; this
//! module supplies the pieces every such loop shares (control-message
//! interception, fusion-stack application, and output-channel teardown)
//! rather than the loop itself.

use std::sync::Mutex;

use crate::message::{ControlMessage, ErStatus, Envelope, Header, Message};
use crate::payload::Payload;
use crate::processor::info::ProcessorInfo;
use crate::processor::stack::ProcessorStack;
use crate::processor::state::ProcessorState;

pub struct Processor<V: Payload> {
    pub info: Mutex<ProcessorInfo<V>>,
    /// Cached at construction so hot paths (control-message addressing,
    /// per-message stamping) don't need to lock `info` just to read a name
    /// that never changes after registration.
    name: String,
    pub state: ProcessorState,
    pub in_stack: Mutex<ProcessorStack<V>>,
    pub out_stack: Mutex<ProcessorStack<V>>,
    /// Mutex-wrapped so the scheduler can rewire a carrier's input slot onto
    /// a fused-away predecessor's receiver at fusion time (`merge_forward`'s
    /// `eproc.Inputs = sproc.Inputs` in `loopy/exgraph.go`) without needing
    /// `&mut Processor`.
    inputs: Vec<Mutex<flume::Receiver<Envelope<V>>>>,
    /// `None` once this slot has been closed (the `defer close(proc.Outputs[i])`
    /// of the Go original) - a stage that has dropped its sender here is
    /// terminal for everything downstream of it.
    outputs: Vec<Mutex<Option<flume::Sender<Envelope<V>>>>>,
}

impl<V: Payload> Processor<V> {
    /// `outputs[i] == None` means that output slot was never linked to a
    /// downstream stage; [`Self::emit`] silently drops messages sent there,
    /// which is the expected fate of e.g. a `Filter`'s unused lane.
    pub fn new(
        info: ProcessorInfo<V>,
        inputs: Vec<flume::Receiver<Envelope<V>>>,
        outputs: Vec<Option<flume::Sender<Envelope<V>>>>,
    ) -> Self {
        let name = info.name.clone();
        Self {
            info: Mutex::new(info),
            name,
            state: ProcessorState::new(),
            in_stack: Mutex::new(ProcessorStack::new()),
            out_stack: Mutex::new(ProcessorStack::new()),
            inputs: inputs.into_iter().map(Mutex::new).collect(),
            outputs: outputs.into_iter().map(Mutex::new).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn stamp_enter(&self, header: &mut Header) {
        header.stamp_enter(&self.name, std::time::Instant::now());
    }

    pub fn stamp_leave(&self, header: &mut Header) {
        header.stamp_leave(&self.name, std::time::Instant::now());
    }

    /// Forwards a control message to every output this stage has, skipping
    /// delivery entirely when the message already named this stage as its
    /// destination (it has arrived). Mirrors `Processor.WaitMessage`'s
    /// forwarding test.
    fn forward_control(&self, msg: &ControlMessage) {
        if !ProcessorState::addressed_to(msg, &self.name) {
            for out in &self.outputs {
                if let Some(sender) = out.lock().unwrap().as_ref() {
                    let _ = sender.send(Envelope::Control(msg.clone()));
                }
            }
        }
    }

    /// Rewires input slot `slot` onto `rx`, discarding whatever receiver was
    /// there before. The scheduler uses this when fusing a branch: the
    /// carrier (the partition's last node) takes over the partition's first
    /// node's input receiver, so data keeps flowing to the carrier once the
    /// interior nodes exit - mirrors `mergeForward`'s `eproc.Inputs =
    /// sproc.Inputs`.
    pub fn rewire_input(&self, slot: usize, rx: flume::Receiver<Envelope<V>>) {
        *self.inputs[slot].lock().unwrap() = rx;
    }

    /// A clone of the receiver currently wired to input slot `slot`. Flume
    /// receivers are cheap to clone (cloning just adds another handle onto
    /// the same rendezvous channel), which is what lets the scheduler hand a
    /// copy to a carrier while this processor's own `inputs` entry keeps
    /// referencing the original.
    pub fn input_receiver(&self, slot: usize) -> flume::Receiver<Envelope<V>> {
        self.inputs[slot].lock().unwrap().clone()
    }

    /// Pulls the next data message off `inputs[slot]`, transparently
    /// forwarding and acting on any control messages encountered along the
    /// way. Returns `None` once the stage should exit (channel closed, or a
    /// control message requested `ErStatus::Exit`).
    pub async fn recv_data(&self, slot: usize) -> Option<Message<V>> {
        loop {
            let rx = self.input_receiver(slot);
            let envelope = rx.recv_async().await.ok()?;
            match envelope {
                Envelope::Data(msg) => return Some(msg),
                Envelope::Control(ctrl) => {
                    self.forward_control(&ctrl);
                    if !self.state.handle_control(&ctrl).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Applies the fused-in upstream stages' functions to `value` ahead of
    /// this stage's own, per `proc.InStack.ExecStack(x)`.
    pub fn apply_in_stack(&self, msg: Message<V>) -> Message<V> {
        self.in_stack.lock().unwrap().exec(msg)
    }

    /// Applies the fused-in downstream stages' functions to `value` right
    /// before emission, per `proc.OutStack.ExecStack(y)`.
    pub fn apply_out_stack(&self, msg: Message<V>) -> Message<V> {
        self.out_stack.lock().unwrap().exec(msg)
    }

    /// Emits `msg` on output slot `slot`, running it through `OutStack`
    /// first. A no-op if that slot was already closed.
    pub async fn emit(&self, slot: usize, msg: Message<V>) {
        let msg = self.apply_out_stack(msg);
        let sender = self.outputs[slot].lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send_async(Envelope::Data(msg)).await;
        }
    }

    /// Closes one output slot - the Rust analogue of `close(proc.Outputs[i])`.
    /// Downstream stages observe this as their input channel closing.
    pub fn close_output(&self, slot: usize) {
        self.outputs[slot].lock().unwrap().take();
    }

    /// Closes every output slot, used by single-output stages on loop exit.
    pub fn close_all_outputs(&self) {
        for i in 0..self.outputs.len() {
            self.close_output(i);
        }
    }

    /// Broadcasts an exit control message on every output, used to drain a
    /// branch down before the scheduler fuses or tears it down.
    pub fn broadcast_exit(&self) {
        let ctrl = ControlMessage {
            start: self.name.clone(),
            end: String::new(),
            wr_status: crate::message::WrStatus::ReqWait,
            er_status: ErStatus::Exit,
        };
        for out in &self.outputs {
            if let Some(sender) = out.lock().unwrap().as_ref() {
                let _ = sender.send(Envelope::Control(ctrl.clone()));
            }
        }
    }
}
