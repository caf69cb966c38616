//! Pause/resume/exit state machine for a stage.
//!
//! `loopy/processor.go`'s `Processor.Wait`/`Resume`/`WaitMessage` build this
//! on a `sync.Cond`: a stage checks its own `WRStatus` before processing each
//! message, parks on the condvar if a pause was requested, and wakes on
//! `Resume`'s broadcast. `tokio::sync::Notify` is the async-native analogue -
//! no goroutine needs a raw OS thread parked on a mutex.

use std::sync::Mutex;
use tokio::sync::Notify;

use crate::message::{ControlMessage, ErStatus, WrStatus};

pub struct ProcessorState {
    wr_status: Mutex<WrStatus>,
    er_status: Mutex<ErStatus>,
    notify: Notify,
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self {
            wr_status: Mutex::new(WrStatus::Resume),
            er_status: Mutex::new(ErStatus::Run),
            notify: Notify::new(),
        }
    }
}

impl ProcessorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wr_status(&self) -> WrStatus {
        *self.wr_status.lock().unwrap()
    }

    pub fn er_status(&self) -> ErStatus {
        *self.er_status.lock().unwrap()
    }

    /// Parks the caller if a wait was requested since the last message.
    /// Returns `false` when the stage should exit instead of resuming its
    /// read loop.
    pub async fn wait(&self) -> bool {
        let should_wait = *self.wr_status.lock().unwrap() == WrStatus::ReqWait;
        if should_wait {
            *self.wr_status.lock().unwrap() = WrStatus::Wait;
            self.notify.notified().await;
            *self.wr_status.lock().unwrap() = WrStatus::Resume;
            if self.er_status() == ErStatus::Exit {
                return false;
            }
        }
        true
    }

    /// Flips this stage's wait-request flag directly, without routing
    /// through an in-band control message. The scheduler uses this: it holds
    /// an `Arc<Processor<_>>` for every node in a branch already, so there is
    /// no need to inject a channel sentinel just to reach `WRStatus` - unlike
    /// the Go original, where `Branch.Wait` sends a single `cM` into the
    /// branch's first node and relies on each interior stage forwarding it
    /// along. That scheme cannot pause a branch whose first node is a
    /// `Source` (it has no input channel to receive the `cM` on); calling
    /// `request_wait` directly on every node in the branch sidesteps the
    /// gap entirely. See [`crate::scheduler`] for the pause/resume sequence.
    pub fn request_wait(&self) {
        *self.wr_status.lock().unwrap() = WrStatus::ReqWait;
    }

    /// Wakes a parked stage, setting the run/exit state it resumes into.
    /// A no-op if the stage was never parked, matching `Processor.Resume`.
    pub fn resume(&self, new_er_status: ErStatus) {
        let wr = *self.wr_status.lock().unwrap();
        if wr == WrStatus::Wait {
            *self.er_status.lock().unwrap() = new_er_status;
            self.notify.notify_waiters();
        }
    }

    /// Applies an in-band control message addressed (possibly) to this
    /// stage: adopts its requested wait/exit state, then waits if that state
    /// is a pause request. Returns `false` if the stage should terminate.
    pub async fn handle_control(&self, msg: &ControlMessage) -> bool {
        *self.wr_status.lock().unwrap() = msg.wr_status;
        *self.er_status.lock().unwrap() = msg.er_status;
        self.wait().await
    }

    /// True if `msg.end` names this stage (or is unset, meaning "broadcast
    /// to all"), matching `WaitMessage`'s forwarding test: a control message
    /// whose `end` does *not* match the current stage is re-sent downstream
    /// before being acted on locally.
    pub fn addressed_to(msg: &ControlMessage, stage_name: &str) -> bool {
        msg.end.is_empty() || msg.end == stage_name
    }
}
