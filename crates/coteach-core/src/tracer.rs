//! Per-request step tracer.
//!
//! A [`StepTracer`] is created for exactly one dispatch and collects an
//! ordered trace of every routing decision, cache decision and model call.
//! Steps are ordered by the moment [`StepTracer::start_step`] is called. A
//! started step is never dropped: if it is still open when the trace is
//! closed with [`StepTracer::finish`], its response records that it did not
//! complete.

use std::sync::Mutex;

use chrono::Utc;
use coteach_types::ModuleName;
use coteach_types::trace::StepRecord;
use serde_json::{Value, json};
use tracing::debug;

/// Handle to a started step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepHandle(usize);

impl StepHandle {
    /// Sequence index of the step.
    pub fn index(&self) -> usize {
        self.0
    }
}

struct Slot {
    record: StepRecord,
    finished: bool,
}

#[derive(Default)]
struct TraceState {
    slots: Vec<Slot>,
    closed: bool,
}

/// Ordered, append-only trace for one request.
///
/// Shared between the engine and the model calls it makes on behalf of a
/// responder; the internal lock keeps indices contiguous when steps are
/// started from concurrent futures of the same request.
#[derive(Default)]
pub struct StepTracer {
    state: Mutex<TraceState>,
}

impl StepTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a step and return its handle.
    ///
    /// After [`finish`](Self::finish) the trace is sealed: the step is
    /// not recorded and the returned handle is inert.
    pub fn start_step(&self, module: ModuleName, prompt: Value) -> StepHandle {
        let mut state = self.state.lock().expect("step tracer lock poisoned");
        if state.closed {
            debug!(module = %module, "step started after trace was sealed, ignoring");
            return StepHandle(usize::MAX);
        }
        let index = state.slots.len();
        state.slots.push(Slot {
            record: StepRecord {
                sequence_index: index,
                module,
                prompt,
                response: Value::Null,
                timestamp: Utc::now(),
            },
            finished: false,
        });
        StepHandle(index)
    }

    /// Record the response of an open step. The first finish wins.
    pub fn finish_step(&self, handle: StepHandle, response: Value) {
        let mut state = self.state.lock().expect("step tracer lock poisoned");
        if state.closed {
            return;
        }
        if let Some(slot) = state.slots.get_mut(handle.0)
            && !slot.finished
        {
            slot.record.response = response;
            slot.finished = true;
        }
    }

    /// Record an error as the response of an open step.
    pub fn fail_step(&self, handle: StepHandle, error: impl std::fmt::Display) {
        self.finish_step(
            handle,
            json!({ "status": "error", "error": error.to_string() }),
        );
    }

    /// Start and finish a step in one call.
    pub fn record(&self, module: ModuleName, prompt: Value, response: Value) -> StepHandle {
        let handle = self.start_step(module, prompt);
        self.finish_step(handle, response);
        handle
    }

    /// Number of steps started so far.
    pub fn len(&self) -> usize {
        self.state.lock().expect("step tracer lock poisoned").slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct modules in first-appearance order.
    pub fn modules_used(&self) -> Vec<ModuleName> {
        let state = self.state.lock().expect("step tracer lock poisoned");
        let mut modules = Vec::new();
        for slot in &state.slots {
            if !modules.contains(&slot.record.module) {
                modules.push(slot.record.module);
            }
        }
        modules
    }

    /// Copy of the steps recorded so far.
    pub fn snapshot(&self) -> Vec<StepRecord> {
        let state = self.state.lock().expect("step tracer lock poisoned");
        state.slots.iter().map(|s| s.record.clone()).collect()
    }

    /// Seal the trace and return it.
    ///
    /// Steps still open are closed with an `incomplete` marker. Calling
    /// `finish` again returns an empty trace.
    pub fn finish(&self) -> Vec<StepRecord> {
        let mut state = self.state.lock().expect("step tracer lock poisoned");
        state.closed = true;
        std::mem::take(&mut state.slots)
            .into_iter()
            .map(|slot| {
                let mut record = slot.record;
                if !slot.finished {
                    record.response = json!({ "status": "incomplete" });
                }
                record
            })
            .collect()
    }
}

impl std::fmt::Debug for StepTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepTracer")
            .field("steps", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_ordered_from_zero() {
        let tracer = StepTracer::new();
        let a = tracer.start_step(ModuleName::Orchestrator, json!({"action": "routing"}));
        let b = tracer.start_step(ModuleName::RagAgent, json!({"action": "model_call"}));
        tracer.finish_step(b, json!("answer"));
        tracer.finish_step(a, json!({"responder": "RAG_AGENT"}));

        let steps = tracer.finish();
        let indices: Vec<usize> = steps.iter().map(|s| s.sequence_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(steps[0].module, ModuleName::Orchestrator);
        assert_eq!(steps[1].response, json!("answer"));
    }

    #[test]
    fn failed_step_keeps_error_description() {
        let tracer = StepTracer::new();
        let h = tracer.start_step(ModuleName::AdminAgent, json!({}));
        tracer.fail_step(h, "provider error: timeout");
        let steps = tracer.finish();
        assert_eq!(steps[0].response["status"], "error");
        assert_eq!(steps[0].response["error"], "provider error: timeout");
    }

    #[test]
    fn open_steps_are_marked_incomplete() {
        let tracer = StepTracer::new();
        tracer.record(ModuleName::Orchestrator, json!({}), json!({"ok": true}));
        tracer.start_step(ModuleName::StudentAgent, json!({}));
        let steps = tracer.finish();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].response, json!({"status": "incomplete"}));
    }

    #[test]
    fn first_finish_wins() {
        let tracer = StepTracer::new();
        let h = tracer.start_step(ModuleName::Orchestrator, json!({}));
        tracer.finish_step(h, json!(1));
        tracer.finish_step(h, json!(2));
        assert_eq!(tracer.snapshot()[0].response, json!(1));
    }

    #[test]
    fn sealed_trace_ignores_new_steps() {
        let tracer = StepTracer::new();
        tracer.record(ModuleName::Orchestrator, json!({}), json!({}));
        assert_eq!(tracer.finish().len(), 1);
        let late = tracer.record(ModuleName::Orchestrator, json!({}), json!({}));
        assert_eq!(late.index(), usize::MAX);
        assert!(tracer.is_empty());
        assert!(tracer.finish().is_empty());
    }

    #[test]
    fn modules_used_dedupes_in_order() {
        let tracer = StepTracer::new();
        tracer.record(ModuleName::Orchestrator, json!({}), json!({}));
        tracer.record(ModuleName::RagAgent, json!({}), json!({}));
        tracer.record(ModuleName::Orchestrator, json!({}), json!({}));
        assert_eq!(
            tracer.modules_used(),
            vec![ModuleName::Orchestrator, ModuleName::RagAgent]
        );
        assert_eq!(tracer.len(), 3);
    }
}
