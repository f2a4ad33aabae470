//! Cost ledger and spending ceiling.
//!
//! [`BudgetTracker`] keeps the running spend of the current accounting
//! window and refuses model calls that would push it past the configured
//! ceiling.
//!
//! # Atomic reservation
//!
//! A pre-call check and the later spend record must not be two separate
//! steps, or two concurrent requests could both pass the check and jointly
//! overshoot. [`BudgetTracker::reserve`] checks `spent + reserved + hold`
//! against the ceiling and takes the hold under one lock acquisition.
//! [`BudgetTracker::settle`] swaps the hold for the actual cost and appends
//! the single ledger entry for the call. A reservation dropped without
//! being settled (timeout, cancellation) releases its hold.
//!
//! Callers hold [`BudgetTracker::worst_case`], which bills the full
//! completion cap. The actual cost of a call can only exceed its hold when
//! the prompt is denser than `chars / 4` tokens, so concurrent calls cannot
//! jointly push the spend past the ceiling by more than that error.
//!
//! Settled costs are never rolled back.

pub mod ledger;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use coteach_llm::Usage;
use coteach_types::ResponderId;
use coteach_types::config::{BudgetConfig, BudgetWindow};
use coteach_types::ledger::{BudgetStatus, LedgerEntry};
use tracing::{debug, info, warn};

use crate::clock::{Clock, system_clock};
use crate::error::ModelCallError;
use ledger::{InMemoryLedger, LedgerBackend};

/// Estimated prompt tokens for `chars` characters of prompt text.
pub fn estimate_prompt_tokens(chars: usize) -> u32 {
    u32::try_from(chars / 4).unwrap_or(u32::MAX)
}

/// Estimated completion tokens for a call capped at `max_tokens`.
pub fn estimate_completion_tokens(max_tokens: u32) -> u32 {
    max_tokens / 2
}

// ── Window state ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct WindowState {
    /// Start of the window the totals belong to.
    window_start: Option<DateTime<Utc>>,
    spent: f64,
    calls: usize,
    /// Outstanding reservations.
    reserved: f64,
    /// Per-entry costs, kept only for rolling windows so old spend can age out.
    recent: VecDeque<(DateTime<Utc>, f64)>,
    warned: bool,
}

// ── BudgetTracker ───────────────────────────────────────────────────────

/// Shared spending ledger with a hard ceiling.
///
/// Thread-safe via an internal [`Mutex`]; share it as `Arc<BudgetTracker>`.
pub struct BudgetTracker {
    config: BudgetConfig,
    state: Mutex<WindowState>,
    ledger: Arc<dyn LedgerBackend>,
    clock: Clock,
    /// Deadline for one ledger append or replay.
    store_timeout: Duration,
}

impl BudgetTracker {
    /// Tracker with an in-memory ledger.
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            state: Mutex::new(WindowState::default()),
            ledger: Arc::new(InMemoryLedger::new()),
            clock: system_clock(),
            store_timeout: Duration::from_millis(config.ledger_timeout_ms),
            config,
        }
    }

    /// Use `ledger` as the durable record of settled calls.
    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerBackend>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Deadline for ledger backend calls.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Rebuild the current window's totals from the ledger backend.
    ///
    /// Returns the number of entries replayed.
    pub async fn restore(&self) -> coteach_types::Result<usize> {
        let now = (self.clock)();
        let since = self.config.window.start_at(now);
        let entries = tokio::time::timeout(self.store_timeout, self.ledger.entries_since(since))
            .await
            .map_err(|_| coteach_types::CoteachError::Timeout {
                operation: "ledger_replay".into(),
            })??;

        let mut state = self.state.lock().expect("budget tracker lock poisoned");
        state.window_start = since;
        state.spent = 0.0;
        state.calls = 0;
        state.recent.clear();
        for entry in &entries {
            state.spent += entry.cost_usd;
            state.calls += 1;
            if matches!(self.config.window, BudgetWindow::Rolling { .. }) {
                state.recent.push_back((entry.timestamp, entry.cost_usd));
            }
        }
        state.warned = state.spent >= self.config.warning_threshold_usd;
        info!(
            entries = entries.len(),
            spent_usd = state.spent,
            "budget restored from ledger"
        );
        Ok(entries.len())
    }

    // ── Cost arithmetic ─────────────────────────────────────────────

    /// Cost in USD of a call with the given token counts.
    pub fn cost_for(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        self.config
            .rate_for(model)
            .cost(prompt_tokens, completion_tokens)
    }

    /// Pre-call estimate: `chars / 4` prompt tokens, `max_tokens / 2`
    /// completion tokens.
    pub fn estimate(&self, model: &str, prompt_chars: usize, max_tokens: u32) -> f64 {
        self.cost_for(
            model,
            estimate_prompt_tokens(prompt_chars),
            estimate_completion_tokens(max_tokens),
        )
    }

    /// Upper bound used for reservations: `chars / 4` prompt tokens plus
    /// the full `max_tokens` completion cap.
    pub fn worst_case(&self, model: &str, prompt_chars: usize, max_tokens: u32) -> f64 {
        self.cost_for(model, estimate_prompt_tokens(prompt_chars), max_tokens)
    }

    // ── Checks ──────────────────────────────────────────────────────

    /// Whether a call costing `estimated_cost` would exceed the ceiling.
    ///
    /// Read-only. Use [`reserve`](Self::reserve) when the answer must hold
    /// until the call is settled.
    pub fn would_exceed(&self, estimated_cost: f64) -> bool {
        let mut state = self.state.lock().expect("budget tracker lock poisoned");
        self.roll_window(&mut state);
        state.spent + state.reserved + estimated_cost > self.config.ceiling_usd
    }

    /// Ceiling minus spend and outstanding reservations, floored at zero.
    pub fn remaining_budget(&self) -> f64 {
        let mut state = self.state.lock().expect("budget tracker lock poisoned");
        self.roll_window(&mut state);
        (self.config.ceiling_usd - state.spent - state.reserved).max(0.0)
    }

    /// Snapshot for status endpoints.
    pub fn status(&self) -> BudgetStatus {
        let mut state = self.state.lock().expect("budget tracker lock poisoned");
        self.roll_window(&mut state);
        let ceiling = self.config.ceiling_usd;
        BudgetStatus {
            spent_usd: state.spent,
            reserved_usd: state.reserved,
            ceiling_usd: ceiling,
            remaining_usd: (ceiling - state.spent - state.reserved).max(0.0),
            percent_used: if ceiling > 0.0 {
                state.spent / ceiling * 100.0
            } else {
                100.0
            },
            warning: state.spent >= self.config.warning_threshold_usd,
            calls: state.calls,
            window_start: state.window_start,
        }
    }

    // ── Reservation ─────────────────────────────────────────────────

    /// Atomically check the ceiling and hold `estimated_cost`.
    ///
    /// Pass [`worst_case`](Self::worst_case) so the hold covers the largest
    /// cost the call can settle at.
    ///
    /// # Errors
    ///
    /// [`ModelCallError::BudgetExceeded`] when `spent + reserved + estimate`
    /// would pass the ceiling. Nothing is held in that case.
    pub fn reserve(self: &Arc<Self>, estimated_cost: f64) -> Result<BudgetReservation, ModelCallError> {
        let estimated_cost = estimated_cost.max(0.0);
        let mut state = self.state.lock().expect("budget tracker lock poisoned");
        self.roll_window(&mut state);

        let committed = state.spent + state.reserved;
        if committed + estimated_cost > self.config.ceiling_usd {
            info!(
                spent_usd = committed,
                ceiling_usd = self.config.ceiling_usd,
                estimated_usd = estimated_cost,
                "budget veto"
            );
            return Err(ModelCallError::BudgetExceeded {
                spent: committed,
                ceiling: self.config.ceiling_usd,
                estimated: estimated_cost,
            });
        }

        state.reserved += estimated_cost;
        debug!(
            estimated_usd = estimated_cost,
            reserved_usd = state.reserved,
            "budget reserved"
        );
        Ok(BudgetReservation {
            tracker: Arc::clone(self),
            amount: estimated_cost,
            settled: false,
        })
    }

    /// Release the hold of `reservation` and record the actual cost of the
    /// call. This is the only place a settled call is recorded.
    ///
    /// The ledger append happens after the in-memory totals are updated; a
    /// failed append is logged and does not undo the in-memory record.
    pub async fn settle(
        &self,
        mut reservation: BudgetReservation,
        model: &str,
        responder: Option<ResponderId>,
        usage: Usage,
    ) -> LedgerEntry {
        reservation.settled = true;
        let entry = self.commit(
            reservation.amount,
            model,
            responder,
            usage.prompt_tokens,
            usage.completion_tokens,
        );
        if entry.cost_usd > reservation.amount + f64::EPSILON {
            warn!(
                held_usd = reservation.amount,
                cost_usd = entry.cost_usd,
                "call cost more than its reservation"
            );
        }
        self.persist(&entry).await;
        entry
    }

    /// Record a call that was not reserved. Returns its cost.
    pub async fn record(
        &self,
        model: &str,
        responder: Option<ResponderId>,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> f64 {
        let entry = self.commit(0.0, model, responder, prompt_tokens, completion_tokens);
        self.persist(&entry).await;
        entry.cost_usd
    }

    fn release(&self, amount: f64) {
        let mut state = self.state.lock().expect("budget tracker lock poisoned");
        state.reserved = (state.reserved - amount).max(0.0);
        debug!(released_usd = amount, "budget reservation released");
    }

    fn commit(
        &self,
        held: f64,
        model: &str,
        responder: Option<ResponderId>,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> LedgerEntry {
        let cost = self.cost_for(model, prompt_tokens, completion_tokens);
        let now = (self.clock)();

        let mut state = self.state.lock().expect("budget tracker lock poisoned");
        self.roll_window(&mut state);
        state.reserved = (state.reserved - held).max(0.0);
        state.spent += cost;
        state.calls += 1;
        if matches!(self.config.window, BudgetWindow::Rolling { .. }) {
            state.recent.push_back((now, cost));
        }

        if !state.warned && state.spent >= self.config.warning_threshold_usd {
            state.warned = true;
            warn!(
                spent_usd = state.spent,
                ceiling_usd = self.config.ceiling_usd,
                "budget warning threshold crossed"
            );
        }

        debug!(
            model = %model,
            prompt_tokens,
            completion_tokens,
            cost_usd = cost,
            spent_usd = state.spent,
            "model call recorded"
        );

        LedgerEntry {
            model: model.to_string(),
            prompt_tokens,
            completion_tokens,
            cost_usd: cost,
            responder,
            timestamp: now,
        }
    }

    async fn persist(&self, entry: &LedgerEntry) {
        match tokio::time::timeout(self.store_timeout, self.ledger.append(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to persist ledger entry"),
            Err(_) => warn!(
                timeout_ms = u64::try_from(self.store_timeout.as_millis()).unwrap_or(u64::MAX),
                "ledger append timed out"
            ),
        }
    }

    /// Move the totals to the window containing now.
    fn roll_window(&self, state: &mut WindowState) {
        let now = (self.clock)();
        match self.config.window {
            BudgetWindow::Lifetime => {}
            BudgetWindow::Daily { .. } => {
                let start = self.config.window.start_at(now);
                if state.window_start != start {
                    if state.window_start.is_some() {
                        info!(spent_usd = state.spent, "budget window rolled over");
                        state.spent = 0.0;
                        state.calls = 0;
                        state.warned = false;
                    }
                    state.window_start = start;
                }
            }
            BudgetWindow::Rolling { .. } => {
                let start = self.config.window.start_at(now);
                state.window_start = start;
                if let Some(start) = start {
                    while let Some(&(at, cost)) = state.recent.front() {
                        if at >= start {
                            break;
                        }
                        state.recent.pop_front();
                        state.spent = (state.spent - cost).max(0.0);
                        state.calls = state.calls.saturating_sub(1);
                    }
                }
                if state.spent < self.config.warning_threshold_usd {
                    state.warned = false;
                }
            }
        }
    }
}

impl std::fmt::Debug for BudgetTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("budget tracker lock poisoned");
        f.debug_struct("BudgetTracker")
            .field("ceiling_usd", &self.config.ceiling_usd)
            .field("spent_usd", &state.spent)
            .field("reserved_usd", &state.reserved)
            .finish()
    }
}

// ── BudgetReservation ───────────────────────────────────────────────────

/// A held estimate. Settle it with [`BudgetTracker::settle`]; dropping it
/// unsettled releases the hold.
#[must_use = "an unsettled reservation is released when dropped"]
pub struct BudgetReservation {
    tracker: Arc<BudgetTracker>,
    amount: f64,
    settled: bool,
}

impl BudgetReservation {
    /// The held estimate in USD.
    pub fn amount(&self) -> f64 {
        self.amount
    }
}

impl Drop for BudgetReservation {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.release(self.amount);
        }
    }
}

impl std::fmt::Debug for BudgetReservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetReservation")
            .field("amount", &self.amount)
            .field("settled", &self.settled)
            .finish()
    }
}
