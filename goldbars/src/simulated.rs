//! In-process stand-in for the puzzle page
//!
//! Behaves like the web UI the solver normally drives: nine slots per pan,
//! the same validation alerts, the same result text, and a result list that
//! can be made to lag behind the weigh button.

use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::debug;

use crate::balance::{BalanceAdapter, Side, ACCUSE_FAILURE, ACCUSE_SUCCESS, PAN_SLOTS};
use crate::{BarId, SolverError};

const GENUINE_WEIGHT: u64 = 10;
const FAKE_WEIGHT: u64 = 9;

#[derive(Default)]
struct BalanceState {
    left: [Option<BarId>; PAN_SLOTS],
    right: [Option<BarId>; PAN_SLOTS],
    results: Vec<String>,
    pending: Option<String>,
    lag_left: u32,
    weighings: usize,
    last_alert: Option<String>,
}

impl BalanceState {
    fn pan(&self, side: Side) -> Vec<BarId> {
        let slots = match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        };
        slots.iter().flatten().copied().collect()
    }

    fn flush_pending(&mut self) {
        if let Some(result) = self.pending.take() {
            self.results.push(result);
        }
    }
}

pub struct SimulatedBalance {
    bar_count: usize,
    fake: BarId,
    result_lag: u32,
    state: Mutex<BalanceState>,
}

impl SimulatedBalance {
    /// A balance over bars `0..bar_count` where `fake` is the light one
    pub fn new(bar_count: usize, fake: BarId) -> Self {
        Self {
            bar_count,
            fake,
            result_lag: 0,
            state: Mutex::new(BalanceState::default()),
        }
    }

    /// Hide each new result from the list for `polls` result-count checks
    pub fn with_result_lag(mut self, polls: u32) -> Self {
        self.result_lag = polls;
        self
    }

    pub fn bars(&self) -> Vec<BarId> {
        (0..self.bar_count as BarId).collect()
    }

    /// Valid weighings performed so far
    pub async fn weigh_count(&self) -> usize {
        self.state.lock().await.weighings
    }

    /// Every result currently visible in the list, oldest first
    pub async fn results(&self) -> Vec<String> {
        self.state.lock().await.results.clone()
    }

    pub async fn last_alert(&self) -> Option<String> {
        self.state.lock().await.last_alert.clone()
    }

    fn weight(&self, bars: &[BarId]) -> u64 {
        bars.iter()
            .map(|bar| {
                if *bar == self.fake {
                    FAKE_WEIGHT
                } else {
                    GENUINE_WEIGHT
                }
            })
            .sum()
    }

    fn check_bar(&self, bar: BarId) -> Result<(), SolverError> {
        if bar < 0 || bar as usize >= self.bar_count {
            return Err(SolverError::Adapter(format!("No coin {bar} on this balance")));
        }
        Ok(())
    }
}

/// Validation message the page shows instead of weighing, if any
fn validate(left: &[BarId], right: &[BarId]) -> Option<String> {
    if has_duplicates(left) {
        return Some("Inputs are invalid: Left side has duplicates".to_string());
    }
    if has_duplicates(right) {
        return Some("Inputs are invalid: Right side has duplicates".to_string());
    }
    let right_set: HashSet<&BarId> = right.iter().collect();
    let shared: Vec<String> = left
        .iter()
        .filter(|bar| right_set.contains(bar))
        .map(|bar| bar.to_string())
        .collect();
    if !shared.is_empty() {
        return Some(format!(
            "Inputs are invalid: Both sides have coin(s): {}",
            shared.join(",")
        ));
    }
    None
}

fn has_duplicates(bars: &[BarId]) -> bool {
    let mut seen = HashSet::new();
    bars.iter().any(|bar| !seen.insert(bar))
}

fn render(bars: &[BarId]) -> Result<String, SolverError> {
    serde_json::to_string(bars).map_err(|e| SolverError::Adapter(format!("render pan: {e}")))
}

#[async_trait::async_trait]
impl BalanceAdapter for SimulatedBalance {
    async fn reset_balance(&self) -> Result<(), SolverError> {
        let mut state = self.state.lock().await;
        state.left = Default::default();
        state.right = Default::default();
        Ok(())
    }

    async fn place_on_pan(&self, side: Side, slot: usize, bar: BarId) -> Result<(), SolverError> {
        self.check_bar(bar)?;
        if slot >= PAN_SLOTS {
            return Err(SolverError::Adapter(format!(
                "No slot {slot} on the {side} pan (it has {PAN_SLOTS})"
            )));
        }
        let mut state = self.state.lock().await;
        match side {
            Side::Left => state.left[slot] = Some(bar),
            Side::Right => state.right[slot] = Some(bar),
        }
        Ok(())
    }

    async fn trigger_weigh(&self) -> Result<(), SolverError> {
        let mut state = self.state.lock().await;
        let left = state.pan(Side::Left);
        let right = state.pan(Side::Right);

        if let Some(alert) = validate(&left, &right) {
            debug!(alert = %alert, "Weighing rejected");
            state.last_alert = Some(alert);
            return Ok(());
        }

        let (lw, rw) = (self.weight(&left), self.weight(&right));
        let marker = match lw.cmp(&rw) {
            std::cmp::Ordering::Less => '<',
            std::cmp::Ordering::Greater => '>',
            std::cmp::Ordering::Equal => '=',
        };
        let text = format!("{} {} {}", render(&left)?, marker, render(&right)?);
        debug!(result = %text, "Weighed");

        state.flush_pending();
        state.weighings += 1;
        if self.result_lag == 0 {
            state.results.push(text);
        } else {
            state.pending = Some(text);
            state.lag_left = self.result_lag;
        }
        Ok(())
    }

    async fn latest_result_text(&self) -> Result<String, SolverError> {
        let state = self.state.lock().await;
        Ok(state.results.last().cloned().unwrap_or_default())
    }

    async fn result_count(&self) -> Result<usize, SolverError> {
        let mut state = self.state.lock().await;
        if state.pending.is_some() {
            if state.lag_left == 0 {
                state.flush_pending();
            } else {
                state.lag_left -= 1;
            }
        }
        Ok(state.results.len())
    }

    async fn click_accuse(&self, bar: BarId) -> Result<String, SolverError> {
        self.check_bar(bar)?;
        let alert = if bar == self.fake {
            ACCUSE_SUCCESS
        } else {
            ACCUSE_FAILURE
        };
        self.state.lock().await.last_alert = Some(alert.to_string());
        Ok(alert.to_string())
    }
}
