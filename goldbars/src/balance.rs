//! The two-pan balance as seen by the solver

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::{BarId, SolverConfig, SolverError};

/// Slots available on each pan of the puzzle page
pub const PAN_SLOTS: usize = 9;

/// Alert shown when the accused bar is the fake one
pub const ACCUSE_SUCCESS: &str = "Yay! You find it!";
/// Alert shown when the accused bar is genuine
pub const ACCUSE_FAILURE: &str = "Oops! Try Again!";

/// One of the two balance platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the solver needs from whatever drives the balance.
///
/// Implementations perform the physical actions (clicking, filling inputs)
/// and hand back the text the UI shows. They are not expected to interpret
/// results; that is the solver's job.
#[async_trait::async_trait]
pub trait BalanceAdapter: Send + Sync {
    /// Clear both pans
    async fn reset_balance(&self) -> Result<(), SolverError>;

    /// Put `bar` in slot `slot` of the given pan
    async fn place_on_pan(&self, side: Side, slot: usize, bar: BarId) -> Result<(), SolverError>;

    /// Press the weigh button. The result list may update later.
    async fn trigger_weigh(&self) -> Result<(), SolverError>;

    /// Text of the newest entry in the result list, empty when there is none.
    /// May be stale right after `trigger_weigh`.
    async fn latest_result_text(&self) -> Result<String, SolverError>;

    /// Number of entries in the result list
    async fn result_count(&self) -> Result<usize, SolverError>;

    /// Click the coin button for `bar` and return the alert it raises
    async fn click_accuse(&self, bar: BarId) -> Result<String, SolverError>;
}

/// Weigh whatever is on the pans and read the newest result.
///
/// Waits for the result list to grow, checking `poll_attempts` times with
/// `poll_interval` between checks. If it never grows the latest text is read
/// anyway, so a stale result is possible. This guards against a slow UI; it
/// does not guarantee freshness.
pub async fn weigh_and_read(
    adapter: &dyn BalanceAdapter,
    config: &SolverConfig,
) -> Result<String, SolverError> {
    let before = adapter.result_count().await?;
    adapter.trigger_weigh().await?;

    let mut fresh = false;
    for check in 0..config.poll_attempts {
        let now = adapter.result_count().await?;
        if now > before {
            fresh = true;
            break;
        }
        debug!(check, before, now, "Result list has not grown yet");
        tokio::time::sleep(config.poll_interval()).await;
    }
    if !fresh {
        warn!(
            attempts = config.poll_attempts,
            "No new weighing result appeared; reading latest result as-is"
        );
    }

    adapter.latest_result_text().await
}
