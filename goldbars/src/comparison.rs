//! Interpretation of the balance's result text
//!
//! The puzzle page reports a weighing as `"[0,1,2,3] < [4,5,6,7]"`: the bars on
//! the left pan, a comparison marker, and the bars on the right pan. `<` means
//! the left pan is lighter, `>` the right pan, `=` that both weigh the same.

use std::fmt;

use crate::{BarId, SolverError};

const BALANCED: char = '=';
const LEFT_LIGHTER: char = '<';
const RIGHT_LIGHTER: char = '>';

/// A parsed weighing result.
///
/// The lighter variants carry the bars found on the lighter pan, in the order
/// the page printed them. Those are the next candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    Balanced,
    LeftLighter(Vec<BarId>),
    RightLighter(Vec<BarId>),
    Unrecognized(String),
}

impl Reading {
    /// Parse the raw text of one result entry.
    ///
    /// Text with no known marker yields `Unrecognized` rather than an error so
    /// the caller decides how to report it. A marker whose selected side is not
    /// an integer array is a `MalformedPayload` error.
    pub fn parse(raw: &str) -> Result<Reading, SolverError> {
        let text = raw.trim();

        if text.contains(BALANCED) {
            return Ok(Reading::Balanced);
        }
        if let Some((left, _)) = text.split_once(LEFT_LIGHTER) {
            return parse_bars(left).map(Reading::LeftLighter);
        }
        if let Some((_, right)) = text.split_once(RIGHT_LIGHTER) {
            return parse_bars(right).map(Reading::RightLighter);
        }

        Ok(Reading::Unrecognized(raw.to_string()))
    }

    /// Bars that remain suspect after this reading, if it narrows the set
    pub fn lighter_side(&self) -> Option<&[BarId]> {
        match self {
            Reading::LeftLighter(bars) | Reading::RightLighter(bars) => Some(bars),
            Reading::Balanced | Reading::Unrecognized(_) => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Balanced => write!(f, "balanced"),
            Reading::LeftLighter(bars) => write!(f, "left lighter {bars:?}"),
            Reading::RightLighter(bars) => write!(f, "right lighter {bars:?}"),
            Reading::Unrecognized(raw) => write!(f, "unrecognized {raw:?}"),
        }
    }
}

fn parse_bars(payload: &str) -> Result<Vec<BarId>, SolverError> {
    let payload = payload.trim();
    serde_json::from_str::<Vec<BarId>>(payload).map_err(|e| SolverError::MalformedPayload {
        payload: payload.to_string(),
        reason: e.to_string(),
    })
}
