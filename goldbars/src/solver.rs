//! Elimination search for the counterfeit bar

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::balance::{weigh_and_read, BalanceAdapter, Side};
use crate::comparison::Reading;
use crate::{BarId, SolverConfig, SolverError};

/// How one round splits the candidates across the pans.
///
/// An odd-sized set holds its last bar off the scale. The rest is cut at
/// `len / 2`: `[0, middle)` goes left, `[middle, len)` goes right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub left: Vec<BarId>,
    pub right: Vec<BarId>,
    pub held_out: Option<BarId>,
}

impl Partition {
    pub fn of(candidates: &[BarId]) -> Partition {
        let (weighed, held_out) = match candidates.split_last() {
            Some((last, rest)) if candidates.len() % 2 == 1 => (rest, Some(*last)),
            _ => (candidates, None),
        };
        let middle = weighed.len() / 2;
        Partition {
            left: weighed[..middle].to_vec(),
            right: weighed[middle..].to_vec(),
            held_out,
        }
    }

    pub fn pan(&self, side: Side) -> &[BarId] {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn weighed(&self) -> impl Iterator<Item = &BarId> {
        self.left.iter().chain(self.right.iter())
    }
}

/// Outcome of a successful session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The full set the session started from, in its original order
    pub bars: Vec<BarId>,
    /// The bar the weighings point at
    pub fake: BarId,
    /// Weighings that narrowed the candidate set
    pub rounds: u32,
}

impl Session {
    /// A bar from this session that is not the suspected fake
    pub fn known_good(&self) -> Result<BarId, SolverError> {
        pick_known_good(&self.bars, self.fake)
    }
}

/// Drives a balance until one suspect remains
pub struct Solver {
    balance: Arc<dyn BalanceAdapter>,
    config: SolverConfig,
}

impl Solver {
    pub fn new(balance: Arc<dyn BalanceAdapter>) -> Self {
        Self::with_config(balance, SolverConfig::default())
    }

    pub fn with_config(balance: Arc<dyn BalanceAdapter>, config: SolverConfig) -> Self {
        Self { balance, config }
    }

    /// Find the counterfeit among `candidates`.
    ///
    /// One weighing per round. Fails on an empty set, on result text the
    /// solver cannot read, and once more than `max_tries` rounds have
    /// narrowed the set.
    #[instrument(skip(self, candidates), fields(bars = candidates.len()))]
    pub async fn solve(&self, candidates: Vec<BarId>) -> Result<BarId, SolverError> {
        self.search(candidates).await.map(|(fake, _)| fake)
    }

    /// Like [`Solver::solve`], keeping the starting set for later lookups.
    #[instrument(skip(self, bars), fields(bars = bars.len()))]
    pub async fn run(&self, bars: Vec<BarId>) -> Result<Session, SolverError> {
        let (fake, rounds) = self.search(bars.clone()).await?;
        Ok(Session { bars, fake, rounds })
    }

    /// Accuse `bar` of being the fake and return the page's verdict verbatim.
    #[instrument(skip(self))]
    pub async fn accuse(&self, bar: BarId) -> Result<String, SolverError> {
        if bar < 0 {
            return Err(SolverError::InvalidIndex(bar));
        }
        let alert = self.balance.click_accuse(bar).await?;
        info!(bar, alert = %alert, "Accusation answered");
        Ok(alert)
    }

    async fn search(&self, mut candidates: Vec<BarId>) -> Result<(BarId, u32), SolverError> {
        let max = self.config.max_tries;
        let mut rounds: u32 = 0;

        loop {
            match candidates.as_slice() {
                [] => return Err(SolverError::EmptyCandidateSet),
                [only] => {
                    info!(fake = *only, rounds, "Suspected fake bar found");
                    return Ok((*only, rounds));
                }
                _ => {}
            }

            let partition = Partition::of(&candidates);
            let raw = self.weigh(&partition).await?;
            let reading = Reading::parse(&raw)?;
            debug!(%reading, "Parsed reading");
            let next = match reading.lighter_side() {
                Some(bars) => bars.to_vec(),
                None => match (&reading, partition.held_out) {
                    (Reading::Balanced, Some(bar)) => {
                        info!(fake = bar, rounds, "Pans balanced; held-out bar is the fake");
                        return Ok((bar, rounds));
                    }
                    (Reading::Unrecognized(text), _) => {
                        return Err(SolverError::InvalidComparison(text.clone()))
                    }
                    _ => return Err(SolverError::InvalidComparison(raw)),
                },
            };

            let weighed: HashSet<&BarId> = partition.weighed().collect();
            if next.iter().any(|bar| !weighed.contains(bar)) {
                warn!(?next, ?partition, "Result names bars that were not on the scale");
            }

            rounds += 1;
            if rounds > max {
                return Err(SolverError::AttemptsExceeded { max, actual: rounds });
            }
            debug!(round = rounds, remaining = ?next, "Narrowed candidates");
            candidates = next;
        }
    }

    async fn weigh(&self, partition: &Partition) -> Result<String, SolverError> {
        info!(
            left = ?partition.left,
            right = ?partition.right,
            held_out = ?partition.held_out,
            "Weighing"
        );
        self.balance.reset_balance().await?;
        for side in [Side::Left, Side::Right] {
            for (slot, bar) in partition.pan(side).iter().enumerate() {
                debug!(%side, slot, bar, "Placing bar");
                self.balance.place_on_pan(side, slot, *bar).await?;
            }
        }
        let raw = weigh_and_read(self.balance.as_ref(), &self.config).await?;
        debug!(result = %raw, "Balance reported");
        Ok(raw)
    }
}

/// First bar of `original` that is not `suspected_fake`.
pub fn pick_known_good(original: &[BarId], suspected_fake: BarId) -> Result<BarId, SolverError> {
    original
        .iter()
        .copied()
        .find(|bar| *bar != suspected_fake)
        .ok_or(SolverError::NoGenuineItem(suspected_fake))
}
