//! Automated solver for the counterfeit gold bar puzzle
//!
//! A page shows a two-pan balance and a row of numbered gold bars, one of
//! which is lighter than the rest. The [`Solver`] repeatedly splits the
//! remaining suspects across the pans, reads the balance through a
//! [`BalanceAdapter`], and keeps the lighter side until one bar is left.
//!
//! ```no_run
//! use std::sync::Arc;
//! use goldbars::{SimulatedBalance, Solver};
//!
//! # async fn demo() -> Result<(), goldbars::SolverError> {
//! let balance = Arc::new(SimulatedBalance::new(9, 5));
//! let solver = Solver::new(balance.clone());
//! let fake = solver.solve(balance.bars()).await?;
//! assert_eq!(solver.accuse(fake).await?, goldbars::ACCUSE_SUCCESS);
//! # Ok(())
//! # }
//! ```

pub mod balance;
pub mod browser;
pub mod comparison;
pub mod config;
pub mod errors;
pub mod extension_bridge;
pub mod simulated;
pub mod solver;

/// Number printed on a gold bar; also its coin button index
pub type BarId = i64;

pub use balance::{BalanceAdapter, Side, ACCUSE_FAILURE, ACCUSE_SUCCESS, PAN_SLOTS};
pub use browser::{BrowserBalance, ScriptRunner};
pub use comparison::Reading;
pub use config::SolverConfig;
pub use errors::SolverError;
pub use extension_bridge::ExtensionBridge;
pub use simulated::SimulatedBalance;
pub use solver::{pick_known_good, Partition, Session, Solver};
