//! Solve the puzzle in a live browser tab.
//!
//! Open the puzzle page with the bridge extension installed, then:
//!
//! ```sh
//! RUST_LOG=info cargo run --example solve_in_browser
//! ```

use std::sync::Arc;
use std::time::Duration;

use goldbars::{BrowserBalance, ExtensionBridge, Solver, SolverConfig, ACCUSE_SUCCESS};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bridge = ExtensionBridge::global().await?;
    info!("Waiting for the browser extension on {}", bridge.local_addr());
    bridge.wait_for_client(Duration::from_secs(30)).await?;

    let balance = Arc::new(BrowserBalance::new(bridge));
    let solver = Solver::with_config(balance, SolverConfig::from_env());

    let session = solver.run((0..9).collect()).await?;
    let verdict = solver.accuse(session.fake).await?;
    if verdict == ACCUSE_SUCCESS {
        info!(fake = session.fake, rounds = session.rounds, "Found the fake bar");
    } else {
        warn!(fake = session.fake, %verdict, "Page rejected the accusation");
    }

    let genuine = session.known_good()?;
    let verdict = solver.accuse(genuine).await?;
    info!(bar = genuine, %verdict, "Accused a genuine bar");
    Ok(())
}
