//! Run a full puzzle session against the in-process balance.
//!
//! ```sh
//! RUST_LOG=debug cargo run --example simulate -- 5
//! ```

use std::sync::Arc;

use anyhow::Context;
use goldbars::{SimulatedBalance, Solver, SolverConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let fake: i64 = std::env::args()
        .nth(1)
        .map(|s| s.parse())
        .transpose()
        .context("fake bar must be a number")?
        .unwrap_or(5);

    let balance = Arc::new(SimulatedBalance::new(9, fake));
    let config = SolverConfig::from_env();
    let solver = Solver::with_config(balance.clone(), config);

    let session = solver.run(balance.bars()).await?;
    println!(
        "Suspected fake: {} after {} weighings",
        session.fake,
        balance.weigh_count().await
    );
    for (i, result) in balance.results().await.iter().enumerate() {
        println!("  {}. {}", i + 1, result);
    }

    println!("Accusing {}: {}", session.fake, solver.accuse(session.fake).await?);
    let genuine = session.known_good()?;
    println!("Accusing {}: {}", genuine, solver.accuse(genuine).await?);
    Ok(())
}
