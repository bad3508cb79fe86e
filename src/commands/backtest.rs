use crate::backtest::BacktestScope;
use crate::context::AppContext;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::time::Duration;

pub async fn run(app: &AppContext, scope: BacktestScope) -> Result<()> {
    info!("Received backtest command for {}", scope);
    let api = app.api_client()?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("invalid spinner template")?,
    );
    pb.set_message(format!("Requesting backtest for {}", scope));
    pb.enable_steady_tick(Duration::from_millis(120));

    let outcome = api.backtests().run(&scope).await;
    match &outcome {
        Ok(()) => pb.finish_with_message(format!("Backtest accepted for {}", scope)),
        Err(_) => pb.abandon_with_message(format!("Backtest request failed for {}", scope)),
    }
    outcome.with_context(|| format!("failed to backtest {}", scope))?;

    app.persist_backtests(&api)?;
    println!(
        "Backtest requested for {}. Fetch output with `stratenv results`.",
        scope
    );
    Ok(())
}
