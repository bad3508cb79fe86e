use crate::backtest::BacktestScope;
use crate::commands::{format_date, parse_date_arg};
use crate::context::AppContext;
use crate::models::{Environment, NewEnvironment};
use crate::stocks;
use anyhow::{anyhow, Context, Result};
use log::{info, warn};

pub async fn list(app: &AppContext) -> Result<()> {
    let api = app.api_client()?;
    let environments = api
        .environments()
        .list()
        .await
        .context("failed to fetch environments")?;
    if environments.is_empty() {
        println!("No environments yet");
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:<10} {:>10} {:>11}  {}",
        "NAME", "START", "END", "STRATEGIES", "SIMULATIONS", "STOCKS"
    );
    for environment in &environments {
        let marker = if api.has_been_backtested(&BacktestScope::environment(&environment.name)) {
            " *"
        } else {
            ""
        };
        println!(
            "{:<20} {:<10} {:<10} {:>10} {:>11}  {}{}",
            environment.name,
            format_date(environment.start_date),
            format_date(environment.end_date),
            environment.strategies.len(),
            environment.simulations.len(),
            environment.stocks.join(","),
            marker
        );
    }
    Ok(())
}

pub async fn show(app: &AppContext, name: &str) -> Result<()> {
    let api = app.api_client()?;
    let environment = api.environments().get(name).await?;
    print_environment(&environment);
    if api.has_been_backtested(&BacktestScope::environment(name)) {
        println!("Backtest requested from this machine");
    }
    Ok(())
}

pub async fn create(
    app: &AppContext,
    name: &str,
    stocks: &[String],
    start_date: &str,
    end_date: &str,
) -> Result<()> {
    let environment = NewEnvironment::new(
        name,
        stocks.to_vec(),
        parse_date_arg(start_date)?,
        parse_date_arg(end_date)?,
    )?;
    warn_unknown_tickers(&environment.stocks);

    let api = app.api_client()?;
    let created = api
        .environments()
        .create(&environment)
        .await
        .with_context(|| format!("failed to create environment {}", environment.name))?;
    println!(
        "Created environment {} ({} stocks, {} to {})",
        created.name,
        created.stocks.len(),
        created.start_date,
        created.end_date
    );
    Ok(())
}

/// Omitted fields keep their current values; the server still receives a
/// complete replacement.
pub async fn update(
    app: &AppContext,
    name: &str,
    new_name: Option<&str>,
    stocks: Option<&[String]>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<()> {
    let api = app.api_client()?;
    let current = api.environments().get(name).await?;

    let start_date = match start_date {
        Some(raw) => parse_date_arg(raw)?,
        None => current
            .start_date
            .ok_or_else(|| anyhow!("environment {} has no start date; pass --start", name))?,
    };
    let end_date = match end_date {
        Some(raw) => parse_date_arg(raw)?,
        None => current
            .end_date
            .ok_or_else(|| anyhow!("environment {} has no end date; pass --end", name))?,
    };
    let replacement = NewEnvironment::new(
        new_name.unwrap_or(name),
        stocks.map(<[String]>::to_vec).unwrap_or(current.stocks),
        start_date,
        end_date,
    )?;
    warn_unknown_tickers(&replacement.stocks);

    let updated = api
        .environments()
        .update(name, &replacement)
        .await
        .with_context(|| format!("failed to update environment {}", name))?;
    if updated.name != name {
        app.persist_backtests(&api)?;
    }
    println!("Updated environment {}", updated.name);
    Ok(())
}

pub async fn delete(app: &AppContext, name: &str) -> Result<()> {
    let api = app.api_client()?;
    api.environments()
        .delete(name)
        .await
        .with_context(|| format!("failed to delete environment {}", name))?;
    app.persist_backtests(&api)?;
    info!("Cleared backtest markers for {}", name);
    println!("Deleted environment {}", name);
    Ok(())
}

fn warn_unknown_tickers(tickers: &[String]) {
    for ticker in tickers {
        if stocks::find(ticker).is_none() {
            warn!("{} is not in the built-in stock catalog", ticker);
        }
    }
}

fn print_environment(environment: &Environment) {
    println!("Environment {}", environment.name);
    println!(
        "  Period: {} to {}",
        format_date(environment.start_date),
        format_date(environment.end_date)
    );
    println!("  Stocks: {}", environment.stocks.join(", "));
    if environment.strategies.is_empty() && environment.unrecognized_strategies.is_empty() {
        println!("  Strategies: none");
    } else {
        println!("  Strategies:");
        for strategy in &environment.strategies {
            println!("    {}", strategy);
        }
        for raw in &environment.unrecognized_strategies {
            println!("    (unrecognized) {}", raw);
        }
    }
    if environment.simulations.is_empty() {
        println!("  Simulations: none");
    } else {
        println!("  Simulations:");
        for simulation in &environment.simulations {
            println!(
                "    {} ({} to {}, {} strategies)",
                simulation.name,
                simulation.start_date,
                simulation.end_date,
                simulation.strategies.len()
            );
        }
    }
}
