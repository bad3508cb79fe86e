use crate::commands::parse_date_arg;
use crate::context::AppContext;
use crate::models::Simulation;
use anyhow::{anyhow, Context, Result};

/// `strategies` name strategies already attached to the environment; they
/// are copied into the simulation.
pub async fn create(
    app: &AppContext,
    environment: &str,
    name: &str,
    start_date: &str,
    end_date: &str,
    strategies: &[String],
) -> Result<()> {
    let start_date = parse_date_arg(start_date)?;
    let end_date = parse_date_arg(end_date)?;
    let api = app.api_client()?;

    let selected = if strategies.is_empty() {
        Vec::new()
    } else {
        let current = api.environments().get(environment).await?;
        strategies
            .iter()
            .map(|wanted| {
                current
                    .strategy(wanted)
                    .cloned()
                    .ok_or_else(|| anyhow!("environment {} has no strategy {}", environment, wanted))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let simulation = Simulation::new(name, start_date, end_date, selected);
    let created = api
        .simulations(environment)
        .create(&simulation)
        .await
        .with_context(|| format!("failed to create simulation in {}", environment))?;
    println!(
        "Created simulation {} in {} ({} to {}, {} strategies)",
        created.name,
        environment,
        created.start_date,
        created.end_date,
        created.strategies.len()
    );
    Ok(())
}

pub async fn show(app: &AppContext, environment: &str, name: &str) -> Result<()> {
    let api = app.api_client()?;
    let simulation = api
        .simulations(environment)
        .get(name)
        .await
        .with_context(|| format!("failed to fetch simulation {} in {}", name, environment))?;
    println!("Simulation {} in {}", simulation.name, environment);
    println!(
        "  Period: {} to {}",
        simulation.start_date, simulation.end_date
    );
    if simulation.strategies.is_empty() {
        println!("  Strategies: none");
    }
    for strategy in &simulation.strategies {
        println!("  {}", strategy);
    }
    Ok(())
}

pub async fn delete(app: &AppContext, environment: &str, name: &str) -> Result<()> {
    let api = app.api_client()?;
    api.simulations(environment)
        .delete(name)
        .await
        .with_context(|| format!("failed to delete simulation {} from {}", name, environment))?;
    app.persist_backtests(&api)?;
    println!("Deleted simulation {} from {}", name, environment);
    Ok(())
}
