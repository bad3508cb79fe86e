use crate::commands::parse_key_value;
use crate::context::AppContext;
use crate::strategy::{Strategy, StrategyDraft};
use anyhow::{Context, Result};
use serde_json::Value;

pub struct StrategyArgs<'a> {
    pub name: &'a str,
    pub strategy_type: &'a str,
    pub params: &'a [String],
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
}

impl<'a> StrategyArgs<'a> {
    fn draft(&self) -> Result<StrategyDraft> {
        let mut draft = StrategyDraft::new(self.name, self.strategy_type);
        for raw in self.params {
            let (key, value) = parse_key_value(raw)?;
            draft = draft.param(&key, Value::String(value));
        }
        if let Some(pct) = self.stop_loss_pct {
            draft = draft.param("stop_loss_pct", pct);
        }
        if let Some(pct) = self.take_profit_pct {
            draft = draft.param("take_profit_pct", pct);
        }
        Ok(draft)
    }

    fn strategy(&self) -> Result<Strategy> {
        Ok(self.draft()?.into_strategy()?)
    }
}

pub async fn add(app: &AppContext, environment: &str, args: StrategyArgs<'_>) -> Result<()> {
    let strategy = args.strategy()?;
    let api = app.api_client()?;
    let added = api
        .strategies(environment)
        .add(&strategy)
        .await
        .with_context(|| format!("failed to add strategy to {}", environment))?;
    println!("Added {} to {}", added, environment);
    Ok(())
}

pub async fn replace(
    app: &AppContext,
    environment: &str,
    name: &str,
    args: StrategyArgs<'_>,
) -> Result<()> {
    let strategy = args.strategy()?;
    let api = app.api_client()?;
    let replaced = api
        .strategies(environment)
        .replace(name, &strategy)
        .await
        .with_context(|| format!("failed to replace strategy {} in {}", name, environment))?;
    println!("Replaced {} in {} with {}", name, environment, replaced);
    Ok(())
}

pub async fn delete(app: &AppContext, environment: &str, name: &str) -> Result<()> {
    let api = app.api_client()?;
    api.strategies(environment)
        .delete(name)
        .await
        .with_context(|| format!("failed to delete strategy {} from {}", name, environment))?;
    println!("Deleted strategy {} from {}", name, environment);
    Ok(())
}
