use crate::client::ApiClient;
use crate::error::{ApiError, ValidationError};
use crate::strategy::{Strategy, StrategyDraft};
use log::info;
use serde::Serialize;

/// Strategies attached to one environment.
pub struct Strategies<'a> {
    api: &'a ApiClient,
    environment: &'a str,
}

#[derive(Serialize)]
struct StrategyEnvelope<'s> {
    strategy: &'s Strategy,
}

impl ApiClient {
    pub fn strategies<'a>(&'a self, environment: &'a str) -> Strategies<'a> {
        Strategies {
            api: self,
            environment,
        }
    }
}

impl<'a> Strategies<'a> {
    pub async fn add(&self, strategy: &Strategy) -> Result<Strategy, ApiError> {
        let strategy = strategy.validated()?;
        self.api
            .post(
                &[self.environment, "strategies"],
                &StrategyEnvelope {
                    strategy: &strategy,
                },
            )
            .await?;
        info!(
            "Added strategy {} ({}) to {}",
            strategy.name,
            strategy.type_name(),
            self.environment
        );
        Ok(strategy)
    }

    /// Converts loosely typed user input and adds it. Nothing is sent when a
    /// parameter is missing or out of range.
    pub async fn add_draft(&self, draft: StrategyDraft) -> Result<Strategy, ApiError> {
        let strategy = draft.into_strategy()?;
        self.add(&strategy).await
    }

    /// Swaps the strategy stored under `name` for `replacement` in a single
    /// request, so a failure never leaves the environment without it.
    pub async fn replace(&self, name: &str, replacement: &Strategy) -> Result<Strategy, ApiError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName("strategy").into());
        }
        let replacement = replacement.validated()?;
        self.api
            .put(
                &[self.environment, "strategies", name],
                &StrategyEnvelope {
                    strategy: &replacement,
                },
            )
            .await?;
        info!(
            "Replaced strategy {} in {} with {} ({})",
            name,
            self.environment,
            replacement.name,
            replacement.type_name()
        );
        Ok(replacement)
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.api
            .delete(&[self.environment, "strategies", name])
            .await?;
        info!("Deleted strategy {} from {}", name, self.environment);
        Ok(())
    }
}
