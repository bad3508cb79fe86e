use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::Environment;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// What a backtest run or a results fetch is about: a whole environment or
/// one simulation inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BacktestScope {
    Environment(String),
    Simulation {
        environment: String,
        simulation: String,
    },
}

impl BacktestScope {
    pub fn environment<S: Into<String>>(name: S) -> Self {
        BacktestScope::Environment(name.into())
    }

    pub fn simulation<E: Into<String>, S: Into<String>>(environment: E, simulation: S) -> Self {
        BacktestScope::Simulation {
            environment: environment.into(),
            simulation: simulation.into(),
        }
    }

    pub fn environment_name(&self) -> &str {
        match self {
            BacktestScope::Environment(name) => name,
            BacktestScope::Simulation { environment, .. } => environment,
        }
    }

    pub(crate) fn segments_with<'s>(&'s self, tail: &'s str) -> Vec<&'s str> {
        match self {
            BacktestScope::Environment(name) => vec![name.as_str(), tail],
            BacktestScope::Simulation {
                environment,
                simulation,
            } => vec![environment.as_str(), simulation.as_str(), tail],
        }
    }
}

impl fmt::Display for BacktestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacktestScope::Environment(name) => write!(f, "environment {}", name),
            BacktestScope::Simulation {
                environment,
                simulation,
            } => write!(f, "simulation {} in environment {}", simulation, environment),
        }
    }
}

pub struct Backtests<'a> {
    api: &'a ApiClient,
}

impl ApiClient {
    pub fn backtests(&self) -> Backtests<'_> {
        Backtests { api: self }
    }

    pub fn mark_backtested(&self, scope: BacktestScope) {
        self.backtested.insert(scope);
    }

    pub fn has_been_backtested(&self, scope: &BacktestScope) -> bool {
        self.backtested.contains(scope)
    }

    pub fn backtested_scopes(&self) -> Vec<BacktestScope> {
        let mut scopes: Vec<BacktestScope> =
            self.backtested.iter().map(|entry| entry.key().clone()).collect();
        scopes.sort();
        scopes
    }

    pub(crate) fn forget_backtests_for(&self, environment: &str) {
        self.backtested
            .retain(|scope| scope.environment_name() != environment);
    }

    pub(crate) fn forget_backtest(&self, scope: &BacktestScope) {
        self.backtested.remove(scope);
    }
}

impl<'a> Backtests<'a> {
    /// Asks the server to backtest `scope`. The server acknowledges the
    /// request; there is no progress or completion signal, so results have
    /// to be fetched afterwards.
    pub async fn run(&self, scope: &BacktestScope) -> Result<(), ApiError> {
        debug!("Requesting backtest for {}", scope);
        self.api
            .post(&scope.segments_with("backtest"), &json!({}))
            .await?;
        self.api.mark_backtested(scope.clone());
        info!("Backtest accepted for {}", scope);
        Ok(())
    }

    /// Environments this client has seen a successful backtest request for,
    /// either directly or through one of their simulations.
    pub async fn backtested_environments(&self) -> Result<Vec<Environment>, ApiError> {
        let environments = self.api.environments().list().await?;
        Ok(environments
            .into_iter()
            .filter(|environment| {
                self.api
                    .backtested
                    .iter()
                    .any(|scope| scope.environment_name() == environment.name)
            })
            .collect())
    }
}
