use crate::backtest::BacktestScope;
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::Simulation;
use crate::results::Results;
use log::info;

/// Simulations scoped under one environment.
pub struct Simulations<'a> {
    api: &'a ApiClient,
    environment: &'a str,
}

impl ApiClient {
    pub fn simulations<'a>(&'a self, environment: &'a str) -> Simulations<'a> {
        Simulations {
            api: self,
            environment,
        }
    }
}

impl<'a> Simulations<'a> {
    /// Not deduplicated here; the server decides whether a second simulation
    /// with the same name is allowed.
    pub async fn create(&self, simulation: &Simulation) -> Result<Simulation, ApiError> {
        let simulation = simulation.validated()?;
        self.api
            .post(&[self.environment, "simulations"], &simulation)
            .await?;
        info!(
            "Created simulation {} in {} ({} to {})",
            simulation.name, self.environment, simulation.start_date, simulation.end_date
        );
        Ok(simulation)
    }

    pub async fn get(&self, name: &str) -> Result<Simulation, ApiError> {
        self.api
            .get(&[self.environment, name], "a simulation object")
            .await
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.api
            .delete(&[self.environment, "simulations", name])
            .await?;
        self.api
            .forget_backtest(&BacktestScope::simulation(self.environment, name));
        info!("Deleted simulation {} from {}", name, self.environment);
        Ok(())
    }

    pub fn results(&self, name: &str) -> Results<'a> {
        self.api
            .results(BacktestScope::simulation(self.environment, name))
    }
}
