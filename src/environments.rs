use crate::client::{decode, describe, ApiClient};
use crate::error::ApiError;
use crate::models::{Environment, NewEnvironment};
use log::{debug, info, warn};
use serde_json::Value;

/// Environment CRUD for the authenticated user.
pub struct Environments<'a> {
    api: &'a ApiClient,
}

impl ApiClient {
    pub fn environments(&self) -> Environments<'_> {
        Environments { api: self }
    }
}

impl<'a> Environments<'a> {
    /// The server must answer with a list; anything else is an error rather
    /// than being coerced.
    pub async fn list(&self) -> Result<Vec<Environment>, ApiError> {
        let value = self.api.send(reqwest::Method::GET, &["envs"], None).await?;
        if !value.is_array() {
            warn!("Invalid environment list format: {}", value);
            return Err(ApiError::UnexpectedShape {
                expected: "a list of environments",
                detail: format!("got {}", describe(&value)),
            });
        }
        let environments: Vec<Environment> = decode(value, "a list of environments")?;
        debug!("Fetched {} environment(s)", environments.len());
        Ok(environments)
    }

    pub async fn get(&self, name: &str) -> Result<Environment, ApiError> {
        self.list()
            .await?
            .into_iter()
            .find(|environment| environment.name == name)
            .ok_or_else(|| ApiError::NotFound {
                kind: "environment",
                name: name.to_string(),
            })
    }

    pub async fn create(&self, environment: &NewEnvironment) -> Result<NewEnvironment, ApiError> {
        let environment = environment.validated()?;
        self.api.post(&["environments"], &environment).await?;
        info!(
            "Created environment {} with {} stock(s)",
            environment.name,
            environment.stocks.len()
        );
        Ok(environment)
    }

    /// Replaces every field of `name` in one request. The replacement may
    /// carry a different name, in which case backtests recorded under the
    /// old name are forgotten.
    pub async fn update(
        &self,
        name: &str,
        replacement: &NewEnvironment,
    ) -> Result<NewEnvironment, ApiError> {
        let replacement = replacement.validated()?;
        self.api.put(&["environments", name], &replacement).await?;
        if replacement.name != name {
            self.api.forget_backtests_for(name);
            info!("Replaced environment {} (now {})", name, replacement.name);
        } else {
            info!("Replaced environment {}", name);
        }
        Ok(replacement)
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        let _: Value = self.api.delete(&["environments", name]).await?;
        self.api.forget_backtests_for(name);
        info!("Deleted environment {}", name);
        Ok(())
    }
}
