use crate::backtest::BacktestScope;
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::{BacktestResults, PortfolioPoint, ReturnsPoint, TradePoint};
use log::{debug, warn};

/// Returns, portfolio and trade series produced by a backtest of `scope`.
pub struct Results<'a> {
    api: &'a ApiClient,
    scope: BacktestScope,
}

impl ApiClient {
    pub fn results(&self, scope: BacktestScope) -> Results<'_> {
        Results { api: self, scope }
    }
}

impl<'a> Results<'a> {
    pub fn scope(&self) -> &BacktestScope {
        &self.scope
    }

    pub async fn returns(&self) -> Result<Vec<ReturnsPoint>, ApiError> {
        self.api
            .get(&self.scope.segments_with("returns"), "a list of daily returns")
            .await
    }

    pub async fn portfolio(&self) -> Result<Vec<PortfolioPoint>, ApiError> {
        self.api
            .get(
                &self.scope.segments_with("portfolio"),
                "a list of portfolio snapshots",
            )
            .await
    }

    pub async fn trades(&self) -> Result<Vec<TradePoint>, ApiError> {
        self.api
            .get(&self.scope.segments_with("trades"), "a list of trades")
            .await
    }

    /// Fetches all three series concurrently. The first failure wins.
    pub async fn fetch_all(&self) -> Result<BacktestResults, ApiError> {
        if !self.api.has_been_backtested(&self.scope) {
            warn!(
                "No backtest has been requested for {} from this client; results may be empty",
                self.scope
            );
        }
        let (returns, portfolio, trades) =
            futures::try_join!(self.returns(), self.portfolio(), self.trades())?;
        debug!(
            "Fetched {} returns, {} portfolio snapshots, {} trades for {}",
            returns.len(),
            portfolio.len(),
            trades.len(),
            self.scope
        );
        Ok(BacktestResults {
            returns,
            portfolio,
            trades,
        })
    }
}
