use crate::models::{BacktestResults, ReturnsPoint, TradeSide};
use chrono::NaiveDate;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, BTreeSet};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const RISK_FREE_RATE: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayReturn {
    pub date: NaiveDate,
    pub returns: f64,
}

/// Headline numbers for one set of backtest results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsSummary {
    pub trading_days: usize,
    pub cumulative_return: f64,
    pub mean_daily_return: f64,
    pub daily_volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_percent: f64,
    pub best_day: Option<DayReturn>,
    pub worst_day: Option<DayReturn>,
    pub total_trades: usize,
    pub trades_by_side: BTreeMap<&'static str, usize>,
    pub final_cash: Option<f64>,
    pub tickers_traded: Vec<String>,
    pub open_positions: Vec<String>,
}

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    pub fn summarize(results: &BacktestResults) -> ResultsSummary {
        let daily: Vec<f64> = results
            .returns
            .iter()
            .map(|point| point.returns)
            .filter(|value| value.is_finite())
            .collect();

        let mut trades_by_side = BTreeMap::new();
        for trade in &results.trades {
            *trades_by_side.entry(trade.side.as_str()).or_insert(0) += 1;
        }

        let tickers_traded: BTreeSet<String> = results
            .trades
            .iter()
            .map(|trade| trade.stock.clone())
            .collect();

        let open_positions = results
            .portfolio
            .last()
            .map(|snapshot| {
                snapshot
                    .positions
                    .iter()
                    .filter(|(_, size)| **size != 0.0)
                    .map(|(ticker, _)| ticker.clone())
                    .collect()
            })
            .unwrap_or_default();

        ResultsSummary {
            trading_days: results.returns.len(),
            cumulative_return: Self::cumulative_return(&daily),
            mean_daily_return: if daily.is_empty() {
                0.0
            } else {
                daily.iter().mean()
            },
            daily_volatility: Self::volatility(&daily),
            sharpe_ratio: Self::calculate_sharpe_ratio(&daily),
            max_drawdown_percent: Self::calculate_max_drawdown_percent(&daily),
            best_day: Self::extreme_day(&results.returns, |a, b| a > b),
            worst_day: Self::extreme_day(&results.returns, |a, b| a < b),
            total_trades: results.trades.len(),
            trades_by_side,
            final_cash: results.trades.last().map(|trade| trade.cash),
            tickers_traded: tickers_traded.into_iter().collect(),
            open_positions,
        }
    }

    pub fn count_side(summary: &ResultsSummary, side: TradeSide) -> usize {
        summary
            .trades_by_side
            .get(side.as_str())
            .copied()
            .unwrap_or(0)
    }

    fn cumulative_return(daily: &[f64]) -> f64 {
        daily.iter().fold(1.0, |equity, r| equity * (1.0 + r)) - 1.0
    }

    // Sample standard deviation; undefined below two observations.
    fn volatility(daily: &[f64]) -> f64 {
        if daily.len() < 2 {
            return 0.0;
        }
        let std_dev = daily.iter().std_dev();
        if std_dev.is_finite() {
            std_dev
        } else {
            0.0
        }
    }

    pub fn calculate_sharpe_ratio(daily: &[f64]) -> f64 {
        if daily.len() < 2 {
            return 0.0;
        }

        let mean_return = daily.iter().mean();
        let std_dev = Self::volatility(daily);

        if std_dev <= f64::EPSILON {
            return 0.0;
        }

        let annualized_return = mean_return * TRADING_DAYS_PER_YEAR;
        let annualized_volatility = std_dev * TRADING_DAYS_PER_YEAR.sqrt();

        (annualized_return - RISK_FREE_RATE) / annualized_volatility
    }

    /// Largest peak-to-trough fall of the compounded equity curve, in percent.
    pub fn calculate_max_drawdown_percent(daily: &[f64]) -> f64 {
        let mut equity = 1.0;
        let mut peak_value = 1.0;
        let mut max_drawdown_percent: f64 = 0.0;

        for r in daily {
            equity *= 1.0 + r;
            if equity > peak_value {
                peak_value = equity;
            } else if peak_value > 0.0 {
                let drawdown_percent = (peak_value - equity) / peak_value * 100.0;
                max_drawdown_percent = max_drawdown_percent.max(drawdown_percent);
            }
        }

        max_drawdown_percent
    }

    fn extreme_day(
        points: &[ReturnsPoint],
        better: impl Fn(f64, f64) -> bool,
    ) -> Option<DayReturn> {
        points
            .iter()
            .filter(|point| point.returns.is_finite())
            .fold(None, |best: Option<&ReturnsPoint>, point| match best {
                Some(current) if !better(point.returns, current.returns) => Some(current),
                _ => Some(point),
            })
            .map(|point| DayReturn {
                date: point.date,
                returns: point.returns,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PortfolioPoint, TradePoint};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample() -> BacktestResults {
        let returns = [0.01, -0.02, 0.03, -0.01]
            .iter()
            .enumerate()
            .map(|(i, r)| ReturnsPoint {
                date: day(i as u32 + 2),
                returns: *r,
            })
            .collect();
        let portfolio = vec![
            PortfolioPoint {
                date: day(2),
                positions: BTreeMap::from([("AAPL".to_string(), 10.0)]),
            },
            PortfolioPoint {
                date: day(5),
                positions: BTreeMap::from([
                    ("AAPL".to_string(), 0.0),
                    ("MSFT".to_string(), -5.0),
                ]),
            },
        ];
        let trades = vec![
            TradePoint {
                date: day(2),
                stock: "AAPL".into(),
                side: TradeSide::Long,
                cash: 9_000.0,
            },
            TradePoint {
                date: day(4),
                stock: "MSFT".into(),
                side: TradeSide::Short,
                cash: 9_500.0,
            },
            TradePoint {
                date: day(5),
                stock: "AAPL".into(),
                side: TradeSide::Sell,
                cash: 10_400.0,
            },
        ];
        BacktestResults {
            returns,
            portfolio,
            trades,
        }
    }

    #[test]
    fn summarizes_returns_and_trades() {
        let summary = PerformanceCalculator::summarize(&sample());

        assert_eq!(summary.trading_days, 4);
        let expected = 1.01 * 0.98 * 1.03 * 0.99 - 1.0;
        assert!((summary.cumulative_return - expected).abs() < 1e-12);
        assert!((summary.mean_daily_return - 0.0025).abs() < 1e-12);
        assert_eq!(summary.best_day.as_ref().unwrap().date, day(4));
        assert_eq!(summary.worst_day.as_ref().unwrap().returns, -0.02);
        assert_eq!(summary.total_trades, 3);
        assert_eq!(
            PerformanceCalculator::count_side(&summary, TradeSide::Long),
            1
        );
        assert_eq!(
            PerformanceCalculator::count_side(&summary, TradeSide::Buy),
            0
        );
        assert_eq!(summary.final_cash, Some(10_400.0));
        assert_eq!(summary.tickers_traded, vec!["AAPL", "MSFT"]);
        assert_eq!(summary.open_positions, vec!["MSFT"]);
    }

    #[test]
    fn drawdown_follows_compounded_equity() {
        let drawdown =
            PerformanceCalculator::calculate_max_drawdown_percent(&[0.10, -0.10, -0.10, 0.5]);
        // Peak 1.1, trough 1.1 * 0.81.
        assert!((drawdown - 19.0).abs() < 1e-9);
        assert_eq!(
            PerformanceCalculator::calculate_max_drawdown_percent(&[0.01, 0.02]),
            0.0
        );
    }

    #[test]
    fn sharpe_needs_variation() {
        assert_eq!(PerformanceCalculator::calculate_sharpe_ratio(&[0.01]), 0.0);
        assert_eq!(
            PerformanceCalculator::calculate_sharpe_ratio(&[0.01, 0.01, 0.01]),
            0.0
        );
        let daily: [f64; 4] = [0.01, -0.005, 0.02, 0.0];
        let mean: f64 = 0.025 / 4.0;
        let var = daily.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 3.0;
        let expected = (mean * 252.0 - 0.02) / (var.sqrt() * 252.0_f64.sqrt());
        assert!((PerformanceCalculator::calculate_sharpe_ratio(&daily) - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_results_summarize_to_zeroes() {
        let summary = PerformanceCalculator::summarize(&BacktestResults::default());
        assert_eq!(summary.trading_days, 0);
        assert_eq!(summary.cumulative_return, 0.0);
        assert_eq!(summary.mean_daily_return, 0.0);
        assert_eq!(summary.best_day, None);
        assert_eq!(summary.final_cash, None);
        assert!(summary.open_positions.is_empty());
    }
}
