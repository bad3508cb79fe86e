use crate::backtest::BacktestScope;
use crate::context::AppContext;
use crate::models::{BacktestResults, TradeSide};
use crate::performance::{PerformanceCalculator, ResultsSummary};
use anyhow::{Context, Result};
use serde_json::json;

pub async fn run(app: &AppContext, scope: BacktestScope, as_json: bool) -> Result<()> {
    let api = app.api_client()?;
    let results = api
        .results(scope.clone())
        .fetch_all()
        .await
        .with_context(|| format!("failed to fetch results for {}", scope))?;
    let summary = PerformanceCalculator::summarize(&results);

    if as_json {
        let document = json!({
            "summary": &summary,
            "returns": &results.returns,
            "portfolio": &results.portfolio,
            "trades": &results.trades,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results for {}", scope);
        return Ok(());
    }
    print_summary(&scope, &summary);
    print_recent_trades(&results);
    Ok(())
}

fn print_summary(scope: &BacktestScope, summary: &ResultsSummary) {
    println!("Results for {}", scope);
    println!("  Trading days:       {}", summary.trading_days);
    println!(
        "  Cumulative return:  {:.2}%",
        summary.cumulative_return * 100.0
    );
    println!(
        "  Mean daily return:  {:.4}%",
        summary.mean_daily_return * 100.0
    );
    println!(
        "  Daily volatility:   {:.4}%",
        summary.daily_volatility * 100.0
    );
    println!("  Sharpe ratio:       {:.2}", summary.sharpe_ratio);
    println!("  Max drawdown:       {:.2}%", summary.max_drawdown_percent);
    if let Some(best) = &summary.best_day {
        println!(
            "  Best day:           {} ({:+.2}%)",
            best.date,
            best.returns * 100.0
        );
    }
    if let Some(worst) = &summary.worst_day {
        println!(
            "  Worst day:          {} ({:+.2}%)",
            worst.date,
            worst.returns * 100.0
        );
    }
    let sides: Vec<String> = [
        TradeSide::Long,
        TradeSide::Short,
        TradeSide::Buy,
        TradeSide::Sell,
    ]
    .into_iter()
    .map(|side| (side, PerformanceCalculator::count_side(summary, side)))
    .filter(|(_, count)| *count > 0)
    .map(|(side, count)| format!("{} {}", count, side.as_str()))
    .collect();
    if sides.is_empty() {
        println!("  Trades:             {}", summary.total_trades);
    } else {
        println!(
            "  Trades:             {} ({})",
            summary.total_trades,
            sides.join(", ")
        );
    }
    if let Some(cash) = summary.final_cash {
        println!("  Final cash:         {:.2}", cash);
    }
    if !summary.tickers_traded.is_empty() {
        println!("  Tickers traded:     {}", summary.tickers_traded.join(", "));
    }
    if !summary.open_positions.is_empty() {
        println!("  Holding at end:     {}", summary.open_positions.join(", "));
    }
}

fn print_recent_trades(results: &BacktestResults) {
    const SHOWN: usize = 10;
    if results.trades.is_empty() {
        return;
    }
    println!("Last {} trades", SHOWN.min(results.trades.len()));
    let skip = results.trades.len().saturating_sub(SHOWN);
    for trade in results.trades.iter().skip(skip) {
        println!(
            "  {}  {:<6} {:<5} cash {:.2}",
            trade.date,
            trade.stock,
            trade.side.as_str(),
            trade.cash
        );
    }
}
