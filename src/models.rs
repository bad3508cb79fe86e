use crate::error::ValidationError;
use crate::strategy::Strategy;
use chrono::NaiveDate;
use log::warn;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

pub const MAX_STOCKS_PER_ENVIRONMENT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEnvironment")]
pub struct Environment {
    pub name: String,
    pub stocks: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub strategies: Vec<Strategy>,
    /// Stored strategies whose type or parameters this client does not
    /// understand, kept as sent by the server.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unrecognized_strategies: Vec<Value>,
    pub simulations: Vec<Simulation>,
}

#[derive(Deserialize)]
struct RawEnvironment {
    name: String,
    #[serde(default)]
    stocks: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_date_opt")]
    start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_date_opt")]
    end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_list_opt")]
    strategies: Vec<Value>,
    #[serde(default, deserialize_with = "deserialize_list_opt")]
    simulations: Vec<Simulation>,
}

impl From<RawEnvironment> for Environment {
    fn from(raw: RawEnvironment) -> Self {
        let (strategies, unrecognized_strategies) =
            split_strategies(raw.strategies, "environment", &raw.name);
        Self {
            name: raw.name,
            stocks: raw.stocks,
            start_date: raw.start_date,
            end_date: raw.end_date,
            strategies,
            unrecognized_strategies,
            simulations: raw.simulations,
        }
    }
}

impl Environment {
    pub fn strategy(&self, name: &str) -> Option<&Strategy> {
        self.strategies.iter().find(|strategy| strategy.name == name)
    }

    pub fn simulation(&self, name: &str) -> Option<&Simulation> {
        self.simulations
            .iter()
            .find(|simulation| simulation.name == name)
    }
}

/// Body of create and full-replacement update requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEnvironment {
    pub name: String,
    pub stocks: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl NewEnvironment {
    pub fn new<S: Into<String>>(
        name: S,
        stocks: Vec<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        Self {
            name: name.into(),
            stocks,
            start_date,
            end_date,
        }
        .validated()
    }

    /// Returns a normalized copy (trimmed name, upper-case tickers) or the
    /// first rule it breaks.
    pub fn validated(&self) -> Result<Self, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName("environment"));
        }
        let stocks = normalize_stocks(&self.stocks)?;
        check_date_range(self.start_date, self.end_date)?;
        Ok(Self {
            name: name.to_string(),
            stocks,
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSimulation")]
pub struct Simulation {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub strategies: Vec<Strategy>,
    #[serde(skip_serializing)]
    pub unrecognized_strategies: Vec<Value>,
}

#[derive(Deserialize)]
struct RawSimulation {
    name: String,
    #[serde(deserialize_with = "deserialize_date")]
    start_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_date")]
    end_date: NaiveDate,
    #[serde(default, deserialize_with = "deserialize_list_opt")]
    strategies: Vec<Value>,
}

impl From<RawSimulation> for Simulation {
    fn from(raw: RawSimulation) -> Self {
        let (strategies, unrecognized_strategies) =
            split_strategies(raw.strategies, "simulation", &raw.name);
        Self {
            name: raw.name,
            start_date: raw.start_date,
            end_date: raw.end_date,
            strategies,
            unrecognized_strategies,
        }
    }
}

impl Simulation {
    pub fn new<S: Into<String>>(
        name: S,
        start_date: NaiveDate,
        end_date: NaiveDate,
        strategies: Vec<Strategy>,
    ) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date,
            strategies,
            unrecognized_strategies: Vec::new(),
        }
    }

    pub fn validated(&self) -> Result<Self, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName("simulation"));
        }
        check_date_range(self.start_date, self.end_date)?;
        let mut seen = HashSet::new();
        let mut strategies = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let strategy = strategy.validated()?;
            if !seen.insert(strategy.name.clone()) {
                return Err(ValidationError::DuplicateStrategy(strategy.name));
            }
            strategies.push(strategy);
        }
        Ok(Self {
            name: name.to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            strategies,
            unrecognized_strategies: self.unrecognized_strategies.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsPoint {
    #[serde(alias = "timestamp", deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    pub returns: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPoint {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub positions: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePoint {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    pub stock: String,
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub cash: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TradeSide {
    Long,
    Short,
    Buy,
    Sell,
}

impl TradeSide {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "long" => Some(Self::Long),
            "short" => Some(Self::Short),
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Long => "Long",
            TradeSide::Short => "Short",
            TradeSide::Buy => "Buy",
            TradeSide::Sell => "Sell",
        }
    }
}

impl<'de> Deserialize<'de> for TradeSide {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        TradeSide::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("unknown trade type: {}", raw)))
    }
}

/// Returns, portfolio and trade series of one backtest scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestResults {
    pub returns: Vec<ReturnsPoint>,
    pub portfolio: Vec<PortfolioPoint>,
    pub trades: Vec<TradePoint>,
}

impl BacktestResults {
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty() && self.portfolio.is_empty() && self.trades.is_empty()
    }
}

pub fn normalize_ticker(raw: &str) -> Option<String> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        None
    } else {
        Some(ticker)
    }
}

pub fn normalize_stocks(stocks: &[String]) -> Result<Vec<String>, ValidationError> {
    if stocks.is_empty() || stocks.len() > MAX_STOCKS_PER_ENVIRONMENT {
        return Err(ValidationError::StockCount {
            count: stocks.len(),
            max: MAX_STOCKS_PER_ENVIRONMENT,
        });
    }
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(stocks.len());
    for raw in stocks {
        let ticker = normalize_ticker(raw).ok_or(ValidationError::EmptyTicker)?;
        if !seen.insert(ticker.clone()) {
            return Err(ValidationError::DuplicateTicker(ticker));
        }
        normalized.push(ticker);
    }
    Ok(normalized)
}

/// Decodes each stored strategy on its own so one record this client cannot
/// read does not hide the rest of the payload.
fn split_strategies(values: Vec<Value>, owner: &str, name: &str) -> (Vec<Strategy>, Vec<Value>) {
    let mut strategies = Vec::with_capacity(values.len());
    let mut unrecognized = Vec::new();
    for value in values {
        match Strategy::deserialize(&value) {
            Ok(strategy) => strategies.push(strategy),
            Err(err) => {
                warn!(
                    "Unrecognized strategy in {} {} kept as raw JSON: {} ({})",
                    owner, name, value, err
                );
                unrecognized.push(value);
            }
        }
    }
    (strategies, unrecognized)
}

fn check_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::DateRange { start, end });
    }
    Ok(())
}

/// Accepts `YYYY-MM-DD` as well as ISO timestamps such as
/// `2024-01-02T00:00:00`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let (date_part, rest) = match trimmed.char_indices().nth(10) {
        Some((split, _)) => trimmed.split_at(split),
        None => (trimmed, ""),
    };
    if !(rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ')) {
        return None;
    }
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

struct DateVisitor;

impl<'de> Visitor<'de> for DateVisitor {
    type Value = Option<NaiveDate>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a date string in YYYY-MM-DD format")
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(None)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(None)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DateVisitor)
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        parse_date(value)
            .map(Some)
            .ok_or_else(|| E::custom(format!("invalid date: {}", value)))
    }
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer
        .deserialize_any(DateVisitor)?
        .ok_or_else(|| de::Error::custom("date must not be null"))
}

fn deserialize_list_opt<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_date_opt<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_option(DateVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn tickers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn stock_count_must_be_between_one_and_ten() {
        let empty = NewEnvironment::new("Tech", vec![], date(2024, 1, 1), date(2024, 6, 1));
        assert_eq!(
            empty.unwrap_err(),
            ValidationError::StockCount { count: 0, max: 10 }
        );

        let eleven: Vec<String> = (0..11).map(|i| format!("T{}", i)).collect();
        let too_many = NewEnvironment::new("Tech", eleven, date(2024, 1, 1), date(2024, 6, 1));
        assert_eq!(
            too_many.unwrap_err(),
            ValidationError::StockCount { count: 11, max: 10 }
        );

        let ten: Vec<String> = (0..10).map(|i| format!("T{}", i)).collect();
        assert!(NewEnvironment::new("Tech", ten, date(2024, 1, 1), date(2024, 6, 1)).is_ok());
    }

    #[test]
    fn tickers_are_normalized_and_deduplicated() {
        let env = NewEnvironment::new(
            "  Tech ",
            tickers(&[" aapl", "MSFT "]),
            date(2024, 1, 1),
            date(2024, 1, 1),
        )
        .unwrap();
        assert_eq!(env.name, "Tech");
        assert_eq!(env.stocks, tickers(&["AAPL", "MSFT"]));

        let dup = NewEnvironment::new(
            "Tech",
            tickers(&["AAPL", "aapl"]),
            date(2024, 1, 1),
            date(2024, 6, 1),
        );
        assert_eq!(
            dup.unwrap_err(),
            ValidationError::DuplicateTicker("AAPL".into())
        );

        let blank = NewEnvironment::new(
            "Tech",
            tickers(&["AAPL", "  "]),
            date(2024, 1, 1),
            date(2024, 6, 1),
        );
        assert_eq!(blank.unwrap_err(), ValidationError::EmptyTicker);
    }

    #[test]
    fn rejects_inverted_dates_and_blank_names() {
        let inverted = NewEnvironment::new(
            "Tech",
            tickers(&["AAPL"]),
            date(2024, 6, 1),
            date(2024, 1, 1),
        );
        assert!(matches!(
            inverted.unwrap_err(),
            ValidationError::DateRange { .. }
        ));

        let blank = NewEnvironment::new(" ", tickers(&["AAPL"]), date(2024, 1, 1), date(2024, 6, 1));
        assert_eq!(
            blank.unwrap_err(),
            ValidationError::EmptyName("environment")
        );
    }

    #[test]
    fn new_environment_serializes_plain_dates() {
        let env = NewEnvironment::new(
            "Tech",
            tickers(&["AAPL", "MSFT"]),
            date(2024, 1, 1),
            date(2024, 6, 1),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({
                "name": "Tech",
                "stocks": ["AAPL", "MSFT"],
                "start_date": "2024-01-01",
                "end_date": "2024-06-01"
            })
        );
    }

    #[test]
    fn environment_tolerates_missing_optional_fields() {
        let env: Environment = serde_json::from_value(json!({
            "name": "test1",
            "stocks": ["AAPL", "GOOGL"],
            "simulations": [{
                "name": "momentum_strategy",
                "start_date": "2023-01-01",
                "end_date": "2023-12-31T00:00:00",
                "strategies": [
                    {"name": "momentum_1", "type": "ExampleStrategy", "days": 20, "n": 5}
                ]
            }]
        }))
        .unwrap();
        assert_eq!(env.start_date, None);
        assert!(env.strategies.is_empty());
        let simulation = env.simulation("momentum_strategy").unwrap();
        assert_eq!(simulation.end_date, date(2023, 12, 31));
        assert_eq!(simulation.strategies.len(), 1);
    }

    #[test]
    fn environment_accepts_null_dates() {
        let env: Environment = serde_json::from_value(json!({
            "name": "Tech",
            "stocks": ["AAPL"],
            "start_date": null,
            "end_date": "2024-06-01"
        }))
        .unwrap();
        assert_eq!(env.start_date, None);
        assert_eq!(env.end_date, Some(date(2024, 6, 1)));
    }

    #[test]
    fn unreadable_strategies_are_kept_aside() {
        let env: Environment = serde_json::from_value(json!({
            "name": "Edited",
            "stocks": ["AAPL"],
            "strategies": [
                {"name": "sma", "type": "SMAStrategy", "days": 10},
                {
                    "name": "rsi",
                    "type": "RSIStrategy",
                    "days": 14,
                    "percentage_change": 5,
                    "direction": "drop",
                    "position_type": "long"
                },
                {"name": "custom", "type": "MyStrategy"}
            ],
            "simulations": [{
                "name": "q1",
                "start_date": "2024-01-01",
                "end_date": "2024-03-31",
                "strategies": [{"name": "rsi", "type": "RSIStrategy", "days": 14}]
            }]
        }))
        .unwrap();
        assert_eq!(env.strategies.len(), 1);
        assert_eq!(env.strategies[0].name, "sma");
        assert_eq!(env.unrecognized_strategies.len(), 2);
        assert_eq!(env.unrecognized_strategies[1]["type"], "MyStrategy");

        let simulation = env.simulation("q1").unwrap();
        assert!(simulation.strategies.is_empty());
        assert_eq!(simulation.unrecognized_strategies.len(), 1);
    }

    #[test]
    fn null_lists_read_as_empty() {
        let env: Environment = serde_json::from_value(json!({
            "name": "Tech",
            "stocks": ["AAPL"],
            "strategies": null,
            "simulations": null
        }))
        .unwrap();
        assert!(env.strategies.is_empty());
        assert!(env.simulations.is_empty());
    }

    #[test]
    fn dates_allow_only_a_time_suffix() {
        assert_eq!(parse_date("2024-01-02"), Some(date(2024, 1, 2)));
        assert_eq!(parse_date(" 2024-01-02T09:30:00 "), Some(date(2024, 1, 2)));
        assert_eq!(parse_date("2024-01-02 09:30:00"), Some(date(2024, 1, 2)));
        assert_eq!(parse_date("2024-01-02junk"), None);
        assert_eq!(parse_date("2024-01-0"), None);
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn result_points_accept_server_variants() {
        let returns: Vec<ReturnsPoint> = serde_json::from_value(json!([
            {"date": "2024-01-02", "returns": 0.01},
            {"timestamp": "2024-01-03", "returns": -0.005}
        ]))
        .unwrap();
        assert_eq!(returns[1].date, date(2024, 1, 3));

        let trades: Vec<TradePoint> = serde_json::from_value(json!([
            {"date": "2024-01-02", "stock": "AAPL", "type": "Long", "cash": 900.0},
            {"date": "2024-01-03", "stock": "AAPL", "type": "sell", "cash": 1010.5}
        ]))
        .unwrap();
        assert_eq!(trades[0].side, TradeSide::Long);
        assert_eq!(trades[1].side, TradeSide::Sell);

        let bad: Result<Vec<TradePoint>, _> = serde_json::from_value(json!([
            {"date": "2024-01-02", "stock": "AAPL", "type": "hold", "cash": 1.0}
        ]));
        assert!(bad.is_err());
    }

    #[test]
    fn simulation_rejects_duplicate_strategy_names() {
        let simulation: Simulation = serde_json::from_value(json!({
            "name": "sim",
            "start_date": "2024-01-01",
            "end_date": "2024-02-01",
            "strategies": [
                {"name": "s", "type": "SMAStrategy", "days": 10},
                {"name": "s", "type": "VolumeMAStrategy", "days": 5}
            ]
        }))
        .unwrap();
        assert_eq!(
            simulation.validated().unwrap_err(),
            ValidationError::DuplicateStrategy("s".into())
        );
    }
}
