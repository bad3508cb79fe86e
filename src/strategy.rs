use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const STRATEGY_TYPES: [&str; 6] = [
    "PercentageSMAStrategy",
    "RSIStrategy",
    "VolumeMAStrategy",
    "ExampleStrategy",
    "ExampleStrategy2",
    "SMAStrategy",
];

const STOP_LOSS_KEY: &str = "stop_loss_pct";
const TAKE_PROFIT_KEY: &str = "take_profit_pct";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    Long,
    Short,
}

impl PositionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "long" => Some(Self::Long),
            "short" => Some(Self::Short),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionType::Long => "long",
            PositionType::Short => "short",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Drop,
    Rise,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "drop" => Some(Self::Drop),
            "rise" => Some(Self::Rise),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Drop => "drop",
            Direction::Rise => "rise",
        }
    }
}

/// Type tag plus the parameters that type accepts. Serialized flat next to
/// the strategy name, with the tag in `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StrategyKind {
    #[serde(rename = "PercentageSMAStrategy")]
    PercentageSma {
        days: u32,
        percentage_change: f64,
        direction: Direction,
        position_type: PositionType,
    },
    #[serde(rename = "RSIStrategy")]
    Rsi {
        period: u32,
        rsi_threshold: f64,
        position_type: PositionType,
    },
    #[serde(rename = "VolumeMAStrategy")]
    VolumeMa { days: u32 },
    #[serde(rename = "ExampleStrategy")]
    Example { days: u32, n: u32 },
    #[serde(rename = "ExampleStrategy2")]
    Example2 { a: f64, b: f64 },
    #[serde(rename = "SMAStrategy")]
    Sma { days: u32 },
}

impl StrategyKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StrategyKind::PercentageSma { .. } => "PercentageSMAStrategy",
            StrategyKind::Rsi { .. } => "RSIStrategy",
            StrategyKind::VolumeMa { .. } => "VolumeMAStrategy",
            StrategyKind::Example { .. } => "ExampleStrategy",
            StrategyKind::Example2 { .. } => "ExampleStrategy2",
            StrategyKind::Sma { .. } => "SMAStrategy",
        }
    }

    /// Parameter names and rendered values, in form order.
    pub fn parameters(&self) -> Vec<(&'static str, String)> {
        match self {
            StrategyKind::PercentageSma {
                days,
                percentage_change,
                direction,
                position_type,
            } => vec![
                ("days", days.to_string()),
                ("percentage_change", percentage_change.to_string()),
                ("direction", direction.as_str().to_string()),
                ("position_type", position_type.as_str().to_string()),
            ],
            StrategyKind::Rsi {
                period,
                rsi_threshold,
                position_type,
            } => vec![
                ("period", period.to_string()),
                ("rsi_threshold", rsi_threshold.to_string()),
                ("position_type", position_type.as_str().to_string()),
            ],
            StrategyKind::VolumeMa { days } | StrategyKind::Sma { days } => {
                vec![("days", days.to_string())]
            }
            StrategyKind::Example { days, n } => {
                vec![("days", days.to_string()), ("n", n.to_string())]
            }
            StrategyKind::Example2 { a, b } => vec![("a", a.to_string()), ("b", b.to_string())],
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let type_name = self.type_name();
        match self {
            StrategyKind::PercentageSma {
                days,
                percentage_change,
                ..
            } => {
                check_count(type_name, "days", *days)?;
                if !percentage_change.is_finite() || *percentage_change <= 0.0 {
                    return Err(invalid(
                        type_name,
                        "percentage_change",
                        "must be a positive number",
                        percentage_change,
                    ));
                }
            }
            StrategyKind::Rsi {
                period,
                rsi_threshold,
                ..
            } => {
                check_count(type_name, "period", *period)?;
                if !rsi_threshold.is_finite() || !(0.0..=100.0).contains(rsi_threshold) {
                    return Err(invalid(
                        type_name,
                        "rsi_threshold",
                        "must be between 0 and 100",
                        rsi_threshold,
                    ));
                }
            }
            StrategyKind::VolumeMa { days } | StrategyKind::Sma { days } => {
                check_count(type_name, "days", *days)?;
            }
            StrategyKind::Example { days, n } => {
                check_count(type_name, "days", *days)?;
                check_count(type_name, "n", *n)?;
            }
            StrategyKind::Example2 { a, b } => {
                for (parameter, value) in [("a", a), ("b", b)] {
                    if !value.is_finite() || *value == 0.0 {
                        return Err(invalid(
                            type_name,
                            parameter,
                            "must be a non-zero number",
                            value,
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    #[serde(flatten)]
    pub kind: StrategyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit_pct: Option<f64>,
}

impl Strategy {
    pub fn new<S: Into<String>>(name: S, kind: StrategyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            stop_loss_pct: None,
            take_profit_pct: None,
        }
    }

    pub fn with_stop_loss(mut self, pct: f64) -> Self {
        self.stop_loss_pct = Some(pct);
        self
    }

    pub fn with_take_profit(mut self, pct: f64) -> Self {
        self.take_profit_pct = Some(pct);
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn validated(&self) -> Result<Self, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName("strategy"));
        }
        self.kind.validate()?;
        let type_name = self.kind.type_name();
        for (parameter, value) in [
            (STOP_LOSS_KEY, self.stop_loss_pct),
            (TAKE_PROFIT_KEY, self.take_profit_pct),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(invalid(
                        type_name,
                        parameter,
                        "must be a positive percentage",
                        &value,
                    ));
                }
            }
        }
        Ok(Self {
            name: name.to_string(),
            ..self.clone()
        })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params: Vec<String> = self
            .kind
            .parameters()
            .into_iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect();
        if let Some(pct) = self.stop_loss_pct {
            params.push(format!("{}: {}", STOP_LOSS_KEY, pct));
        }
        if let Some(pct) = self.take_profit_pct {
            params.push(format!("{}: {}", TAKE_PROFIT_KEY, pct));
        }
        write!(
            f,
            "{} ({}) {}",
            self.name,
            self.kind.type_name(),
            params.join(", ")
        )
    }
}

/// A strategy as entered by a user: a type name and loosely typed
/// parameters. Numbers may arrive as JSON numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub strategy_type: String,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, Value>,
}

impl StrategyDraft {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, strategy_type: T) -> Self {
        Self {
            name: name.into(),
            strategy_type: strategy_type.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn param<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn into_strategy(self) -> Result<Strategy, ValidationError> {
        let kind = create_strategy_kind(&self.strategy_type, &self.parameters)?;
        let type_name = kind.type_name();
        let strategy = Strategy {
            name: self.name,
            stop_loss_pct: optional_number(&self.parameters, type_name, STOP_LOSS_KEY)?,
            take_profit_pct: optional_number(&self.parameters, type_name, TAKE_PROFIT_KEY)?,
            kind,
        };
        strategy.validated()
    }
}

pub fn resolve_strategy_type(raw: &str) -> Option<&'static str> {
    let trimmed = raw.trim();
    STRATEGY_TYPES
        .iter()
        .copied()
        .find(|name| name.eq_ignore_ascii_case(trimmed))
}

pub fn create_strategy_kind(
    strategy_type: &str,
    params: &BTreeMap<String, Value>,
) -> Result<StrategyKind, ValidationError> {
    let type_name = resolve_strategy_type(strategy_type)
        .ok_or_else(|| ValidationError::UnknownStrategyType(strategy_type.trim().to_string()))?;

    let kind = match type_name {
        "PercentageSMAStrategy" => StrategyKind::PercentageSma {
            days: require_count(params, type_name, "days")?,
            percentage_change: require_number(params, type_name, "percentage_change")?,
            direction: require_choice(params, type_name, "direction", Direction::parse)?,
            position_type: require_choice(params, type_name, "position_type", PositionType::parse)?,
        },
        "RSIStrategy" => StrategyKind::Rsi {
            period: require_count(params, type_name, "period")?,
            rsi_threshold: require_number(params, type_name, "rsi_threshold")?,
            position_type: require_choice(params, type_name, "position_type", PositionType::parse)?,
        },
        "VolumeMAStrategy" => StrategyKind::VolumeMa {
            days: require_count(params, type_name, "days")?,
        },
        "ExampleStrategy" => StrategyKind::Example {
            days: require_count(params, type_name, "days")?,
            n: require_count(params, type_name, "n")?,
        },
        "ExampleStrategy2" => StrategyKind::Example2 {
            a: require_number(params, type_name, "a")?,
            b: require_number(params, type_name, "b")?,
        },
        _ => StrategyKind::Sma {
            days: require_count(params, type_name, "days")?,
        },
    };
    Ok(kind)
}

fn present<'a>(params: &'a BTreeMap<String, Value>, key: &str) -> Option<&'a Value> {
    match params.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => Some(value),
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn require_number(
    params: &BTreeMap<String, Value>,
    strategy_type: &'static str,
    key: &'static str,
) -> Result<f64, ValidationError> {
    let value = present(params, key).ok_or(ValidationError::MissingParameter {
        strategy_type,
        parameter: key,
    })?;
    match value_as_f64(value) {
        Some(number) if number.is_finite() => Ok(number),
        _ => Err(invalid(strategy_type, key, "must be a number", &render(value))),
    }
}

fn require_count(
    params: &BTreeMap<String, Value>,
    strategy_type: &'static str,
    key: &'static str,
) -> Result<u32, ValidationError> {
    let number = require_number(params, strategy_type, key)?;
    if number.fract() != 0.0 || number < 1.0 || number > u32::MAX as f64 {
        return Err(invalid(
            strategy_type,
            key,
            "must be a whole number of at least 1",
            &number,
        ));
    }
    Ok(number as u32)
}

fn require_choice<T>(
    params: &BTreeMap<String, Value>,
    strategy_type: &'static str,
    key: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, ValidationError> {
    let value = present(params, key).ok_or(ValidationError::MissingParameter {
        strategy_type,
        parameter: key,
    })?;
    value
        .as_str()
        .and_then(parse)
        .ok_or_else(|| invalid(strategy_type, key, "is not a recognised option", &render(value)))
}

fn optional_number(
    params: &BTreeMap<String, Value>,
    strategy_type: &'static str,
    key: &'static str,
) -> Result<Option<f64>, ValidationError> {
    if present(params, key).is_none() {
        return Ok(None);
    }
    require_number(params, strategy_type, key).map(Some)
}

fn check_count(
    strategy_type: &'static str,
    key: &'static str,
    value: u32,
) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(invalid(
            strategy_type,
            key,
            "must be a whole number of at least 1",
            &value,
        ));
    }
    Ok(())
}

fn invalid<V: fmt::Display + ?Sized>(
    strategy_type: &'static str,
    parameter: &'static str,
    reason: &'static str,
    value: &V,
) -> ValidationError {
    ValidationError::InvalidParameter {
        strategy_type,
        parameter,
        reason,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rsi_draft() -> StrategyDraft {
        StrategyDraft::new("rsi1", "RSIStrategy")
            .param("period", 14)
            .param("rsi_threshold", 30)
            .param("position_type", "long")
    }

    #[test]
    fn rsi_draft_builds_typed_strategy() {
        let strategy = rsi_draft().into_strategy().unwrap();
        assert_eq!(
            strategy.kind,
            StrategyKind::Rsi {
                period: 14,
                rsi_threshold: 30.0,
                position_type: PositionType::Long,
            }
        );
        assert_eq!(strategy.type_name(), "RSIStrategy");
    }

    #[test]
    fn rsi_draft_missing_threshold_is_rejected() {
        let mut draft = rsi_draft();
        draft.parameters.remove("rsi_threshold");
        let err = draft.into_strategy().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingParameter {
                strategy_type: "RSIStrategy",
                parameter: "rsi_threshold",
            }
        );
        assert_eq!(err.to_string(), "rsi_threshold is required for RSIStrategy");
    }

    #[test]
    fn rsi_threshold_must_be_a_percentage() {
        let err = rsi_draft()
            .param("rsi_threshold", 130)
            .into_strategy()
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidParameter {
                parameter: "rsi_threshold",
                ..
            }
        ));
    }

    #[test]
    fn numeric_strings_and_case_are_accepted() {
        let strategy = StrategyDraft::new("pct", "percentagesmastrategy")
            .param("days", "20")
            .param("percentage_change", "2.5")
            .param("direction", "Drop")
            .param("position_type", "SHORT")
            .param("stop_loss_pct", "5")
            .into_strategy()
            .unwrap();
        assert_eq!(
            strategy.kind,
            StrategyKind::PercentageSma {
                days: 20,
                percentage_change: 2.5,
                direction: Direction::Drop,
                position_type: PositionType::Short,
            }
        );
        assert_eq!(strategy.stop_loss_pct, Some(5.0));
        assert_eq!(strategy.take_profit_pct, None);
    }

    #[test]
    fn zero_and_fractional_counts_are_rejected() {
        let zero = StrategyDraft::new("sma", "SMAStrategy")
            .param("days", 0)
            .into_strategy();
        assert!(matches!(
            zero,
            Err(ValidationError::InvalidParameter {
                parameter: "days",
                ..
            })
        ));

        let fractional = StrategyDraft::new("ex", "ExampleStrategy")
            .param("days", 2.5)
            .param("n", 3)
            .into_strategy();
        assert!(fractional.is_err());

        let blank = StrategyDraft::new("ex", "ExampleStrategy")
            .param("days", 5)
            .param("n", "")
            .into_strategy();
        assert_eq!(
            blank.unwrap_err(),
            ValidationError::MissingParameter {
                strategy_type: "ExampleStrategy",
                parameter: "n",
            }
        );
    }

    #[test]
    fn unknown_types_and_bad_choices_are_rejected() {
        let unknown = StrategyDraft::new("d", "DIVIDENDS").into_strategy();
        assert_eq!(
            unknown.unwrap_err(),
            ValidationError::UnknownStrategyType("DIVIDENDS".into())
        );

        let bad_side = rsi_draft().param("position_type", "sideways").into_strategy();
        assert!(matches!(
            bad_side,
            Err(ValidationError::InvalidParameter {
                parameter: "position_type",
                ..
            })
        ));

        let bad_stop = rsi_draft().param("stop_loss_pct", -1).into_strategy();
        assert!(matches!(
            bad_stop,
            Err(ValidationError::InvalidParameter {
                parameter: "stop_loss_pct",
                ..
            })
        ));
    }

    #[test]
    fn wire_form_is_flat_with_type_tag() {
        let strategy = rsi_draft().into_strategy().unwrap().with_take_profit(10.0);
        assert_eq!(
            serde_json::to_value(&strategy).unwrap(),
            json!({
                "name": "rsi1",
                "type": "RSIStrategy",
                "period": 14,
                "rsi_threshold": 30.0,
                "position_type": "long",
                "take_profit_pct": 10.0
            })
        );

        let parsed: Strategy = serde_json::from_value(json!({
            "name": "mean_rev_2",
            "type": "ExampleStrategy2",
            "a": 0.3,
            "b": 1.5
        }))
        .unwrap();
        assert_eq!(parsed.kind, StrategyKind::Example2 { a: 0.3, b: 1.5 });
        assert_eq!(parsed.stop_loss_pct, None);
    }

    #[test]
    fn display_lists_parameters() {
        let strategy = rsi_draft().into_strategy().unwrap();
        assert_eq!(
            strategy.to_string(),
            "rsi1 (RSIStrategy) period: 14, rsi_threshold: 30, position_type: long"
        );
    }

    #[test]
    fn typed_strategies_are_validated_too() {
        let strategy = Strategy::new("  ", StrategyKind::Sma { days: 5 });
        assert_eq!(
            strategy.validated().unwrap_err(),
            ValidationError::EmptyName("strategy")
        );
        let strategy = Strategy::new("vol", StrategyKind::VolumeMa { days: 0 });
        assert!(strategy.validated().is_err());
    }
}
