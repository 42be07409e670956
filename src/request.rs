//! Prediction request parsing and validation.
//!
//! The wire format is a flat JSON object keyed by Korean field names. Every
//! field is mandatory; absent and `null` fields are reported together.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use thiserror::Error;

pub const REGION_KEY: &str = "광역자치단체";
pub const SUB_REGION_KEY: &str = "기초자치단체 시/군/구";
pub const SUB_SUB_REGION_KEY: &str = "읍/면/동";
pub const START_DATE_KEY: &str = "축제 시작일";
pub const FESTIVAL_TYPE_KEY: &str = "축제 종류";
pub const BUDGET_KEY: &str = "예산";

/// Required request keys, in the order missing ones are reported.
pub const REQUIRED_KEYS: [&str; 6] = [
    REGION_KEY,
    SUB_REGION_KEY,
    SUB_SUB_REGION_KEY,
    START_DATE_KEY,
    FESTIVAL_TYPE_KEY,
    BUDGET_KEY,
];

/// Reasons a request is rejected before any computation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("유효하지 않은 JSON 입력입니다: {0}")]
    InvalidJson(String),
    #[error("요청 본문은 JSON 객체여야 합니다.")]
    NotAnObject,
    #[error("필수 입력값이 누락되었습니다: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("{0} 값은 문자열이어야 합니다.")]
    NotAString(&'static str),
    #[error("예산은 숫자 형태여야 합니다.")]
    InvalidBudget,
    #[error("예산은 0 이상의 유한한 숫자여야 합니다.")]
    BudgetOutOfRange,
    #[error("축제 시작일 형식이 올바르지 않습니다 (YYYY-MM-DD): {0}")]
    InvalidDate(String),
}

/// Free-text festival type as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FestivalType {
    Text(String),
    /// Any non-string JSON value
    NonText,
}

/// A validated prediction request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub region: String,
    pub sub_region: String,
    pub sub_sub_region: String,
    pub start_date: NaiveDate,
    pub festival_type: FestivalType,
    /// Budget in millions of won
    pub budget: f64,
}

impl PredictionRequest {
    /// Parse and validate a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
        Self::from_json(&value)
    }

    /// Validate an already-parsed JSON value.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;

        let missing: Vec<&'static str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| object.get(*key).is_none_or(Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let region = required_string(object, REGION_KEY)?;
        let sub_region = required_string(object, SUB_REGION_KEY)?;
        let sub_sub_region = required_string(object, SUB_SUB_REGION_KEY)?;
        let start_date = parse_date(&required_string(object, START_DATE_KEY)?)?;

        let festival_type = match &object[FESTIVAL_TYPE_KEY] {
            Value::String(s) => FestivalType::Text(s.clone()),
            _ => FestivalType::NonText,
        };

        let budget = parse_budget(&object[BUDGET_KEY])?;

        Ok(Self {
            region,
            sub_region,
            sub_sub_region,
            start_date,
            festival_type,
            budget,
        })
    }
}

fn required_string(
    object: &Map<String, Value>,
    key: &'static str,
) -> Result<String, ValidationError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ValidationError::NotAString(key))
}

/// Accept a JSON number or a numeric string; the result must be finite and >= 0.
pub fn parse_budget(value: &Value) -> Result<f64, ValidationError> {
    let budget = match value {
        Value::Number(n) => n.as_f64().ok_or(ValidationError::InvalidBudget)?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::InvalidBudget)?,
        _ => return Err(ValidationError::InvalidBudget),
    };

    if !budget.is_finite() || budget < 0.0 {
        return Err(ValidationError::BudgetOutOfRange);
    }

    Ok(budget)
}

/// Parse a start date; timestamps contribute their date part.
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(timestamp.date());
        }
    }

    Err(ValidationError::InvalidDate(input.to_string()))
}
