/// Tool parameter validation
///
/// Each tool declares a [`ParamSchema`]: the parameters it accepts, their
/// kinds, and which are required. Validation copies only declared, non-null
/// keys, coerces them per kind and rejects anything out of range. The
/// name-keyed [`validate`] function derives a schema from well-known
/// parameter names for call sites that don't declare one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::dates;
use crate::domain::{AnalyticsError, Platform};

/// String tokens that read as `true` for flag parameters
pub const TRUTHY_TOKENS: &[&str] = &["true", "1", "yes", "on"];

/// Ceiling for `limit`
pub const MAX_LIMIT: i64 = 10_000;

/// Ceiling for `top_n`
pub const MAX_TOP_N: i64 = 100;

/// Case-insensitive check against [`TRUTHY_TOKENS`]; surrounding
/// whitespace makes a value falsy
pub fn is_truthy(value: &str) -> bool {
    TRUTHY_TOKENS.iter().any(|token| token.eq_ignore_ascii_case(value))
}

/// How a parameter is checked and coerced
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Positive integer; digit strings are coerced
    Count { max: Option<i64> },
    /// `YYYY-MM-DD` string
    Date,
    /// Non-empty string, trimmed
    Identifier,
    /// One of the recorded platform names
    Platform,
    /// Boolean, or a string mapped through [`TRUTHY_TOKENS`]
    Flag,
    /// Any string
    Text,
    /// Number within optional bounds; numeric strings are coerced
    Number { min: Option<f64>, max: Option<f64> },
    /// One of a fixed set of strings
    Choice(&'static [&'static str]),
    /// Passed through unchanged
    Any,
}

impl ParamKind {
    /// Kind conventionally implied by a parameter name
    pub fn for_name(name: &str) -> Self {
        match name {
            "limit" => ParamKind::Count { max: Some(MAX_LIMIT) },
            "top_n" => ParamKind::Count { max: Some(MAX_TOP_N) },
            "days" | "months" | "hours" => ParamKind::Count { max: None },
            "start_date" | "end_date" | "date" | "log_date" => ParamKind::Date,
            "user" | "user_id" | "application_name" | "app_name" => ParamKind::Identifier,
            "platform" => ParamKind::Platform,
            "legacy_app" | "enable_tracking" => ParamKind::Flag,
            _ => ParamKind::Any,
        }
    }

    /// Check one non-null value, returning its coerced form
    fn check(&self, name: &str, value: &Value) -> Result<Value, AnalyticsError> {
        match self {
            ParamKind::Count { max } => {
                let count = match value {
                    Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                        s.parse::<i64>().ok()
                    }
                    Value::Number(n) => n.as_i64(),
                    _ => None,
                };

                let count = count
                    .filter(|n| *n > 0)
                    .ok_or_else(|| AnalyticsError::invalid(name, "must be a positive integer"))?;

                if let Some(max) = max {
                    if count > *max {
                        return Err(AnalyticsError::invalid(
                            name,
                            format!("{} cannot exceed {}", name, max),
                        ));
                    }
                }

                Ok(Value::from(count))
            }
            ParamKind::Date => {
                let text = value
                    .as_str()
                    .ok_or_else(|| AnalyticsError::invalid(name, "must be a string"))?;
                dates::parse_date(text)?;
                Ok(value.clone())
            }
            ParamKind::Identifier => match value.as_str().map(str::trim) {
                Some(trimmed) if !trimmed.is_empty() => Ok(Value::String(trimmed.to_string())),
                _ => Err(AnalyticsError::invalid(name, "must be a non-empty string")),
            },
            ParamKind::Platform => {
                let text = value.as_str().unwrap_or_default();
                let platform: Platform = text.parse()?;
                Ok(Value::String(platform.as_str().to_string()))
            }
            ParamKind::Flag => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) => Ok(Value::Bool(is_truthy(s))),
                _ => Err(AnalyticsError::invalid(name, "must be a boolean")),
            },
            ParamKind::Text => match value {
                Value::String(_) => Ok(value.clone()),
                _ => Err(AnalyticsError::invalid(name, "must be a string")),
            },
            ParamKind::Number { min, max } => {
                let number = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                }
                .filter(|n| n.is_finite())
                .ok_or_else(|| AnalyticsError::invalid(name, "must be a number"))?;

                if let Some(min) = min {
                    if number < *min {
                        return Err(AnalyticsError::invalid(name, format!("must be at least {}", min)));
                    }
                }
                if let Some(max) = max {
                    if number > *max {
                        return Err(AnalyticsError::invalid(name, format!("must be at most {}", max)));
                    }
                }

                Ok(value_from_number(number))
            }
            ParamKind::Choice(options) => match value.as_str() {
                Some(choice) if options.contains(&choice) => Ok(value.clone()),
                _ => Err(AnalyticsError::invalid(
                    name,
                    format!("must be one of: {}", options.join(", ")),
                )),
            },
            ParamKind::Any => Ok(value.clone()),
        }
    }
}

/// Keep whole numbers integral so typed getters and serde see integers
fn value_from_number(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        Value::from(number)
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamField {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
}

/// The declared parameters of one tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    fields: Vec<ParamField>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema whose kinds come from [`ParamKind::for_name`]
    pub fn from_names(required: &[&str], optional: &[&str]) -> Self {
        let schema = required
            .iter()
            .fold(Self::new(), |schema, name| schema.required(name, ParamKind::for_name(name)));
        optional
            .iter()
            .fold(schema, |schema, name| schema.optional(name, ParamKind::for_name(name)))
    }

    pub fn required(mut self, name: &str, kind: ParamKind) -> Self {
        self.fields.push(ParamField {
            name: name.to_string(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &str, kind: ParamKind) -> Self {
        self.fields.push(ParamField {
            name: name.to_string(),
            kind,
            required: false,
        });
        self
    }

    pub fn fields(&self) -> &[ParamField] {
        &self.fields
    }

    /// Validate raw input against this schema
    pub fn validate(&self, raw: &Map<String, Value>) -> Result<ValidatedParams, AnalyticsError> {
        for field in self.fields.iter().filter(|f| f.required) {
            if raw.get(&field.name).map_or(true, Value::is_null) {
                return Err(AnalyticsError::MissingParameter(field.name.clone()));
            }
        }

        let mut values = Map::new();
        for field in &self.fields {
            let value = match raw.get(&field.name) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            values.insert(field.name.clone(), field.kind.check(&field.name, value)?);
        }

        let params = ValidatedParams { values };
        params.check_date_order()?;
        Ok(params)
    }
}

/// Validate `raw` using the conventional kind of each named parameter
pub fn validate(
    raw: &Map<String, Value>,
    required: &[&str],
    optional: &[&str],
) -> Result<ValidatedParams, AnalyticsError> {
    ParamSchema::from_names(required, optional).validate(raw)
}

/// Checked and coerced parameters for one tool call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedParams {
    values: Map<String, Value>,
}

impl ValidatedParams {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deserialize into a typed parameter struct
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, AnalyticsError> {
        serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| AnalyticsError::invalid("params", e.to_string()))
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    /// `start_date` must not come after `end_date` when both are given
    fn check_date_order(&self) -> Result<(), AnalyticsError> {
        if let (Some(start), Some(end)) = (self.str("start_date"), self.str("end_date")) {
            if dates::parse_date(start)? > dates::parse_date(end)? {
                return Err(AnalyticsError::InvalidRange {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        Ok(())
    }
}
