use serde_json::{Number, Value};

/// Placeholder shown for values that cannot be rendered as text.
pub const PLACEHOLDER: &str = "--";

/// A value as stored at a database path.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Objects, arrays and binary payloads.
    Unsupported,
}

impl RemoteValue {
    /// Decodes a wire payload. JSON is tried first; any other UTF-8 payload
    /// is taken as a plain string. An empty payload is a deleted value.
    pub fn decode(payload: &[u8]) -> Self {
        if payload.is_empty() {
            return Self::Null;
        }

        match serde_json::from_slice::<Value>(payload) {
            Ok(value) => Self::from_json(value),
            Err(_) => match std::str::from_utf8(payload) {
                Ok(text) => Self::Text(text.to_string()),
                Err(_) => Self::Unsupported,
            },
        }
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => Self::from_number(&number),
            Value::String(text) => Self::Text(text),
            Value::Array(_) | Value::Object(_) => Self::Unsupported,
        }
    }

    fn from_number(number: &Number) -> Self {
        if let Some(integer) = number.as_i64() {
            Self::Integer(integer)
        } else if number.is_u64() {
            // Beyond i64; the literal digits are still the right rendering.
            Self::Text(number.to_string())
        } else {
            number.as_f64().map_or(Self::Unsupported, Self::Float)
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null | Self::Unsupported => Value::Null,
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Integer(integer) => Value::from(*integer),
            Self::Float(float) => Number::from_f64(*float).map_or(Value::Null, Value::Number),
            Self::Text(text) => Value::String(text.clone()),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }

    /// Display text for a sensor reading: floats to one decimal place,
    /// integers verbatim, strings unchanged, everything else the placeholder.
    pub fn display_text(&self) -> String {
        match self {
            // Half away from zero; `{:.1}` alone rounds ties to even.
            Self::Float(float) => format!("{:.1}", (float * 10.0).round() / 10.0),
            Self::Integer(integer) => integer.to_string(),
            Self::Text(text) => text.clone(),
            Self::Null | Self::Bool(_) | Self::Unsupported => PLACEHOLDER.to_string(),
        }
    }

    /// LED interpretation: only a boolean `true` switches it on.
    pub fn as_switch(&self) -> bool {
        matches!(self, Self::Bool(true))
    }
}

impl From<bool> for RemoteValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for RemoteValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for RemoteValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for RemoteValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
