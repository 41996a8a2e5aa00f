use serde_json::Value;

pub enum NullableValue {
    Omitted,
    Null,
    String(String),
}

pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::String(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

pub fn required_string(optional_value: Option<&Value>) -> Result<Option<String>, String> {
    match optional_value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.to_owned())),
        Some(other) => Err(format!("expected string, got {other}")),
    }
}

pub fn required_bool(optional_value: Option<&Value>) -> Result<Option<bool>, String> {
    match optional_value {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(format!("expected boolean, got {other}")),
    }
}
