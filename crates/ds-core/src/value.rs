use serde::{Deserialize, Serialize};

/// The value model crossing the expression-evaluator boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DsValue {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl DsValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    /// Rendering used by text interpolation. Floats that carry no fractional
    /// part print without a decimal point.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Unit => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => {
                if value.fract().abs() < f64::EPSILON {
                    (*value as i64).to_string()
                } else {
                    value.to_string()
                }
            }
            Self::String(value) => value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_string_flattens_whole_floats() {
        assert_eq!(DsValue::Float(2.0).to_display_string(), "2");
        assert_eq!(DsValue::Float(2.5).to_display_string(), "2.5");
        assert_eq!(DsValue::Int(7).to_display_string(), "7");
        assert_eq!(DsValue::Unit.to_display_string(), "");
    }

    #[test]
    fn accessors_match_variants() {
        assert_eq!(DsValue::Bool(true).as_bool(), Some(true));
        assert_eq!(DsValue::Int(3).as_number(), Some(3.0));
        assert_eq!(DsValue::Float(1.5).as_number(), Some(1.5));
        assert_eq!(DsValue::String("a".to_string()).as_string(), Some("a"));
        assert_eq!(DsValue::String("a".to_string()).as_bool(), None);
    }
}
