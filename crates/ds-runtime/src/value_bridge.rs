use ds_core::{DialogueScriptError, DsValue};
use rhai::{Dynamic, ImmutableString, FLOAT, INT};

pub(crate) fn value_to_dynamic(value: &DsValue) -> Dynamic {
    match value {
        DsValue::Unit => Dynamic::UNIT,
        DsValue::Bool(value) => Dynamic::from_bool(*value),
        DsValue::Int(value) => Dynamic::from_int(*value as INT),
        DsValue::Float(value) => Dynamic::from_float(*value as FLOAT),
        DsValue::String(value) => Dynamic::from(value.clone()),
    }
}

pub(crate) fn dynamic_to_value(value: Dynamic) -> Result<DsValue, DialogueScriptError> {
    if value.is::<()>() {
        return Ok(DsValue::Unit);
    }
    if value.is::<bool>() {
        return Ok(DsValue::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(DsValue::Int(value.cast::<INT>()));
    }
    if value.is::<FLOAT>() {
        return Ok(DsValue::Float(value.cast::<FLOAT>()));
    }
    if value.is::<ImmutableString>() {
        return Ok(DsValue::String(value.cast::<ImmutableString>().to_string()));
    }

    Err(DialogueScriptError::new(
        "EVAL_VALUE_UNSUPPORTED",
        format!("Unsupported evaluator value of type {}.", value.type_name()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalar_values() {
        for value in [
            DsValue::Unit,
            DsValue::Bool(true),
            DsValue::Int(42),
            DsValue::Float(2.5),
            DsValue::String("hi".to_string()),
        ] {
            let dynamic = value_to_dynamic(&value);
            let back = dynamic_to_value(dynamic).expect("scalar should convert back");
            assert_eq!(back, value);
        }
    }

    #[test]
    fn unsupported_dynamic_types_are_rejected() {
        let array = Dynamic::from_array(rhai::Array::new());
        let error = dynamic_to_value(array).expect_err("arrays should be rejected");
        assert_eq!(error.code, "EVAL_VALUE_UNSUPPORTED");
    }
}
