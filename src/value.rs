use serde_json::{Number, Value};

const RELATIVE_TOLERANCE: f64 = 1e-9;
const ABSOLUTE_TOLERANCE: f64 = 1e-12;

/// Compares a submission value against an expected value
///
/// Integers compare exactly. As soon as one side is a float, both sides are
/// compared as floats with a small relative tolerance. Strings, booleans and
/// `null` compare strictly, arrays element-wise in order, objects key-wise.
/// Values of different kinds are never equal, so `3` does not equal `"3"`.
pub fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        (a, b) => a == b,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => {
            let diff = (x - y).abs();
            diff <= ABSOLUTE_TOLERANCE || diff <= RELATIVE_TOLERANCE * x.abs().max(y.abs())
        }
        _ => false,
    }
}

/// Renders a value the way a learner writing Python expects to read it
///
/// Top-level strings are printed bare; nested strings are quoted.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => display_nested(other),
    }
}

/// Renders a call argument: strings are always quoted
pub fn display_argument(value: &Value) -> String {
    display_nested(value)
}

fn display_nested(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{s}'"),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(display_nested).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{k}': {}", display_nested(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integers_compare_exactly() {
        assert!(values_equal(&json!(3), &json!(3)));
        assert!(!values_equal(&json!(3), &json!(4)));
        assert!(values_equal(&json!(u64::MAX), &json!(u64::MAX)));
    }

    #[test]
    fn test_floats_use_tolerance() {
        assert!(values_equal(&json!(0.1 + 0.2), &json!(0.3)));
        assert!(values_equal(&json!(2), &json!(2.0)));
        assert!(!values_equal(&json!(0.3), &json!(0.31)));
    }

    #[test]
    fn test_kinds_never_mix() {
        assert!(!values_equal(&json!(3), &json!("3")));
        assert!(!values_equal(&json!(null), &json!(0)));
        assert!(!values_equal(&json!([1]), &json!(1)));
    }

    #[test]
    fn test_sequences_are_order_sensitive() {
        assert!(values_equal(&json!([1, 2, 3]), &json!([1, 2, 3.0])));
        assert!(!values_equal(&json!([1, 2, 3]), &json!([3, 2, 1])));
        assert!(!values_equal(&json!([1, 2]), &json!([1, 2, 3])));
    }

    #[test]
    fn test_objects_compare_by_key() {
        assert!(values_equal(&json!({"a": 1, "b": [2]}), &json!({"b": [2], "a": 1})));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_python_style_display() {
        assert_eq!(display_value(&json!("10")), "10");
        assert_eq!(display_argument(&json!("abc")), "'abc'");
        assert_eq!(display_value(&json!([1, "a", null, true])), "[1, 'a', None, True]");
    }
}
