use serde_json::Value;

/// Convert a JSON scalar (or anything else) into a sanitized string.
///
/// Strings are taken verbatim, numbers and booleans use their JSON text, and
/// composite values are serialized. Control characters are stripped so the
/// result is safe to log or to place in a header.
pub fn value_to_string(value: Value) -> String {
    let raw = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    };
    raw.chars().filter(|c| !c.is_control()).collect()
}

#[cfg(test)]
mod tests {
    use super::value_to_string;
    use serde_json::json;

    #[test]
    fn test_value_to_string_variants() {
        assert_eq!(value_to_string(json!("abc")), "abc");
        assert_eq!(value_to_string(json!(17)), "17");
        assert_eq!(value_to_string(json!(true)), "true");
        assert_eq!(value_to_string(json!({"a": 1})), "{\"a\":1}");
        assert_eq!(value_to_string(json!("line\nbreak")), "linebreak");
    }
}
