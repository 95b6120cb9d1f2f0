//! JSON conversion for expression values.
//!
//! Output is produced by a small printer so that every value kind renders
//! deterministically (map keys sorted, instances as objects of their fields).
//! Input goes through `serde_json`: a parsed document becomes the root object of
//! an evaluation.
//!
//! # Examples
//!
//! ```
//! use mace_lang::Value;
//! use mace_lang::output::{from_json_str, to_json, to_json_pretty};
//!
//! let value = from_json_str(r#"{"b": [1, 2.5], "a": "x"}"#).unwrap();
//! assert_eq!(to_json(&value), r#"{"a":"x","b":[1,2.5]}"#);
//! assert_eq!(to_json_pretty(&Value::Integer(42)), "42");
//! ```

use std::collections::HashMap;

use rust_decimal::prelude::FromPrimitive;

use crate::value::Value;

pub struct JsonPrinter {
    pretty: bool,
}

impl JsonPrinter {
    pub fn new(pretty: bool) -> Self {
        JsonPrinter { pretty }
    }

    pub fn print(&self, value: &Value) -> String {
        self.print_value(value, 0)
    }

    fn print_value(&self, value: &Value, indent: usize) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Long(n) => n.to_string(),
            Value::Double(n) if n.is_finite() => format!("{n:?}"),
            Value::Double(_) => "null".to_string(),
            Value::Decimal(d) => d.normalize().to_string(),
            Value::Char(c) => self.quote(&c.to_string()),
            Value::String(s) => self.quote(s),
            Value::List(items) | Value::Array(items) => self.print_array(&items.read(), indent),
            Value::Map(map) => self.print_object(&map.read(), indent),
            Value::Object(instance) => self.print_object(&instance.fields.read(), indent),
            Value::Type(ty) => self.quote(ty.name()),
            Value::Function(function) => self.quote(&format!("def {}", function.name)),
            Value::Proto(proto) => self.quote(&format!("proto {}", proto.name)),
        }
    }

    fn print_array(&self, arr: &[Value], indent: usize) -> String {
        if arr.is_empty() {
            return "[]".to_string();
        }

        if self.pretty {
            let items: Vec<String> = arr
                .iter()
                .map(|v| format!("{}{}", self.indent(indent + 1), self.print_value(v, indent + 1)))
                .collect();
            format!("[\n{}\n{}]", items.join(",\n"), self.indent(indent))
        } else {
            let items: Vec<String> = arr.iter().map(|v| self.print_value(v, indent)).collect();
            format!("[{}]", items.join(","))
        }
    }

    fn print_object(&self, obj: &HashMap<String, Value>, indent: usize) -> String {
        if obj.is_empty() {
            return "{}".to_string();
        }

        // sorted for deterministic output
        let mut entries: Vec<_> = obj.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        if self.pretty {
            let items: Vec<String> = entries
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}{}: {}",
                        self.indent(indent + 1),
                        self.quote(k),
                        self.print_value(v, indent + 1)
                    )
                })
                .collect();
            format!("{{\n{}\n{}}}", items.join(",\n"), self.indent(indent))
        } else {
            let items: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}:{}", self.quote(k), self.print_value(v, indent)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }

    fn indent(&self, level: usize) -> String {
        "  ".repeat(level)
    }

    fn quote(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('"');
        for c in s.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        }
        out.push('"');
        out
    }
}

/// Compact JSON, keys sorted.
pub fn to_json(value: &Value) -> String {
    JsonPrinter::new(false).print(value)
}

/// JSON with 2-space indentation, keys sorted.
pub fn to_json_pretty(value: &Value) -> String {
    JsonPrinter::new(true).print(value)
}

/// Convert a parsed JSON document. Integers that fit 32 bits become `Integer`,
/// wider ones `Long`; arrays become growable lists.
pub fn from_json(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map_or(Value::Long(i), Value::Integer)
            } else if let Some(f) = n.as_f64() {
                Value::Double(f)
            } else {
                n.as_u64()
                    .and_then(rust_decimal::Decimal::from_u64)
                    .map_or(Value::Null, Value::Decimal)
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::list(arr.into_iter().map(from_json).collect()),
        serde_json::Value::Object(obj) => {
            Value::map(obj.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

/// Parse `json` and convert it with [`from_json`].
pub fn from_json_str(json: &str) -> Result<Value, serde_json::Error> {
    Ok(from_json(serde_json::from_str(json)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pretty_nested() {
        let value = from_json_str(r#"{"items": [1, {"k": null}], "n": 3000000000}"#).unwrap();
        let expected = "{\n  \"items\": [\n    1,\n    {\n      \"k\": null\n    }\n  ],\n  \"n\": 3000000000\n}";
        assert_eq!(to_json_pretty(&value), expected);
    }

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(to_json(&Value::Double(2.0)), "2.0");
        assert_eq!(to_json(&Value::Double(f64::NAN)), "null");
        assert_eq!(to_json(&Value::Char('a')), "\"a\"");
        assert_eq!(to_json(&Value::from("a\"b\n")), r#""a\"b\n""#);
    }

    #[test]
    fn test_wide_integers_become_long() {
        assert_eq!(from_json_str("3000000000").unwrap(), Value::Long(3_000_000_000));
        assert_eq!(from_json_str("7").unwrap(), Value::Integer(7));
    }
}
