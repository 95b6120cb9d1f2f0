//! Builtin instance methods of strings, collections, maps and numbers.

use std::collections::HashMap;

use crate::ast::Ty;
use crate::error::AccessError;
use crate::operations::coerce;
use crate::operations::text::full_match_regex;
use crate::value::{ListRef, MapRef, Value};

pub(super) fn no_method(name: &str, target: &Value) -> AccessError {
    AccessError::NoSuchMethod {
        method: name.to_string(),
        type_name: target.type_name().to_string(),
    }
}

pub(super) fn invalid(method: &str, message: impl Into<String>) -> AccessError {
    AccessError::InvalidArguments {
        method: method.to_string(),
        message: message.into(),
    }
}

fn int_arg(method: &str, value: &Value) -> Result<i64, AccessError> {
    value
        .as_i64()
        .ok_or_else(|| invalid(method, format!("expected an integer, got {}", value.type_name())))
}

fn str_arg<'v>(method: &str, value: &'v Value) -> Result<&'v str, AccessError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(invalid(
            method,
            format!("expected a String, got {}", value.type_name()),
        )),
    }
}

fn count(n: usize) -> Value {
    Value::Integer(i32::try_from(n).unwrap_or(i32::MAX))
}

/// Position of `item` in `items`, or -1.
fn position(items: &[Value], item: &Value) -> Value {
    items
        .iter()
        .position(|v| v == item)
        .and_then(|i| i32::try_from(i).ok())
        .map_or(Value::Integer(-1), Value::Integer)
}

/// Call a builtin method on a non-null, non-type value.
pub(super) fn call(target: &Value, name: &str, args: &[Value]) -> Result<Value, AccessError> {
    match (name, args) {
        ("toString", []) => return Ok(Value::String(target.as_string())),
        ("equals", [other]) => return Ok(Value::Boolean(target == other)),
        ("getClass", []) => return Ok(target.ty().map(Value::Type).unwrap_or(Value::Null)),
        _ => {}
    }
    match target {
        Value::String(s) => string_method(target, s, name, args),
        Value::List(items) => list_method(target, items, name, args, true),
        Value::Array(items) => list_method(target, items, name, args, false),
        Value::Map(map) => map_method(target, map, name, args),
        Value::Integer(_) | Value::Long(_) | Value::Double(_) | Value::Decimal(_) => {
            number_method(target, name, args)
        }
        _ => Err(no_method(name, target)),
    }
}

fn char_range(s: &str, method: &str, start: i64, end: i64) -> Result<String, AccessError> {
    let len = s.chars().count();
    let (Ok(start), Ok(end)) = (usize::try_from(start), usize::try_from(end)) else {
        return Err(invalid(method, "negative index"));
    };
    if start > end || end > len {
        return Err(AccessError::IndexOutOfBounds {
            index: i64::try_from(end.max(start)).unwrap_or(i64::MAX),
            len,
        });
    }
    Ok(s.chars().skip(start).take(end - start).collect())
}

fn string_method(target: &Value, s: &str, name: &str, args: &[Value]) -> Result<Value, AccessError> {
    let value = match (name, args) {
        ("length", []) => count(s.chars().count()),
        ("isEmpty", []) => Value::Boolean(s.is_empty()),
        ("trim", []) => Value::String(s.trim().to_string()),
        ("toUpperCase", []) => Value::String(s.to_uppercase()),
        ("toLowerCase", []) => Value::String(s.to_lowercase()),
        ("charAt", [index]) => {
            let i = int_arg(name, index)?;
            usize::try_from(i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(Value::Char)
                .ok_or(AccessError::IndexOutOfBounds {
                    index: i,
                    len: s.chars().count(),
                })?
        }
        ("substring", [start]) => {
            let start = int_arg(name, start)?;
            let len = i64::try_from(s.chars().count()).unwrap_or(i64::MAX);
            Value::String(char_range(s, name, start, len)?)
        }
        ("substring", [start, end]) => {
            Value::String(char_range(s, name, int_arg(name, start)?, int_arg(name, end)?)?)
        }
        ("indexOf", [needle]) => {
            let needle = needle.as_string();
            match s.find(&needle) {
                Some(byte) => count(s[..byte].chars().count()),
                None => Value::Integer(-1),
            }
        }
        ("contains", [needle]) => Value::Boolean(s.contains(&needle.as_string())),
        ("startsWith", [prefix]) => Value::Boolean(s.starts_with(str_arg(name, prefix)?)),
        ("endsWith", [suffix]) => Value::Boolean(s.ends_with(str_arg(name, suffix)?)),
        ("concat", [other]) => Value::String(format!("{s}{}", other.as_string())),
        ("replace", [from, to]) => Value::String(s.replace(&from.as_string(), &to.as_string())),
        ("matches", [pattern]) => {
            let regex = full_match_regex(str_arg(name, pattern)?)
                .map_err(|e| invalid(name, e.to_string()))?;
            Value::Boolean(regex.is_match(s))
        }
        ("split", [separator]) => {
            let regex = regex::Regex::new(str_arg(name, separator)?)
                .map_err(|e| invalid(name, e.to_string()))?;
            let mut parts: Vec<Value> = regex.split(s).map(Value::from).collect();
            while parts.last().is_some_and(|p| *p == Value::from("")) {
                parts.pop();
            }
            Value::array(parts)
        }
        _ => return Err(no_method(name, target)),
    };
    Ok(value)
}

fn list_method(
    target: &Value,
    items: &ListRef,
    name: &str,
    args: &[Value],
    growable: bool,
) -> Result<Value, AccessError> {
    let read_only = || AccessError::ReadOnly {
        type_name: target.type_name().to_string(),
    };
    let value = match (name, args) {
        ("size" | "length", []) => count(items.read().len()),
        ("isEmpty", []) => Value::Boolean(items.read().is_empty()),
        ("contains", [item]) => Value::Boolean(items.read().contains(item)),
        ("indexOf", [item]) => position(&items.read(), item),
        ("get", [index]) => {
            let items = items.read();
            let i = int_arg(name, index)?;
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or(AccessError::IndexOutOfBounds {
                    index: i,
                    len: items.len(),
                })?
        }
        ("set", [index, value]) => {
            let mut items = items.write();
            let i = int_arg(name, index)?;
            let len = items.len();
            let slot = usize::try_from(i)
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or(AccessError::IndexOutOfBounds { index: i, len })?;
            std::mem::replace(slot, value.clone())
        }
        ("add", [item]) if growable => {
            items.write().push(item.clone());
            Value::Boolean(true)
        }
        ("add", [index, item]) if growable => {
            let mut items = items.write();
            let i = int_arg(name, index)?;
            let len = items.len();
            let i = usize::try_from(i)
                .ok()
                .filter(|i| *i <= len)
                .ok_or(AccessError::IndexOutOfBounds { index: i, len })?;
            items.insert(i, item.clone());
            Value::Null
        }
        // an integer argument removes by position, anything else by value
        ("remove", [Value::Integer(i)]) if growable => {
            let mut items = items.write();
            let len = items.len();
            let i = usize::try_from(*i)
                .ok()
                .filter(|i| *i < len)
                .ok_or(AccessError::IndexOutOfBounds {
                    index: i64::from(*i),
                    len,
                })?;
            items.remove(i)
        }
        ("remove", [item]) if growable => {
            let mut items = items.write();
            match items.iter().position(|v| v == item) {
                Some(i) => {
                    items.remove(i);
                    Value::Boolean(true)
                }
                None => Value::Boolean(false),
            }
        }
        ("clear", []) if growable => {
            items.write().clear();
            Value::Null
        }
        ("add" | "remove" | "clear", _) if !growable => return Err(read_only()),
        _ => return Err(no_method(name, target)),
    };
    Ok(value)
}

/// Keys of a map in sorted order.
fn sorted_keys(map: &HashMap<String, Value>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

fn map_method(target: &Value, map: &MapRef, name: &str, args: &[Value]) -> Result<Value, AccessError> {
    let value = match (name, args) {
        ("size", []) => count(map.read().len()),
        ("isEmpty", []) => Value::Boolean(map.read().is_empty()),
        ("containsKey", [key]) => Value::Boolean(map.read().contains_key(&key.as_string())),
        ("containsValue", [value]) => Value::Boolean(map.read().values().any(|v| v == value)),
        ("get", [key]) => map.read().get(&key.as_string()).cloned().unwrap_or(Value::Null),
        ("put", [key, value]) => map
            .write()
            .insert(key.as_string(), value.clone())
            .unwrap_or(Value::Null),
        ("remove", [key]) => map.write().remove(&key.as_string()).unwrap_or(Value::Null),
        ("clear", []) => {
            map.write().clear();
            Value::Null
        }
        ("keySet", []) => {
            Value::list(sorted_keys(&map.read()).into_iter().map(Value::String).collect())
        }
        ("values", []) => {
            let map = map.read();
            Value::list(sorted_keys(&map).iter().filter_map(|k| map.get(k).cloned()).collect())
        }
        _ => return Err(no_method(name, target)),
    };
    Ok(value)
}

fn number_method(target: &Value, name: &str, args: &[Value]) -> Result<Value, AccessError> {
    let ty = match (name, args) {
        ("intValue", []) => Ty::Integer,
        ("longValue", []) => Ty::Long,
        ("doubleValue" | "floatValue", []) => Ty::Double,
        _ => return Err(no_method(name, target)),
    };
    coerce(target, &ty).map_err(|e| invalid(name, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_on(target: &Value, name: &str, args: &[Value]) -> Value {
        call(target, name, args).unwrap()
    }

    #[test]
    fn test_string_methods() {
        let s = Value::from("Hello, World");
        assert_eq!(call_on(&s, "length", &[]), Value::Integer(12));
        assert_eq!(call_on(&s, "charAt", &[Value::Integer(4)]), Value::Char('o'));
        assert_eq!(
            call_on(&s, "substring", &[Value::Integer(7), Value::Integer(12)]),
            Value::from("World")
        );
        assert_eq!(call_on(&s, "indexOf", &[Value::from("World")]), Value::Integer(7));
        assert_eq!(call_on(&s, "toUpperCase", &[]), Value::from("HELLO, WORLD"));
        assert_eq!(call_on(&s, "matches", &[Value::from("H.*d")]), Value::Boolean(true));
        assert_eq!(call_on(&s, "matches", &[Value::from("World")]), Value::Boolean(false));
    }

    #[test]
    fn test_split_drops_trailing_empties() {
        let s = Value::from("a,b,,");
        let parts = call_on(&s, "split", &[Value::from(",")]);
        assert_eq!(parts, Value::array(vec![Value::from("a"), Value::from("b")]));
    }

    #[test]
    fn test_list_methods() {
        let list = Value::list(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(call_on(&list, "add", &[Value::Integer(3)]), Value::Boolean(true));
        assert_eq!(call_on(&list, "size", &[]), Value::Integer(3));
        assert_eq!(call_on(&list, "remove", &[Value::Integer(0)]), Value::Integer(1));
        assert_eq!(call_on(&list, "indexOf", &[Value::Integer(3)]), Value::Integer(1));

        let array = Value::array(vec![Value::Integer(1)]);
        assert!(matches!(
            call(&array, "add", &[Value::Integer(2)]),
            Err(AccessError::ReadOnly { .. })
        ));
    }

    #[test]
    fn test_map_methods() {
        let map = Value::empty_map();
        assert_eq!(call_on(&map, "put", &[Value::from("b"), Value::Integer(2)]), Value::Null);
        call_on(&map, "put", &[Value::from("a"), Value::Integer(1)]);
        assert_eq!(
            call_on(&map, "keySet", &[]),
            Value::list(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(call_on(&map, "remove", &[Value::from("a")]), Value::Integer(1));
        assert_eq!(call_on(&map, "containsKey", &[Value::from("a")]), Value::Boolean(false));
    }

    #[test]
    fn test_unknown_method() {
        assert_eq!(
            call(&Value::Integer(1), "frobnicate", &[]),
            Err(AccessError::NoSuchMethod {
                method: "frobnicate".to_string(),
                type_name: "Integer".to_string()
            })
        );
    }
}
