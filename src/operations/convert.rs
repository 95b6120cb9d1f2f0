use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::ast::Ty;
use crate::error::RuntimeError;
use crate::value::Value;

fn fail(value: &Value, ty: &Ty) -> RuntimeError {
    RuntimeError::Coercion {
        expected: ty.name().to_string(),
        actual: value.type_name().to_string(),
    }
}

/// Convert a value for a cast, a typed declaration or a typed parameter.
pub fn coerce(value: &Value, ty: &Ty) -> Result<Value, RuntimeError> {
    if value.is_null() || *ty == Ty::Object {
        return Ok(value.clone());
    }
    let converted = match (ty, value) {
        (Ty::Boolean, Value::Boolean(_)) => Some(value.clone()),
        (Ty::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Boolean(true)),
            "false" => Some(Value::Boolean(false)),
            _ => None,
        },
        (Ty::Boolean, v) if v.is_numeric() => Some(Value::Boolean(v.is_truthy())),

        (Ty::Char, Value::Char(_)) => Some(value.clone()),
        (Ty::Char, Value::String(s)) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Value::Char(c)),
                _ => None,
            }
        }
        (Ty::Char, Value::Integer(n)) => u32::try_from(*n).ok().and_then(char::from_u32).map(Value::Char),

        (Ty::Integer, Value::String(s)) => s.trim().parse::<i32>().ok().map(Value::Integer),
        (Ty::Integer, v) => truncate(v).map(|n| Value::Integer(n as i32)),
        (Ty::Long, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::Long),
        (Ty::Long, v) => truncate(v).map(Value::Long),
        (Ty::Double, Value::String(s)) => s.trim().parse::<f64>().ok().map(Value::Double),
        (Ty::Double, v) => v.as_f64().map(Value::Double),
        (Ty::Decimal, Value::String(s)) => s.trim().parse::<Decimal>().ok().map(Value::Decimal),
        (Ty::Decimal, v) => v.as_decimal().map(Value::Decimal),

        (Ty::String, v) => Some(Value::String(v.as_string())),

        (Ty::List, Value::List(_)) | (Ty::Array, Value::Array(_)) | (Ty::Map, Value::Map(_)) => {
            Some(value.clone())
        }
        (Ty::List, Value::Array(items)) => Some(Value::list(items.read().clone())),
        (Ty::Array, Value::List(items)) => Some(Value::array(items.read().clone())),

        (Ty::Class, Value::Type(_) | Value::Proto(_)) => Some(value.clone()),
        (Ty::Function, Value::Function(_)) => Some(value.clone()),
        (Ty::Proto(name), Value::Object(obj)) if obj.proto.name == *name => Some(value.clone()),
        _ => None,
    };
    converted.ok_or_else(|| fail(value, ty))
}

/// Integral part of a numeric or character value.
fn truncate(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(n) => Some(i64::from(*n)),
        Value::Long(n) => Some(*n),
        Value::Double(n) if n.is_finite() => Some(n.trunc() as i64),
        Value::Decimal(d) => d.trunc().to_i64(),
        Value::Char(c) => Some(i64::from(u32::from(*c))),
        _ => None,
    }
}

pub fn can_convert(value: &Value, ty: &Ty) -> bool {
    coerce(value, ty).is_ok()
}

/// Coercion that loses no information (`long x = 5`, `double d = 1`).
pub fn coerce_lossless(value: &Value, ty: &Ty) -> Option<Value> {
    let converted = coerce(value, ty).ok()?;
    let same_kind = value.is_numeric() == converted.is_numeric();
    (same_kind && converted == *value).then_some(converted)
}

/// Whether `value` is an instance of `ty`.
pub fn is_instance(value: &Value, ty: &Ty) -> bool {
    match value.ty() {
        None => false,
        Some(_) if *ty == Ty::Object => true,
        Some(actual) => actual == *ty,
    }
}
