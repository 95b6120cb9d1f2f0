//! Static fields and methods of the builtin types (`Math.PI`, `Integer.parseInt`).

use std::cmp::Ordering;

use super::methods::invalid;
use crate::ast::Ty;
use crate::error::AccessError;
use crate::operations::{coerce, numeric, order};
use crate::value::Value;

fn no_field(ty: &Ty, name: &str) -> AccessError {
    AccessError::NoSuchProperty {
        property: name.to_string(),
        type_name: ty.name().to_string(),
    }
}

pub(super) fn field(ty: &Ty, name: &str) -> Result<Value, AccessError> {
    let value = match (ty, name) {
        (_, "class") => Value::Type(ty.clone()),
        (Ty::Math, "PI") => Value::Double(std::f64::consts::PI),
        (Ty::Math, "E") => Value::Double(std::f64::consts::E),
        (Ty::Integer, "MAX_VALUE") => Value::Integer(i32::MAX),
        (Ty::Integer, "MIN_VALUE") => Value::Integer(i32::MIN),
        (Ty::Long, "MAX_VALUE") => Value::Long(i64::MAX),
        (Ty::Long, "MIN_VALUE") => Value::Long(i64::MIN),
        _ => return Err(no_field(ty, name)),
    };
    Ok(value)
}

fn number(method: &str, value: &Value) -> Result<f64, AccessError> {
    value
        .as_f64()
        .ok_or_else(|| invalid(method, format!("expected a number, got {}", value.type_name())))
}

fn convert(method: &str, value: &Value, ty: &Ty) -> Result<Value, AccessError> {
    coerce(value, ty).map_err(|e| invalid(method, e.to_string()))
}

fn math(name: &str, args: &[Value]) -> Result<Value, AccessError> {
    let value = match (name, args) {
        ("abs", [n]) if n.is_numeric() => {
            if n.as_f64().is_some_and(|f| f < 0.0) {
                numeric::negate(n).ok_or_else(|| invalid(name, "overflow"))?
            } else {
                n.clone()
            }
        }
        ("max" | "min", [a, b]) => {
            let ordering = order(a, b)
                .filter(|_| a.is_numeric() && b.is_numeric())
                .ok_or_else(|| invalid(name, "expected two numbers"))?;
            let first = (ordering == Ordering::Greater) == (name == "max");
            if first { a.clone() } else { b.clone() }
        }
        ("pow", [a, b]) => Value::Double(number(name, a)?.powf(number(name, b)?)),
        ("sqrt", [n]) => Value::Double(number(name, n)?.sqrt()),
        ("floor", [n]) => Value::Double(number(name, n)?.floor()),
        ("ceil", [n]) => Value::Double(number(name, n)?.ceil()),
        ("round", [n]) => Value::Long((number(name, n)? + 0.5).floor() as i64),
        ("abs" | "max" | "min" | "pow" | "sqrt" | "floor" | "ceil" | "round", _) => {
            return Err(invalid(name, format!("unexpected arguments ({})", args.len())));
        }
        _ => return Err(no_method(name)),
    };
    Ok(value)
}

fn no_method(name: &str) -> AccessError {
    AccessError::NoSuchMethod {
        method: name.to_string(),
        type_name: Ty::Math.name().to_string(),
    }
}

pub(super) fn call(ty: &Ty, name: &str, args: &[Value]) -> Result<Value, AccessError> {
    match (ty, name, args) {
        (Ty::Math, _, _) => math(name, args),
        (Ty::Integer, "parseInt" | "valueOf", [value]) => convert(name, value, &Ty::Integer),
        (Ty::Long, "parseLong" | "valueOf", [value]) => convert(name, value, &Ty::Long),
        (Ty::Double, "parseDouble" | "valueOf", [value]) => convert(name, value, &Ty::Double),
        (Ty::Boolean, "parseBoolean" | "valueOf", [value]) => convert(name, value, &Ty::Boolean),
        (Ty::String, "valueOf", [value]) => Ok(Value::String(value.as_string())),
        _ => Err(AccessError::NoSuchMethod {
            method: name.to_string(),
            type_name: ty.name().to_string(),
        }),
    }
}
