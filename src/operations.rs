//! Reduction of a single `(operator, lhs, rhs)` triple.
//!
//! Shared by compile-time folding and run-time evaluation; short-circuit and
//! ternary handling live in the resolver, not here.

pub mod convert;
pub mod numeric;
pub mod text;

use std::cmp::Ordering;

use crate::ast::{Op, Ty};
use crate::error::ReduceError;
use crate::value::Value;

pub use convert::{can_convert, coerce, coerce_lossless, is_instance};

fn mismatch(op: Op, left: &Value, right: &Value) -> ReduceError {
    ReduceError::TypeMismatch {
        op,
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    }
}

/// Apply `op` to two already-evaluated operands.
pub fn reduce(op: Op, left: &Value, right: &Value, decimal: bool) -> Result<Value, ReduceError> {
    match op {
        Op::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", left.as_string(), right.as_string())))
            }
            (Value::Char(a), Value::Char(b)) => Ok(Value::String(format!("{a}{b}"))),
            _ => numeric::arithmetic_op(op, left, right, decimal),
        },
        Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Pow => {
            numeric::arithmetic_op(op, left, right, decimal)
        }

        Op::Eq => Ok(Value::Boolean(left == right)),
        Op::Ne => Ok(Value::Boolean(left != right)),
        Op::Lt | Op::Gt | Op::Le | Op::Ge => {
            let ordering = order(left, right).ok_or_else(|| mismatch(op, left, right))?;
            Ok(Value::Boolean(match op {
                Op::Lt => ordering == Ordering::Less,
                Op::Gt => ordering == Ordering::Greater,
                Op::Le => ordering != Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }

        Op::And | Op::Or => match (left, right) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(if op == Op::And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => Err(mismatch(op, left, right)),
        },

        Op::BitAnd | Op::BitOr | Op::BitXor | Op::Shl | Op::Shr | Op::UShr | Op::UShl => {
            numeric::bitwise_op(op, left, right)
        }

        Op::StrAppend => Ok(Value::String(format!(
            "{}{}",
            left.as_string(),
            right.as_string()
        ))),

        Op::Regex => match (left, right) {
            (Value::Null, _) => Ok(Value::Boolean(false)),
            (_, Value::String(pattern)) => {
                let re = text::full_match_regex(pattern)?;
                Ok(Value::Boolean(re.is_match(&left.as_string())))
            }
            _ => Err(mismatch(op, left, right)),
        },

        Op::InstanceOf => {
            let ty = type_operand(right).ok_or_else(|| mismatch(op, left, right))?;
            Ok(Value::Boolean(is_instance(left, &ty)))
        }
        Op::ConvertableTo => {
            let ty = type_operand(right).ok_or_else(|| mismatch(op, left, right))?;
            Ok(Value::Boolean(can_convert(left, &ty)))
        }

        Op::Contains => contains(left, right)
            .map(Value::Boolean)
            .ok_or_else(|| mismatch(op, left, right)),

        Op::Soundex => match (left, right) {
            (Value::String(a), Value::String(b)) => {
                Ok(Value::Boolean(text::soundex(a) == text::soundex(b)))
            }
            _ => Err(mismatch(op, left, right)),
        },
        Op::Similarity => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::Double(text::similarity(a, b))),
            _ => Err(mismatch(op, left, right)),
        },

        Op::Ternary | Op::TernaryElse | Op::Projection => Err(mismatch(op, left, right)),
    }
}

/// Ordering used by the relational operators.
pub fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        (Value::Char(a), Value::String(b)) => Some(a.to_string().as_str().cmp(b.as_str())),
        (Value::String(a), Value::Char(b)) => Some(a.as_str().cmp(b.to_string().as_str())),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        _ => numeric::compare(left, right),
    }
}

fn type_operand(value: &Value) -> Option<Ty> {
    match value {
        Value::Type(ty) => Some(ty.clone()),
        Value::Proto(proto) => Some(Ty::Proto(proto.name.clone())),
        _ => None,
    }
}

/// Membership over the container's runtime shape.
pub fn contains(container: &Value, item: &Value) -> Option<bool> {
    match container {
        Value::Null => Some(false),
        Value::String(s) => Some(s.contains(item.as_string().as_str())),
        Value::List(items) | Value::Array(items) => Some(items.read().contains(item)),
        Value::Map(map) => Some(map.read().contains_key(&item.as_string())),
        _ => None,
    }
}
