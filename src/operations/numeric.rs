//! Arithmetic with automatic promotion.
//!
//! Integral results overflow from `Integer` to `Long` to `Decimal`. Mixed operands
//! promote to the wider of `Integer < Long < Double`; a `Decimal` operand makes the
//! result `Decimal`.

use std::cmp::Ordering;

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::ast::Op;
use crate::error::ReduceError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Integer,
    Long,
    Double,
    Decimal,
}

fn rank(v: &Value) -> Option<Rank> {
    match v {
        Value::Integer(_) => Some(Rank::Integer),
        Value::Long(_) => Some(Rank::Long),
        Value::Double(_) => Some(Rank::Double),
        Value::Decimal(_) => Some(Rank::Decimal),
        _ => None,
    }
}

fn mismatch(op: Op, left: &Value, right: &Value) -> ReduceError {
    ReduceError::TypeMismatch {
        op,
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    }
}

fn arithmetic(op: Op, message: &str) -> ReduceError {
    ReduceError::Arithmetic {
        op,
        message: message.to_string(),
    }
}

/// `+ - * / % **` over two numeric values.
pub fn arithmetic_op(op: Op, left: &Value, right: &Value, decimal: bool) -> Result<Value, ReduceError> {
    let (Some(a), Some(b)) = (rank(left), rank(right)) else {
        return Err(mismatch(op, left, right));
    };
    if op == Op::Pow {
        return power(left, right, decimal);
    }
    match a.max(b) {
        Rank::Integer | Rank::Long => {
            let (Some(x), Some(y)) = (left.as_i64(), right.as_i64()) else {
                return Err(mismatch(op, left, right));
            };
            integral(op, x, y, a.max(b) == Rank::Integer, decimal)
        }
        Rank::Double if !decimal => {
            let (Some(x), Some(y)) = (left.as_f64(), right.as_f64()) else {
                return Err(mismatch(op, left, right));
            };
            floating(op, x, y)
        }
        Rank::Double | Rank::Decimal => {
            let (Some(x), Some(y)) = (left.as_decimal(), right.as_decimal()) else {
                return Err(mismatch(op, left, right));
            };
            decimal_op(op, x, y).map(Value::Decimal)
        }
    }
}

/// Narrowest integral value holding `n`.
fn narrow(n: i64, as_int: bool) -> Value {
    match i32::try_from(n) {
        Ok(small) if as_int => Value::Integer(small),
        _ => Value::Long(n),
    }
}

fn integral(op: Op, x: i64, y: i64, as_int: bool, decimal: bool) -> Result<Value, ReduceError> {
    let checked = match op {
        Op::Add => x.checked_add(y),
        Op::Sub => x.checked_sub(y),
        Op::Mul => x.checked_mul(y),
        Op::Div => {
            if y == 0 {
                return Err(arithmetic(op, "division by zero"));
            }
            if x.checked_rem(y).unwrap_or(0) != 0 {
                if decimal {
                    return decimal_op(op, Decimal::from(x), Decimal::from(y)).map(Value::Decimal);
                }
                return Ok(Value::Double(x as f64 / y as f64));
            }
            x.checked_div(y)
        }
        Op::Mod => {
            if y == 0 {
                return Err(arithmetic(op, "modulo by zero"));
            }
            x.checked_rem(y)
        }
        _ => return Err(arithmetic(op, "not an arithmetic operator")),
    };
    match checked {
        // i32 results that left the i32 range promote to Long via narrow()
        Some(n) => Ok(narrow(n, as_int)),
        None => decimal_op(op, Decimal::from(x), Decimal::from(y)).map(Value::Decimal),
    }
}

fn floating(op: Op, x: f64, y: f64) -> Result<Value, ReduceError> {
    let result = match op {
        Op::Add => x + y,
        Op::Sub => x - y,
        Op::Mul => x * y,
        Op::Div => {
            if y == 0.0 {
                return Err(arithmetic(op, "division by zero"));
            }
            x / y
        }
        Op::Mod => {
            if y == 0.0 {
                return Err(arithmetic(op, "modulo by zero"));
            }
            x % y
        }
        _ => return Err(arithmetic(op, "not an arithmetic operator")),
    };
    Ok(Value::Double(result))
}

fn decimal_op(op: Op, x: Decimal, y: Decimal) -> Result<Decimal, ReduceError> {
    let result = match op {
        Op::Add => x.checked_add(y),
        Op::Sub => x.checked_sub(y),
        Op::Mul => x.checked_mul(y),
        Op::Div => {
            if y.is_zero() {
                return Err(arithmetic(op, "division by zero"));
            }
            x.checked_div(y)
        }
        Op::Mod => {
            if y.is_zero() {
                return Err(arithmetic(op, "modulo by zero"));
            }
            x.checked_rem(y)
        }
        _ => return Err(arithmetic(op, "not an arithmetic operator")),
    };
    result
        .map(|d| d.normalize())
        .ok_or_else(|| arithmetic(op, "numeric overflow"))
}

fn power(left: &Value, right: &Value, decimal: bool) -> Result<Value, ReduceError> {
    let integral_base = matches!(left, Value::Integer(_) | Value::Long(_));
    if integral_base {
        if let (Some(base), Some(exp)) = (left.as_i64(), right.as_i64()) {
            if let Ok(exp) = u32::try_from(exp) {
                if let Some(n) = base.checked_pow(exp) {
                    let as_int = matches!((left, right), (Value::Integer(_), Value::Integer(_)));
                    return Ok(narrow(n, as_int));
                }
            }
        }
    }
    let (Some(base), Some(exp)) = (left.as_f64(), right.as_f64()) else {
        return Err(mismatch(Op::Pow, left, right));
    };
    let result = base.powf(exp);
    let decimal_result = decimal || matches!(left, Value::Decimal(_)) || matches!(right, Value::Decimal(_));
    if decimal_result {
        if let Some(d) = Decimal::from_f64(result) {
            return Ok(Value::Decimal(d.normalize()));
        }
    }
    Ok(Value::Double(result))
}

/// Ordering of two numeric values; `None` when either is not numeric or NaN.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    let (a, b) = (rank(left)?, rank(right)?);
    match a.max(b) {
        Rank::Integer | Rank::Long => Some(left.as_i64()?.cmp(&right.as_i64()?)),
        Rank::Double => left.as_f64()?.partial_cmp(&right.as_f64()?),
        Rank::Decimal => Some(left.as_decimal()?.cmp(&right.as_decimal()?)),
    }
}

/// Coerce an operand of a bitwise operator to a 32-bit signed integer.
pub fn to_i32(v: &Value) -> Option<i32> {
    match v {
        Value::Integer(n) => Some(*n),
        Value::Long(n) => Some(*n as i32),
        Value::Char(c) => i32::try_from(u32::from(*c)).ok(),
        Value::Double(_) | Value::Decimal(_) => v.as_i64().map(|n| n as i32),
        _ => None,
    }
}

/// Bitwise and shift operators; booleans are accepted by `& | ^`.
pub fn bitwise_op(op: Op, left: &Value, right: &Value) -> Result<Value, ReduceError> {
    if let (Value::Boolean(a), Value::Boolean(b)) = (left, right) {
        return match op {
            Op::BitAnd => Ok(Value::Boolean(a & b)),
            Op::BitOr => Ok(Value::Boolean(a | b)),
            Op::BitXor => Ok(Value::Boolean(a ^ b)),
            _ => Err(mismatch(op, left, right)),
        };
    }
    let (Some(a), Some(b)) = (to_i32(left), to_i32(right)) else {
        return Err(mismatch(op, left, right));
    };
    let shift = (b & 31) as u32;
    let result = match op {
        Op::BitAnd => a & b,
        Op::BitOr => a | b,
        Op::BitXor => a ^ b,
        Op::Shl => a.wrapping_shl(shift),
        Op::Shr => a.wrapping_shr(shift),
        Op::UShr => ((a as u32) >> shift) as i32,
        // sign of the left operand is cleared before shifting
        Op::UShl => a.wrapping_abs().wrapping_shl(shift),
        _ => return Err(mismatch(op, left, right)),
    };
    Ok(Value::Integer(result))
}

/// Arithmetic negation (`-x`).
pub fn negate(v: &Value) -> Option<Value> {
    Some(match v {
        Value::Integer(n) => match n.checked_neg() {
            Some(n) => Value::Integer(n),
            None => Value::Long(-i64::from(*n)),
        },
        Value::Long(n) => match n.checked_neg() {
            Some(n) => Value::Long(n),
            None => Value::Decimal(-Decimal::from(*n)),
        },
        Value::Double(n) => Value::Double(-n),
        Value::Decimal(d) => Value::Decimal(-d),
        _ => return None,
    })
}

/// Parse an integral literal into the narrowest of `Integer`, `Long`, `Decimal`.
pub fn integral_literal(digits: &str, radix: u32) -> Option<Value> {
    if let Ok(n) = i64::from_str_radix(digits, radix) {
        return Some(narrow(n, true));
    }
    if radix == 10 {
        return digits.parse::<Decimal>().ok().map(Value::Decimal);
    }
    None
}

pub(crate) fn decimal_to_value(d: Decimal) -> Value {
    if d.is_integer() {
        if let Some(n) = d.to_i64() {
            return narrow(n, true);
        }
    }
    Value::Decimal(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_overflow_promotes() {
        let r = arithmetic_op(Op::Add, &Value::Integer(i32::MAX), &Value::Integer(1), false);
        assert_eq!(r, Ok(Value::Long(i64::from(i32::MAX) + 1)));

        let r = arithmetic_op(Op::Mul, &Value::Long(i64::MAX), &Value::Integer(2), false).unwrap();
        assert!(matches!(r, Value::Decimal(_)));
    }

    #[test]
    fn test_inexact_division() {
        assert_eq!(
            arithmetic_op(Op::Div, &Value::Integer(7), &Value::Integer(2), false),
            Ok(Value::Double(3.5))
        );
        assert_eq!(
            arithmetic_op(Op::Div, &Value::Integer(7), &Value::Integer(2), true),
            Ok(Value::Decimal(Decimal::new(35, 1)))
        );
        assert_eq!(
            arithmetic_op(Op::Div, &Value::Integer(6), &Value::Integer(2), false),
            Ok(Value::Integer(3))
        );
    }

    #[test]
    fn test_division_by_zero_is_error() {
        for (l, r) in [
            (Value::Integer(1), Value::Integer(0)),
            (Value::Double(1.0), Value::Double(0.0)),
            (Value::Decimal(Decimal::ONE), Value::Decimal(Decimal::ZERO)),
        ] {
            assert!(matches!(
                arithmetic_op(Op::Div, &l, &r, false),
                Err(ReduceError::Arithmetic { .. })
            ));
        }
    }

    #[test]
    fn test_unsigned_left_shift_clears_sign() {
        assert_eq!(
            bitwise_op(Op::UShl, &Value::Integer(-2), &Value::Integer(0)),
            Ok(Value::Integer(2))
        );
        assert_eq!(
            bitwise_op(Op::UShr, &Value::Integer(-1), &Value::Integer(28)),
            Ok(Value::Integer(15))
        );
    }

    #[test]
    fn test_power() {
        assert_eq!(
            arithmetic_op(Op::Pow, &Value::Integer(2), &Value::Integer(10), false),
            Ok(Value::Integer(1024))
        );
        assert_eq!(
            arithmetic_op(Op::Pow, &Value::Integer(2), &Value::Integer(-1), false),
            Ok(Value::Double(0.5))
        );
    }

    #[test]
    fn test_literal_widths() {
        assert_eq!(integral_literal("42", 10), Some(Value::Integer(42)));
        assert_eq!(integral_literal("3000000000", 10), Some(Value::Long(3_000_000_000)));
        assert!(matches!(
            integral_literal("99999999999999999999", 10),
            Some(Value::Decimal(_))
        ));
        assert_eq!(integral_literal("ff", 16), Some(Value::Integer(255)));
    }
}
