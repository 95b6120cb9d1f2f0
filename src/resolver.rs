//! Precedence resolution shared by literal folding and evaluation.
//!
//! A resolver pulls `(operator, operand)` pairs from an [`OperandSource`] and
//! reduces them on an [`ExecutionStack`]. Before an operator is pushed, every
//! pending operator that binds at least as tightly is reduced, which gives
//! precedence and left-associativity (`a == b == c` is `(a == b) == c`).
//!
//! `&&`, `||` and `?:` never evaluate the operands they do not need: the source
//! is asked to skip them without evaluation.

use crate::ast::Op;
use crate::error::ReduceError;
use crate::stack::ExecutionStack;
use crate::value::Value;

/// What the source will yield next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookahead {
    Operator(Op),
    Operand,
    /// Statement boundary or end of input
    End,
}

/// A stream of operators and operands for one statement.
pub trait OperandSource {
    type Error: From<ReduceError>;

    fn peek(&mut self) -> Result<Lookahead, Self::Error>;

    /// Move past the next element without evaluating it.
    fn advance(&mut self) -> Result<(), Self::Error>;

    /// Evaluate and consume the next operand. `after` is the operator that
    /// introduced it.
    fn next_operand(&mut self, after: Op) -> Result<Value, Self::Error>;

    /// Whether integral arithmetic promotes to exact decimals.
    fn decimal(&self) -> bool;
}

/// Reduce a statement whose first operand has already been evaluated.
pub fn resolve<S: OperandSource>(source: &mut S, first: Value) -> Result<Value, S::Error> {
    let decimal = source.decimal();
    let mut stack = ExecutionStack::with_value(first);

    loop {
        let op = match source.peek()? {
            Lookahead::Operator(op) => op,
            Lookahead::Operand | Lookahead::End => break,
        };
        match op {
            // belongs to an enclosing `?`
            Op::TernaryElse => break,
            Op::Ternary => {
                source.advance()?;
                let condition = stack.reduce_all(decimal)?;
                let Value::Boolean(condition) = condition else {
                    return Err(ReduceError::Condition {
                        op,
                        actual: condition.type_name().to_string(),
                    }
                    .into());
                };
                if condition {
                    let first = source.next_operand(op)?;
                    let value = resolve(source, first)?;
                    if source.peek()? != Lookahead::Operator(Op::TernaryElse) {
                        return Err(ReduceError::Incomplete { op }.into());
                    }
                    source.advance()?;
                    skip_else_branch(source)?;
                    stack.reset(value);
                } else {
                    skip_then_branch(source)?;
                    let value = source.next_operand(Op::TernaryElse)?;
                    stack.reset(value);
                }
            }
            Op::And | Op::Or => {
                source.advance()?;
                stack.reduce_while(op.precedence(), decimal)?;
                let left = match stack.top_value() {
                    Some(Value::Boolean(b)) => *b,
                    Some(other) => {
                        return Err(ReduceError::Condition {
                            op,
                            actual: other.type_name().to_string(),
                        }
                        .into());
                    }
                    None => return Err(ReduceError::Incomplete { op }.into()),
                };
                if (op == Op::And && !left) || (op == Op::Or && left) {
                    skip_short_circuit(source, op)?;
                } else {
                    stack.push_op(op);
                    let right = source.next_operand(op)?;
                    stack.push_value(right);
                }
            }
            _ => {
                source.advance()?;
                stack.reduce_while(op.precedence(), decimal)?;
                stack.push_op(op);
                let right = source.next_operand(op)?;
                stack.push_value(right);
            }
        }
    }

    Ok(stack.reduce_all(decimal)?)
}

/// Skip the unneeded right side of `&&`/`||`.
///
/// A false `&&` skips to the next `||`, `?` or `:`; a true `||` skips to the next
/// `?` or `:`. Either stops at the end of the statement.
fn skip_short_circuit<S: OperandSource>(source: &mut S, op: Op) -> Result<(), S::Error> {
    loop {
        match source.peek()? {
            Lookahead::End => return Ok(()),
            Lookahead::Operator(Op::Ternary | Op::TernaryElse) => return Ok(()),
            Lookahead::Operator(Op::Or) if op == Op::And => return Ok(()),
            Lookahead::Operator(_) | Lookahead::Operand => source.advance()?,
        }
    }
}

/// Skip a then-branch up to and including its matching `:`.
fn skip_then_branch<S: OperandSource>(source: &mut S) -> Result<(), S::Error> {
    let mut depth = 0usize;
    loop {
        match source.peek()? {
            Lookahead::End => return Err(ReduceError::Incomplete { op: Op::Ternary }.into()),
            Lookahead::Operator(Op::Ternary) => depth += 1,
            Lookahead::Operator(Op::TernaryElse) if depth == 0 => return source.advance(),
            Lookahead::Operator(Op::TernaryElse) => depth -= 1,
            Lookahead::Operator(_) | Lookahead::Operand => {}
        }
        source.advance()?;
    }
}

/// Skip an else-branch, stopping before a `:` owned by an enclosing ternary.
fn skip_else_branch<S: OperandSource>(source: &mut S) -> Result<(), S::Error> {
    let mut depth = 0usize;
    loop {
        match source.peek()? {
            Lookahead::End => return Ok(()),
            Lookahead::Operator(Op::TernaryElse) if depth == 0 => return Ok(()),
            Lookahead::Operator(Op::TernaryElse) => depth -= 1,
            Lookahead::Operator(Op::Ternary) => depth += 1,
            Lookahead::Operator(_) | Lookahead::Operand => {}
        }
        source.advance()?;
    }
}
