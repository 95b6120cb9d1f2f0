use crate::ast::Op;
use crate::error::ReduceError;
use crate::operations;
use crate::value::Value;

#[derive(Debug, Clone)]
enum Entry {
    Value(Value),
    Op(Op),
}

/// Alternating value/operator stack used for one precedence-resolution pass.
///
/// A well-formed stack always reads `value (op value)*` from the bottom.
#[derive(Debug, Default)]
pub struct ExecutionStack {
    entries: Vec<Entry>,
}

impl ExecutionStack {
    pub fn new() -> Self {
        ExecutionStack::default()
    }

    pub fn with_value(value: Value) -> Self {
        ExecutionStack {
            entries: vec![Entry::Value(value)],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push_value(&mut self, value: Value) {
        self.entries.push(Entry::Value(value));
    }

    pub fn push_op(&mut self, op: Op) {
        self.entries.push(Entry::Op(op));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace the whole stack with a single value.
    pub fn reset(&mut self, value: Value) {
        self.entries.clear();
        self.entries.push(Entry::Value(value));
    }

    pub fn top_value(&self) -> Option<&Value> {
        match self.entries.last() {
            Some(Entry::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// The operator waiting below the top value.
    pub fn pending_op(&self) -> Option<Op> {
        match self.entries.len().checked_sub(2).map(|i| &self.entries[i]) {
            Some(Entry::Op(op)) => Some(*op),
            _ => None,
        }
    }

    /// Exchange the two topmost entries.
    pub fn swap(&mut self) {
        let len = self.entries.len();
        if len >= 2 {
            self.entries.swap(len - 1, len - 2);
        }
    }

    /// Reduce `lhs op rhs` at the top of the stack into one value.
    pub fn reduce_once(&mut self, decimal: bool) -> Result<(), ReduceError> {
        let Some(op) = self.pending_op() else {
            return Ok(());
        };
        let Some(Entry::Value(rhs)) = self.entries.pop() else {
            return Ok(());
        };
        self.entries.pop();
        let Some(Entry::Value(lhs)) = self.entries.pop() else {
            return Err(ReduceError::Incomplete { op });
        };
        let result = operations::reduce(op, &lhs, &rhs, decimal)?;
        self.entries.push(Entry::Value(result));
        Ok(())
    }

    /// Reduce while the pending operator binds at least as tightly as `precedence`.
    pub fn reduce_while(&mut self, precedence: u8, decimal: bool) -> Result<(), ReduceError> {
        while self.pending_op().is_some_and(|op| op.precedence() >= precedence) {
            self.reduce_once(decimal)?;
        }
        Ok(())
    }

    /// Reduce everything and return the single remaining value.
    pub fn reduce_all(&mut self, decimal: bool) -> Result<Value, ReduceError> {
        while self.pending_op().is_some() && self.len() >= 3 {
            self.reduce_once(decimal)?;
        }
        if let Some(op) = self.pending_op() {
            return Err(ReduceError::Incomplete { op });
        }
        match self.entries.pop() {
            Some(Entry::Value(v)) => {
                self.entries.clear();
                Ok(v)
            }
            Some(Entry::Op(op)) => Err(ReduceError::Incomplete { op }),
            None => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_respects_order() {
        // 10 - 4 - 3, left to right
        let mut stack = ExecutionStack::with_value(Value::Integer(10));
        stack.push_op(Op::Sub);
        stack.push_value(Value::Integer(4));
        stack.reduce_while(Op::Sub.precedence(), false).unwrap();
        stack.push_op(Op::Sub);
        stack.push_value(Value::Integer(3));
        assert_eq!(stack.reduce_all(false).unwrap(), Value::Integer(3));
    }

    #[test]
    fn test_pending_and_swap() {
        let mut stack = ExecutionStack::with_value(Value::Integer(1));
        stack.push_op(Op::Add);
        stack.push_value(Value::Integer(2));
        assert_eq!(stack.pending_op(), Some(Op::Add));
        stack.swap();
        assert_eq!(stack.top_value(), None);
        stack.swap();
        assert_eq!(stack.top_value(), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_dangling_operator() {
        let mut stack = ExecutionStack::new();
        stack.push_op(Op::Mul);
        stack.push_value(Value::Integer(2));
        assert_eq!(
            stack.reduce_all(false),
            Err(ReduceError::Incomplete { op: Op::Mul })
        );
    }
}
