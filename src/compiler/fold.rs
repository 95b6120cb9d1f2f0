//! Compile-time rewrites of a scanned node run.
//!
//! Literal folding replaces `literal (op literal)*` runs with their value where
//! that cannot change the meaning of the surrounding statement. Regex linking
//! pre-compiles the pattern of `subject ~= 'literal'`.

use std::sync::Arc;

use tracing::debug;

use crate::ast::{Chain, Node, NodeKind, Op, RegexMatch, Span, Ty};
use crate::context::ParserContext;
use crate::error::ReduceError;
use crate::operations::text::full_match_regex;
use crate::resolver::{Lookahead, OperandSource, resolve};
use crate::value::Value;

/// Operand source over an already scanned literal run.
struct FoldSource<'n> {
    nodes: &'n [Node],
    pos: usize,
    decimal: bool,
}

impl OperandSource for FoldSource<'_> {
    type Error = ReduceError;

    fn peek(&mut self) -> Result<Lookahead, ReduceError> {
        Ok(match self.nodes.get(self.pos) {
            None => Lookahead::End,
            Some(node) => match node.operator() {
                Some(op) => Lookahead::Operator(op),
                None => Lookahead::Operand,
            },
        })
    }

    fn advance(&mut self) -> Result<(), ReduceError> {
        self.pos += 1;
        Ok(())
    }

    fn next_operand(&mut self, after: Op) -> Result<Value, ReduceError> {
        let node = self.nodes.get(self.pos);
        self.pos += 1;
        node.and_then(Node::literal)
            .cloned()
            .ok_or(ReduceError::Incomplete { op: after })
    }

    fn decimal(&self) -> bool {
        self.decimal
    }
}

/// A literal that is not continued by a union (`'abc'.length()`).
fn is_plain_literal(nodes: &[Node], index: usize) -> bool {
    nodes.get(index).is_some_and(|n| n.literal().is_some())
        && !matches!(nodes.get(index + 1).map(|n| &n.kind), Some(NodeKind::Union(_)))
}

fn foldable_op(nodes: &[Node], index: usize) -> Option<Op> {
    nodes
        .get(index)
        .and_then(Node::operator)
        .filter(|op| op.is_foldable())
}

/// Whether the literal run `first..=last` can be reduced on its own.
///
/// The operator before the run must bind strictly looser than every operator in
/// it, and the operator after it no tighter than the loosest one.
fn is_independent(nodes: &[Node], first: usize, last: usize) -> bool {
    let Some(loosest) = (first + 1..last)
        .step_by(2)
        .filter_map(|i| nodes[i].operator())
        .map(Op::precedence)
        .min()
    else {
        return false;
    };
    let before = first
        .checked_sub(1)
        .and_then(|i| nodes[i].operator())
        .is_none_or(|op| op.precedence() < loosest);
    let after = nodes
        .get(last + 1)
        .and_then(Node::operator)
        .is_none_or(|op| op.precedence() <= loosest);
    before && after
}

/// Ranges (`start..end`) of the literal runs to fold, left to right.
fn fold_ranges(nodes: &[Node]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < nodes.len() {
        if !is_plain_literal(nodes, i) {
            i += 1;
            continue;
        }
        let mut last = i;
        while foldable_op(nodes, last + 1).is_some() && is_plain_literal(nodes, last + 2) {
            last += 2;
        }

        // longest independent sub-run first, greedily from the left
        let mut first = i;
        while first < last {
            let mut end = last;
            while end > first && !is_independent(nodes, first, end) {
                end -= 2;
            }
            if end > first {
                ranges.push((first, end + 1));
                first = end + 2;
            } else {
                first += 2;
            }
        }
        i = last + 1;
    }
    ranges
}

fn evaluate(run: &[Node], decimal: bool) -> Result<Value, ReduceError> {
    let first = run[0].literal().cloned().ok_or(ReduceError::Incomplete { op: Op::Add })?;
    let mut source = FoldSource {
        nodes: &run[1..],
        pos: 0,
        decimal,
    };
    resolve(&mut source, first)
}

/// Fold every independent literal run.
///
/// A run that fails to reduce (`1 / 0`) is left in place so the error surfaces
/// when the expression runs.
pub(super) fn fold_literals(nodes: Vec<Node>, decimal: bool) -> Vec<Node> {
    let folds: Vec<(usize, usize, Node)> = fold_ranges(&nodes)
        .into_iter()
        .filter_map(|(start, end)| {
            let run = &nodes[start..end];
            let span = Span::new(run[0].span.start, run[run.len() - 1].span.end);
            match evaluate(run, decimal) {
                Ok(value) => {
                    debug!(%value, nodes = run.len(), "folded literal run");
                    Some((start, end, Node::literal_at(value, span)))
                }
                Err(error) => {
                    debug!(%error, "literal run left for run time");
                    None
                }
            }
        })
        .collect();
    if folds.is_empty() {
        return nodes;
    }

    let mut out = Vec::with_capacity(nodes.len());
    let mut folds = folds.into_iter().peekable();
    let mut skip_until = 0;
    for (i, node) in nodes.into_iter().enumerate() {
        if i < skip_until {
            continue;
        }
        if folds.peek().is_some_and(|(start, _, _)| *start == i)
            && let Some((_, end, folded)) = folds.next()
        {
            out.push(folded);
            skip_until = end;
            continue;
        }
        out.push(node);
    }
    out
}

/// Position of the subject of a linkable `subject ~= 'pattern'`.
fn regex_candidates(nodes: &[Node]) -> Vec<usize> {
    let mut found = Vec::new();
    let mut i = 0;
    while i + 2 < nodes.len() {
        let linkable = nodes[i].is_operand()
            && nodes[i + 1].operator() == Some(Op::Regex)
            && matches!(nodes[i + 2].literal(), Some(Value::String(_)))
            && is_plain_literal(nodes, i + 2)
            && i.checked_sub(1)
                .and_then(|p| nodes[p].operator())
                .is_none_or(|op| op.precedence() < Op::Regex.precedence())
            && nodes
                .get(i + 3)
                .and_then(Node::operator)
                .is_none_or(|op| op.precedence() <= Op::Regex.precedence());
        if linkable {
            found.push(i);
            i += 3;
        } else {
            i += 1;
        }
    }
    found
}

/// Replace `subject ~= 'literal'` triples with a pre-compiled [`RegexMatch`].
pub(super) fn link_regex(ctx: &mut ParserContext, nodes: Vec<Node>) -> Vec<Node> {
    let candidates = regex_candidates(&nodes);
    if candidates.is_empty() {
        return nodes;
    }

    let mut out = Vec::with_capacity(nodes.len());
    let mut candidates = candidates.into_iter().peekable();
    let mut iter = nodes.into_iter().enumerate();
    while let Some((i, node)) = iter.next() {
        if candidates.next_if_eq(&i).is_none() {
            out.push(node);
            continue;
        }
        let (Some((_, op)), Some((_, literal))) = (iter.next(), iter.next()) else {
            out.push(node);
            continue;
        };
        let Some(Value::String(pattern)) = literal.literal() else {
            out.extend([node, op, literal]);
            continue;
        };
        match full_match_regex(pattern) {
            Ok(regex) => {
                let span = Span::new(node.span.start, literal.span.end);
                let egress = node.egress.clone();
                let subject = Chain::new(vec![node]).with_egress(egress);
                let mut linked = Node::new(
                    NodeKind::RegexMatch(RegexMatch {
                        subject,
                        pattern: Arc::new(regex),
                    }),
                    span,
                );
                linked.egress = Some(Ty::Boolean);
                out.push(linked);
            }
            Err(error) => {
                ctx.error(error.to_string(), literal.span);
                out.extend([node, op, literal]);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(n: i32) -> Node {
        Node::literal_at(Value::Integer(n), Span::default())
    }

    fn op(op: Op) -> Node {
        Node::new(NodeKind::Operator(op), Span::default())
    }

    fn var() -> Node {
        Node::new(NodeKind::IsDef("x".to_string()), Span::default())
    }

    fn kinds(nodes: &[Node]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| match (&n.kind, n.literal()) {
                (_, Some(v)) => v.to_string(),
                (NodeKind::Operator(op), _) => op.to_string(),
                (kind, _) => kind.name().to_string(),
            })
            .collect()
    }

    #[test]
    fn test_fold_whole_run() {
        let nodes = vec![lit(10), op(Op::Sub), lit(5), op(Op::Mul), lit(2), op(Op::Add), lit(5)];
        assert_eq!(kinds(&fold_literals(nodes, false)), ["5"]);
    }

    #[test]
    fn test_tighter_operator_before_run_blocks_folding() {
        // x - 2 + 3 must not become x - 5
        let nodes = vec![var(), op(Op::Sub), lit(2), op(Op::Add), lit(3)];
        assert_eq!(kinds(&fold_literals(nodes, false)), ["isdef", "-", "2", "+", "3"]);
    }

    #[test]
    fn test_tighter_sub_run_is_folded() {
        // x + 2 * 3 becomes x + 6
        let nodes = vec![var(), op(Op::Add), lit(2), op(Op::Mul), lit(3)];
        assert_eq!(kinds(&fold_literals(nodes, false)), ["isdef", "+", "6"]);
        // 2 * 3 + x becomes 6 + x
        let nodes = vec![lit(2), op(Op::Mul), lit(3), op(Op::Add), var()];
        assert_eq!(kinds(&fold_literals(nodes, false)), ["6", "+", "isdef"]);
    }

    #[test]
    fn test_failed_fold_is_deferred() {
        let nodes = vec![lit(1), op(Op::Div), lit(0)];
        assert_eq!(kinds(&fold_literals(nodes, false)), ["1", "/", "0"]);
    }

    #[test]
    fn test_short_circuit_operators_are_not_folded() {
        let t = || Node::literal_at(Value::Boolean(true), Span::default());
        let nodes = vec![t(), op(Op::And), t()];
        assert_eq!(kinds(&fold_literals(nodes, false)), ["true", "&&", "true"]);
    }
}
