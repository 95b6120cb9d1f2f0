//! Property/method chain capture: `root.a.?b[0].call(x).{ c = 1 }`.

use std::sync::Arc;

use super::capture::{
    capture_balanced, is_ident_start, read_word, skip_whitespace, split_top_level, text, trim,
};
use crate::ast::{
    COMPOUND_ASSIGNMENTS, Chain, ChainRoot, ChainSegment, Op, PropertyChain, WithAssignment,
};
use crate::compiler;
use crate::context::{Binding, Import, ParserContext};
use crate::error::{ParseError, ParseErrorKind};

/// An assignment operator found after a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=` or a compound form, with the lexeme length
    Assign(Option<Op>, usize),
    /// Postfix `++` / `--`
    Increment(Op),
}

/// Detect an assignment operator at `pos`.
pub fn assignment_at(chars: &[char], pos: usize, end: usize) -> Option<AssignOp> {
    let rest = &chars[pos.min(end)..end];
    for (lexeme, op) in COMPOUND_ASSIGNMENTS {
        let len = lexeme.chars().count();
        if rest.len() >= len && lexeme.chars().zip(rest).all(|(a, b)| a == *b) {
            return Some(AssignOp::Assign(Some(*op), len));
        }
    }
    match rest {
        ['=', '=', ..] => None,
        ['=', ..] => Some(AssignOp::Assign(None, 1)),
        ['+', '+', ..] => Some(AssignOp::Increment(Op::Add)),
        ['-', '-', ..] => Some(AssignOp::Increment(Op::Sub)),
        _ => None,
    }
}

/// End of the segment list starting at `pos` (a `.` or `[`, or a `(` right
/// after the root).
pub fn capture_segments(chars: &[char], mut pos: usize, end: usize) -> Result<usize, ParseError> {
    while pos < end {
        match chars[pos] {
            '(' | '[' => pos = capture_balanced(chars, pos, end)? + 1,
            '.' if pos + 1 < end => match chars[pos + 1] {
                '{' => pos = capture_balanced(chars, pos + 1, end)? + 1,
                '?' if pos + 2 < end && is_ident_start(chars[pos + 2]) => {
                    pos = read_word(chars, pos + 2, end);
                }
                c if is_ident_start(c) => pos = read_word(chars, pos + 1, end),
                _ => break,
            },
            _ => break,
        }
    }
    Ok(pos)
}

/// End of the chain whose root identifier starts at `start`.
pub fn capture_chain(chars: &[char], start: usize, end: usize) -> Result<usize, ParseError> {
    let root_end = read_word(chars, start, end);
    capture_segments(chars, root_end, end)
}

fn compile_args(
    ctx: &mut ParserContext,
    chars: &[char],
    open: usize,
    close: usize,
) -> Result<Vec<Chain>, ParseError> {
    split_top_level(chars, open + 1, close, ',')?
        .into_iter()
        .map(|(s, e)| compiler::compile_span(ctx, chars, s, e))
        .collect()
}

/// Parse the segments in `pos..end` (as delimited by [`capture_segments`]).
pub fn parse_segments(
    ctx: &mut ParserContext,
    chars: &[char],
    mut pos: usize,
    end: usize,
) -> Result<Vec<ChainSegment>, ParseError> {
    let mut segments = Vec::new();
    while pos < end {
        match chars[pos] {
            '[' => {
                let close = capture_balanced(chars, pos, end)?;
                let (s, e) = trim(chars, pos + 1, close);
                if s == e {
                    return Err(ParseError::new(
                        ParseErrorKind::Expected("an index expression".to_string()),
                        pos,
                    ));
                }
                segments.push(ChainSegment::Index(compiler::compile_span(ctx, chars, s, e)?));
                pos = close + 1;
            }
            '.' if pos + 1 < end && chars[pos + 1] == '{' => {
                let close = capture_balanced(chars, pos + 1, end)?;
                segments.push(ChainSegment::With(parse_with_assignments(
                    ctx,
                    chars,
                    pos + 2,
                    close,
                )?));
                pos = close + 1;
            }
            '.' => {
                let null_safe = chars.get(pos + 1) == Some(&'?');
                let name_start = if null_safe { pos + 2 } else { pos + 1 };
                let name_end = read_word(chars, name_start, end);
                let name = text(chars, name_start, name_end);
                pos = name_end;
                if pos < end && chars[pos] == '(' {
                    let close = capture_balanced(chars, pos, end)?;
                    let args = compile_args(ctx, chars, pos, close)?;
                    segments.push(ChainSegment::Method {
                        name,
                        args,
                        null_safe,
                    });
                    pos = close + 1;
                } else {
                    segments.push(ChainSegment::Property { name, null_safe });
                }
            }
            c => return Err(ParseError::new(ParseErrorKind::UnexpectedCharacter(c), pos)),
        }
    }
    Ok(segments)
}

/// Parse a captured chain (`start..end` from [`capture_chain`]).
pub fn parse_chain(
    ctx: &mut ParserContext,
    chars: &[char],
    start: usize,
    end: usize,
) -> Result<PropertyChain, ParseError> {
    let root_end = read_word(chars, start, end);
    let word = text(chars, start, root_end);
    let mut pos = root_end;
    let mut leading = Vec::new();

    let root = if pos < end && chars[pos] == '(' {
        let close = capture_balanced(chars, pos, end)?;
        let args = compile_args(ctx, chars, pos, close)?;
        pos = close + 1;
        match ctx.lookup(&word) {
            Some(Binding::Import(Import::Static { ty, member })) => {
                leading.push(ChainSegment::Method {
                    name: member,
                    args,
                    null_safe: false,
                });
                ChainRoot::Type(ty)
            }
            _ => ChainRoot::Call { name: word, args },
        }
    } else if word == "this" {
        ChainRoot::This
    } else {
        match ctx.lookup(&word) {
            Some(Binding::Import(Import::Static { ty, member })) => {
                leading.push(ChainSegment::Property {
                    name: member,
                    null_safe: false,
                });
                ChainRoot::Type(ty)
            }
            Some(Binding::Import(Import::Type(ty))) => ChainRoot::Type(ty),
            Some(Binding::Proto(proto)) => ChainRoot::Type(crate::ast::Ty::Proto(proto.name.clone())),
            Some(_) => ChainRoot::Identifier(word),
            None => match ctx.resolve_type(&word) {
                Some(ty) => ChainRoot::Type(ty),
                None => ChainRoot::Identifier(word),
            },
        }
    };

    leading.extend(parse_segments(ctx, chars, pos, end)?);
    Ok(PropertyChain {
        root,
        segments: leading,
        text: Arc::from(text(chars, start, end)),
    })
}

/// Parse `a = 1, b.c += 2` inside a with block.
pub fn parse_with_assignments(
    ctx: &mut ParserContext,
    chars: &[char],
    start: usize,
    end: usize,
) -> Result<Vec<WithAssignment>, ParseError> {
    let mut assignments = Vec::new();
    for (s, e) in split_top_level(chars, start, end, ',')? {
        for (s, e) in split_top_level(chars, s, e, ';')? {
            if !is_ident_start(chars[s]) {
                return Err(ParseError::new(
                    ParseErrorKind::Expected("a property name".to_string()),
                    s,
                ));
            }
            let path_end = capture_chain(chars, s, e)?;
            let op_pos = skip_whitespace(chars, path_end, e);
            let Some(AssignOp::Assign(op, len)) = assignment_at(chars, op_pos, e) else {
                return Err(ParseError::new(
                    ParseErrorKind::Expected("'=' in with block".to_string()),
                    op_pos,
                ));
            };
            let name_end = read_word(chars, s, path_end);
            let mut path = vec![ChainSegment::Property {
                name: text(chars, s, name_end),
                null_safe: false,
            }];
            path.extend(parse_segments(ctx, chars, name_end, path_end)?);
            let value = compiler::compile_span(ctx, chars, op_pos + len, e)?;
            assignments.push(WithAssignment {
                path,
                op,
                value,
                text: Arc::from(text(chars, s, e)),
            });
        }
    }
    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_capture_chain_stops_at_operator() {
        let c = chars("foo.bar[1].baz(a, (b)) + 1");
        assert_eq!(capture_chain(&c, 0, c.len()), Ok(22));
        let c = chars("a.?b.c == 1");
        assert_eq!(capture_chain(&c, 0, c.len()), Ok(6));
    }

    #[test]
    fn test_assignment_detection() {
        let c = chars("= 1");
        assert_eq!(assignment_at(&c, 0, c.len()), Some(AssignOp::Assign(None, 1)));
        let c = chars("== 1");
        assert_eq!(assignment_at(&c, 0, c.len()), None);
        let c = chars(">>>= 1");
        assert_eq!(assignment_at(&c, 0, c.len()), Some(AssignOp::Assign(Some(Op::UShr), 4)));
        let c = chars("++");
        assert_eq!(assignment_at(&c, 0, c.len()), Some(AssignOp::Increment(Op::Add)));
        let c = chars("<= 1");
        assert_eq!(assignment_at(&c, 0, c.len()), None);
    }
}
