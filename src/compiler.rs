//! Compilation driver.
//!
//! The compiler pulls nodes from the [`Scanner`] one at a time and verifies each
//! as soon as it is emitted, so the right-hand side of an assignment is analysed
//! before its target is declared. Once a span is fully scanned, its nodes are
//! linked: literal runs are folded, literal regex matches are pre-compiled and the
//! chain's egress type is computed.

mod fold;
mod verifier;

use std::{collections::BTreeMap, sync::Arc};

use tracing::debug;

use crate::ast::{Chain, Node, Span, Ty};
use crate::context::ParserContext;
use crate::error::{CompileError, ParseError};
use crate::scanner::Scanner;
use crate::value::Value;

/// The immutable result of a compilation.
///
/// Holds the node chain together with the context it was compiled in, so callers
/// can inspect the inputs the expression requires and replay diagnostics.
#[derive(Debug)]
pub struct CompiledChain {
    chain: Chain,
    context: ParserContext,
    source: Arc<str>,
}

impl CompiledChain {
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn context(&self) -> &ParserContext {
        &self.context
    }

    /// Type of the last statement, when known at compile time.
    pub fn egress_type(&self) -> Option<&Ty> {
        self.chain.egress()
    }

    /// Whether the whole expression reduced to one literal.
    pub fn is_literal_only(&self) -> bool {
        self.chain.literal().is_some()
    }

    pub fn literal_value(&self) -> Option<&Value> {
        self.chain.literal()
    }

    /// Names the expression reads but never declares.
    pub fn inputs(&self) -> &BTreeMap<String, Option<Ty>> {
        self.context.inputs()
    }

    /// Names the expression declares.
    pub fn variables(&self) -> &BTreeMap<String, Option<Ty>> {
        self.context.variables()
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Compile `source` against `context`.
///
/// Fails with every diagnostic collected when any of them is fatal. A parse error
/// stops compilation at once; type errors are collected and reported together.
///
/// # Examples
///
/// ```
/// use mace_lang::{ParserContext, compile};
///
/// let compiled = compile("price * quantity > 100", ParserContext::default()).unwrap();
/// let inputs: Vec<&str> = compiled.inputs().keys().map(String::as_str).collect();
/// assert_eq!(inputs, ["price", "quantity"]);
/// ```
#[tracing::instrument(level = "debug", skip_all, fields(source = %context.options().source_name))]
pub fn compile(source: &str, mut context: ParserContext) -> Result<CompiledChain, CompileError> {
    let original: Vec<char> = source.chars().collect();
    let chars = blank_comments(&original);
    context.set_source(&original);

    let chain = match compile_span(&mut context, &chars, 0, chars.len()) {
        Ok(chain) => chain,
        Err(err) => {
            let end = (err.offset + 1).min(chars.len());
            context.error(err.kind.to_string(), Span::new(err.offset, end));
            Chain::default()
        }
    };
    if context.has_errors() {
        return Err(CompileError {
            diagnostics: context.take_diagnostics(),
        });
    }

    debug!(
        nodes = chain.len(),
        inputs = context.inputs().len(),
        variables = context.variables().len(),
        egress = ?chain.egress(),
        "compiled"
    );
    Ok(CompiledChain {
        chain,
        context,
        source: Arc::from(source),
    })
}

/// Compile every statement of `start..end`.
pub fn compile_span(
    ctx: &mut ParserContext,
    chars: &[char],
    start: usize,
    end: usize,
) -> Result<Chain, ParseError> {
    let mut scanner = Scanner::new(chars, start, end);
    let nodes = scan_all(ctx, &mut scanner)?;
    Ok(link(ctx, nodes))
}

/// Compile the single statement starting at `start`, returning it with the
/// offset where it ends.
pub fn compile_statement(
    ctx: &mut ParserContext,
    chars: &[char],
    start: usize,
    end: usize,
) -> Result<(Chain, usize), ParseError> {
    let mut scanner = Scanner::statement(chars, start, end);
    let nodes = scan_all(ctx, &mut scanner)?;
    Ok((link(ctx, nodes), scanner.token_end()))
}

/// Verify and link nodes that were scanned outside a span (unary operands).
pub fn compile_nodes(ctx: &mut ParserContext, mut nodes: Vec<Node>) -> Chain {
    for node in &mut nodes {
        verifier::verify(ctx, node);
    }
    link(ctx, nodes)
}

fn scan_all(ctx: &mut ParserContext, scanner: &mut Scanner<'_>) -> Result<Vec<Node>, ParseError> {
    let mut nodes = Vec::new();
    while let Some(mut node) = scanner.next_node(ctx)? {
        verifier::verify(ctx, &mut node);
        nodes.push(node);
    }
    Ok(nodes)
}

fn link(ctx: &mut ParserContext, nodes: Vec<Node>) -> Chain {
    let nodes = if ctx.options().fold_constants {
        fold::fold_literals(nodes, ctx.options().decimal_arithmetic)
    } else {
        nodes
    };
    let nodes = fold::link_regex(ctx, nodes);
    let egress = verifier::chain_egress(&nodes);
    Chain::new(nodes).with_egress(egress)
}

/// Replace `//` and `/* */` comments with spaces, keeping newlines so offsets
/// and line numbers stay valid.
fn blank_comments(source: &[char]) -> Vec<char> {
    let mut chars = source.to_vec();
    let mut pos = 0;
    while pos < chars.len() {
        match chars[pos] {
            quote @ ('\'' | '"') => {
                pos += 1;
                while pos < chars.len() && chars[pos] != quote {
                    pos += if chars[pos] == '\\' { 2 } else { 1 };
                }
                pos += 1;
            }
            '/' if chars.get(pos + 1) == Some(&'/') => {
                while pos < chars.len() && chars[pos] != '\n' {
                    chars[pos] = ' ';
                    pos += 1;
                }
            }
            '/' if chars.get(pos + 1) == Some(&'*') => {
                let mut closed = false;
                while pos < chars.len() && !closed {
                    closed = chars[pos] == '*' && chars.get(pos + 1) == Some(&'/');
                    let width = if closed { 2 } else { 1 };
                    for c in &mut chars[pos..pos + width] {
                        if *c != '\n' {
                            *c = ' ';
                        }
                    }
                    pos += width;
                }
            }
            _ => pos += 1,
        }
    }
    chars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_comments_keeps_offsets() {
        let source: Vec<char> = "a // x\n/* y\n */ b '//'".chars().collect();
        let blanked: String = blank_comments(&source).into_iter().collect();
        assert_eq!(blanked, "a     \n    \n    b '//'");
    }

    #[test]
    fn test_literal_only() {
        let compiled = compile("(100 % 3) * 2 - 1 / 1 + 8 + (5 * 2)", ParserContext::default()).unwrap();
        assert!(compiled.is_literal_only());
        assert_eq!(compiled.literal_value(), Some(&Value::Integer(19)));
    }

    #[test]
    fn test_parse_error_is_located() {
        let err = compile("a = (1 + 2", ParserContext::default()).unwrap_err();
        let first = err.first().unwrap();
        assert_eq!(first.location.offset, 4);
        assert_eq!(first.location.line, 1);
    }
}
