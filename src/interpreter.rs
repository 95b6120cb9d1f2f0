//! Runtime interpreter.
//!
//! The interpreter walks a compiled chain statement by statement. The first
//! operand of each statement is evaluated directly; the rest of the statement is
//! handed to the precedence resolver with a [`ChainWalker`] as its operand source,
//! so operators pull their right-hand operands straight from the chain and
//! short-circuit skipping never evaluates the nodes it passes over.

mod access;
mod blocks;

use tracing::trace;

use crate::ast::{Chain, Node, NodeKind, Op, Span};
use crate::compiler::CompiledChain;
use crate::debug::DebugContext;
use crate::error::RuntimeError;
use crate::operations::{coerce, numeric};
use crate::property::{PropertyResolver, ReflectiveResolver};
use crate::resolver::{Lookahead, OperandSource, resolve};
use crate::value::Value;
use crate::variables::VariableResolverFactory;

static REFLECTIVE: ReflectiveResolver = ReflectiveResolver;

/// Executes compiled chains against a root object and a variable environment.
///
/// # Examples
///
/// ```
/// use mace_lang::{Interpreter, MapVariableResolverFactory, Value, compile_expression};
///
/// let compiled = compile_expression("x * 2 + 1").unwrap();
/// let vars = MapVariableResolverFactory::new().with("x", 20);
/// let result = Interpreter::new().execute(&compiled, Value::Null, &vars).unwrap();
/// assert_eq!(result, Value::Integer(41));
/// ```
#[derive(Clone, Copy)]
pub struct Interpreter<'a> {
    resolver: &'a dyn PropertyResolver,
    debugger: Option<&'a DebugContext>,
}

impl Default for Interpreter<'_> {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl std::fmt::Debug for Interpreter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("debugger", &self.debugger)
            .finish_non_exhaustive()
    }
}

/// Everything a node needs from its surroundings.
#[derive(Clone, Copy)]
pub(crate) struct Env<'e> {
    root: &'e Value,
    vars: &'e dyn VariableResolverFactory,
    decimal: bool,
    /// Source text the node spans point into
    text: &'e str,
}

impl<'e> Env<'e> {
    fn with_vars<'n>(&self, vars: &'n dyn VariableResolverFactory) -> Env<'n>
    where
        'e: 'n,
    {
        Env {
            root: self.root,
            vars,
            decimal: self.decimal,
            text: self.text,
        }
    }

    fn with_root<'n>(&self, root: &'n Value) -> Env<'n>
    where
        'e: 'n,
    {
        Env {
            root,
            vars: self.vars,
            decimal: self.decimal,
            text: self.text,
        }
    }

    fn snippet(&self, span: Span) -> String {
        let text: String = self.text.chars().skip(span.start).take(span.len()).collect();
        text.trim().to_string()
    }
}

/// Result of running a chain; `returned` is set when a `return` ended it early.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    value: Value,
    returned: bool,
}

impl<'a> Interpreter<'a> {
    pub fn new() -> Self {
        Interpreter {
            resolver: &REFLECTIVE,
            debugger: None,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn PropertyResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_debugger(mut self, debugger: &'a DebugContext) -> Self {
        self.debugger = Some(debugger);
        self
    }

    /// Run `compiled` with `root` as the root object.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(source = %compiled.context().options().source_name)
    )]
    pub fn execute(
        &self,
        compiled: &CompiledChain,
        root: Value,
        vars: &dyn VariableResolverFactory,
    ) -> Result<Value, RuntimeError> {
        let env = Env {
            root: &root,
            vars,
            decimal: compiled.context().options().decimal_arithmetic,
            text: compiled.source(),
        };
        let completion = self.run(compiled.chain(), env)?;
        Ok(completion.value)
    }

    fn run(&self, chain: &Chain, env: Env<'_>) -> Result<Completion, RuntimeError> {
        ChainWalker {
            interp: self,
            env,
            nodes: chain.nodes(),
            pos: 0,
            returned: false,
        }
        .run()
    }

    fn value_of(&self, chain: &Chain, env: Env<'_>) -> Result<Value, RuntimeError> {
        Ok(self.run(chain, env)?.value)
    }

    fn condition(&self, chain: &Chain, env: Env<'_>) -> Result<bool, RuntimeError> {
        Ok(self.value_of(chain, env)?.is_truthy())
    }

    fn values_of(&self, chains: &[Chain], env: Env<'_>) -> Result<Vec<Value>, RuntimeError> {
        chains.iter().map(|c| self.value_of(c, env)).collect()
    }
}

/// Walks one chain, serving as the operand source of the precedence resolver.
struct ChainWalker<'w, 'a> {
    interp: &'w Interpreter<'a>,
    env: Env<'w>,
    nodes: &'w [Node],
    pos: usize,
    returned: bool,
}

fn invalid_operand(operation: &str, expected: &str, actual: &Value) -> RuntimeError {
    RuntimeError::InvalidOperand {
        operation: operation.to_string(),
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

impl ChainWalker<'_, '_> {
    fn run(mut self) -> Result<Completion, RuntimeError> {
        let nodes = self.nodes;
        let mut last = Value::Null;
        while let Some(node) = nodes.get(self.pos) {
            match &node.kind {
                NodeKind::EndOfStatement => {
                    self.pos += 1;
                    continue;
                }
                NodeKind::LineLabel { line, source } => {
                    if let Some(debugger) = self.interp.debugger {
                        debugger.on_line(source, *line, self.env.vars);
                    }
                    self.pos += 1;
                    continue;
                }
                NodeKind::Operator(op) => return Err(RuntimeError::UnexpectedOperator { op: *op }),
                _ => {}
            }

            let first = self.operand()?;
            if self.returned {
                return Ok(Completion {
                    value: first,
                    returned: true,
                });
            }
            last = resolve(&mut self, first)?;
            if let Lookahead::Operator(op) = self.peek()? {
                return Err(RuntimeError::UnexpectedOperator { op });
            }
        }
        Ok(Completion {
            value: last,
            returned: false,
        })
    }

    /// Evaluate the operand at the cursor together with any union continuing it.
    fn operand(&mut self) -> Result<Value, RuntimeError> {
        let nodes = self.nodes;
        let Some(node) = nodes.get(self.pos) else {
            return Ok(Value::Null);
        };
        self.pos += 1;
        let mut value = self.evaluate(node)?;
        while let Some(Node {
            kind: NodeKind::Union(segments),
            span,
            ..
        }) = nodes.get(self.pos)
        {
            self.pos += 1;
            let text = self.env.snippet(Span::new(node.span.start, span.end));
            value = self.interp.apply_segments(value, segments, self.env, &text)?;
        }
        Ok(value)
    }

    fn evaluate(&mut self, node: &Node) -> Result<Value, RuntimeError> {
        let (interp, env) = (self.interp, self.env);
        trace!(kind = node.kind.name(), "evaluate");
        let completion = match &node.kind {
            NodeKind::Literal(value) => return Ok(value.clone()),
            NodeKind::Property(chain) => return interp.read_chain(chain, &node.accessor, env),
            NodeKind::Assignment(assignment) => {
                return interp.assign(assignment, &node.accessor, env);
            }
            NodeKind::Declaration { name, ty } => {
                let value = blocks::default_value(ty);
                env.vars.declare(name, value.clone());
                return Ok(value);
            }
            NodeKind::If(block) => interp.run_if(block, env)?,
            NodeKind::ForEach(block) => interp.run_foreach(block, env)?,
            NodeKind::For(block) => interp.run_for(block, env)?,
            NodeKind::While(block) => interp.run_while(block, env)?,
            NodeKind::DoWhile(block) => interp.run_do(block, env)?,
            NodeKind::With(block) => return interp.run_with(block, env),
            NodeKind::Substatement(chain) => interp.run(chain, env)?,
            NodeKind::InlineCollection(collection) => return interp.collection(collection, env),
            NodeKind::TypeCast { ty, operand } => {
                return Ok(coerce(&interp.value_of(operand, env)?, ty)?);
            }
            NodeKind::Negation(operand) => {
                return match interp.value_of(operand, env)? {
                    Value::Boolean(b) => Ok(Value::Boolean(!b)),
                    other => Err(invalid_operand("!", "Boolean", &other)),
                };
            }
            NodeKind::Sign(operand) => {
                let value = interp.value_of(operand, env)?;
                return numeric::negate(&value).ok_or_else(|| invalid_operand("-", "a number", &value));
            }
            NodeKind::RegexMatch(regex) => {
                let subject = interp.value_of(&regex.subject, env)?;
                let matched = !subject.is_null() && regex.pattern.is_match(&subject.as_string());
                return Ok(Value::Boolean(matched));
            }
            NodeKind::Projection(projection) => return interp.project(projection, env),
            NodeKind::New(new) => return interp.instantiate(new, env),
            NodeKind::FunctionDef(function) => {
                let value = Value::Function(function.clone());
                env.vars.declare(&function.name, value.clone());
                return Ok(value);
            }
            NodeKind::ProtoDef(proto) => {
                let value = Value::Proto(proto.clone());
                env.vars.declare(&proto.name, value.clone());
                return Ok(value);
            }
            NodeKind::Return(chain) => Completion {
                value: interp.value_of(chain, env)?,
                returned: true,
            },
            NodeKind::Assert(chain) => {
                return match interp.value_of(chain, env)? {
                    Value::Boolean(true) => Ok(Value::Boolean(true)),
                    Value::Boolean(false) => Err(RuntimeError::Assertion {
                        expr: env.snippet(node.span),
                    }),
                    other => Err(invalid_operand("assert", "Boolean", &other)),
                };
            }
            NodeKind::IsDef(name) => {
                let defined =
                    env.vars.is_resolvable(name) || interp.resolver.has_property(name, env.root);
                return Ok(Value::Boolean(defined));
            }
            NodeKind::Union(_)
            | NodeKind::Operator(_)
            | NodeKind::LineLabel { .. }
            | NodeKind::EndOfStatement => {
                return Err(RuntimeError::InvalidOperand {
                    operation: node.kind.name().to_string(),
                    expected: "an operand".to_string(),
                    actual: env.snippet(node.span),
                });
            }
        };
        if completion.returned {
            self.returned = true;
        }
        Ok(completion.value)
    }
}

impl OperandSource for ChainWalker<'_, '_> {
    type Error = RuntimeError;

    fn peek(&mut self) -> Result<Lookahead, RuntimeError> {
        Ok(match self.nodes.get(self.pos).map(|n| &n.kind) {
            None | Some(NodeKind::EndOfStatement | NodeKind::LineLabel { .. }) => Lookahead::End,
            Some(NodeKind::Operator(op)) => Lookahead::Operator(*op),
            Some(_) => Lookahead::Operand,
        })
    }

    fn advance(&mut self) -> Result<(), RuntimeError> {
        self.pos += 1;
        Ok(())
    }

    fn next_operand(&mut self, after: Op) -> Result<Value, RuntimeError> {
        let nodes = self.nodes;
        match nodes.get(self.pos).map(|n| &n.kind) {
            None | Some(NodeKind::EndOfStatement | NodeKind::LineLabel { .. }) => {
                Err(RuntimeError::MissingOperand { op: after })
            }
            Some(NodeKind::Operator(op)) => Err(RuntimeError::UnexpectedOperator { op: *op }),
            Some(_) => self.operand(),
        }
    }

    fn decimal(&self) -> bool {
        self.env.decimal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::MapVariableResolverFactory;
    use crate::{CompileOptions, ParserContext, compile};

    fn run(source: &str) -> Result<Value, RuntimeError> {
        let compiled = compile(source, ParserContext::default()).unwrap();
        let vars = MapVariableResolverFactory::new();
        Interpreter::new().execute(&compiled, Value::Null, &vars)
    }

    #[test]
    fn test_statements_yield_last_value() {
        assert_eq!(run("x = 10; y = x * 2; y + 1"), Ok(Value::Integer(21)));
    }

    #[test]
    fn test_return_stops_the_chain() {
        assert_eq!(run("if (true) { return 1; } 2"), Ok(Value::Integer(1)));
    }

    #[test]
    fn test_unfolded_runs_match_folded() {
        let source = "(100 % 3) * 2 - 1 / 1 + 8 + (5 * 2)";
        let options = CompileOptions::default().with_fold_constants(false);
        let compiled = compile(source, ParserContext::new(options)).unwrap();
        assert!(!compiled.is_literal_only());
        let vars = MapVariableResolverFactory::new();
        let result = Interpreter::new().execute(&compiled, Value::Null, &vars);
        assert_eq!(result, Ok(Value::Integer(19)));
    }

    #[test]
    fn test_failed_assertion_names_the_expression() {
        assert_eq!(
            run("assert 1 == 2"),
            Err(RuntimeError::Assertion {
                expr: "assert 1 == 2".to_string()
            })
        );
    }
}
