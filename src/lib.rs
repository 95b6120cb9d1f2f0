//! Mace: an embeddable expression language.
//!
//! Source is compiled once into a flat node [`Chain`](ast::Chain) by a fused
//! scanner, with literal runs folded at compile time, and executed many times
//! against different root objects and variable environments.
//!
//! ```
//! use mace_lang::{MapVariableResolverFactory, Value, compile_expression, execute};
//!
//! let compiled = compile_expression("total = price * qty; total > 100 ? 'big' : 'small'").unwrap();
//! let vars = MapVariableResolverFactory::new().with("price", 30).with("qty", 4);
//! assert_eq!(execute(&compiled, Value::Null, &vars), Ok(Value::from("big")));
//! ```

pub mod accessor;
pub mod ast;
pub mod cache;
pub mod compiler;
pub mod context;
pub mod debug;
pub mod error;
pub mod interpreter;
pub mod operations;
pub mod output;
pub mod property;
pub mod resolver;
pub mod scanner;
pub mod stack;
pub mod value;
pub mod variables;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::Ty;
pub use cache::ExpressionCache;
pub use compiler::{CompiledChain, compile};
pub use context::{CompileOptions, ParserContext};
pub use debug::{Breakpoints, DebugContext, DebugDecision, Debugger, Frame};
pub use error::{AccessError, CompileError, Diagnostic, Error, ParseError, RuntimeError};
pub use interpreter::Interpreter;
pub use output::{to_json, to_json_pretty};
pub use property::{PropertyResolver, ReflectiveResolver, Segment, get_property, set_property};
pub use value::Value;
pub use variables::{
    MapVariableResolverFactory, ScopedVariableResolverFactory, VariableResolverFactory,
};

/// Compile `source` with the default options.
pub fn compile_expression(source: &str) -> Result<CompiledChain, CompileError> {
    compile(source, ParserContext::default())
}

/// Run a compiled chain with the reflective resolver and no debugger.
pub fn execute(
    compiled: &CompiledChain,
    root: Value,
    vars: &dyn VariableResolverFactory,
) -> Result<Value, RuntimeError> {
    Interpreter::new().execute(compiled, root, vars)
}

/// Compile and run `source` in one step.
///
/// Constant folding is disabled so every reduction happens at run time.
pub fn eval(source: &str, root: Value, vars: &dyn VariableResolverFactory) -> Result<Value, Error> {
    let options = CompileOptions::default().with_fold_constants(false);
    let compiled = compile(source, ParserContext::new(options))?;
    Ok(execute(&compiled, root, vars)?)
}
