//! Per-compilation environment.
//!
//! A [`ParserContext`] is created for one top-level compilation and threaded
//! explicitly through every nested sub-compilation (block bodies, arguments,
//! substatements), so variable and input tracking accumulates across scopes. Once
//! compilation returns it is owned, read-only, by the compiled chain.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::ast::{Function, Proto, Span, Ty};
use crate::error::{Diagnostic, Location, Severity};

/// Compilation switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Every input must be declared and assignments must type-check
    pub strict_typing: bool,
    /// Emit line labels for breakpoint matching
    pub debug_symbols: bool,
    /// Pre-compute literal runs at compile time
    pub fold_constants: bool,
    /// Integral arithmetic promotes to exact decimals instead of doubles
    pub decimal_arithmetic: bool,
    /// Source name reported in line labels and diagnostics
    pub source_name: Arc<str>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            strict_typing: false,
            debug_symbols: false,
            fold_constants: true,
            decimal_arithmetic: false,
            source_name: Arc::from("<expr>"),
        }
    }
}

impl CompileOptions {
    pub fn with_strict_typing(mut self, strict: bool) -> Self {
        self.strict_typing = strict;
        self
    }

    pub fn with_debug_symbols(mut self, debug: bool) -> Self {
        self.debug_symbols = debug;
        self
    }

    pub fn with_fold_constants(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    pub fn with_decimal_arithmetic(mut self, decimal: bool) -> Self {
        self.decimal_arithmetic = decimal;
        self
    }

    pub fn with_source_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.source_name = name.into();
        self
    }
}

/// An entry of the import table.
#[derive(Debug, Clone, PartialEq)]
pub enum Import {
    Type(Ty),
    /// `import static lang.Math.abs`
    Static { ty: Ty, member: String },
}

/// What a bare name refers to at compile time.
#[derive(Debug, Clone)]
pub enum Binding {
    Variable(Option<Ty>),
    Input(Option<Ty>),
    Import(Import),
    Function(Arc<Function>),
    Proto(Arc<Proto>),
}

#[derive(Debug, Default)]
struct Scope {
    names: HashMap<String, Option<Ty>>,
    /// Declarations made inside this scope stay local to it (function bodies)
    captures_declarations: bool,
}

#[derive(Debug, Default)]
pub struct ParserContext {
    options: CompileOptions,
    imports: HashMap<String, Import>,
    variables: BTreeMap<String, Option<Ty>>,
    inputs: BTreeMap<String, Option<Ty>>,
    scopes: Vec<Scope>,
    functions: HashMap<String, Arc<Function>>,
    protos: HashMap<String, Arc<Proto>>,
    source: Vec<char>,
    line_starts: Vec<usize>,
    last_line_label: Option<usize>,
    diagnostics: Vec<Diagnostic>,
    /// Nesting depth of projection items, whose roots are element properties
    projection_depth: usize,
}

impl ParserContext {
    pub fn new(options: CompileOptions) -> Self {
        ParserContext {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Declare an externally supplied input.
    pub fn add_input(&mut self, name: impl Into<String>, ty: Option<Ty>) -> &mut Self {
        self.inputs.insert(name.into(), ty);
        self
    }

    /// Declare a variable as if it had been assigned earlier.
    pub fn add_variable(&mut self, name: impl Into<String>, ty: Option<Ty>) -> &mut Self {
        self.variables.insert(name.into(), ty);
        self
    }

    pub fn add_import(&mut self, name: impl Into<String>, import: Import) -> &mut Self {
        self.imports.insert(name.into(), import);
        self
    }

    /// Import a qualified name (`util.HashMap`, `lang.Math.abs`), binding its last
    /// segment. Returns false when the name is unknown.
    pub fn import_qualified(&mut self, qualified: &str, is_static: bool) -> bool {
        if is_static {
            let Some((owner, member)) = qualified.rsplit_once('.') else {
                return false;
            };
            let Some(ty) = Ty::qualified(owner).or_else(|| Ty::builtin(owner)) else {
                return false;
            };
            if ty.method_type(member).is_none() && ty.property_type(member).is_none() {
                return false;
            }
            self.add_import(
                member,
                Import::Static {
                    ty,
                    member: member.to_string(),
                },
            );
            return true;
        }
        match Ty::qualified(qualified) {
            Some(ty) => {
                let simple = qualified.rsplit('.').next().unwrap_or(qualified);
                self.add_import(simple, Import::Type(ty));
                true
            }
            None => false,
        }
    }

    /// Externally required names, in name order.
    pub fn inputs(&self) -> &BTreeMap<String, Option<Ty>> {
        &self.inputs
    }

    /// Names declared by the expression, in name order.
    pub fn variables(&self) -> &BTreeMap<String, Option<Ty>> {
        &self.variables
    }

    pub fn imports(&self) -> &HashMap<String, Import> {
        &self.imports
    }

    pub fn function(&self, name: &str) -> Option<&Arc<Function>> {
        self.functions.get(name)
    }

    pub fn proto(&self, name: &str) -> Option<&Arc<Proto>> {
        self.protos.get(name)
    }

    pub(crate) fn declare_function(&mut self, func: Arc<Function>) {
        self.functions.insert(func.name.clone(), func);
    }

    pub(crate) fn declare_proto(&mut self, proto: Arc<Proto>) {
        self.protos.insert(proto.name.to_string(), proto);
    }

    /// Resolve a type name: imports, then protos, then builtin simple and qualified
    /// names.
    pub fn resolve_type(&self, name: &str) -> Option<Ty> {
        if let Some(Import::Type(ty)) = self.imports.get(name) {
            return Some(ty.clone());
        }
        if self.protos.contains_key(name) {
            return Some(Ty::Proto(Arc::from(name)));
        }
        Ty::builtin(name).or_else(|| Ty::qualified(name))
    }

    /// Look a bare name up, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.names.get(name) {
                return Some(Binding::Variable(ty.clone()));
            }
        }
        if let Some(ty) = self.variables.get(name) {
            return Some(Binding::Variable(ty.clone()));
        }
        if let Some(ty) = self.inputs.get(name) {
            return Some(Binding::Input(ty.clone()));
        }
        if let Some(func) = self.functions.get(name) {
            return Some(Binding::Function(func.clone()));
        }
        if let Some(proto) = self.protos.get(name) {
            return Some(Binding::Proto(proto.clone()));
        }
        self.imports.get(name).cloned().map(Binding::Import)
    }

    /// Record a declaration. Inside a function body it stays local to the body.
    pub(crate) fn declare_variable(&mut self, name: &str, ty: Option<Ty>) {
        if let Some(scope) = self.scopes.iter_mut().rev().find(|s| s.captures_declarations) {
            scope.names.insert(name.to_string(), ty);
            return;
        }
        if let Some(scope) = self.scopes.iter_mut().rev().find(|s| s.names.contains_key(name)) {
            scope.names.insert(name.to_string(), ty);
            return;
        }
        self.variables.insert(name.to_string(), ty);
    }

    pub(crate) fn declare_input(&mut self, name: &str, ty: Option<Ty>) {
        if self.projection_depth > 0 {
            return;
        }
        self.inputs.entry(name.to_string()).or_insert(ty);
    }

    pub(crate) fn enter_projection(&mut self) {
        self.projection_depth += 1;
    }

    pub(crate) fn exit_projection(&mut self) {
        self.projection_depth = self.projection_depth.saturating_sub(1);
    }

    pub(crate) fn in_projection(&self) -> bool {
        self.projection_depth > 0
    }

    pub(crate) fn push_scope(&mut self, captures_declarations: bool) {
        self.scopes.push(Scope {
            names: HashMap::new(),
            captures_declarations,
        });
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Bind a name in the innermost scope (loop item, function parameter).
    pub(crate) fn bind_scoped(&mut self, name: &str, ty: Option<Ty>) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.names.insert(name.to_string(), ty);
            }
            None => self.declare_variable(name, ty),
        }
    }

    pub(crate) fn in_function_scope(&self) -> bool {
        self.scopes.iter().any(|s| s.captures_declarations)
    }

    /// Install the source being compiled and index its line starts.
    pub(crate) fn set_source(&mut self, source: &[char]) {
        self.source = source.to_vec();
        self.line_starts = std::iter::once(0)
            .chain(
                source
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| **c == '\n')
                    .map(|(i, _)| i + 1),
            )
            .collect();
        self.last_line_label = None;
    }

    /// 1-based line of an absolute offset.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts
            .partition_point(|start| *start <= offset)
            .max(1)
    }

    pub fn location(&self, span: Span) -> Location {
        let line = self.line_of(span.start);
        let line_start = self.line_starts.get(line - 1).copied().unwrap_or(0);
        let end = span.end.min(self.source.len());
        let start = span.start.min(end);
        Location {
            offset: span.start,
            line,
            column: span.start.saturating_sub(line_start),
            snippet: self.source[start..end].iter().collect::<String>().trim().to_string(),
        }
    }

    /// Whether a line label should be emitted for a node starting at `offset`.
    pub(crate) fn take_line_label(&mut self, offset: usize) -> Option<usize> {
        if !self.options.debug_symbols {
            return None;
        }
        let line = self.line_of(offset);
        if self.last_line_label.is_some_and(|last| last >= line) {
            return None;
        }
        self.last_line_label = Some(line);
        Some(line)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_fatal())
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_fatal)
    }

    pub(crate) fn error(&mut self, message: impl Into<String>, span: Span) {
        self.report(Severity::Error, message.into(), span);
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>, span: Span) {
        self.report(Severity::Warning, message.into(), span);
    }

    fn report(&mut self, severity: Severity, message: String, span: Span) {
        let location = self.location(span);
        tracing::debug!(%severity, %message, line = location.line, "diagnostic");
        self.diagnostics.push(Diagnostic {
            severity,
            message,
            location,
        });
    }

    pub(crate) fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_and_column() {
        let mut ctx = ParserContext::default();
        let source: Vec<char> = "a = 1;\nb = 2;\n  c".chars().collect();
        ctx.set_source(&source);
        assert_eq!(ctx.line_of(0), 1);
        assert_eq!(ctx.line_of(7), 2);
        let loc = ctx.location(Span::new(16, 17));
        assert_eq!((loc.line, loc.column, loc.snippet.as_str()), (3, 2, "c"));
    }

    #[test]
    fn test_function_scope_keeps_locals() {
        let mut ctx = ParserContext::default();
        ctx.push_scope(true);
        ctx.declare_variable("local", Some(Ty::Integer));
        assert!(ctx.lookup("local").is_some());
        ctx.pop_scope();
        assert!(ctx.lookup("local").is_none());
        assert!(ctx.variables().is_empty());
    }

    #[test]
    fn test_import_qualified() {
        let mut ctx = ParserContext::default();
        assert!(ctx.import_qualified("util.HashMap", false));
        assert_eq!(ctx.resolve_type("HashMap"), Some(Ty::Map));
        assert!(ctx.import_qualified("lang.Math.abs", true));
        assert!(matches!(
            ctx.lookup("abs"),
            Some(Binding::Import(Import::Static { .. }))
        ));
        assert!(!ctx.import_qualified("foo.Bar", false));
    }
}
