//! Breakpoint support for chains compiled with debug symbols.
//!
//! Compiling with [`crate::CompileOptions::with_debug_symbols`] emits a line label
//! before the first node of every source line. When the interpreter passes a
//! label whose `(source, line)` is registered, or while stepping, it hands a
//! [`Frame`] to the [`Debugger`] and waits for its decision.

use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::RwLock;
use tracing::debug;

use crate::value::Value;
use crate::variables::VariableResolverFactory;

/// Registered breakpoints, keyed by source name and 1-based line.
#[derive(Debug, Default)]
pub struct Breakpoints {
    lines: RwLock<HashSet<(String, usize)>>,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, source: impl Into<String>, line: usize) {
        self.lines.write().insert((source.into(), line));
    }

    pub fn remove(&self, source: &str, line: usize) -> bool {
        self.lines.write().remove(&(source.to_string(), line))
    }

    pub fn contains(&self, source: &str, line: usize) -> bool {
        self.lines.read().contains(&(source.to_string(), line))
    }

    pub fn clear(&self) {
        self.lines.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }
}

/// What to do after a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugDecision {
    /// Pause again at the next line
    Step,
    /// Run until the next breakpoint
    Continue,
}

/// The state visible at a pause.
pub struct Frame<'a> {
    pub source: &'a str,
    pub line: usize,
    pub variables: &'a dyn VariableResolverFactory,
}

impl Frame<'_> {
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name)
    }
}

/// Callback invoked at each pause.
pub trait Debugger: Send + Sync {
    fn on_break(&self, frame: &Frame<'_>) -> DebugDecision;
}

impl<F> Debugger for F
where
    F: Fn(&Frame<'_>) -> DebugDecision + Send + Sync,
{
    fn on_break(&self, frame: &Frame<'_>) -> DebugDecision {
        self(frame)
    }
}

/// Breakpoints plus the debugger that handles them.
pub struct DebugContext {
    breakpoints: Breakpoints,
    debugger: Box<dyn Debugger>,
    stepping: AtomicBool,
}

impl DebugContext {
    pub fn new(debugger: impl Debugger + 'static) -> Self {
        DebugContext {
            breakpoints: Breakpoints::new(),
            debugger: Box::new(debugger),
            stepping: AtomicBool::new(false),
        }
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn is_stepping(&self) -> bool {
        self.stepping.load(Ordering::Acquire)
    }

    /// Called by the interpreter at every line label.
    pub(crate) fn on_line(
        &self,
        source: &str,
        line: usize,
        variables: &dyn VariableResolverFactory,
    ) {
        if !self.is_stepping() && !self.breakpoints.contains(source, line) {
            return;
        }
        debug!(source, line, "paused at breakpoint");
        let frame = Frame {
            source,
            line,
            variables,
        };
        let decision = self.debugger.on_break(&frame);
        self.stepping
            .store(decision == DebugDecision::Step, Ordering::Release);
    }
}

impl std::fmt::Debug for DebugContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugContext")
            .field("breakpoints", &self.breakpoints)
            .field("stepping", &self.is_stepping())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::variables::MapVariableResolverFactory;

    #[test]
    fn test_pauses_only_at_breakpoints_until_stepping() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let ctx = DebugContext::new(move |frame: &Frame<'_>| {
            log.lock().unwrap().push(frame.line);
            if frame.line == 2 {
                DebugDecision::Step
            } else {
                DebugDecision::Continue
            }
        });
        ctx.breakpoints().add("test", 2);
        let vars = MapVariableResolverFactory::new();

        for line in 1..=5 {
            ctx.on_line("test", line, &vars);
        }
        assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
    }
}
