//! Variable environments.
//!
//! A [`VariableResolverFactory`] supplies the named values an expression reads
//! and receives the ones it declares. Factories chain: a block scope delegates
//! every name it does not own to its parent.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::value::{ObjectRef, Value};

/// A (possibly chained) variable environment.
///
/// Methods take `&self`; implementations use interior mutability so that a
/// scope can hold a shared reference to its parent while still writing to it.
pub trait VariableResolverFactory {
    fn is_resolvable(&self, name: &str) -> bool;

    fn get(&self, name: &str) -> Option<Value>;

    /// Bind `name` in this environment, shadowing any outer binding.
    fn declare(&self, name: &str, value: Value);

    /// Update the binding that `name` resolves to. When the name is not bound
    /// anywhere it is declared.
    fn assign(&self, name: &str, value: Value) {
        self.declare(name, value);
    }

    /// Names visible from this environment, for debugger frames.
    fn names(&self) -> Vec<String>;
}

/// The outermost environment: a plain map of names to values.
#[derive(Debug, Default)]
pub struct MapVariableResolverFactory {
    variables: RwLock<HashMap<String, Value>>,
}

impl MapVariableResolverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.write().insert(name.into(), value.into());
        self
    }

    /// Snapshot of every binding.
    pub fn variables(&self) -> HashMap<String, Value> {
        self.variables.read().clone()
    }
}

impl From<HashMap<String, Value>> for MapVariableResolverFactory {
    fn from(variables: HashMap<String, Value>) -> Self {
        MapVariableResolverFactory {
            variables: RwLock::new(variables),
        }
    }
}

impl VariableResolverFactory for MapVariableResolverFactory {
    fn is_resolvable(&self, name: &str) -> bool {
        self.variables.read().contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.variables.read().get(name).cloned()
    }

    fn declare(&self, name: &str, value: Value) {
        self.variables.write().insert(name.to_string(), value);
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// A block scope (loop body, function call) in front of a parent environment.
pub struct ScopedVariableResolverFactory<'p> {
    parent: &'p dyn VariableResolverFactory,
    locals: RwLock<HashMap<String, Value>>,
    /// Assignments to unknown names stay local (function bodies) instead of
    /// being declared in the parent
    captures: bool,
}

impl<'p> ScopedVariableResolverFactory<'p> {
    pub fn new(parent: &'p dyn VariableResolverFactory, captures: bool) -> Self {
        ScopedVariableResolverFactory {
            parent,
            locals: RwLock::new(HashMap::new()),
            captures,
        }
    }
}

impl VariableResolverFactory for ScopedVariableResolverFactory<'_> {
    fn is_resolvable(&self, name: &str) -> bool {
        self.locals.read().contains_key(name) || self.parent.is_resolvable(name)
    }

    fn get(&self, name: &str) -> Option<Value> {
        match self.locals.read().get(name) {
            Some(value) => Some(value.clone()),
            None => self.parent.get(name),
        }
    }

    fn declare(&self, name: &str, value: Value) {
        self.locals.write().insert(name.to_string(), value);
    }

    fn assign(&self, name: &str, value: Value) {
        if let Some(slot) = self.locals.write().get_mut(name) {
            *slot = value;
            return;
        }
        if self.captures && !self.parent.is_resolvable(name) {
            self.declare(name, value);
        } else {
            self.parent.assign(name, value);
        }
    }

    fn names(&self) -> Vec<String> {
        let mut names = self.parent.names();
        names.extend(self.locals.read().keys().cloned());
        names.sort();
        names.dedup();
        names
    }
}

/// Exposes the fields and methods of a proto instance as variables, for the
/// body of one of its methods.
pub(crate) struct InstanceVariableResolverFactory<'p> {
    instance: ObjectRef,
    parent: &'p dyn VariableResolverFactory,
}

impl<'p> InstanceVariableResolverFactory<'p> {
    pub(crate) fn new(instance: ObjectRef, parent: &'p dyn VariableResolverFactory) -> Self {
        InstanceVariableResolverFactory { instance, parent }
    }
}

impl VariableResolverFactory for InstanceVariableResolverFactory<'_> {
    fn is_resolvable(&self, name: &str) -> bool {
        self.instance.proto.field(name).is_some()
            || self.instance.proto.method(name).is_some()
            || self.parent.is_resolvable(name)
    }

    fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.instance.field(name) {
            return Some(value);
        }
        if let Some(method) = self.instance.proto.method(name) {
            return Some(Value::Function(method.clone()));
        }
        self.parent.get(name)
    }

    fn declare(&self, name: &str, value: Value) {
        self.parent.declare(name, value);
    }

    fn assign(&self, name: &str, value: Value) {
        if self.instance.proto.field(name).is_some() {
            self.instance.fields.write().insert(name.to_string(), value);
        } else {
            self.parent.assign(name, value);
        }
    }

    fn names(&self) -> Vec<String> {
        let mut names = self.parent.names();
        names.extend(self.instance.proto.fields.iter().map(|f| f.name.clone()));
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_shadows_and_delegates() {
        let outer = MapVariableResolverFactory::new().with("x", 1);
        let scope = ScopedVariableResolverFactory::new(&outer, false);
        scope.declare("item", Value::Integer(5));
        assert_eq!(scope.get("x"), Some(Value::Integer(1)));
        assert_eq!(scope.get("item"), Some(Value::Integer(5)));
        assert!(!outer.is_resolvable("item"));
    }

    #[test]
    fn test_assign_updates_outer_binding() {
        let outer = MapVariableResolverFactory::new().with("total", 0);
        let scope = ScopedVariableResolverFactory::new(&outer, false);
        scope.assign("total", Value::Integer(3));
        scope.assign("fresh", Value::Integer(1));
        assert_eq!(outer.get("total"), Some(Value::Integer(3)));
        assert_eq!(outer.get("fresh"), Some(Value::Integer(1)));
    }

    #[test]
    fn test_capturing_scope_keeps_new_names() {
        let outer = MapVariableResolverFactory::new();
        let scope = ScopedVariableResolverFactory::new(&outer, true);
        scope.assign("local", Value::Integer(1));
        assert_eq!(scope.get("local"), Some(Value::Integer(1)));
        assert!(!outer.is_resolvable("local"));
    }
}
