//! Property chains: root resolution through the accessor cache, segment reads
//! and assignment writes.

use tracing::trace;

use super::{Env, Interpreter};
use crate::accessor::{AccessorCache, RootBinding};
use crate::ast::{
    AssignMode, AssignTarget, Assignment, ChainRoot, ChainSegment, Op, PropertyChain,
    WithAssignment,
};
use crate::error::{AccessError, RuntimeError};
use crate::operations::{coerce, reduce};
use crate::property::Segment;
use crate::value::Value;
use crate::variables::{MapVariableResolverFactory, VariableResolverFactory};

fn access(text: &str, error: AccessError) -> RuntimeError {
    RuntimeError::Access {
        expr: text.to_string(),
        error,
    }
}

/// New stored value and the value the assignment yields.
fn updated_value(
    mode: AssignMode,
    op: Option<Op>,
    rhs: Option<Value>,
    current: impl FnOnce() -> Result<Value, RuntimeError>,
    decimal: bool,
) -> Result<(Value, Value), RuntimeError> {
    match mode {
        AssignMode::Prefix | AssignMode::Postfix => {
            let current = current()?;
            let updated = reduce(op.unwrap_or(Op::Add), &current, &Value::Integer(1), decimal)?;
            if mode == AssignMode::Prefix {
                Ok((updated.clone(), updated))
            } else {
                Ok((updated, current))
            }
        }
        AssignMode::Assign | AssignMode::Declare => {
            let rhs = rhs.unwrap_or_default();
            let value = match op {
                Some(op) => reduce(op, &current()?, &rhs, decimal)?,
                None => rhs,
            };
            Ok((value.clone(), value))
        }
    }
}

impl Interpreter<'_> {
    pub(super) fn read_chain(
        &self,
        chain: &PropertyChain,
        cache: &AccessorCache,
        env: Env<'_>,
    ) -> Result<Value, RuntimeError> {
        let (root, consumed) = self.resolve_root(chain, cache, env)?;
        let segments = chain.segments.get(consumed..).unwrap_or_default();
        self.apply_segments(root, segments, env, &chain.text)
    }

    /// Value of the chain's root and the number of segments it already covers.
    fn resolve_root(
        &self,
        chain: &PropertyChain,
        cache: &AccessorCache,
        env: Env<'_>,
    ) -> Result<(Value, usize), RuntimeError> {
        match &chain.root {
            ChainRoot::This => Ok((env.root.clone(), 0)),
            ChainRoot::Type(ty) => Ok((Value::Type(ty.clone()), 0)),
            ChainRoot::Call { name, args } => {
                let args = self.values_of(args, env)?;
                Ok((self.call_named(name, &args, env)?, 0))
            }
            ChainRoot::Identifier(name) => self.resolve_identifier(name, chain, cache, env),
        }
    }

    fn resolve_identifier(
        &self,
        name: &str,
        chain: &PropertyChain,
        cache: &AccessorCache,
        env: Env<'_>,
    ) -> Result<(Value, usize), RuntimeError> {
        if let Some(binding) = cache.binding() {
            if let Some(found) = self.try_binding(&binding, name, env, &chain.text)? {
                return Ok(found);
            }
            cache.deoptimize(&chain.text);
        }

        if let Some(value) = env.vars.get(name) {
            cache.optimize(RootBinding::Variable);
            return Ok((value, 0));
        }
        if self.resolver.has_property(name, env.root) {
            let value = self
                .resolver
                .get(&Segment::Property(name), env.root)
                .map_err(|e| access(&chain.text, e))?;
            cache.optimize(RootBinding::RootProperty);
            return Ok((value, 0));
        }
        if let Some((ty, consumed)) = chain.qualified_static() {
            cache.optimize(RootBinding::Static {
                ty: ty.clone(),
                consumed,
            });
            return Ok((Value::Type(ty), consumed));
        }
        Err(RuntimeError::Unresolved {
            name: name.to_string(),
        })
    }

    /// Resolve through a cached binding; `None` when it no longer applies.
    fn try_binding(
        &self,
        binding: &RootBinding,
        name: &str,
        env: Env<'_>,
        text: &str,
    ) -> Result<Option<(Value, usize)>, RuntimeError> {
        Ok(match binding {
            RootBinding::Variable => env.vars.get(name).map(|value| (value, 0)),
            RootBinding::RootProperty
                if !env.vars.is_resolvable(name) && self.resolver.has_property(name, env.root) =>
            {
                let value = self
                    .resolver
                    .get(&Segment::Property(name), env.root)
                    .map_err(|e| access(text, e))?;
                Some((value, 0))
            }
            RootBinding::RootProperty => None,
            RootBinding::Static { ty, consumed } => Some((Value::Type(ty.clone()), *consumed)),
        })
    }

    /// `name(args)` as a chain root.
    fn call_named(&self, name: &str, args: &[Value], env: Env<'_>) -> Result<Value, RuntimeError> {
        let callee = match env.vars.get(name) {
            Some(value) => value,
            None if self.resolver.has_property(name, env.root) => self
                .resolver
                .get(&Segment::Property(name), env.root)
                .map_err(|e| access(name, e))?,
            None => {
                return Err(RuntimeError::Unresolved {
                    name: name.to_string(),
                });
            }
        };
        let Value::Function(function) = callee else {
            return Err(RuntimeError::NotCallable {
                name: name.to_string(),
            });
        };
        // a sibling method called from inside a method body keeps its instance
        let this = match env.root {
            Value::Object(instance)
                if instance
                    .proto
                    .method(name)
                    .is_some_and(|m| std::sync::Arc::ptr_eq(m, &function)) =>
            {
                Some(instance)
            }
            _ => None,
        };
        self.call_function(&function, args, this, env)
    }

    pub(super) fn apply_segments(
        &self,
        mut current: Value,
        segments: &[ChainSegment],
        env: Env<'_>,
        text: &str,
    ) -> Result<Value, RuntimeError> {
        for segment in segments {
            current = match segment {
                ChainSegment::Property { name, null_safe } => {
                    if *null_safe && current.is_null() {
                        return Ok(Value::Null);
                    }
                    self.resolver
                        .get(&Segment::Property(name), &current)
                        .map_err(|e| access(text, e))?
                }
                ChainSegment::Index(index) => {
                    let index = self.value_of(index, env)?;
                    self.resolver
                        .get(&Segment::Index(&index), &current)
                        .map_err(|e| access(text, e))?
                }
                ChainSegment::Method {
                    name,
                    args,
                    null_safe,
                } => {
                    if *null_safe && current.is_null() {
                        return Ok(Value::Null);
                    }
                    let args = self.values_of(args, env)?;
                    self.invoke(&current, name, &args, env, text)?
                }
                ChainSegment::With(assignments) => {
                    self.apply_with(&current, assignments, env)?;
                    current
                }
            };
        }
        Ok(current)
    }

    fn invoke(
        &self,
        target: &Value,
        name: &str,
        args: &[Value],
        env: Env<'_>,
        text: &str,
    ) -> Result<Value, RuntimeError> {
        match target {
            Value::Object(instance) => {
                if let Some(method) = instance.proto.method(name) {
                    return self.call_function(method, args, Some(instance), env);
                }
            }
            Value::Function(function) if name == "call" => {
                return self.call_function(function, args, None, env);
            }
            _ => {}
        }
        trace!(method = name, target = target.type_name(), "invoke");
        self.resolver
            .get(&Segment::Method { name, args }, target)
            .map_err(|e| access(text, e))
    }

    pub(super) fn apply_with(
        &self,
        target: &Value,
        assignments: &[WithAssignment],
        env: Env<'_>,
    ) -> Result<(), RuntimeError> {
        for assignment in assignments {
            let Some((last, prefix)) = assignment.path.split_last() else {
                continue;
            };
            let owner = self.apply_segments(target.clone(), prefix, env, &assignment.text)?;
            let rhs = self.value_of(&assignment.value, env)?;
            self.write_segment(
                &owner,
                last,
                (AssignMode::Assign, assignment.op),
                Some(rhs),
                env,
                &assignment.text,
            )?;
        }
        Ok(())
    }

    /// Write through the final segment of a chain on `owner`.
    fn write_segment(
        &self,
        owner: &Value,
        segment: &ChainSegment,
        (mode, op): (AssignMode, Option<Op>),
        rhs: Option<Value>,
        env: Env<'_>,
        text: &str,
    ) -> Result<Value, RuntimeError> {
        let index;
        let key = match segment {
            ChainSegment::Property { name, .. } => Segment::Property(name),
            ChainSegment::Index(chain) => {
                index = self.value_of(chain, env)?;
                Segment::Index(&index)
            }
            ChainSegment::Method { name, .. } => {
                return Err(access(
                    text,
                    AccessError::ReadOnly {
                        type_name: format!("{name}()"),
                    },
                ));
            }
            ChainSegment::With(_) => {
                return Err(access(
                    text,
                    AccessError::ReadOnly {
                        type_name: "with block".to_string(),
                    },
                ));
            }
        };
        let current = || self.resolver.get(&key, owner).map_err(|e| access(text, e));
        let (stored, result) = updated_value(mode, op, rhs, current, env.decimal)?;
        self.resolver
            .set(&key, owner, stored)
            .map_err(|e| access(text, e))?;
        Ok(result)
    }

    pub(super) fn assign(
        &self,
        assignment: &Assignment,
        cache: &AccessorCache,
        env: Env<'_>,
    ) -> Result<Value, RuntimeError> {
        let chain = match &assignment.target {
            AssignTarget::Variable(name) => return self.assign_variable(assignment, name, env),
            AssignTarget::Property(chain) => chain,
        };
        let (root, consumed) = self.resolve_root(chain, cache, env)?;
        let segments = chain.segments.get(consumed..).unwrap_or_default();
        let Some((last, prefix)) = segments.split_last() else {
            return Err(access(
                &assignment.text,
                AccessError::ReadOnly {
                    type_name: root.type_name().to_string(),
                },
            ));
        };
        let owner = self.apply_segments(root, prefix, env, &chain.text)?;
        let rhs = match &assignment.value {
            Some(value) => Some(self.value_of(value, env)?),
            None => None,
        };
        self.write_segment(
            &owner,
            last,
            (assignment.mode, assignment.op),
            rhs,
            env,
            &assignment.text,
        )
    }

    fn assign_variable(
        &self,
        assignment: &Assignment,
        name: &str,
        env: Env<'_>,
    ) -> Result<Value, RuntimeError> {
        let rhs = match &assignment.value {
            Some(value) => Some(self.value_of(value, env)?),
            None => None,
        };

        if assignment.mode == AssignMode::Declare {
            let value = match (rhs, &assignment.declared) {
                (Some(value), Some(ty)) => coerce(&value, ty)?,
                (Some(value), None) => value,
                (None, Some(ty)) => super::blocks::default_value(ty),
                (None, None) => Value::Null,
            };
            env.vars.declare(name, value.clone());
            return Ok(value);
        }

        let on_root = !env.vars.is_resolvable(name) && self.resolver.has_property(name, env.root);
        let current = || self.read_name(name, env, &assignment.text);
        let (stored, result) =
            updated_value(assignment.mode, assignment.op, rhs, current, env.decimal)?;
        if on_root {
            self.resolver
                .set(&Segment::Property(name), env.root, stored)
                .map_err(|e| access(&assignment.text, e))?;
        } else {
            env.vars.assign(name, stored);
        }
        Ok(result)
    }

    fn read_name(&self, name: &str, env: Env<'_>, text: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = env.vars.get(name) {
            return Ok(value);
        }
        if self.resolver.has_property(name, env.root) {
            return self
                .resolver
                .get(&Segment::Property(name), env.root)
                .map_err(|e| access(text, e));
        }
        Err(RuntimeError::Unresolved {
            name: name.to_string(),
        })
    }

    /// Write `value` through `chain` on `root`, as in `root.a.b = value`.
    pub fn write_path(
        &self,
        chain: &PropertyChain,
        root: &Value,
        vars: &dyn VariableResolverFactory,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let env = Env {
            root,
            vars,
            decimal: false,
            text: &chain.text,
        };
        let cache = AccessorCache::default();
        let (start, consumed) = self.resolve_root(chain, &cache, env)?;
        let segments = chain.segments.get(consumed..).unwrap_or_default();
        let Some((last, prefix)) = segments.split_last() else {
            return Err(access(
                &chain.text,
                AccessError::ReadOnly {
                    type_name: start.type_name().to_string(),
                },
            ));
        };
        let owner = self.apply_segments(start, prefix, env, &chain.text)?;
        self.write_segment(
            &owner,
            last,
            (AssignMode::Assign, None),
            Some(value),
            env,
            &chain.text,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::AccessorState;
    use crate::ast::NodeKind;
    use crate::compile_expression;

    fn property_node(source: &str) -> crate::compiler::CompiledChain {
        compile_expression(source).unwrap()
    }

    #[test]
    fn test_root_binding_is_cached_then_deoptimized() {
        let compiled = property_node("name");
        let node = &compiled.chain().nodes()[0];
        assert!(matches!(node.kind, NodeKind::Property(_)));
        let interp = Interpreter::new();

        let vars = MapVariableResolverFactory::new().with("name", "var");
        let result = interp.execute(&compiled, Value::Null, &vars);
        assert_eq!(result, Ok(Value::from("var")));
        assert_eq!(node.accessor.state(), AccessorState::Optimized(RootBinding::Variable));

        let mut fields = std::collections::HashMap::new();
        fields.insert("name".to_string(), Value::from("root"));
        let empty = MapVariableResolverFactory::new();
        let result = interp.execute(&compiled, Value::map(fields), &empty);
        assert_eq!(result, Ok(Value::from("root")));
        assert_eq!(node.accessor.state(), AccessorState::Deoptimized { retries: 1 });
    }

    #[test]
    fn test_postfix_yields_previous_value() {
        let compiled = compile_expression("x++").unwrap();
        let vars = MapVariableResolverFactory::new().with("x", 4);
        let result = Interpreter::new().execute(&compiled, Value::Null, &vars);
        assert_eq!(result, Ok(Value::Integer(4)));
        assert_eq!(vars.get("x"), Some(Value::Integer(5)));
    }

    #[test]
    fn test_assignment_to_root_property() {
        let root = Value::empty_map();
        if let Value::Map(map) = &root {
            map.write().insert("count".to_string(), Value::Integer(1));
        }
        let compiled = compile_expression("count += 2").unwrap();
        let vars = MapVariableResolverFactory::new();
        Interpreter::new()
            .execute(&compiled, root.clone(), &vars)
            .unwrap();
        assert_eq!(crate::get_property("count", &root), Ok(Value::Integer(3)));
        assert!(!vars.is_resolvable("count"));
    }
}
