//! Control blocks, inline collections, object construction and calls.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::trace;

use super::{Completion, Env, Interpreter, invalid_operand};
use crate::ast::{
    ForBlock, ForEachBlock, Function, IfBlock, InlineCollection, NewObject, Projection, Proto,
    Ty, WhileBlock, WithBlock,
};
use crate::error::RuntimeError;
use crate::operations::coerce;
use crate::value::{Instance, ObjectRef, Value};
use crate::variables::{
    InstanceVariableResolverFactory, ScopedVariableResolverFactory, VariableResolverFactory,
};

/// Value of a declared but uninitialised slot.
pub(crate) fn default_value(ty: &Ty) -> Value {
    match ty {
        Ty::Boolean => Value::Boolean(false),
        Ty::Char => Value::Char('\0'),
        Ty::Integer => Value::Integer(0),
        Ty::Long => Value::Long(0),
        Ty::Double => Value::Double(0.0),
        Ty::Decimal => Value::Decimal(Default::default()),
        _ => Value::Null,
    }
}

/// Elements visited by `foreach` and projections.
fn iterable(operation: &str, value: &Value) -> Result<Vec<Value>, RuntimeError> {
    match value {
        Value::List(items) | Value::Array(items) => Ok(items.read().clone()),
        Value::Map(map) => {
            let mut keys: Vec<String> = map.read().keys().cloned().collect();
            keys.sort();
            Ok(keys.into_iter().map(Value::String).collect())
        }
        Value::String(s) => Ok(s.chars().map(Value::Char).collect()),
        Value::Integer(_) | Value::Long(_) => {
            let n = value.as_i64().unwrap_or_default();
            Ok((1..=n).map(|i| narrow(Value::Long(i))).collect())
        }
        other => Err(invalid_operand(operation, "a collection", other)),
    }
}

fn narrow(value: Value) -> Value {
    match value {
        Value::Long(n) => i32::try_from(n).map_or(value, Value::Integer),
        other => other,
    }
}

fn array_length(value: &Value) -> Result<usize, RuntimeError> {
    value
        .as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid_operand("new", "a non-negative length", value))
}

impl Interpreter<'_> {
    pub(super) fn run_if(&self, block: &IfBlock, env: Env<'_>) -> Result<Completion, RuntimeError> {
        let mut branch = Some(block);
        while let Some(current) = branch {
            let taken = match &current.condition {
                Some(condition) => self.condition(condition, env)?,
                None => true,
            };
            if taken {
                return self.run(&current.body, env);
            }
            branch = current.otherwise.as_deref();
        }
        Ok(Completion::default())
    }

    pub(super) fn run_foreach(
        &self,
        block: &ForEachBlock,
        env: Env<'_>,
    ) -> Result<Completion, RuntimeError> {
        let collection = self.value_of(&block.collection, env)?;
        for item in iterable("foreach", &collection)? {
            let item = match &block.item_ty {
                Some(ty) => coerce(&item, ty)?,
                None => item,
            };
            let scope = ScopedVariableResolverFactory::new(env.vars, false);
            scope.declare(&block.item, item);
            let completion = self.run(&block.body, env.with_vars(&scope))?;
            if completion.returned {
                return Ok(completion);
            }
        }
        Ok(Completion::default())
    }

    pub(super) fn run_for(&self, block: &ForBlock, env: Env<'_>) -> Result<Completion, RuntimeError> {
        let scope = ScopedVariableResolverFactory::new(env.vars, false);
        let env = env.with_vars(&scope);
        self.run(&block.init, env)?;
        loop {
            if let Some(condition) = &block.condition
                && !self.condition(condition, env)?
            {
                break;
            }
            let completion = self.run(&block.body, env)?;
            if completion.returned {
                return Ok(completion);
            }
            self.run(&block.step, env)?;
        }
        Ok(Completion::default())
    }

    pub(super) fn run_while(
        &self,
        block: &WhileBlock,
        env: Env<'_>,
    ) -> Result<Completion, RuntimeError> {
        while self.condition(&block.condition, env)? != block.until {
            let completion = self.run_body(block, env)?;
            if completion.returned {
                return Ok(completion);
            }
        }
        Ok(Completion::default())
    }

    pub(super) fn run_do(&self, block: &WhileBlock, env: Env<'_>) -> Result<Completion, RuntimeError> {
        loop {
            let completion = self.run_body(block, env)?;
            if completion.returned {
                return Ok(completion);
            }
            if self.condition(&block.condition, env)? == block.until {
                return Ok(Completion::default());
            }
        }
    }

    fn run_body(&self, block: &WhileBlock, env: Env<'_>) -> Result<Completion, RuntimeError> {
        let scope = ScopedVariableResolverFactory::new(env.vars, false);
        self.run(&block.body, env.with_vars(&scope))
    }

    pub(super) fn run_with(&self, block: &WithBlock, env: Env<'_>) -> Result<Value, RuntimeError> {
        let target = self.value_of(&block.target, env)?;
        self.apply_with(&target, &block.assignments, env)?;
        Ok(target)
    }

    pub(super) fn collection(
        &self,
        collection: &InlineCollection,
        env: Env<'_>,
    ) -> Result<Value, RuntimeError> {
        Ok(match collection {
            InlineCollection::List(items) => Value::list(self.values_of(items, env)?),
            InlineCollection::Array(items) => Value::array(self.values_of(items, env)?),
            InlineCollection::Map(entries) => {
                let mut map = HashMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.value_of(key, env)?.as_string();
                    map.insert(key, self.value_of(value, env)?);
                }
                Value::map(map)
            }
        })
    }

    /// `(item in collection)`: evaluate `item` with every element as the root.
    pub(super) fn project(
        &self,
        projection: &Projection,
        env: Env<'_>,
    ) -> Result<Value, RuntimeError> {
        let collection = self.value_of(&projection.collection, env)?;
        let items = iterable("projection", &collection)?;
        let mut projected = Vec::with_capacity(items.len());
        for item in &items {
            projected.push(self.value_of(&projection.item, env.with_root(item))?);
        }
        Ok(Value::list(projected))
    }

    pub(super) fn instantiate(&self, new: &NewObject, env: Env<'_>) -> Result<Value, RuntimeError> {
        let args = self.values_of(&new.args, env)?;
        if new.array {
            let [length] = args.as_slice() else {
                return Err(RuntimeError::ArityMismatch {
                    name: format!("new {}[]", new.ty),
                    expected: 1,
                    found: args.len(),
                });
            };
            let fill = default_value(&new.ty);
            return Ok(Value::array(vec![fill; array_length(length)?]));
        }

        let value = match (&new.ty, args.as_slice()) {
            (Ty::List, []) | (Ty::List, [Value::Integer(_)]) => Value::list(Vec::new()),
            (Ty::List, [source]) => match source.elements() {
                Some(items) => Value::list(items),
                None => return Err(invalid_operand("new List", "a collection", source)),
            },
            (Ty::Map | Ty::Object, []) => Value::empty_map(),
            (Ty::Map, [Value::Map(source)]) => Value::map(source.read().clone()),
            (Ty::Array, [length]) => Value::array(vec![Value::Null; array_length(length)?]),
            (Ty::String, []) => Value::String(String::new()),
            (Ty::String, [value]) => Value::String(value.as_string()),
            (ty, []) if ty.is_numeric() || matches!(ty, Ty::Boolean | Ty::Char) => {
                default_value(ty)
            }
            (ty, [value]) if ty.is_numeric() || matches!(ty, Ty::Boolean | Ty::Char) => {
                coerce(value, ty)?
            }
            (Ty::Proto(name), _) => match env.vars.get(name) {
                Some(Value::Proto(proto)) => self.instantiate_proto(&proto, &args, env)?,
                _ => {
                    return Err(RuntimeError::Unresolved {
                        name: name.to_string(),
                    });
                }
            },
            (ty, _) => {
                return Err(RuntimeError::InvalidOperand {
                    operation: "new".to_string(),
                    expected: "an instantiable type".to_string(),
                    actual: ty.name().to_string(),
                });
            }
        };
        Ok(value)
    }

    fn instantiate_proto(
        &self,
        proto: &Arc<Proto>,
        args: &[Value],
        env: Env<'_>,
    ) -> Result<Value, RuntimeError> {
        if args.len() > proto.fields.len() {
            return Err(RuntimeError::ArityMismatch {
                name: proto.name.to_string(),
                expected: proto.fields.len(),
                found: args.len(),
            });
        }
        let mut fields = HashMap::with_capacity(proto.fields.len());
        for (i, field) in proto.fields.iter().enumerate() {
            let value = match (args.get(i), &field.init) {
                (Some(arg), _) => arg.clone(),
                (None, Some(init)) => self.value_of(init, env)?,
                (None, None) => field.ty.as_ref().map(default_value).unwrap_or_default(),
            };
            let value = match &field.ty {
                Some(ty) => coerce(&value, ty)?,
                None => value,
            };
            fields.insert(field.name.clone(), value);
        }
        trace!(proto = %proto.name, "instantiated");
        Ok(Value::Object(Arc::new(Instance {
            proto: proto.clone(),
            fields: RwLock::new(fields),
        })))
    }

    /// Call a user function. Methods run with their instance as the root and its
    /// fields in scope.
    pub(super) fn call_function(
        &self,
        function: &Function,
        args: &[Value],
        this: Option<&ObjectRef>,
        env: Env<'_>,
    ) -> Result<Value, RuntimeError> {
        if args.len() != function.arity() {
            return Err(RuntimeError::ArityMismatch {
                name: function.name.clone(),
                expected: function.arity(),
                found: args.len(),
            });
        }
        trace!(function = %function.name, args = args.len(), "call");

        let instance_scope;
        let parent: &dyn VariableResolverFactory = match this {
            Some(instance) => {
                instance_scope = InstanceVariableResolverFactory::new(instance.clone(), env.vars);
                &instance_scope
            }
            None => env.vars,
        };
        let scope = ScopedVariableResolverFactory::new(parent, true);
        for (param, arg) in function.params.iter().zip(args) {
            let value = match &param.ty {
                Some(ty) => coerce(arg, ty)?,
                None => arg.clone(),
            };
            scope.declare(&param.name, value);
        }

        let this_value;
        let root = match this {
            Some(instance) => {
                this_value = Value::Object(instance.clone());
                &this_value
            }
            None => env.root,
        };
        let body_env = Env {
            root,
            vars: &scope,
            decimal: env.decimal,
            text: env.text,
        };
        Ok(self.run(&function.body, body_env)?.value)
    }
}
