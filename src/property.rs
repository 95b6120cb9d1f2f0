//! Property resolution: reading and writing one chain segment on a runtime value.
//!
//! The interpreter depends only on the [`PropertyResolver`] capability. The
//! bundled [`ReflectiveResolver`] walks maps, lists, arrays, strings, proto
//! instances and the builtin static types; hosts with their own object model can
//! plug in a different resolver through [`crate::Interpreter::with_resolver`].

mod methods;
mod statics;

use crate::error::{AccessError, CompileError, Diagnostic, Error, Location, Severity};
use crate::interpreter::Interpreter;
use crate::value::Value;
use crate::variables::MapVariableResolverFactory;

/// One evaluated step of a property chain.
#[derive(Debug, Clone, Copy)]
pub enum Segment<'a> {
    /// `.name`
    Property(&'a str),
    /// `[index]`
    Index(&'a Value),
    /// `.name(args)`
    Method { name: &'a str, args: &'a [Value] },
}

impl Segment<'_> {
    pub fn describe(&self) -> String {
        match self {
            Segment::Property(name) => (*name).to_string(),
            Segment::Index(index) => format!("[{index}]"),
            Segment::Method { name, .. } => format!("{name}()"),
        }
    }
}

/// Reads and writes single chain segments.
pub trait PropertyResolver: Send + Sync {
    fn get(&self, segment: &Segment<'_>, target: &Value) -> Result<Value, AccessError>;

    fn set(&self, segment: &Segment<'_>, target: &Value, value: Value) -> Result<(), AccessError>;

    /// Whether `target` has a property called `name`, used to decide whether a
    /// bare identifier is a property of the root object.
    fn has_property(&self, name: &str, target: &Value) -> bool {
        self.get(&Segment::Property(name), target).is_ok()
    }
}

/// Resolver over the builtin value model.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReflectiveResolver;

fn index_of(index: &Value, len: usize) -> Result<usize, AccessError> {
    let Some(n) = index.as_i64() else {
        return Err(AccessError::InvalidArguments {
            method: "[]".to_string(),
            message: format!("index must be an integer, got {}", index.type_name()),
        });
    };
    usize::try_from(n)
        .ok()
        .filter(|i| *i < len)
        .ok_or(AccessError::IndexOutOfBounds { index: n, len })
}

fn no_property(name: &str, target: &Value) -> AccessError {
    AccessError::NoSuchProperty {
        property: name.to_string(),
        type_name: target.type_name().to_string(),
    }
}

impl ReflectiveResolver {
    fn get_property(&self, name: &str, target: &Value) -> Result<Value, AccessError> {
        match (target, name) {
            (Value::Type(ty), _) => statics::field(ty, name),
            (_, "class") => Ok(target.ty().map(Value::Type).unwrap_or(Value::Null)),
            (Value::Map(map), _) => Ok(map.read().get(name).cloned().unwrap_or(Value::Null)),
            (Value::Object(instance), _) => {
                instance.field(name).ok_or_else(|| no_property(name, target))
            }
            (Value::List(_) | Value::Array(_) | Value::String(_), "length" | "size") => {
                let len = target.len().unwrap_or_default();
                Ok(Value::Integer(i32::try_from(len).unwrap_or(i32::MAX)))
            }
            (Value::List(_) | Value::Array(_) | Value::String(_), "empty") => {
                Ok(Value::Boolean(target.len() == Some(0)))
            }
            _ => Err(no_property(name, target)),
        }
    }

    fn get_index(&self, index: &Value, target: &Value) -> Result<Value, AccessError> {
        match target {
            Value::List(items) | Value::Array(items) => {
                let items = items.read();
                let i = index_of(index, items.len())?;
                Ok(items[i].clone())
            }
            Value::Map(map) => Ok(map
                .read()
                .get(&index.as_string())
                .cloned()
                .unwrap_or(Value::Null)),
            Value::String(s) => {
                let i = index_of(index, s.chars().count())?;
                Ok(s.chars().nth(i).map(Value::Char).unwrap_or(Value::Null))
            }
            Value::Object(instance) => {
                let name = index.as_string();
                instance.field(&name).ok_or_else(|| no_property(&name, target))
            }
            _ => Err(AccessError::NotIndexable {
                type_name: target.type_name().to_string(),
            }),
        }
    }
}

impl PropertyResolver for ReflectiveResolver {
    fn get(&self, segment: &Segment<'_>, target: &Value) -> Result<Value, AccessError> {
        if target.is_null() {
            return Err(AccessError::NullTarget {
                segment: segment.describe(),
            });
        }
        match segment {
            Segment::Property(name) => self.get_property(name, target),
            Segment::Index(index) => self.get_index(index, target),
            Segment::Method { name, args } => match target {
                Value::Type(ty) => statics::call(ty, name, args),
                _ => methods::call(target, name, args),
            },
        }
    }

    fn set(&self, segment: &Segment<'_>, target: &Value, value: Value) -> Result<(), AccessError> {
        match (segment, target) {
            (_, Value::Null) => Err(AccessError::NullTarget {
                segment: segment.describe(),
            }),
            (Segment::Property(name), Value::Map(map)) => {
                map.write().insert((*name).to_string(), value);
                Ok(())
            }
            (Segment::Index(index), Value::Map(map)) => {
                map.write().insert(index.as_string(), value);
                Ok(())
            }
            (Segment::Index(index), Value::List(items) | Value::Array(items)) => {
                let mut items = items.write();
                let i = index_of(index, items.len())?;
                items[i] = value;
                Ok(())
            }
            (Segment::Property(name), Value::Object(instance)) => {
                if instance.proto.field(name).is_none() {
                    return Err(no_property(name, target));
                }
                instance.fields.write().insert((*name).to_string(), value);
                Ok(())
            }
            (Segment::Index(_), Value::Object(_) | Value::String(_) | Value::Type(_))
            | (Segment::Property(_) | Segment::Method { .. }, _) => Err(AccessError::ReadOnly {
                type_name: target.type_name().to_string(),
            }),
            (Segment::Index(_), _) => Err(AccessError::NotIndexable {
                type_name: target.type_name().to_string(),
            }),
        }
    }

    fn has_property(&self, name: &str, target: &Value) -> bool {
        match target {
            Value::Map(map) => map.read().contains_key(name),
            Value::Object(instance) => instance.proto.field(name).is_some(),
            Value::Null => false,
            _ => self.get_property(name, target).is_ok(),
        }
    }
}

fn not_a_path(path: &str) -> Error {
    Error::Compile(CompileError {
        diagnostics: vec![Diagnostic {
            severity: Severity::Error,
            message: "expected a property path".to_string(),
            location: Location {
                offset: 0,
                line: 1,
                column: 0,
                snippet: path.to_string(),
            },
        }],
    })
}

/// Read `path` (`a.b[0].c`) from `root` with the reflective resolver.
///
/// # Examples
///
/// ```
/// use mace_lang::{Value, get_property};
/// use std::collections::HashMap;
///
/// let mut fields = HashMap::new();
/// fields.insert("name".to_string(), Value::from("Alice"));
/// let root = Value::map(fields);
///
/// assert_eq!(get_property("name.length()", &root).unwrap(), Value::Integer(5));
/// ```
pub fn get_property(path: &str, root: &Value) -> Result<Value, Error> {
    let compiled = crate::compile_expression(path)?;
    let vars = MapVariableResolverFactory::new();
    Ok(Interpreter::new().execute(&compiled, root.clone(), &vars)?)
}

/// Write `value` through `path` on `root` with the reflective resolver.
pub fn set_property(path: &str, root: &Value, value: Value) -> Result<(), Error> {
    let compiled = crate::compile_expression(path)?;
    let chain = compiled.chain().nodes().iter().find_map(|node| match &node.kind {
        crate::ast::NodeKind::Property(chain) if !chain.segments.is_empty() => Some(chain),
        _ => None,
    });
    let Some(chain) = chain else {
        return Err(not_a_path(path));
    };
    let vars = MapVariableResolverFactory::new();
    Ok(Interpreter::new().write_path(chain, root, &vars, value)?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::map(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_map_property_defaults_to_null() {
        let resolver = ReflectiveResolver;
        let target = map(&[("a", Value::Integer(1))]);
        assert_eq!(resolver.get(&Segment::Property("a"), &target), Ok(Value::Integer(1)));
        assert_eq!(resolver.get(&Segment::Property("b"), &target), Ok(Value::Null));
        assert!(resolver.has_property("a", &target));
        assert!(!resolver.has_property("b", &target));
    }

    #[test]
    fn test_list_index_bounds() {
        let resolver = ReflectiveResolver;
        let list = Value::list(vec![Value::Integer(1)]);
        assert_eq!(resolver.get(&Segment::Index(&Value::Integer(0)), &list), Ok(Value::Integer(1)));
        assert_eq!(
            resolver.get(&Segment::Index(&Value::Integer(3)), &list),
            Err(AccessError::IndexOutOfBounds { index: 3, len: 1 })
        );
    }

    #[test]
    fn test_set_through_shared_map() {
        let resolver = ReflectiveResolver;
        let inner = Value::empty_map();
        let root = map(&[("innermap", inner.clone())]);
        let target = resolver.get(&Segment::Property("innermap"), &root).unwrap();
        resolver
            .set(&Segment::Index(&Value::from("test")), &target, Value::from("bar"))
            .unwrap();
        assert_eq!(
            resolver.get(&Segment::Index(&Value::from("test")), &inner),
            Ok(Value::from("bar"))
        );
    }

    #[test]
    fn test_null_target() {
        let resolver = ReflectiveResolver;
        assert_eq!(
            resolver.get(&Segment::Property("x"), &Value::Null),
            Err(AccessError::NullTarget {
                segment: "x".to_string()
            })
        );
    }

    #[test]
    fn test_get_and_set_property_paths() {
        let root = map(&[("innermap", Value::empty_map())]);
        set_property("innermap['test']", &root, Value::from("bar")).unwrap();
        assert_eq!(get_property("innermap['test']", &root).unwrap(), Value::from("bar"));
        assert!(set_property("42", &root, Value::Null).is_err());
    }
}
