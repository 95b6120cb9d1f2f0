use std::collections::HashMap;

use mace_lang::error::AccessError;
use mace_lang::{
    Error, Interpreter, MapVariableResolverFactory, PropertyResolver, ReflectiveResolver,
    RuntimeError, Segment, Value, compile_expression, get_property, set_property,
};
use pretty_assertions::assert_eq;

fn base() -> Value {
    let mut fields = HashMap::new();
    fields.insert("innermap".to_string(), Value::empty_map());
    fields.insert(
        "items".to_string(),
        Value::list(vec![Value::from("a"), Value::from("b")]),
    );
    Value::map(fields)
}

#[test]
fn test_set_then_get_through_index() {
    let root = base();
    set_property("innermap['test']", &root, Value::from("bar")).unwrap();
    assert_eq!(get_property("innermap['test']", &root).unwrap(), Value::from("bar"));
    assert_eq!(get_property("innermap.test", &root).unwrap(), Value::from("bar"));
}

#[test]
fn test_set_list_element() {
    let root = base();
    set_property("items[1]", &root, Value::from("z")).unwrap();
    assert_eq!(get_property("items[1]", &root).unwrap(), Value::from("z"));
    assert_eq!(get_property("items.size()", &root).unwrap(), Value::Integer(2));
}

#[test]
fn test_out_of_bounds_write_is_reported() {
    let root = base();
    let err = set_property("items[5]", &root, Value::Null).unwrap_err();
    assert!(matches!(
        err,
        Error::Runtime(RuntimeError::Access {
            error: AccessError::IndexOutOfBounds { index: 5, len: 2 },
            ..
        })
    ));
}

#[test]
fn test_strings_are_read_only() {
    let mut fields = HashMap::new();
    fields.insert("name".to_string(), Value::from("mace"));
    let root = Value::map(fields);
    assert!(matches!(
        set_property("name.length", &root, Value::Integer(1)),
        Err(Error::Runtime(RuntimeError::Access {
            error: AccessError::ReadOnly { .. },
            ..
        }))
    ));
}

#[test]
fn test_set_requires_a_path() {
    assert!(matches!(
        set_property("name", &base(), Value::Null),
        Err(Error::Compile(_))
    ));
}

/// Exposes `upper` on strings and otherwise behaves like the builtin resolver.
struct UpperResolver;

impl PropertyResolver for UpperResolver {
    fn get(&self, segment: &Segment<'_>, target: &Value) -> Result<Value, AccessError> {
        match (segment, target) {
            (Segment::Property("upper"), Value::String(s)) => Ok(Value::from(s.to_uppercase())),
            _ => ReflectiveResolver.get(segment, target),
        }
    }

    fn set(&self, segment: &Segment<'_>, target: &Value, value: Value) -> Result<(), AccessError> {
        ReflectiveResolver.set(segment, target, value)
    }
}

#[test]
fn test_custom_resolver() {
    let compiled = compile_expression("greeting.upper + '!'").unwrap();
    let vars = MapVariableResolverFactory::new().with("greeting", "hi");
    let resolver = UpperResolver;

    let value = Interpreter::new()
        .with_resolver(&resolver)
        .execute(&compiled, Value::Null, &vars)
        .unwrap();
    assert_eq!(value, Value::from("HI!"));

    let err = Interpreter::new()
        .execute(&compiled, Value::Null, &vars)
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Access {
            error: AccessError::NoSuchProperty { .. },
            ..
        }
    ));
}
