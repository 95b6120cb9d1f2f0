use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::ast::{Function, Proto, Ty};

/// Shared, mutable list storage backing both `List` and `Array` values.
pub type ListRef = Arc<RwLock<Vec<Value>>>;

/// Shared, mutable string-keyed map storage.
pub type MapRef = Arc<RwLock<HashMap<String, Value>>>;

/// Shared handle to a proto instance.
pub type ObjectRef = Arc<Instance>;

/// A runtime value of the expression language.
///
/// Scalars are stored inline. Collections and proto instances are shared cells,
/// so a write through one handle (`innermap['test'] = 'bar'`) is seen by every
/// other holder of the same collection.
///
/// # Examples
///
/// ```
/// use mace_lang::Value;
/// use std::collections::HashMap;
///
/// let number = Value::Integer(42);
/// let text = Value::from("hello");
/// let list = Value::list(vec![Value::Integer(1), Value::Integer(2)]);
///
/// let mut fields = HashMap::new();
/// fields.insert("name".to_string(), Value::from("Alice"));
/// let map = Value::map(fields);
///
/// assert_eq!(list.len(), Some(2));
/// assert_eq!(map.type_name(), "Map");
/// ```
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Char(char),
    /// 32-bit integer; overflow promotes to `Long`
    Integer(i32),
    /// 64-bit integer; overflow promotes to `Decimal`
    Long(i64),
    Double(f64),
    /// Arbitrary-precision decimal
    Decimal(Decimal),
    String(String),
    /// Growable list (`[1, 2]`, `new ArrayList()`)
    List(ListRef),
    /// Fixed-length array (`{1, 2}`, `new Array(3)`)
    Array(ListRef),
    Map(MapRef),
    /// A type reference (`String`, `Math`, a proto name)
    Type(Ty),
    /// An instance of a proto record
    Object(ObjectRef),
    Function(Arc<Function>),
    Proto(Arc<Proto>),
}

/// Instance of a user-defined proto.
#[derive(Debug)]
pub struct Instance {
    pub proto: Arc<Proto>,
    pub fields: RwLock<HashMap<String, Value>>,
}

impl Instance {
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(items)))
    }

    pub fn map(entries: HashMap<String, Value>) -> Self {
        Value::Map(Arc::new(RwLock::new(entries)))
    }

    pub fn empty_map() -> Self {
        Value::map(HashMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "Boolean",
            Value::Char(_) => "Character",
            Value::Integer(_) => "Integer",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::Decimal(_) => "BigDecimal",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Array(_) => "Array",
            Value::Map(_) => "Map",
            Value::Type(_) => "Class",
            Value::Object(obj) => &*obj.proto.name,
            Value::Function(_) => "Function",
            Value::Proto(_) => "Proto",
        }
    }

    /// Static type of this value; `None` for null.
    pub fn ty(&self) -> Option<Ty> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(_) => Ty::Boolean,
            Value::Char(_) => Ty::Char,
            Value::Integer(_) => Ty::Integer,
            Value::Long(_) => Ty::Long,
            Value::Double(_) => Ty::Double,
            Value::Decimal(_) => Ty::Decimal,
            Value::String(_) => Ty::String,
            Value::List(_) => Ty::List,
            Value::Array(_) => Ty::Array,
            Value::Map(_) => Ty::Map,
            Value::Type(_) | Value::Proto(_) => Ty::Class,
            Value::Object(obj) => Ty::Proto(obj.proto.name.clone()),
            Value::Function(_) => Ty::Function,
        })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Integer(_) | Value::Long(_) | Value::Double(_) | Value::Decimal(_)
        )
    }

    /// Truthiness used by loop and `if` conditions.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Long(n) => *n != 0,
            Value::Double(n) => *n != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::Char(_) => true,
            Value::List(items) | Value::Array(items) => !items.read().is_empty(),
            Value::Map(map) => !map.read().is_empty(),
            Value::Type(_) | Value::Object(_) | Value::Function(_) | Value::Proto(_) => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral view; doubles and decimals must be whole numbers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(i64::from(*n)),
            Value::Long(n) => Some(*n),
            Value::Double(n) if n.fract() == 0.0 => Some(*n as i64),
            Value::Decimal(d) if d.is_integer() => d.to_i64(),
            Value::Char(c) => Some(i64::from(u32::from(*c))),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(f64::from(*n)),
            Value::Long(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(n) => Some(Decimal::from(*n)),
            Value::Long(n) => Some(Decimal::from(*n)),
            Value::Double(n) => Decimal::from_f64(*n),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// String rendering used for concatenation and map keys.
    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Number of elements of a collection or characters of a string.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::List(items) | Value::Array(items) => Some(items.read().len()),
            Value::Map(map) => Some(map.read().len()),
            _ => None,
        }
    }

    /// Snapshot of the elements of a list or array.
    pub fn elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) | Value::Array(items) => Some(items.read().clone()),
            _ => None,
        }
    }

    /// Whether two values share the same collection or instance cell.
    pub fn same_ref(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) | (Value::Array(a), Value::Array(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Char(c), String(s)) | (String(s), Char(c)) => {
                let mut chars = s.chars();
                chars.next() == Some(*c) && chars.next().is_none()
            }
            (Integer(a), Integer(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Integer(a), Long(b)) | (Long(b), Integer(a)) => i64::from(*a) == *b,
            (Double(a), Double(b)) => a == b,
            (a, b) if a.is_numeric() && b.is_numeric() => {
                match (a.as_decimal(), b.as_decimal()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.as_f64() == b.as_f64(),
                }
            }
            (List(a), List(b)) | (Array(a), Array(b)) => {
                Arc::ptr_eq(a, b) || *a.read() == *b.read()
            }
            (Map(a), Map(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Type(a), Type(b)) => a == b,
            (Object(a), Object(b)) => Arc::ptr_eq(a, b),
            (Function(a), Function(b)) => Arc::ptr_eq(a, b),
            (Proto(a), Proto(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::Double(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{n:.1}")
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::List(items) | Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.read().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                let map = map.read();
                let mut keys: Vec<&std::string::String> = map.keys().collect();
                keys.sort();
                f.write_str("{")?;
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}={}", map[key])?;
                }
                f.write_str("}")
            }
            Value::Type(ty) => write!(f, "class {ty}"),
            Value::Object(obj) => write!(f, "{}@{:p}", obj.proto.name, Arc::as_ptr(obj)),
            Value::Function(func) => write!(f, "function {}", func.name),
            Value::Proto(proto) => write!(f, "proto {}", proto.name),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_equality_across_kinds() {
        assert_eq!(Value::Integer(1), Value::Long(1));
        assert_eq!(Value::Integer(2), Value::Double(2.0));
        assert_eq!(Value::Decimal(Decimal::new(25, 1)), Value::Double(2.5));
        assert_ne!(Value::Integer(1), Value::from("1"));
    }

    #[test]
    fn test_shared_list_cells() {
        let list = Value::list(vec![Value::Integer(1)]);
        let alias = list.clone();
        if let Value::List(items) = &alias {
            items.write().push(Value::Integer(2));
        }
        assert_eq!(list.len(), Some(2));
        assert!(list.same_ref(&alias));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Double(3.0).to_string(), "3.0");
        assert_eq!(
            Value::list(vec![Value::Integer(1), Value::from("a")]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_char_string_equality() {
        assert_eq!(Value::Char('a'), Value::from("a"));
        assert_ne!(Value::Char('a'), Value::from("ab"));
    }
}
