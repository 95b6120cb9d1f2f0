use std::{fmt, sync::Arc};

/// Static type of a value or expression.
///
/// `Object` accepts anything. An expression whose type cannot be determined at
/// compile time carries no `Ty` at all (`Option<Ty>::None`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Object,
    Boolean,
    Char,
    Integer,
    Long,
    Double,
    Decimal,
    String,
    List,
    Array,
    Map,
    /// The type of type references (`String.class`, `Math`)
    Class,
    Function,
    /// Static math helpers (`Math.abs`, `Math.PI`)
    Math,
    /// A user-defined proto record
    Proto(Arc<str>),
}

/// Simple and qualified type names known without an import.
const BUILTIN_NAMES: &[(&str, Ty)] = &[
    ("Object", Ty::Object),
    ("boolean", Ty::Boolean),
    ("Boolean", Ty::Boolean),
    ("char", Ty::Char),
    ("Character", Ty::Char),
    ("int", Ty::Integer),
    ("Integer", Ty::Integer),
    ("long", Ty::Long),
    ("Long", Ty::Long),
    ("double", Ty::Double),
    ("Double", Ty::Double),
    ("float", Ty::Double),
    ("Float", Ty::Double),
    ("BigDecimal", Ty::Decimal),
    ("BigInteger", Ty::Decimal),
    ("String", Ty::String),
    ("List", Ty::List),
    ("ArrayList", Ty::List),
    ("Array", Ty::Array),
    ("Map", Ty::Map),
    ("HashMap", Ty::Map),
    ("Class", Ty::Class),
    ("Function", Ty::Function),
    ("Math", Ty::Math),
];

const QUALIFIED_NAMES: &[(&str, Ty)] = &[
    ("lang.Object", Ty::Object),
    ("lang.Boolean", Ty::Boolean),
    ("lang.Character", Ty::Char),
    ("lang.Integer", Ty::Integer),
    ("lang.Long", Ty::Long),
    ("lang.Double", Ty::Double),
    ("lang.String", Ty::String),
    ("lang.Class", Ty::Class),
    ("lang.Math", Ty::Math),
    ("math.BigDecimal", Ty::Decimal),
    ("math.BigInteger", Ty::Decimal),
    ("util.List", Ty::List),
    ("util.ArrayList", Ty::List),
    ("util.Map", Ty::Map),
    ("util.HashMap", Ty::Map),
    ("util.Array", Ty::Array),
];

impl Ty {
    /// Looks up a builtin simple type name (`int`, `String`, `HashMap`).
    pub fn builtin(name: &str) -> Option<Ty> {
        BUILTIN_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, ty)| ty.clone())
    }

    /// Looks up a fully qualified builtin type name (`lang.Math`).
    pub fn qualified(name: &str) -> Option<Ty> {
        QUALIFIED_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, ty)| ty.clone())
    }

    pub fn name(&self) -> &str {
        match self {
            Ty::Object => "Object",
            Ty::Boolean => "Boolean",
            Ty::Char => "Character",
            Ty::Integer => "Integer",
            Ty::Long => "Long",
            Ty::Double => "Double",
            Ty::Decimal => "BigDecimal",
            Ty::String => "String",
            Ty::List => "List",
            Ty::Array => "Array",
            Ty::Map => "Map",
            Ty::Class => "Class",
            Ty::Function => "Function",
            Ty::Math => "Math",
            Ty::Proto(name) => &**name,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Integer | Ty::Long | Ty::Double | Ty::Decimal)
    }

    /// Rank in the numeric promotion lattice.
    pub(crate) fn numeric_rank(&self) -> Option<u8> {
        match self {
            Ty::Integer => Some(0),
            Ty::Long => Some(1),
            Ty::Double => Some(2),
            Ty::Decimal => Some(3),
            _ => None,
        }
    }

    /// Whether a value of type `source` can be stored in a slot of this type
    /// without conversion.
    pub fn is_assignable_from(&self, source: &Ty) -> bool {
        if self == source || *self == Ty::Object {
            return true;
        }
        match (self.numeric_rank(), source.numeric_rank()) {
            (Some(target), Some(src)) => src <= target,
            _ => false,
        }
    }

    /// Wider of two numeric types; `None` when either is not numeric.
    pub fn widen(&self, other: &Ty) -> Option<Ty> {
        let (a, b) = (self.numeric_rank()?, other.numeric_rank()?);
        Some(if a >= b { self.clone() } else { other.clone() })
    }

    /// Return type of a builtin method, when known.
    ///
    /// `None` means the method is unknown on this type; `Some(None)` means the
    /// method exists but its result is only known at run time.
    pub fn method_type(&self, method: &str) -> Option<Option<Ty>> {
        let ty = match (self, method) {
            (Ty::Object | Ty::Proto(_), "toString") => Some(Ty::String),
            (Ty::Object | Ty::Proto(_), "equals") => Some(Ty::Boolean),
            (Ty::Object, _) => None,

            (Ty::String, "length" | "indexOf") => Some(Ty::Integer),
            (Ty::String, "charAt") => Some(Ty::Char),
            (
                Ty::String,
                "substring" | "toUpperCase" | "toLowerCase" | "trim" | "replace" | "concat"
                | "toString",
            ) => Some(Ty::String),
            (
                Ty::String,
                "contains" | "startsWith" | "endsWith" | "isEmpty" | "equals" | "matches",
            ) => Some(Ty::Boolean),
            (Ty::String, "split") => Some(Ty::Array),

            (Ty::List | Ty::Array, "size" | "length" | "indexOf") => Some(Ty::Integer),
            (Ty::List | Ty::Array, "contains" | "isEmpty" | "add") => Some(Ty::Boolean),
            (Ty::List | Ty::Array, "get" | "set" | "remove") => None,
            (Ty::List | Ty::Array, "clear") => None,

            (Ty::Map, "size") => Some(Ty::Integer),
            (Ty::Map, "containsKey" | "isEmpty") => Some(Ty::Boolean),
            (Ty::Map, "keySet" | "values") => Some(Ty::List),
            (Ty::Map, "get" | "put" | "remove") => None,

            (Ty::Integer | Ty::Long | Ty::Double | Ty::Decimal, "intValue") => Some(Ty::Integer),
            (Ty::Integer | Ty::Long | Ty::Double | Ty::Decimal, "longValue") => Some(Ty::Long),
            (Ty::Integer | Ty::Long | Ty::Double | Ty::Decimal, "doubleValue") => {
                Some(Ty::Double)
            }
            (
                Ty::Integer | Ty::Long | Ty::Double | Ty::Decimal | Ty::Boolean | Ty::Char,
                "toString",
            ) => Some(Ty::String),

            (Ty::Math, "abs" | "max" | "min" | "round") => None,
            (Ty::Math, "pow" | "sqrt" | "floor" | "ceil") => Some(Ty::Double),
            (Ty::Integer, "parseInt" | "valueOf") => Some(Ty::Integer),
            (Ty::Long, "parseLong" | "valueOf") => Some(Ty::Long),
            (Ty::Double, "parseDouble" | "valueOf") => Some(Ty::Double),
            (Ty::String, "valueOf") => Some(Ty::String),
            _ => return None,
        };
        Some(ty)
    }

    /// Type of a builtin property or static field, when known.
    pub fn property_type(&self, property: &str) -> Option<Option<Ty>> {
        let ty = match (self, property) {
            (_, "class") => Some(Ty::Class),
            (Ty::String | Ty::List | Ty::Array, "length") => Some(Ty::Integer),
            (Ty::List | Ty::Map, "size") => Some(Ty::Integer),
            (Ty::List | Ty::Array | Ty::Map | Ty::String, "empty") => Some(Ty::Boolean),
            (Ty::Map, _) => None,
            (Ty::Math, "PI" | "E") => Some(Ty::Double),
            (Ty::Integer, "MAX_VALUE" | "MIN_VALUE") => Some(Ty::Integer),
            (Ty::Long, "MAX_VALUE" | "MIN_VALUE") => Some(Ty::Long),
            (Ty::Object, _) => None,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_aliases() {
        assert_eq!(Ty::builtin("int"), Some(Ty::Integer));
        assert_eq!(Ty::builtin("HashMap"), Some(Ty::Map));
        assert_eq!(Ty::qualified("lang.Math"), Some(Ty::Math));
        assert_eq!(Ty::builtin("Frobnicator"), None);
    }

    #[test]
    fn test_numeric_assignability() {
        assert!(Ty::Long.is_assignable_from(&Ty::Integer));
        assert!(Ty::Decimal.is_assignable_from(&Ty::Double));
        assert!(!Ty::Integer.is_assignable_from(&Ty::Long));
        assert!(!Ty::String.is_assignable_from(&Ty::Integer));
        assert!(Ty::Object.is_assignable_from(&Ty::Map));
    }

    #[test]
    fn test_method_types() {
        assert_eq!(Ty::String.method_type("length"), Some(Some(Ty::Integer)));
        assert_eq!(Ty::Map.method_type("get"), Some(None));
        assert_eq!(Ty::String.method_type("frobnicate"), None);
    }
}
