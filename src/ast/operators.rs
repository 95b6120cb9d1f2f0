use std::fmt;

/// Binary operators, ternary markers and projection.
///
/// The discriminant doubles as the index into [`PRECEDENCE`], so lookups are a
/// single array read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    // Arithmetic
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Sub,
    /// Multiplication (`*`)
    Mul,
    /// Division (`/`)
    Div,
    /// Modulo (`%`)
    Mod,
    /// Power (`**`)
    Pow,

    // Comparison
    /// Equal (`==`)
    Eq,
    /// Not equal (`!=`)
    Ne,
    /// Less than (`<`)
    Lt,
    /// Greater than (`>`)
    Gt,
    /// Less than or equal (`<=`)
    Le,
    /// Greater than or equal (`>=`)
    Ge,

    // Logical
    /// Short-circuit AND (`&&`, `and`)
    And,
    /// Short-circuit OR (`||`, `or`)
    Or,

    // Bitwise
    /// Bitwise AND (`&`)
    BitAnd,
    /// Bitwise OR (`|`)
    BitOr,
    /// Bitwise XOR (`^`)
    BitXor,
    /// Shift left (`<<`)
    Shl,
    /// Arithmetic shift right (`>>`)
    Shr,
    /// Unsigned shift right (`>>>`)
    UShr,
    /// Unsigned shift left (`<<<`): shifts the absolute value of the left operand.
    UShl,

    // Text and type operators
    /// String append (`#`)
    StrAppend,
    /// Full-match regular expression (`~=`)
    Regex,
    /// Type instance check (`instanceof`, `is`)
    InstanceOf,
    /// Type convertibility check (`convertable_to`)
    ConvertableTo,
    /// Membership (`contains`)
    Contains,
    /// Phonetic equality (`soundex`)
    Soundex,
    /// Positional similarity ratio (`strsim`)
    Similarity,

    // Structural
    /// Ternary condition (`?`)
    Ternary,
    /// Ternary else marker (`:`)
    TernaryElse,
    /// Projection (`in`)
    Projection,
}

impl Op {
    pub const COUNT: usize = Op::Projection as usize + 1;

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        PRECEDENCE[self as usize]
    }

    /// Operators that may take part in compile-time literal folding.
    pub fn is_foldable(self) -> bool {
        !matches!(
            self,
            Op::And | Op::Or | Op::Ternary | Op::TernaryElse | Op::Projection
        )
    }

    /// Operators whose result is always boolean.
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            Op::Eq
                | Op::Ne
                | Op::Lt
                | Op::Gt
                | Op::Le
                | Op::Ge
                | Op::And
                | Op::Or
                | Op::Regex
                | Op::InstanceOf
                | Op::ConvertableTo
                | Op::Contains
                | Op::Soundex
        )
    }

    pub fn lexeme(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Pow => "**",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Ge => ">=",
            Op::And => "&&",
            Op::Or => "||",
            Op::BitAnd => "&",
            Op::BitOr => "|",
            Op::BitXor => "^",
            Op::Shl => "<<",
            Op::Shr => ">>",
            Op::UShr => ">>>",
            Op::UShl => "<<<",
            Op::StrAppend => "#",
            Op::Regex => "~=",
            Op::InstanceOf => "instanceof",
            Op::ConvertableTo => "convertable_to",
            Op::Contains => "contains",
            Op::Soundex => "soundex",
            Op::Similarity => "strsim",
            Op::Ternary => "?",
            Op::TernaryElse => ":",
            Op::Projection => "in",
        }
    }

    /// Longest symbolic operator starting at `chars[0]`, with its length.
    pub fn match_symbol(chars: &[char]) -> Option<(Op, usize)> {
        SYMBOLS.iter().find_map(|(lexeme, op)| {
            let len = lexeme.chars().count();
            if chars.len() >= len && lexeme.chars().zip(chars).all(|(a, b)| a == *b) {
                Some((*op, len))
            } else {
                None
            }
        })
    }

    /// Operators spelled as words.
    pub fn from_word(word: &str) -> Option<Op> {
        match word {
            "and" => Some(Op::And),
            "or" => Some(Op::Or),
            "instanceof" | "is" => Some(Op::InstanceOf),
            "convertable_to" => Some(Op::ConvertableTo),
            "contains" => Some(Op::Contains),
            "soundex" => Some(Op::Soundex),
            "strsim" => Some(Op::Similarity),
            "in" => Some(Op::Projection),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lexeme())
    }
}

/// Precedence indexed by `Op as usize`.
const PRECEDENCE: [u8; Op::COUNT] = [
    12, // Add
    12, // Sub
    13, // Mul
    13, // Div
    13, // Mod
    14, // Pow
    9,  // Eq
    9,  // Ne
    10, // Lt
    10, // Gt
    10, // Le
    10, // Ge
    5,  // And
    4,  // Or
    8,  // BitAnd
    6,  // BitOr
    7,  // BitXor
    11, // Shl
    11, // Shr
    11, // UShr
    11, // UShl
    12, // StrAppend
    10, // Regex
    10, // InstanceOf
    10, // ConvertableTo
    10, // Contains
    10, // Soundex
    10, // Similarity
    2,  // Ternary
    2,  // TernaryElse
    1,  // Projection
];

/// Symbolic lexemes, longest first so matching is greedy.
const SYMBOLS: &[(&str, Op)] = &[
    (">>>", Op::UShr),
    ("<<<", Op::UShl),
    ("**", Op::Pow),
    ("==", Op::Eq),
    ("!=", Op::Ne),
    ("<=", Op::Le),
    (">=", Op::Ge),
    ("&&", Op::And),
    ("||", Op::Or),
    ("<<", Op::Shl),
    (">>", Op::Shr),
    ("~=", Op::Regex),
    ("+", Op::Add),
    ("-", Op::Sub),
    ("*", Op::Mul),
    ("/", Op::Div),
    ("%", Op::Mod),
    ("<", Op::Lt),
    (">", Op::Gt),
    ("&", Op::BitAnd),
    ("|", Op::BitOr),
    ("^", Op::BitXor),
    ("#", Op::StrAppend),
    ("?", Op::Ternary),
    (":", Op::TernaryElse),
];

/// Compound assignment lexemes and the operator they apply, longest first.
pub const COMPOUND_ASSIGNMENTS: &[(&str, Op)] = &[
    (">>>=", Op::UShr),
    ("<<=", Op::Shl),
    (">>=", Op::Shr),
    ("**=", Op::Pow),
    ("+=", Op::Add),
    ("-=", Op::Sub),
    ("*=", Op::Mul),
    ("/=", Op::Div),
    ("%=", Op::Mod),
    ("&=", Op::BitAnd),
    ("|=", Op::BitOr),
    ("^=", Op::BitXor),
    ("#=", Op::StrAppend),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_greedy_symbol_matching() {
        assert_eq!(Op::match_symbol(&chars("<<< 2")), Some((Op::UShl, 3)));
        assert_eq!(Op::match_symbol(&chars("<< 2")), Some((Op::Shl, 2)));
        assert_eq!(Op::match_symbol(&chars("< 2")), Some((Op::Lt, 1)));
        assert_eq!(Op::match_symbol(&chars("**2")), Some((Op::Pow, 2)));
        assert_eq!(Op::match_symbol(&chars("*2")), Some((Op::Mul, 1)));
        assert_eq!(Op::match_symbol(&chars("=")), None);
    }

    #[test]
    fn test_precedence_ordering() {
        assert!(Op::Mul.precedence() > Op::Add.precedence());
        assert!(Op::Lt.precedence() > Op::And.precedence());
        assert!(Op::Eq.precedence() > Op::Or.precedence());
        assert!(Op::And.precedence() > Op::Or.precedence());
        assert!(Op::Or.precedence() > Op::Ternary.precedence());
        assert_eq!(Op::Ternary.precedence(), Op::TernaryElse.precedence());
    }

    #[test]
    fn test_precedence_is_total() {
        for index in 0..Op::COUNT {
            assert!(PRECEDENCE[index] > 0);
        }
    }
}
