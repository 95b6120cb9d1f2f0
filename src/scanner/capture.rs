//! Character-level capture routines over the shared source buffer.
//!
//! All positions are absolute offsets into the buffer. Every routine that looks
//! for a delimiter skips string literals, so a `)` inside `'..)..'` never closes
//! a call.

use rust_decimal::Decimal;

use crate::error::{ParseError, ParseErrorKind};
use crate::operations::numeric::integral_literal;
use crate::value::Value;

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

pub fn skip_whitespace(chars: &[char], mut pos: usize, end: usize) -> usize {
    while pos < end && chars[pos].is_whitespace() {
        pos += 1;
    }
    pos
}

pub fn read_word(chars: &[char], start: usize, end: usize) -> usize {
    let mut pos = start;
    while pos < end && is_ident_part(chars[pos]) {
        pos += 1;
    }
    pos
}

/// Index just past the closing quote of the literal starting at `start`.
pub fn skip_string(chars: &[char], start: usize, end: usize) -> Result<usize, ParseError> {
    let quote = chars[start];
    let mut pos = start + 1;
    while pos < end {
        match chars[pos] {
            '\\' => pos += 2,
            c if c == quote => return Ok(pos + 1),
            _ => pos += 1,
        }
    }
    Err(ParseError::new(ParseErrorKind::UnterminatedString, start))
}

fn closer(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Index of the delimiter closing the one at `open`.
pub fn capture_balanced(chars: &[char], open: usize, end: usize) -> Result<usize, ParseError> {
    let mut expected = vec![closer(chars[open])];
    let mut pos = open + 1;
    while pos < end {
        match chars[pos] {
            '\'' | '"' => {
                pos = skip_string(chars, pos, end)?;
                continue;
            }
            c @ ('(' | '[' | '{') => expected.push(closer(c)),
            c @ (')' | ']' | '}') => {
                if expected.pop() != Some(c) {
                    return Err(ParseError::new(ParseErrorKind::Unbalanced(chars[open]), open));
                }
                if expected.is_empty() {
                    return Ok(pos);
                }
            }
            _ => {}
        }
        pos += 1;
    }
    Err(ParseError::new(ParseErrorKind::Unbalanced(chars[open]), open))
}

/// First position in `start..end` at nesting depth 0 where `stop` holds, or `end`.
fn find_top_level(
    chars: &[char],
    start: usize,
    end: usize,
    stop: impl Fn(usize) -> bool,
) -> Result<usize, ParseError> {
    let mut pos = start;
    while pos < end {
        match chars[pos] {
            '\'' | '"' => {
                pos = skip_string(chars, pos, end)?;
                continue;
            }
            '(' | '[' | '{' => {
                pos = capture_balanced(chars, pos, end)? + 1;
                continue;
            }
            c @ (')' | ']' | '}') => {
                return Err(ParseError::new(ParseErrorKind::Unbalanced(c), pos));
            }
            _ if stop(pos) => return Ok(pos),
            _ => pos += 1,
        }
    }
    Ok(end)
}

/// Position of the next top-level `;`, or `end`.
pub fn statement_end(chars: &[char], start: usize, end: usize) -> Result<usize, ParseError> {
    find_top_level(chars, start, end, |p| chars[p] == ';')
}

/// Position of the next top-level `;` or newline, or `end`.
pub fn line_statement_end(chars: &[char], start: usize, end: usize) -> Result<usize, ParseError> {
    find_top_level(chars, start, end, |p| chars[p] == ';' || chars[p] == '\n')
}

/// Position of the first top-level occurrence of `c`.
pub fn find_char(chars: &[char], start: usize, end: usize, c: char) -> Result<Option<usize>, ParseError> {
    let pos = find_top_level(chars, start, end, |p| chars[p] == c)?;
    Ok((pos < end).then_some(pos))
}

/// Position of the first top-level assignment `=` (not part of `==`, `!=`, `<=`
/// or `>=`).
pub fn find_assignment(chars: &[char], start: usize, end: usize) -> Result<Option<usize>, ParseError> {
    let pos = find_top_level(chars, start, end, |p| {
        if chars[p] != '=' || chars.get(p + 1) == Some(&'=') {
            return false;
        }
        match p.checked_sub(1).filter(|prev| *prev >= start).map(|prev| chars[prev]) {
            Some('=' | '!') => false,
            Some(c @ ('<' | '>')) => p >= start + 2 && chars[p - 2] == c,
            _ => true,
        }
    })?;
    Ok((pos < end).then_some(pos))
}

/// Position of the first top-level standalone word `word`.
pub fn find_word(chars: &[char], start: usize, end: usize, word: &str) -> Result<Option<usize>, ParseError> {
    let target: Vec<char> = word.chars().collect();
    let pos = find_top_level(chars, start, end, |p| {
        let after = p + target.len();
        after <= end
            && chars[p..after] == target[..]
            && (p == start || !is_ident_part(chars[p - 1]))
            && (after == end || !is_ident_part(chars[after]))
    })?;
    Ok((pos < end).then_some(pos))
}

/// Position of the first top-level `:` that separates a map key from its value,
/// skipping the `:` of ternaries.
pub fn map_separator(chars: &[char], start: usize, end: usize) -> Result<Option<usize>, ParseError> {
    let ternaries = std::cell::Cell::new(0usize);
    let pos = find_top_level(chars, start, end, |p| match chars[p] {
        '?' => {
            ternaries.set(ternaries.get() + 1);
            false
        }
        ',' => {
            ternaries.set(0);
            false
        }
        ':' if ternaries.get() > 0 => {
            ternaries.set(ternaries.get() - 1);
            false
        }
        ':' => true,
        _ => false,
    })?;
    Ok((pos < end).then_some(pos))
}

/// Whether a top-level `:` marks a map entry rather than a ternary branch.
pub fn has_map_separator(chars: &[char], start: usize, end: usize) -> Result<bool, ParseError> {
    Ok(map_separator(chars, start, end)?.is_some())
}

/// Split `start..end` at top-level occurrences of `sep`, trimming whitespace.
/// Empty pieces are dropped.
pub fn split_top_level(
    chars: &[char],
    start: usize,
    end: usize,
    sep: char,
) -> Result<Vec<(usize, usize)>, ParseError> {
    let mut pieces = Vec::new();
    let mut from = start;
    loop {
        let at = find_top_level(chars, from, end, |p| chars[p] == sep)?;
        let (s, e) = trim(chars, from, at);
        if s < e {
            pieces.push((s, e));
        }
        if at >= end {
            return Ok(pieces);
        }
        from = at + 1;
    }
}

pub fn trim(chars: &[char], mut start: usize, mut end: usize) -> (usize, usize) {
    while start < end && chars[start].is_whitespace() {
        start += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    (start, end)
}

pub fn text(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect()
}

/// Decode the string literal at `start`, returning its value and the position
/// after the closing quote.
pub fn read_string(chars: &[char], start: usize, end: usize) -> Result<(String, usize), ParseError> {
    let quote = chars[start];
    let mut result = String::new();
    let mut pos = start + 1;
    while pos < end {
        match chars[pos] {
            c if c == quote => return Ok((result, pos + 1)),
            '\\' => {
                let Some(&escaped) = chars.get(pos + 1).filter(|_| pos + 1 < end) else {
                    break;
                };
                match escaped {
                    'n' => result.push('\n'),
                    't' => result.push('\t'),
                    'r' => result.push('\r'),
                    '0' => result.push('\0'),
                    '\\' => result.push('\\'),
                    '\'' => result.push('\''),
                    '"' => result.push('"'),
                    'u' => {
                        let digits: String = chars
                            .get(pos + 2..(pos + 6).min(end))
                            .unwrap_or_default()
                            .iter()
                            .collect();
                        let decoded = (digits.len() == 4)
                            .then(|| u32::from_str_radix(&digits, 16).ok())
                            .flatten()
                            .and_then(char::from_u32)
                            .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidEscape('u'), pos))?;
                        result.push(decoded);
                        pos += 6;
                        continue;
                    }
                    other => {
                        return Err(ParseError::new(ParseErrorKind::InvalidEscape(other), pos));
                    }
                }
                pos += 2;
            }
            c => {
                result.push(c);
                pos += 1;
            }
        }
    }
    Err(ParseError::new(ParseErrorKind::UnterminatedString, start))
}

/// Parse the numeric literal at `start` (an optional leading `-` included),
/// returning its value and the position after it.
pub fn read_number(chars: &[char], start: usize, end: usize) -> Result<(Value, usize), ParseError> {
    let mut pos = start;
    let negative = chars[pos] == '-';
    if negative {
        pos += 1;
    }
    let digits_start = pos;
    let malformed = |upto: usize| {
        ParseError::new(
            ParseErrorKind::MalformedNumber(text(chars, start, upto.min(end))),
            start,
        )
    };

    // hexadecimal
    if pos + 1 < end && chars[pos] == '0' && matches!(chars[pos + 1], 'x' | 'X') {
        pos += 2;
        let hex_start = pos;
        while pos < end && chars[pos].is_ascii_hexdigit() {
            pos += 1;
        }
        let digits = text(chars, hex_start, pos);
        let mut value = integral_literal(&digits, 16).ok_or_else(|| malformed(pos))?;
        if pos < end && matches!(chars[pos], 'L' | 'l') {
            value = Value::Long(value.as_i64().ok_or_else(|| malformed(pos))?);
            pos += 1;
        }
        if pos < end && is_ident_part(chars[pos]) {
            return Err(malformed(pos + 1));
        }
        return Ok((negate_literal(value, negative), pos));
    }

    let mut fractional = false;
    while pos < end && chars[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos + 1 < end && chars[pos] == '.' && chars[pos + 1].is_ascii_digit() {
        fractional = true;
        pos += 1;
        while pos < end && chars[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < end && matches!(chars[pos], 'e' | 'E') {
        let mut exp = pos + 1;
        if exp < end && matches!(chars[exp], '+' | '-') {
            exp += 1;
        }
        if exp < end && chars[exp].is_ascii_digit() {
            fractional = true;
            pos = exp;
            while pos < end && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    let literal = text(chars, digits_start, pos);
    if literal.is_empty() {
        return Err(malformed(pos + 1));
    }

    let suffix = chars.get(pos).copied().filter(|_| pos < end);
    let value = match suffix {
        Some('L' | 'l') if !fractional => {
            pos += 1;
            literal.parse::<i64>().ok().map(Value::Long)
        }
        Some('B' | 'b' | 'I') => {
            pos += 1;
            parse_decimal(&literal).map(Value::Decimal)
        }
        Some('D' | 'd' | 'F' | 'f') => {
            pos += 1;
            literal.parse::<f64>().ok().map(Value::Double)
        }
        _ if fractional => literal.parse::<f64>().ok().map(Value::Double),
        _ => integral_literal(&literal, 10),
    }
    .ok_or_else(|| malformed(pos))?;

    if pos < end && is_ident_part(chars[pos]) {
        return Err(malformed(pos + 1));
    }
    Ok((negate_literal(value, negative), pos))
}

fn parse_decimal(literal: &str) -> Option<Decimal> {
    literal
        .parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(literal).ok())
}

fn negate_literal(value: Value, negative: bool) -> Value {
    if !negative {
        return value;
    }
    crate::operations::numeric::negate(&value).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_balanced_ignores_strings() {
        let c = chars("(a(')') [1])x");
        assert_eq!(capture_balanced(&c, 0, c.len()), Ok(11));
    }

    #[test]
    fn test_unbalanced_is_error() {
        let c = chars("(a[1)");
        assert_eq!(
            capture_balanced(&c, 0, c.len()),
            Err(ParseError::new(ParseErrorKind::Unbalanced('('), 0))
        );
    }

    #[test]
    fn test_statement_end() {
        let c = chars("a = foo(';'); b");
        assert_eq!(statement_end(&c, 0, c.len()), Ok(12));
    }

    #[test]
    fn test_read_string_escapes() {
        let c = chars(r#"'a\'b\nA' rest"#);
        let (s, next) = read_string(&c, 0, c.len()).unwrap();
        assert_eq!(s, "a'b\nA");
        assert_eq!(c[next], ' ');

        let c = chars(r"'bad\q'");
        assert!(matches!(
            read_string(&c, 0, c.len()),
            Err(ParseError { kind: ParseErrorKind::InvalidEscape('q'), .. })
        ));
    }

    #[test]
    fn test_read_number_suffixes() {
        let num = |s: &str| {
            let c = chars(s);
            read_number(&c, 0, c.len()).map(|(v, _)| v)
        };
        assert_eq!(num("42"), Ok(Value::Integer(42)));
        assert_eq!(num("42L"), Ok(Value::Long(42)));
        assert_eq!(num("1.5"), Ok(Value::Double(1.5)));
        assert_eq!(num("2d"), Ok(Value::Double(2.0)));
        assert_eq!(num("1.25B"), Ok(Value::Decimal(Decimal::new(125, 2))));
        assert_eq!(num("0xFF"), Ok(Value::Integer(255)));
        assert_eq!(num("-2"), Ok(Value::Integer(-2)));
        assert!(num("12abc").is_err());
    }

    #[test]
    fn test_map_separator_ignores_ternary() {
        let c = chars("a ? b : c, d");
        assert_eq!(has_map_separator(&c, 0, c.len()), Ok(false));
        let c = chars("'a' : 1, 'b' : 2");
        assert_eq!(has_map_separator(&c, 0, c.len()), Ok(true));
    }

    #[test]
    fn test_find_assignment_skips_comparisons() {
        let c = chars("a <= b && c != d");
        assert_eq!(find_assignment(&c, 0, c.len()), Ok(None));
        let c = chars("x >>= 2");
        assert_eq!(find_assignment(&c, 0, c.len()), Ok(Some(4)));
        let c = chars("m['=='] = 1");
        assert_eq!(find_assignment(&c, 0, c.len()), Ok(Some(8)));
    }

    #[test]
    fn test_find_word() {
        let c = chars("name in (x in y)");
        assert_eq!(find_word(&c, 0, c.len(), "in"), Ok(Some(5)));
        let c = chars("index");
        assert_eq!(find_word(&c, 0, c.len(), "in"), Ok(None));
    }
}
