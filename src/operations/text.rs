use regex::Regex;

use crate::error::ReduceError;

/// Compile a pattern for whole-string matching.
pub fn full_match_regex(pattern: &str) -> Result<Regex, ReduceError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| ReduceError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// American soundex code of a word; empty when it has no letters.
pub fn soundex(word: &str) -> String {
    fn code(c: char) -> Option<char> {
        match c {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    }

    let mut letters = word
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase());
    let Some(first) = letters.next() else {
        return String::new();
    };

    let mut result = String::with_capacity(4);
    result.push(first);
    let mut last = code(first);
    for c in letters {
        if result.len() == 4 {
            break;
        }
        match code(c) {
            Some(digit) if Some(digit) != last => {
                result.push(digit);
                last = Some(digit);
            }
            Some(_) => {}
            // H and W do not separate equal codes; vowels do
            None if c == 'H' || c == 'W' => {}
            None => last = None,
        }
    }
    while result.len() < 4 {
        result.push('0');
    }
    result
}

/// Share of positions holding the same character, relative to the longer string.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b): (Vec<char>, Vec<char>) = (a.chars().collect(), b.chars().collect());
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let same = a.iter().zip(&b).filter(|(x, y)| x == y).count();
    same as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soundex() {
        assert_eq!(soundex("Robert"), "R163");
        assert_eq!(soundex("Rupert"), "R163");
        assert_eq!(soundex("Ashcraft"), "A261");
        assert_eq!(soundex("Tymczak"), "T522");
        assert_eq!(soundex("Pfister"), "P236");
        assert_eq!(soundex(""), "");
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("abcd", "abxx"), 0.5);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("a", ""), 0.0);
    }

    #[test]
    fn test_full_match() {
        let re = full_match_regex("[a-z]+").unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("abc1"));
        assert!(full_match_regex("(").is_err());
    }
}
