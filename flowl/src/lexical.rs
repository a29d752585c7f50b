//! Character predicates driving the parser automaton.

/// Punctuation allowed inside words besides ASCII alphanumerics.
/// Covers names, locators (`cmd:/usr/bin/sleep`, `http://host:8080/x`)
/// and inline references (`$(name)`).
const WORD_PUNCTUATION: &str = "_-./:~@%+?&$(),";

pub fn is_space(c: char) -> bool {
    c != '\n' && c.is_whitespace()
}

/// End of a trimmed line. The parser feeds a synthetic `'\n'` after the
/// last character of every line.
pub fn is_eol(c: char) -> bool {
    c == '\n'
}

pub fn is_space_or_eol(c: char) -> bool {
    is_space(c) || is_eol(c)
}

pub fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || WORD_PUNCTUATION.contains(c)
}

pub fn is_left_bracket(c: char) -> bool {
    c == '{'
}

pub fn is_eq(c: char) -> bool {
    c == '='
}

/// Start of a variable identifier: ASCII letter or `_`.
pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether `s` is a non-empty identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => is_ident_start(first) && chars.all(is_ident),
        None => false,
    }
}

/// Whether `s` is a non-empty run of word characters.
pub fn is_word_str(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_word)
}

/// The class of a single character as seen by the automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Space,
    Eol,
    Word,
    LeftBracket,
    Eq,
    Other,
}

impl CharClass {
    pub fn of(c: char) -> Self {
        if is_eol(c) {
            CharClass::Eol
        } else if is_space(c) {
            CharClass::Space
        } else if is_word(c) {
            CharClass::Word
        } else if is_left_bracket(c) {
            CharClass::LeftBracket
        } else if is_eq(c) {
            CharClass::Eq
        } else {
            CharClass::Other
        }
    }
}
