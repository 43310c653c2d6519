//! Token classes that positions are anchored to.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A class of substrings that positions can be anchored to.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
pub enum Token {
    /// A capital letter followed by lower-case letters.
    ProperCase,
    /// Capital letters.
    Caps,
    /// Lower-case letters.
    Lowercase,
    /// Digits.
    Digits,
    /// Letters.
    Alphabets,
    /// Letters and digits.
    Alphanumeric,
    /// Space characters.
    Whitespace,
    /// The start of the string.
    Start,
    /// The end of the string.
    End,
    /// Proper-case words separated by spaces.
    ProperCaseWithSpaces,
    /// Runs of capital letters separated by spaces.
    CapsWithSpaces,
    /// Runs of lower-case letters separated by spaces.
    LowercaseWithSpaces,
    /// Runs of letters separated by spaces.
    AlphabetsWithSpaces,
    /// Exact text.
    Literal(String),
}

use Token::*;

/// A token match, as 1-based half-open string indices.
#[derive(Debug, PartialEq, Eq)]
pub struct Span {
    /// Index of the first character.
    pub start: usize,
    /// Index past the last character.
    pub end: usize,
}

/// Every token class, excluding literals.
pub const ALL_RE_TOKENS: &[Token] = &[
    ProperCase,
    Caps,
    Lowercase,
    Digits,
    Alphabets,
    Alphanumeric,
    Whitespace,
    ProperCaseWithSpaces,
    CapsWithSpaces,
    LowercaseWithSpaces,
    AlphabetsWithSpaces,
];

lazy_static! {
    static ref PROPER_CASE: Regex = Regex::new(r"\p{Lu}\p{Ll}+").unwrap();
    static ref CAPS: Regex = Regex::new(r"\p{Lu}+").unwrap();
    static ref LOWERCASE: Regex = Regex::new(r"\p{Ll}+").unwrap();
    static ref DIGITS: Regex = Regex::new(r"\d+").unwrap();
    static ref ALPHABETS: Regex = Regex::new(r"\p{L}+").unwrap();
    static ref ALPHANUMERIC: Regex = Regex::new(r"[\p{L}\d]+").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\p{Zs}+").unwrap();
    static ref PROPER_CASE_WITH_SPACES: Regex =
        Regex::new(r"\p{Lu}\p{Ll}+(?:\p{Zs}+\p{Lu}\p{Ll}+)*").unwrap();
    static ref CAPS_WITH_SPACES: Regex = Regex::new(r"\p{Lu}+(?:\p{Zs}+\p{Lu}+)*").unwrap();
    static ref LOWERCASE_WITH_SPACES: Regex = Regex::new(r"\p{Ll}+(?:\p{Zs}+\p{Ll}+)*").unwrap();
    static ref ALPHABETS_WITH_SPACES: Regex = Regex::new(r"\p{L}+(?:\p{Zs}+\p{L}+)*").unwrap();
}

impl Token {
    /// All non-overlapping matches of this token in `s`, left to right.
    ///
    /// Spans are in the shifted coordinates used by the input data graph: byte offset `i`
    /// of `s` is index `i + 1`, index 0 is reserved for [`Token::Start`] and `s.len() + 2` for
    /// [`Token::End`].
    pub fn all_matches(&self, s: &str) -> Vec<Span> {
        let mut matches = Vec::new();
        match self {
            Start => {
                // only this span's end is meaningful, as the start of a substring
                matches.push(Span { start: 0, end: 1 });
            }
            End => {
                // only this span's start is meaningful, as the end of a substring
                matches.push(Span {
                    start: s.len() + 1,
                    end: s.len() + 2,
                });
            }
            Literal(tok_str) => {
                if tok_str.is_empty() {
                    return matches;
                }
                matches.extend(s.match_indices(tok_str.as_str()).map(|(start, m)| Span {
                    start: start + 1,
                    end: start + m.len() + 1,
                }));
            }
            _ => {
                if let Some(re) = self.to_regex() {
                    matches.extend(re.find_iter(s).map(|m| Span {
                        start: m.start() + 1,
                        end: m.end() + 1,
                    }));
                }
            }
        }
        matches
    }

    fn to_regex(&self) -> Option<&'static Regex> {
        let re: &'static Regex = match self {
            ProperCase => &*PROPER_CASE,
            Caps => &*CAPS,
            Lowercase => &*LOWERCASE,
            Digits => &*DIGITS,
            Alphabets => &*ALPHABETS,
            Alphanumeric => &*ALPHANUMERIC,
            Whitespace => &*WHITESPACE,
            ProperCaseWithSpaces => &*PROPER_CASE_WITH_SPACES,
            CapsWithSpaces => &*CAPS_WITH_SPACES,
            LowercaseWithSpaces => &*LOWERCASE_WITH_SPACES,
            AlphabetsWithSpaces => &*ALPHABETS_WITH_SPACES,
            Start | End | Literal(_) => return None,
        };
        Some(re)
    }

    /// The regular expression source for class tokens.
    pub fn pattern(&self) -> Option<&'static str> {
        self.to_regex().map(Regex::as_str)
    }

    /// Preference among tokens anchoring the same position; higher is better.
    ///
    /// Boundaries of the string beat everything, general character classes beat the
    /// multi-word classes, and literals are only attractive when they look like delimiters.
    pub fn weight(&self) -> isize {
        match self {
            Start | End => 20,
            Digits => 12,
            ProperCase => 11,
            Caps | Lowercase => 10,
            Literal(s) if is_delimiter_like(s) => 9,
            Alphabets => 8,
            Alphanumeric | Whitespace => 7,
            ProperCaseWithSpaces | CapsWithSpaces | LowercaseWithSpaces | AlphabetsWithSpaces => 5,
            Literal(_) => 1,
        }
    }

    /// A short English name, used in program descriptions.
    pub fn describe(&self) -> String {
        match self {
            ProperCase => String::from("capitalized word"),
            Caps => String::from("run of capital letters"),
            Lowercase => String::from("run of lowercase letters"),
            Digits => String::from("number"),
            Alphabets => String::from("word"),
            Alphanumeric => String::from("alphanumeric run"),
            Whitespace => String::from("whitespace"),
            Start => String::from("start of the text"),
            End => String::from("end of the text"),
            ProperCaseWithSpaces => String::from("capitalized phrase"),
            CapsWithSpaces => String::from("uppercase phrase"),
            LowercaseWithSpaces => String::from("lowercase phrase"),
            AlphabetsWithSpaces => String::from("phrase"),
            Literal(s) => format!("{:?}", s),
        }
    }
}

fn is_delimiter_like(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| !c.is_alphanumeric())
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal(s) => write!(f, "Literal({:?})", s),
            _ => write!(f, "{:?}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_regex() {
        let re = ProperCaseWithSpaces.to_regex().unwrap();
        assert!(re.is_match("Foo Bar Baz"));
        assert!(!re.is_match("foo bar"));
    }

    #[test]
    fn literal_matches_do_not_overlap() {
        let spans = Literal(String::from("aa")).all_matches("aaaa");
        assert_eq!(
            spans,
            vec![Span { start: 1, end: 3 }, Span { start: 3, end: 5 }]
        );
    }

    #[test]
    fn class_matches_are_shifted() {
        let spans = Digits.all_matches("ab 12 c 3");
        assert_eq!(
            spans,
            vec![Span { start: 4, end: 6 }, Span { start: 9, end: 10 }]
        );
    }

    #[test]
    fn delimiters_outrank_word_literals() {
        assert!(Literal(String::from(", ")).weight() > Literal(String::from("ab")).weight());
        assert!(End.weight() > Digits.weight());
    }
}
