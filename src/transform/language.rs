//! The operation library for text transformations, and its forward semantics.
//!
//! A [`TransformProgram`] concatenates [`Atom`]s. Each atom is either a constant, a substring of
//! one input column delimited by two [`Position`]s, or such a substring with its letter case
//! converted.

use super::token::Token;
use crate::region::{ColumnIndex, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A learned text transformation.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub struct TransformProgram(pub Vec<Atom>);

impl TransformProgram {
    /// The atoms whose outputs are concatenated.
    pub fn atoms(&self) -> &[Atom] {
        &self.0
    }

    /// Runs the program on a row, or returns `None` if some atom does not apply to it.
    pub fn eval(&self, row: &Row) -> Option<String> {
        self.0.iter().try_fold(String::new(), |mut acc, atom| {
            acc.push_str(&atom.eval(row)?);
            Some(acc)
        })
    }
}

/// One piece of a program's output.
#[derive(Debug, PartialEq, Eq, Clone, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Atom {
    /// Fixed text.
    ConstantString(String),
    /// The text of a column between two positions.
    Substring(ColumnIndex, Position, Position),
    /// A substring, converted to a letter case.
    CaseConvert(Case, ColumnIndex, Position, Position),
}

impl Atom {
    /// The atom's output for a row, or `None` if it does not apply.
    pub fn eval(&self, row: &Row) -> Option<String> {
        match self {
            Atom::ConstantString(s) => Some(s.clone()),
            Atom::Substring(ci, p_start, p_end) => {
                substring(row.text(*ci)?, p_start, p_end).map(String::from)
            }
            Atom::CaseConvert(case, ci, p_start, p_end) => {
                substring(row.text(*ci)?, p_start, p_end).map(|s| case.apply(s))
            }
        }
    }

    /// Number of operations this atom contributes to a program.
    pub fn size(&self) -> usize {
        match self {
            Atom::ConstantString(_) => 1,
            Atom::Substring(..) => 3,
            Atom::CaseConvert(..) => 4,
        }
    }
}

fn substring<'a>(s: &'a str, p_start: &Position, p_end: &Position) -> Option<&'a str> {
    let p_start = p_start.eval(s)?;
    let p_end = p_end.eval(s)?;
    if p_start.0 >= p_end.0 {
        return None;
    }
    s.get(p_start.0.checked_sub(1)?..p_end.0 - 1)
}

/// A one-based string index: index `i` sits just before byte `i - 1`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct StringIndex(pub usize);

/// Which match of a token to use: positive counts from the left (1 is the first match),
/// negative counts from the right (-1 is the last match).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Occurrence(pub isize);

impl Occurrence {
    /// Preference among occurrences; larger is better.
    pub fn weight(&self) -> isize {
        // prefer occurrences closer to ends
        -self.0.abs()
    }
}

/// A place in a string.
#[derive(Debug, PartialEq, Eq, Clone, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    /// The start or end of the k-th match of a token.
    Match(Token, Occurrence, Direction),
    /// A fixed index; non-positive values count back from the end (0 is the end).
    ConstantPosition(Occurrence),
}

impl Position {
    /// Where the position falls in `s`, or `None` if it does not exist there.
    pub fn eval(&self, s: &str) -> Option<StringIndex> {
        match self {
            Position::Match(token, k, dir) => {
                let k = k.0;
                let matches = token.all_matches(s);
                let n = matches.len() as isize;
                let k = if k > 0 { k - 1 } else { n + k };
                if !(0 <= k && k < n) {
                    return None;
                }
                // now, k is a 0-based index, and we know that it's in bounds
                let r = &matches[k as usize];
                match dir {
                    Direction::Start => Some(StringIndex(r.start)),
                    Direction::End => Some(StringIndex(r.end)),
                }
            }
            Position::ConstantPosition(k) => {
                let k = k.0;
                let n = s.len() as isize;
                let k = if k > 0 { k } else { n + k + 1 };
                if !(0 < k && k <= n + 1) {
                    None
                } else {
                    Some(StringIndex(k as usize))
                }
            }
        }
    }
}

/// Which end of a token match a position refers to.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Before the match.
    Start,
    /// After the match.
    End,
}

/// Letter case conversions.
///
/// Conversions work character by character and leave alone any character whose converted form
/// would have a different encoded length, so byte offsets are preserved.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Case {
    /// Every letter upper case.
    Upper,
    /// Every letter lower case.
    Lower,
    /// First letter of each word upper case, the rest lower case.
    Title,
}

/// Every case conversion.
pub const ALL_CASES: &[Case] = &[Case::Upper, Case::Lower, Case::Title];

impl Case {
    /// Converts `s`.
    pub fn apply(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut at_word_start = true;
        for c in s.chars() {
            let upper = match self {
                Case::Upper => true,
                Case::Lower => false,
                Case::Title => at_word_start,
            };
            out.push(if upper { to_upper(c) } else { to_lower(c) });
            at_word_start = !c.is_alphabetic();
        }
        out
    }
}

fn to_upper(c: char) -> char {
    single(c, c.to_uppercase())
}

fn to_lower(c: char) -> char {
    single(c, c.to_lowercase())
}

fn single(c: char, mut mapped: impl Iterator<Item = char>) -> char {
    match (mapped.next(), mapped.next()) {
        (Some(m), None) if m.len_utf8() == c.len_utf8() => m,
        _ => c,
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Match(tok, k, dir) => write!(f, "Pos({}, {}, {:?})", tok, k.0, dir),
            Position::ConstantPosition(k) => write!(f, "AbsPos({})", k.0),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::ConstantString(s) => write!(f, "Const({:?})", s),
            Atom::Substring(ci, p1, p2) => write!(f, "SubStr(v{}, {}, {})", ci.0, p1, p2),
            Atom::CaseConvert(case, ci, p1, p2) => {
                write!(f, "{:?}Case(SubStr(v{}, {}, {}))", case, ci.0, p1, p2)
            }
        }
    }
}

impl fmt::Display for TransformProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Concat(")?;
        for atom in &self.0 {
            writeln!(f, "  {},", atom)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RowId;
    use Atom::*;
    use Direction::*;
    use Position::*;

    fn assert_eval_single(p: &TransformProgram, s: &str, expected: &str) {
        let row = Row::new(RowId(0), [s]);
        assert_eq!(p.eval(&row).unwrap(), expected);
    }

    #[test]
    fn extract_country() {
        let p = TransformProgram(vec![Substring(
            ColumnIndex(0),
            Match(Token::Literal(String::from(", ")), Occurrence(1), End),
            Match(Token::End, Occurrence(-1), Start),
        )]);
        assert_eval_single(&p, "Mumbai, India", "India");
        assert_eval_single(
            &p,
            "Los Angeles, United States of America",
            "United States of America",
        );
    }

    #[test]
    fn extract_initials() {
        let p = TransformProgram(vec![
            Substring(
                ColumnIndex(0),
                Match(Token::CapsWithSpaces, Occurrence(1), Start),
                Match(Token::Caps, Occurrence(1), End),
            ),
            ConstantString(String::from(".")),
            Substring(
                ColumnIndex(0),
                Match(Token::Whitespace, Occurrence(-1), End),
                Match(Token::Lowercase, Occurrence(-1), Start),
            ),
            ConstantString(String::from(".")),
        ]);
        assert_eval_single(&p, "Brandon Henry Saunders", "B.S.");
        assert_eval_single(&p, "Dafna Q. Chen", "D.C.");
    }

    #[test]
    fn constant_position() {
        let p = TransformProgram(vec![Substring(
            ColumnIndex(0),
            ConstantPosition(Occurrence(3)),
            Match(Token::Literal(String::from("|")), Occurrence(1), Start),
        )]);
        assert_eval_single(&p, "xzHello|asdofij", "Hello");
    }

    #[test]
    fn missing_token_yields_no_output() {
        let p = TransformProgram(vec![Substring(
            ColumnIndex(0),
            Match(Token::Digits, Occurrence(2), Start),
            Match(Token::End, Occurrence(1), Start),
        )]);
        let row = Row::new(RowId(0), ["only 1 number"]);
        assert_eq!(p.eval(&row), None);
        // a column the row does not have
        let p = TransformProgram(vec![Substring(
            ColumnIndex(3),
            ConstantPosition(Occurrence(1)),
            ConstantPosition(Occurrence(0)),
        )]);
        assert_eq!(p.eval(&row), None);
    }

    #[test]
    fn case_conversion() {
        assert_eq!(Case::Upper.apply("smith"), "SMITH");
        assert_eq!(Case::Lower.apply("SMITH"), "smith");
        assert_eq!(Case::Title.apply("mary-jane o'neil"), "Mary-Jane O'Neil");
        let p = TransformProgram(vec![CaseConvert(
            Case::Upper,
            ColumnIndex(0),
            Match(Token::Start, Occurrence(1), End),
            Match(Token::Whitespace, Occurrence(1), Start),
        )]);
        assert_eval_single(&p, "john smith", "JOHN");
    }

    #[test]
    fn human_readable_form() {
        let p = TransformProgram(vec![ConstantString(String::from("x"))]);
        assert_eq!(p.to_string(), "Concat(\n  Const(\"x\"),\n)");
    }
}
