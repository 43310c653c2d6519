//! Split programs and their forward semantics.

use crate::region::{ColumnIndex, Row};
use crate::serialize::python_literal;
use crate::transform::token::Token;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What separates one cell from the next.
#[derive(Debug, PartialEq, Eq, Clone, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Delimiter {
    /// Every non-overlapping occurrence of a fixed string.
    Literal(String),
    /// Every run of whitespace.
    Whitespace,
}

impl Delimiter {
    /// Byte ranges of the delimiter's occurrences in `s`, left to right.
    pub fn occurrences(&self, s: &str) -> Vec<(usize, usize)> {
        match self {
            Delimiter::Literal(d) if d.is_empty() => Vec::new(),
            Delimiter::Literal(d) => s
                .match_indices(d.as_str())
                .map(|(i, m)| (i, i + m.len()))
                .collect(),
            Delimiter::Whitespace => Token::Whitespace
                .all_matches(s)
                .into_iter()
                .map(|span| (span.start - 1, span.end - 1))
                .collect(),
        }
    }

    /// Whether the delimiter contains no letters or digits.
    pub fn is_punctuation(&self) -> bool {
        match self {
            Delimiter::Literal(d) => d.chars().all(|c| !c.is_alphanumeric()),
            Delimiter::Whitespace => true,
        }
    }

    fn describe(&self) -> String {
        match self {
            Delimiter::Literal(d) => format!("{:?}", d),
            Delimiter::Whitespace => String::from("whitespace"),
        }
    }
}

/// A learned column split.
///
/// Cells are the pieces of the column's text between occurrences of the delimiter, empty pieces
/// included. With `include_delimiters`, the delimiter text between two pieces is a cell of its
/// own; otherwise it appears in no cell.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub struct SplitProgram {
    /// The column being split.
    pub column: ColumnIndex,
    /// What separates the cells.
    pub delimiter: Delimiter,
    /// Whether delimiter text becomes cells of its own.
    pub include_delimiters: bool,
}

impl SplitProgram {
    /// Splits one row, or returns `None` if the row lacks the column.
    pub fn eval(&self, row: &Row) -> Option<Vec<String>> {
        let text = row.text(self.column)?;
        Some(self.split(text))
    }

    /// Splits `text` into cells.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut cells = Vec::new();
        let mut last = 0;
        for (start, end) in self.delimiter.occurrences(text) {
            cells.push(String::from(&text[last..start]));
            if self.include_delimiters {
                cells.push(String::from(&text[start..end]));
            }
            last = end;
        }
        cells.push(String::from(&text[last..]));
        cells
    }

    /// An English explanation of the split.
    pub fn describe(&self) -> String {
        format!(
            "Split column {} on {}{}.",
            self.column.0 + 1,
            self.delimiter.describe(),
            if self.include_delimiters {
                ", keeping each delimiter as a cell of its own"
            } else {
                ""
            }
        )
    }

    /// Transpiles the program to a Python script defining `split(row)`. Run directly, the
    /// script maps CSV on stdin to CSV on stdout.
    pub fn to_python(&self) -> String {
        let pattern = match &self.delimiter {
            Delimiter::Literal(d) => format!("regex.escape({})", python_literal(d)),
            Delimiter::Whitespace => {
                python_literal(Token::Whitespace.pattern().unwrap_or(r"\s+"))
            }
        };
        let split_call = if self.include_delimiters {
            format!("regex.split(\"(\" + {} + \")\", s)", pattern)
        } else {
            format!("regex.split({}, s)", pattern)
        };
        format!(
            r#"import regex


def split(row):
    if {col} >= len(row):
        return None
    s = row[{col}]
    return {split_call}


if __name__ == "__main__":
    import csv
    import sys

    writer = csv.writer(sys.stdout)
    for record in csv.reader(sys.stdin):
        writer.writerow(split(record) or [])
"#,
            col = self.column.0,
            split_call = split_call
        )
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Literal(d) => write!(f, "Literal({:?})", d),
            Delimiter::Whitespace => write!(f, "Whitespace"),
        }
    }
}

impl fmt::Display for SplitProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Split(v{}, {}, IncludeDelimiters({}))",
            self.column.0, self.delimiter, self.include_delimiters
        )
    }
}
