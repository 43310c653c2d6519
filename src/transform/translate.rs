//! Renders transformation programs for people and for other runtimes.
//!
//! [`describe`] produces a short English explanation. [`to_python`] produces a standalone Python
//! script that uses the third-party `regex` module (for `\p{..}` classes). The script indexes
//! strings by code point where the engine indexes them by byte, so constant positions agree only
//! on ASCII inputs; token-anchored positions agree everywhere.

use super::language::{Atom, Case, Direction, Position, TransformProgram};
use super::token::Token;
use crate::serialize::python_literal;
use std::fmt::Write;

/// Explains a program in English, one clause per atom.
pub fn describe(program: &TransformProgram) -> String {
    if program.atoms().is_empty() {
        return String::from("Output the empty string.");
    }
    let clauses: Vec<String> = program.atoms().iter().map(describe_atom).collect();
    if clauses.len() == 1 {
        return format!("Output {}.", clauses[0]);
    }
    format!("Concatenate {}.", join_clauses(&clauses))
}

fn join_clauses(clauses: &[String]) -> String {
    match clauses.split_last() {
        Some((last, init)) if !init.is_empty() => format!("{}, then {}", init.join(", "), last),
        _ => clauses.join(""),
    }
}

fn describe_atom(atom: &Atom) -> String {
    match atom {
        Atom::ConstantString(s) => format!("the text {:?}", s),
        Atom::Substring(ci, l, r) => format!(
            "the part of column {} from {} to {}",
            ci.0 + 1,
            describe_position(l),
            describe_position(r)
        ),
        Atom::CaseConvert(case, ci, l, r) => format!(
            "the part of column {} from {} to {}, in {}",
            ci.0 + 1,
            describe_position(l),
            describe_position(r),
            match case {
                Case::Upper => "upper case",
                Case::Lower => "lower case",
                Case::Title => "title case",
            }
        ),
    }
}

fn describe_position(p: &Position) -> String {
    match p {
        Position::Match(Token::Start, _, _) => String::from("the beginning"),
        Position::Match(Token::End, _, _) => String::from("the end"),
        Position::Match(tok, k, dir) => format!(
            "the {} of the {} {}",
            match dir {
                Direction::Start => "start",
                Direction::End => "end",
            },
            ordinal(k.0),
            tok.describe()
        ),
        Position::ConstantPosition(k) if k.0 > 0 => format!("character {}", k.0),
        Position::ConstantPosition(k) if k.0 == 0 => String::from("the end"),
        Position::ConstantPosition(k) => format!("{} characters before the end", -k.0),
    }
}

fn ordinal(k: isize) -> String {
    let nth = |n: isize| match n {
        1 => String::from("first"),
        2 => String::from("second"),
        3 => String::from("third"),
        n if n % 10 == 1 && n % 100 != 11 => format!("{}st", n),
        n if n % 10 == 2 && n % 100 != 12 => format!("{}nd", n),
        n if n % 10 == 3 && n % 100 != 13 => format!("{}rd", n),
        n => format!("{}th", n),
    };
    match k {
        -1 => String::from("last"),
        k if k < 0 => format!("{}-to-last", nth(-k)),
        k => nth(k),
    }
}

const PYTHON_PRELUDE: &str = r#"import regex


def _matches(token, s):
    kind, value = token
    if kind == "start":
        return [(-1, 0)]
    if kind == "end":
        return [(len(s), len(s) + 1)]
    if kind == "literal":
        spans = []
        i = s.find(value)
        while value and i >= 0:
            spans.append((i, i + len(value)))
            i = s.find(value, i + len(value))
        return spans
    return [(m.start(), m.end()) for m in regex.finditer(value, s)]


def _position(s, pos):
    if pos[0] == "abs":
        k = pos[1]
        i = k - 1 if k > 0 else len(s) + k
        return i if 0 <= i <= len(s) else None
    _, token, k, at_end = pos
    spans = _matches(token, s)
    i = k - 1 if k > 0 else len(spans) + k
    if not 0 <= i < len(spans):
        return None
    return spans[i][1] if at_end else spans[i][0]


def _substring(row, col, left, right):
    if col >= len(row):
        return None
    s = row[col]
    l, r = _position(s, left), _position(s, right)
    if l is None or r is None or l < 0 or l >= r:
        return None
    return s[l:r]


def _title(s):
    out, at_word_start = [], True
    for c in s:
        out.append(c.upper() if at_word_start else c.lower())
        at_word_start = not c.isalpha()
    return "".join(out)


def _case(kind, s):
    if s is None:
        return None
    if kind == "upper":
        return s.upper()
    if kind == "lower":
        return s.lower()
    return _title(s)
"#;

/// Transpiles a program to a Python script defining `transform(row)`, which returns the output
/// for a list of column strings or `None`. Run directly, the script maps CSV on stdin to one
/// output per line.
pub fn to_python(program: &TransformProgram) -> String {
    let mut out = String::from(PYTHON_PRELUDE);
    out.push_str("\n\ndef transform(row):\n    parts = [\n");
    for atom in program.atoms() {
        let _ = writeln!(out, "        {},", python_atom(atom));
    }
    out.push_str(
        "    ]\n    if any(p is None for p in parts):\n        return None\n    return \"\".join(parts)\n",
    );
    out.push_str(
        "\n\nif __name__ == \"__main__\":\n    import csv\n    import sys\n\n    for record in csv.reader(sys.stdin):\n        result = transform(record)\n        print(\"\" if result is None else result)\n",
    );
    out
}

fn python_atom(atom: &Atom) -> String {
    match atom {
        Atom::ConstantString(s) => python_literal(s),
        Atom::Substring(ci, l, r) => format!(
            "_substring(row, {}, {}, {})",
            ci.0,
            python_position(l),
            python_position(r)
        ),
        Atom::CaseConvert(case, ci, l, r) => format!(
            "_case({}, _substring(row, {}, {}, {}))",
            python_literal(match case {
                Case::Upper => "upper",
                Case::Lower => "lower",
                Case::Title => "title",
            }),
            ci.0,
            python_position(l),
            python_position(r)
        ),
    }
}

fn python_position(p: &Position) -> String {
    match p {
        Position::ConstantPosition(k) => format!("(\"abs\", {})", k.0),
        Position::Match(tok, k, dir) => format!(
            "(\"match\", {}, {}, {})",
            python_token(tok),
            k.0,
            if *dir == Direction::End { "True" } else { "False" }
        ),
    }
}

fn python_token(tok: &Token) -> String {
    match tok {
        Token::Start => String::from("(\"start\", None)"),
        Token::End => String::from("(\"end\", None)"),
        Token::Literal(s) => format!("(\"literal\", {})", python_literal(s)),
        _ => format!(
            "(\"class\", {})",
            python_literal(tok.pattern().unwrap_or_default())
        ),
    }
}
