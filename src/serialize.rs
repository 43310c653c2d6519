//! Program serialization formats.

use crate::{Program, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A representation of a learned program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    /// The program's syntax tree, rendered for reading.
    HumanReadable,
    /// Structured JSON, which [`deserialize`] reads back.
    Json,
    /// A standalone Python script.
    Python,
}

/// Every format, in the order learn results list them.
pub const ALL_FORMATS: &[Format] = &[Format::HumanReadable, Format::Json, Format::Python];

/// Renders `program` in `format`.
pub fn serialize<P: Program>(program: &P, format: Format) -> Result<String> {
    Ok(match format {
        Format::HumanReadable => program.to_string(),
        Format::Json => serde_json::to_string(program)?,
        Format::Python => program.to_python(),
    })
}

/// Reads back a program serialized as [`Format::Json`].
pub fn deserialize<P: Program>(json: &str) -> Result<P> {
    Ok(serde_json::from_str(json)?)
}

/// Quotes a string as a Python string literal.
pub(crate) fn python_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\U{:08x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
