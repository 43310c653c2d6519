//! Immutable text regions and the rows built from them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Zero-based index of a column within a row.
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Default, Serialize, Deserialize,
)]
pub struct ColumnIndex(pub usize);

/// Stable identity of a row: its ordinal position in the uploaded dataset.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct RowId(pub usize);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}", self.0)
    }
}

/// A span `[start, end)` (byte offsets) of some source text.
///
/// Regions are cheap to clone: the source text is shared. Two regions are equal when their
/// source texts and offsets are equal. A constant is a region spanning the whole of its own text.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Region {
    source: Arc<str>,
    start: usize,
    end: usize,
}

impl Region {
    /// Creates a region, rejecting spans that are out of bounds or split a character.
    pub fn new(source: impl Into<Arc<str>>, start: usize, end: usize) -> Result<Self> {
        let source = source.into();
        if start > end || end > source.len() {
            return Err(Error::malformed(format!(
                "region {}..{} is out of bounds for text of length {}",
                start,
                end,
                source.len()
            )));
        }
        if !source.is_char_boundary(start) || !source.is_char_boundary(end) {
            return Err(Error::malformed(format!(
                "region {}..{} does not fall on character boundaries",
                start, end
            )));
        }
        Ok(Self { source, start, end })
    }

    /// A region covering all of `text`.
    pub fn whole(text: impl Into<Arc<str>>) -> Self {
        let source = text.into();
        let end = source.len();
        Self {
            source,
            start: 0,
            end,
        }
    }

    /// A constant literal region.
    pub fn constant(text: &str) -> Self {
        Self::whole(text)
    }

    /// The text covered by the region.
    pub fn value(&self) -> &str {
        &self.source[self.start..self.end]
    }

    /// Byte offset where the region starts in its source.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset where the region ends in its source.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the region covers no text.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The full text this region was cut from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Extracts a sub-span, with offsets relative to this region's value.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if end > self.len() {
            return Err(Error::malformed(format!(
                "slice {}..{} exceeds region of length {}",
                start,
                end,
                self.len()
            )));
        }
        Self::new(self.source.clone(), self.start + start, self.start + end)
    }

    /// Concatenates two regions. Adjacent spans of the same source stay a span of that source;
    /// anything else becomes a constant.
    pub fn concat(&self, other: &Region) -> Region {
        if Arc::ptr_eq(&self.source, &other.source) && self.end == other.start {
            return Self {
                source: self.source.clone(),
                start: self.start,
                end: other.end,
            };
        }
        let mut joined = String::with_capacity(self.len() + other.len());
        joined.push_str(self.value());
        joined.push_str(other.value());
        Self::whole(joined)
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Region({:?} @ {}..{})", self.value(), self.start, self.end)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl From<&str> for Region {
    fn from(s: &str) -> Self {
        Region::whole(s)
    }
}

impl From<String> for Region {
    fn from(s: String) -> Self {
        Region::whole(s)
    }
}

/// One input row: an ordered tuple of regions, one per column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    id: RowId,
    cells: Vec<Region>,
}

impl Row {
    /// A row with the given id and cells, in column order.
    pub fn new<R: Into<Region>>(id: RowId, cells: impl IntoIterator<Item = R>) -> Self {
        Self {
            id,
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }

    /// The row's identity.
    pub fn id(&self) -> RowId {
        self.id
    }

    /// The cells, in column order.
    pub fn cells(&self) -> &[Region] {
        &self.cells
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cell of a column, if the row has that column.
    pub fn cell(&self, column: ColumnIndex) -> Option<&Region> {
        self.cells.get(column.0)
    }

    /// The text of a column, if the row has that column.
    pub fn text(&self, column: ColumnIndex) -> Option<&str> {
        self.cell(column).map(Region::value)
    }
}

/// Builds rows from parsed records, numbering them by position.
///
/// Every record must have the same number of columns.
pub fn rows_from_records<S: AsRef<str>>(records: &[Vec<S>]) -> Result<Vec<Row>> {
    let cols = records.first().map(Vec::len).unwrap_or(0);
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            if record.len() != cols {
                return Err(Error::malformed(format!(
                    "record {} has {} columns, expected {}",
                    i,
                    record.len(),
                    cols
                )));
            }
            Ok(Row::new(
                RowId(i),
                record.iter().map(|s| Region::whole(s.as_ref())),
            ))
        })
        .collect()
}

/// Builds single-column rows from a column of strings.
pub fn rows_from_column<S: AsRef<str>>(column: &[S]) -> Vec<Row> {
    column
        .iter()
        .enumerate()
        .map(|(i, s)| Row::new(RowId(i), [Region::whole(s.as_ref())]))
        .collect()
}

/// The rows registered with a session, in ordinal order, addressable by id.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    rows: Vec<Row>,
    index: HashMap<RowId, usize>,
}

impl RowSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends rows. Ids must be new and every row must have as many columns as the rows already
    /// present; otherwise nothing is added.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = Row>) -> Result<()> {
        let rows: Vec<Row> = rows.into_iter().collect();
        let mut cols = self.rows.first().map(Row::len);
        let mut fresh = HashSet::new();
        for row in &rows {
            if self.index.contains_key(&row.id()) || !fresh.insert(row.id()) {
                return Err(Error::malformed(format!("duplicate {}", row.id())));
            }
            let expected = *cols.get_or_insert(row.len());
            if row.len() != expected {
                return Err(Error::malformed(format!(
                    "{} has {} columns, expected {}",
                    row.id(),
                    row.len(),
                    expected
                )));
            }
        }
        for row in rows {
            self.index.insert(row.id(), self.rows.len());
            self.rows.push(row);
        }
        Ok(())
    }

    /// The row with `id`.
    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.index.get(&id).map(|i| &self.rows[*i])
    }

    /// Whether a row with `id` is present.
    pub fn contains(&self, id: RowId) -> bool {
        self.index.contains_key(&id)
    }

    /// Rows in ordinal order.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are present.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns per row, or `None` while empty.
    pub fn columns(&self) -> Option<usize> {
        self.rows.first().map(Row::len)
    }

    /// Up to `max` row ids outside `exclude`, in ordinal order, evenly strided when more are
    /// available.
    pub fn sample(&self, exclude: &[RowId], max: usize) -> Vec<RowId> {
        let candidates: Vec<RowId> = self
            .rows
            .iter()
            .map(Row::id)
            .filter(|id| !exclude.contains(id))
            .collect();
        if candidates.len() <= max {
            return candidates;
        }
        (0..max)
            .map(|i| candidates[i * candidates.len() / max])
            .collect()
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_bounds() {
        assert!(matches!(
            Region::new("abc", 1, 4),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            Region::new("abc", 2, 1),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn rejects_split_characters() {
        // 'é' is two bytes
        assert!(Region::new("café", 0, 4).is_err());
        assert_eq!(Region::new("café", 0, 5).unwrap().value(), "café");
    }

    #[test]
    fn slice_and_concat() {
        let r = Region::whole("John Smith");
        let first = r.slice(0, 4).unwrap();
        let space = r.slice(4, 5).unwrap();
        assert_eq!(first.value(), "John");
        let joined = first.concat(&space);
        assert_eq!(joined, r.slice(0, 5).unwrap());
        let constant = space.concat(&first);
        assert_eq!(constant.value(), " John");
        assert_eq!(constant.start(), 0);
    }

    #[test]
    fn equality_uses_offsets() {
        let r = Region::whole("aa");
        assert_ne!(r.slice(0, 1).unwrap(), r.slice(1, 2).unwrap());
        assert_eq!(r.slice(0, 1).unwrap().value(), r.slice(1, 2).unwrap().value());
    }

    #[test]
    fn jagged_records_are_rejected() {
        let records = vec![vec!["a", "b"], vec!["c"]];
        assert!(matches!(
            rows_from_records(&records),
            Err(Error::MalformedInput(_))
        ));
        let rows = rows_from_records(&[vec!["a", "b"], vec!["c", "d"]]).unwrap();
        assert_eq!(rows[1].id(), RowId(1));
        assert_eq!(rows[1].text(ColumnIndex(1)), Some("d"));
    }

    #[test]
    fn row_set_rejects_duplicates_and_jagged_rows() {
        let mut set = RowSet::new();
        set.extend(rows_from_column(&["a", "b"])).unwrap();
        assert!(matches!(
            set.extend([Row::new(RowId(1), ["c"])]),
            Err(Error::MalformedInput(_))
        ));
        assert!(set.extend([Row::new(RowId(5), ["c", "d"])]).is_err());
        assert_eq!(set.len(), 2);
        set.extend([Row::new(RowId(5), ["c"])]).unwrap();
        assert_eq!(set.get(RowId(5)).and_then(|r| r.text(ColumnIndex(0))), Some("c"));
    }

    #[test]
    fn sampling_is_strided_and_deterministic() {
        let mut set = RowSet::new();
        set.extend(rows_from_column(&["0", "1", "2", "3", "4", "5", "6", "7"]))
            .unwrap();
        assert_eq!(
            set.sample(&[RowId(0)], 3),
            vec![RowId(1), RowId(3), RowId(5)]
        );
        assert_eq!(set.sample(&[], 100).len(), 8);
    }
}
