//! Tabular scenario input
//!
//! A `DataTable` is a header row of column labels followed by data rows, the
//! shape of a Gherkin step table:
//!
//! ```text
//! | Name  | Date             | Venue        |
//! | PHPNW | 08/10/2011 09:00 | Ramada Hotel |
//! ```

use crate::bus::{PhabricError, PhabricResult};
use crate::value::{Row, Value};

/// Header plus data rows, all cells as raw strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    /// Build a table from a header and data rows
    ///
    /// Every data row must have exactly as many cells as the header.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> PhabricResult<Self> {
        if header.is_empty() {
            return Err(PhabricError::Table("table has no header".to_string()));
        }
        for (i, label) in header.iter().enumerate() {
            if header[..i].contains(label) {
                return Err(PhabricError::Table(format!("duplicate column label '{}'", label)));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != header.len() {
                return Err(PhabricError::Table(format!(
                    "row {} has {} cells, header has {}",
                    i + 1,
                    row.len(),
                    header.len()
                )));
            }
        }
        Ok(Self { header, rows })
    }

    /// Build a table from raw rows where the first row is the header
    pub fn from_rows<R, C>(rows: R) -> PhabricResult<Self>
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let mut rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(Into::into).collect::<Vec<String>>());
        let header = rows
            .next()
            .ok_or_else(|| PhabricError::Table("table has no header".to_string()))?;
        Self::new(header, rows.collect())
    }

    /// Parse pipe-delimited table text
    ///
    /// Blank lines and lines starting with `#` are skipped. Cells are trimmed;
    /// `\|` is a literal pipe and `\\` a literal backslash inside a cell.
    pub fn parse(text: &str) -> PhabricResult<Self> {
        let mut rows = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            rows.push(parse_line(line).ok_or_else(|| {
                PhabricError::Table(format!("line {}: expected a '|' delimited row", lineno + 1))
            })?);
        }
        Self::from_rows(rows)
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Data rows, without the header
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Data rows keyed by header label, in header order
    pub fn hashes(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|cells| {
                self.header
                    .iter()
                    .zip(cells)
                    .map(|(label, cell)| (label.clone(), Value::text(cell.as_str())))
                    .collect()
            })
            .collect()
    }
}

impl std::str::FromStr for DataTable {
    type Err = PhabricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split one `| a | b |` line into trimmed cells
fn parse_line(line: &str) -> Option<Vec<String>> {
    let inner = line.strip_prefix('|')?.strip_suffix('|')?;
    // An odd run of trailing backslashes escapes the closing pipe.
    if inner.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1 {
        return None;
    }

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('|') => cell.push('|'),
                Some('\\') => cell.push('\\'),
                Some(other) => {
                    cell.push('\\');
                    cell.push(other);
                }
                None => cell.push('\\'),
            },
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(ch),
        }
    }
    cells.push(cell.trim().to_string());
    Some(cells)
}
