use serde::{Deserialize, Serialize};
use std::fmt;

/// One scalar cell of a parsed gradebook export.
///
/// Numeric-looking fields are typed as numbers at parse time, everything
/// else stays text. Blank fields are `Empty`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

static EMPTY: CellValue = CellValue::Empty;

/// 2^53. Integers below it in magnitude round-trip through f64 exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl CellValue {
    /// Types a raw delimited field.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if looks_numeric(trimmed) {
            if let Ok(n) = trimmed.parse::<f64>() {
                // long integer IDs would lose digits as f64
                let exact = !(is_integer_literal(trimmed) && n.abs() >= MAX_EXACT_INTEGER);
                if n.is_finite() && exact {
                    return CellValue::Number(n);
                }
            }
        }
        CellValue::Text(field.to_string())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Numeric view of the cell. Text is parsed leniently; anything that is
    /// not a number yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            CellValue::Empty => None,
        }
    }

    /// Text view of the cell, as it would appear in the export.
    pub fn text(&self) -> String {
        self.to_string()
    }

    pub fn contains(&self, needle: &str) -> bool {
        match self {
            CellValue::Text(s) => s.contains(needle),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            // whole numbers print without a trailing ".0" so IDs read as "42"
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn looks_numeric(s: &str) -> bool {
    let mut has_digit = false;
    for (i, c) in s.chars().enumerate() {
        match c {
            '0'..='9' => has_digit = true,
            '+' | '-' if i == 0 => {}
            '.' | 'e' | 'E' => {}
            _ => return false,
        }
    }
    has_digit
}

/// Two-dimensional cell grid produced once per run.
///
/// Rows may be ragged; reads past the end of a row see `CellValue::Empty`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Grid { rows }
    }

    /// Builds a grid from raw string fields, typing each one.
    pub fn from_strings<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Grid {
            rows: rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|f| CellValue::from_field(f.as_ref()))
                        .collect()
                })
                .collect(),
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Widest row length.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }
}

/// A 1-based (row, column) position inside a spreadsheet tab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        CellRef { row, col }
    }

    /// A1-style name, e.g. `B3`. Column 0 has no name.
    pub fn a1(&self) -> Option<String> {
        if self.row == 0 || self.col == 0 {
            return None;
        }
        Some(format!(
            "{}{}",
            column_index_to_letter(self.col as usize - 1),
            self.row
        ))
    }
}

/// Converts a 0-based column index to its spreadsheet letter name.
///
/// ```
/// use rubricsheet::column_index_to_letter;
///
/// assert_eq!(column_index_to_letter(0), "A");
/// assert_eq!(column_index_to_letter(25), "Z");
/// assert_eq!(column_index_to_letter(26), "AA");
/// ```
pub fn column_index_to_letter(index: usize) -> String {
    let mut name = Vec::new();
    let mut n = index + 1;

    while n > 0 {
        n -= 1;
        name.push(b'A' + (n % 26) as u8);
        n /= 26;
    }

    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

/// Inverse of [`column_index_to_letter`]. Case-insensitive; `None` for an
/// empty string or any non-letter.
pub fn column_letter_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut acc: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc - 1)
}

/// Parses an A1-style cell name such as `AB12`.
pub fn parse_cell_name(cell_name: &str) -> Option<CellRef> {
    let mut letters = String::new();
    let mut digits = String::new();

    for c in cell_name.chars() {
        if c.is_ascii_alphabetic() {
            if !digits.is_empty() {
                return None;
            }
            letters.push(c);
        } else if c.is_ascii_digit() {
            digits.push(c);
        } else {
            return None;
        }
    }

    let col = column_letter_to_index(&letters)? + 1;
    let row = digits.parse::<u32>().ok()?;
    if row == 0 {
        return None;
    }
    Some(CellRef::new(row, col as u32))
}

/// Quotes a tab title for use in A1 notation (`'Jane Doe (42)'`).
pub fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// `'<title>'!<range>`
pub fn sheet_range(title: &str, range: &str) -> String {
    format!("{}!{}", quote_sheet_title(title), range)
}
