use crate::cell::{CellValue, Grid, column_index_to_letter};
use crate::error::{Error, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Literal markers and scoring parameters for one gradebook export format.
///
/// The defaults describe the export where standards appear as
/// `"<name> Final Score"` columns between a `(read only)` marker in the
/// points-possible row and a `Current Score` header.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractOptions {
    /// Column-0 substring of the row just above the first student.
    pub points_possible_marker: String,
    /// Exact text, in the points-possible row, of the first useful column.
    pub read_only_marker: String,
    /// Exact row-0 headers that end the useful columns.
    pub end_markers: Vec<String>,
    /// Row-0 substring identifying a standard's score column.
    pub score_marker: String,
    /// Case-insensitive substring that disqualifies a score column.
    pub exclude_marker: String,
    /// Top of the rubric scale raw percentages are mapped onto.
    pub rubric_max: f64,
    /// Decimal places kept in each score.
    pub decimals: usize,
    /// Append ` (<id>)` to each student name so tab titles stay unique.
    pub disambiguate_with_id: bool,
    pub name_column: usize,
    pub id_column: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            points_possible_marker: "Points Possible".to_string(),
            read_only_marker: "(read only)".to_string(),
            end_markers: vec!["Current Score".to_string(), "Current Points".to_string()],
            score_marker: "Final Score".to_string(),
            exclude_marker: "Unposted".to_string(),
            rubric_max: 4.0,
            decimals: 1,
            disambiguate_with_id: true,
            name_column: 0,
            id_column: 1,
        }
    }
}

/// One student's identifier and a score per standard, in standard order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub name: String,
    pub scores: Vec<(String, String)>,
}

impl StudentRecord {
    pub fn score(&self, standard: &str) -> Option<&str> {
        self.scores
            .iter()
            .find(|(s, _)| s == standard)
            .map(|(_, v)| v.as_str())
    }
}

/// Result of [`extract`]: standards in column order and one record per student.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub standards: Vec<String>,
    pub records: Vec<StudentRecord>,
}

/// Maps a raw percentage onto the rubric scale and formats it with a fixed
/// number of decimals. `None` counts as zero.
pub fn normalize_score(raw: Option<f64>, rubric_max: f64, decimals: usize) -> String {
    let raw = raw.unwrap_or(0.0);
    let scaled = rubric_max * (raw / 100.0);
    let formatted = format!("{:.*}", decimals, scaled);
    // "-0.0" can come out of tiny negative inputs
    if formatted.starts_with('-') && formatted.trim_start_matches(['-', '0', '.']).is_empty() {
        formatted[1..].to_string()
    } else {
        formatted
    }
}

/// Locates the data region of a gradebook export and turns every student
/// row into a [`StudentRecord`].
pub fn extract(grid: &Grid, options: &ExtractOptions) -> Result<Extraction> {
    let first_student_row = find_first_student_row(grid, options)?;
    let (start, end) = find_column_bounds(grid, first_student_row - 1, options);
    debug!("useful columns: [{start}, {end})");

    let mut columns = Vec::new();
    let mut standards = Vec::new();
    let exclude = options.exclude_marker.to_lowercase();
    for col in start..end {
        let header = grid.get(0, col);
        let CellValue::Text(text) = header else {
            continue;
        };
        if !text.contains(&options.score_marker) {
            continue;
        }
        if !exclude.is_empty() && text.to_lowercase().contains(&exclude) {
            continue;
        }
        let standard = text.replace(&options.score_marker, "").trim().to_string();
        if standards.contains(&standard) {
            debug!("skipping repeated standard column {col}: {standard}");
            continue;
        }
        columns.push(col);
        standards.push(standard);
    }

    let mut records = Vec::new();
    for row in first_student_row..grid.height() {
        let name_cell = grid.get(row, options.name_column);
        if name_cell.is_empty() {
            break;
        }

        let mut name = name_cell.text().trim().to_string();
        if options.disambiguate_with_id {
            let id = grid.get(row, options.id_column);
            if !id.is_empty() {
                name = format!("{} ({})", name, id.text().trim());
            }
        }

        let scores = columns
            .iter()
            .zip(&standards)
            .map(|(&col, standard)| {
                let cell = grid.get(row, col);
                let raw = match cell.as_number() {
                    Some(n) => Some(n),
                    None if cell.is_empty() => None,
                    None => {
                        return Err(Error::MalformedInput(format!(
                            "score \"{}\" for {} in cell {}{} is not a number",
                            cell.text().trim(),
                            standard,
                            column_index_to_letter(col),
                            row + 1
                        )));
                    }
                };
                Ok((
                    standard.clone(),
                    normalize_score(raw, options.rubric_max, options.decimals),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        records.push(StudentRecord { name, scores });
    }

    info!(
        "extracted {} students across {} standards",
        records.len(),
        standards.len()
    );
    Ok(Extraction { standards, records })
}

fn find_first_student_row(grid: &Grid, options: &ExtractOptions) -> Result<usize> {
    (0..grid.height())
        .find(|&row| grid.get(row, 0).contains(&options.points_possible_marker))
        .map(|row| row + 1)
        .ok_or_else(|| {
            Error::MalformedInput(format!(
                "no \"{}\" row found in column A",
                options.points_possible_marker
            ))
        })
}

fn find_column_bounds(grid: &Grid, marker_row: usize, options: &ExtractOptions) -> (usize, usize) {
    let width = grid.width();
    let mut start = None;
    let mut end = width;

    for col in 0..width {
        let marker = grid.get(marker_row, col).text();
        if start.is_none() && marker.trim() == options.read_only_marker {
            start = Some(col);
        }
        let header = grid.get(0, col).text();
        if options.end_markers.iter().any(|m| header.trim() == m) {
            end = col;
            break;
        }
    }

    (start.unwrap_or(0), end)
}
