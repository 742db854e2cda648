#![cfg(not(tarpaulin_include))]

use crate::error::Result;
use crate::gradebook::Extraction;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Convert extracted records to CSV format
///
/// This function renders an extraction as CSV (Comma-Separated Values) text.
/// The first row is `Student` followed by one column per standard, in
/// standard order; every following row is one student's scores.
/// Fields containing commas, quotes or newlines are quoted.
///
/// # Arguments
/// * `extraction` - Standards and student records to render
///
/// # Returns
/// * `Result<String>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use rubricsheet::downloader::to_csv;
/// use rubricsheet::gradebook::{Extraction, StudentRecord};
///
/// let extraction = Extraction {
///     standards: vec!["Crit A".into()],
///     records: vec![StudentRecord {
///         name: "Doe, Jane (42)".into(),
///         scores: vec![("Crit A".into(), "3.2".into())],
///     }],
/// };
/// let csv = to_csv(&extraction).unwrap();
/// assert_eq!(csv, "Student,Crit A\n\"Doe, Jane (42)\",3.2\n");
/// ```
pub fn to_csv(extraction: &Extraction) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Student"];
    header.extend(extraction.standards.iter().map(String::as_str));
    writer.write_record(&header)?;

    for record in &extraction.records {
        let mut row = vec![record.name.as_str()];
        row.extend(
            extraction
                .standards
                .iter()
                .map(|s| record.score(s).unwrap_or("")),
        );
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write extracted records to a CSV file for inspection
///
/// # Arguments
/// * `extraction` - Standards and student records to dump
/// * `path` - Destination file; parent directories are created
pub fn save_csv(extraction: &Extraction, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, to_csv(extraction)?)?;
    Ok(())
}

/// Timestamped default dump name, e.g. `rubrics-20261018-153000.csv`
pub fn default_dump_path() -> PathBuf {
    PathBuf::from(format!("rubrics-{}.csv", Local::now().format("%Y%m%d-%H%M%S")))
}
