/*!
# Rubric Sheet

Turns a learning-management-system gradebook export into one spreadsheet tab
per student, filled in from a template tab through the Google Sheets API.

## Overview

A gradebook CSV holds one row per student and one "Final Score" column per
rubric standard, expressed as a percentage. Teachers want each student's
scores laid out on a copy of a hand-made rubric sheet instead. This crate
reads the export, rescales every score onto the rubric scale, copies the
template spreadsheet, duplicates the template tab for every student and
writes each student's scores next to the matching labels.

## Architecture

### Input
- **Tabular Parser** (`loader`) - delimited text to a cell grid
- **Record Extractor** (`gradebook`) - finds the data region and the
  standard columns, normalizes scores

### Remote side
- **Rate Limiter** (`rate_limiter`) - FIFO sliding-window admission shared by
  every Sheets call
- **Spreadsheet Client** (`sheets`) - typed read/write/duplicate/reorder
  operations, retries 429 responses
- **Formatting Orchestrator** (`formatter`) - matches standards to template
  labels, duplicates tabs in batches, writes one batch per student, reorders

### Collaborators
- **Drive copy** (`drive`) - copies the template file, parses spreadsheet links
- **Gradebook export** (`export`) - starts an export and polls until the CSV
  can be downloaded
- **Dump** (`downloader`) - writes extracted records to a local CSV

## Modules

- **cell**: grid cells, column letters, A1 names
- **config**: run configuration and credentials
- **error**: crate error type
- **app**: the end-to-end pipeline used by the binary
*/

pub mod app;
pub mod cell;
pub mod config;
pub mod downloader;
pub mod drive;
pub mod error;
pub mod export;
pub mod formatter;
pub mod gradebook;
pub mod loader;
pub mod rate_limiter;
pub mod sheets;

/// Re-export the everyday types so callers can `use rubricsheet::*`
pub use cell::*;
pub use error::{Error, Result};
pub use formatter::{FormatOptions, FormatOutcome, format_rubrics};
pub use gradebook::{ExtractOptions, Extraction, StudentRecord, extract};
pub use rate_limiter::{RateLimiter, Usage};
pub use sheets::SheetsClient;
