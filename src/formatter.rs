use crate::cell::{CellRef, sheet_range};
use crate::error::Result;
use crate::gradebook::{Extraction, StudentRecord};
use crate::sheets::{FormattedCell, SheetProperties, SheetsClient, ValueRange};
use futures_util::future::try_join_all;
use log::{debug, info, warn};

pub const DEFAULT_TEMPLATE_TAB: &str = "Sheet1";
pub const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Clone, Debug, PartialEq)]
pub struct FormatOptions {
    /// Tab whose labels are matched against standards and which is copied
    /// once per student.
    pub template_tab: String,
    /// Duplications in flight at once.
    pub batch_size: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            template_tab: DEFAULT_TEMPLATE_TAB.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// What a formatting run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct FormatOutcome {
    pub url: String,
    /// Tabs created, in student order.
    pub tabs: Vec<SheetProperties>,
    /// Standards written, with the cell their score goes into.
    pub positions: Vec<(String, CellRef)>,
    /// Standards no template label matched; their scores were not written.
    pub unresolved: Vec<String>,
}

/// Finds where each standard's score goes in the template.
///
/// Every non-bold, non-empty cell is a candidate label. A standard matches
/// when its name contains the label text (case-insensitive); the score cell
/// is the one just left of the label. The first match fixes a standard's
/// position. Returns positions in match order and the standards left over.
pub fn match_standard_positions(
    cells: &[FormattedCell],
    standards: &[String],
) -> (Vec<(String, CellRef)>, Vec<String>) {
    let lowered: Vec<String> = standards.iter().map(|s| s.to_lowercase()).collect();
    let mut positioned = vec![false; standards.len()];
    let mut positions = Vec::new();

    for cell in cells {
        let label = cell.value.trim().to_lowercase();
        if cell.bold || label.is_empty() || cell.at.col < 2 {
            continue;
        }
        for (i, standard) in lowered.iter().enumerate() {
            if !positioned[i] && standard.contains(&label) {
                positioned[i] = true;
                positions.push((
                    standards[i].clone(),
                    CellRef::new(cell.at.row, cell.at.col - 1),
                ));
            }
        }
    }

    let unresolved = standards
        .iter()
        .zip(&positioned)
        .filter(|(_, done)| !**done)
        .map(|(s, _)| s.clone())
        .collect();
    (positions, unresolved)
}

/// One batched write covering every positioned standard in a student's tab.
pub fn student_updates(
    record: &StudentRecord,
    tab_title: &str,
    positions: &[(String, CellRef)],
) -> Vec<ValueRange> {
    positions
        .iter()
        .filter_map(|(standard, at)| {
            let score = record.score(standard)?;
            let a1 = at.a1()?;
            Some(ValueRange::single(sheet_range(tab_title, &a1), score))
        })
        .collect()
}

/// Copies the template tab once per student, fills in each copy and puts
/// the tabs in student order.
///
/// Duplications run `batch_size` at a time; writes are one call per
/// student. Any failed call aborts the run and tabs already created are
/// left in place.
pub async fn format_rubrics(
    client: &SheetsClient,
    extraction: &Extraction,
    options: &FormatOptions,
) -> Result<FormatOutcome> {
    let template_tab = options.template_tab.as_str();
    let bounds = client.data_bounds(template_tab).await?;
    let cells = client.cells_with_formatting(&bounds.range).await?;

    let (positions, unresolved) = match_standard_positions(&cells, &extraction.standards);
    info!(
        "found {} out of {} standards in {}",
        positions.len(),
        extraction.standards.len(),
        template_tab
    );
    if !unresolved.is_empty() {
        warn!("no template label for: {}", unresolved.join(", "));
    }

    let template = client.find_sheet(template_tab).await?;
    let records = &extraction.records;
    let mut tabs = Vec::with_capacity(records.len());

    for (i, batch) in records.chunks(options.batch_size.max(1)).enumerate() {
        let created = try_join_all(
            batch
                .iter()
                .map(|record| client.duplicate_sheet(template.sheet_id, Some(record.name.as_str()))),
        )
        .await?;
        tabs.extend(created);

        let usage = client.limiter().usage();
        info!(
            "created batch {}, {} tabs so far, API usage: {:.1}%",
            i + 1,
            tabs.len(),
            usage.percentage
        );
    }

    let writes: Vec<(&StudentRecord, Vec<ValueRange>)> = records
        .iter()
        .zip(&tabs)
        .map(|(record, tab)| (record, student_updates(record, &tab.title, &positions)))
        .filter(|(_, updates)| !updates.is_empty())
        .collect();

    try_join_all(writes.iter().map(|(record, updates)| async move {
        debug!("writing {} values for {}", updates.len(), record.name);
        client.batch_write(updates).await
    }))
    .await?;
    info!("wrote scores for {} students", writes.len());

    let desired: Vec<String> = std::iter::once(template.title.clone())
        .chain(tabs.iter().map(|t| t.title.clone()))
        .collect();
    let moved = client.reorder_sheets(&desired).await?;
    info!("reordered {moved} tabs");

    Ok(FormatOutcome {
        url: client.edit_url(),
        tabs,
        positions,
        unresolved,
    })
}
