//! Bulk load of the spice workbook into the store.
//!
//! Sheet headers vary in spelling; they are normalized and resolved through
//! [`COLUMN_ALIASES`]. A sheet missing any required column is rejected before
//! a single row is written.

use std::path::Path;
use std::sync::OnceLock;

use calamine::{Data, Reader, open_workbook_auto};
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::CompoundId;
use crate::error::SpiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    SpiceName,
    BotanicalName,
    PhytoName,
    Cid,
    Has2d,
    Has3d,
}

impl Column {
    pub const REQUIRED: [Column; 6] = [
        Column::SpiceName,
        Column::BotanicalName,
        Column::PhytoName,
        Column::Cid,
        Column::Has2d,
        Column::Has3d,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::SpiceName => "spice_name",
            Column::BotanicalName => "botanical_name",
            Column::PhytoName => "phyto_name",
            Column::Cid => "cid",
            Column::Has2d => "has_2d",
            Column::Has3d => "has_3d",
        }
    }
}

/// Normalized header spellings seen in the source workbooks.
pub const COLUMN_ALIASES: &[(&str, Column)] = &[
    ("spices", Column::SpiceName),
    ("spice", Column::SpiceName),
    ("spices name", Column::SpiceName),
    ("spice name", Column::SpiceName),
    ("spice_name", Column::SpiceName),
    ("botanical", Column::BotanicalName),
    ("botanical name", Column::BotanicalName),
    ("botanical name(s)", Column::BotanicalName),
    ("botanacial", Column::BotanicalName),
    ("botanacial name", Column::BotanicalName),
    ("botanical_name", Column::BotanicalName),
    ("phytochemical", Column::PhytoName),
    ("phytochemical name", Column::PhytoName),
    ("phytochemical names", Column::PhytoName),
    ("phytochemicals name", Column::PhytoName),
    ("phyto chemical", Column::PhytoName),
    ("phyto chemical name", Column::PhytoName),
    ("phyto chemicals", Column::PhytoName),
    ("phyto chemicals name", Column::PhytoName),
    ("phtochemicals name", Column::PhytoName),
    ("phtochemical name", Column::PhytoName),
    ("phtochemical names", Column::PhytoName),
    ("pytochemical", Column::PhytoName),
    ("phyto_name", Column::PhytoName),
    ("cid", Column::Cid),
    ("2d", Column::Has2d),
    ("2d conformer", Column::Has2d),
    ("has_2d", Column::Has2d),
    ("3d", Column::Has3d),
    ("3d conformer", Column::Has3d),
    ("has_3d", Column::Has3d),
];

const TRUE_VALUES: [&str; 5] = ["yes", "y", "1", "true", "-"];
const NO_CID_VALUES: [&str; 4] = ["na", "nil", "-", ""];

/// One worksheet: the first row is the header.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub spice_name: String,
    pub botanical_name: Option<String>,
    pub phyto_name: String,
    pub cid: Option<CompoundId>,
    pub has_2d: bool,
    pub has_3d: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub sheets: Vec<SheetSummary>,
    pub rows_processed: usize,
    pub spices: i64,
    pub phytochemicals: i64,
    pub links: i64,
    pub with_cid: i64,
    pub loaded_at: String,
}

/// Column positions of the required fields within one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    spice_name: usize,
    botanical_name: usize,
    phyto_name: usize,
    cid: usize,
    has_2d: usize,
    has_3d: usize,
}

impl ColumnMap {
    pub fn resolve(sheet: &str, header: &[Option<String>]) -> Result<Self, SpiceError> {
        let mut available = Vec::new();
        let mut found: Vec<(Column, usize)> = Vec::new();

        for (index, cell) in header.iter().enumerate() {
            let key = normalize_header(cell.as_deref().unwrap_or_default());
            if key.is_empty() || key.starts_with("unnamed") {
                continue;
            }
            let mapped = COLUMN_ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, column)| *column);
            match mapped {
                Some(column) => {
                    available.push(column.name().to_string());
                    if !found.iter().any(|(seen, _)| *seen == column) {
                        found.push((column, index));
                    }
                }
                None => available.push(key),
            }
        }

        let position = |column: Column| {
            found
                .iter()
                .find(|(seen, _)| *seen == column)
                .map(|(_, index)| *index)
        };
        let missing = Column::REQUIRED
            .iter()
            .filter(|column| position(**column).is_none())
            .map(|column| column.name().to_string())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(SpiceError::MissingColumns {
                sheet: sheet.to_string(),
                missing,
                available,
            });
        }

        let at = |column: Column| position(column).unwrap_or_default();
        Ok(Self {
            spice_name: at(Column::SpiceName),
            botanical_name: at(Column::BotanicalName),
            phyto_name: at(Column::PhytoName),
            cid: at(Column::Cid),
            has_2d: at(Column::Has2d),
            has_3d: at(Column::Has3d),
        })
    }

    /// Normalizes one data row; `None` when the spice or compound name is blank.
    pub fn extract(&self, row: &[Option<String>]) -> Option<SourceRow> {
        let cell = |index: usize| row.get(index).and_then(|value| value.as_deref());
        Some(SourceRow {
            spice_name: clean_name(cell(self.spice_name))?,
            botanical_name: clean_name(cell(self.botanical_name)),
            phyto_name: clean_name(cell(self.phyto_name))?,
            cid: parse_cid(cell(self.cid)),
            has_2d: to_bool(cell(self.has_2d)),
            has_3d: to_bool(cell(self.has_3d)),
        })
    }
}

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

pub fn normalize_header(raw: &str) -> String {
    let stripped = raw
        .replace(['\u{feff}', '\u{200b}'], "")
        .replace('\u{a0}', " ");
    whitespace()
        .replace_all(stripped.trim(), " ")
        .to_lowercase()
}

pub fn clean_name(value: Option<&str>) -> Option<String> {
    let collapsed = whitespace().replace_all(value?.trim(), " ").into_owned();
    (!collapsed.is_empty()).then_some(collapsed)
}

pub fn to_bool(value: Option<&str>) -> bool {
    value
        .map(|value| value.trim().to_lowercase())
        .is_some_and(|value| TRUE_VALUES.contains(&value.as_str()))
}

/// Spreadsheet CIDs come as `2758`, `2758.0`, or placeholders like `NA`.
pub fn parse_cid(value: Option<&str>) -> Option<CompoundId> {
    let trimmed = value?.trim();
    if NO_CID_VALUES.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }
    let number = trimmed.parse::<f64>().ok()?;
    if !number.is_finite() {
        return None;
    }
    CompoundId::new(number.trunc() as i64).ok()
}

/// Reads every worksheet of an `.xlsx`/`.xls`/`.ods` workbook.
pub fn read_workbook(path: &Path) -> Result<Vec<Sheet>, SpiceError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| SpiceError::Workbook(err.to_string()))?;
    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|err| SpiceError::Workbook(format!("{name}: {err}")))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
            .collect();
        sheets.push(Sheet { name, rows });
    }
    Ok(sheets)
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            Some(text.clone())
        }
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            Some(format!("{}", *value as i64))
        }
        Data::Float(value) => Some(value.to_string()),
        Data::Int(value) => Some(value.to_string()),
        Data::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Loads all sheets, one transaction per sheet. Creates nothing on a sheet
/// that fails column resolution.
pub fn load_sheets(
    conn: &mut Connection,
    sheets: &[Sheet],
    sink: &dyn ProgressSink,
) -> Result<LoadReport, SpiceError> {
    let mut summaries = Vec::new();
    let mut rows_processed = 0usize;

    for sheet in sheets {
        let Some((header, body)) = sheet.rows.split_first() else {
            tracing::warn!(sheet = %sheet.name, "empty sheet skipped");
            continue;
        };
        let columns = ColumnMap::resolve(&sheet.name, header)?;
        let rows = body
            .iter()
            .filter_map(|row| columns.extract(row))
            .collect::<Vec<_>>();

        let tx = conn.transaction()?;
        for row in &rows {
            insert_row(&tx, row)?;
        }
        tx.commit()?;

        sink.event(ProgressEvent {
            message: format!("sheet {}: {} rows", sheet.name, rows.len()),
            elapsed: None,
        });
        rows_processed += rows.len();
        summaries.push(SheetSummary {
            name: sheet.name.clone(),
            rows: rows.len(),
        });
    }

    let count = |sql: &str| -> Result<i64, SpiceError> {
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    };
    Ok(LoadReport {
        sheets: summaries,
        rows_processed,
        spices: count("SELECT COUNT(*) FROM spices")?,
        phytochemicals: count("SELECT COUNT(*) FROM phytochemicals")?,
        links: count("SELECT COUNT(*) FROM spice_phytochemicals")?,
        with_cid: count("SELECT COUNT(*) FROM phytochemicals WHERE cid IS NOT NULL")?,
        loaded_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Upserts one source row. Compounds with a CID are shared across spices;
/// rows without one always create a new phytochemical.
pub fn insert_row(conn: &Connection, row: &SourceRow) -> Result<i64, SpiceError> {
    conn.prepare_cached("INSERT OR IGNORE INTO spices (spice_name, botanical_name) VALUES (?1, ?2)")?
        .execute(params![row.spice_name, row.botanical_name])?;
    let spice_id: i64 = conn
        .prepare_cached("SELECT spice_id FROM spices WHERE spice_name = ?1")?
        .query_row(params![row.spice_name], |r| r.get(0))?;

    let phyto_id = match row.cid {
        Some(cid) => {
            conn.prepare_cached(
                "INSERT OR IGNORE INTO phytochemicals (phyto_name, cid) VALUES (?1, ?2)",
            )?
            .execute(params![row.phyto_name, cid.get()])?;
            let (phyto_id, existing_name): (i64, Option<String>) = conn
                .prepare_cached("SELECT phyto_id, phyto_name FROM phytochemicals WHERE cid = ?1")?
                .query_row(params![cid.get()], |r| Ok((r.get(0)?, r.get(1)?)))
                .optional()?
                .ok_or_else(|| SpiceError::Database(format!("phytochemical for CID {cid} vanished")))?;
            if existing_name.as_deref().is_none_or(|name| name.trim().is_empty()) {
                conn.execute(
                    "UPDATE phytochemicals SET phyto_name = ?1 WHERE phyto_id = ?2",
                    params![row.phyto_name, phyto_id],
                )?;
            }
            phyto_id
        }
        None => {
            conn.prepare_cached("INSERT INTO phytochemicals (phyto_name, cid) VALUES (?1, NULL)")?
                .execute(params![row.phyto_name])?;
            conn.last_insert_rowid()
        }
    };

    conn.prepare_cached(
        "INSERT OR IGNORE INTO spice_phytochemicals (spice_id, phyto_id) VALUES (?1, ?2)",
    )?
    .execute(params![spice_id, phyto_id])?;

    conn.prepare_cached(
        "INSERT OR IGNORE INTO structures (phyto_id, has_2d, has_3d) VALUES (?1, ?2, ?3)",
    )?
    .execute(params![phyto_id, row.has_2d, row.has_3d])?;
    conn.prepare_cached(
        "UPDATE structures
         SET has_2d = MAX(has_2d, ?1), has_3d = MAX(has_3d, ?2)
         WHERE phyto_id = ?3",
    )?
    .execute(params![row.has_2d, row.has_3d, phyto_id])?;

    Ok(phyto_id)
}
