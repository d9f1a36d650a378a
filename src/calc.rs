use serde::Serialize;
use std::collections::HashMap;

use crate::profile::{Band, ReportProfile};
use crate::sheet::RawRow;

/// Textual placeholders a sheet commonly uses for "no value".
const NULL_MARKERS: [&str; 4] = ["null", "none", "nan", "n/a"];

/// Canonical cell value after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    /// Canonicalize one raw JSON cell: empty-like strings collapse to
    /// `Empty`, numeric-looking text coerces to `Number`.
    pub fn canon(raw: &serde_json::Value) -> Cell {
        match raw {
            serde_json::Value::Null => Cell::Empty,
            serde_json::Value::Bool(b) => Cell::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
            serde_json::Value::String(s) => Cell::from_text(s),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn from_text(s: &str) -> Cell {
        let t = s.trim();
        if t.is_empty() {
            return Cell::Empty;
        }
        let lower = t.to_lowercase();
        if NULL_MARKERS.contains(&lower.as_str()) {
            return Cell::Empty;
        }
        if let Ok(n) = t.parse::<f64>() {
            return Cell::Number(n);
        }
        Cell::Text(t.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// String form used for identity comparison. Whole numbers drop their
    /// fractional part so `Number(1.0)` compares equal to the text "1".
    pub fn as_key(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(format!("{}", n))
                }
            }
            Cell::Text(s) => Some(s.clone()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Empty => serde_json::Value::Null,
            Cell::Bool(b) => serde_json::Value::Bool(*b),
            Cell::Number(n) => serde_json::json!(n),
            Cell::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// One normalized sheet row. Cells keep the source column order; rows are
/// small, so lookup by column name is a linear scan.
#[derive(Debug, Clone)]
pub struct Row {
    pub cells: Vec<(String, Cell)>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    fn set(&mut self, column: &str, cell: Cell) {
        if let Some(slot) = self.cells.iter_mut().find(|(name, _)| name == column) {
            slot.1 = cell;
        } else {
            self.cells.push((column.to_string(), cell));
        }
    }

    pub fn cells_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (name, cell) in &self.cells {
            obj.insert(name.clone(), cell.to_json());
        }
        serde_json::Value::Object(obj)
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedTable {
    /// Column names in order of first appearance across the input rows.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Indexes into `rows` that still lack an identifier or display name
    /// after forward-fill. Surfaced to the caller, never dropped or guessed.
    pub orphans: Vec<usize>,
}

/// Forward-fill accumulator: the last non-empty value seen for one column.
#[derive(Default)]
struct Carry {
    last: Option<Cell>,
}

impl Carry {
    fn apply(&mut self, cell: Cell) -> Cell {
        if cell.is_empty() {
            self.last.clone().unwrap_or(Cell::Empty)
        } else {
            self.last = Some(cell.clone());
            cell
        }
    }
}

/// Normalize raw sheet rows: drop wholly-blank rows, canonicalize cells, and
/// forward-fill the identifier, display-name, and period columns so rows that
/// only carry their group key on the first line stay attached to it.
pub fn normalize(raw_rows: &[RawRow], profile: &ReportProfile) -> NormalizedTable {
    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<Row> = Vec::new();
    let mut orphans: Vec<usize> = Vec::new();

    let mut id_carry = Carry::default();
    let mut name_carry = Carry::default();
    let mut period_carry = Carry::default();

    for raw in raw_rows {
        let mut row = Row {
            cells: Vec::with_capacity(raw.len()),
        };
        for (name, value) in raw {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.clone());
            }
            row.cells.push((name.clone(), Cell::canon(value)));
        }
        if row.cells.iter().all(|(_, c)| c.is_empty()) {
            continue;
        }

        let id = id_carry.apply(row.get(&profile.id_column).cloned().unwrap_or(Cell::Empty));
        let name = name_carry.apply(row.get(&profile.name_column).cloned().unwrap_or(Cell::Empty));
        // Filling with Empty would invent columns the sheet never had.
        if !id.is_empty() {
            row.set(&profile.id_column, id.clone());
        }
        if !name.is_empty() {
            row.set(&profile.name_column, name.clone());
        }

        if let Some(period_column) = &profile.period_column {
            let period = period_carry.apply(row.get(period_column).cloned().unwrap_or(Cell::Empty));
            if !period.is_empty() {
                row.set(period_column, period);
            }
        }

        if id.is_empty() || name.is_empty() {
            orphans.push(rows.len());
        }
        rows.push(row);
    }

    NormalizedTable {
        columns,
        rows,
        orphans,
    }
}

#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub row: Row,
    pub total: f64,
    pub label: Option<String>,
}

impl ScoredRow {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "cells": self.row.cells_json(),
            "total": self.total,
            "label": self.label,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScoredTable {
    pub columns: Vec<String>,
    pub rows: Vec<ScoredRow>,
    pub orphans: Vec<usize>,
}

/// Point delta for one criterion cell. Unrecognized marks are neutral: a
/// stray value in a conduct column must not fail the whole report.
pub fn criterion_delta(cell: &Cell, profile: &ReportProfile) -> f64 {
    match cell {
        Cell::Empty => 0.0,
        Cell::Bool(true) => profile.met_delta,
        Cell::Bool(false) => profile.failed_delta,
        other => {
            let Some(key) = other.as_key() else {
                return 0.0;
            };
            if profile.is_met_mark(&key) {
                profile.met_delta
            } else if profile.is_failed_mark(&key) {
                profile.failed_delta
            } else {
                0.0
            }
        }
    }
}

/// Classify a total against the band table, highest threshold first. A total
/// below every band takes the lowest band's label.
pub fn classify(total: f64, bands: &[Band]) -> Option<String> {
    for band in bands {
        if total >= band.min {
            return Some(band.label.clone());
        }
    }
    bands.last().map(|b| b.label.clone())
}

pub fn score_row(row: &Row, profile: &ReportProfile) -> (f64, Option<String>) {
    let mut total = profile.base_score;
    for criterion in &profile.criteria {
        if let Some(cell) = row.get(criterion) {
            total += criterion_delta(cell, profile);
        }
    }
    (total, classify(total, &profile.bands))
}

pub fn score_table(table: NormalizedTable, profile: &ReportProfile) -> ScoredTable {
    let rows = table
        .rows
        .into_iter()
        .map(|row| {
            let (total, label) = score_row(&row, profile);
            ScoredRow { row, total, label }
        })
        .collect();
    ScoredTable {
        columns: table.columns,
        rows,
        orphans: table.orphans,
    }
}

/// Which rows a lookup (or a narrative request) is asking about.
#[derive(Debug, Clone, Default)]
pub struct RowSelector {
    pub identifier: Option<String>,
    pub name_fragment: Option<String>,
    pub period: Option<String>,
}

fn key_matches(cell: Option<&Cell>, wanted: &str) -> bool {
    let Some(cell_key) = cell.and_then(|c| c.as_key()) else {
        return false;
    };
    let wanted_key = Cell::from_text(wanted)
        .as_key()
        .unwrap_or_else(|| wanted.to_string());
    cell_key.eq_ignore_ascii_case(&wanted_key)
}

/// Lookup by identifier or name fragment, optionally restricted to a period.
/// Identifier wins when both are given; identifier comparison is exact after
/// both sides coerce to string form, name matching is case-insensitive
/// substring containment. No match is an empty result, not an error.
pub fn find_rows<'a>(
    table: &'a ScoredTable,
    profile: &ReportProfile,
    selector: &RowSelector,
) -> Vec<&'a ScoredRow> {
    table
        .rows
        .iter()
        .filter(|scored| {
            let row = &scored.row;
            let selected = if let Some(id) = &selector.identifier {
                key_matches(row.get(&profile.id_column), id)
            } else if let Some(fragment) = &selector.name_fragment {
                row.get(&profile.name_column)
                    .and_then(|c| c.as_key())
                    .map(|name| name.to_lowercase().contains(&fragment.to_lowercase()))
                    .unwrap_or(false)
            } else {
                true
            };
            let period_ok = match (&selector.period, &profile.period_column) {
                (Some(period), Some(period_column)) => key_matches(row.get(period_column), period),
                (Some(_), None) => false,
                (None, _) => true,
            };
            selected && period_ok
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAggregate {
    pub identifier: String,
    pub display_name: String,
    pub total: f64,
    pub label: Option<String>,
    pub row_count: usize,
}

/// Group scored rows by (identifier, display name), sum their totals, and
/// return the `top_n` best. The sort is stable and descending, so equal sums
/// keep first-encounter order.
pub fn rank_students(
    table: &ScoredTable,
    profile: &ReportProfile,
    top_n: usize,
) -> Vec<StudentAggregate> {
    let mut order: Vec<StudentAggregate> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for scored in &table.rows {
        let Some(id) = scored.row.get(&profile.id_column).and_then(|c| c.as_key()) else {
            continue;
        };
        let Some(name) = scored
            .row
            .get(&profile.name_column)
            .and_then(|c| c.as_key())
        else {
            continue;
        };
        let slot = *index.entry((id.clone(), name.clone())).or_insert_with(|| {
            order.push(StudentAggregate {
                identifier: id,
                display_name: name,
                total: 0.0,
                label: None,
                row_count: 0,
            });
            order.len() - 1
        });
        order[slot].total += scored.total;
        order[slot].row_count += 1;
    }

    for aggregate in &mut order {
        aggregate.label = classify(aggregate.total, &profile.bands);
    }

    order.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(top_n);
    order
}

/// Count failed marks per criterion column. Criteria whose column never
/// occurs in the data are omitted, not reported as zero.
pub fn count_violations(table: &ScoredTable, profile: &ReportProfile) -> Vec<(String, usize)> {
    profile
        .criteria
        .iter()
        .filter(|criterion| table.columns.iter().any(|c| c == *criterion))
        .map(|criterion| {
            let count = table
                .rows
                .iter()
                .filter(|scored| {
                    scored
                        .row
                        .get(criterion)
                        .map(|cell| match cell {
                            Cell::Bool(false) => true,
                            Cell::Empty => false,
                            other => other
                                .as_key()
                                .map(|k| profile.is_failed_mark(&k))
                                .unwrap_or(false),
                        })
                        .unwrap_or(false)
                })
                .count();
            (criterion.clone(), count)
        })
        .collect()
}
