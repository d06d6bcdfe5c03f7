//! # Row validation
//!
//! Turns a lazy sequence of spreadsheet rows into accepted [`RowCandidate`]s.
//!
//! The header row is found by scanning until a row maps every required field
//! through the [`crate::headers`] synonym table. Every following row is either
//! accepted or silently skipped; only a missing header or a broken source
//! escalates as an error. Skip heuristics are pluggable through [`SkipRule`].

mod xlsx;

use std::collections::{BTreeSet, VecDeque};

use thiserror::Error;

use crate::headers::{self, HeaderField};

pub use xlsx::{CellRowSource, XlsxRowSource, cell_value_from_data};

/// A single spreadsheet cell, detached from the reader that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Date or time cell, already rendered as text
    DateTime(String),
}

impl CellValue {
    /// Borrow the text of a string cell. Non-text cells yield `None`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Empty cell or whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Coerce to the string stored on a record.
    ///
    /// Whole floats render without a fractional part so phone numbers typed
    /// as numbers survive (`5512345678.0` becomes `"5512345678"`).
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(text) => Some(text.clone()),
            CellValue::Int(value) => Some(value.to_string()),
            CellValue::Float(value) => Some(render_float(*value)),
            CellValue::Bool(true) => Some("TRUE".to_string()),
            CellValue::Bool(false) => Some("FALSE".to_string()),
            CellValue::DateTime(text) => Some(text.clone()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

fn render_float(value: f64) -> String {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Failure reading the underlying row source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("workbook could not be read: {0}")]
    Workbook(#[from] calamine::XlsxError),
    #[error("workbook contains no worksheets")]
    NoWorksheet,
}

/// Errors that stop validation
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("header row not found; missing required columns: {}", join_fields(.missing))]
    HeaderNotFound { missing: Vec<HeaderField> },
    #[error(transparent)]
    Source(#[from] SourceError),
}

fn join_fields(fields: &[HeaderField]) -> String {
    fields
        .iter()
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A lazy, fallible sequence of rows
pub trait RowSource {
    /// Next row, or `None` once the source is exhausted
    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, SourceError>;
}

impl<R: RowSource + ?Sized> RowSource for &mut R {
    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, SourceError> {
        (**self).next_row()
    }
}

/// Rows held in memory, mostly useful for tests and small imports
#[derive(Debug, Default, Clone)]
pub struct MemoryRowSource {
    rows: VecDeque<Vec<CellValue>>,
}

impl MemoryRowSource {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows: rows.into() }
    }

    /// Build from rows of plain strings; `""` becomes an empty cell
    pub fn from_strings(rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            CellValue::Empty
                        } else {
                            CellValue::from(*cell)
                        }
                    })
                    .collect()
            })
            .collect();
        Self::new(rows)
    }
}

impl RowSource for MemoryRowSource {
    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, SourceError> {
        Ok(self.rows.pop_front())
    }
}

/// Column index to field mapping taken from the header row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    /// Sorted by column index
    columns: Vec<(usize, HeaderField)>,
}

impl HeaderMap {
    /// Map every text cell of `row` whose canonical token is a known synonym
    pub fn from_row(row: &[CellValue]) -> Self {
        let columns = row
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| {
                let token = headers::normalize_cell(cell.as_text());
                headers::lookup(&token).map(|field| (index, field))
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[(usize, HeaderField)] {
        &self.columns
    }

    pub fn fields(&self) -> BTreeSet<HeaderField> {
        self.columns.iter().map(|(_, field)| *field).collect()
    }

    /// Required fields with no mapped column, in canonical order
    pub fn missing_required(&self) -> Vec<HeaderField> {
        let fields = self.fields();
        HeaderField::REQUIRED
            .into_iter()
            .filter(|field| !fields.contains(field))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    /// Lowest mapped column index
    pub fn first_column(&self) -> Option<usize> {
        self.columns.first().map(|(index, _)| *index)
    }
}

/// Scan `source` until a row maps every required field.
///
/// On exhaustion the error names the required fields absent from the best
/// candidate row seen, or all of them when no row mapped anything.
pub fn detect_header<S: RowSource>(source: &mut S) -> Result<HeaderMap, ValidatorError> {
    let mut best: Option<HeaderMap> = None;

    while let Some(row) = source.next_row()? {
        let candidate = HeaderMap::from_row(&row);
        if candidate.is_complete() {
            return Ok(candidate);
        }

        let improves = match &best {
            Some(current) => candidate.missing_required().len() < current.missing_required().len(),
            None => !candidate.columns.is_empty(),
        };
        if improves {
            best = Some(candidate);
        }
    }

    let missing = best
        .map(|header| header.missing_required())
        .unwrap_or_else(|| HeaderField::REQUIRED.to_vec());
    Err(ValidatorError::HeaderNotFound { missing })
}

/// A data row that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCandidate {
    pub full_name: String,
    pub email: String,
    pub job_title: String,
    pub mobile_phone: Option<String>,
    pub office_phone: Option<String>,
}

/// Heuristic for dropping spreadsheet artifacts that look like data.
///
/// Both hooks default to "keep the row".
pub trait SkipRule: Send + Sync {
    /// Inspect the raw row before any coercion
    fn skip_raw(&self, _row: &[CellValue], _header: &HeaderMap) -> bool {
        false
    }

    /// Inspect a fully assembled candidate
    fn skip_candidate(&self, _candidate: &RowCandidate) -> bool {
        false
    }
}

/// Skips header rows repeated further down the sheet (page breaks, pasted blocks)
#[derive(Debug, Default, Clone, Copy)]
pub struct RepeatedHeaderRule;

impl SkipRule for RepeatedHeaderRule {
    fn skip_raw(&self, row: &[CellValue], header: &HeaderMap) -> bool {
        let Some(index) = header.first_column() else {
            return false;
        };
        let token = headers::normalize_cell(row.get(index).and_then(CellValue::as_text));
        token == headers::normalize("Nombre")
    }
}

/// Skips rows whose name is only digits, typically row counters or totals
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericNameRule;

impl SkipRule for NumericNameRule {
    fn skip_candidate(&self, candidate: &RowCandidate) -> bool {
        !candidate.full_name.is_empty() && candidate.full_name.chars().all(|c| c.is_ascii_digit())
    }
}

pub fn default_rules() -> Vec<Box<dyn SkipRule>> {
    vec![Box::new(RepeatedHeaderRule), Box::new(NumericNameRule)]
}

/// Validates the rows following a detected header
pub struct RowValidator<S> {
    source: S,
    header: HeaderMap,
    rules: Vec<Box<dyn SkipRule>>,
    accepted: u64,
    rejected: u64,
}

impl<S: RowSource> RowValidator<S> {
    /// Detect the header and prepare to validate with the default rules
    pub fn new(source: S) -> Result<Self, ValidatorError> {
        Self::with_rules(source, default_rules())
    }

    pub fn with_rules(mut source: S, rules: Vec<Box<dyn SkipRule>>) -> Result<Self, ValidatorError> {
        let header = detect_header(&mut source)?;
        Ok(Self {
            source,
            header,
            rules,
            accepted: 0,
            rejected: 0,
        })
    }

    pub fn header(&self) -> &HeaderMap {
        &self.header
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Advance to the next accepted row
    pub fn next_candidate(&mut self) -> Result<Option<RowCandidate>, ValidatorError> {
        while let Some(row) = self.source.next_row()? {
            match self.evaluate(&row) {
                Some(candidate) => {
                    self.accepted += 1;
                    return Ok(Some(candidate));
                }
                None => self.rejected += 1,
            }
        }
        Ok(None)
    }

    fn evaluate(&self, row: &[CellValue]) -> Option<RowCandidate> {
        if row.iter().all(CellValue::is_blank) {
            return None;
        }
        if self.rules.iter().any(|rule| rule.skip_raw(row, &self.header)) {
            return None;
        }

        let candidate = self.assemble(row)?;
        if self.rules.iter().any(|rule| rule.skip_candidate(&candidate)) {
            return None;
        }
        Some(candidate)
    }

    fn assemble(&self, row: &[CellValue]) -> Option<RowCandidate> {
        let mut full_name = None;
        let mut email = None;
        let mut job_title = None;
        let mut mobile_phone = None;
        let mut office_phone = None;

        for (index, field) in self.header.columns() {
            let Some(text) = row.get(*index).and_then(CellValue::to_text) else {
                continue;
            };
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            let slot = match field {
                HeaderField::FullName => &mut full_name,
                HeaderField::Email => &mut email,
                HeaderField::JobTitle => &mut job_title,
                HeaderField::MobilePhone => &mut mobile_phone,
                HeaderField::OfficePhone => &mut office_phone,
            };
            if slot.is_none() {
                *slot = Some(text.to_string());
            }
        }

        Some(RowCandidate {
            full_name: full_name?,
            email: email?,
            job_title: job_title?,
            mobile_phone,
            office_phone,
        })
    }
}

impl<S: RowSource> Iterator for RowValidator<S> {
    type Item = Result<RowCandidate, ValidatorError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_candidate().transpose()
    }
}
