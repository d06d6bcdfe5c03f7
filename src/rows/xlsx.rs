//! Streaming `.xlsx` row source built on calamine's cell reader.
//!
//! Only the current row is held in memory; cells arrive in row-major order and
//! are assembled into rows, padding column gaps with [`CellValue::Empty`].

use std::path::Path;

use calamine::{DataRef, Reader, Xlsx, open_workbook};

use super::{CellValue, RowSource, SourceError};

type PositionedCell = (u32, u32, CellValue);

/// Reads the first worksheet of an `.xlsx` workbook
#[derive(Debug, Clone, Copy)]
pub struct XlsxRowSource;

/// Assembles rows out of a stream of positioned cells
pub struct CellRowSource<F> {
    next_cell: F,
    pending: Option<PositionedCell>,
    exhausted: bool,
}

impl<F> CellRowSource<F>
where
    F: FnMut() -> Result<Option<PositionedCell>, SourceError>,
{
    /// Wrap a cell stream yielding `(row, column, value)` in row-major order
    pub fn from_cells(next_cell: F) -> Self {
        Self {
            next_cell,
            pending: None,
            exhausted: false,
        }
    }
}

impl XlsxRowSource {
    /// Open the workbook at `path` and hand a row source over its first
    /// worksheet to `consume`.
    ///
    /// The source borrows the open workbook, so it only lives for the
    /// duration of the closure.
    pub fn scan<P, R>(
        path: P,
        consume: impl FnOnce(&mut dyn RowSource) -> R,
    ) -> Result<R, SourceError>
    where
        P: AsRef<Path>,
    {
        let mut workbook: Xlsx<_> = open_workbook(path)?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(SourceError::NoWorksheet)?;
        let mut cells = workbook.worksheet_cells_reader(&sheet)?;

        let mut source = CellRowSource::from_cells(move || -> Result<Option<PositionedCell>, SourceError> {
            let Some(cell) = cells.next_cell()? else {
                return Ok(None);
            };
            let (row, column) = cell.get_position();
            Ok(Some((row, column, cell_value_from_data(cell.get_value()))))
        });

        Ok(consume(&mut source))
    }
}

impl<F> RowSource for CellRowSource<F>
where
    F: FnMut() -> Result<Option<PositionedCell>, SourceError>,
{
    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, SourceError> {
        let first = match self.pending.take() {
            Some(cell) => cell,
            None if self.exhausted => return Ok(None),
            None => match (self.next_cell)()? {
                Some(cell) => cell,
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
            },
        };

        let current_row = first.0;
        let mut row = Vec::new();
        place(&mut row, first.1, first.2);

        loop {
            match (self.next_cell)()? {
                Some(cell) if cell.0 == current_row => place(&mut row, cell.1, cell.2),
                Some(cell) => {
                    self.pending = Some(cell);
                    break;
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        Ok(Some(row))
    }
}

fn place(row: &mut Vec<CellValue>, column: u32, value: CellValue) {
    let column = column as usize;
    if row.len() <= column {
        row.resize(column + 1, CellValue::Empty);
    }
    row[column] = value;
}

/// Convert a borrowed calamine cell into an owned [`CellValue`]
pub fn cell_value_from_data(data: &DataRef<'_>) -> CellValue {
    match data {
        DataRef::Int(value) => CellValue::Int(*value),
        DataRef::Float(value) => CellValue::Float(*value),
        DataRef::String(text) => CellValue::Text(text.clone()),
        DataRef::SharedString(text) => CellValue::Text((*text).to_string()),
        DataRef::Bool(value) => CellValue::Bool(*value),
        DataRef::DateTime(value) => match value.as_datetime() {
            Some(datetime) if datetime.time() == chrono::NaiveTime::MIN => {
                CellValue::DateTime(datetime.format("%Y-%m-%d").to_string())
            }
            Some(datetime) => CellValue::DateTime(datetime.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Float(value.as_f64()),
        },
        DataRef::DateTimeIso(text) | DataRef::DurationIso(text) => {
            CellValue::DateTime(text.clone())
        }
        _ => CellValue::Empty,
    }
}
