use std::fs;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Instant;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use polars::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::backend::{Backend, BulkUpload, ImportOutcome};
use crate::domain::DeskError;
use crate::record::{Record, RecordKind, Value};

/// Raw spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn to_value(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Text(s) if s.is_empty() => Value::Null,
            Cell::Text(s) => Value::Text(s.clone()),
            Cell::Number(n) => Value::from_number(*n),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

/// Cells of one data row, addressed by column index.
pub type ImportRow = Vec<Cell>;

const RETAILER_COLUMNS: [&str; 11] = [
    "timestamp",
    "distributor_name",
    "location",
    "salesman_name",
    "shop_name",
    "shop_address",
    "contact_person",
    "contact_mobile",
    "shop_age",
    "shop_photo",
    "google_map_link",
];

const DISTRIBUTOR_COLUMNS: [&str; 5] = [
    "distributor_name",
    "mobile",
    "address",
    "target_area",
    "pincode",
];

/// Fixed column index to field name pairs, applied to every row alike.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportMapping {
    columns: Vec<(usize, String)>,
}

impl ImportMapping {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (usize, &'a str)>) -> Self {
        ImportMapping {
            columns: pairs
                .into_iter()
                .map(|(idx, name)| (idx, name.to_string()))
                .collect(),
        }
    }

    pub fn retailer() -> Self {
        ImportMapping::new(RETAILER_COLUMNS.into_iter().enumerate())
    }

    pub fn distributor() -> Self {
        ImportMapping::new(DISTRIBUTOR_COLUMNS.into_iter().enumerate())
    }

    pub fn for_kind(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Retailer => ImportMapping::retailer(),
            RecordKind::Distributor => ImportMapping::distributor(),
        }
    }

    pub fn columns(&self) -> &[(usize, String)] {
        &self.columns
    }

    /// Number of columns a row needs to fill every field.
    pub fn width(&self) -> usize {
        self.columns.iter().map(|(idx, _)| idx + 1).max().unwrap_or(0)
    }
}

#[derive(Debug, PartialEq)]
enum FileType {
    Workbook,
    Csv,
}

fn detect_file_type(path: &Path) -> Result<FileType, DeskError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("XLSX") | Some("XLSM") | Some("XLSB") | Some("XLS") | Some("ODS") => {
            Ok(FileType::Workbook)
        }
        Some("CSV") => Ok(FileType::Csv),
        _ => Err(DeskError::UnknownFileType),
    }
}

fn check_file(path: &Path) -> Result<u64, DeskError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DeskError::FileNotFound,
        ErrorKind::PermissionDenied => DeskError::PermissionDenied,
        _ => DeskError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(DeskError::LoadingFailed("Not a file!".into()));
    }
    Ok(metadata.len())
}

fn cell_from(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::Error(e) => {
            trace!("Treating error cell {e:?} as empty");
            Cell::Empty
        }
        other => Cell::Text(other.to_string()),
    }
}

/// Rows of the first worksheet. Row 0 is the header and is dropped by
/// position, whatever it contains.
pub fn parse_workbook(bytes: Vec<u8>) -> Result<Vec<ImportRow>, DeskError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(DeskError::NoWorksheet)??;

    // The used range may not start at column A, keep indices absolute
    let offset = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    let rows: Vec<ImportRow> = range
        .rows()
        .skip(1)
        .map(|row| {
            std::iter::repeat_n(Cell::Empty, offset)
                .chain(row.iter().map(cell_from))
                .collect()
        })
        .collect();
    debug!("Workbook holds {} data rows", rows.len());
    Ok(rows)
}

fn parse_csv(path: &Path) -> Result<Vec<ImportRow>, DeskError> {
    let df = LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        // The first line fixes the width, extra trailing cells are dropped
        .with_truncate_ragged_lines(true)
        .finish()?
        .collect()?;

    let columns = df
        .get_columns()
        .iter()
        .map(|column| -> Result<Vec<Cell>, PolarsError> {
            let column = column.cast(&DataType::String)?;
            Ok(column
                .str()?
                .into_iter()
                .map(|v| v.map(Cell::from).unwrap_or_default())
                .collect::<Vec<Cell>>())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rows = (1..df.height())
        .map(|ridx| columns.iter().map(|c| c[ridx].clone()).collect())
        .collect();
    Ok(rows)
}

/// Reads a spreadsheet or csv file into data rows.
pub fn parse_file(path: &Path) -> Result<Vec<ImportRow>, DeskError> {
    let file_size = check_file(path)?;
    let start_time = Instant::now();
    let rows = match detect_file_type(path)? {
        FileType::Workbook => parse_workbook(fs::read(path)?)?,
        FileType::Csv => parse_csv(path)?,
    };
    info!(
        "Parsed {} rows from {} ({} bytes) in {}ms",
        rows.len(),
        path.display(),
        file_size,
        start_time.elapsed().as_millis()
    );
    Ok(rows)
}

/// Maps every row positionally. Missing or empty cells become null,
/// short rows never fail.
pub fn normalize(rows: &[ImportRow], mapping: &ImportMapping) -> Vec<Record> {
    rows.iter()
        .map(|row| {
            let mut record = Record::new();
            for (idx, field) in mapping.columns() {
                let value = row.get(*idx).map(Cell::to_value).unwrap_or_default();
                record.set(field, value);
            }
            record
        })
        .collect()
}

pub fn load(path: &Path, mapping: &ImportMapping) -> Result<Vec<Record>, DeskError> {
    let rows = parse_file(path)?;
    let short = rows.iter().filter(|r| r.len() < mapping.width()).count();
    if short > 0 {
        warn!(
            "{short} rows have fewer than {} columns, missing fields are null",
            mapping.width()
        );
    }
    Ok(normalize(&rows, mapping))
}

/// Sends the whole batch in one request. The outcome covers the batch.
pub fn submit(
    backend: &dyn Backend,
    records: Vec<Record>,
    photos: Vec<PathBuf>,
) -> Result<ImportOutcome, DeskError> {
    let upload = BulkUpload { records, photos };
    info!(
        "Submitting {} records with {} photos",
        upload.records.len(),
        upload.photos.len()
    );
    let outcome = backend.bulk_import(&upload)?;
    if outcome.accepted() {
        info!("Bulk import accepted: {}", outcome.message().unwrap_or("ok"));
    } else {
        warn!("Bulk import not confirmed by the server");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn short_rows_fill_with_null() {
        let rows = vec![vec![text("2024-01-01"), text("Sharma"), Cell::Empty, text("Ravi")]];
        let records = normalize(&rows, &ImportMapping::retailer());
        let r = &records[0];
        assert_eq!(r.len(), 11);
        assert_eq!(r.get("distributor_name"), Some(&Value::Text("Sharma".into())));
        assert_eq!(r.get("location"), Some(&Value::Null));
        assert_eq!(r.get("salesman_name"), Some(&Value::Text("Ravi".into())));
        assert_eq!(r.get("google_map_link"), Some(&Value::Null));
    }

    #[test]
    fn empty_row_becomes_all_null_record() {
        let records = normalize(&[Vec::new()], &ImportMapping::distributor());
        assert_eq!(records.len(), 1);
        assert!(records[0].values().all(Value::is_null));
    }

    #[test]
    fn numbers_keep_their_digits() {
        let rows = vec![vec![text("A"), Cell::Number(9876543210.0)]];
        let records = normalize(&rows, &ImportMapping::distributor());
        assert_eq!(records[0].get("mobile"), Some(&Value::Int(9876543210)));
    }

    #[test]
    fn mapping_width_follows_highest_index() {
        assert_eq!(ImportMapping::retailer().width(), 11);
        assert_eq!(ImportMapping::new([(3, "a"), (1, "b")]).width(), 4);
        assert_eq!(ImportMapping::new([]).width(), 0);
    }

    #[test]
    fn workbook_header_is_dropped_by_position() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        // Not a header at all, still dropped
        sheet.write_string(0, 0, "first data row").unwrap();
        sheet.write_string(1, 0, "second").unwrap();
        sheet.write_number(1, 1, 42.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = parse_workbook(bytes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], vec![text("second"), Cell::Number(42.0)]);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert_eq!(
            detect_file_type(Path::new("rows.XLSX")).unwrap(),
            FileType::Workbook
        );
        assert!(matches!(
            detect_file_type(Path::new("rows.txt")),
            Err(DeskError::UnknownFileType)
        ));
    }

    #[test]
    fn csv_rows_are_read_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distributors.csv");
        fs::write(
            &path,
            "Name,Mobile,Address,Area,Pin\nSharma,9876543210,MG Road,North,110001\nGupta,,,South,\n",
        )
        .unwrap();
        let records = load(&path, &ImportMapping::distributor()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("mobile"), Some(&Value::Text("9876543210".into())));
        assert_eq!(records[1].get("mobile"), Some(&Value::Null));
        assert_eq!(records[1].get("target_area"), Some(&Value::Text("South".into())));
    }

    #[test]
    fn ragged_csv_lines_do_not_abort_the_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distributors.csv");
        fs::write(
            &path,
            "Name,Mobile,Address,Area,Pin\nSharma,9876543210,MG Road,North,110001,extra,\nVerma,9123456789\nGupta,,,South,411001\n",
        )
        .unwrap();
        let records = load(&path, &ImportMapping::distributor()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("pincode"), Some(&Value::Text("110001".into())));
        assert_eq!(records[0].len(), 5);
        assert_eq!(records[1].get("mobile"), Some(&Value::Text("9123456789".into())));
        assert_eq!(records[1].get("address"), Some(&Value::Null));
        assert_eq!(records[2].get("pincode"), Some(&Value::Text("411001".into())));
    }
}
