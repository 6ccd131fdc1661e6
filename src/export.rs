use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::{info, trace};

use crate::domain::DeskError;
use crate::record::{Record, Value};

const PHOTO_FIELD: &str = "shop_photo";
const MAP_FIELD: &str = "google_map_link";

const CANONICAL_MAP_PREFIXES: [&str; 4] = [
    "https://maps.app.goo.gl/",
    "https://goo.gl/maps/",
    "https://www.google.com/maps",
    "https://maps.google.com/",
];

pub const SHEET_ALL: &str = "All Records";
pub const SHEET_VALID: &str = "Valid Map Links";
pub const SHEET_INVALID: &str = "Invalid Map Links";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

pub fn is_canonical_map_link(link: &str) -> bool {
    let link = link.trim();
    CANONICAL_MAP_PREFIXES.iter().any(|p| link.starts_with(p))
}

fn has_canonical_map_link(record: &Record) -> bool {
    match record.get(MAP_FIELD) {
        Some(Value::Text(link)) => is_canonical_map_link(link),
        _ => false,
    }
}

fn link_target(field: &str, text: &str, photo_base_url: &str) -> String {
    if text.starts_with("http://") || text.starts_with("https://") {
        return text.to_string();
    }
    match field {
        PHOTO_FIELD => format!(
            "{}/{}",
            photo_base_url.trim_end_matches('/'),
            text.trim_start_matches('/')
        ),
        _ => format!("https://{text}"),
    }
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    field: &str,
    value: &Value,
    photo_base_url: &str,
) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Text(text) if field == PHOTO_FIELD || field == MAP_FIELD => {
            let target = link_target(field, text, photo_base_url);
            if let Err(e) = sheet.write_url(row, col, target.as_str()) {
                trace!("Writing {target} as plain text: {e}");
                sheet.write_string(row, col, text)?;
            }
        }
        Value::Text(text) => {
            sheet.write_string(row, col, text)?;
        }
        Value::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Value::Int(_) | Value::Float(_) => {
            sheet.write_number(row, col, value.as_f64().unwrap_or_default())?;
        }
    }
    Ok(())
}

fn write_sheet(
    workbook: &mut Workbook,
    name: &str,
    columns: &[String],
    records: &[&Record],
    photo_base_url: &str,
) -> Result<(), XlsxError> {
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;

    for (cidx, column) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, cidx as u16, column, &header)?;
    }
    for (ridx, record) in records.iter().enumerate() {
        for (cidx, column) in columns.iter().enumerate() {
            if let Some(value) = record.get(column) {
                write_cell(
                    sheet,
                    ridx as u32 + 1,
                    cidx as u16,
                    column,
                    value,
                    photo_base_url,
                )?;
            }
        }
    }
    Ok(())
}

/// All records, then the records split by whether their map link is a
/// canonical Google Maps URL.
pub fn build_workbook(
    records: &[Record],
    columns: &[String],
    photo_base_url: &str,
) -> Result<(Workbook, ExportSummary), DeskError> {
    let all: Vec<&Record> = records.iter().collect();
    let (valid, invalid): (Vec<&Record>, Vec<&Record>) =
        records.iter().partition(|r| has_canonical_map_link(r));

    let mut workbook = Workbook::new();
    write_sheet(&mut workbook, SHEET_ALL, columns, &all, photo_base_url)?;
    write_sheet(&mut workbook, SHEET_VALID, columns, &valid, photo_base_url)?;
    write_sheet(&mut workbook, SHEET_INVALID, columns, &invalid, photo_base_url)?;

    let summary = ExportSummary {
        total: all.len(),
        valid: valid.len(),
        invalid: invalid.len(),
    };
    Ok((workbook, summary))
}

pub fn export_workbook(
    records: &[Record],
    columns: &[String],
    path: &Path,
    photo_base_url: &str,
) -> Result<ExportSummary, DeskError> {
    let (mut workbook, summary) = build_workbook(records, columns, photo_base_url)?;
    workbook.save(path)?;
    info!(
        "Exported {} records to {} ({} valid / {} invalid map links)",
        summary.total,
        path.display(),
        summary.valid,
        summary.invalid
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{Data, Reader, open_workbook_auto_from_rs};

    use super::*;

    fn retailer(id: i64, link: Option<&str>) -> Record {
        let r = Record::new()
            .with("id", id)
            .with("shop_name", "Shop")
            .with("shop_photo", "/uploads/a.jpg");
        match link {
            Some(link) => r.with("google_map_link", link),
            None => r.with("google_map_link", Value::Null),
        }
    }

    #[test]
    fn canonical_links() {
        assert!(is_canonical_map_link("https://maps.app.goo.gl/abc"));
        assert!(is_canonical_map_link(" https://www.google.com/maps/place/x "));
        assert!(!is_canonical_map_link("maps.app.goo.gl/abc"));
        assert!(!is_canonical_map_link("https://example.com/maps"));
    }

    #[test]
    fn link_targets_get_a_scheme() {
        assert_eq!(
            link_target(PHOTO_FIELD, "/uploads/a.jpg", "http://localhost:5000/"),
            "http://localhost:5000/uploads/a.jpg"
        );
        assert_eq!(
            link_target(MAP_FIELD, "maps.app.goo.gl/x", ""),
            "https://maps.app.goo.gl/x"
        );
        assert_eq!(
            link_target(MAP_FIELD, "http://goo.gl/maps/x", ""),
            "http://goo.gl/maps/x"
        );
    }

    #[test]
    fn workbook_splits_records_by_map_link() {
        let records = vec![
            retailer(1, Some("https://maps.app.goo.gl/one")),
            retailer(2, Some("somewhere")),
            retailer(3, None),
        ];
        let columns: Vec<String> = ["id", "shop_name", "shop_photo", "google_map_link"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (mut workbook, summary) =
            build_workbook(&records, &columns, "http://localhost:5000").unwrap();
        assert_eq!(
            summary,
            ExportSummary {
                total: 3,
                valid: 1,
                invalid: 2
            }
        );

        let bytes = workbook.save_to_buffer().unwrap();
        let mut book = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(book.sheet_names(), vec![SHEET_ALL, SHEET_VALID, SHEET_INVALID]);
        let all = book.worksheet_range_at(0).unwrap().unwrap();
        assert_eq!(all.height(), 4);
        assert_eq!(all.get((0, 0)), Some(&Data::String("id".into())));
        let valid = book.worksheet_range_at(1).unwrap().unwrap();
        assert_eq!(valid.height(), 2);
        assert_eq!(valid.get((1, 0)), Some(&Data::Float(1.0)));
    }
}
