//! 워크북 읽기
//!
//! - `.xlsx` / `.xlsm` / `.xls` / `.ods` 파일: 시트별로 읽는다
//! - 디렉토리: 시트마다 `<시트명>.csv` 파일 하나

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use tracing::{debug, info};

use crate::data::sheet::{Cell, RawSheet};
use crate::utility::errors::{PipelineError, PipelineResult};

/// 설정된 시트들을 읽는다. 시트가 없으면 오류
pub fn read_workbook(path: &Path, sheets: &[String]) -> PipelineResult<Vec<RawSheet>> {
    if !path.exists() {
        return Err(PipelineError::workbook(
            path.display().to_string(),
            "파일 또는 디렉토리가 존재하지 않습니다",
        ));
    }

    let result = if path.is_dir() {
        sheets
            .iter()
            .map(|sheet| read_csv_sheet(&path.join(format!("{}.csv", sheet)), sheet))
            .collect::<PipelineResult<Vec<_>>>()
    } else {
        read_spreadsheet(path, sheets)
    }?;

    info!(
        "📖 워크북 로드 완료: {} ({}개 시트)",
        path.display(),
        result.len()
    );
    Ok(result)
}

fn read_spreadsheet(path: &Path, sheets: &[String]) -> PipelineResult<Vec<RawSheet>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| PipelineError::workbook(path.display().to_string(), e.to_string()))?;
    let available = workbook.sheet_names();

    let mut result = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        if !available.iter().any(|name| name == sheet) {
            return Err(PipelineError::workbook(
                path.display().to_string(),
                format!("시트 '{}'가 없습니다 (존재하는 시트: {})", sheet, available.join(", ")),
            ));
        }

        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| PipelineError::workbook(path.display().to_string(), e.to_string()))?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.iter().map(header_text).collect(),
            None => Vec::new(),
        };
        let body: Vec<Vec<Cell>> = rows
            .map(|row| row.iter().map(data_to_cell).collect())
            .collect();

        debug!("[{}] {}행 × {}컬럼", sheet, body.len(), headers.len());
        result.push(RawSheet::new(sheet.clone(), headers, body));
    }
    Ok(result)
}

fn header_text(data: &Data) -> String {
    match data_to_cell(data) {
        Cell::Date(dt) => dt.format("%Y-%m-%d").to_string(),
        cell => cell.to_text().unwrap_or_default(),
    }
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Float(v) => Cell::Number(*v),
        Data::Bool(v) => Cell::Number(if *v { 1.0 } else { 0.0 }),
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => serial_to_datetime(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or(Cell::Empty),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

/// 스프레드시트 일련번호(소수부 = 하루 중 시각) → 날짜/시각
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    base.checked_add_signed(Duration::days(days as i64))?
        .checked_add_signed(Duration::seconds(seconds))
}

/// 헤더가 있는 CSV 한 개를 시트로 읽는다
pub fn read_csv_sheet(path: &Path, sheet_name: &str) -> PipelineResult<RawSheet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PipelineError::csv(format!("{} 열기", path.display()), e.to_string()))?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(text_to_cell).collect());
    }

    debug!("[{}] CSV {}행 × {}컬럼", sheet_name, rows.len(), headers.len());
    Ok(RawSheet::new(sheet_name, headers, rows))
}

/// CSV 필드 → 셀. 실수로 해석되면 숫자, 아니면 텍스트
pub fn text_to_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if !v.is_nan() => Cell::Number(v),
        _ => Cell::Text(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_read_csv_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Brent.csv"),
            "Date,Close,Vol.\n2020-01-02,66.25,334.72K\n2020-01-03,68.6,\n",
        )
        .unwrap();
        fs::write(dir.path().join("USD.csv"), "Date,Price\n2020-01-02,96.8\n").unwrap();

        let sheets =
            read_workbook(dir.path(), &["Brent".to_string(), "USD".to_string()]).unwrap();
        assert_eq!(sheets.len(), 2);

        let brent = &sheets[0];
        assert_eq!(brent.headers, vec!["Date", "Close", "Vol."]);
        assert_eq!(brent.rows[0][1], Cell::Number(66.25));
        assert_eq!(brent.rows[0][2], Cell::Text("334.72K".into()));
        assert_eq!(brent.rows[1][2], Cell::Empty);
        assert_eq!(
            brent.rows[0][0].to_date(),
            NaiveDate::from_ymd_opt(2020, 1, 2)
        );
    }

    #[test]
    fn test_missing_sheet_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_workbook(dir.path(), &["Brent".to_string()]);
        assert!(matches!(result, Err(PipelineError::Csv { .. })));
    }

    #[test]
    fn test_missing_workbook_is_error() {
        let result = read_workbook(Path::new("/nonexistent/Features.xlsx"), &["Brent".to_string()]);
        assert!(matches!(result, Err(PipelineError::Workbook { .. })));
    }

    #[test]
    fn test_serial_to_datetime() {
        let dt = serial_to_datetime(43831.5).unwrap();
        assert_eq!(dt.to_string(), "2020-01-01 12:00:00");
    }
}
