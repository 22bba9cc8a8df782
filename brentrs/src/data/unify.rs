//! 여러 시트를 하나의 날짜 정렬 테이블로 통합
//!
//! 1. 고유 날짜가 가장 많은 시트의 날짜를 기준 달력으로 삼는다 (동률이면 앞 시트)
//! 2. 모든 시트의 값 컬럼을 `<시트>_<컬럼>` 이름으로 기준 달력에 left join
//! 3. 같은 이름의 컬럼은 처음 것만 남긴다
//!
//! 기준 달력에 없는 날짜는 버려지고, 시트가 덮지 못하는 날짜는 null로 남는다.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::data::sheet::{Cell, RawSheet};
use crate::data::table::{Column, Table};
use crate::utility::errors::{PipelineError, PipelineResult};

pub const DATE_COLUMN: &str = "Date";

/// 시트별로 날짜를 해석해 둔 중간 결과
struct DatedSheet<'a> {
    sheet: &'a RawSheet,
    date_index: usize,
    /// 날짜별 첫 번째 행 번호
    first_rows: HashMap<NaiveDate, usize>,
}

impl<'a> DatedSheet<'a> {
    fn new(sheet: &'a RawSheet, date_index: usize) -> Self {
        let mut first_rows = HashMap::new();
        let mut unparsed = 0usize;
        let mut duplicated = 0usize;

        for row in 0..sheet.rows.len() {
            match sheet.cell(row, date_index).to_date() {
                Some(date) => {
                    if first_rows.contains_key(&date) {
                        duplicated += 1;
                    } else {
                        first_rows.insert(date, row);
                    }
                }
                None => unparsed += 1,
            }
        }

        if unparsed > 0 {
            warn!(
                "⚠️ [{}] 날짜를 해석할 수 없는 행 {}개를 건너뜁니다",
                sheet.name, unparsed
            );
        }
        if duplicated > 0 {
            debug!(
                "[{}] 중복 날짜 행 {}개 (날짜별 첫 행만 사용)",
                sheet.name, duplicated
            );
        }

        Self {
            sheet,
            date_index,
            first_rows,
        }
    }
}

/// 시트 목록을 통합 테이블로 합친다.
///
/// 타깃 시트가 아닌 시트의 `target_column` 컬럼은 합치지 않으며,
/// 통합 후 `<target_sheet>_<target_column>` 컬럼이 없으면 오류.
pub fn unify(sheets: &[RawSheet], target_sheet: &str, target_column: &str) -> PipelineResult<Table> {
    let mut dated = Vec::new();
    for sheet in sheets {
        match sheet.column_index(DATE_COLUMN) {
            Some(index) => dated.push(DatedSheet::new(sheet, index)),
            None => warn!("⚠️ [{}] Date 컬럼이 없어 통합에서 제외합니다", sheet.name),
        }
    }

    if dated.is_empty() {
        return Err(PipelineError::MissingDateColumn {
            sheets: sheets
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    // 동률이면 먼저 나온 시트 유지
    let mut main = &dated[0];
    for candidate in &dated[1..] {
        if candidate.first_rows.len() > main.first_rows.len() {
            main = candidate;
        }
    }

    let calendar: Vec<NaiveDate> = main
        .first_rows
        .keys()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    info!(
        "📅 기준 시트: {} (고유 날짜 {}개, {} ~ {})",
        main.sheet.name,
        calendar.len(),
        calendar.first().map(|d| d.to_string()).unwrap_or_default(),
        calendar.last().map(|d| d.to_string()).unwrap_or_default()
    );

    let mut table = Table::new("unified", calendar);
    for entry in &dated {
        join_sheet(&mut table, entry, target_sheet, target_column)?;
    }

    let target = format!("{}_{}", target_sheet.trim(), target_column.trim());
    if !table.has_column(&target) {
        return Err(PipelineError::missing_column(table.name().to_string(), target));
    }

    info!(
        "✅ 시트 통합 완료: {}행 × {}컬럼",
        table.n_rows(),
        table.n_columns()
    );
    Ok(table)
}

fn join_sheet(
    table: &mut Table,
    entry: &DatedSheet<'_>,
    target_sheet: &str,
    target_column: &str,
) -> PipelineResult<()> {
    let sheet = entry.sheet;
    let is_target_sheet = sheet.name.trim() == target_sheet.trim();
    let mut seen_headers = HashSet::new();

    for (index, header) in sheet.headers.iter().enumerate() {
        if index == entry.date_index || header.is_empty() {
            continue;
        }
        if !seen_headers.insert(header.as_str()) {
            debug!("[{}] 중복 헤더 '{}' 무시", sheet.name, header);
            continue;
        }
        if !is_target_sheet && header == target_column.trim() {
            debug!("[{}] 타깃과 같은 이름의 '{}' 컬럼 제외", sheet.name, header);
            continue;
        }

        let name = format!("{}_{}", sheet.name.trim(), header);
        if table.has_column(&name) {
            debug!("중복 컬럼 '{}' 제외 (처음 것 유지)", name);
            continue;
        }

        let aligned: Vec<&Cell> = table
            .dates()
            .iter()
            .map(|date| match entry.first_rows.get(date) {
                Some(&row) => sheet.cell(row, index),
                None => &Cell::Empty,
            })
            .collect();

        let column = if is_numeric_column(sheet, index) {
            Column::Numeric(
                aligned
                    .iter()
                    .map(|cell| match cell {
                        Cell::Number(v) if !v.is_nan() => Some(*v),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            Column::Text(aligned.iter().map(|cell| cell.to_text()).collect())
        };

        table.push_column(name, column)?;
    }
    Ok(())
}

/// 비어있지 않은 셀이 모두 숫자면 숫자 컬럼
fn is_numeric_column(sheet: &RawSheet, index: usize) -> bool {
    (0..sheet.rows.len())
        .map(|row| sheet.cell(row, index))
        .filter(|cell| !cell.is_empty())
        .all(|cell| matches!(cell, Cell::Number(_)))
}
