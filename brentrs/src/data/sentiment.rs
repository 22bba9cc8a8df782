//! 타임스탬프 단위 감성 라벨 CSV → 일별 집계 시트
//!
//! 입력 컬럼: `datetime, sentiment[, ...]`. 헤더가 없으면 `datetime, sentiment, metal, Source`로 간주.
//! Positive = 1, Negative = -1, 그 외 라벨 = 0 (숫자는 그대로 사용)으로 바꾼 뒤
//! UTC 날짜별 평균/건수를 `Date, mean, count` 시트로 만든다.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::data::sheet::{parse_datetime_str, Cell, RawSheet};
use crate::utility::errors::{PipelineError, PipelineResult};

const DEFAULT_HEADERS: [&str; 4] = ["datetime", "sentiment", "metal", "Source"];

/// 감성 라벨 → 점수
pub fn sentiment_score(label: &str) -> f64 {
    let label = label.trim();
    match label {
        "Positive" => 1.0,
        "Negative" => -1.0,
        other => other.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
    }
}

pub fn aggregate_sentiment(path: &Path, name: &str) -> PipelineResult<RawSheet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PipelineError::csv(format!("{} 열기", path.display()), e.to_string()))?;

    let mut records = reader.records();
    let first = match records.next() {
        Some(record) => record?,
        None => {
            return Err(PipelineError::validation(
                path.display().to_string(),
                "감성 CSV가 비어있습니다",
            ))
        }
    };

    let has_header = first.get(0).map(str::trim) == Some("datetime");
    let headers: Vec<String> = if has_header {
        first.iter().map(|h| h.trim().to_string()).collect()
    } else {
        DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect()
    };

    let position = |column: &str| {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| PipelineError::missing_column(path.display().to_string(), column))
    };
    let datetime_index = position("datetime")?;
    let sentiment_index = position("sentiment")?;

    // 날짜별 (합계, 건수)
    let mut daily: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    let mut skipped = 0usize;

    let mut accumulate = |record: &csv::StringRecord| {
        let date = record
            .get(datetime_index)
            .and_then(parse_datetime_str)
            .map(|dt| dt.date());
        match date {
            Some(date) => {
                let score = sentiment_score(record.get(sentiment_index).unwrap_or(""));
                let entry = daily.entry(date).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
            None => skipped += 1,
        }
    };

    if !has_header {
        accumulate(&first);
    }
    for record in records {
        accumulate(&record?);
    }

    if skipped > 0 {
        warn!(
            "⚠️ [{}] 타임스탬프를 해석할 수 없는 {}행을 건너뜁니다",
            name, skipped
        );
    }

    let rows: Vec<Vec<Cell>> = daily
        .iter()
        .filter_map(|(date, (sum, count))| {
            let midnight = date.and_hms_opt(0, 0, 0)?;
            Some(vec![
                Cell::Date(midnight),
                Cell::Number(sum / *count as f64),
                Cell::Number(*count as f64),
            ])
        })
        .collect();

    info!(
        "📰 감성 데이터 집계 완료: {} ({}일)",
        name,
        rows.len()
    );

    Ok(RawSheet::new(
        name,
        vec!["Date".to_string(), "mean".to_string(), "count".to_string()],
        rows,
    ))
}
