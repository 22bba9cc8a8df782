//! 통합 테이블 → 학습용 특징 테이블
//!
//! 처리 순서:
//! 1. 타깃을 숫자로 변환 (텍스트인 경우)
//! 2. 타깃 이동평균 `SMA_w` 추가 (min_periods = 1)
//! 3. 타깃이 비어있는 행 제거
//! 4. 모든 컬럼 forward fill → backward fill
//! 5. `Date_numeric` (서기 1년 1월 1일 = 1인 일 번호) 추가
//! 6. 텍스트 컬럼 숫자 변환 시도, 결측값은 중앙값(숫자) / 최빈값(텍스트)으로 대체

use std::collections::BTreeMap;

use chrono::Datelike;
use tracing::{debug, info};

use crate::data::{Column, Table};
use crate::utility::errors::{PipelineError, PipelineResult};

pub const DATE_FEATURE: &str = "Date_numeric";

/// "334.72K" 같은 접미사 표기를 숫자로 변환. 해석할 수 없으면 None
///
/// `<숫자>[공백]*[K|M|B]` 형식을 먼저 시도하고 (숫자 문자는 `0-9 . - e E`),
/// 실패하면 일반 실수 해석을 시도한다. NaN/무한대는 결측으로 본다.
pub fn parse_numeric(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let body_end = value
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E')))
        .unwrap_or(value.len());
    let (body, rest) = value.split_at(body_end);
    let multiplier = match rest.trim_start() {
        "" => Some(1.0),
        "K" => Some(1e3),
        "M" => Some(1e6),
        "B" => Some(1e9),
        _ => None,
    };

    let parsed = match (body.is_empty(), multiplier) {
        (false, Some(multiplier)) => body.parse::<f64>().ok().map(|v| v * multiplier),
        _ => value.parse::<f64>().ok(),
    };
    parsed.filter(|v| v.is_finite())
}

/// 결측을 무시한 이동평균. 창 안에 값이 하나도 없으면 None
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let present: Vec<f64> = values[start..=i].iter().flatten().copied().collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect()
}

pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

/// 최빈값. 동률이면 사전순으로 가장 앞선 값
pub fn mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values.iter().flatten() {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// 파생이 끝난 특징 테이블
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    /// 타깃, 파생 컬럼, `Date_numeric`을 모두 포함
    pub table: Table,
    pub target_name: String,
    pub target: Vec<f64>,
    /// "original" 특징 목록 (타깃 제외, `Date_numeric` 마지막)
    pub feature_names: Vec<String>,
}

impl FeatureFrame {
    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    /// 텍스트(범주형)로 남은 특징 목록
    pub fn categorical_features(&self) -> Vec<&str> {
        self.table
            .columns()
            .filter(|(name, column)| !column.is_numeric() && *name != self.target_name)
            .map(|(name, _)| name)
            .collect()
    }
}

pub fn derive_features(
    mut table: Table,
    target_name: &str,
    sma_windows: &[usize],
) -> PipelineResult<FeatureFrame> {
    // 1. 타깃 숫자화
    let target_values: Vec<Option<f64>> = match table.column(target_name)? {
        Column::Numeric(values) => values.clone(),
        Column::Text(values) => values
            .iter()
            .map(|v| v.as_deref().and_then(parse_numeric))
            .collect(),
    };
    table.set_column(target_name, Column::Numeric(target_values.clone()))?;

    // 2. 이동평균
    for &window in sma_windows {
        table.set_column(
            format!("SMA_{}", window),
            Column::Numeric(rolling_mean(&target_values, window)),
        )?;
    }

    // 3. 타깃 결측 행 제거
    let keep: Vec<usize> = target_values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();
    let dropped = table.n_rows() - keep.len();
    if keep.is_empty() {
        return Err(PipelineError::validation(
            target_name,
            "타깃 값이 있는 행이 하나도 없습니다",
        ));
    }
    let mut table = table.select_rows(&keep);
    if dropped > 0 {
        info!("🧹 타깃 결측 {}행 제거 (남은 행: {})", dropped, table.n_rows());
    }

    // 4. 결측 채우기
    table.forward_fill();
    table.backward_fill();

    // 5. 날짜 특징
    let ordinals = table
        .dates()
        .iter()
        .map(|d| Some(d.num_days_from_ce() as f64))
        .collect();
    table.set_column(DATE_FEATURE, Column::Numeric(ordinals))?;

    // 6. 타입 변환 + 대체
    let names: Vec<String> = table
        .column_names()
        .iter()
        .filter(|n| n.as_str() != target_name && n.as_str() != DATE_FEATURE)
        .cloned()
        .collect();
    for name in &names {
        let imputed = impute_column(table.column(name)?);
        if !imputed.is_numeric() {
            debug!("범주형 특징: {}", name);
        }
        table.set_column(name.as_str(), imputed)?;
    }

    let target: Vec<f64> = table
        .numeric(target_name)?
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();

    let mut feature_names = names;
    feature_names.push(DATE_FEATURE.to_string());

    info!(
        "✅ 특징 파생 완료: {}행, 특징 {}개 (SMA 윈도우 {:?})",
        table.n_rows(),
        feature_names.len(),
        sma_windows
    );

    Ok(FeatureFrame {
        table,
        target_name: target_name.to_string(),
        target,
        feature_names,
    })
}

/// 숫자 변환 시도 후 결측 대체
///
/// 텍스트 컬럼은 값 하나라도 숫자로 해석되면 숫자 컬럼이 된다.
/// 모든 값이 비어있는 숫자 컬럼은 그대로 둔다.
fn impute_column(column: &Column) -> Column {
    match column {
        Column::Numeric(values) => Column::Numeric(fill_with_median(values.clone())),
        Column::Text(values) => {
            let parsed: Vec<Option<f64>> = values
                .iter()
                .map(|v| v.as_deref().and_then(parse_numeric))
                .collect();
            if parsed.iter().any(Option::is_some) {
                Column::Numeric(fill_with_median(parsed))
            } else {
                let fill = mode(values).unwrap_or_default();
                Column::Text(
                    values
                        .iter()
                        .map(|v| Some(v.clone().unwrap_or_else(|| fill.clone())))
                        .collect(),
                )
            }
        }
    }
}

fn fill_with_median(mut values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    if let Some(fill) = median(&values) {
        values.iter_mut().filter(|v| v.is_none()).for_each(|v| *v = Some(fill));
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_numeric_suffixes() {
        assert_eq!(parse_numeric("334.72K"), Some(334_720.0));
        assert_eq!(parse_numeric("1.5M"), Some(1_500_000.0));
        assert_eq!(parse_numeric("2 B"), Some(2e9));
        assert_eq!(parse_numeric(" -0.25 "), Some(-0.25));
        assert_eq!(parse_numeric("1e3"), Some(1000.0));
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("1.5k"), None);
        assert_eq!(parse_numeric("NaN"), None);
    }

    #[test]
    fn test_rolling_mean_min_periods_one() {
        let values = [Some(1.0), Some(2.0), None, Some(6.0)];
        let sma = rolling_mean(&values, 3);
        assert_eq!(sma, vec![Some(1.0), Some(1.5), Some(1.5), Some(4.0)]);
        assert_eq!(rolling_mean(&[None, Some(2.0)], 1), vec![None, Some(2.0)]);
    }

    #[test]
    fn test_median_and_mode() {
        assert_eq!(median(&[Some(3.0), None, Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[Some(4.0), Some(1.0)]), Some(2.5));
        assert_eq!(median(&[None]), None);

        let values = vec![Some("b".to_string()), Some("a".to_string()), Some("b".into()), Some("a".into())];
        assert_eq!(mode(&values), Some("a".to_string()));
        assert_eq!(mode(&[None]), None);
    }

    #[test]
    fn test_derive_drops_missing_target_and_fills() {
        let mut table = Table::new("unified", dates(5));
        table
            .push_column(
                "A_Close",
                Column::Numeric(vec![Some(10.0), None, Some(12.0), Some(13.0), Some(14.0)]),
            )
            .unwrap();
        table
            .push_column(
                "B_Volume",
                Column::Text(vec![None, Some("5K".into()), Some("1K".into()), Some("bad".into()), Some("2K".into())]),
            )
            .unwrap();
        table
            .push_column(
                "C_Mood",
                Column::Text(vec![Some("up".into()), None, None, Some("down".into()), None]),
            )
            .unwrap();
        table.push_column("D_Empty", Column::Numeric(vec![None; 5])).unwrap();

        let frame = derive_features(table, "A_Close", &[3]).unwrap();

        assert_eq!(frame.n_rows(), 4);
        assert_eq!(frame.target, vec![10.0, 12.0, 13.0, 14.0]);
        assert_eq!(
            frame.feature_names,
            vec!["B_Volume", "C_Mood", "D_Empty", "SMA_3", "Date_numeric"]
        );

        // 첫 행은 backward fill, "bad"는 중앙값으로 대체
        let volume = frame.table.numeric("B_Volume").unwrap();
        assert_eq!(volume, &[Some(1000.0), Some(1000.0), Some(1000.0), Some(2000.0)]);

        assert_eq!(
            frame.table.column("C_Mood").unwrap(),
            &Column::Text(vec![
                Some("up".into()),
                Some("up".into()),
                Some("down".into()),
                Some("down".into())
            ])
        );
        assert_eq!(frame.categorical_features(), vec!["C_Mood"]);
        assert_eq!(frame.table.column("D_Empty").unwrap().null_count(), 4);

        // SMA는 행 제거 전에 계산
        assert_eq!(
            frame.table.numeric("SMA_3").unwrap()[1],
            Some((10.0 + 12.0) / 2.0)
        );

        let ordinal = frame.table.numeric(DATE_FEATURE).unwrap()[0].unwrap();
        assert_eq!(ordinal, 737_425.0);
    }

    #[test]
    fn test_text_target_is_parsed() {
        let mut table = Table::new("unified", dates(2));
        table
            .push_column("A_Close", Column::Text(vec![Some("1.5K".into()), Some("x".into())]))
            .unwrap();
        let frame = derive_features(table, "A_Close", &[]).unwrap();
        assert_eq!(frame.target, vec![1500.0]);
    }

    #[test]
    fn test_missing_target_column() {
        let table = Table::new("unified", dates(2));
        assert!(matches!(
            derive_features(table, "A_Close", &[3]),
            Err(PipelineError::MissingColumn { .. })
        ));
    }
}
