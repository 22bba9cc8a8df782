//! 기준 모델 중요도 기반 특징 축소

use tracing::info;
use treeboost::{BoostParams, GradientBoostedRegressor};

use crate::features::derive::FeatureFrame;
use crate::features::matrix::build_matrix;
use crate::utility::errors::{PipelineError, PipelineResult};

/// 특징 이름 → 중요도 (입력 순서 유지)
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    entries: Vec<(String, f64)>,
}

impl FeatureImportance {
    /// 이름과 점수는 같은 길이여야 한다
    pub fn from_scores(names: &[String], scores: &[f64]) -> PipelineResult<Self> {
        if names.len() != scores.len() {
            return Err(PipelineError::validation(
                "feature_importance",
                format!("중요도 {}개, 특징 {}개", scores.len(), names.len()),
            ));
        }
        Ok(Self {
            entries: names
                .iter()
                .zip(scores)
                .map(|(name, score)| (name.clone(), *score))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, score)| *score)
    }

    pub fn max(&self) -> f64 {
        self.entries
            .iter()
            .map(|(_, score)| *score)
            .fold(0.0, f64::max)
    }

    /// ratio × 최대 중요도
    pub fn threshold(&self, ratio: f64) -> f64 {
        ratio * self.max()
    }

    /// 임계값 이상인 특징 (입력 순서 유지). 임계값과 같으면 남긴다
    pub fn reduced(&self, ratio: f64) -> Vec<String> {
        let threshold = self.threshold(ratio);
        self.entries
            .iter()
            .filter(|(_, score)| !(*score < threshold))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// 중요도 내림차순 (동률이면 입력 순서)
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .entries
            .iter()
            .map(|(name, score)| (name.as_str(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// 전체 특징으로 기준 모델을 학습하여 중요도를 계산한다
pub fn compute_importance(
    frame: &FeatureFrame,
    params: &BoostParams,
) -> PipelineResult<FeatureImportance> {
    let matrix = build_matrix(&frame.table, &frame.feature_names)?;
    let names = matrix.feature_names.clone();
    let dataset = matrix.into_dataset(frame.target.clone())?;

    info!(
        "🌲 기준 모델 학습: 특징 {}개, depth {}, lr {}, {}회 반복",
        names.len(),
        params.depth,
        params.learning_rate,
        params.iterations
    );
    let model = GradientBoostedRegressor::fit(params, &dataset, None)?;
    let importance = FeatureImportance::from_scores(&names, &model.feature_importance()?)?;

    for (name, score) in importance.ranked().iter().take(5) {
        info!("  📊 {}: {:.3}", name, score);
    }
    Ok(importance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Table};
    use crate::features::derive::derive_features;
    use chrono::NaiveDate;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_threshold_semantics() {
        let importance =
            FeatureImportance::from_scores(&names(&["a", "b", "c", "d"]), &[50.0, 0.5, 0.49, 49.01])
                .unwrap();
        assert_eq!(importance.threshold(0.01), 0.5);
        // 정확히 임계값이면 유지, 미만이면 제거
        assert_eq!(importance.reduced(0.01), names(&["a", "b", "d"]));
    }

    #[test]
    fn test_length_mismatch_is_validation_error() {
        let result = FeatureImportance::from_scores(&names(&["a", "b", "c"]), &[1.0, 2.0]);
        assert!(matches!(result, Err(PipelineError::Validation { .. })));

        let result = FeatureImportance::from_scores(&names(&["a"]), &[1.0, 2.0]);
        assert!(matches!(result, Err(PipelineError::Validation { .. })));
    }

    #[test]
    fn test_ranked_is_descending_and_stable() {
        let importance =
            FeatureImportance::from_scores(&names(&["a", "b", "c"]), &[10.0, 30.0, 10.0]).unwrap();
        let ranked: Vec<&str> = importance.ranked().into_iter().map(|(n, _)| n).collect();
        assert_eq!(ranked, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_all_zero_importance_keeps_everything() {
        let importance = FeatureImportance::from_scores(&names(&["a", "b"]), &[0.0, 0.0]).unwrap();
        assert_eq!(importance.reduced(0.01), names(&["a", "b"]));
    }

    /// 타깃 = 신호 + 잡음, 행마다 고유한 문자열 태그 열 포함
    fn frame_with_row_tags(n: u32) -> FeatureFrame {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        let mut table = Table::new("unified", dates);
        let signal: Vec<Option<f64>> = (0..n).map(|i| Some((i % 20) as f64)).collect();
        let target: Vec<Option<f64>> = (0..n)
            .map(|i| Some((i % 20) as f64 + ((i * 37) % 11) as f64 / 10.0 - 0.5))
            .collect();
        let tags: Vec<Option<String>> = (0..n).map(|i| Some(format!("row{:03}", i))).collect();
        table.push_column("A_Close", Column::Numeric(target)).unwrap();
        table.push_column("B_Signal", Column::Numeric(signal)).unwrap();
        table.push_column("C_Tag", Column::Text(tags)).unwrap();
        derive_features(table, "A_Close", &[3]).unwrap()
    }

    #[test]
    fn test_row_unique_categorical_does_not_take_over() {
        let frame = frame_with_row_tags(200);
        let params = BoostParams {
            iterations: 200,
            learning_rate: 0.1,
            depth: 4,
            l2_leaf_reg: 3.0,
            use_best_model: false,
            num_threads: 1,
            ..BoostParams::default()
        };

        let importance = compute_importance(&frame, &params).unwrap();
        let tag = importance.get("C_Tag").unwrap();
        let signal = importance.get("B_Signal").unwrap();
        assert!(tag < 1.0, "C_Tag {}", tag);
        assert!(signal > tag);

        let reduced = importance.reduced(0.01);
        assert!(reduced.contains(&"B_Signal".to_string()));
        assert!(!reduced.contains(&"C_Tag".to_string()));
    }
}
