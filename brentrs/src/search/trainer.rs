//! 후보 하나의 학습/평가
//!
//! 특징 행렬과 학습/평가 분할은 모든 후보가 공유한다. 파생 특징은 순수 함수로 만들어지므로
//! engineered 집합은 전략별로 한 번만 만들고, original/reduced 집합은 전략과 무관하게 하나씩 둔다.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;
use treeboost::{
    train_test_split_indices, Dataset, GradientBoostedRegressor, RegressionMetrics,
};

use crate::data::Table;
use crate::features::{
    build_matrix, engineer_features, EngineeringStrategy, FeatureFrame, FeatureImportance,
};
use crate::search::candidate::{FeatureSetKind, FeatureSets, SearchCandidate};
use crate::utility::config::SearchConfig;
use crate::utility::errors::{PipelineError, PipelineResult};

/// 한 특징 구성의 학습/평가 데이터
#[derive(Debug, Clone)]
pub struct FeatureVariant {
    pub feature_names: Vec<String>,
    pub train: Dataset,
    pub test: Dataset,
}

/// 후보 학습에 필요한 읽기 전용 입력 묶음 (스레드 간 공유)
#[derive(Debug)]
pub struct TrainingContext {
    variants: HashMap<(FeatureSetKind, Option<EngineeringStrategy>), FeatureVariant>,
    test_dates: Vec<NaiveDate>,
    border_count: usize,
    early_stopping_rounds: Option<usize>,
}

/// 학습이 끝난 후보
#[derive(Debug, Clone)]
pub struct TrainedModelResult {
    pub candidate: SearchCandidate,
    pub model: GradientBoostedRegressor,
    pub feature_names: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub y_true: Vec<f64>,
    pub y_pred: Vec<f64>,
    pub metrics: RegressionMetrics,
}

impl TrainingContext {
    /// 설정된 특징 집합/전략 조합의 행렬을 만들고 같은 행 분할을 적용한다
    pub fn build(
        frame: &FeatureFrame,
        sets: &FeatureSets,
        importance: &FeatureImportance,
        config: &SearchConfig,
    ) -> PipelineResult<Self> {
        let (train_rows, test_rows) =
            train_test_split_indices(frame.n_rows(), config.test_ratio, config.seed)?;
        let test_dates = test_rows.iter().map(|&i| frame.table.dates()[i]).collect();

        let split = |features: &[String], table: &Table| -> PipelineResult<FeatureVariant> {
            let matrix = build_matrix(table, features)?;
            let feature_names = matrix.feature_names.clone();
            let dataset = matrix.into_dataset(frame.target.clone())?;
            Ok(FeatureVariant {
                feature_names,
                train: dataset.select_rows(&train_rows),
                test: dataset.select_rows(&test_rows),
            })
        };

        let mut variants = HashMap::new();
        for &kind in &config.feature_sets {
            match kind {
                FeatureSetKind::Original | FeatureSetKind::Reduced => {
                    variants.insert((kind, None), split(sets.get(kind), &frame.table)?);
                }
                FeatureSetKind::Engineered => {
                    for &strategy in &config.strategies {
                        let (table, features) =
                            engineer_features(&frame.table, &sets.reduced, importance, strategy)?;
                        debug!("engineered/{} 특징 {}개", strategy, features.len());
                        variants.insert((kind, Some(strategy)), split(&features, &table)?);
                    }
                }
            }
        }

        Ok(Self {
            variants,
            test_dates,
            border_count: config.border_count,
            early_stopping_rounds: config.early_stopping_rounds,
        })
    }

    pub fn test_dates(&self) -> &[NaiveDate] {
        &self.test_dates
    }

    /// 후보가 사용할 특징 구성. 전략은 engineered 집합에만 영향을 준다
    pub fn variant(&self, candidate: &SearchCandidate) -> PipelineResult<&FeatureVariant> {
        let key = match candidate.feature_set {
            FeatureSetKind::Engineered => (candidate.feature_set, Some(candidate.engineering)),
            kind => (kind, None),
        };
        self.variants.get(&key).ok_or_else(|| {
            PipelineError::validation(
                "feature_set",
                format!("{}/{} 특징 구성이 준비되지 않았습니다", candidate.feature_set, candidate.engineering),
            )
        })
    }
}

/// 후보 하나를 학습하고 평가 구간 지표를 계산한다
pub fn train_candidate(
    context: &TrainingContext,
    candidate: &SearchCandidate,
) -> PipelineResult<TrainedModelResult> {
    let variant = context.variant(candidate)?;
    let params = candidate.boost_params(context.border_count, context.early_stopping_rounds);

    let model = GradientBoostedRegressor::fit(&params, &variant.train, Some(&variant.test))?;
    let y_pred = model.predict(variant.test.features.view())?;
    let metrics = RegressionMetrics::evaluate(&variant.test.target, &y_pred)?;

    if !(metrics.rmse.is_finite() && metrics.mae.is_finite() && metrics.r2.is_finite()) {
        return Err(PipelineError::training(
            format!("후보 #{}", candidate.id),
            format!(
                "유한하지 않은 지표 (RMSE {}, MAE {}, R2 {})",
                metrics.rmse, metrics.mae, metrics.r2
            ),
        ));
    }

    Ok(TrainedModelResult {
        candidate: candidate.clone(),
        model,
        feature_names: variant.feature_names.clone(),
        dates: context.test_dates.clone(),
        y_true: variant.test.target.clone(),
        y_pred,
        metrics,
    })
}
