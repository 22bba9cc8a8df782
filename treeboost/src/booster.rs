//! LightGBM 기반 gradient boosting 회귀기 (RMSE 손실)
//!
//! # 학습 흐름
//!
//! 1. 범주형 열 위치를 `categorical_feature`로 넘겨 LightGBM이 직접 분기하게 한다
//! 2. 평가 구간이 주어지면 같은 bin 경계로 평가 데이터셋을 만들고 반복마다 RMSE를 읽는다
//! 3. `early_stopping_rounds` 동안 개선이 없으면 중단
//! 4. `use_best_model`이면 최적 반복까지만 모델 텍스트로 저장
//!
//! 학습된 모델은 LightGBM 텍스트 형식 문자열로 보관하므로 `Clone + Send + Sync`이다.
//! 예측/중요도/저장은 `lightgbm3::Booster`로 그 문자열을 불러와 수행한다.

use std::path::Path;

use lightgbm3::{Booster, ImportanceType};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{BoostError, BoostResult};
use crate::native::{param_string, NativeBooster, NativeDataset};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub iterations: usize,
    pub learning_rate: f64,
    pub depth: usize,
    pub l2_leaf_reg: f64,
    /// 특징당 최대 경계값 수 (bin 수 = border_count + 1)
    pub border_count: usize,
    /// 평가 RMSE가 이 반복 수만큼 개선되지 않으면 중단 (None이면 끝까지 학습)
    pub early_stopping_rounds: Option<usize>,
    /// 평가 구간이 있을 때 최적 반복까지만 트리를 유지
    pub use_best_model: bool,
    pub min_data_in_leaf: usize,
    /// LightGBM 내부 스레드 수 (0 = OpenMP 기본값)
    pub num_threads: usize,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            iterations: 1000,
            learning_rate: 0.03,
            depth: 6,
            l2_leaf_reg: 3.0,
            border_count: 254,
            early_stopping_rounds: None,
            use_best_model: true,
            min_data_in_leaf: 1,
            num_threads: 0,
        }
    }
}

impl BoostParams {
    pub fn validate(&self) -> BoostResult<()> {
        if self.iterations == 0 {
            return Err(BoostError::invalid_parameter("iterations", "1 이상이어야 합니다"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(BoostError::invalid_parameter(
                "learning_rate",
                format!("0 < lr <= 1 이어야 합니다 (입력: {})", self.learning_rate),
            ));
        }
        if self.depth == 0 || self.depth > 16 {
            return Err(BoostError::invalid_parameter(
                "depth",
                format!("1~16 사이여야 합니다 (입력: {})", self.depth),
            ));
        }
        if !(self.l2_leaf_reg >= 0.0) || !self.l2_leaf_reg.is_finite() {
            return Err(BoostError::invalid_parameter(
                "l2_leaf_reg",
                format!("0 이상의 유한값이어야 합니다 (입력: {})", self.l2_leaf_reg),
            ));
        }
        if self.border_count == 0 || self.border_count > u16::MAX as usize - 1 {
            return Err(BoostError::invalid_parameter(
                "border_count",
                format!("1~{} 사이여야 합니다", u16::MAX - 1),
            ));
        }
        if self.min_data_in_leaf == 0 {
            return Err(BoostError::invalid_parameter("min_data_in_leaf", "1 이상이어야 합니다"));
        }
        Ok(())
    }

    /// 데이터셋 생성 파라미터 (bin 경계와 범주형 열은 데이터셋 단계에서 정해진다)
    fn dataset_params(&self, categorical: &[usize]) -> Value {
        let mut params = json!({
            "max_bin": self.border_count + 1,
            "min_data_in_leaf": self.min_data_in_leaf,
            "feature_pre_filter": false,
            "verbosity": -1,
        });
        if !categorical.is_empty() {
            let positions = categorical
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(",");
            params["categorical_feature"] = Value::String(positions);
        }
        params
    }

    fn booster_params(&self) -> Value {
        json!({
            "objective": "regression",
            "metric": "rmse",
            "learning_rate": self.learning_rate,
            "max_depth": self.depth,
            "num_leaves": 1usize << self.depth,
            "lambda_l2": self.l2_leaf_reg,
            "min_data_in_leaf": self.min_data_in_leaf,
            "num_threads": self.num_threads,
            "deterministic": true,
            "force_col_wise": true,
            "seed": 0,
            "verbosity": -1,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoostedRegressor {
    params: BoostParams,
    feature_names: Vec<String>,
    n_features: usize,
    tree_count: usize,
    best_iteration: Option<usize>,
    model_text: String,
}

impl GradientBoostedRegressor {
    /// 학습 데이터로 모델을 학습한다.
    ///
    /// `eval`이 주어지면 반복별 평가 RMSE로 최적 반복을 선택한다.
    pub fn fit(params: &BoostParams, train: &Dataset, eval: Option<&Dataset>) -> BoostResult<Self> {
        params.validate()?;
        train.validate()?;
        if train.n_rows() == 0 {
            return Err(BoostError::empty("학습 구간"));
        }
        if let Some(eval) = eval {
            eval.validate()?;
            if eval.n_rows() == 0 {
                return Err(BoostError::empty("평가 구간"));
            }
            if eval.n_features() != train.n_features() {
                return Err(BoostError::FeatureCountMismatch {
                    expected: train.n_features(),
                    actual: eval.n_features(),
                });
            }
        }

        let feature_names = if train.feature_names.len() == train.n_features() {
            train.feature_names.clone()
        } else {
            (0..train.n_features()).map(|i| format!("f{}", i)).collect()
        };

        let dataset_params = param_string(&params.dataset_params(&train.categorical));
        let train_set =
            NativeDataset::from_matrix(train.features.view(), &train.target, &dataset_params, None)?;
        train_set.set_feature_names(&feature_names)?;
        let eval_set = match eval {
            Some(eval) => Some(NativeDataset::from_matrix(
                eval.features.view(),
                &eval.target,
                &dataset_params,
                Some(&train_set),
            )?),
            None => None,
        };

        let mut booster = NativeBooster::new(&train_set, &param_string(&params.booster_params()))?;
        if let Some(eval_set) = &eval_set {
            booster.add_valid(eval_set)?;
        }

        let mut best: Option<(usize, f64)> = None;
        for iteration in 0..params.iterations {
            if booster.update()? {
                debug!("더 나눌 분기 없음: 반복 {}에서 종료", iteration);
                break;
            }

            if eval_set.is_some() {
                let score = booster
                    .eval(1)?
                    .first()
                    .copied()
                    .ok_or_else(|| BoostError::native("LGBM_BoosterGetEval", "평가 지표 없음"))?;
                if best.map_or(true, |(_, best_score)| score < best_score) {
                    best = Some((iteration, score));
                }
            }

            if let (Some(rounds), Some((best_iteration, _))) = (params.early_stopping_rounds, best) {
                if iteration - best_iteration >= rounds {
                    debug!("조기 종료: 반복 {} (최적 반복 {})", iteration, best_iteration);
                    break;
                }
            }
        }

        let best_iteration = best.map(|(iteration, _)| iteration);
        let trained = booster.current_iteration()?;
        let kept = match best_iteration {
            Some(iteration) if params.use_best_model => (iteration + 1).min(trained.max(1)),
            _ => trained,
        };
        let num_iteration = if kept == trained { -1 } else { kept as i32 };
        let model_text = booster.save_model_text(num_iteration)?;

        Ok(Self {
            params: params.clone(),
            feature_names,
            n_features: train.n_features(),
            tree_count: count_trees(&model_text),
            best_iteration,
            model_text,
        })
    }

    pub fn params(&self) -> &BoostParams {
        &self.params
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// 유지된 반복(트리) 수
    pub fn tree_count(&self) -> usize {
        self.tree_count
    }

    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    /// LightGBM 텍스트 형식 모델
    pub fn model_text(&self) -> &str {
        &self.model_text
    }

    fn booster(&self) -> BoostResult<Booster> {
        Booster::from_string(&self.model_text).map_err(|e| BoostError::native("모델 로드", e))
    }

    pub(crate) fn check_features(&self, x: &ArrayView2<f64>) -> BoostResult<()> {
        if x.ncols() != self.n_features {
            return Err(BoostError::FeatureCountMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        Ok(())
    }

    pub(crate) fn thread_params(&self) -> String {
        format!("num_threads={}", self.params.num_threads)
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> BoostResult<Vec<f64>> {
        self.check_features(&x)?;
        if x.nrows() == 0 {
            return Ok(Vec::new());
        }
        let flat: Vec<f64> = x.iter().copied().collect();
        self.booster()?
            .predict_with_params(&flat, self.n_features as i32, true, &self.thread_params())
            .map_err(|e| BoostError::native("예측", e))
    }

    /// 특징별 분기 이득 비중 (합계 100, 분기가 없으면 모두 0)
    pub fn feature_importance(&self) -> BoostResult<Vec<f64>> {
        let mut gains = self
            .booster()?
            .feature_importance(ImportanceType::Gain)
            .map_err(|e| BoostError::native("특징 중요도", e))?;
        if gains.len() != self.n_features {
            return Err(BoostError::FeatureCountMismatch {
                expected: self.n_features,
                actual: gains.len(),
            });
        }

        let total: f64 = gains.iter().sum();
        if total > 0.0 {
            gains.iter_mut().for_each(|g| *g = *g / total * 100.0);
        }
        Ok(gains)
    }

    /// LightGBM 텍스트 모델 파일로 저장
    pub fn save<P: AsRef<Path>>(&self, path: P) -> BoostResult<()> {
        let path = path.as_ref();
        let target = path
            .to_str()
            .ok_or_else(|| BoostError::invalid_model(format!("경로 인코딩 오류: {}", path.display())))?;
        self.booster()?
            .save_file(target)
            .map_err(|e| BoostError::native(format!("모델 저장 {}", path.display()), e))
    }

    /// LightGBM 텍스트 모델 파일 로드.
    ///
    /// 특징 이름은 파일에 기록된 (공백이 치환된) 이름이며 학습 파라미터는 기본값으로 채운다.
    pub fn load<P: AsRef<Path>>(path: P) -> BoostResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BoostError::io(
                format!("모델 읽기 {}", path.display()),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        let source = path
            .to_str()
            .ok_or_else(|| BoostError::invalid_model(format!("경로 인코딩 오류: {}", path.display())))?;
        let booster = Booster::from_file(source)
            .map_err(|e| BoostError::native(format!("모델 읽기 {}", path.display()), e))?;
        let model_text = booster
            .save_string()
            .map_err(|e| BoostError::native("모델 텍스트 변환", e))?;
        Self::from_model_text(model_text)
    }

    fn from_model_text(model_text: String) -> BoostResult<Self> {
        let header = |key: &str| {
            model_text
                .lines()
                .find_map(|line| line.strip_prefix(key).and_then(|rest| rest.strip_prefix('=')))
        };

        let feature_names: Vec<String> = header("feature_names")
            .ok_or_else(|| BoostError::invalid_model("feature_names 줄 없음"))?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let max_feature_idx: usize = header("max_feature_idx")
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| BoostError::invalid_model("max_feature_idx 줄 없음"))?;
        if feature_names.len() != max_feature_idx + 1 {
            return Err(BoostError::invalid_model(format!(
                "feature_names {}개, max_feature_idx {}",
                feature_names.len(),
                max_feature_idx
            )));
        }
        Ok(Self {
            params: BoostParams::default(),
            n_features: feature_names.len(),
            feature_names,
            tree_count: count_trees(&model_text),
            best_iteration: None,
            model_text,
        })
    }
}

fn count_trees(model_text: &str) -> usize {
    model_text.lines().filter(|line| line.starts_with("Tree=")).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RegressionMetrics;
    use ndarray::Array2;

    fn linear_dataset(n: usize) -> Dataset {
        let mut values = Vec::with_capacity(n * 2);
        let mut target = Vec::with_capacity(n);
        for i in 0..n {
            let a = i as f64;
            let b = (i % 7) as f64;
            values.push(a);
            values.push(b);
            target.push(2.0 * a + 0.5 * b);
        }
        Dataset::new(
            Array2::from_shape_vec((n, 2), values).unwrap(),
            target,
            Vec::new(),
            vec!["a".to_string(), "b".to_string()],
        )
        .unwrap()
    }

    fn small_params() -> BoostParams {
        BoostParams {
            iterations: 200,
            learning_rate: 0.1,
            depth: 3,
            l2_leaf_reg: 1.0,
            num_threads: 1,
            ..BoostParams::default()
        }
    }

    #[test]
    fn test_fit_reduces_training_error() {
        let data = linear_dataset(120);
        let model = GradientBoostedRegressor::fit(&small_params(), &data, None).unwrap();
        let predictions = model.predict(data.features.view()).unwrap();

        let mean = data.target.iter().sum::<f64>() / data.n_rows() as f64;
        let baseline = vec![mean; data.n_rows()];
        let base = RegressionMetrics::evaluate(&data.target, &baseline).unwrap();
        let fitted = RegressionMetrics::evaluate(&data.target, &predictions).unwrap();
        assert!(fitted.rmse < base.rmse * 0.1);
        assert!(fitted.r2 > 0.95);
    }

    #[test]
    fn test_importance_prefers_informative_feature() {
        let data = linear_dataset(120);
        let model = GradientBoostedRegressor::fit(&small_params(), &data, None).unwrap();
        let importance = model.feature_importance().unwrap();
        assert_eq!(importance.len(), 2);
        assert!((importance.iter().sum::<f64>() - 100.0).abs() < 1e-6);
        assert!(importance[0] > importance[1]);
    }

    #[test]
    fn test_best_model_keeps_trees_up_to_best_iteration() {
        let data = linear_dataset(100);
        let train = data.select_rows(&(0..80).collect::<Vec<_>>());
        // 학습 범위 밖 구간이라 일정 반복 이후 평가 RMSE가 더 줄지 않는다
        let eval = data.select_rows(&(80..100).collect::<Vec<_>>());
        let params = BoostParams {
            early_stopping_rounds: Some(20),
            ..small_params()
        };
        let model = GradientBoostedRegressor::fit(&params, &train, Some(&eval)).unwrap();
        let best = model.best_iteration().unwrap();
        assert_eq!(model.tree_count(), best + 1);
    }

    #[test]
    fn test_without_eval_all_iterations_are_kept() {
        let data = linear_dataset(120);
        let params = BoostParams {
            iterations: 30,
            ..small_params()
        };
        let model = GradientBoostedRegressor::fit(&params, &data, None).unwrap();
        assert_eq!(model.best_iteration(), None);
        assert_eq!(model.tree_count(), 30);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let data = linear_dataset(60);
        let a = GradientBoostedRegressor::fit(&small_params(), &data, None).unwrap();
        let b = GradientBoostedRegressor::fit(&small_params(), &data, None).unwrap();
        assert_eq!(
            a.predict(data.features.view()).unwrap(),
            b.predict(data.features.view()).unwrap()
        );
    }

    #[test]
    fn test_categorical_feature_is_used() {
        // 범주 코드 0/1/2가 타깃 수준을 결정
        let n = 300;
        let mut values = Vec::new();
        let mut target = Vec::new();
        for i in 0..n {
            let code = (i % 3) as f64;
            values.push(code);
            values.push(((i * 13) % 17) as f64);
            target.push(code * 10.0);
        }
        let data = Dataset::new(
            Array2::from_shape_vec((n, 2), values).unwrap(),
            target,
            vec![0],
            vec!["sentiment".to_string(), "noise".to_string()],
        )
        .unwrap();

        let model = GradientBoostedRegressor::fit(&small_params(), &data, None).unwrap();
        let importance = model.feature_importance().unwrap();
        assert!(importance[0] > 90.0);
    }

    #[test]
    fn test_row_id_categorical_does_not_dominate() {
        // 행마다 고유한 범주 코드는 타깃을 외워버릴 수 있는 열이다
        let n = 200;
        let mut values = Vec::new();
        let mut target = Vec::new();
        for i in 0..n {
            let signal = (i % 20) as f64;
            let jitter = ((i * 37) % 11) as f64 / 10.0 - 0.5;
            values.push(signal);
            values.push(i as f64);
            target.push(signal + jitter);
        }
        let data = Dataset::new(
            Array2::from_shape_vec((n, 2), values).unwrap(),
            target,
            vec![1],
            vec!["signal".to_string(), "row_id".to_string()],
        )
        .unwrap();
        let params = BoostParams {
            iterations: 200,
            depth: 4,
            ..small_params()
        };

        let model = GradientBoostedRegressor::fit(&params, &data, None).unwrap();
        let importance = model.feature_importance().unwrap();
        assert!(importance[0] > 90.0, "signal {:?}", importance);
        assert!(importance[1] < 10.0, "row_id {:?}", importance);
    }

    #[test]
    fn test_model_file_round_trip_preserves_predictions() {
        let data = linear_dataset(50);
        let model = GradientBoostedRegressor::fit(&small_params(), &data, None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.txt");
        model.save(&path).unwrap();
        let loaded = GradientBoostedRegressor::load(&path).unwrap();

        assert_eq!(loaded.feature_names(), model.feature_names());
        assert_eq!(loaded.tree_count(), model.tree_count());
        let before = model.predict(data.features.view()).unwrap();
        let after = loaded.predict(data.features.view()).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_missing_model_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = GradientBoostedRegressor::load(dir.path().join("none.txt"));
        assert!(matches!(result, Err(BoostError::Io { .. })));
    }

    #[test]
    fn test_model_text_without_header_is_rejected() {
        let result = GradientBoostedRegressor::from_model_text("tree\nversion=v4\n".to_string());
        assert!(matches!(result, Err(BoostError::InvalidModel { .. })));
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let data = linear_dataset(20);
        let params = BoostParams {
            depth: 0,
            ..small_params()
        };
        assert!(GradientBoostedRegressor::fit(&params, &data, None).is_err());
    }

    #[test]
    fn test_predict_checks_feature_count() {
        let data = linear_dataset(20);
        let model = GradientBoostedRegressor::fit(&small_params(), &data, None).unwrap();
        let wrong = Array2::<f64>::zeros((3, 5));
        assert!(matches!(
            model.predict(wrong.view()),
            Err(BoostError::FeatureCountMismatch { expected: 2, actual: 5 })
        ));
    }
}
