use ndarray::{Array2, Axis};

use crate::error::{BoostError, BoostResult};

/// 학습/평가용 특징 행렬 + 타깃 묶음
///
/// 범주형 열은 정수 코드(f64)로 저장하고 `categorical`에 열 위치를 기록한다.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub target: Vec<f64>,
    pub categorical: Vec<usize>,
    pub feature_names: Vec<String>,
}

impl Dataset {
    pub fn new(
        features: Array2<f64>,
        target: Vec<f64>,
        categorical: Vec<usize>,
        feature_names: Vec<String>,
    ) -> BoostResult<Self> {
        let dataset = Self {
            features,
            target,
            categorical,
            feature_names,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn validate(&self) -> BoostResult<()> {
        if self.features.nrows() != self.target.len() {
            return Err(BoostError::ShapeMismatch {
                rows: self.features.nrows(),
                targets: self.target.len(),
            });
        }
        if let Some(row) = self.target.iter().position(|v| !v.is_finite()) {
            return Err(BoostError::NonFiniteTarget { row });
        }
        if let Some(&index) = self.categorical.iter().find(|&&i| i >= self.n_features()) {
            return Err(BoostError::CategoricalIndex {
                index,
                n_features: self.n_features(),
            });
        }
        Ok(())
    }

    /// 지정한 행만 순서대로 모은 새 데이터셋
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), rows),
            target: rows.iter().map(|&i| self.target[i]).collect(),
            categorical: self.categorical.clone(),
            feature_names: self.feature_names.clone(),
        }
    }
}
