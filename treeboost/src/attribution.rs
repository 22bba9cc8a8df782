//! TreeSHAP 특징 기여도 (LightGBM `predict_contrib`)
//!
//! 한 행의 기여도 합 + 기대값 = 모델 예측값.

use ndarray::ArrayView2;

use crate::booster::GradientBoostedRegressor;
use crate::error::{BoostError, BoostResult};
use crate::native::NativeBooster;

#[derive(Debug, Clone)]
pub struct Attribution {
    /// 모든 행에서 공통인 기준값
    pub expected_value: f64,
    /// 행별 특징 기여도 [행][특징]
    pub values: Vec<Vec<f64>>,
}

impl Attribution {
    /// 특징별 평균 |기여도|
    pub fn mean_abs(&self) -> Vec<f64> {
        let n_features = self.values.first().map_or(0, |row| row.len());
        let mut totals = vec![0.0; n_features];
        for row in &self.values {
            for (total, value) in totals.iter_mut().zip(row) {
                *total += value.abs();
            }
        }
        if !self.values.is_empty() {
            let n = self.values.len() as f64;
            totals.iter_mut().for_each(|t| *t /= n);
        }
        totals
    }
}

pub fn attribute(model: &GradientBoostedRegressor, x: ArrayView2<f64>) -> BoostResult<Attribution> {
    if x.nrows() == 0 {
        return Err(BoostError::empty("기여도 계산 대상"));
    }
    model.check_features(&x)?;

    let booster = NativeBooster::from_model_text(model.model_text())?;
    let raw = booster.predict_contributions(x, &model.thread_params())?;
    let width = model.n_features() + 1;
    if raw.len() != x.nrows() * width {
        return Err(BoostError::native(
            "LGBM_BoosterPredictForMat",
            format!("기여도 {}개, 기대값 {}개", raw.len(), x.nrows() * width),
        ));
    }

    let expected_value = raw[width - 1];
    let values = raw
        .chunks(width)
        .map(|row| row[..width - 1].to_vec())
        .collect();

    Ok(Attribution {
        expected_value,
        values,
    })
}
