use serde::{Deserialize, Serialize};

use crate::error::{BoostError, BoostResult};

/// 평가 구간 회귀 지표
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> BoostResult<Self> {
        if y_true.len() != y_pred.len() {
            return Err(BoostError::ShapeMismatch {
                rows: y_pred.len(),
                targets: y_true.len(),
            });
        }
        if y_true.is_empty() {
            return Err(BoostError::empty("평가 구간"));
        }

        Ok(Self {
            rmse: rmse(y_true, y_pred),
            mae: mae(y_true, y_pred),
            r2: r2_score(y_true, y_pred),
        })
    }
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return f64::NAN;
    }
    let sse: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p) * (t - p)).sum();
    (sse / n as f64).sqrt()
}

pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return f64::NAN;
    }
    y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / n as f64
}

/// 결정계수. 타깃 분산이 0이면 완전 일치 시 1, 아니면 0.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return f64::NAN;
    }
    let mean = y_true[..n].iter().sum::<f64>() / n as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p) * (t - p)).sum();
    let ss_tot: f64 = y_true[..n].iter().map(|t| (t - mean) * (t - mean)).sum();

    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}
