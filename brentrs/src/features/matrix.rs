use std::collections::{BTreeMap, HashSet};

use ndarray::Array2;
use treeboost::Dataset;

use crate::data::{Column, Table};
use crate::utility::errors::PipelineResult;

/// 테이블 컬럼 목록을 학습용 행렬로 변환한 결과
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub values: Array2<f64>,
    pub feature_names: Vec<String>,
    /// 범주형(텍스트) 특징의 열 위치
    pub categorical: Vec<usize>,
}

impl FeatureMatrix {
    pub fn into_dataset(self, target: Vec<f64>) -> PipelineResult<Dataset> {
        Ok(Dataset::new(
            self.values,
            target,
            self.categorical,
            self.feature_names,
        )?)
    }
}

/// 특징 목록 순서대로 행렬을 만든다.
///
/// 숫자 컬럼은 그대로 (결측 = NaN), 텍스트 컬럼은 정렬된 고유값 순번을 범주 코드로 쓴다.
/// 중복된 이름은 처음 것만 사용한다.
pub fn build_matrix(table: &Table, features: &[String]) -> PipelineResult<FeatureMatrix> {
    let mut seen = HashSet::new();
    let names: Vec<&String> = features.iter().filter(|f| seen.insert(f.as_str())).collect();

    let n_rows = table.n_rows();
    let mut values = Array2::<f64>::from_elem((n_rows, names.len()), f64::NAN);
    let mut categorical = Vec::new();

    for (j, name) in names.iter().enumerate() {
        match table.column(name)? {
            Column::Numeric(column) => {
                for (i, value) in column.iter().enumerate() {
                    if let Some(v) = value {
                        values[[i, j]] = *v;
                    }
                }
            }
            Column::Text(column) => {
                categorical.push(j);
                let codes: BTreeMap<&str, f64> = column
                    .iter()
                    .flatten()
                    .map(String::as_str)
                    .collect::<std::collections::BTreeSet<_>>()
                    .into_iter()
                    .enumerate()
                    .map(|(code, value)| (value, code as f64))
                    .collect();
                for (i, value) in column.iter().enumerate() {
                    if let Some(code) = value.as_deref().and_then(|v| codes.get(v)) {
                        values[[i, j]] = *code;
                    }
                }
            }
        }
    }

    Ok(FeatureMatrix {
        values,
        feature_names: names.into_iter().cloned().collect(),
        categorical,
    })
}
