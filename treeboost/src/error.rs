use thiserror::Error;

/// treeboost 학습/추론 과정에서 발생하는 오류
#[derive(Error, Debug)]
pub enum BoostError {
    /// 학습 데이터가 비어있음
    #[error("빈 데이터셋: {context}")]
    EmptyDataset { context: String },

    /// 특징 행렬과 타깃 길이 불일치
    #[error("데이터 형태 불일치: 행 {rows}개, 타깃 {targets}개")]
    ShapeMismatch { rows: usize, targets: usize },

    /// 모델이 학습된 특징 수와 입력 특징 수 불일치
    #[error("특징 수 불일치: 기대값 {expected}, 입력값 {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    /// 잘못된 하이퍼파라미터
    #[error("잘못된 파라미터: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },

    /// 타깃에 NaN/inf 포함
    #[error("유한하지 않은 타깃 값: {row}번째 행")]
    NonFiniteTarget { row: usize },

    /// 범주형 특징 인덱스 범위 초과
    #[error("범주형 특징 인덱스 {index}가 특징 수 {n_features}를 초과합니다")]
    CategoricalIndex { index: usize, n_features: usize },

    /// 저장된 모델 구조가 올바르지 않음
    #[error("잘못된 모델: {reason}")]
    InvalidModel { reason: String },

    /// LightGBM 호출 실패
    #[error("LightGBM 오류: {operation} - {reason}")]
    Native { operation: String, reason: String },

    /// 모델 파일 I/O 오류
    #[error("I/O 오류: {operation} - {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

pub type BoostResult<T> = Result<T, BoostError>;

impl BoostError {
    pub fn empty(context: impl Into<String>) -> Self {
        Self::EmptyDataset {
            context: context.into(),
        }
    }

    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_model(reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            reason: reason.into(),
        }
    }

    pub fn native(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Native {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}
