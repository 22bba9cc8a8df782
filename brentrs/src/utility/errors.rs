use thiserror::Error;

/// 파이프라인 전 단계에서 사용하는 오류 타입
/// 각 오류는 어느 단계/대상에서 실패했는지 알 수 있도록 컨텍스트를 포함
#[derive(Error, Debug)]
pub enum PipelineError {
    /// 설정 관련 오류 (config.rs의 ConfigError와 연동)
    #[error("설정 오류: {0}")]
    Config(#[from] crate::utility::config::ConfigError),

    /// 워크북 열기/시트 읽기 오류
    #[error("워크북 오류: {path} - {reason}")]
    Workbook { path: String, reason: String },

    /// CSV 읽기/쓰기 오류
    #[error("CSV 오류: {operation} - {reason}")]
    Csv { operation: String, reason: String },

    /// 어떤 시트에도 Date 컬럼이 없음
    #[error("Date 컬럼이 있는 시트가 없습니다 (검사한 시트: {sheets})")]
    MissingDateColumn { sheets: String },

    /// 테이블에 없는 컬럼을 참조
    #[error("컬럼 없음: {table} 테이블에 '{column}' 컬럼이 없습니다")]
    MissingColumn { table: String, column: String },

    /// 데이터 파싱 오류
    #[error("파싱 오류: {data_type} 파싱 실패 - {reason}")]
    Parsing { data_type: String, reason: String },

    /// 유효성 검증 오류
    #[error("유효성 검증 실패: {field} - {reason}")]
    Validation { field: String, reason: String },

    /// 모델 학습/예측 오류
    #[error("학습 오류: {operation} - {reason}")]
    Training { operation: String, reason: String },

    /// 탐색 전체 실패 (모든 후보 실패 등)
    #[error("모델 탐색 실패: {reason}")]
    Search { reason: String },

    /// 일반적인 I/O 오류
    #[error("I/O 오류: {operation} - {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// 일반적인 오류 (기타)
    #[error("오류: {message}")]
    General { message: String },
}

/// 파이프라인에서 사용하는 Result 타입 별칭
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn workbook(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Workbook {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn csv(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Csv {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// 컬럼 없음 오류를 간편하게 생성하는 헬퍼 함수
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn parsing(data_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parsing {
            data_type: data_type.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn training(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Training {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn search(reason: impl Into<String>) -> Self {
        Self::Search {
            reason: reason.into(),
        }
    }

    /// 파일 I/O 오류에 작업 이름을 붙이는 헬퍼 함수
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }
}

/// std::io::Error를 PipelineError로 변환
impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        PipelineError::Io {
            operation: "파일 I/O".to_string(),
            source: error,
        }
    }
}

/// csv 크레이트 오류를 PipelineError로 변환
impl From<csv::Error> for PipelineError {
    fn from(error: csv::Error) -> Self {
        let operation = match error.kind() {
            csv::ErrorKind::Io(_) => "CSV 입출력",
            csv::ErrorKind::Utf8 { .. } => "CSV UTF-8 디코딩",
            csv::ErrorKind::UnequalLengths { .. } => "CSV 행 길이 검사",
            csv::ErrorKind::Serialize(_) => "CSV 직렬화",
            csv::ErrorKind::Deserialize { .. } => "CSV 역직렬화",
            _ => "CSV 처리",
        };
        PipelineError::csv(operation, error.to_string())
    }
}

/// calamine 워크북 오류를 PipelineError로 변환
impl From<calamine::Error> for PipelineError {
    fn from(error: calamine::Error) -> Self {
        PipelineError::workbook("워크북", error.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::parsing("JSON", error.to_string())
    }
}

/// 학습 라이브러리 오류를 PipelineError로 변환
impl From<treeboost::BoostError> for PipelineError {
    fn from(error: treeboost::BoostError) -> Self {
        PipelineError::training("treeboost", error.to_string())
    }
}

/// &str을 PipelineError로 변환
impl From<&str> for PipelineError {
    fn from(message: &str) -> Self {
        PipelineError::General {
            message: message.to_string(),
        }
    }
}

/// String을 PipelineError로 변환
impl From<String> for PipelineError {
    fn from(message: String) -> Self {
        PipelineError::General { message }
    }
}
