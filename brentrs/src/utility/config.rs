use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::features::EngineeringStrategy;
use crate::search::FeatureSetKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("설정 파일을 찾을 수 없습니다: {0}")]
    FileNotFound(String),
    #[error("설정 파일 읽기 오류: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("설정 파일 파싱 오류: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("설정 유효성 검증 실패: {0}")]
    ValidationError(String),
}

/// 전체 설정. 모든 섹션과 필드는 생략 가능하며 생략 시 기본값을 사용한다.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub features: FeaturesConfig,
    pub reduction: ReductionConfig,
    pub search: SearchConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// .xlsx/.xls/.ods 파일 또는 `<시트명>.csv`가 들어있는 디렉토리
    pub workbook_path: String,
    /// 읽을 시트 목록 (순서 = 기준 시트 동률 시 우선순위)
    pub sheets: Vec<String>,
    pub target_sheet: String,
    pub target_column: String,
    /// 타임스탬프 단위 감성 CSV (일별 집계 후 시트로 추가)
    pub sentiment_files: Vec<SentimentSource>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SentimentSource {
    pub path: String,
    /// 집계 시트 이름 (`<name>_mean`, `<name>_count` 컬럼이 됨)
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FeaturesConfig {
    /// 타깃 이동평균 윈도우 (SMA_w)
    pub sma_windows: Vec<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ReductionConfig {
    /// 최대 중요도 대비 비율. 이 값 × max 미만인 특징은 제거
    pub importance_ratio: f64,
    pub iterations: usize,
    pub learning_rate: f64,
    pub depth: usize,
    pub l2_leaf_reg: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub feature_sets: Vec<FeatureSetKind>,
    pub strategies: Vec<EngineeringStrategy>,
    pub depths: Vec<usize>,
    pub learning_rates: Vec<f64>,
    pub iterations: Vec<usize>,
    pub l2_leaf_regs: Vec<f64>,
    pub test_ratio: f64,
    pub seed: u64,
    /// 병렬 작업자 수 (0이면 CPU 코어 수)
    pub workers: usize,
    pub early_stopping_rounds: Option<usize>,
    pub border_count: usize,
    pub show_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: String,
    /// 최적 모델의 특징 기여도 요약 저장 여부
    pub write_attribution: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            workbook_path: "data/brent_data.xlsx".to_string(),
            sheets: [
                "Brent",
                "SAUDI_ENERG",
                "GOLD_Future",
                "Natural Gas Future",
                "Sentiment",
                "USD",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            target_sheet: "Brent".to_string(),
            target_column: "Close".to_string(),
            sentiment_files: Vec::new(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            sma_windows: vec![3, 6, 12],
        }
    }
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            importance_ratio: 0.01,
            iterations: 500,
            learning_rate: 0.05,
            depth: 6,
            l2_leaf_reg: 3.0,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            feature_sets: vec![
                FeatureSetKind::Original,
                FeatureSetKind::Reduced,
                FeatureSetKind::Engineered,
            ],
            strategies: vec![
                EngineeringStrategy::None,
                EngineeringStrategy::Interaction,
                EngineeringStrategy::Log,
                EngineeringStrategy::InteractionLog,
            ],
            depths: vec![4, 6, 8],
            learning_rates: vec![0.01, 0.05, 0.1],
            iterations: vec![500, 1000, 1500],
            l2_leaf_regs: vec![1.0, 3.0, 5.0],
            test_ratio: 0.2,
            seed: 42,
            workers: 0,
            early_stopping_rounds: None,
            border_count: 254,
            show_progress: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            write_attribution: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl DataConfig {
    /// 통합 테이블에서의 타깃 컬럼 이름 (`<시트>_<컬럼>`)
    pub fn target_name(&self) -> String {
        format!("{}_{}", self.target_sheet.trim(), self.target_column.trim())
    }
}

impl Config {
    /// 지정된 파일에서 설정을 로드
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Err(ConfigError::FileNotFound(format!(
                "{}가 없습니다. config.example.toml을 복사해서 config.toml을 만들고 설정을 채워주세요.",
                path
            )));
        }

        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        // 환경 변수로 오버라이드
        config.apply_env_overrides();

        config.validate()?;

        Ok(config)
    }

    /// 환경 변수로 설정을 오버라이드
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BRENT_WORKBOOK_PATH") {
            self.data.workbook_path = path;
        }
        if let Ok(dir) = std::env::var("BRENT_OUTPUT_DIR") {
            self.output.output_dir = dir;
        }
        if let Ok(workers) = std::env::var("BRENT_SEARCH_WORKERS") {
            if let Ok(value) = workers.parse::<usize>() {
                self.search.workers = value;
            }
        }

        // 로그 레벨
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 데이터 설정 검증
        if self.data.sheets.is_empty() {
            return Err(ConfigError::ValidationError(
                "data.sheets에 최소 1개 시트가 필요합니다".to_string(),
            ));
        }
        if self.data.target_sheet.trim().is_empty() || self.data.target_column.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "data.target_sheet와 data.target_column은 비어있을 수 없습니다".to_string(),
            ));
        }
        if !self
            .data
            .sheets
            .iter()
            .any(|s| s.trim() == self.data.target_sheet.trim())
        {
            return Err(ConfigError::ValidationError(format!(
                "target_sheet '{}'가 data.sheets에 없습니다",
                self.data.target_sheet
            )));
        }
        for source in &self.data.sentiment_files {
            if source.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "감성 파일 {}의 name이 비어있습니다",
                    source.path
                )));
            }
        }

        if self.features.sma_windows.iter().any(|w| *w == 0) {
            return Err(ConfigError::ValidationError(
                "features.sma_windows 값은 1 이상이어야 합니다".to_string(),
            ));
        }

        // 특징 축소 설정 검증
        if !(0.0..=1.0).contains(&self.reduction.importance_ratio) {
            return Err(ConfigError::ValidationError(
                "reduction.importance_ratio는 0~1 사이여야 합니다".to_string(),
            ));
        }
        Self::check_depth("reduction.depth", self.reduction.depth)?;
        Self::check_learning_rate("reduction.learning_rate", self.reduction.learning_rate)?;
        Self::check_iterations("reduction.iterations", self.reduction.iterations)?;
        Self::check_l2("reduction.l2_leaf_reg", self.reduction.l2_leaf_reg)?;

        // 탐색 격자 검증
        let search = &self.search;
        if search.feature_sets.is_empty()
            || search.strategies.is_empty()
            || search.depths.is_empty()
            || search.learning_rates.is_empty()
            || search.iterations.is_empty()
            || search.l2_leaf_regs.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "search 격자의 모든 축은 최소 1개 값이 필요합니다".to_string(),
            ));
        }
        for depth in &search.depths {
            Self::check_depth("search.depths", *depth)?;
        }
        for lr in &search.learning_rates {
            Self::check_learning_rate("search.learning_rates", *lr)?;
        }
        for iterations in &search.iterations {
            Self::check_iterations("search.iterations", *iterations)?;
        }
        for l2 in &search.l2_leaf_regs {
            Self::check_l2("search.l2_leaf_regs", *l2)?;
        }
        if !(search.test_ratio > 0.0 && search.test_ratio < 1.0) {
            return Err(ConfigError::ValidationError(
                "search.test_ratio는 0과 1 사이여야 합니다".to_string(),
            ));
        }
        if search.border_count == 0 || search.border_count > 65534 {
            return Err(ConfigError::ValidationError(
                "search.border_count는 1~65534 사이여야 합니다".to_string(),
            ));
        }

        if self.output.output_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "output.output_dir는 비어있을 수 없습니다".to_string(),
            ));
        }

        // 로그 레벨 검증 (RUST_LOG 형식의 지시자도 허용)
        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "logging.level '{}'을 해석할 수 없습니다",
                self.logging.level
            )));
        }

        Ok(())
    }

    fn check_depth(field: &str, depth: usize) -> Result<(), ConfigError> {
        if depth == 0 || depth > 16 {
            return Err(ConfigError::ValidationError(format!(
                "{}는 1~16 사이여야 합니다 (입력: {})",
                field, depth
            )));
        }
        Ok(())
    }

    fn check_learning_rate(field: &str, lr: f64) -> Result<(), ConfigError> {
        if !(lr > 0.0 && lr <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "{}는 0 초과 1 이하여야 합니다 (입력: {})",
                field, lr
            )));
        }
        Ok(())
    }

    fn check_iterations(field: &str, iterations: usize) -> Result<(), ConfigError> {
        if iterations == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{}는 1 이상이어야 합니다",
                field
            )));
        }
        Ok(())
    }

    fn check_l2(field: &str, l2: f64) -> Result<(), ConfigError> {
        if !(l2 >= 0.0 && l2.is_finite()) {
            return Err(ConfigError::ValidationError(format!(
                "{}는 0 이상의 유한값이어야 합니다 (입력: {})",
                field, l2
            )));
        }
        Ok(())
    }

    /// 설정을 파일로 저장 (주로 디버깅용)
    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(format!("직렬화 오류: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.data.target_name(), "Brent_Close");
        assert_eq!(config.search.depths, vec![4, 6, 8]);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [search]
            depths = [3]
            strategies = ["none", "interaction_log"]

            [reduction]
            importance_ratio = 0.05
            "#,
        )
        .unwrap();

        assert_eq!(config.search.depths, vec![3]);
        assert_eq!(
            config.search.strategies,
            vec![EngineeringStrategy::None, EngineeringStrategy::InteractionLog]
        );
        assert_eq!(config.search.learning_rates, vec![0.01, 0.05, 0.1]);
        assert_eq!(config.reduction.importance_ratio, 0.05);
        assert_eq!(config.reduction.iterations, 500);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.search.depths = vec![0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search.test_ratio = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.target_sheet = "WTI".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search.iterations.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_strategy_is_parse_error() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [search]
            strategies = ["polynomial"]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load_from_file("/nonexistent/brent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_example_config_loads_through_file_path() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../config.example.toml");
        let config = Config::load_from_file(path).unwrap();
        assert_eq!(config.data.target_sheet, "Brent");
        assert_eq!(config.search.depths, Config::default().search.depths);
        assert!(config.data.sentiment_files.is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.search.workers = 3;
        config.data.sentiment_files.push(SentimentSource {
            path: "data/gold_sentiment.csv".to_string(),
            name: "gold_sentiment".to_string(),
        });
        config.save_to_file(path).unwrap();

        let loaded = Config::load_from_file(path).unwrap();
        assert_eq!(loaded.data.sentiment_files, config.data.sentiment_files);
        assert_eq!(loaded.search.depths, config.search.depths);
    }
}
