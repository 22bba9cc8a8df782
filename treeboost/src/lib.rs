//! treeboost: LightGBM 위에 얹은 표 형식 회귀 어댑터
//!
//! 범주형 열 위치 전달, 평가 구간 기반 최적 반복 선택, 이득 기준 특징 중요도,
//! TreeSHAP 기여도, LightGBM 텍스트 모델 저장/복원과 고정 시드 분할, 회귀 지표를 제공한다.
//! 학습된 모델은 텍스트로 보관되므로 `Send + Sync`이며 여러 스레드에서 동시에 학습시킬 수 있다.

pub mod attribution;
pub mod booster;
pub mod dataset;
pub mod error;
pub mod metrics;
mod native;
pub mod split;

pub use attribution::{attribute, Attribution};
pub use booster::{BoostParams, GradientBoostedRegressor};
pub use dataset::Dataset;
pub use error::{BoostError, BoostResult};
pub use metrics::RegressionMetrics;
pub use split::train_test_split_indices;
