pub mod candidate;
pub mod runner;
pub mod select;
pub mod trainer;

pub use candidate::{FeatureSetKind, FeatureSets, SearchCandidate, SearchSpace};
pub use runner::{run_isolated, CandidateOutcome, RecordStatus, SearchRecord, SearchReport, SearchRunner};
pub use select::{better, compare, select_best};
pub use trainer::{train_candidate, FeatureVariant, TrainedModelResult, TrainingContext};
