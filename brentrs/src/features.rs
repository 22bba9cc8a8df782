pub mod derive;
pub mod engineer;
pub mod matrix;
pub mod reduce;

pub use derive::{derive_features, parse_numeric, FeatureFrame, DATE_FEATURE};
pub use engineer::{engineer_features, EngineeringStrategy, INTERACTION_FEATURE};
pub use matrix::{build_matrix, FeatureMatrix};
pub use reduce::{compute_importance, FeatureImportance};
