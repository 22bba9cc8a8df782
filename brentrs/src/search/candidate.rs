use std::fmt;

use serde::{Deserialize, Serialize};
use treeboost::BoostParams;

use crate::features::EngineeringStrategy;
use crate::utility::config::SearchConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSetKind {
    Original,
    Reduced,
    Engineered,
}

impl FeatureSetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSetKind::Original => "original",
            FeatureSetKind::Reduced => "reduced",
            FeatureSetKind::Engineered => "engineered",
        }
    }
}

impl fmt::Display for FeatureSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 이름 붙은 세 가지 특징 목록
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSets {
    pub original: Vec<String>,
    pub reduced: Vec<String>,
    /// 축소 목록 + interaction_log 파생 특징
    pub engineered: Vec<String>,
}

impl FeatureSets {
    pub fn get(&self, kind: FeatureSetKind) -> &[String] {
        match kind {
            FeatureSetKind::Original => &self.original,
            FeatureSetKind::Reduced => &self.reduced,
            FeatureSetKind::Engineered => &self.engineered,
        }
    }
}

/// 탐색 후보 하나. `id`는 격자 내 순번
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchCandidate {
    pub id: usize,
    pub feature_set: FeatureSetKind,
    pub engineering: EngineeringStrategy,
    pub depth: usize,
    pub learning_rate: f64,
    pub iterations: usize,
    pub l2_leaf_reg: f64,
}

impl SearchCandidate {
    /// 후보 학습 파라미터. 후보끼리 rayon으로 병렬 학습하므로 LightGBM 내부 스레드는 1개
    pub fn boost_params(&self, border_count: usize, early_stopping_rounds: Option<usize>) -> BoostParams {
        BoostParams {
            iterations: self.iterations,
            learning_rate: self.learning_rate,
            depth: self.depth,
            l2_leaf_reg: self.l2_leaf_reg,
            border_count,
            early_stopping_rounds,
            use_best_model: true,
            num_threads: 1,
            ..BoostParams::default()
        }
    }
}

impl fmt::Display for SearchCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{feature_set: {}, engineering: {}, depth: {}, learning_rate: {}, iterations: {}, l2_leaf_reg: {}}}",
            self.feature_set,
            self.engineering,
            self.depth,
            self.learning_rate,
            self.iterations,
            self.l2_leaf_reg
        )
    }
}

/// 특징 집합 × 전략 × depth × learning_rate × iterations × l2 격자
#[derive(Debug, Clone)]
pub struct SearchSpace {
    pub feature_sets: Vec<FeatureSetKind>,
    pub strategies: Vec<EngineeringStrategy>,
    pub depths: Vec<usize>,
    pub learning_rates: Vec<f64>,
    pub iterations: Vec<usize>,
    pub l2_leaf_regs: Vec<f64>,
}

impl From<&SearchConfig> for SearchSpace {
    fn from(config: &SearchConfig) -> Self {
        Self {
            feature_sets: config.feature_sets.clone(),
            strategies: config.strategies.clone(),
            depths: config.depths.clone(),
            learning_rates: config.learning_rates.clone(),
            iterations: config.iterations.clone(),
            l2_leaf_regs: config.l2_leaf_regs.clone(),
        }
    }
}

impl SearchSpace {
    pub fn len(&self) -> usize {
        self.feature_sets.len()
            * self.strategies.len()
            * self.depths.len()
            * self.learning_rates.len()
            * self.iterations.len()
            * self.l2_leaf_regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 데카르트 곱 (바깥쪽부터 특징 집합, 전략, depth, lr, iterations, l2 순)
    pub fn candidates(&self) -> Vec<SearchCandidate> {
        let mut candidates = Vec::with_capacity(self.len());
        for &feature_set in &self.feature_sets {
            for &engineering in &self.strategies {
                for &depth in &self.depths {
                    for &learning_rate in &self.learning_rates {
                        for &iterations in &self.iterations {
                            for &l2_leaf_reg in &self.l2_leaf_regs {
                                candidates.push(SearchCandidate {
                                    id: candidates.len(),
                                    feature_set,
                                    engineering,
                                    depth,
                                    learning_rate,
                                    iterations,
                                    l2_leaf_reg,
                                });
                            }
                        }
                    }
                }
            }
        }
        candidates
    }
}
