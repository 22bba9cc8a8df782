//! 상위 중요도 특징으로 상호작용/로그 특징 생성
//!
//! 입력 테이블은 건드리지 않고 새 테이블과 특징 목록을 돌려준다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Column, Table};
use crate::features::reduce::FeatureImportance;
use crate::utility::errors::{PipelineError, PipelineResult};

pub const INTERACTION_FEATURE: &str = "interaction_term";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineeringStrategy {
    None,
    Interaction,
    Log,
    InteractionLog,
}

impl EngineeringStrategy {
    pub const ALL: [EngineeringStrategy; 4] = [
        EngineeringStrategy::None,
        EngineeringStrategy::Interaction,
        EngineeringStrategy::Log,
        EngineeringStrategy::InteractionLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineeringStrategy::None => "none",
            EngineeringStrategy::Interaction => "interaction",
            EngineeringStrategy::Log => "log",
            EngineeringStrategy::InteractionLog => "interaction_log",
        }
    }

    pub fn adds_interaction(&self) -> bool {
        matches!(
            self,
            EngineeringStrategy::Interaction | EngineeringStrategy::InteractionLog
        )
    }

    pub fn adds_log(&self) -> bool {
        matches!(self, EngineeringStrategy::Log | EngineeringStrategy::InteractionLog)
    }
}

impl fmt::Display for EngineeringStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineeringStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.as_str() == s.trim())
            .ok_or_else(|| {
                PipelineError::parsing("engineering strategy", format!("알 수 없는 전략: {}", s))
            })
    }
}

/// 로그 특징 이름
pub fn log_feature_name(feature: &str) -> String {
    format!("log_{}", feature)
}

/// `base` 특징 목록에 전략에 따른 특징을 더한다.
///
/// - interaction: 중요도 상위 숫자 특징 두 개의 곱 (`interaction_term`)
/// - log: 중요도 최상위 숫자 특징의 ln(1 + v) (`log_<특징>`), 음수/NaN/무한대는 0으로
///
/// 조건을 만족하는 숫자 특징이 부족하면 해당 특징은 만들지 않는다.
pub fn engineer_features(
    table: &Table,
    base: &[String],
    importance: &FeatureImportance,
    strategy: EngineeringStrategy,
) -> PipelineResult<(Table, Vec<String>)> {
    let mut engineered = table.clone();
    let mut features = base.to_vec();

    let numeric_top: Vec<&str> = importance
        .ranked()
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| {
            table
                .column(name)
                .map(|column| column.is_numeric())
                .unwrap_or(false)
        })
        .collect();

    if strategy.adds_interaction() {
        if let [first, second, ..] = numeric_top.as_slice() {
            let a = table.numeric(first)?;
            let b = table.numeric(second)?;
            let product = a
                .iter()
                .zip(b)
                .map(|(x, y)| match (x, y) {
                    (Some(x), Some(y)) => Some(x * y),
                    _ => None,
                })
                .collect();
            engineered.set_column(INTERACTION_FEATURE, Column::Numeric(product))?;
            push_unique(&mut features, INTERACTION_FEATURE);
            debug!("상호작용 특징: {} × {}", first, second);
        } else {
            debug!("숫자 특징이 2개 미만이라 상호작용 특징을 만들지 않습니다");
        }
    }

    if strategy.adds_log() {
        if let Some(top) = numeric_top.first() {
            let logged = table
                .numeric(top)?
                .iter()
                .map(|v| {
                    let v = v.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0);
                    Some(v.ln_1p())
                })
                .collect();
            let name = log_feature_name(top);
            engineered.set_column(name.as_str(), Column::Numeric(logged))?;
            push_unique(&mut features, &name);
            debug!("로그 특징: {}", name);
        }
    }

    Ok((engineered, features))
}

fn push_unique(features: &mut Vec<String>, name: &str) {
    if !features.iter().any(|f| f == name) {
        features.push(name.to_string());
    }
}
